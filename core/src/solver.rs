//! Few-shot classification of one target window.
//!
//! A solve is stateless: everything it needs arrives through an immutable
//! [`SolveConfig`], the prompt it builds is dropped once the answer has been
//! extracted, and all artifacts go to the run logger it was handed.

use crate::encoding::{EncodingStyle, ImageEncoder, TextEncoder};
use crate::interface::{extract_answer, quoted_list, shared_range};
use crate::interface::{Prompt, SensorWindow, TaskMetadata, TokenBudget};
use crate::llm::LanguageModel;
use crate::planner::VisualizationCandidate;
use crate::prelude::SolveResult;
use crate::telemetry::{sanitize_label, RunLogger};
use crate::tokens::TokenEstimator;
use log::{debug, warn};

pub const INSTRUCTION: &str = "### Instruction\nYou are an expert in sensor data analysis. Given the sensor data, determine the correct answer from the options listed in the question. Provide the answer with the format of <answer>ANSWER</answer>, where ANSWER corresponds to one of the options listed in the question. If the answer is not in the options, choose the most possible option.";
pub const TXT_EXAMPLES_GUIDE: &str =
    "Please refer to the provided examples and use them to answer the following question for the target data.";
pub const VIS_EXAMPLES_GUIDE: &str = "Please refer to the examples provided in the images and use them to answer the following question for the target data.";
pub const COT_SUFFIX: &str = "Let's think step-by-step. ";

pub const SOLVER_LOG: &str = "task_solver.txt";
pub const TARGET_IMAGE: &str = "target.png";

/// Which rendering the model sees.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveMode {
    Text,
    Visual(VisualizationCandidate),
}

/// Per-solve settings, built once by the caller and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveConfig {
    pub mode: SolveMode,
    pub use_knowledge: bool,
    pub use_cot: bool,
    pub txt_style: Option<EncodingStyle>,
    pub txt_rounding_points: u32,
    pub txt_sampling_rate: f64,
}

impl SolveConfig {
    /// Text-only configuration rendering raw waveforms at `txt_sampling_rate`.
    pub fn text(txt_rounding_points: u32, txt_sampling_rate: f64) -> Self {
        Self {
            mode: SolveMode::Text,
            use_knowledge: false,
            use_cot: false,
            txt_style: None,
            txt_rounding_points,
            txt_sampling_rate,
        }
    }

    /// Switches to the visual branch under `candidate`; its style also
    /// becomes the text style.
    pub fn with_visualization(mut self, candidate: VisualizationCandidate) -> Self {
        self.txt_style = Some(candidate.style);
        self.mode = SolveMode::Visual(candidate);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    pub answer: String,
    pub response: String,
    pub tokens: Option<TokenBudget>,
}

pub struct Solver<'a> {
    model: &'a dyn LanguageModel,
    metadata: &'a TaskMetadata,
    logger: &'a RunLogger,
    estimator: Option<&'a TokenEstimator>,
}

impl<'a> Solver<'a> {
    pub fn new(model: &'a dyn LanguageModel, metadata: &'a TaskMetadata, logger: &'a RunLogger) -> Self {
        Self {
            model,
            metadata,
            logger,
            estimator: None,
        }
    }

    pub fn with_estimator(mut self, estimator: &'a TokenEstimator) -> Self {
        self.estimator = Some(estimator);
        self
    }

    /// Builds the prompt, queries the model once and extracts the answer.
    ///
    /// `examples` must carry their labels; `target` is never labeled in the
    /// prompt.
    pub fn solve(
        &self,
        config: &SolveConfig,
        target: &SensorWindow,
        examples: &[SensorWindow],
    ) -> SolveResult<SolveOutcome> {
        let prompt = match &config.mode {
            SolveMode::Text => self.text_prompt(config, target, examples),
            SolveMode::Visual(candidate) => self.visual_prompt(config, candidate, target, examples)?,
        };

        let response = self.model.generate(&prompt)?;
        let tokens = self.estimate(&prompt);
        self.logger
            .store_chat(SOLVER_LOG, &prompt, &response, tokens.map(|t| t.total()))?;

        let answer = extract_answer(&response)?;
        debug!("{} answered `{}`", self.model.name(), answer);
        Ok(SolveOutcome {
            answer,
            response,
            tokens,
        })
    }

    pub fn text_prompt(&self, config: &SolveConfig, target: &SensorWindow, examples: &[SensorWindow]) -> Prompt {
        let encoder = TextEncoder::for_task(
            self.metadata,
            config.txt_style,
            config.txt_rounding_points,
            config.txt_sampling_rate,
        );

        let mut text = format!("{}\n\n", INSTRUCTION);
        text.push_str(&format!("{} {}\n\n", self.metadata.data_description, TXT_EXAMPLES_GUIDE));
        text.push_str("### Examples\n");
        for example in examples {
            text.push_str(&encoder.encode_text(example, example.label()));
            text.push_str("\n\n");
        }
        text.push_str("### Question\n");
        text.push_str(&encoder.encode_text(target, None));
        text.push('\n');
        text.push_str(&self.question(config));
        Prompt::text(text)
    }

    /// Renders every example, then the target; each image is also stored.
    pub fn visual_prompt(
        &self,
        config: &SolveConfig,
        candidate: &VisualizationCandidate,
        target: &SensorWindow,
        examples: &[SensorWindow],
    ) -> SolveResult<Prompt> {
        let y_range = match candidate.style {
            EncodingStyle::RawWaveform => shared_range(std::iter::once(target).chain(examples)),
            _ => None,
        };
        let mut encoder = ImageEncoder::for_task(self.metadata, candidate.style, candidate.args.clone())?
            .with_y_range(y_range);

        let mut images = Vec::with_capacity(examples.len() + 1);
        for (i, example) in examples.iter().enumerate() {
            let label = example.label().unwrap_or_default();
            let png = encoder.encode_image(example, Some(label))?;
            self.logger
                .store_image(format!("{}_{}.png", sanitize_label(label), i), &png)?;
            images.push(png);
        }
        let png = encoder.encode_image(target, None)?;
        self.logger.store_image(TARGET_IMAGE, &png)?;
        images.push(png);

        let mut text = format!("{}\n\n", INSTRUCTION);
        text.push_str(&format!("{} {}\n\n", self.metadata.data_description, VIS_EXAMPLES_GUIDE));
        text.push_str("### Question\n");
        if config.use_knowledge && !candidate.knowledge.is_empty() {
            text.push_str(&format!("*Knowledge*: {}\n", candidate.knowledge));
        }
        text.push_str(&self.question(config));
        Ok(Prompt::with_images(text, images))
    }

    fn question(&self, config: &SolveConfig) -> String {
        let task = self.metadata.task_description.trim_matches('.');
        let mut text = format!(
            "*Question*: When the sensor data is used for {}, what is the most likely answer among {}?\n*Answer*: ",
            task,
            quoted_list(&self.metadata.classes)
        );
        if config.use_cot {
            text.push_str(COT_SUFFIX);
        }
        text
    }

    fn estimate(&self, prompt: &Prompt) -> Option<TokenBudget> {
        let estimator = self.estimator?;
        match estimator.estimate(prompt) {
            Ok(budget) => Some(budget),
            Err(err) => {
                warn!("token estimate unavailable: {}", err);
                None
            }
        }
    }
}
