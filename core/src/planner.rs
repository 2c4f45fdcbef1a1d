//! Two-round visualization choice: the model first proposes candidate
//! encodings from the catalog (Plan), then judges renderings of the labeled
//! examples under each candidate and names the most discriminative one
//! (Select).

use crate::encoding::{catalog_text, EncodingStyle, ImageEncoder, StyleArgs};
use crate::interface::{parse_json_array, parse_json_object, quoted_list, shared_range};
use crate::interface::{Prompt, SensorWindow, TaskMetadata};
use crate::llm::LanguageModel;
use crate::prelude::PlanError;
use crate::telemetry::{sanitize_label, RunLogger};
use log::{info, warn};
use serde::{Deserialize, Serialize};

pub const PLAN_INSTRUCTION: &str = r#"### Instructions
You need to determine effective visualization methods for the given task. Provide visualization methods that aid in analyzing the data for this task, along with the required arguments for that method. Additionally, explain how to use the information from the visualization to solve the task. You can provide several candidates as a list. Generate the answer in the following format:
[{"func": visualization_method, "args": {"arg1": arg1_val, "arg2": arg2_val, ...}], "knowledge": knowledge}, ...]"#;

pub const SELECT_INSTRUCTION: &str = r#"### Instruction
You do not have any prior knowledge about sensor data and visualization techniques.
Based solely on the visual cues in the provided images,
identify the visualization that most visually distinguishes all different classes for the given task.
Generate the answer in the following format:
{"func": visualization_method}"#;

pub const DEMONSTRATIONS: &str = r#"### Demonstrations
Data description: The sensor data is collected from an accelerometer measuring acceleration along the x, y, and z axes. The data is normalized with the statistics of the user's data. The data is measured from an accelerometer attached to the ankles of a user.
Task description: A task for classifying running and walking activities using accelerometer data measured from an ankle-worn device.
Response: {"func": "raw waveform", "args": {}, "knowledge": "Use this to visualize the amplitude of the accelerometer signal over time. For classifying running and walking, observe the patterns in the waveform: running typically shows higher amplitude and more frequent peaks due to the higher impact and faster motion, while walking shows lower amplitude and less frequent peaks."}

Data description: The sensor data is collected from an accelerometer measuring acceleration along the x, y, and z axes. The data is normalized with the statistics of the vehicle's data. The data is measured from an accelerometer attached to a vehicle.
Task description: A task for classifying road types, such as asphalt, dirt, and cobblestone, using accelerometer data measured from a vehicle.
Response: {"func": "spectrogram", "args": {"nfft": 128, "nperseg": 128, "noverlap": 120, "mode": "magnitude"}, "knowledge": "Use this to analyze the frequency components of the accelerometer signal over time. The colors in the spectrogram represent the magnitude of the frequencies: brighter colors indicate higher magnitudes. For road type classification, asphalt typically shows lower frequency components with smoother patterns, dirt shows higher frequency components with irregular patterns, and cobblestone shows high-frequency components with periodic patterns due to the regular bumps."}

Data description: The sensor data is collected from an ECG measuring the electrical activity of the heart. The data is normalized with the statistics of the user's data. The data is measured using electrodes attached to the chest of a user.
Task description: A task for detecting sleep apnea using ECG data measured from chest electrodes.
Response: {"func": "ECG individual heart beats", "args": {}, "knowledge": "Use this to aggregate and visualize individual heartbeats within an ECG recording. In normal beats, the P-wave precedes the QRS complex, and the T-wave follows it. In sleep apnea, irregularities in the intervals between the P, Q, R, S, and T peaks can be observed. For instance, the absence of regular QRS complexes or prolonged intervals can indicate episodes of apnea. The plot helps identify these patterns by showing the average shape of the heartbeats and marking the specific peaks."}

Data description: The sensor data is collected from an EMG sensor measuring muscle electrical activity. The data is normalized with the statistics of the user's data. The data is measured using electrodes attached to the forearm of a user.
Task description: A task for recognizing finger gestures, such as numbers, using EMG data measured from forearm electrodes.
Response: {"func": "EMG signal", "args": {}, "knowledge": "Use this to visualize the raw EMG signal over time. For recognizing finger gestures, observe the patterns and amplitude of muscle activity. Different numbers (gestures) will produce distinct patterns in the EMG signal. For example, bending more fingers usually results in higher amplitude signals due to increased muscle activation."}

Data description: The sensor data is collected from an ECG measuring the electrical activity of the heart. The data is normalized with the statistics of the user's data. The data is measured using electrodes attached to the chest of a user.
Task description: A task for detecting whether the user is running or not using ECG data measured from chest electrodes.
Response: {"func": "ECG heart rate", "args": {}, "knowledge": "Use this to monitor heart rate over time and analyze activity levels. A significant increase in heart rate can indicate that the user is running. The plot should show a higher average heart rate during running periods compared to resting or walking periods. Sudden spikes and consistent high heart rates are typical indicators of running."}"#;

pub const PLAN_LOG: &str = "vis_plan.txt";
pub const SELECT_LOG: &str = "vis_selection.txt";

/// A proposed encoding with the model's rationale for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualizationCandidate {
    #[serde(rename = "func")]
    pub style: EncodingStyle,
    pub args: StyleArgs,
    pub knowledge: String,
}

#[derive(Deserialize)]
struct ProposedCandidate {
    func: String,
    #[serde(default)]
    args: Option<StyleArgs>,
    #[serde(default)]
    knowledge: Option<String>,
}

#[derive(Deserialize)]
struct Selection {
    func: String,
}

pub struct VisualizationPlanner<'a> {
    model: &'a dyn LanguageModel,
    metadata: &'a TaskMetadata,
    logger: &'a RunLogger,
}

impl<'a> VisualizationPlanner<'a> {
    /// `logger` receives the plan/select transcripts and every rendered image.
    pub fn new(model: &'a dyn LanguageModel, metadata: &'a TaskMetadata, logger: &'a RunLogger) -> Self {
        Self {
            model,
            metadata,
            logger,
        }
    }

    pub fn planning_prompt(&self) -> Prompt {
        let mut text = format!("{}\n\n", PLAN_INSTRUCTION);
        text.push_str("The available visualization methods are as follows:\n\n");
        text.push_str(&format!("{}\n\n", catalog_text()));
        text.push_str(&format!("{}\n\n", DEMONSTRATIONS));
        text.push_str("### Question\n");
        text.push_str(&self.question_block());
        Prompt::text(text)
    }

    /// Asks the model for candidates.
    ///
    /// Proposals naming an unknown style or a style with no renderer are
    /// dropped; the plan fails only if nothing is left.
    pub fn plan(&self) -> Result<Vec<VisualizationCandidate>, PlanError> {
        let prompt = self.planning_prompt();
        let response = self.model.generate(&prompt)?;
        self.logger.store_chat(PLAN_LOG, &prompt, &response, None)?;

        let proposed: Vec<ProposedCandidate> = parse_json_array(&response)?;
        let mut candidates = Vec::with_capacity(proposed.len());
        for proposal in proposed {
            let style: EncodingStyle = match proposal.func.parse() {
                Ok(style) => style,
                Err(err) => {
                    warn!("dropping candidate: {}", err);
                    continue;
                }
            };
            if !style.is_renderable() {
                warn!("dropping candidate `{}`: no renderer", style);
                continue;
            }
            candidates.push(VisualizationCandidate {
                style,
                args: proposal.args.unwrap_or_default(),
                knowledge: proposal.knowledge.unwrap_or_default(),
            });
        }
        if candidates.is_empty() {
            return Err(PlanError::NoCandidates);
        }
        Ok(candidates)
    }

    /// Renders every example under every candidate, storing each image.
    pub fn selection_prompt(
        &self,
        candidates: &[VisualizationCandidate],
        examples: &[SensorWindow],
    ) -> Result<Prompt, PlanError> {
        let mut images = Vec::with_capacity(candidates.len() * examples.len());
        for candidate in candidates {
            let y_range = match candidate.style {
                EncodingStyle::RawWaveform => shared_range(examples),
                _ => None,
            };
            let mut encoder = ImageEncoder::for_task(self.metadata, candidate.style, candidate.args.clone())?
                .with_y_range(y_range);
            for (i, example) in examples.iter().enumerate() {
                let label = example.label().unwrap_or_default();
                let png = encoder.encode_image(example, Some(label))?;
                let name = format!(
                    "{}_{}_{}.png",
                    sanitize_label(candidate.style.name()),
                    sanitize_label(label),
                    i
                );
                self.logger.store_image(name, &png)?;
                images.push(png);
            }
        }

        let names: Vec<&str> = candidates.iter().map(|c| c.style.name()).collect();
        let mut text = format!("{}\n\n", SELECT_INSTRUCTION);
        text.push_str("### Question\n");
        text.push_str(&format!("Visualization methods: {}\n", quoted_list(&names)));
        text.push_str(&self.question_block());
        Ok(Prompt::with_images(text, images))
    }

    /// Asks the model to pick one candidate by name.
    pub fn select(
        &self,
        candidates: &[VisualizationCandidate],
        examples: &[SensorWindow],
    ) -> Result<VisualizationCandidate, PlanError> {
        if candidates.is_empty() {
            return Err(PlanError::NoCandidates);
        }
        let prompt = self.selection_prompt(candidates, examples)?;
        let response = self.model.generate(&prompt)?;
        self.logger.store_chat(SELECT_LOG, &prompt, &response, None)?;

        let selection: Selection = parse_json_object(&response)?;
        candidates
            .iter()
            .find(|candidate| candidate.style.name() == selection.func)
            .cloned()
            .ok_or(PlanError::UnknownSelection(selection.func))
    }

    /// Plan followed by Select.
    pub fn choose(&self, examples: &[SensorWindow]) -> Result<VisualizationCandidate, PlanError> {
        let candidates = self.plan()?;
        let chosen = self.select(&candidates, examples)?;
        info!("visualization {} selected", chosen.style);
        Ok(chosen)
    }

    fn question_block(&self) -> String {
        let mut text = format!(
            "Task description: {}\n",
            capitalize(&self.metadata.task_description)
        );
        text.push_str(&format!(
            "Data description: {}\n",
            capitalize(&self.metadata.data_description)
        ));
        text.push_str("Response: ");
        text
    }
}

/// First character upper case, the rest lower case.
fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
