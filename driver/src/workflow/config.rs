use anyhow::{bail, Context};
use sensorlm::prelude::{EncodingStyle, StyleArgs, TaskMetadata};
use sensorlm::{SolveConfig, SolveMode, VisualizationCandidate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub seed: u64,
    pub log_dir: PathBuf,
    pub llm_model: String,
    pub llm_version: String,
    /// File holding the API key.
    pub llm_path: PathBuf,
    pub llm_endpoint: Option<String>,
    /// JSON-lines file of `{"data": [[..], ..], "label": ".."}` records.
    pub dataset_path: PathBuf,
    pub task_metadata_path: PathBuf,
    /// Targets drawn per label.
    pub num_samples: usize,
    /// Examples drawn per label for every solve.
    pub num_examples: usize,
    pub concurrency: usize,
    pub use_vis: bool,
    pub plan_vis: bool,
    pub vis_func: Option<EncodingStyle>,
    pub vis_args: StyleArgs,
    pub vis_knowledge: String,
    pub use_knowledge: bool,
    pub use_cot: bool,
    pub txt_style: Option<EncodingStyle>,
    pub txt_rounding_points: u32,
    /// Defaults to the task's own sampling rate.
    pub txt_sampling_rate: Option<f64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            log_dir: PathBuf::from("logs"),
            llm_model: "chatgpt".to_string(),
            llm_version: "gpt-4o".to_string(),
            llm_path: PathBuf::from("openai_key.txt"),
            llm_endpoint: None,
            dataset_path: PathBuf::from("data/test.jsonl"),
            task_metadata_path: PathBuf::from("data/metadata.json"),
            num_samples: 10,
            num_examples: 1,
            concurrency: 4,
            use_vis: false,
            plan_vis: false,
            vis_func: None,
            vis_args: StyleArgs::default(),
            vis_knowledge: String::new(),
            use_knowledge: false,
            use_cot: false,
            txt_style: None,
            txt_rounding_points: 3,
            txt_sampling_rate: None,
        }
    }
}

impl RunConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading run config {}", path_ref.display()))?;
        let config: RunConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing run config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        serde_yaml::to_string(self).context("serializing run config")
    }

    /// Whether each solve has to run Plan/Select before answering.
    pub fn needs_planning(&self) -> bool {
        (self.use_vis && self.vis_func.is_none()) || self.plan_vis
    }

    /// The visualization fixed in the config file, if any.
    pub fn configured_visualization(&self) -> Option<VisualizationCandidate> {
        self.vis_func.map(|style| VisualizationCandidate {
            style,
            args: self.vis_args.clone(),
            knowledge: self.vis_knowledge.clone(),
        })
    }

    /// Builds the settings of one solve. A `planned` visualization replaces
    /// the configured one and also becomes the text style.
    pub fn to_solve_config(
        &self,
        metadata: &TaskMetadata,
        planned: Option<VisualizationCandidate>,
    ) -> anyhow::Result<SolveConfig> {
        let txt_style = match &planned {
            Some(candidate) => Some(candidate.style),
            None => self.txt_style,
        };
        let mode = if self.use_vis {
            match planned.or_else(|| self.configured_visualization()) {
                Some(candidate) => SolveMode::Visual(candidate),
                None => bail!("use_vis is set but no visualization was configured or planned"),
            }
        } else {
            SolveMode::Text
        };
        Ok(SolveConfig {
            mode,
            use_knowledge: self.use_knowledge,
            use_cot: self.use_cot,
            txt_style,
            txt_rounding_points: self.txt_rounding_points,
            txt_sampling_rate: self.txt_sampling_rate.unwrap_or(metadata.sampling_rate),
        })
    }
}
