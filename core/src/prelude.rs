use std::path::PathBuf;

pub use crate::interface::{Prompt, PromptBlock, SensorWindow, TaskMetadata, TokenBudget};
pub use crate::encoding::{EncodingStyle, StyleArgs};

/// Fatal configuration problems; raised immediately and never retried.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unsupported encoding style: {0}")]
    UnsupportedStyle(String),
    #[error("encoding style `{0}` has no renderer")]
    UnimplementedStyle(&'static str),
    #[error("unsupported language model: {0}")]
    UnsupportedModel(String),
    #[error("invalid sensor window: {0}")]
    InvalidWindow(String),
}

/// Model output that does not follow the expected answer or JSON contract.
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("response has no <answer>...</answer> span")]
    MissingAnswerTag,
    #[error("response has no balanced JSON value starting with `{0}`")]
    NoJsonValue(char),
    #[error("malformed JSON in response: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("render failure: {0}")]
    Render(String),
    #[error("image codec failure: {0}")]
    Codec(#[from] image::ImageError),
}

#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("request to language model failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("language model returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("language model returned no completion")]
    EmptyCompletion,
    #[error("reading API key {path}: {source}")]
    ApiKey {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(thiserror::Error, Debug)]
#[error("writing artifact {path}: {source}")]
pub struct SinkError {
    pub path: PathBuf,
    pub source: std::io::Error,
}

/// Failure anywhere in the Plan/Select rounds.
#[derive(thiserror::Error, Debug)]
pub enum PlanError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("planner proposed no visualization candidates")]
    NoCandidates,
    #[error("selected visualization `{0}` is not one of the candidates")]
    UnknownSelection(String),
}

/// Failure of a single solve; aborts that solve only.
#[derive(thiserror::Error, Debug)]
pub enum SolveError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Plan(#[from] PlanError),
}

pub type EncodeResult<T> = Result<T, EncodeError>;
pub type SolveResult<T> = Result<T, SolveError>;
