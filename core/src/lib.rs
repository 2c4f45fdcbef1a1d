//! Sensor-window classification with language models.
//!
//! Windows are encoded as text or rendered figures, optionally after a
//! model-mediated choice of visualization, assembled into a few-shot prompt
//! and sent to a model whose `<answer>` span is the predicted class.

pub mod biosignal;
pub mod encoding;
pub mod interface;
pub mod llm;
pub mod math;
pub mod planner;
pub mod prelude;
pub mod solver;
pub mod telemetry;
pub mod tokens;

pub use encoding::{ImageEncoder, TextEncoder};
pub use llm::{build_model, LanguageModel};
pub use planner::{VisualizationCandidate, VisualizationPlanner};
pub use solver::{SolveConfig, SolveMode, SolveOutcome, Solver};
pub use tokens::TokenEstimator;
