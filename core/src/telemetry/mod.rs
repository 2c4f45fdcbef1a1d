pub mod log;
pub mod metrics;

pub use self::log::{sanitize_label, RunLogger};
pub use metrics::{Metrics, MetricsRecorder};
