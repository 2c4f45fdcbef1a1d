use crate::math::stats::StatsHelper;
use crate::prelude::ConfigError;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Fixed-length multichannel window produced by the ETL layer.
///
/// Samples are laid out `[time][channel]`. Windows are immutable once built;
/// encoders only ever borrow them.
#[derive(Debug, Clone)]
pub struct SensorWindow {
    samples: Array2<f64>,
    sampling_rate: f64,
    channels: Vec<String>,
    label: Option<String>,
}

impl SensorWindow {
    pub fn new(
        samples: Array2<f64>,
        sampling_rate: f64,
        channels: Vec<String>,
        label: Option<String>,
    ) -> Result<Self, ConfigError> {
        if samples.ncols() != channels.len() {
            return Err(ConfigError::InvalidWindow(format!(
                "{} columns for {} channels",
                samples.ncols(),
                channels.len()
            )));
        }
        if !(sampling_rate > 0.0) {
            return Err(ConfigError::InvalidWindow(format!(
                "sampling rate {sampling_rate} must be positive"
            )));
        }
        Ok(Self {
            samples,
            sampling_rate,
            channels,
            label,
        })
    }

    /// Builds a window from per-timestep rows, as stored by the ETL layer.
    pub fn from_rows(
        rows: &[Vec<f64>],
        sampling_rate: f64,
        channels: Vec<String>,
        label: Option<String>,
    ) -> Result<Self, ConfigError> {
        let width = channels.len();
        if let Some(row) = rows.iter().find(|row| row.len() != width) {
            return Err(ConfigError::InvalidWindow(format!(
                "row of {} values for {} channels",
                row.len(),
                width
            )));
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let samples = Array2::from_shape_vec((rows.len(), width), flat)
            .map_err(|err| ConfigError::InvalidWindow(err.to_string()))?;
        Self::new(samples, sampling_rate, channels, label)
    }

    pub fn samples(&self) -> ArrayView2<'_, f64> {
        self.samples.view()
    }

    pub fn channel_vec(&self, index: usize) -> Vec<f64> {
        self.samples.column(index).to_vec()
    }

    pub fn len(&self) -> usize {
        self.samples.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.nrows() == 0
    }

    pub fn channel_count(&self) -> usize {
        self.samples.ncols()
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn value_range(&self) -> Option<(f64, f64)> {
        StatsHelper::range(self.samples.iter().copied())
    }
}

/// Shared y-axis range over a set of windows.
///
/// Raw-waveform figures within one prompt must use the same amplitude scale,
/// so callers compute this over the target and every example first.
pub fn shared_range<'a>(windows: impl IntoIterator<Item = &'a SensorWindow>) -> Option<(f64, f64)> {
    windows
        .into_iter()
        .filter_map(SensorWindow::value_range)
        .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)))
}

/// Static description of the task every window belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub channels: Vec<String>,
    pub sampling_rate: f64,
    pub classes: Vec<String>,
    pub task_description: String,
    pub data_description: String,
}

/// Formats names as a quoted, bracketed list, e.g. `['x', 'y']`.
pub fn quoted_list<S: AsRef<str>>(names: &[S]) -> String {
    let quoted: Vec<String> = names
        .iter()
        .map(|name| format!("'{}'", name.as_ref()))
        .collect();
    format!("[{}]", quoted.join(", "))
}
