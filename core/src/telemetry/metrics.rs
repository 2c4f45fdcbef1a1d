use crate::interface::TokenBudget;
use std::sync::Mutex;

pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    pub solved: usize,
    pub failed: usize,
    pub text_tokens: usize,
    pub image_tokens: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    pub fn record_solved(&self, budget: TokenBudget) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.solved += 1;
            metrics.text_tokens += budget.text_tokens;
            metrics.image_tokens += budget.image_tokens;
        }
    }

    pub fn record_failed(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.failed += 1;
        }
    }

    pub fn snapshot(&self) -> Metrics {
        self.inner.lock().map(|metrics| *metrics).unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_accumulate() {
        let recorder = MetricsRecorder::new();
        recorder.record_solved(TokenBudget { text_tokens: 10, image_tokens: 255 });
        recorder.record_solved(TokenBudget { text_tokens: 5, image_tokens: 0 });
        recorder.record_failed();
        assert_eq!(
            recorder.snapshot(),
            Metrics { solved: 2, failed: 1, text_tokens: 15, image_tokens: 255 }
        );
    }
}
