use num_complex::Complex64;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::sync::Arc;

/// Helper that wraps a planned forward/inverse `rustfft` pair of one length.
pub struct FftHelper {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    size: usize,
}

impl FftHelper {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        Self {
            forward,
            inverse,
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Transforms a real sequence, zero-padding or truncating it to the planned size.
    pub fn forward_real(&self, input: &[f64]) -> Vec<Complex64> {
        let mut buffer: Vec<Complex64> = input
            .iter()
            .take(self.size)
            .map(|&value| Complex64::new(value, 0.0))
            .collect();
        buffer.resize(self.size, Complex64::zero());
        self.forward.process(&mut buffer);
        buffer
    }

    /// Unnormalized inverse transform; callers divide by the length themselves.
    pub fn inverse(&self, spectrum: &mut [Complex64]) {
        self.inverse.process(spectrum);
    }
}
