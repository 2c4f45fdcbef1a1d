//! IIR filters and smoothing kernels used by the biosignal pipelines.

use std::f64::consts::{PI, SQRT_2};

/// Second-order section coefficients, `a[0]` normalized to one.
#[derive(Clone, Debug)]
pub struct BiquadCoeffs {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

/// Butterworth biquad with direct-form II transposed state.
#[derive(Clone, Debug)]
pub struct Biquad {
    coeffs: BiquadCoeffs,
    state: [f64; 2],
}

impl Biquad {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            state: [0.0, 0.0],
        }
    }

    pub fn lowpass(sample_rate: f64, cutoff: f64) -> Self {
        let k = (PI * clamp_cutoff(sample_rate, cutoff) / sample_rate).tan();
        let k2 = k * k;
        let norm = 1.0 / (1.0 + SQRT_2 * k + k2);
        Self::new(BiquadCoeffs {
            b: [k2 * norm, 2.0 * k2 * norm, k2 * norm],
            a: [1.0, 2.0 * (k2 - 1.0) * norm, (1.0 - SQRT_2 * k + k2) * norm],
        })
    }

    pub fn highpass(sample_rate: f64, cutoff: f64) -> Self {
        let k = (PI * clamp_cutoff(sample_rate, cutoff) / sample_rate).tan();
        let k2 = k * k;
        let norm = 1.0 / (1.0 + SQRT_2 * k + k2);
        Self::new(BiquadCoeffs {
            b: [norm, -2.0 * norm, norm],
            a: [1.0, 2.0 * (k2 - 1.0) * norm, (1.0 - SQRT_2 * k + k2) * norm],
        })
    }

    pub fn filter(&mut self, input: f64) -> f64 {
        let [b0, b1, b2] = self.coeffs.b;
        let [_, a1, a2] = self.coeffs.a;
        let output = b0 * input + self.state[0];
        self.state[0] = b1 * input - a1 * output + self.state[1];
        self.state[1] = b2 * input - a2 * output;
        output
    }

    /// Primes the state as if `value` had been applied forever.
    fn settle(&mut self, value: f64) {
        let [b0, b1, b2] = self.coeffs.b;
        let [_, a1, a2] = self.coeffs.a;
        let gain = (b0 + b1 + b2) / (1.0 + a1 + a2);
        let output = gain * value;
        self.state[1] = b2 * value - a2 * output;
        self.state[0] = b1 * value - a1 * output + self.state[1];
    }

    pub fn reset(&mut self) {
        self.state = [0.0, 0.0];
    }
}

fn clamp_cutoff(sample_rate: f64, cutoff: f64) -> f64 {
    cutoff.clamp(1e-6, 0.45 * sample_rate)
}

/// Cascade of biquads applied forward then backward for zero phase shift.
#[derive(Clone, Debug)]
pub struct ZeroPhaseFilter {
    sections: Vec<Biquad>,
}

impl ZeroPhaseFilter {
    pub fn new(sections: Vec<Biquad>) -> Self {
        Self { sections }
    }

    pub fn highpass(sample_rate: f64, cutoff: f64, sections: usize) -> Self {
        Self::new(vec![Biquad::highpass(sample_rate, cutoff); sections.max(1)])
    }

    pub fn lowpass(sample_rate: f64, cutoff: f64, sections: usize) -> Self {
        Self::new(vec![Biquad::lowpass(sample_rate, cutoff); sections.max(1)])
    }

    pub fn bandpass(sample_rate: f64, low: f64, high: f64, sections: usize) -> Self {
        let count = sections.max(1);
        let mut chain = vec![Biquad::highpass(sample_rate, low); count];
        chain.extend(vec![Biquad::lowpass(sample_rate, high); count]);
        Self::new(chain)
    }

    pub fn apply(&self, signal: &[f64]) -> Vec<f64> {
        if signal.is_empty() {
            return Vec::new();
        }
        let forward = self.run(signal.iter().copied());
        let mut backward = self.run(forward.into_iter().rev());
        backward.reverse();
        backward
    }

    fn run(&self, samples: impl Iterator<Item = f64>) -> Vec<f64> {
        let mut sections = self.sections.clone();
        let mut samples = samples.peekable();
        let first = samples.peek().copied().unwrap_or(0.0);
        let mut primed = first;
        for section in &mut sections {
            section.reset();
            section.settle(primed);
            let [b0, b1, b2] = section.coeffs.b;
            let [_, a1, a2] = section.coeffs.a;
            primed *= (b0 + b1 + b2) / (1.0 + a1 + a2);
        }
        samples
            .map(|sample| {
                sections
                    .iter_mut()
                    .fold(sample, |value, section| section.filter(value))
            })
            .collect()
    }
}

/// Centered moving average; the window shrinks at the edges.
pub fn boxcar_smooth(signal: &[f64], size: usize) -> Vec<f64> {
    let size = size.max(1);
    if size == 1 || signal.is_empty() {
        return signal.to_vec();
    }
    let before = size / 2;
    let after = size - before - 1;
    let mut prefix = Vec::with_capacity(signal.len() + 1);
    prefix.push(0.0);
    for value in signal {
        let last = prefix.last().copied().unwrap_or(0.0);
        prefix.push(last + value);
    }
    (0..signal.len())
        .map(|i| {
            let start = i.saturating_sub(before);
            let end = (i + after + 1).min(signal.len());
            (prefix[end] - prefix[start]) / (end - start) as f64
        })
        .collect()
}

/// Central-difference gradient with one-sided differences at the ends.
pub fn gradient(signal: &[f64]) -> Vec<f64> {
    let len = signal.len();
    if len < 2 {
        return vec![0.0; len];
    }
    (0..len)
        .map(|i| match i {
            0 => signal[1] - signal[0],
            i if i == len - 1 => signal[i] - signal[i - 1],
            i => (signal[i + 1] - signal[i - 1]) / 2.0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highpass_removes_constant_offset() {
        let filter = ZeroPhaseFilter::highpass(100.0, 0.5, 2);
        let output = filter.apply(&vec![3.0; 400]);
        assert!(output.iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn lowpass_keeps_constant_level() {
        let filter = ZeroPhaseFilter::lowpass(100.0, 5.0, 2);
        let output = filter.apply(&vec![1.5; 200]);
        assert!(output.iter().all(|v| (v - 1.5).abs() < 1e-6));
    }

    #[test]
    fn lowpass_attenuates_fast_oscillation() {
        let signal: Vec<f64> = (0..500)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let output = ZeroPhaseFilter::lowpass(100.0, 5.0, 2).apply(&signal);
        let peak = output[100..400].iter().fold(0.0f64, |m, v| m.max(v.abs()));
        assert!(peak < 0.05);
    }

    #[test]
    fn boxcar_smooth_averages_neighbors() {
        let output = boxcar_smooth(&[0.0, 3.0, 6.0, 9.0], 3);
        assert_eq!(output, vec![1.5, 3.0, 6.0, 7.5]);
    }

    #[test]
    fn gradient_uses_central_differences() {
        assert_eq!(gradient(&[0.0, 1.0, 4.0, 9.0]), vec![1.0, 2.0, 4.0, 5.0]);
    }
}
