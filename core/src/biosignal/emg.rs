use crate::math::filter::ZeroPhaseFilter;
use crate::math::stats::StatsHelper;

const HIGHPASS_HZ: f64 = 100.0;
const ENVELOPE_BAND_HZ: (f64, f64) = (10.0, 400.0);
const ENVELOPE_LOWPASS_HZ: f64 = 8.0;

#[derive(Debug, Clone)]
pub struct EmgSignals {
    pub clean: Vec<f64>,
    /// Linear envelope of muscle activation, never negative.
    pub amplitude: Vec<f64>,
}

pub fn emg_process(signal: &[f64], sampling_rate: f64) -> EmgSignals {
    let clean = emg_clean(signal, sampling_rate);
    let amplitude = emg_amplitude(&clean, sampling_rate);
    EmgSignals { clean, amplitude }
}

/// High-pass at 100 Hz (or just under Nyquist for slower recordings), then mean removal.
fn emg_clean(signal: &[f64], sampling_rate: f64) -> Vec<f64> {
    let cutoff = HIGHPASS_HZ.min(0.45 * sampling_rate);
    let filtered = ZeroPhaseFilter::highpass(sampling_rate, cutoff, 2).apply(signal);
    let mean = StatsHelper::mean(&filtered);
    filtered.into_iter().map(|v| v - mean).collect()
}

/// Teager-Kaiser energy, band-passed, rectified and low-passed into an envelope.
fn emg_amplitude(clean: &[f64], sampling_rate: f64) -> Vec<f64> {
    let energy = teager_kaiser(clean);
    let nyquist_guard = 0.45 * sampling_rate;
    let low = ENVELOPE_BAND_HZ.0.min(nyquist_guard / 2.0);
    let high = ENVELOPE_BAND_HZ.1.min(nyquist_guard);
    let band = ZeroPhaseFilter::bandpass(sampling_rate, low, high, 2).apply(&energy);
    let rectified: Vec<f64> = band.into_iter().map(f64::abs).collect();
    ZeroPhaseFilter::lowpass(sampling_rate, ENVELOPE_LOWPASS_HZ, 2)
        .apply(&rectified)
        .into_iter()
        .map(|v| v.max(0.0))
        .collect()
}

fn teager_kaiser(signal: &[f64]) -> Vec<f64> {
    let len = signal.len();
    if len < 3 {
        return signal.iter().map(|v| v * v).collect();
    }
    let mut energy = vec![0.0; len];
    for i in 1..len - 1 {
        energy[i] = signal[i] * signal[i] - signal[i - 1] * signal[i + 1];
    }
    energy[0] = energy[1];
    energy[len - 1] = energy[len - 2];
    energy
}
