use crate::math::fft::FftHelper;
use crate::math::stats::StatsHelper;
use std::f64::consts::PI;

/// Output kind of a spectrogram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpectrogramMode {
    #[default]
    Psd,
    Magnitude,
    /// Complex STFT values; rendered through their magnitude.
    Complex,
    Angle,
    Phase,
}

impl SpectrogramMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "psd" => Some(Self::Psd),
            "magnitude" => Some(Self::Magnitude),
            "complex" => Some(Self::Complex),
            "angle" => Some(Self::Angle),
            "phase" => Some(Self::Phase),
            _ => None,
        }
    }

    /// Whether values are power-like and shown on a decibel scale.
    pub fn is_power(self) -> bool {
        matches!(self, Self::Psd | Self::Magnitude | Self::Complex)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrogramParams {
    pub nfft: Option<usize>,
    pub nperseg: Option<usize>,
    pub noverlap: Option<usize>,
    pub mode: SpectrogramMode,
}

/// Short-time spectrum; `values[segment][frequency]`.
#[derive(Debug, Clone, Default)]
pub struct Spectrogram {
    pub times: Vec<f64>,
    pub frequencies: Vec<f64>,
    pub values: Vec<Vec<f64>>,
}

/// One-sided power spectral density as `(frequency, power)` pairs, DC excluded.
pub fn power_spectrum(signal: &[f64], sampling_rate: f64) -> Vec<(f64, f64)> {
    let n = signal.len();
    if n < 2 {
        return Vec::new();
    }
    let window = periodic_window(n, hann);
    let mean = StatsHelper::mean(signal);
    let tapered: Vec<f64> = signal
        .iter()
        .zip(&window)
        .map(|(value, w)| (value - mean) * w)
        .collect();
    let scale = 1.0 / (sampling_rate * window.iter().map(|w| w * w).sum::<f64>());
    let spectrum = FftHelper::new(n).forward_real(&tapered);

    (1..=n / 2)
        .map(|k| {
            let mut power = spectrum[k].norm_sqr() * scale;
            if !(n % 2 == 0 && k == n / 2) {
                power *= 2.0;
            }
            (k as f64 * sampling_rate / n as f64, power)
        })
        .collect()
}

pub fn spectrogram(signal: &[f64], sampling_rate: f64, params: &SpectrogramParams) -> Spectrogram {
    let len = signal.len();
    if len == 0 {
        return Spectrogram::default();
    }
    let nperseg = params.nperseg.unwrap_or(256).clamp(1, len);
    let noverlap = params
        .noverlap
        .unwrap_or(nperseg / 8)
        .min(nperseg.saturating_sub(1));
    let nfft = params.nfft.unwrap_or(nperseg).max(nperseg);
    let step = nperseg - noverlap;

    let window = periodic_window(nperseg, |i, n| tukey(i, n, 0.25));
    let window_sum: f64 = window.iter().sum();
    let density_scale = 1.0 / (sampling_rate * window.iter().map(|w| w * w).sum::<f64>());
    let fft = FftHelper::new(nfft);
    let bins = nfft / 2 + 1;

    let frequencies = (0..bins)
        .map(|k| k as f64 * sampling_rate / nfft as f64)
        .collect();
    let mut times = Vec::new();
    let mut values = Vec::new();

    let mut start = 0;
    while start + nperseg <= len {
        let segment = &signal[start..start + nperseg];
        let mean = StatsHelper::mean(segment);
        let tapered: Vec<f64> = segment
            .iter()
            .zip(&window)
            .map(|(value, w)| (value - mean) * w)
            .collect();
        let spectrum = fft.forward_real(&tapered);

        let mut column: Vec<f64> = (0..bins)
            .map(|k| match params.mode {
                SpectrogramMode::Psd => {
                    let doubled = k != 0 && !(nfft % 2 == 0 && k == nfft / 2);
                    let factor = if doubled { 2.0 } else { 1.0 };
                    spectrum[k].norm_sqr() * density_scale * factor
                }
                SpectrogramMode::Magnitude | SpectrogramMode::Complex => {
                    spectrum[k].norm() / window_sum
                }
                SpectrogramMode::Angle | SpectrogramMode::Phase => spectrum[k].arg(),
            })
            .collect();
        if params.mode == SpectrogramMode::Phase {
            unwrap_phase(&mut column);
        }

        times.push((start as f64 + nperseg as f64 / 2.0) / sampling_rate);
        values.push(column);
        start += step;
    }

    Spectrogram {
        times,
        frequencies,
        values,
    }
}

fn hann(i: usize, n: usize) -> f64 {
    0.5 - 0.5 * (2.0 * PI * i as f64 / (n - 1) as f64).cos()
}

fn tukey(i: usize, n: usize, alpha: f64) -> f64 {
    let width = alpha * (n - 1) as f64 / 2.0;
    let x = i as f64;
    let last = (n - 1) as f64;
    if width <= 0.0 {
        1.0
    } else if x < width {
        0.5 * (1.0 + (PI * (x / width - 1.0)).cos())
    } else if x > last - width {
        0.5 * (1.0 + (PI * ((x - last) / width + 1.0)).cos())
    } else {
        1.0
    }
}

/// Builds a periodic window of length `n` from a symmetric one of length `n + 1`.
fn periodic_window(n: usize, symmetric: impl Fn(usize, usize) -> f64) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n).map(|i| symmetric(i, n + 1)).collect()
}

fn unwrap_phase(values: &mut [f64]) {
    let Some(&first) = values.first() else {
        return;
    };
    let mut previous = first;
    let mut correction = 0.0;
    for value in values.iter_mut().skip(1) {
        let raw = *value;
        let delta = raw - previous;
        if delta.abs() >= PI {
            let wrapped = (delta + PI).rem_euclid(2.0 * PI) - PI;
            correction += wrapped - delta;
        }
        previous = raw;
        *value = raw + correction;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize, rate: f64, freq: f64) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / rate).sin())
            .collect()
    }

    #[test]
    fn psd_peaks_at_tone_frequency() {
        let spectrum = power_spectrum(&tone(200, 100.0, 10.0), 100.0);
        assert_eq!(spectrum.len(), 100);
        let (freq, _) = spectrum
            .iter()
            .copied()
            .fold((0.0, f64::MIN), |best, item| if item.1 > best.1 { item } else { best });
        assert!((freq - 10.0).abs() < 1e-9);
    }

    #[test]
    fn psd_of_short_signal_is_empty() {
        assert!(power_spectrum(&[1.0], 50.0).is_empty());
    }

    #[test]
    fn spectrogram_segments_follow_overlap() {
        let params = SpectrogramParams {
            nfft: Some(32),
            nperseg: Some(32),
            noverlap: Some(16),
            mode: SpectrogramMode::Magnitude,
        };
        let result = spectrogram(&tone(128, 64.0, 8.0), 64.0, &params);
        assert_eq!(result.values.len(), 7);
        assert_eq!(result.frequencies.len(), 17);
        assert!((result.times[0] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn spectrogram_clamps_segment_to_signal() {
        let result = spectrogram(&tone(50, 50.0, 5.0), 50.0, &SpectrogramParams::default());
        assert_eq!(result.values.len(), 1);
    }

    #[test]
    fn mode_names_parse() {
        assert_eq!(SpectrogramMode::from_name("Magnitude"), Some(SpectrogramMode::Magnitude));
        assert_eq!(SpectrogramMode::from_name("bogus"), None);
    }
}
