use crate::math::fft::FftHelper;
use ndarray::{Array2, ArrayView2, Axis};
use num_complex::Complex64;
use rustfft::num_traits::Zero;

/// Output length when moving `len` samples from `source_rate` to `target_rate`.
pub fn resampled_len(len: usize, source_rate: f64, target_rate: f64) -> usize {
    if source_rate == target_rate || source_rate <= 0.0 {
        return len;
    }
    (len as f64 * target_rate / source_rate).round() as usize
}

/// Frequency-domain resampling of a whole sequence to `num` points.
///
/// The spectrum is truncated or zero-padded around the Nyquist bin, which is
/// split on upsampling and folded on downsampling, then transformed back and
/// rescaled so amplitudes are preserved.
pub fn resample(signal: &[f64], num: usize) -> Vec<f64> {
    let nx = signal.len();
    if nx == 0 {
        return vec![0.0; num];
    }
    if num == nx {
        return signal.to_vec();
    }
    if num == 0 {
        return Vec::new();
    }

    let spectrum = FftHelper::new(nx).forward_real(signal);
    let mut resized = vec![Complex64::zero(); num];

    let n = num.min(nx);
    let nyq = n / 2 + 1;
    resized[..nyq].copy_from_slice(&spectrum[..nyq]);
    if n > 2 {
        let negative = n - nyq;
        resized[num - negative..].copy_from_slice(&spectrum[nx - negative..]);
    }

    if n % 2 == 0 {
        let half = n / 2;
        if num < nx {
            resized[num - half] += spectrum[nx - half];
        } else {
            resized[half] *= 0.5;
            resized[num - half] = resized[half];
        }
    }

    FftHelper::new(num).inverse(&mut resized);
    let scale = 1.0 / nx as f64;
    resized.iter().map(|value| value.re * scale).collect()
}

/// Resamples every column of a `[time][channel]` matrix independently.
pub fn resample_columns(samples: ArrayView2<f64>, num: usize) -> Array2<f64> {
    let channels = samples.ncols();
    let mut output = Array2::<f64>::zeros((num, channels));
    for (index, column) in samples.axis_iter(Axis(1)).enumerate() {
        let resampled = resample(&column.to_vec(), num);
        for (row, value) in resampled.into_iter().enumerate() {
            output[[row, index]] = value;
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(len: usize, cycles: f64) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * std::f64::consts::PI * cycles * i as f64 / len as f64).sin())
            .collect()
    }

    #[test]
    fn equal_rates_keep_length() {
        assert_eq!(resampled_len(100, 50.0, 50.0), 100);
    }

    #[test]
    fn lengths_follow_rounded_ratio() {
        assert_eq!(resampled_len(100, 100.0, 50.0), 50);
        assert_eq!(resampled_len(100, 50.0, 100.0), 200);
        assert_eq!(resampled_len(101, 100.0, 30.0), 30);
        assert_eq!(resampled_len(55, 100.0, 30.0), 17);
        assert_eq!(resampled_len(35, 100.0, 30.0), 11);
    }

    #[test]
    fn resample_produces_requested_points() {
        let signal = sine(100, 3.0);
        for num in [50, 200, 30, 17] {
            assert_eq!(resample(&signal, num).len(), num);
        }
    }

    #[test]
    fn constant_signal_survives_resampling() {
        let signal = vec![2.5; 40];
        for value in resample(&signal, 25) {
            assert!((value - 2.5).abs() < 1e-9);
        }
        for value in resample(&signal, 64) {
            assert!((value - 2.5).abs() < 1e-9);
        }
    }

    #[test]
    fn band_limited_sine_upsamples_exactly() {
        let signal = sine(64, 4.0);
        let upsampled = resample(&signal, 128);
        let expected = sine(128, 4.0);
        for (value, reference) in upsampled.iter().zip(expected) {
            assert!((value - reference).abs() < 1e-9);
        }
    }

    #[test]
    fn column_resampling_keeps_channel_count() {
        let samples = Array2::from_shape_fn((20, 3), |(t, c)| (t + c) as f64);
        let output = resample_columns(samples.view(), 6);
        assert_eq!(output.dim(), (6, 3));
    }
}
