//! ECG cleaning, R-peak detection, heart rate and beat segmentation.

use crate::math::filter::{boxcar_smooth, gradient, ZeroPhaseFilter};
use crate::math::stats::StatsHelper;

const HIGHPASS_HZ: f64 = 0.5;
const POWERLINE_HZ: f64 = 50.0;
const SMOOTH_WINDOW_S: f64 = 0.1;
const AVERAGE_WINDOW_S: f64 = 0.75;
const GRADIENT_THRESHOLD_WEIGHT: f64 = 1.5;
const MIN_QRS_LENGTH_WEIGHT: f64 = 0.4;
const MIN_PEAK_DELAY_S: f64 = 0.3;

/// Result of running the ECG pipeline over one channel.
#[derive(Debug, Clone)]
pub struct EcgSignals {
    pub raw: Vec<f64>,
    pub clean: Vec<f64>,
    /// Heart rate in beats per minute, one value per sample.
    pub rate: Vec<f64>,
    pub r_peaks: Vec<usize>,
    pub sampling_rate: f64,
}

impl EcgSignals {
    pub fn mean_rate(&self) -> f64 {
        StatsHelper::mean(&self.rate)
    }
}

pub fn ecg_process(signal: &[f64], sampling_rate: f64) -> EcgSignals {
    let clean = ecg_clean(signal, sampling_rate);
    let r_peaks = find_r_peaks(&clean, sampling_rate);
    let rate = heart_rate(&r_peaks, sampling_rate, clean.len());
    EcgSignals {
        raw: signal.to_vec(),
        clean,
        rate,
        r_peaks,
        sampling_rate,
    }
}

/// Removes baseline wander and, at rates of 100 Hz and above, powerline noise.
fn ecg_clean(signal: &[f64], sampling_rate: f64) -> Vec<f64> {
    let filtered = ZeroPhaseFilter::highpass(sampling_rate, HIGHPASS_HZ, 2).apply(signal);
    if sampling_rate < 100.0 {
        return filtered;
    }
    let width = (sampling_rate / POWERLINE_HZ) as usize;
    let forward = boxcar_smooth(&filtered, width);
    boxcar_smooth(&forward, width)
}

/// Locates R-peaks as the tallest point inside each steep-gradient QRS region.
fn find_r_peaks(clean: &[f64], sampling_rate: f64) -> Vec<usize> {
    if clean.len() < 3 {
        return Vec::new();
    }
    let abs_gradient: Vec<f64> = gradient(clean).into_iter().map(f64::abs).collect();
    let smooth = boxcar_smooth(&abs_gradient, seconds_to_samples(SMOOTH_WINDOW_S, sampling_rate));
    let average = boxcar_smooth(&smooth, seconds_to_samples(AVERAGE_WINDOW_S, sampling_rate));
    let qrs: Vec<bool> = smooth
        .iter()
        .zip(&average)
        .map(|(s, a)| *s > GRADIENT_THRESHOLD_WEIGHT * a)
        .collect();

    let starts: Vec<usize> = (0..qrs.len() - 1)
        .filter(|&i| !qrs[i] && qrs[i + 1])
        .collect();
    let Some(&first_start) = starts.first() else {
        return Vec::new();
    };
    let ends: Vec<usize> = (0..qrs.len() - 1)
        .filter(|&i| qrs[i] && !qrs[i + 1] && i > first_start)
        .collect();
    let count = starts.len().min(ends.len());
    if count == 0 {
        return Vec::new();
    }

    let mean_length = starts
        .iter()
        .zip(&ends)
        .take(count)
        .map(|(s, e)| e.saturating_sub(*s) as f64)
        .sum::<f64>()
        / count as f64;
    let min_length = mean_length * MIN_QRS_LENGTH_WEIGHT;
    let min_delay = seconds_to_samples(MIN_PEAK_DELAY_S, sampling_rate);

    let mut peaks = Vec::new();
    let mut last = 0usize;
    for (&start, &end) in starts.iter().zip(&ends).take(count) {
        if end <= start || ((end - start) as f64) < min_length {
            continue;
        }
        let Some(offset) = tallest_local_maximum(&clean[start..end]) else {
            continue;
        };
        let peak = start + offset;
        if peak > last + min_delay {
            peaks.push(peak);
            last = peak;
        }
    }
    peaks
}

fn tallest_local_maximum(segment: &[f64]) -> Option<usize> {
    (1..segment.len().saturating_sub(1))
        .filter(|&i| segment[i] > segment[i - 1] && segment[i] >= segment[i + 1])
        .max_by(|&a, &b| segment[a].total_cmp(&segment[b]))
}

/// Per-sample heart rate interpolated linearly between R-peaks.
///
/// The first beat has no preceding interval and takes the mean of the others.
/// Fewer than two peaks yields an all-NaN curve.
pub fn heart_rate(peaks: &[usize], sampling_rate: f64, length: usize) -> Vec<f64> {
    if peaks.len() < 2 {
        return vec![f64::NAN; length];
    }
    let mut periods: Vec<f64> = peaks
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) as f64 / sampling_rate)
        .collect();
    let first = StatsHelper::mean(&periods);
    periods.insert(0, first);
    let rates: Vec<f64> = periods.iter().map(|period| 60.0 / period).collect();

    let mut segment = 0;
    (0..length)
        .map(|i| {
            if i <= peaks[0] {
                return rates[0];
            }
            while segment + 1 < peaks.len() && peaks[segment + 1] < i {
                segment += 1;
            }
            if segment + 1 >= peaks.len() {
                return rates[rates.len() - 1];
            }
            let (x0, x1) = (peaks[segment] as f64, peaks[segment + 1] as f64);
            let t = (i as f64 - x0) / (x1 - x0);
            rates[segment] + t * (rates[segment + 1] - rates[segment])
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveKind {
    P,
    Q,
    S,
    T,
}

impl WaveKind {
    pub const ALL: [WaveKind; 4] = [WaveKind::P, WaveKind::Q, WaveKind::S, WaveKind::T];

    pub fn label(self) -> &'static str {
        match self {
            WaveKind::P => "P-waves",
            WaveKind::Q => "Q-waves",
            WaveKind::S => "S-waves",
            WaveKind::T => "T-waves",
        }
    }
}

/// `(time offset from the R-peak in seconds, amplitude)` points of one wave type.
#[derive(Debug, Clone)]
pub struct WaveMarks {
    pub kind: WaveKind,
    pub points: Vec<(f64, f64)>,
}

/// Beats aligned on their R-peaks.
#[derive(Debug, Clone, Default)]
pub struct Heartbeats {
    /// Relative time of each epoch sample, in seconds.
    pub offsets: Vec<f64>,
    /// One row per beat; `None` where the epoch runs past the signal.
    pub epochs: Vec<Vec<Option<f64>>>,
    /// Mean amplitude across beats at each offset.
    pub average: Vec<f64>,
    pub waves: Vec<WaveMarks>,
}

/// Epoch window around an R-peak, scaled by heart rate.
fn epoch_window(mean_rate: f64) -> (f64, f64) {
    let rate = if mean_rate.is_finite() && mean_rate > 0.0 {
        mean_rate
    } else {
        60.0
    };
    let modulator = rate / 60.0;
    let (mut start, mut end) = (-0.35 / modulator, 0.5 / modulator);
    if rate >= 80.0 {
        start -= 0.1;
        end += 0.1;
    }
    (start, end)
}

pub fn segment_heartbeats(ecg: &EcgSignals) -> Heartbeats {
    if ecg.r_peaks.is_empty() {
        return Heartbeats::default();
    }
    let sr = ecg.sampling_rate;
    let (start, end) = epoch_window(ecg.mean_rate());
    let first = (start * sr).round() as i64;
    let last = (end * sr).round() as i64;
    let offsets: Vec<f64> = (first..=last).map(|k| k as f64 / sr).collect();

    let epochs: Vec<Vec<Option<f64>>> = ecg
        .r_peaks
        .iter()
        .map(|&peak| {
            (first..=last)
                .map(|k| sample_at(&ecg.clean, peak as i64 + k))
                .collect()
        })
        .collect();

    let average = (0..offsets.len())
        .map(|j| {
            let column: Vec<f64> = epochs.iter().filter_map(|epoch| epoch[j]).collect();
            StatsHelper::mean(&column)
        })
        .collect();

    let waves = WaveKind::ALL
        .iter()
        .map(|&kind| WaveMarks {
            kind,
            points: ecg
                .r_peaks
                .iter()
                .filter_map(|&peak| locate_wave(&ecg.clean, peak, sr, kind))
                .filter(|(_, value)| !value.is_nan())
                .collect(),
        })
        .collect();

    Heartbeats {
        offsets,
        epochs,
        average,
        waves,
    }
}

fn sample_at(signal: &[f64], index: i64) -> Option<f64> {
    usize::try_from(index)
        .ok()
        .and_then(|i| signal.get(i))
        .copied()
}

/// Finds one wave around an R-peak; `None` when its search window leaves the signal.
fn locate_wave(clean: &[f64], peak: usize, sr: f64, kind: WaveKind) -> Option<(f64, f64)> {
    let q_span = seconds_to_samples(0.1, sr);
    let index = match kind {
        WaveKind::Q => extremum(clean, peak.checked_sub(q_span)?, peak, false)?,
        WaveKind::S => extremum(clean, peak + 1, peak + q_span + 1, false)?,
        WaveKind::P => {
            let q = extremum(clean, peak.checked_sub(q_span)?, peak, false)?;
            let span = seconds_to_samples(0.25, sr);
            extremum(clean, q.checked_sub(span)?, q, true)?
        }
        WaveKind::T => {
            let s = extremum(clean, peak + 1, peak + q_span + 1, false)?;
            let span = seconds_to_samples(0.4, sr);
            extremum(clean, s + 1, s + span + 1, true)?
        }
    };
    let offset = (index as f64 - peak as f64) / sr;
    Some((offset, clean[index]))
}

fn extremum(signal: &[f64], start: usize, end: usize, maximum: bool) -> Option<usize> {
    if start >= end || end > signal.len() {
        return None;
    }
    let range = start..end;
    if maximum {
        range.max_by(|&a, &b| signal[a].total_cmp(&signal[b]))
    } else {
        range.min_by(|&a, &b| signal[a].total_cmp(&signal[b]))
    }
}

pub(crate) fn seconds_to_samples(seconds: f64, sampling_rate: f64) -> usize {
    (seconds * sampling_rate).round().max(1.0) as usize
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Synthetic ECG: narrow Gaussian R waves on a small baseline, plus P/T bumps.
    pub(crate) fn synthetic_ecg(seconds: f64, rate: f64, bpm: f64) -> Vec<f64> {
        let len = (seconds * rate) as usize;
        let period = 60.0 / bpm;
        (0..len)
            .map(|i| {
                let t = i as f64 / rate;
                let phase = t % period - period / 2.0;
                let r = (-(phase * phase) / (2.0 * 0.01f64.powi(2))).exp();
                let p = 0.15 * (-((phase + 0.18).powi(2)) / (2.0 * 0.025f64.powi(2))).exp();
                let tw = 0.3 * (-((phase - 0.25).powi(2)) / (2.0 * 0.04f64.powi(2))).exp();
                r + p + tw
            })
            .collect()
    }

    #[test]
    fn detects_one_peak_per_beat() {
        let rate = 250.0;
        let signal = synthetic_ecg(10.0, rate, 60.0);
        let ecg = ecg_process(&signal, rate);
        assert!((9..=10).contains(&ecg.r_peaks.len()), "{:?}", ecg.r_peaks);
        let mean = ecg.mean_rate();
        assert!((mean - 60.0).abs() < 3.0, "mean rate {mean}");
    }

    #[test]
    fn heart_rate_interpolates_between_peaks() {
        let rate = heart_rate(&[10, 20, 40], 10.0, 50);
        assert_eq!(rate.len(), 50);
        assert_eq!(rate[0], rate[10]);
        assert!((rate[20] - 60.0).abs() < 1e-9);
        assert!((rate[40] - 30.0).abs() < 1e-9);
        assert!((rate[30] - 45.0).abs() < 1e-9);
        assert_eq!(rate[49], rate[40]);
    }

    #[test]
    fn heart_rate_without_beats_is_nan() {
        assert!(heart_rate(&[5], 100.0, 10).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn heartbeats_average_over_aligned_epochs() {
        let rate = 200.0;
        let signal = synthetic_ecg(8.0, rate, 75.0);
        let ecg = ecg_process(&signal, rate);
        let beats = segment_heartbeats(&ecg);
        assert_eq!(beats.epochs.len(), ecg.r_peaks.len());
        assert_eq!(beats.average.len(), beats.offsets.len());
        let zero = beats
            .offsets
            .iter()
            .position(|t| t.abs() < 1e-12)
            .unwrap();
        let peak = beats.average[zero];
        assert!(beats.average.iter().all(|v| v.is_nan() || *v <= peak + 1e-9));
        for wave in &beats.waves {
            assert!(wave.points.iter().all(|(t, v)| t.is_finite() && v.is_finite()));
        }
        let q = beats.waves.iter().find(|w| w.kind == WaveKind::Q).unwrap();
        assert!(q.points.iter().all(|(t, _)| *t < 0.0));
    }

    #[test]
    fn flat_signal_has_no_beats() {
        let ecg = ecg_process(&vec![0.0; 500], 100.0);
        assert!(ecg.r_peaks.is_empty());
        assert!(segment_heartbeats(&ecg).average.is_empty());
    }
}
