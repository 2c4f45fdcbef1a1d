use crate::biosignal::{EcgSignals, Heartbeats};
use crate::encoding::signals::StyleSignals;
use crate::encoding::style::EncodingStyle;
use crate::interface::{quoted_list, SensorWindow, TaskMetadata};
use crate::math::resample::{resample, resample_columns, resampled_len};
use crate::math::stats::StatsHelper;
use ndarray::Array2;

/// Renders windows as plain text in one fixed style.
///
/// Unset and reserved styles render as the raw waveform, as does the
/// spectrogram, which has no textual form.
#[derive(Debug, Clone)]
pub struct TextEncoder {
    channels: Vec<String>,
    sampling_rate: f64,
    style: Option<EncodingStyle>,
    rounding_points: u32,
    text_sampling_rate: f64,
}

impl TextEncoder {
    pub fn new(
        channels: Vec<String>,
        sampling_rate: f64,
        style: Option<EncodingStyle>,
        rounding_points: u32,
        text_sampling_rate: f64,
    ) -> Self {
        Self {
            channels,
            sampling_rate,
            style,
            rounding_points,
            text_sampling_rate,
        }
    }

    pub fn for_task(
        metadata: &TaskMetadata,
        style: Option<EncodingStyle>,
        rounding_points: u32,
        text_sampling_rate: f64,
    ) -> Self {
        Self::new(
            metadata.channels.clone(),
            metadata.sampling_rate,
            style,
            rounding_points,
            text_sampling_rate,
        )
    }

    pub fn encode_text(&self, window: &SensorWindow, label: Option<&str>) -> String {
        let mut text = String::new();
        if let Some(label) = label {
            text.push_str(&format!("*Example of {}*:\n", label));
        }
        let signals = self
            .style
            .and_then(|style| StyleSignals::derive(style, window, self.sampling_rate));
        let body = match signals {
            Some(StyleSignals::PowerSpectrum(spectra)) => self.psd(window, &spectra),
            Some(StyleSignals::EcgSignal(ecg)) => {
                format!("Cleaned ECG signal: {}", self.values(&self.resample_signal(&ecg.clean)))
            }
            Some(StyleSignals::EcgHeartRate(ecg)) => self.ecg_heart_rate(&ecg),
            Some(StyleSignals::EcgHeartbeats(_, beats)) => self.ecg_heartbeats(&beats),
            Some(StyleSignals::EmgSignal(emg)) => format!(
                "Cleaned EMG signal (list of {}): {}",
                quoted_list(&self.channels),
                self.stacked(emg.iter().map(|channel| &channel.clean))
            ),
            Some(StyleSignals::EmgActivation(emg)) => format!(
                "EMG muscle activation (list of {}): {}",
                quoted_list(&self.channels),
                self.stacked(emg.iter().map(|channel| &channel.amplitude))
            ),
            _ => self.raw_waveform(window),
        };
        text.push_str(&body);
        text
    }

    fn needs_resampling(&self) -> bool {
        self.sampling_rate != self.text_sampling_rate
    }

    fn resample_signal(&self, signal: &[f64]) -> Vec<f64> {
        if !self.needs_resampling() {
            return signal.to_vec();
        }
        let len = resampled_len(signal.len(), self.sampling_rate, self.text_sampling_rate);
        resample(signal, len)
    }

    fn value(&self, value: f64) -> String {
        StatsHelper::format_value(value, self.rounding_points)
    }

    fn values<'a>(&self, values: impl IntoIterator<Item = &'a f64>) -> String {
        let rendered: Vec<String> = values.into_iter().map(|v| self.value(*v)).collect();
        format!("[{}]", rendered.join(", "))
    }

    /// One bracketed sub-list per timestep.
    fn timesteps(&self, samples: &Array2<f64>) -> String {
        let rows: Vec<String> = samples.rows().into_iter().map(|row| self.values(row)).collect();
        format!("[{}]", rows.join(", "))
    }

    fn raw_waveform(&self, window: &SensorWindow) -> String {
        let mut text = format!("Given sensor data (list of {}): ", quoted_list(&self.channels));
        let samples = if self.needs_resampling() {
            let len = resampled_len(window.len(), self.sampling_rate, self.text_sampling_rate);
            resample_columns(window.samples(), len)
        } else {
            window.samples().to_owned()
        };
        if samples.ncols() == 1 {
            text.push_str(&self.values(samples.column(0)));
        } else {
            text.push_str(&self.timesteps(&samples));
        }
        text
    }

    fn psd(&self, window: &SensorWindow, spectra: &[Vec<(f64, f64)>]) -> String {
        let text = "Given sensor data PSD (list of (frequency, density) by channels): ";
        let channels: Vec<String> = spectra
            .iter()
            .enumerate()
            .map(|(index, spectrum)| {
                let pairs: Vec<String> = spectrum
                    .iter()
                    .map(|(freq, power)| format!("({}, {})", self.value(*freq), self.value(*power)))
                    .collect();
                format!("{}: [{}]", self.channel_name(window, index), pairs.join(", "))
            })
            .collect();
        format!("{}[{}]", text, channels.join(", "))
    }

    fn ecg_heart_rate(&self, ecg: &EcgSignals) -> String {
        let peaks: Vec<String> = ecg.r_peaks.iter().map(|peak| peak.to_string()).collect();
        format!(
            "Heart rate in the ECG signal (mean value {}): {}\nR-peaks in the ECG signal (list of the index): [{}]",
            self.value(ecg.mean_rate()),
            self.values(&ecg.rate),
            peaks.join(", ")
        )
    }

    fn ecg_heartbeats(&self, beats: &Heartbeats) -> String {
        let mut text = format!(
            "Average heartbeat in the ECG signal (list of {}): {}\n",
            quoted_list(&self.channels),
            self.values(&beats.average)
        );
        for wave in &beats.waves {
            let points: Vec<String> = wave
                .points
                .iter()
                .map(|(offset, value)| format!("({}, {})", self.value(*offset), self.value(*value)))
                .collect();
            text.push_str(&format!(
                "{} in the ECG signal (list of (time offset, value)): [{}]\n",
                wave.kind.label(),
                points.join(", ")
            ));
        }
        text
    }

    /// Resamples each channel's series independently, then stacks them as columns.
    fn stacked<'s>(&self, series: impl Iterator<Item = &'s Vec<f64>>) -> String {
        let columns: Vec<Vec<f64>> = series.map(|signal| self.resample_signal(signal)).collect();
        let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
        self.timesteps(&Array2::from_shape_fn((rows, columns.len()), |(row, col)| columns[col][row]))
    }

    fn channel_name<'a>(&'a self, window: &'a SensorWindow, index: usize) -> &'a str {
        self.channels
            .get(index)
            .or_else(|| window.channels().get(index))
            .map(String::as_str)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biosignal::ecg::tests::synthetic_ecg;
    use std::f64::consts::PI;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn imu_window(len: usize, rate: f64) -> SensorWindow {
        let rows: Vec<Vec<f64>> = (0..len)
            .map(|i| {
                let t = i as f64 / rate;
                vec![
                    (2.0 * PI * t).sin() * 1.23456,
                    (2.0 * PI * 3.0 * t).cos() / 3.0,
                    t * 0.0101 - 0.5,
                ]
            })
            .collect();
        SensorWindow::from_rows(&rows, rate, names(&["x", "y", "z"]), Some("walking".into()))
            .unwrap()
    }

    fn decimals(literal: &str) -> usize {
        literal.split('.').nth(1).map(str::len).unwrap_or(0)
    }

    fn numeric_literals(text: &str) -> Vec<String> {
        text.split(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
            .filter(|token| token.chars().any(|c| c.is_ascii_digit()))
            .map(str::to_string)
            .collect()
    }

    fn body(text: &str) -> &str {
        text.split_once(": ").map(|(_, rest)| rest).unwrap_or(text)
    }

    #[test]
    fn three_channel_window_renders_one_triple_per_timestep() {
        let window = imu_window(100, 50.0);
        let encoder = TextEncoder::new(
            names(&["x", "y", "z"]),
            50.0,
            Some(EncodingStyle::RawWaveform),
            2,
            50.0,
        );
        let text = encoder.encode_text(&window, None);
        assert!(text.starts_with("Given sensor data (list of ['x', 'y', 'z']): [["));
        let inner = body(&text);
        let triples: Vec<&str> = inner[1..inner.len() - 1].split("], [").collect();
        assert_eq!(triples.len(), 100);
        for triple in triples {
            let values: Vec<&str> = triple.trim_matches(|c| c == '[' || c == ']').split(", ").collect();
            assert_eq!(values.len(), 3);
            assert!(values.iter().all(|v| decimals(v) <= 2));
        }
    }

    #[test]
    fn encoding_is_deterministic() {
        let window = imu_window(80, 40.0);
        let encoder = TextEncoder::new(names(&["x", "y", "z"]), 40.0, None, 3, 20.0);
        assert_eq!(
            encoder.encode_text(&window, Some("walking")),
            encoder.encode_text(&window, Some("walking"))
        );
    }

    #[test]
    fn rounding_bounds_every_literal() {
        let window = imu_window(60, 30.0);
        for points in [0, 2, 4] {
            for style in [EncodingStyle::RawWaveform, EncodingStyle::PowerSpectrumDensity] {
                let encoder = TextEncoder::new(names(&["x", "y", "z"]), 30.0, Some(style), points, 30.0);
                let text = encoder.encode_text(&window, None);
                for literal in numeric_literals(body(&text)) {
                    assert!(decimals(&literal) <= points as usize, "{literal} at {points}");
                }
            }
        }
    }

    #[test]
    fn single_channel_renders_flat_list_after_resampling() {
        let rows: Vec<Vec<f64>> = (0..100).map(|i| vec![i as f64 / 100.0]).collect();
        let window = SensorWindow::from_rows(&rows, 100.0, names(&["ppg"]), None).unwrap();
        let encoder = TextEncoder::new(names(&["ppg"]), 100.0, Some(EncodingStyle::RawWaveform), 2, 30.0);
        let text = encoder.encode_text(&window, None);
        let inner = body(&text);
        assert!(!inner.contains("[["));
        assert_eq!(inner.split(", ").count(), 30);
    }

    #[test]
    fn label_prefix_and_spectrogram_fallback() {
        let window = imu_window(20, 10.0);
        let raw = TextEncoder::new(names(&["x", "y", "z"]), 10.0, Some(EncodingStyle::RawWaveform), 1, 10.0);
        let spectro = TextEncoder::new(names(&["x", "y", "z"]), 10.0, Some(EncodingStyle::Spectrogram), 1, 10.0);
        let reserved = TextEncoder::new(names(&["x", "y", "z"]), 10.0, Some(EncodingStyle::EdaSignal), 1, 10.0);
        let expected = raw.encode_text(&window, Some("running"));
        assert!(expected.starts_with("*Example of running*:\nGiven sensor data"));
        assert_eq!(spectro.encode_text(&window, Some("running")), expected);
        assert_eq!(reserved.encode_text(&window, Some("running")), expected);
    }

    #[test]
    fn psd_lists_pairs_per_channel() {
        let window = imu_window(64, 32.0);
        let encoder = TextEncoder::new(
            names(&["x", "y", "z"]),
            32.0,
            Some(EncodingStyle::PowerSpectrumDensity),
            3,
            16.0,
        );
        let text = encoder.encode_text(&window, None);
        assert!(text.starts_with("Given sensor data PSD (list of (frequency, density) by channels): [x: [(0.5, "));
        assert!(text.contains("], y: [("));
        assert!(text.contains("], z: [("));
    }

    #[test]
    fn ecg_heart_rate_lists_peaks() {
        let rows: Vec<Vec<f64>> = synthetic_ecg(10.0, 250.0, 60.0).into_iter().map(|v| vec![v]).collect();
        let window = SensorWindow::from_rows(&rows, 250.0, names(&["ecg"]), None).unwrap();
        let encoder = TextEncoder::new(names(&["ecg"]), 250.0, Some(EncodingStyle::EcgHeartRate), 1, 250.0);
        let text = encoder.encode_text(&window, None);
        let (rate_line, peak_line) = text.split_once('\n').unwrap();
        assert!(rate_line.starts_with("Heart rate in the ECG signal (mean value 6"));
        assert!(peak_line.starts_with("R-peaks in the ECG signal (list of the index): [1"));
    }

    #[test]
    fn ecg_heartbeats_label_each_wave() {
        let rows: Vec<Vec<f64>> = synthetic_ecg(8.0, 200.0, 75.0).into_iter().map(|v| vec![v]).collect();
        let window = SensorWindow::from_rows(&rows, 200.0, names(&["ecg"]), None).unwrap();
        let encoder = TextEncoder::new(names(&["ecg"]), 200.0, Some(EncodingStyle::EcgHeartbeats), 2, 200.0);
        let text = encoder.encode_text(&window, None);
        assert!(text.starts_with("Average heartbeat in the ECG signal (list of ['ecg']): ["));
        for wave in ["P-waves", "Q-waves", "S-waves", "T-waves"] {
            assert!(text.contains(&format!("{wave} in the ECG signal (list of (time offset, value)): [(")));
        }
    }

    #[test]
    fn emg_styles_nest_values_per_timestep() {
        let rows: Vec<Vec<f64>> = (0..200)
            .map(|i| vec![((i * 7) % 13) as f64 / 13.0 - 0.5, ((i * 5) % 11) as f64 / 11.0 - 0.5])
            .collect();
        let window = SensorWindow::from_rows(&rows, 1000.0, names(&["a", "b"]), None).unwrap();
        for (style, prefix) in [
            (EncodingStyle::EmgSignal, "Cleaned EMG signal (list of ['a', 'b']): [["),
            (EncodingStyle::EmgActivation, "EMG muscle activation (list of ['a', 'b']): [["),
        ] {
            let encoder = TextEncoder::new(names(&["a", "b"]), 1000.0, Some(style), 3, 500.0);
            let text = encoder.encode_text(&window, None);
            assert!(text.starts_with(prefix));
            assert_eq!(body(&text).matches("], [").count(), 99);
        }
    }
}
