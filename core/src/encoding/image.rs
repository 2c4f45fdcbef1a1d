//! Figure rendering for the visual prompt branch.

use crate::biosignal::{spectrogram, EcgSignals, EmgSignals, Heartbeats, SpectrogramParams, WaveKind};
use crate::encoding::canvas::{render_error, Canvas, Surface};
use crate::encoding::signals::StyleSignals;
use crate::encoding::style::{EncodingStyle, StyleArgs};
use crate::interface::{SensorWindow, TaskMetadata};
use crate::math::stats::StatsHelper;
use crate::prelude::{ConfigError, EncodeResult};
use log::debug;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use std::ops::Range;

type Chart<'a, 'b> = ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

const RAW_GREY: RGBColor = RGBColor(0xB0, 0xBE, 0xC5);
const CLEAN_RED: RGBColor = RGBColor(0xF4, 0x43, 0x36);
const PEAK_AMBER: RGBColor = RGBColor(0xFF, 0xC1, 0x07);
const RATE_ORANGE: RGBColor = RGBColor(0xFF, 0x57, 0x22);
const MEAN_ORANGE: RGBColor = RGBColor(0xFF, 0x98, 0x00);

fn wave_color(kind: WaveKind) -> RGBColor {
    match kind {
        WaveKind::P => RGBColor(0x39, 0x49, 0xAB),
        WaveKind::Q => RGBColor(0x1E, 0x88, 0xE5),
        WaveKind::S => RGBColor(0x03, 0x9B, 0xE5),
        WaveKind::T => RGBColor(0x00, 0xAC, 0xC1),
    }
}

/// Renders windows as PNG figures in one fixed style.
///
/// The encoder owns a single [`Canvas`] for its whole life; every call
/// clears and redraws it.
pub struct ImageEncoder {
    channels: Vec<String>,
    sampling_rate: f64,
    style: EncodingStyle,
    args: StyleArgs,
    y_range: Option<(f64, f64)>,
    canvas: Canvas,
}

impl ImageEncoder {
    pub fn new(
        channels: Vec<String>,
        sampling_rate: f64,
        style: EncodingStyle,
        args: StyleArgs,
    ) -> Result<Self, ConfigError> {
        if !style.is_renderable() {
            return Err(ConfigError::UnimplementedStyle(style.name()));
        }
        let canvas = match style {
            EncodingStyle::Spectrogram => {
                Canvas::with_units(5.0, 1.0 + 2.0 * channels.len().max(1) as f64)
            }
            _ => Canvas::with_units(5.0, 4.0),
        };
        Ok(Self {
            channels,
            sampling_rate,
            style,
            args,
            y_range: None,
            canvas,
        })
    }

    pub fn for_task(
        metadata: &TaskMetadata,
        style: EncodingStyle,
        args: StyleArgs,
    ) -> Result<Self, ConfigError> {
        Self::new(metadata.channels.clone(), metadata.sampling_rate, style, args)
    }

    /// Fixes the y-axis of raw-waveform figures so several windows share one scale.
    pub fn with_y_range(mut self, range: Option<(f64, f64)>) -> Self {
        self.y_range = range;
        self
    }

    pub fn size(&self) -> (u32, u32) {
        self.canvas.size()
    }

    /// Renders one window; unlabeled windows are titled as the target.
    pub fn encode_image(&mut self, window: &SensorWindow, label: Option<&str>) -> EncodeResult<Vec<u8>> {
        let title = label.unwrap_or("target data").to_string();
        debug!("rendering `{}` for {}", self.style, title);
        let figure = Figure {
            channels: &self.channels,
            sampling_rate: self.sampling_rate,
            style: self.style,
            args: &self.args,
            y_range: self.y_range,
        };
        self.canvas.render(|root| {
            let area = root.titled(&title, ("sans-serif", 20)).map_err(render_error)?;
            figure.draw(&area, window)
        })
    }
}

/// Borrowed rendering parameters, split from the canvas they draw on.
struct Figure<'e> {
    channels: &'e [String],
    sampling_rate: f64,
    style: EncodingStyle,
    args: &'e StyleArgs,
    y_range: Option<(f64, f64)>,
}

impl Figure<'_> {
    fn draw(&self, area: &Surface<'_>, window: &SensorWindow) -> EncodeResult<()> {
        let signals = StyleSignals::derive(self.style, window, self.sampling_rate)
            .ok_or(ConfigError::UnimplementedStyle(self.style.name()))?;
        match signals {
            StyleSignals::Waveform => self.waveform(area, window),
            StyleSignals::Spectrogram => self.spectrogram(area, window),
            StyleSignals::PowerSpectrum(spectra) => self.psd(area, window, spectra),
            StyleSignals::EcgSignal(ecg) => self.ecg_signal(area, &ecg),
            StyleSignals::EcgHeartRate(ecg) => self.ecg_heart_rate(area, &ecg),
            StyleSignals::EcgHeartbeats(_, beats) => self.ecg_heartbeats(area, &beats),
            StyleSignals::EmgSignal(emg) => self.emg_signal(area, window, &emg),
            StyleSignals::EmgActivation(emg) => self.emg_activation(area, window, &emg),
        }
    }

    fn channel_name(&self, window: &SensorWindow, index: usize) -> String {
        self.channels
            .get(index)
            .or_else(|| window.channels().get(index))
            .cloned()
            .unwrap_or_else(|| format!("channel {}", index))
    }

    fn duration(&self, len: usize) -> Range<f64> {
        0.0..(len.max(2) - 1) as f64 / self.sampling_rate
    }

    fn seconds(&self, index: usize) -> f64 {
        index as f64 / self.sampling_rate
    }

    fn timed<'v>(&self, values: &'v [f64]) -> impl Iterator<Item = (f64, f64)> + 'v {
        let rate = self.sampling_rate;
        values
            .iter()
            .enumerate()
            .map(move |(i, v)| (i as f64 / rate, *v))
            .filter(|(_, v)| v.is_finite())
    }

    fn waveform(&self, area: &Surface<'_>, window: &SensorWindow) -> EncodeResult<()> {
        let y = padded(self.y_range.or_else(|| window.value_range()));
        let mut chart = chart(area, self.style.name(), self.duration(window.len()), y, "Time [sec]", "Normalized value")?;
        for index in 0..window.channel_count() {
            let color = Palette99::pick(index).mix(0.9);
            let samples = window.channel_vec(index);
            chart
                .draw_series(LineSeries::new(self.timed(&samples), color.stroke_width(1)))
                .map_err(render_error)?
                .label(self.channel_name(window, index))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], color));
        }
        legend(&mut chart)
    }

    fn spectrogram(&self, area: &Surface<'_>, window: &SensorWindow) -> EncodeResult<()> {
        let params: SpectrogramParams = self.args.spectrogram_params();
        let panels = area.split_evenly((window.channel_count().max(1), 1));
        for (index, panel) in panels.iter().enumerate().take(window.channel_count()) {
            let result = spectrogram(&window.channel_vec(index), self.sampling_rate, &params);
            let values: Vec<Vec<f64>> = result
                .values
                .iter()
                .map(|column| {
                    column
                        .iter()
                        .map(|v| if params.mode.is_power() { 10.0 * v.max(1e-20).log10() } else { *v })
                        .collect()
                })
                .collect();
            let title = format!("{} of {}", self.style.name(), self.channel_name(window, index));
            let time_step = step(&result.times, 2.0 * result.times.first().copied().unwrap_or(0.5));
            let freq_step = step(&result.frequencies, self.sampling_rate / 2.0);
            let x = padded(StatsHelper::range(result.times.iter().copied()).map(|(lo, hi)| {
                (lo - time_step / 2.0, hi + time_step / 2.0)
            }));
            let y = padded(StatsHelper::range(result.frequencies.iter().copied()));
            let mut chart = chart(panel, &title, x, y, "Time [sec]", "Frequency [Hz]")?;

            let Some((lo, hi)) = StatsHelper::range(values.iter().flatten().copied()) else {
                continue;
            };
            let span = (hi - lo).max(f64::EPSILON);
            let cells = values.iter().zip(&result.times).flat_map(|(column, &t)| {
                column.iter().zip(&result.frequencies).map(move |(&v, &f)| {
                    let level = if v.is_finite() { (v - lo) / span } else { 0.0 };
                    Rectangle::new(
                        [
                            (t - time_step / 2.0, f - freq_step / 2.0),
                            (t + time_step / 2.0, f + freq_step / 2.0),
                        ],
                        HSLColor(0.7 * (1.0 - level), 0.9, 0.25 + 0.35 * level).filled(),
                    )
                })
            });
            chart.draw_series(cells).map_err(render_error)?;
        }
        Ok(())
    }

    fn psd(&self, area: &Surface<'_>, window: &SensorWindow, spectra: Vec<Vec<(f64, f64)>>) -> EncodeResult<()> {
        let spectra: Vec<Vec<(f64, f64)>> = spectra
            .into_iter()
            .map(|spectrum| {
                spectrum
                    .into_iter()
                    .filter(|(_, power)| *power > 0.0)
                    .map(|(freq, power)| (freq, power.log10()))
                    .collect()
            })
            .collect();
        let x = padded(StatsHelper::range(spectra.iter().flatten().map(|(f, _)| *f)));
        let y = padded(StatsHelper::range(spectra.iter().flatten().map(|(_, p)| *p)));
        let mut chart = chart(area, self.style.name(), x, y, "Frequency [Hz]", "Power [log10]")?;
        for (index, spectrum) in spectra.into_iter().enumerate() {
            let color = Palette99::pick(index).mix(0.9);
            chart
                .draw_series(LineSeries::new(spectrum, color.stroke_width(1)))
                .map_err(render_error)?
                .label(self.channel_name(window, index))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], color));
        }
        legend(&mut chart)
    }

    fn ecg_signal(&self, area: &Surface<'_>, ecg: &EcgSignals) -> EncodeResult<()> {
        let y = padded(StatsHelper::range(ecg.raw.iter().chain(&ecg.clean).copied()));
        let mut chart = chart(area, self.style.name(), self.duration(ecg.clean.len()), y, "Time (seconds)", "ECG")?;
        chart
            .draw_series(LineSeries::new(self.timed(&ecg.raw), RAW_GREY))
            .map_err(render_error)?
            .label("Raw signal")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], RAW_GREY));
        chart
            .draw_series(LineSeries::new(self.timed(&ecg.clean), CLEAN_RED))
            .map_err(render_error)?
            .label("Cleaned signal")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], CLEAN_RED));
        chart
            .draw_series(
                ecg.r_peaks
                    .iter()
                    .map(|&peak| Circle::new((self.seconds(peak), ecg.clean[peak]), 3, PEAK_AMBER.filled())),
            )
            .map_err(render_error)?
            .label("R-peaks")
            .legend(|(x, y)| Circle::new((x + 8, y), 3, PEAK_AMBER.filled()));
        legend(&mut chart)
    }

    fn ecg_heart_rate(&self, area: &Surface<'_>, ecg: &EcgSignals) -> EncodeResult<()> {
        let mean = ecg.mean_rate();
        let y = padded(StatsHelper::range(ecg.rate.iter().copied()));
        let x = self.duration(ecg.rate.len());
        let mut chart = chart(area, self.style.name(), x.clone(), y, "Time (seconds)", "Beats per minute (bpm)")?;
        chart
            .draw_series(LineSeries::new(self.timed(&ecg.rate), RATE_ORANGE.stroke_width(2)))
            .map_err(render_error)?
            .label("Rate")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], RATE_ORANGE));
        if mean.is_finite() {
            chart
                .draw_series(std::iter::once(PathElement::new(
                    vec![(x.start, mean), (x.end, mean)],
                    MEAN_ORANGE.stroke_width(2),
                )))
                .map_err(render_error)?
                .label("Mean")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], MEAN_ORANGE));
        }
        chart
            .draw_series(
                ecg.r_peaks
                    .iter()
                    .filter(|&&peak| ecg.rate[peak].is_finite())
                    .map(|&peak| Circle::new((self.seconds(peak), ecg.rate[peak]), 3, PEAK_AMBER.filled())),
            )
            .map_err(render_error)?;
        legend(&mut chart)
    }

    fn ecg_heartbeats(&self, area: &Surface<'_>, beats: &Heartbeats) -> EncodeResult<()> {
        let x = padded(StatsHelper::range(beats.offsets.iter().copied()));
        let y = padded(StatsHelper::range(
            beats.epochs.iter().flatten().filter_map(|v| *v).chain(beats.average.iter().copied()),
        ));
        let mut chart = chart(area, self.style.name(), x, y.clone(), "Time (seconds)", "ECG")?;
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(0.0, y.start), (0.0, y.end)],
                BLACK.mix(0.35),
            )))
            .map_err(render_error)?;

        for (index, epoch) in beats.epochs.iter().enumerate() {
            let color = Palette99::pick(index).mix(0.35);
            let points = beats
                .offsets
                .iter()
                .zip(epoch)
                .filter_map(|(&t, v)| v.map(|v| (t, v)));
            chart
                .draw_series(LineSeries::new(points, color))
                .map_err(render_error)?;
        }
        let average = beats
            .offsets
            .iter()
            .copied()
            .zip(beats.average.iter().copied())
            .filter(|(_, v)| v.is_finite());
        chart
            .draw_series(LineSeries::new(average, CLEAN_RED.stroke_width(5)))
            .map_err(render_error)?
            .label("Average beat shape")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], CLEAN_RED.stroke_width(3)));

        for wave in &beats.waves {
            let color = wave_color(wave.kind);
            chart
                .draw_series(wave.points.iter().map(|&point| Cross::new(point, 4, color.stroke_width(2))))
                .map_err(render_error)?
                .label(wave.kind.label())
                .legend(move |(x, y)| Cross::new((x + 8, y), 4, color.stroke_width(2)));
        }
        legend(&mut chart)
    }

    fn emg_signal(&self, area: &Surface<'_>, window: &SensorWindow, emg: &[EmgSignals]) -> EncodeResult<()> {
        let processed: Vec<(Vec<f64>, &Vec<f64>)> = emg
            .iter()
            .enumerate()
            .map(|(index, channel)| (window.channel_vec(index), &channel.clean))
            .collect();
        let y = padded(StatsHelper::range(
            processed.iter().flat_map(|(raw, clean)| raw.iter().chain(clean.iter())).copied(),
        ));
        let mut chart = chart(area, self.style.name(), self.duration(window.len()), y, "Time (seconds)", "EMG")?;
        for (index, (raw, clean)) in processed.iter().enumerate() {
            let color = Palette99::pick(index).mix(0.9);
            chart
                .draw_series(LineSeries::new(self.timed(raw), color.mix(0.3)))
                .map_err(render_error)?;
            chart
                .draw_series(LineSeries::new(self.timed(clean), color.stroke_width(1)))
                .map_err(render_error)?
                .label(self.channel_name(window, index))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], color));
        }
        legend(&mut chart)
    }

    fn emg_activation(&self, area: &Surface<'_>, window: &SensorWindow, emg: &[EmgSignals]) -> EncodeResult<()> {
        let amplitudes: Vec<&Vec<f64>> = emg.iter().map(|channel| &channel.amplitude).collect();
        let y = padded(StatsHelper::range(amplitudes.iter().flat_map(|a| a.iter()).copied()));
        let x = self.duration(window.len());
        let mut chart = chart(area, self.style.name(), x.clone(), y, "Time (seconds)", "Muscle activation")?;
        for (index, amplitude) in amplitudes.iter().enumerate() {
            let color = Palette99::pick(index).mix(0.9);
            chart
                .draw_series(LineSeries::new(self.timed(amplitude), color.stroke_width(2)))
                .map_err(render_error)?
                .label(self.channel_name(window, index))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], color));
            // Mean amplitude marks where the channel counts as active.
            let threshold = StatsHelper::mean(amplitude);
            if threshold.is_finite() {
                chart
                    .draw_series(std::iter::once(PathElement::new(
                        vec![(x.start, threshold), (x.end, threshold)],
                        color.mix(0.4),
                    )))
                    .map_err(render_error)?;
            }
        }
        legend(&mut chart)
    }
}

fn chart<'a, 'b>(
    area: &'a Surface<'b>,
    title: &str,
    x: Range<f64>,
    y: Range<f64>,
    x_desc: &str,
    y_desc: &str,
) -> EncodeResult<Chart<'a, 'b>> {
    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 16))
        .margin(8)
        .x_label_area_size(28)
        .y_label_area_size(44)
        .build_cartesian_2d(x, y)
        .map_err(render_error)?;
    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .x_labels(6)
        .y_labels(6)
        .draw()
        .map_err(render_error)?;
    Ok(chart)
}

fn legend<'a, 'b: 'a>(chart: &mut Chart<'a, 'b>) -> EncodeResult<()> {
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK.mix(0.25))
        .position(SeriesLabelPosition::UpperRight)
        .draw()
        .map_err(render_error)
}

/// Axis range with a little headroom; degenerate or missing ranges get a unit span.
fn padded(range: Option<(f64, f64)>) -> Range<f64> {
    match range {
        Some((lo, hi)) if hi > lo => {
            let pad = (hi - lo) * 0.05;
            (lo - pad)..(hi + pad)
        }
        Some((value, _)) => (value - 0.5)..(value + 0.5),
        None => 0.0..1.0,
    }
}

fn step(axis: &[f64], fallback: f64) -> f64 {
    match axis {
        [first, second, ..] => second - first,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biosignal::ecg::tests::synthetic_ecg;
    use crate::tokens::image_size;
    use std::f64::consts::PI;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn imu_window(len: usize, rate: f64) -> SensorWindow {
        let rows: Vec<Vec<f64>> = (0..len)
            .map(|i| {
                let t = i as f64 / rate;
                vec![(2.0 * PI * 2.0 * t).sin(), (2.0 * PI * 5.0 * t).cos() * 0.5, t]
            })
            .collect();
        SensorWindow::from_rows(&rows, rate, names(&["x", "y", "z"]), None).unwrap()
    }

    fn ecg_window() -> SensorWindow {
        let rows: Vec<Vec<f64>> = synthetic_ecg(6.0, 200.0, 72.0).into_iter().map(|v| vec![v]).collect();
        SensorWindow::from_rows(&rows, 200.0, names(&["ecg"]), None).unwrap()
    }

    fn assert_bounded(png: &[u8]) {
        let (width, height) = image_size(png).unwrap();
        assert!(width.max(height) <= 512, "{width}x{height}");
    }

    #[test]
    fn every_renderable_style_fits_the_size_bound() {
        let imu = imu_window(256, 64.0);
        let ecg = ecg_window();
        for style in EncodingStyle::ALL.into_iter().filter(|s| s.is_renderable()) {
            let window = match style {
                EncodingStyle::EcgSignal | EncodingStyle::EcgHeartRate | EncodingStyle::EcgHeartbeats => &ecg,
                _ => &imu,
            };
            let mut encoder =
                ImageEncoder::new(window.channels().to_vec(), window.sampling_rate(), style, StyleArgs::new())
                    .unwrap();
            let png = encoder.encode_image(window, Some("walking")).unwrap();
            assert_bounded(&png);
        }
    }

    #[test]
    fn spectrogram_allocates_a_row_per_channel() {
        let args = StyleArgs::new().with("nperseg", 32).with("noverlap", 16).with("mode", "magnitude");
        let encoder = ImageEncoder::new(names(&["x", "y", "z"]), 64.0, EncodingStyle::Spectrogram, args).unwrap();
        assert_eq!(encoder.size(), (365, 512));
        let single = ImageEncoder::new(names(&["x"]), 64.0, EncodingStyle::Spectrogram, StyleArgs::new()).unwrap();
        assert_eq!(single.size(), (512, 307));
    }

    #[test]
    fn reserved_styles_are_rejected() {
        let result = ImageEncoder::new(names(&["eda"]), 4.0, EncodingStyle::EdaSignal, StyleArgs::new());
        assert!(matches!(result, Err(ConfigError::UnimplementedStyle("EDA signal"))));
    }

    #[test]
    fn shared_range_changes_the_waveform_figure() {
        let window = imu_window(128, 64.0);
        let mut encoder =
            ImageEncoder::new(names(&["x", "y", "z"]), 64.0, EncodingStyle::RawWaveform, StyleArgs::new()).unwrap();
        let own_range = encoder.encode_image(&window, None).unwrap();
        let mut shared = ImageEncoder::new(names(&["x", "y", "z"]), 64.0, EncodingStyle::RawWaveform, StyleArgs::new())
            .unwrap()
            .with_y_range(Some((-10.0, 10.0)));
        let wide = shared.encode_image(&window, None).unwrap();
        assert_ne!(own_range, wide);
        assert_eq!(encoder.encode_image(&window, None).unwrap(), own_range);
    }

    #[test]
    fn label_is_drawn_into_the_title() {
        let window = imu_window(128, 64.0);
        let mut encoder =
            ImageEncoder::new(names(&["x", "y", "z"]), 64.0, EncodingStyle::RawWaveform, StyleArgs::new()).unwrap();
        let walking = encoder.encode_image(&window, Some("walking")).unwrap();
        let running = encoder.encode_image(&window, Some("running")).unwrap();
        assert_ne!(walking, running);
        assert_eq!(encoder.encode_image(&window, Some("walking")).unwrap(), walking);
    }

    #[test]
    fn flat_window_still_renders() {
        let rows = vec![vec![0.0]; 50];
        let window = SensorWindow::from_rows(&rows, 50.0, names(&["ecg"]), None).unwrap();
        for style in [EncodingStyle::EcgHeartRate, EncodingStyle::EcgHeartbeats, EncodingStyle::RawWaveform] {
            let mut encoder = ImageEncoder::new(names(&["ecg"]), 50.0, style, StyleArgs::new()).unwrap();
            assert_bounded(&encoder.encode_image(&window, None).unwrap());
        }
    }
}
