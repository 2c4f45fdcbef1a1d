use crate::biosignal::{SpectrogramMode, SpectrogramParams};
use crate::prelude::ConfigError;
use log::warn;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Every way a window can be shown to the model.
///
/// The display name is the wire name used in plans, selections and
/// configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodingStyle {
    RawWaveform,
    Spectrogram,
    PowerSpectrumDensity,
    EdaSignal,
    EdaScr,
    EdaScl,
    EcgSignal,
    EcgHeartRate,
    EcgHeartbeats,
    RspSignal,
    RspBreathingRate,
    RspBreathingAmplitude,
    RspVolumePerTime,
    RspCycleSymmetry,
    PpgSignal,
    PpgHeartRate,
    PpgHeartbeats,
    EmgSignal,
    EmgActivation,
    EogSignal,
    EogBlinkRate,
    EogBlinks,
}

impl EncodingStyle {
    pub const ALL: [EncodingStyle; 22] = [
        EncodingStyle::RawWaveform,
        EncodingStyle::Spectrogram,
        EncodingStyle::PowerSpectrumDensity,
        EncodingStyle::EdaSignal,
        EncodingStyle::EdaScr,
        EncodingStyle::EdaScl,
        EncodingStyle::EcgSignal,
        EncodingStyle::EcgHeartRate,
        EncodingStyle::EcgHeartbeats,
        EncodingStyle::RspSignal,
        EncodingStyle::RspBreathingRate,
        EncodingStyle::RspBreathingAmplitude,
        EncodingStyle::RspVolumePerTime,
        EncodingStyle::RspCycleSymmetry,
        EncodingStyle::PpgSignal,
        EncodingStyle::PpgHeartRate,
        EncodingStyle::PpgHeartbeats,
        EncodingStyle::EmgSignal,
        EncodingStyle::EmgActivation,
        EncodingStyle::EogSignal,
        EncodingStyle::EogBlinkRate,
        EncodingStyle::EogBlinks,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::RawWaveform => "raw waveform",
            Self::Spectrogram => "spectrogram",
            Self::PowerSpectrumDensity => "signal power spectrum density",
            Self::EdaSignal => "EDA signal",
            Self::EdaScr => "EDA skin conductance response (SCR)",
            Self::EdaScl => "EDA skin conductance level (SCL)",
            Self::EcgSignal => "ECG signal and peaks",
            Self::EcgHeartRate => "ECG heart rate",
            Self::EcgHeartbeats => "ECG individual heart beats",
            Self::RspSignal => "RSP signal",
            Self::RspBreathingRate => "RSP breathing rate",
            Self::RspBreathingAmplitude => "RSP breathing amplitude",
            Self::RspVolumePerTime => "RSP respiratory volume per time",
            Self::RspCycleSymmetry => "RSP cycle symmetry",
            Self::PpgSignal => "PPG signal and peaks",
            Self::PpgHeartRate => "PPG heart rate",
            Self::PpgHeartbeats => "PPG individual heart beats",
            Self::EmgSignal => "EMG signal",
            Self::EmgActivation => "EMG muscle activation",
            Self::EogSignal => "EOG signal",
            Self::EogBlinkRate => "EOG blink rate",
            Self::EogBlinks => "EOG individual blinks",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::RawWaveform => "This generates a raw signal of sensor data, displaying the amplitude of the signal over time. This is usually used to visualize the raw data and identify patterns in the signal.",
            Self::Spectrogram => "This generates a spectrogram of sensor data, showing the density of frequencies over time. This is usually used to visualize the frequency components for high-frequency data which has features over components but is hard to figure out in the raw plot. It takes the length of the FFT used (nfft), the length of each segment (nperseg), and the number of points to overlap between segments (noverlap) as parameters. Different modes (mode) can be defined to specify the type of return values: [\"psd\" for power spectral density, \"complex\" for complex-valued STFT results, \"magnitude\" for absolute magnitude, \"angle\" for complex angle, and \"phase\" for unwrapped phase angle].",
            Self::PowerSpectrumDensity => "This generates a power spectrum density plot, which shows the power of each frequency component of the signal on the x-axis. This is usually used to analyze the power distribution of different frequency components in the signal.",
            Self::EdaSignal => "This generates a plot showing both raw and cleaned Electrodermal Activity (EDA) signals over time. This is usually used to analyze the EDA signals for patterns related to stress, arousal, or other psychological states.",
            Self::EdaScr => "This generates a plot of skin conductance response (SCR) for EDA data, highlighting the phasic component, onsets, peaks, and half-recovery times. This is usually used to study the transient responses in EDA data related to specific stimuli or events.",
            Self::EdaScl => "This generates a plot of skin conductance level (SCL) for EDA data over time. This is usually used to analyze the tonic component of EDA data, reflecting the overall level of arousal or stress over a period.",
            Self::EcgSignal => "This generates a plot for Electrocardiogram (ECG) data, showing the raw signal, cleaned signal, and R peaks marked as dots to indicate heartbeats. This is usually used to analyze the heartbeats and detect anomalies in the ECG signal.",
            Self::EcgHeartRate => "This generates a heart rate plot for ECG data, displaying the heart rate over time along with its mean value. This is usually used to monitor and analyze heart rate variability and trends over time.",
            Self::EcgHeartbeats => "This generates a plot of individual heartbeats and the average heart rate for ECG data. It aggregates heartbeats within an ECG recording and shows the average beat shape, marking P-waves, Q-waves, S-waves, and T-waves. This is usually used to study the morphology of individual heartbeats and identify irregularities.",
            Self::RspSignal => "This generates a plot showing both raw and cleaned Respiration (RSP) signals over time, including exhalation and inhalation onsets and durations. This is usually used to analyze the breathing patterns and detect any abnormalities in respiration.",
            Self::RspBreathingRate => "This generates a breathing rate plot for RSP data, showing the breathing rate over time and its mean value. This is usually used to monitor and analyze the breathing rate and detect any irregularities.",
            Self::RspBreathingAmplitude => "This generates a breathing amplitude plot for RSP data, displaying the amplitude of breaths over time. This is usually used to measure the depth of breathing and identify changes in breathing patterns.",
            Self::RspVolumePerTime => "This generates a plot of respiratory volume per time (RVT) for RSP data, showing RVT values and their mean over time. This is usually used to analyze the respiratory volume and detect any anomalies in breathing.",
            Self::RspCycleSymmetry => "This generates a cycle symmetry plot for RSP data, displaying peak-trough symmetry and rise-decay symmetry plots. This is usually used to study the symmetry of the breathing cycles and identify any asymmetries.",
            Self::PpgSignal => "This generates a plot for Photoplethysmogram (PPG) data, showing the raw signal, cleaned signal, and systolic peaks marked as dots. This is usually used to analyze the blood volume pulse and detect anomalies in the PPG signal.",
            Self::PpgHeartRate => "This generates a heart rate plot for PPG data, displaying the heart rate over time and its mean value. This is usually used to monitor and analyze heart rate variability and trends over time based on PPG data.",
            Self::PpgHeartbeats => "This generates a plot of individual heartbeats and the average heart rate for PPG data, aggregating individual heartbeats within a PPG recording and showing the average beat shape. This is usually used to study the morphology of individual heartbeats based on PPG data.",
            Self::EmgSignal => "This generates a plot showing both raw and cleaned Electromyogram (EMG) signals over time. This is usually used to analyze muscle activity and identify patterns in muscle contractions.",
            Self::EmgActivation => "This generates a muscle activation plot for EMG data, displaying the amplitudes of muscle activity and highlighting activated parts with lines. This is usually used to study muscle activation levels and identify specific periods of muscle activity.",
            Self::EogSignal => "This generates a plot showing both raw and cleaned Electrooculogram (EOG) signals over time, with blinks marked as dots. This is usually used to analyze eye movement patterns and detect blinks.",
            Self::EogBlinkRate => "This generates a blink rate plot for EOG data, displaying the blink rate over time and its mean value. This is usually used to monitor and analyze the blink rate and detect any irregularities.",
            Self::EogBlinks => "This generates a plot of individual blinks for EOG data, aggregating individual blinks within an EOG recording and showing the median blink shape. This is usually used to study the morphology of individual blinks and identify patterns in blink dynamics.",
        }
    }

    /// Named parameters the style accepts, in catalog order.
    pub fn parameters(self) -> &'static [&'static str] {
        match self {
            Self::Spectrogram => &["nfft", "nperseg", "noverlap", "mode"],
            _ => &[],
        }
    }

    /// Whether an image renderer exists for the style.
    pub fn is_renderable(self) -> bool {
        matches!(
            self,
            Self::RawWaveform
                | Self::Spectrogram
                | Self::PowerSpectrumDensity
                | Self::EcgSignal
                | Self::EcgHeartRate
                | Self::EcgHeartbeats
                | Self::EmgSignal
                | Self::EmgActivation
        )
    }

    /// RSP styles are kept out of the planner catalog.
    pub fn in_catalog(self) -> bool {
        !matches!(
            self,
            Self::RspSignal
                | Self::RspBreathingRate
                | Self::RspBreathingAmplitude
                | Self::RspVolumePerTime
                | Self::RspCycleSymmetry
        )
    }
}

impl fmt::Display for EncodingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EncodingStyle {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|style| style.name() == name)
            .ok_or_else(|| ConfigError::UnsupportedStyle(name.to_string()))
    }
}

impl Serialize for EncodingStyle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for EncodingStyle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Planner catalog text: one `*name*: description` line per listed style.
pub fn catalog_text() -> String {
    EncodingStyle::ALL
        .iter()
        .filter(|style| style.in_catalog())
        .map(|style| {
            let mut line = format!("*{}*: {}", style.name(), style.description());
            if style.parameters().len() > 1 {
                line.push_str(&format!(" (Arguments: {})", style.parameters().join(", ")));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Free-form style arguments as proposed by the planner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleArgs(Map<String, Value>);

impl StyleArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Non-negative integer argument; numeric strings are accepted.
    pub fn get_usize(&self, key: &str) -> Option<usize> {
        match self.0.get(key)? {
            Value::Number(number) => number
                .as_u64()
                .or_else(|| number.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
                .map(|v| v as usize),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key)?.as_str()
    }

    pub fn spectrogram_params(&self) -> SpectrogramParams {
        let mode = match self.get_str("mode") {
            Some(name) => SpectrogramMode::from_name(name).unwrap_or_else(|| {
                warn!("unknown spectrogram mode `{}`, using psd", name);
                SpectrogramMode::Psd
            }),
            None => SpectrogramMode::Psd,
        };
        SpectrogramParams {
            nfft: self.get_usize("nfft"),
            nperseg: self.get_usize("nperseg"),
            noverlap: self.get_usize("noverlap"),
            mode,
        }
    }
}

impl From<Map<String, Value>> for StyleArgs {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_parsing() {
        for style in EncodingStyle::ALL {
            assert_eq!(style.name().parse::<EncodingStyle>().unwrap(), style);
        }
    }

    #[test]
    fn unknown_name_is_a_config_error() {
        assert!(matches!(
            "bar chart".parse::<EncodingStyle>(),
            Err(ConfigError::UnsupportedStyle(name)) if name == "bar chart"
        ));
    }

    #[test]
    fn catalog_skips_rsp_and_lists_spectrogram_arguments() {
        let catalog = catalog_text();
        assert!(!catalog.contains("RSP"));
        assert_eq!(catalog.lines().count(), 17);
        assert!(catalog.starts_with("*raw waveform*: This generates a raw signal"));
        assert!(catalog.contains("(Arguments: nfft, nperseg, noverlap, mode)"));
    }

    #[test]
    fn style_serializes_as_wire_name() {
        let json = serde_json::to_string(&EncodingStyle::EcgHeartRate).unwrap();
        assert_eq!(json, "\"ECG heart rate\"");
        let style: EncodingStyle = serde_json::from_str("\"EMG signal\"").unwrap();
        assert_eq!(style, EncodingStyle::EmgSignal);
    }

    #[test]
    fn spectrogram_args_are_read_leniently() {
        let args: StyleArgs = serde_json::from_str(
            r#"{"nfft": 128, "nperseg": "64", "noverlap": 8.0, "mode": "magnitude"}"#,
        )
        .unwrap();
        let params = args.spectrogram_params();
        assert_eq!(params.nfft, Some(128));
        assert_eq!(params.nperseg, Some(64));
        assert_eq!(params.noverlap, Some(8));
        assert_eq!(params.mode, SpectrogramMode::Magnitude);
        assert_eq!(StyleArgs::new().spectrogram_params(), SpectrogramParams::default());
    }
}
