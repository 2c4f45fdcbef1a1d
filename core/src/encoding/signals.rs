use crate::biosignal::{
    ecg_process, emg_process, power_spectrum, segment_heartbeats, EcgSignals, EmgSignals, Heartbeats,
};
use crate::encoding::style::EncodingStyle;
use crate::interface::SensorWindow;

/// What a style derives from a window, shared by the text and image encoders.
///
/// ECG styles read the first channel only; every other style works per channel.
pub(crate) enum StyleSignals {
    Waveform,
    /// Computed by the renderer, which owns the STFT parameters.
    Spectrogram,
    PowerSpectrum(Vec<Vec<(f64, f64)>>),
    EcgSignal(EcgSignals),
    EcgHeartRate(EcgSignals),
    EcgHeartbeats(EcgSignals, Heartbeats),
    EmgSignal(Vec<EmgSignals>),
    EmgActivation(Vec<EmgSignals>),
}

impl StyleSignals {
    /// `None` for reserved styles.
    pub(crate) fn derive(style: EncodingStyle, window: &SensorWindow, sampling_rate: f64) -> Option<Self> {
        let ecg = || ecg_process(&first_channel(window), sampling_rate);
        let emg = || -> Vec<EmgSignals> {
            (0..window.channel_count())
                .map(|index| emg_process(&window.channel_vec(index), sampling_rate))
                .collect()
        };
        let signals = match style {
            EncodingStyle::RawWaveform => Self::Waveform,
            EncodingStyle::Spectrogram => Self::Spectrogram,
            EncodingStyle::PowerSpectrumDensity => Self::PowerSpectrum(
                (0..window.channel_count())
                    .map(|index| power_spectrum(&window.channel_vec(index), sampling_rate))
                    .collect(),
            ),
            EncodingStyle::EcgSignal => Self::EcgSignal(ecg()),
            EncodingStyle::EcgHeartRate => Self::EcgHeartRate(ecg()),
            EncodingStyle::EcgHeartbeats => {
                let signals = ecg();
                let beats = segment_heartbeats(&signals);
                Self::EcgHeartbeats(signals, beats)
            }
            EncodingStyle::EmgSignal => Self::EmgSignal(emg()),
            EncodingStyle::EmgActivation => Self::EmgActivation(emg()),
            _ => return None,
        };
        Some(signals)
    }
}

fn first_channel(window: &SensorWindow) -> Vec<f64> {
    if window.channel_count() == 0 {
        return Vec::new();
    }
    window.channel_vec(0)
}
