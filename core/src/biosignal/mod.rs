pub mod ecg;
pub mod emg;
pub mod spectrum;

pub use ecg::{ecg_process, segment_heartbeats, EcgSignals, Heartbeats, WaveKind, WaveMarks};
pub use emg::{emg_process, EmgSignals};
pub use spectrum::{power_spectrum, spectrogram, Spectrogram, SpectrogramMode, SpectrogramParams};
