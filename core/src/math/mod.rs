pub mod fft;
pub mod filter;
pub mod resample;
pub mod stats;

pub use fft::FftHelper;
pub use filter::{boxcar_smooth, gradient, Biquad, ZeroPhaseFilter};
pub use resample::{resample, resample_columns, resampled_len};
pub use stats::StatsHelper;
