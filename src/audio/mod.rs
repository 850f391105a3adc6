//! Waveforms, WAV I/O and resampling

mod io;
pub mod resample;
mod waveform;

pub use io::{generate_test_tone, read_wav, write_wav};
pub use resample::resample;
pub use waveform::Waveform;
