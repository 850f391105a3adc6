//! WAV file I/O
//!
//! Files are read as mono f32 waveforms (channels are averaged) at their
//! native sample rate; resampling to the model rate happens during inference.
//! Output is written as mono 32-bit float WAV.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::waveform::Waveform;
use crate::error::{EnhanceError, Result};

/// Read a WAV file into a mono waveform.
///
/// # Errors
/// * `FileNotFound` - If the file does not exist
/// * `InvalidAudio` - If the file is not a readable WAV file
/// * `EmptyAudio` - If the file holds no samples
pub fn read_wav(path: &Path) -> Result<Waveform> {
    if !path.exists() {
        return Err(EnhanceError::FileNotFound {
            path: path.display().to_string(),
            source: None,
        });
    }

    let reader = WavReader::open(path).map_err(|e| EnhanceError::InvalidAudio {
        reason: format!("Failed to open WAV file {}: {}", path.display(), e),
        source: Some(Box::new(e)),
    })?;

    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;
    let samples = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    if samples.is_empty() {
        return Err(EnhanceError::EmptyAudio);
    }

    Waveform::from_samples(mixdown(&samples, channels), spec.sample_rate)
}

/// Write a mono waveform as 32-bit float WAV.
///
/// Batched waveforms are accepted only with a batch of one.
pub fn write_wav(path: &Path, wav: &Waveform) -> Result<()> {
    let mut rows = wav.rows_f32()?;
    if rows.len() != 1 {
        return Err(EnhanceError::InvalidAudio {
            reason: format!("cannot write a batch of {} waveforms to one file", rows.len()),
            source: None,
        });
    }
    let samples = rows.remove(0);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate: wav.sample_rate(),
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let wav_error = |e: hound::Error| EnhanceError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));

    let mut writer = WavWriter::create(path, spec).map_err(wav_error)?;
    for sample in samples {
        writer.write_sample(sample).map_err(wav_error)?;
    }
    writer.finalize().map_err(wav_error)?;

    Ok(())
}

/// Generate a mono sine tone
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> Result<Waveform> {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;
    let samples = (0..num_samples)
        .map(|i| (angular_freq * i as f32).sin())
        .collect();
    Waveform::from_samples(samples, sample_rate)
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let scale = match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => {
            return reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| EnhanceError::InvalidAudio {
                    reason: format!("Failed to read float samples: {}", e),
                    source: Some(Box::new(e)),
                })
        }
        (SampleFormat::Int, bits @ 8..=32) => (1u64 << (bits - 1)) as f32,
        (SampleFormat::Int, bits) => {
            return Err(EnhanceError::InvalidAudio {
                reason: format!("unsupported {}-bit integer audio", bits),
                source: None,
            })
        }
    };

    reader
        .samples::<i32>()
        .map(|s| s.map(|v| v as f32 / scale))
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|e| EnhanceError::InvalidAudio {
            reason: format!("Failed to read {}-bit samples: {}", bits_per_sample, e),
            source: Some(Box::new(e)),
        })
}

/// Average interleaved channels into one
fn mixdown(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tone.wav");
        let tone = generate_test_tone(440.0, 0.1, 16_000).unwrap();

        write_wav(&path, &tone).unwrap();
        let back = read_wav(&path).unwrap();

        assert_eq!(back.sample_rate(), 16_000);
        assert_eq!(back.num_samples(), tone.num_samples());
        let a = tone.rows_f32().unwrap();
        let b = back.rows_f32().unwrap();
        for (x, y) in a[0].iter().zip(&b[0]) {
            assert_relative_eq!(x, y);
        }
    }

    #[test]
    fn test_stereo_int16_is_mixed_down() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..4 {
            writer.write_sample(16384i16).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let wav = read_wav(&path).unwrap();
        assert_eq!(wav.num_samples(), 4);
        for v in &wav.rows_f32().unwrap()[0] {
            assert_relative_eq!(*v, 0.25);
        }
    }

    #[test]
    fn test_missing_file() {
        let err = read_wav(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
    }
}
