//! Chunked waveform inference
//!
//! Long recordings are split into overlapping fixed-length chunks, each
//! peak-normalised and run through the module independently, then merged back
//! with aligned cross-fades.

use candle_core::{DType, Device, Tensor};
use std::time::Instant;
use tracing::{debug, info};

use super::merge::merge_chunks;
use crate::audio::{resample, Waveform};
use crate::error::{EnhanceError, Result};
use crate::neural::{AudioModule, EnhanceConfig};

/// Runs a module over a whole waveform
pub trait InferenceRoutine: Send + Sync {
    /// Process `wav` with `module`, returning audio at `module.wav_rate()`.
    ///
    /// Tensors handed to `module` always live on `module.device()`; `device`
    /// is the placement the caller asked for.
    fn run(
        &self,
        module: &dyn AudioModule,
        wav: &Waveform,
        device: &Device,
        config: Option<&EnhanceConfig>,
    ) -> Result<Waveform>;
}

/// Overlapping-chunk inference with peak normalisation
#[derive(Debug, Clone, Copy)]
pub struct ChunkedInference {
    pub chunk_seconds: f32,
    pub overlap_seconds: f32,
    /// Zero samples appended to each chunk before the forward pass
    pub npad: usize,
}

impl Default for ChunkedInference {
    fn default() -> Self {
        Self {
            chunk_seconds: 30.0,
            overlap_seconds: 1.0,
            npad: 441,
        }
    }
}

impl ChunkedInference {
    pub fn new(chunk_seconds: f32, overlap_seconds: f32) -> Result<Self> {
        if chunk_seconds.is_nan() || chunk_seconds <= 0.0 {
            return Err(EnhanceError::invalid_param(
                "chunk_seconds",
                chunk_seconds,
                "> 0",
            ));
        }
        if !(0.0..chunk_seconds).contains(&overlap_seconds) {
            return Err(EnhanceError::invalid_param(
                "overlap_seconds",
                overlap_seconds,
                "in [0, chunk_seconds)",
            ));
        }
        Ok(Self {
            chunk_seconds,
            overlap_seconds,
            ..Self::default()
        })
    }

    pub fn with_npad(mut self, npad: usize) -> Self {
        self.npad = npad;
        self
    }

    /// `(chunk_length, hop_length)` in samples at `sample_rate`
    fn lengths(&self, sample_rate: u32) -> Result<(usize, usize)> {
        let chunk_length = (sample_rate as f64 * self.chunk_seconds as f64) as usize;
        let overlap_length = (sample_rate as f64 * self.overlap_seconds as f64) as usize;
        if chunk_length <= overlap_length {
            return Err(EnhanceError::InferenceError {
                reason: format!(
                    "chunk of {} samples does not exceed overlap of {}",
                    chunk_length, overlap_length
                ),
            });
        }
        Ok((chunk_length, chunk_length - overlap_length))
    }

    /// Normalise, pad, forward and denormalise one chunk.
    fn infer_chunk(
        &self,
        module: &dyn AudioModule,
        chunk: &[f32],
        config: Option<&EnhanceConfig>,
    ) -> Result<Vec<f32>> {
        let abs_max = chunk
            .iter()
            .fold(0.0f32, |m, x| m.max(x.abs()))
            .max(1e-7);

        let mut padded: Vec<f32> = chunk.iter().map(|x| x / abs_max).collect();
        padded.resize(chunk.len() + self.npad, 0.0);
        let len = padded.len();

        let input = Tensor::from_vec(padded, (1, len), module.device())?.to_dtype(module.dtype())?;
        let output = module.forward(&input, config)?;
        let output = output.to_device(&Device::Cpu)?.to_dtype(DType::F32)?;

        let mut row = match output.rank() {
            1 => output.to_vec1::<f32>()?,
            2 => output
                .to_vec2::<f32>()?
                .into_iter()
                .next()
                .unwrap_or_default(),
            rank => {
                return Err(EnhanceError::InferenceError {
                    reason: format!("{} returned a {}-D tensor", module.name(), rank),
                })
            }
        };
        row.truncate(chunk.len());
        Ok(row.into_iter().map(|x| x * abs_max).collect())
    }

    fn run_row(
        &self,
        module: &dyn AudioModule,
        samples: &[f32],
        sample_rate: u32,
        config: Option<&EnhanceConfig>,
    ) -> Result<Vec<f32>> {
        let sr = module.wav_rate();
        let samples = resample(samples, sample_rate, sr);
        let (chunk_length, hop_length) = self.lengths(sr)?;

        let mut chunks = Vec::with_capacity(samples.len() / hop_length + 1);
        for start in (0..samples.len()).step_by(hop_length) {
            let end = (start + chunk_length).min(samples.len());
            chunks.push(self.infer_chunk(module, &samples[start..end], config)?);
        }
        debug!("{}: {} chunk(s) of up to {} samples", module.name(), chunks.len(), chunk_length);

        Ok(merge_chunks(&chunks, chunk_length, hop_length, sr, samples.len()))
    }
}

impl InferenceRoutine for ChunkedInference {
    fn run(
        &self,
        module: &dyn AudioModule,
        wav: &Waveform,
        device: &Device,
        config: Option<&EnhanceConfig>,
    ) -> Result<Waveform> {
        if wav.is_empty() {
            return Err(EnhanceError::EmptyAudio);
        }

        if !device.same_device(module.device()) {
            debug!(
                "{}: running on module device {:?} instead of requested {:?}",
                module.name(),
                module.device().location(),
                device.location()
            );
        }

        let start = Instant::now();
        let batched = wav.tensor().rank() == 2;
        let rows = wav
            .rows_f32()?
            .iter()
            .map(|row| self.run_row(module, row, wav.sample_rate(), config))
            .collect::<Result<Vec<_>>>()?;

        let out = Waveform::from_rows(rows, module.wav_rate(), batched)?;
        let elapsed = start.elapsed().as_secs_f64();
        let khz = if elapsed > 0.0 {
            (out.num_samples() * out.batch_size()) as f64 / elapsed / 1000.0
        } else {
            0.0
        };
        info!(
            "{}: {:.3}s elapsed, {:.3} kHz",
            module.name(),
            elapsed,
            khz
        );

        Ok(out)
    }
}
