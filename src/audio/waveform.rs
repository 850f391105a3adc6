//! Waveform tensor with its sample rate

use candle_core::{DType, Device, Tensor};

use crate::error::{EnhanceError, Result};

/// Audio samples as a `(samples,)` or `(batch, samples)` tensor
#[derive(Debug, Clone)]
pub struct Waveform {
    samples: Tensor,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Tensor, sample_rate: u32) -> Result<Self> {
        match samples.rank() {
            1 | 2 => Ok(Self {
                samples,
                sample_rate,
            }),
            rank => Err(EnhanceError::InvalidAudio {
                reason: format!("expected a 1-D or 2-D waveform, got {}-D", rank),
                source: None,
            }),
        }
    }

    /// Mono waveform on the CPU from f32 samples
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        let len = samples.len();
        Self::new(Tensor::from_vec(samples, (len,), &Device::Cpu)?, sample_rate)
    }

    pub fn tensor(&self) -> &Tensor {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn dtype(&self) -> DType {
        self.samples.dtype()
    }

    pub fn device(&self) -> &Device {
        self.samples.device()
    }

    /// Samples per channel
    pub fn num_samples(&self) -> usize {
        self.samples.dims().last().copied().unwrap_or(0)
    }

    /// 1 for mono tensors, the batch size otherwise
    pub fn batch_size(&self) -> usize {
        match self.samples.dims() {
            [batch, _] => *batch,
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.num_samples() == 0
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.num_samples() as f64 / self.sample_rate as f64
    }

    /// Move to `device` and convert to `dtype`.
    pub fn to(&self, device: &Device, dtype: DType) -> Result<Self> {
        let samples = self.samples.to_device(device)?.to_dtype(dtype)?;
        Ok(Self {
            samples,
            sample_rate: self.sample_rate,
        })
    }

    /// Rows as f32 vectors on the CPU (one row for mono)
    pub fn rows_f32(&self) -> Result<Vec<Vec<f32>>> {
        let cpu = self
            .samples
            .to_device(&Device::Cpu)?
            .to_dtype(DType::F32)?;
        match cpu.rank() {
            1 => Ok(vec![cpu.to_vec1::<f32>()?]),
            _ => Ok(cpu.to_vec2::<f32>()?),
        }
    }

    /// Stack equal-length rows into a waveform, keeping a 1-D shape for one row.
    pub fn from_rows(rows: Vec<Vec<f32>>, sample_rate: u32, batched: bool) -> Result<Self> {
        if !batched && rows.len() == 1 {
            let row = rows.into_iter().next().unwrap_or_default();
            return Self::from_samples(row, sample_rate);
        }
        let len = rows.first().map(Vec::len).unwrap_or(0);
        if rows.iter().any(|row| row.len() != len) {
            return Err(EnhanceError::InferenceError {
                reason: "batch rows have different lengths".to_string(),
            });
        }
        let batch = rows.len();
        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        Self::new(Tensor::from_vec(flat, (batch, len), &Device::Cpu)?, sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_samples_is_mono() {
        let wav = Waveform::from_samples(vec![0.0; 441], 44_100).unwrap();
        assert_eq!(wav.num_samples(), 441);
        assert_eq!(wav.batch_size(), 1);
        assert!((wav.duration_secs() - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_rank_three() {
        let t = Tensor::zeros((1usize, 1usize, 4usize), DType::F32, &Device::Cpu).unwrap();
        assert!(Waveform::new(t, 16_000).is_err());
    }

    #[test]
    fn test_to_half_keeps_rate() {
        let wav = Waveform::from_samples(vec![0.25, -0.5], 8_000).unwrap();
        let half = wav.to(&Device::Cpu, DType::F16).unwrap();
        assert_eq!(half.dtype(), DType::F16);
        assert_eq!(half.sample_rate(), 8_000);
        assert_eq!(half.rows_f32().unwrap(), vec![vec![0.25, -0.5]]);
    }

    #[test]
    fn test_rows_round_trip_batched() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let wav = Waveform::from_rows(rows.clone(), 16_000, true).unwrap();
        assert_eq!(wav.batch_size(), 2);
        assert_eq!(wav.rows_f32().unwrap(), rows);
    }
}
