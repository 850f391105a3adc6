//! Mock model backend
//!
//! A deterministic stand-in for the neural enhancer, used for pipeline tests
//! and the CLI pipeline check. Each stage holds a single learned `gain`, so a
//! loaded checkpoint visibly changes the output:
//!
//! - denoiser: `x * denoiser.gain`
//! - enhancer: `(1 - lambd) * x + lambd * enhancer.gain * denoiser(x)`

use candle_core::{DType, Device, Tensor};
use std::path::Path;

use super::checkpoint::{self, StateDict};
use super::hparams::HParams;
use super::model::{AudioModule, ModelFactory, SpeechModel};
use super::params::ParameterSet;
use super::precision::RunMode;
use super::solver::EnhanceConfig;
use crate::error::{EnhanceError, Result};

pub const DENOISER_PREFIX: &str = "denoiser.";
pub const ENHANCER_PREFIX: &str = "enhancer.";
const GAIN: &str = "gain";

/// Builds [`MockSpeechModel`] instances
#[derive(Debug, Default, Clone, Copy)]
pub struct MockEnhancerFactory;

impl MockEnhancerFactory {
    pub fn new() -> Self {
        Self
    }
}

impl ModelFactory for MockEnhancerFactory {
    fn build(&self, _run_mode: RunMode, hparams: &HParams) -> Result<Box<dyn SpeechModel>> {
        Ok(Box::new(MockSpeechModel::new(hparams.clone())?))
    }
}

/// One gain stage
pub struct MockStage {
    name: &'static str,
    wav_rate: u32,
    params: ParameterSet,
}

impl MockStage {
    fn new(name: &'static str, wav_rate: u32) -> Result<Self> {
        Ok(Self {
            name,
            wav_rate,
            params: ParameterSet::zeros([(GAIN.to_string(), (1usize,))])?,
        })
    }

    fn gain(&self) -> Result<&Tensor> {
        self.params.get(GAIN)
    }

    /// Multiply `wav` by this stage's gain in the input's dtype.
    fn apply_gain(&self, wav: &Tensor) -> Result<Tensor> {
        let gain = self.gain()?.to_dtype(wav.dtype())?;
        Ok(wav.broadcast_mul(&gain)?)
    }
}

impl AudioModule for MockStage {
    fn name(&self) -> &str {
        self.name
    }

    fn wav_rate(&self) -> u32 {
        self.wav_rate
    }

    fn device(&self) -> &Device {
        self.params.device()
    }

    fn dtype(&self) -> DType {
        self.params.dtype()
    }

    fn forward(&self, wav: &Tensor, _config: Option<&EnhanceConfig>) -> Result<Tensor> {
        self.apply_gain(wav)
    }
}

/// The denoise + enhance pipeline over two gain stages
pub struct MockSpeechModel {
    hparams: HParams,
    denoiser: MockStage,
    enhancer: MockEnhancerStage,
}

/// Enhancer stage; borrows the denoiser gain at forward time
pub struct MockEnhancerStage {
    stage: MockStage,
    denoiser_gain: Option<Tensor>,
}

impl AudioModule for MockEnhancerStage {
    fn name(&self) -> &str {
        self.stage.name
    }

    fn wav_rate(&self) -> u32 {
        self.stage.wav_rate
    }

    fn device(&self) -> &Device {
        self.stage.device()
    }

    fn dtype(&self) -> DType {
        self.stage.dtype()
    }

    fn forward(&self, wav: &Tensor, config: Option<&EnhanceConfig>) -> Result<Tensor> {
        let config = config.copied().unwrap_or_default();
        let denoiser_gain = self
            .denoiser_gain
            .as_ref()
            .ok_or_else(|| EnhanceError::InferenceError {
                reason: "enhancer used before parameters were loaded".to_string(),
            })?
            .to_dtype(wav.dtype())?;
        let denoised = wav.broadcast_mul(&denoiser_gain)?;
        let enhanced = self.stage.apply_gain(&denoised)?;

        let lambd = config.lambd as f64;
        let dry = wav.affine(1.0 - lambd, 0.0)?;
        let wet = enhanced.affine(lambd, 0.0)?;
        Ok((dry + wet)?)
    }
}

impl MockSpeechModel {
    pub fn new(hparams: HParams) -> Result<Self> {
        let wav_rate = hparams.wav_rate;
        Ok(Self {
            hparams,
            denoiser: MockStage::new("denoiser", wav_rate)?,
            enhancer: MockEnhancerStage {
                stage: MockStage::new("enhancer", wav_rate)?,
                denoiser_gain: None,
            },
        })
    }

    fn sync_denoiser_gain(&mut self) -> Result<()> {
        self.enhancer.denoiser_gain = Some(self.denoiser.gain()?.clone());
        Ok(())
    }
}

impl SpeechModel for MockSpeechModel {
    fn hparams(&self) -> &HParams {
        &self.hparams
    }

    fn load_state_dict(&mut self, state: StateDict) -> Result<()> {
        let unexpected: Vec<&str> = state
            .keys()
            .filter(|k| !k.starts_with(DENOISER_PREFIX) && !k.starts_with(ENHANCER_PREFIX))
            .map(|k| k.as_str())
            .collect();
        if !unexpected.is_empty() {
            return Err(EnhanceError::StateDictMismatch {
                reason: format!("unexpected keys: {}", unexpected.join(", ")),
            });
        }

        self.denoiser.params.load_prefixed(&state, DENOISER_PREFIX)?;
        self.enhancer.stage.params.load_prefixed(&state, ENHANCER_PREFIX)?;
        self.sync_denoiser_gain()
    }

    fn eval(&mut self) {
        self.denoiser.params.eval();
        self.enhancer.stage.params.eval();
    }

    fn is_training(&self) -> bool {
        self.denoiser.params.is_training() || self.enhancer.stage.params.is_training()
    }

    fn to_device(&mut self, device: &Device) -> Result<()> {
        self.denoiser.params.to_device(device)?;
        self.enhancer.stage.params.to_device(device)?;
        self.sync_denoiser_gain()
    }

    fn half(&mut self) -> Result<()> {
        self.denoiser.params.half()?;
        self.enhancer.stage.params.half()?;
        self.sync_denoiser_gain()
    }

    fn denoiser(&self) -> &dyn AudioModule {
        &self.denoiser
    }

    fn enhancer(&self) -> &dyn AudioModule {
        &self.enhancer
    }
}

/// Write a mock checkpoint (hparams + converted parameter file) to `run_dir`.
pub fn write_mock_checkpoint(
    run_dir: &Path,
    hparams: &HParams,
    denoiser_gain: f32,
    enhancer_gain: f32,
) -> Result<()> {
    std::fs::create_dir_all(run_dir)?;
    hparams.save(run_dir)?;

    let mut state = StateDict::new();
    state.insert(
        format!("{}{}", DENOISER_PREFIX, GAIN),
        Tensor::new(&[denoiser_gain], &Device::Cpu)?,
    );
    state.insert(
        format!("{}{}", ENHANCER_PREFIX, GAIN),
        Tensor::new(&[enhancer_gain], &Device::Cpu)?,
    );
    checkpoint::save_state_dict(run_dir, &state)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn loaded_model(dir: &Path) -> MockSpeechModel {
        loaded_with_gains(dir, 0.5, 2.0)
    }

    fn loaded_with_gains(dir: &Path, denoiser_gain: f32, enhancer_gain: f32) -> MockSpeechModel {
        write_mock_checkpoint(dir, &HParams::default(), denoiser_gain, enhancer_gain).unwrap();
        let mut model = MockSpeechModel::new(HParams::default()).unwrap();
        model
            .load_state_dict(checkpoint::load_state_dict(dir).unwrap())
            .unwrap();
        model.eval();
        model
    }

    #[test]
    fn test_denoiser_applies_loaded_gain() {
        let dir = tempfile::tempdir().unwrap();
        let model = loaded_model(dir.path());
        let wav = Tensor::new(&[[1.0f32, -2.0, 4.0]], &Device::Cpu).unwrap();

        let out = model.denoiser().forward(&wav, None).unwrap();
        assert_eq!(out.to_vec2::<f32>().unwrap(), vec![vec![0.5, -1.0, 2.0]]);
    }

    #[test]
    fn test_enhancer_blends_by_lambd() {
        let dir = tempfile::tempdir().unwrap();
        let model = loaded_with_gains(dir.path(), 1.0, 3.0);
        let wav = Tensor::new(&[[1.0f32]], &Device::Cpu).unwrap();

        // (1 - λ) x + λ * 1.0 * 3.0 * x
        let outputs: Vec<f32> = [0.0f32, 0.5, 1.0]
            .iter()
            .map(|&lambd| {
                let config = EnhanceConfig {
                    lambd,
                    ..EnhanceConfig::default()
                };
                model.enhancer().forward(&wav, Some(&config)).unwrap().to_vec2::<f32>().unwrap()[0][0]
            })
            .collect();

        assert_relative_eq!(outputs[0], 1.0);
        assert_relative_eq!(outputs[1], 2.0);
        assert_relative_eq!(outputs[2], 3.0);
    }

    #[test]
    fn test_rejects_foreign_keys() {
        let mut model = MockSpeechModel::new(HParams::default()).unwrap();
        let mut state = StateDict::new();
        state.insert("vocoder.weight".to_string(), Tensor::new(&[1.0f32], &Device::Cpu).unwrap());
        assert!(model.load_state_dict(state).is_err());
    }

    #[test]
    fn test_half_converts_stages() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = loaded_model(dir.path());
        model.half().unwrap();
        assert_eq!(model.denoiser().dtype(), DType::F16);
        assert_eq!(model.enhancer().dtype(), DType::F16);
        assert!(!model.is_training());
    }
}
