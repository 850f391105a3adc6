//! Model collaborator traits
//!
//! The network architecture lives outside this crate. A backend provides a
//! [`ModelFactory`] that builds an untrained [`SpeechModel`] from the run's
//! hyper-parameters; the cache then loads weights into it and places it.

use candle_core::{DType, Device, Tensor};

use super::checkpoint::StateDict;
use super::hparams::HParams;
use super::precision::RunMode;
use super::solver::EnhanceConfig;
use crate::error::Result;

/// A runnable waveform-to-waveform network stage
pub trait AudioModule: Send + Sync {
    /// Stage name for logs (e.g. "denoiser")
    fn name(&self) -> &str;

    /// Sample rate the stage expects and produces
    fn wav_rate(&self) -> u32;

    /// Device the stage's parameters live on
    fn device(&self) -> &Device;

    /// Dtype the stage's parameters are stored in
    fn dtype(&self) -> DType;

    /// Run the stage on a `(batch, samples)` tensor.
    ///
    /// `config` carries the per-call solver settings for generative stages;
    /// stages without a solver ignore it.
    fn forward(&self, wav: &Tensor, config: Option<&EnhanceConfig>) -> Result<Tensor>;
}

/// Full enhancement model: a denoiser followed by a generative enhancer
pub trait SpeechModel: Send + Sync {
    fn hparams(&self) -> &HParams;

    /// Copy checkpoint parameters into the model (strict matching).
    fn load_state_dict(&mut self, state: StateDict) -> Result<()>;

    /// Switch off training-only behaviour such as dropout.
    fn eval(&mut self);

    fn is_training(&self) -> bool;

    fn to_device(&mut self, device: &Device) -> Result<()>;

    /// Convert parameters to f16.
    fn half(&mut self) -> Result<()>;

    /// The denoising sub-component on its own
    fn denoiser(&self) -> &dyn AudioModule;

    /// The complete denoise + enhance pipeline
    fn enhancer(&self) -> &dyn AudioModule;
}

/// Builds untrained model instances for a backend
pub trait ModelFactory: Send + Sync {
    fn build(&self, run_mode: RunMode, hparams: &HParams) -> Result<Box<dyn SpeechModel>>;
}
