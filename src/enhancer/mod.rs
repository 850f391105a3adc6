//! Speech enhancement façade
//!
//! [`SpeechEnhancer`] is the long-lived service object: it owns the model
//! cache and the inference routine, validates caller parameters and decides
//! the input precision before handing work to the routine.

mod benchmark;
mod params;

pub use benchmark::BenchmarkReport;
pub use params::EnhanceParams;

use std::path::Path;
use std::sync::Arc;

use candle_core::Device;
use tracing::debug;

use crate::audio::Waveform;
use crate::error::Result;
use crate::inference::InferenceRoutine;
use crate::neural::{
    CheckpointSource, DeviceSpec, InputCast, ModelCache, ModelFactory, RunMode,
};

/// Denoise and enhance entry points over a shared model cache
pub struct SpeechEnhancer {
    cache: ModelCache,
    routine: Arc<dyn InferenceRoutine>,
    input_cast: InputCast,
}

impl SpeechEnhancer {
    pub fn new(
        factory: Arc<dyn ModelFactory>,
        source: Arc<dyn CheckpointSource>,
        routine: Arc<dyn InferenceRoutine>,
    ) -> Self {
        Self {
            cache: ModelCache::new(factory, source),
            routine,
            input_cast: InputCast::default(),
        }
    }

    pub fn with_input_cast(mut self, input_cast: InputCast) -> Self {
        self.input_cast = input_cast;
        self
    }

    pub fn input_cast(&self) -> InputCast {
        self.input_cast
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Run only the denoising stage of the model.
    ///
    /// The waveform is moved to the device the cached model was loaded on.
    pub fn denoise(
        &self,
        wav: &Waveform,
        device: DeviceSpec,
        run_mode: RunMode,
        run_dir: Option<&Path>,
    ) -> Result<Waveform> {
        let model = self.cache.get_or_load(run_dir, device, run_mode)?;
        let module = model.denoiser();
        let wav = self.cast_for_denoise(wav, module.device(), run_mode)?;

        self.routine.run(module, &wav, module.device(), None)
    }

    /// Run the full denoise + generative enhancement pipeline.
    ///
    /// Parameters are validated before the model is fetched, so a bad value
    /// never triggers a checkpoint load.
    pub fn enhance(
        &self,
        run_mode: RunMode,
        wav: &Waveform,
        device: DeviceSpec,
        params: &EnhanceParams,
        run_dir: Option<&Path>,
    ) -> Result<Waveform> {
        let config = params.validate()?;

        let model = self.cache.get_or_load(run_dir, device, run_mode)?;
        let module = model.enhancer();
        let wav = self.cast_for_enhance(wav, module.device(), run_mode)?;

        debug!(?config, "Enhancing");
        self.routine.run(module, &wav, module.device(), Some(&config))
    }

    fn cast_for_denoise(&self, wav: &Waveform, device: &Device, run_mode: RunMode) -> Result<Waveform> {
        match self.input_cast.denoise_dtype(run_mode) {
            Some(dtype) => wav.to(device, dtype),
            None => wav.to(device, wav.dtype()),
        }
    }

    fn cast_for_enhance(&self, wav: &Waveform, device: &Device, run_mode: RunMode) -> Result<Waveform> {
        wav.to(device, self.input_cast.enhance_dtype(run_mode))
    }
}
