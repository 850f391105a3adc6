//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use candle_core::{DType, Device};
use speech_enhance::audio::Waveform;
use speech_enhance::inference::InferenceRoutine;
use speech_enhance::neural::{
    write_mock_checkpoint, AudioModule, CheckpointSource, EnhanceConfig, HParams, LocalCheckpoint,
    MockEnhancerFactory, ModelFactory, RunMode, SpeechModel,
};
use speech_enhance::Result;

/// Counts `build` calls on the mock factory
#[derive(Default)]
pub struct CountingFactory {
    inner: MockEnhancerFactory,
    pub builds: AtomicUsize,
}

impl CountingFactory {
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl ModelFactory for CountingFactory {
    fn build(&self, run_mode: RunMode, hparams: &HParams) -> Result<Box<dyn SpeechModel>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.inner.build(run_mode, hparams)
    }
}

/// Counts `fetch` calls on a local checkpoint
pub struct CountingSource {
    inner: LocalCheckpoint,
    pub fetches: AtomicUsize,
}

impl CountingSource {
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: LocalCheckpoint::new(run_dir),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl CheckpointSource for CountingSource {
    fn fetch(&self) -> Result<PathBuf> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch()
    }
}

/// What a routine call was handed
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineCall {
    pub module: String,
    pub sample_rate: u32,
    pub dtype: DType,
    pub config: Option<EnhanceConfig>,
    /// Both the waveform and the requested device match `module.device()`
    pub on_module_device: bool,
}

/// Records every call and returns the input unchanged
#[derive(Default)]
pub struct RecordingRoutine {
    pub calls: Mutex<Vec<RoutineCall>>,
}

impl RecordingRoutine {
    pub fn calls(&self) -> Vec<RoutineCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl InferenceRoutine for RecordingRoutine {
    fn run(
        &self,
        module: &dyn AudioModule,
        wav: &Waveform,
        device: &Device,
        config: Option<&EnhanceConfig>,
    ) -> Result<Waveform> {
        let on_module_device =
            wav.device().same_device(module.device()) && device.same_device(module.device());
        self.calls.lock().unwrap().push(RoutineCall {
            module: module.name().to_string(),
            sample_rate: wav.sample_rate(),
            dtype: wav.dtype(),
            config: config.copied(),
            on_module_device,
        });
        Ok(wav.clone())
    }
}

/// Mock checkpoint with the given gains in a fresh temp dir
pub fn mock_run_dir(denoiser_gain: f32, enhancer_gain: f32) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_mock_checkpoint(dir.path(), &HParams::default(), denoiser_gain, enhancer_gain).unwrap();
    dir
}

pub fn constant_wav(value: f32, len: usize, sample_rate: u32) -> Waveform {
    Waveform::from_samples(vec![value; len], sample_rate).unwrap()
}

pub fn first_sample(wav: &Waveform) -> f32 {
    wav.rows_f32().unwrap()[0][0]
}
