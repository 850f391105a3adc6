//! Model loading and the model collaborator interfaces
//!
//! This module provides:
//! - `SpeechModel` / `AudioModule` / `ModelFactory` traits for model backends
//! - `ModelCache`, the construct-once loader keyed by checkpoint, device and precision
//! - Checkpoint layout, hyper-parameters and default checkpoint download
//! - A mock backend for testing

mod cache;
pub mod checkpoint;
mod device;
mod download;
mod hparams;
mod mock;
mod model;
mod params;
mod precision;
mod solver;

pub use cache::{ModelCache, ModelKey};
pub use checkpoint::StateDict;
pub use device::{device_name, DeviceSpec};
pub use download::{CheckpointSource, HubDownloader, LocalCheckpoint, DEFAULT_HUB_URL, ENHANCER_RUN};
pub use hparams::{HParams, HPARAMS_FILE};
pub use mock::*;
pub use model::{AudioModule, ModelFactory, SpeechModel};
pub use params::ParameterSet;
pub use precision::{InputCast, RunMode};
pub use solver::{EnhanceConfig, Solver, MAX_NFE};
