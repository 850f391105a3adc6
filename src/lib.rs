//! Speech Enhance - cached loading and inference for speech enhancement models
//!
//! Two operations are exposed over a waveform:
//! 1. Denoise - run only the denoising stage of the model
//! 2. Enhance - run the full denoise + generative enhancement pipeline
//!
//! # Architecture
//!
//! - `neural`: model collaborator traits, checkpoint layout and the
//!   construct-once model cache
//! - `inference`: chunked whole-waveform inference
//! - `enhancer`: the `SpeechEnhancer` façade (validation, input precision)
//! - `audio`: waveform type, WAV I/O and resampling

pub mod audio;
pub mod cli;
pub mod config;
pub mod enhancer;
pub mod error;
pub mod inference;
pub mod neural;

pub use enhancer::{BenchmarkReport, EnhanceParams, SpeechEnhancer};
pub use error::{EnhanceError, Result};
