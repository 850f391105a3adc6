//! Error handling for speech-enhance
//!
//! Every failure surfaces through [`EnhanceError`]. Nothing in the crate
//! retries; errors carry recovery suggestions for the caller instead.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for speech-enhance operations
pub type Result<T> = std::result::Result<T, EnhanceError>;

/// Main error type for speech-enhance operations
#[derive(Error, Debug)]
pub enum EnhanceError {
    // Validation Errors
    #[error("Invalid parameter '{param}': got {value}, expected {expected}")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    // Checkpoint Errors
    #[error("Checkpoint not found: {}", path.display())]
    CheckpointNotFound { path: PathBuf },

    #[error("Invalid model configuration at {}: {reason}", path.display())]
    ConfigError { path: PathBuf, reason: String },

    #[error("State dict does not match model: {reason}")]
    StateDictMismatch { reason: String },

    #[error("Checkpoint download failed for {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Checkpoint download unavailable: {reason}")]
    DownloadUnavailable { reason: String },

    // Device Errors
    #[error("Device {device} unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },

    // Audio Errors
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid audio: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Audio contains no samples")]
    EmptyAudio,

    // Inference Errors
    #[error("Inference error: {reason}")]
    InferenceError { reason: String },

    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("Model cache lock poisoned")]
    LockPoisoned,

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EnhanceError {
    /// Shorthand for a rejected caller parameter.
    pub fn invalid_param(param: &str, value: impl ToString, expected: &str) -> Self {
        EnhanceError::InvalidParameter {
            param: param.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            EnhanceError::InvalidParameter { .. } => "INVALID_PARAMETER",
            EnhanceError::CheckpointNotFound { .. } => "CHECKPOINT_NOT_FOUND",
            EnhanceError::ConfigError { .. } => "CONFIG_ERROR",
            EnhanceError::StateDictMismatch { .. } => "STATE_DICT_MISMATCH",
            EnhanceError::DownloadFailed { .. } => "DOWNLOAD_FAILED",
            EnhanceError::DownloadUnavailable { .. } => "DOWNLOAD_UNAVAILABLE",
            EnhanceError::DeviceUnavailable { .. } => "DEVICE_UNAVAILABLE",
            EnhanceError::FileNotFound { .. } => "FILE_NOT_FOUND",
            EnhanceError::InvalidAudio { .. } => "INVALID_AUDIO",
            EnhanceError::EmptyAudio => "EMPTY_AUDIO",
            EnhanceError::InferenceError { .. } => "INFERENCE_ERROR",
            EnhanceError::Tensor(_) => "TENSOR_ERROR",
            EnhanceError::LockPoisoned => "LOCK_POISONED",
            EnhanceError::Io(_) => "IO_ERROR",
            EnhanceError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if the caller can fix this error by changing its input
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EnhanceError::InvalidParameter { .. }
                | EnhanceError::CheckpointNotFound { .. }
                | EnhanceError::FileNotFound { .. }
                | EnhanceError::InvalidAudio { .. }
                | EnhanceError::EmptyAudio
                | EnhanceError::DeviceUnavailable { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            EnhanceError::InvalidParameter { .. } => vec![
                "nfe must be in (0, 128]",
                "solver must be one of: midpoint, rk4, euler",
                "lambd and tau must be in [0, 1]",
            ],
            EnhanceError::CheckpointNotFound { .. } => vec![
                "Check the run directory path is correct",
                "The parameter file must live at ds/G/default/mp_rank_00_model_states.pt",
                "Omit the run directory to download the default checkpoint",
            ],
            EnhanceError::ConfigError { .. } => vec![
                "hparams.yaml may be corrupted - re-download the checkpoint",
                "Make sure the run directory belongs to an enhancer checkpoint",
            ],
            EnhanceError::StateDictMismatch { .. } => vec![
                "The checkpoint was trained with different hyper-parameters",
                "Make sure hparams.yaml and the parameter file come from the same run",
            ],
            EnhanceError::DownloadFailed { .. } => vec![
                "Check your network connection",
                "Set SPEECH_ENHANCE_HUB_URL to a reachable mirror",
                "Download the checkpoint manually and pass its run directory",
            ],
            EnhanceError::DownloadUnavailable { .. } => vec![
                "Rebuild with --features download",
                "Pass an explicit run directory instead",
            ],
            EnhanceError::DeviceUnavailable { .. } => vec![
                "Use --device cpu",
                "Rebuild with --features cuda or --features metal",
            ],
            EnhanceError::InvalidAudio { .. } | EnhanceError::EmptyAudio => vec![
                "Try converting the file to WAV format first",
                "Check if the file plays in another application",
            ],
            _ => vec![],
        }
    }
}
