//! Environment-driven settings
//!
//! CLI flags take precedence; these are the fallbacks read from the process
//! environment.

use std::env;
use std::path::PathBuf;

use crate::neural::{DeviceSpec, RunMode, DEFAULT_HUB_URL};

pub const ENV_RUN_DIR: &str = "SPEECH_ENHANCE_RUN_DIR";
pub const ENV_DEVICE: &str = "SPEECH_ENHANCE_DEVICE";
pub const ENV_RUN_MODE: &str = "SPEECH_ENHANCE_RUN_MODE";
pub const ENV_MODEL_DIR: &str = "SPEECH_ENHANCE_MODEL_DIR";
pub const ENV_HUB_URL: &str = "SPEECH_ENHANCE_HUB_URL";
pub const ENV_DOWNLOAD_TIMEOUT: &str = "SPEECH_ENHANCE_DOWNLOAD_TIMEOUT_SECS";

#[derive(Debug, Clone)]
pub struct Settings {
    /// Explicit checkpoint run directory; `None` downloads the default
    pub run_dir: Option<PathBuf>,
    pub device: DeviceSpec,
    pub run_mode: RunMode,
    /// Where downloaded checkpoints are mirrored
    pub model_dir: PathBuf,
    pub hub_url: String,
    pub download_timeout_secs: u64,
}

impl Settings {
    /// Read settings from the environment. Unparseable values fall back to
    /// defaults with a warning.
    pub fn from_env() -> Self {
        let device = match env::var(ENV_DEVICE) {
            Ok(value) => value.parse().unwrap_or_else(|e| {
                tracing::warn!("Ignoring {}: {}", ENV_DEVICE, e);
                DeviceSpec::auto()
            }),
            Err(_) => DeviceSpec::auto(),
        };

        let run_mode = match env::var(ENV_RUN_MODE) {
            Ok(value) => value.parse().unwrap_or_else(|e| {
                tracing::warn!("Ignoring {}: {}", ENV_RUN_MODE, e);
                RunMode::default()
            }),
            Err(_) => RunMode::default(),
        };

        Self {
            run_dir: env::var_os(ENV_RUN_DIR).map(PathBuf::from),
            device,
            run_mode,
            model_dir: env::var_os(ENV_MODEL_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(default_model_dir),
            hub_url: env::var(ENV_HUB_URL).unwrap_or_else(|_| DEFAULT_HUB_URL.to_string()),
            download_timeout_secs: env::var(ENV_DOWNLOAD_TIMEOUT)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(600),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            run_dir: None,
            device: DeviceSpec::Cpu,
            run_mode: RunMode::Fp32,
            model_dir: default_model_dir(),
            hub_url: DEFAULT_HUB_URL.to_string(),
            download_timeout_secs: 600,
        }
    }
}

/// `$HOME/.cache/speech-enhance`, or a relative `model_repo` without a home
fn default_model_dir() -> PathBuf {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".cache").join("speech-enhance"))
        .unwrap_or_else(|| PathBuf::from("model_repo"))
}
