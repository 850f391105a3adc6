//! Persisted model hyper-parameters
//!
//! Every checkpoint run directory carries an `hparams.yaml` describing the
//! network the parameters were trained for. Only the inference-relevant
//! fields are typed; everything else is kept in [`HParams::extra`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::solver::Solver;
use crate::error::{EnhanceError, Result};

/// File name of the hyper-parameter file inside a run directory
pub const HPARAMS_FILE: &str = "hparams.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HParams {
    /// Sample rate the model operates at
    pub wav_rate: u32,
    pub n_fft: usize,
    pub win_size: usize,
    pub hop_size: usize,
    pub num_mels: usize,
    pub stft_magnitude_min: f64,
    pub preemphasis: f64,

    pub cfm_solver_method: String,
    pub cfm_solver_nfe: u32,
    pub cfm_time_mapping_divisor: u32,
    pub univnet_nc: usize,
    pub lcfm_latent_dim: usize,
    pub lcfm_training_mode: String,
    pub lcfm_z_scale: f64,
    pub vocoder_extra_dim: usize,

    pub denoiser_run_dir: Option<PathBuf>,
    pub enhancer_stage1_run_dir: Option<PathBuf>,

    /// Training-only settings, preserved verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Default for HParams {
    fn default() -> Self {
        Self {
            wav_rate: 44_100,
            n_fft: 2048,
            win_size: 2048,
            hop_size: 420,
            num_mels: 128,
            stft_magnitude_min: 1e-4,
            preemphasis: 0.97,
            cfm_solver_method: "midpoint".to_string(),
            cfm_solver_nfe: 64,
            cfm_time_mapping_divisor: 4,
            univnet_nc: 96,
            lcfm_latent_dim: 64,
            lcfm_training_mode: "cfm".to_string(),
            lcfm_z_scale: 6.0,
            vocoder_extra_dim: 32,
            denoiser_run_dir: None,
            enhancer_stage1_run_dir: None,
            extra: BTreeMap::new(),
        }
    }
}

impl HParams {
    /// Path of the hyper-parameter file for a run directory
    pub fn path(run_dir: &Path) -> PathBuf {
        run_dir.join(HPARAMS_FILE)
    }

    /// Load and validate `hparams.yaml` from `run_dir`.
    pub fn load(run_dir: &Path) -> Result<Self> {
        let path = Self::path(run_dir);
        if !path.is_file() {
            return Err(EnhanceError::CheckpointNotFound { path });
        }

        let text = std::fs::read_to_string(&path)?;
        let hp = Self::from_yaml(&text).map_err(|reason| EnhanceError::ConfigError {
            path: path.clone(),
            reason,
        })?;

        tracing::debug!(path = %path.display(), wav_rate = hp.wav_rate, "Loaded hparams");
        Ok(hp)
    }

    /// Parse from YAML text; the error string names the offending field.
    pub fn from_yaml(text: &str) -> std::result::Result<Self, String> {
        let hp: HParams = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
        hp.validate()?;
        Ok(hp)
    }

    /// Write as YAML to `<run_dir>/hparams.yaml`.
    pub fn save(&self, run_dir: &Path) -> Result<()> {
        let path = Self::path(run_dir);
        let text = serde_yaml::to_string(self).map_err(|e| EnhanceError::ConfigError {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        std::fs::write(&path, text)?;
        Ok(())
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.wav_rate == 0 {
            return Err("wav_rate must be positive".to_string());
        }
        if self.hop_size == 0 {
            return Err("hop_size must be positive".to_string());
        }
        if self.win_size > self.n_fft {
            return Err(format!(
                "win_size ({}) must not exceed n_fft ({})",
                self.win_size, self.n_fft
            ));
        }
        self.cfm_solver_method
            .parse::<Solver>()
            .map_err(|_| format!("unknown cfm_solver_method '{}'", self.cfm_solver_method))?;
        Ok(())
    }

    /// Default solver recorded at training time
    pub fn default_solver(&self) -> Solver {
        self.cfm_solver_method.parse().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let hp = HParams::from_yaml("wav_rate: 16000\nhop_size: 160\n").unwrap();
        assert_eq!(hp.wav_rate, 16_000);
        assert_eq!(hp.hop_size, 160);
        assert_eq!(hp.n_fft, 2048);
        assert_eq!(hp.default_solver(), Solver::Midpoint);
    }

    #[test]
    fn test_unknown_keys_are_kept() {
        let hp = HParams::from_yaml("wav_rate: 44100\nbatch_size_per_gpu: 8\n").unwrap();
        assert_eq!(
            hp.extra.get("batch_size_per_gpu"),
            Some(&serde_yaml::Value::from(8))
        );
    }

    #[test]
    fn test_rejects_malformed_yaml() {
        assert!(HParams::from_yaml("wav_rate: [not, a, number]").is_err());
        assert!(HParams::from_yaml("wav_rate: 0").is_err());
        assert!(HParams::from_yaml("cfm_solver_method: dopri5").is_err());
        assert!(HParams::from_yaml("win_size: 4096\nn_fft: 1024").is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let hp = HParams {
            wav_rate: 24_000,
            ..HParams::default()
        };
        hp.save(dir.path()).unwrap();
        assert_eq!(HParams::load(dir.path()).unwrap(), hp);
    }

    #[test]
    fn test_missing_file_is_checkpoint_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = HParams::load(dir.path()).unwrap_err();
        assert_eq!(err.error_code(), "CHECKPOINT_NOT_FOUND");
    }
}
