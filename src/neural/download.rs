//! Default checkpoint resolution
//!
//! When callers do not name a run directory, the cache asks a
//! [`CheckpointSource`] for one. [`HubDownloader`] mirrors the published
//! enhancer checkpoint into a local model directory.

use std::path::{Path, PathBuf};

use super::checkpoint;
use super::hparams::HPARAMS_FILE;
use crate::error::{EnhanceError, Result};

/// Published checkpoint repository
pub const DEFAULT_HUB_URL: &str = "https://huggingface.co/ResembleAI/resemble-enhance";

/// Run directory name of the enhancer checkpoint inside the repository
pub const ENHANCER_RUN: &str = "enhancer_stage2";

/// Resolves the default checkpoint run directory
pub trait CheckpointSource: Send + Sync {
    fn fetch(&self) -> Result<PathBuf>;
}

/// A fixed, already-present run directory
#[derive(Debug, Clone)]
pub struct LocalCheckpoint {
    run_dir: PathBuf,
}

impl LocalCheckpoint {
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
        }
    }
}

impl CheckpointSource for LocalCheckpoint {
    fn fetch(&self) -> Result<PathBuf> {
        if !self.run_dir.is_dir() {
            return Err(EnhanceError::CheckpointNotFound {
                path: self.run_dir.clone(),
            });
        }
        Ok(self.run_dir.clone())
    }
}

/// Downloads the enhancer checkpoint over HTTP on first use
#[derive(Debug, Clone)]
pub struct HubDownloader {
    base_url: String,
    model_dir: PathBuf,
    timeout_secs: u64,
}

impl HubDownloader {
    pub fn new(base_url: impl Into<String>, model_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            model_dir: model_dir.into(),
            timeout_secs: 600,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Per-request HTTP timeout
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Run directory the checkpoint is mirrored into
    pub fn run_dir(&self) -> PathBuf {
        self.model_dir.join(ENHANCER_RUN)
    }

    /// Files fetched, relative to the run directory
    pub fn files() -> Vec<String> {
        let params = checkpoint::params_path(Path::new(""));
        vec![
            HPARAMS_FILE.to_string(),
            params.to_string_lossy().replace('\\', "/"),
        ]
    }

    fn url_for(&self, relative: &str) -> String {
        format!(
            "{}/resolve/main/{}/{}",
            self.base_url.trim_end_matches('/'),
            ENHANCER_RUN,
            relative
        )
    }

    fn is_complete(run_dir: &Path) -> bool {
        run_dir.join(HPARAMS_FILE).is_file() && checkpoint::has_params(run_dir)
    }

    #[cfg(feature = "download")]
    fn download_file(&self, client: &reqwest::blocking::Client, relative: &str) -> Result<()> {
        use std::io::Write;

        let target = self.run_dir().join(relative);
        if target.is_file() {
            return Ok(());
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let url = self.url_for(relative);
        tracing::info!(url = %url, "Downloading checkpoint file");

        let failed = |reason: String| EnhanceError::DownloadFailed {
            url: url.clone(),
            reason,
        };

        let mut response = client
            .get(&url)
            .send()
            .map_err(|e| failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(failed(format!("server returned {}", response.status())));
        }

        let partial = target.with_extension("part");
        let mut file = std::fs::File::create(&partial)?;
        let bytes = response
            .copy_to(&mut file)
            .map_err(|e| failed(e.to_string()))?;
        file.flush()?;
        drop(file);
        std::fs::rename(&partial, &target)?;

        tracing::info!(path = %target.display(), bytes, "Checkpoint file ready");
        Ok(())
    }
}

impl CheckpointSource for HubDownloader {
    #[cfg(feature = "download")]
    fn fetch(&self) -> Result<PathBuf> {
        let run_dir = self.run_dir();
        if Self::is_complete(&run_dir) {
            tracing::debug!(run_dir = %run_dir.display(), "Checkpoint already present");
            return Ok(run_dir);
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| EnhanceError::DownloadFailed {
                url: self.base_url.clone(),
                reason: e.to_string(),
            })?;

        for relative in Self::files() {
            self.download_file(&client, &relative)?;
        }
        Ok(run_dir)
    }

    #[cfg(not(feature = "download"))]
    fn fetch(&self) -> Result<PathBuf> {
        let run_dir = self.run_dir();
        if Self::is_complete(&run_dir) {
            return Ok(run_dir);
        }
        Err(EnhanceError::DownloadUnavailable {
            reason: format!(
                "no checkpoint at {} and download support not compiled (build with --features download; source {})",
                run_dir.display(),
                self.url_for(HPARAMS_FILE)
            ),
        })
    }
}
