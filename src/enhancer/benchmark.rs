//! Opt-in repeated-inference timing

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::info;

use super::{EnhanceParams, SpeechEnhancer};
use crate::audio::Waveform;
use crate::error::{EnhanceError, Result};
use crate::neural::{AudioModule, DeviceSpec, EnhanceConfig, RunMode};

/// Timing of repeated inference over one waveform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    /// Stage that was timed ("denoiser" or "enhancer")
    pub stage: String,
    pub runs: usize,
    pub run_ms: Vec<f64>,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    /// Duration of the input audio
    pub audio_secs: f64,
    /// Audio seconds processed per wall-clock second
    pub real_time_factor: f64,
}

impl BenchmarkReport {
    fn from_runs(stage: &str, run_ms: Vec<f64>, audio_secs: f64) -> Self {
        let runs = run_ms.len();
        let mean_ms = if runs == 0 {
            0.0
        } else {
            run_ms.iter().sum::<f64>() / runs as f64
        };
        let min_ms = run_ms.iter().copied().fold(f64::INFINITY, f64::min);
        let max_ms = run_ms.iter().copied().fold(0.0, f64::max);
        let real_time_factor = if mean_ms > 0.0 {
            audio_secs / (mean_ms / 1000.0)
        } else {
            0.0
        };

        Self {
            stage: stage.to_string(),
            runs,
            run_ms,
            mean_ms,
            min_ms: if min_ms.is_finite() { min_ms } else { 0.0 },
            max_ms,
            audio_secs,
            real_time_factor,
        }
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl SpeechEnhancer {
    /// Like [`SpeechEnhancer::enhance`], repeated `runs` times with timing.
    ///
    /// Returns the output of the last run.
    pub fn benchmark_enhance(
        &self,
        run_mode: RunMode,
        wav: &Waveform,
        device: DeviceSpec,
        params: &EnhanceParams,
        run_dir: Option<&Path>,
        runs: usize,
    ) -> Result<(Waveform, BenchmarkReport)> {
        let config = params.validate()?;
        check_runs(runs)?;

        let model = self.cache.get_or_load(run_dir, device, run_mode)?;
        let module = model.enhancer();
        let input = self.cast_for_enhance(wav, module.device(), run_mode)?;
        self.time_runs(module, &input, Some(&config), runs)
    }

    /// Like [`SpeechEnhancer::denoise`], repeated `runs` times with timing.
    pub fn benchmark_denoise(
        &self,
        wav: &Waveform,
        device: DeviceSpec,
        run_mode: RunMode,
        run_dir: Option<&Path>,
        runs: usize,
    ) -> Result<(Waveform, BenchmarkReport)> {
        check_runs(runs)?;

        let model = self.cache.get_or_load(run_dir, device, run_mode)?;
        let module = model.denoiser();
        let input = self.cast_for_denoise(wav, module.device(), run_mode)?;
        self.time_runs(module, &input, None, runs)
    }

    fn time_runs(
        &self,
        module: &dyn AudioModule,
        wav: &Waveform,
        config: Option<&EnhanceConfig>,
        runs: usize,
    ) -> Result<(Waveform, BenchmarkReport)> {
        let mut run_ms = Vec::with_capacity(runs);
        let mut last = None;
        for _ in 0..runs {
            let start = Instant::now();
            last = Some(self.routine.run(module, wav, module.device(), config)?);
            run_ms.push(start.elapsed().as_secs_f64() * 1000.0);
        }

        let output = last.ok_or_else(|| EnhanceError::InferenceError {
            reason: "benchmark produced no output".to_string(),
        })?;
        let report = BenchmarkReport::from_runs(module.name(), run_ms, wav.duration_secs());
        info!(
            stage = %report.stage,
            runs = report.runs,
            mean_ms = report.mean_ms,
            rtf = report.real_time_factor,
            "Benchmark complete"
        );
        Ok((output, report))
    }
}

fn check_runs(runs: usize) -> Result<()> {
    if runs == 0 {
        return Err(EnhanceError::invalid_param("runs", runs, ">= 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_report_statistics() {
        let report = BenchmarkReport::from_runs("enhancer", vec![100.0, 300.0, 200.0], 2.0);
        assert_eq!(report.runs, 3);
        assert_relative_eq!(report.mean_ms, 200.0);
        assert_relative_eq!(report.min_ms, 100.0);
        assert_relative_eq!(report.max_ms, 300.0);
        assert_relative_eq!(report.real_time_factor, 10.0);
    }

    #[test]
    fn test_report_serializes() {
        let report = BenchmarkReport::from_runs("denoiser", vec![5.0], 1.0);
        let json = report.to_json().unwrap();
        assert!(json.contains("\"stage\": \"denoiser\""));
        let back: BenchmarkReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_zero_runs_rejected() {
        assert!(check_runs(0).is_err());
        assert!(check_runs(1).is_ok());
    }
}
