//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::RunArgs;
use crate::audio::{read_wav, write_wav};
use crate::config::Settings;
use crate::enhancer::{EnhanceParams, SpeechEnhancer};
use crate::error::{EnhanceError, Result};
use crate::inference::ChunkedInference;
use crate::neural::{
    device_name, write_mock_checkpoint, DeviceSpec, HParams, HubDownloader, InputCast,
    MockEnhancerFactory, RunMode,
};

/// Fully resolved options for one `run` invocation
#[derive(Debug, Clone)]
struct RunPlan {
    device: DeviceSpec,
    run_mode: RunMode,
    input_cast: InputCast,
    run_dir: Option<PathBuf>,
    params: EnhanceParams,
}

impl RunPlan {
    /// Merge flags over environment settings and validate everything up front.
    fn resolve(args: &RunArgs, settings: &Settings) -> Result<Self> {
        let device = match &args.device {
            Some(value) => value.parse()?,
            None => settings.device,
        };
        let run_mode = match &args.run_mode {
            Some(value) => value.parse()?,
            None => settings.run_mode,
        };
        let input_cast: InputCast = args.input_cast.parse()?;

        let params = EnhanceParams::new(args.nfe, args.solver.clone(), args.lambd, args.tau);
        if !args.denoise_only {
            params.validate()?;
        }
        if args.bench_runs == Some(0) {
            return Err(EnhanceError::invalid_param("bench-runs", 0, ">= 1"));
        }

        Ok(Self {
            device,
            run_mode,
            input_cast,
            run_dir: args.run_dir.clone().or_else(|| settings.run_dir.clone()),
            params,
        })
    }
}

/// Files under `in_dir` ending in `suffix`, sorted
fn collect_inputs(in_dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    if !in_dir.is_dir() {
        return Err(EnhanceError::FileNotFound {
            path: in_dir.display().to_string(),
            source: None,
        });
    }

    let mut paths: Vec<PathBuf> = WalkDir::new(in_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(suffix))
        .map(|entry| entry.into_path())
        .collect();
    paths.sort();
    Ok(paths)
}

/// Process every matching file under `in_dir` into `out_dir`.
pub fn run(args: &RunArgs) -> Result<()> {
    let settings = Settings::from_env();
    let plan = RunPlan::resolve(args, &settings)?;

    let inputs = collect_inputs(&args.in_dir, &args.suffix)?;
    if inputs.is_empty() {
        warn!(
            "No files ending in '{}' under {}",
            args.suffix,
            args.in_dir.display()
        );
        return Ok(());
    }

    let source = HubDownloader::new(settings.hub_url.clone(), settings.model_dir.clone())
        .with_timeout(settings.download_timeout_secs);
    debug!(
        run_dir = %source.run_dir().display(),
        timeout_secs = source.timeout_secs(),
        "Default checkpoint source"
    );
    let enhancer = SpeechEnhancer::new(
        Arc::new(MockEnhancerFactory::new()),
        Arc::new(source),
        Arc::new(ChunkedInference::default()),
    )
    .with_input_cast(plan.input_cast);

    info!(
        files = inputs.len(),
        device = %plan.device,
        run_mode = %plan.run_mode,
        denoise_only = args.denoise_only,
        "Processing"
    );

    for (i, input) in inputs.iter().enumerate() {
        let relative = input.strip_prefix(&args.in_dir).unwrap_or(input.as_path());
        let output = args.out_dir.join(relative);
        println!("[{}/{}] {}", i + 1, inputs.len(), relative.display());

        let wav = read_wav(input)?;
        let run_dir = plan.run_dir.as_deref();
        let processed = match (args.denoise_only, args.bench_runs) {
            (true, None) => enhancer.denoise(&wav, plan.device, plan.run_mode, run_dir)?,
            (false, None) => {
                enhancer.enhance(plan.run_mode, &wav, plan.device, &plan.params, run_dir)?
            }
            (true, Some(runs)) => {
                let (out, report) =
                    enhancer.benchmark_denoise(&wav, plan.device, plan.run_mode, run_dir, runs)?;
                println!("{}", report.to_json()?);
                out
            }
            (false, Some(runs)) => {
                let (out, report) = enhancer.benchmark_enhance(
                    plan.run_mode,
                    &wav,
                    plan.device,
                    &plan.params,
                    run_dir,
                    runs,
                )?;
                println!("{}", report.to_json()?);
                out
            }
        };

        write_wav(&output, &processed)?;
    }

    println!("Processed {} file(s) into {}", inputs.len(), args.out_dir.display());
    Ok(())
}

/// Write a mock checkpoint run directory.
pub fn mock_checkpoint(dir: &Path, denoiser_gain: f32, enhancer_gain: f32) -> Result<()> {
    info!("Writing mock checkpoint to: {}", dir.display());

    write_mock_checkpoint(dir, &HParams::default(), denoiser_gain, enhancer_gain)?;

    println!("Mock checkpoint written: {}", dir.display());
    println!("  denoiser gain: {}", denoiser_gain);
    println!("  enhancer gain: {}", enhancer_gain);

    Ok(())
}

/// Print the device `auto` resolves to.
pub fn device_info() -> Result<()> {
    let spec = DeviceSpec::auto();
    let device = spec.resolve()?;

    println!("Requested: auto");
    println!("Resolved:  {} ({})", spec, device_name(&device));
    println!("CUDA support compiled: {}", cfg!(feature = "cuda"));
    println!("Metal support compiled: {}", cfg!(feature = "metal"));

    Ok(())
}
