//! Checkpoint directory layout and parameter file loading
//!
//! Parameters live at `ds/G/default/mp_rank_00_model_states.pt` inside a run
//! directory, a pickle whose `"module"` entry maps parameter names to tensors.
//! Checkpoints converted offline may ship the same mapping as `.safetensors`.

use candle_core::{Device, Tensor};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::{EnhanceError, Result};

/// Parameter name to tensor mapping
pub type StateDict = HashMap<String, Tensor>;

/// Location of the parameter file relative to a run directory
pub const PARAMS_SUBDIR: [&str; 3] = ["ds", "G", "default"];
pub const PARAMS_STEM: &str = "mp_rank_00_model_states";

/// Key of the module state inside the pickled checkpoint
pub const MODULE_KEY: &str = "module";

/// Path of the pickled parameter file
pub fn params_path(run_dir: &Path) -> PathBuf {
    params_dir(run_dir).join(format!("{}.pt", PARAMS_STEM))
}

/// Path of the converted parameter file
pub fn safetensors_path(run_dir: &Path) -> PathBuf {
    params_dir(run_dir).join(format!("{}.safetensors", PARAMS_STEM))
}

fn params_dir(run_dir: &Path) -> PathBuf {
    PARAMS_SUBDIR
        .iter()
        .fold(run_dir.to_path_buf(), |path, part| path.join(part))
}

/// Whether `run_dir` holds a parameter file in either format
pub fn has_params(run_dir: &Path) -> bool {
    params_path(run_dir).is_file() || safetensors_path(run_dir).is_file()
}

/// Load the module state dict onto the CPU.
///
/// The `.pt` file wins when both formats are present.
pub fn load_state_dict(run_dir: &Path) -> Result<StateDict> {
    let start = Instant::now();
    let pt = params_path(run_dir);
    let state = if pt.is_file() {
        let tensors = candle_core::pickle::read_all_with_key(&pt, Some(MODULE_KEY))?;
        tensors.into_iter().collect::<StateDict>()
    } else {
        let st = safetensors_path(run_dir);
        if !st.is_file() {
            return Err(EnhanceError::CheckpointNotFound { path: pt });
        }
        candle_core::safetensors::load(&st, &Device::Cpu)?
    };

    if state.is_empty() {
        return Err(EnhanceError::StateDictMismatch {
            reason: format!("no '{}' parameters in checkpoint", MODULE_KEY),
        });
    }

    tracing::info!(
        run_dir = %run_dir.display(),
        tensors = state.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Loaded state dict"
    );
    Ok(state)
}

/// Write a state dict in the converted `.safetensors` layout.
pub fn save_state_dict(run_dir: &Path, state: &StateDict) -> Result<PathBuf> {
    let path = safetensors_path(run_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    candle_core::safetensors::save(state, &path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Minimal protocol-2 pickle of `{"module": OrderedDict(name -> f32[1])}`
    /// in the layout `torch.save` produces
    fn torch_pickle(names: &[&str]) -> Vec<u8> {
        fn unicode(out: &mut Vec<u8>, s: &str) {
            out.push(b'X');
            out.extend((s.len() as u32).to_le_bytes());
            out.extend(s.as_bytes());
        }
        fn global(out: &mut Vec<u8>, module: &str, class: &str) {
            out.push(b'c');
            out.extend(format!("{}\n{}\n", module, class).as_bytes());
        }
        fn ordered_dict(out: &mut Vec<u8>) {
            global(out, "collections", "OrderedDict");
            out.extend(b")R");
        }

        let mut out = vec![0x80, 0x02, b'}'];
        unicode(&mut out, MODULE_KEY);
        ordered_dict(&mut out);
        for (i, name) in names.iter().enumerate() {
            unicode(&mut out, name);
            global(&mut out, "torch._utils", "_rebuild_tensor_v2");
            out.push(b'(');
            // ('storage', FloatStorage, key, 'cpu', numel) as a persistent id
            out.push(b'(');
            unicode(&mut out, "storage");
            global(&mut out, "torch", "FloatStorage");
            unicode(&mut out, &i.to_string());
            unicode(&mut out, "cpu");
            out.extend([b'K', 1, b't', b'Q']);
            // offset, size, stride, requires_grad, hooks
            out.extend([b'K', 0, b'K', 1, 0x85, b'K', 1, 0x85, 0x89]);
            ordered_dict(&mut out);
            out.extend(b"tRs");
        }
        out.extend(b"s.");
        out
    }

    fn write_torch_checkpoint(run_dir: &Path, params: &[(&str, f32)]) {
        let path = params_path(run_dir);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        let names: Vec<&str> = params.iter().map(|(name, _)| *name).collect();
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        let mut zip = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
        zip.start_file("archive/data.pkl", options).unwrap();
        zip.write_all(&torch_pickle(&names)).unwrap();
        for (i, (_, value)) in params.iter().enumerate() {
            zip.start_file(format!("archive/data/{}", i), options).unwrap();
            zip.write_all(&value.to_le_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_params_path_layout() {
        let path = params_path(Path::new("/runs/enhancer_stage2"));
        assert_eq!(
            path,
            PathBuf::from("/runs/enhancer_stage2/ds/G/default/mp_rank_00_model_states.pt")
        );
    }

    #[test]
    fn test_missing_params_names_pt_path() {
        let dir = tempfile::tempdir().unwrap();
        match load_state_dict(dir.path()) {
            Err(EnhanceError::CheckpointNotFound { path }) => {
                assert_eq!(path, params_path(dir.path()))
            }
            other => panic!("expected CheckpointNotFound, got {:?}", other.map(|s| s.len())),
        }
    }

    #[test]
    fn test_safetensors_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = StateDict::new();
        state.insert(
            "denoiser.gain".to_string(),
            Tensor::new(&[0.5f32], &Device::Cpu).unwrap(),
        );
        save_state_dict(dir.path(), &state).unwrap();

        assert!(has_params(dir.path()));
        let loaded = load_state_dict(dir.path()).unwrap();
        let gain = loaded["denoiser.gain"].to_vec1::<f32>().unwrap();
        assert_eq!(gain, vec![0.5]);
    }

    #[test]
    fn test_torch_checkpoint_module_entry() {
        let dir = tempfile::tempdir().unwrap();
        write_torch_checkpoint(dir.path(), &[("denoiser.gain", 0.25), ("enhancer.gain", 4.0)]);

        let loaded = load_state_dict(dir.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["denoiser.gain"].to_vec1::<f32>().unwrap(), vec![0.25]);
        assert_eq!(loaded["enhancer.gain"].to_vec1::<f32>().unwrap(), vec![4.0]);
    }

    #[test]
    fn test_torch_checkpoint_wins_over_safetensors() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = StateDict::new();
        state.insert(
            "denoiser.gain".to_string(),
            Tensor::new(&[0.5f32], &Device::Cpu).unwrap(),
        );
        save_state_dict(dir.path(), &state).unwrap();
        write_torch_checkpoint(dir.path(), &[("denoiser.gain", 2.0)]);

        let loaded = load_state_dict(dir.path()).unwrap();
        assert_eq!(loaded["denoiser.gain"].to_vec1::<f32>().unwrap(), vec![2.0]);
    }
}
