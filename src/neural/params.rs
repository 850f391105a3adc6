//! Learned-parameter storage shared by model implementations
//!
//! A [`ParameterSet`] declares the parameters a network expects (name and
//! shape), receives them from a checkpoint state dict with strict matching,
//! and follows the network across devices and precisions.

use candle_core::{DType, Device, Shape, Tensor};
use std::collections::{BTreeMap, BTreeSet};

use super::checkpoint::StateDict;
use crate::error::{EnhanceError, Result};

#[derive(Debug, Clone)]
pub struct ParameterSet {
    tensors: BTreeMap<String, Tensor>,
    device: Device,
    dtype: DType,
    training: bool,
}

impl ParameterSet {
    /// Declare parameters, zero-initialised on the CPU in f32.
    pub fn zeros<S: Into<Shape>>(
        specs: impl IntoIterator<Item = (String, S)>,
    ) -> Result<Self> {
        let mut tensors = BTreeMap::new();
        for (name, shape) in specs {
            let tensor = Tensor::zeros(shape, DType::F32, &Device::Cpu)?;
            tensors.insert(name, tensor);
        }
        Ok(Self {
            tensors,
            device: Device::Cpu,
            dtype: DType::F32,
            training: true,
        })
    }

    pub fn get(&self, name: &str) -> Result<&Tensor> {
        self.tensors
            .get(name)
            .ok_or_else(|| EnhanceError::StateDictMismatch {
                reason: format!("unknown parameter '{}'", name),
            })
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    pub fn eval(&mut self) {
        self.training = false;
    }

    /// Copy every parameter under `prefix` from `state` into this set.
    ///
    /// Strict: a declared parameter missing from `state`, an entry under
    /// `prefix` that is not declared, or a shape difference fails the whole
    /// load and leaves the set untouched. Returns the consumed keys.
    pub fn load_prefixed(&mut self, state: &StateDict, prefix: &str) -> Result<Vec<String>> {
        let mut missing = Vec::new();
        let mut mismatched = Vec::new();
        let mut loaded = BTreeMap::new();

        for (name, current) in &self.tensors {
            let key = format!("{}{}", prefix, name);
            match state.get(&key) {
                None => missing.push(key),
                Some(src) if src.shape() != current.shape() => mismatched.push(format!(
                    "{}: checkpoint {:?} vs model {:?}",
                    key,
                    src.dims(),
                    current.dims()
                )),
                Some(src) => {
                    let copied = src.to_device(&self.device)?.to_dtype(self.dtype)?;
                    loaded.insert(name.clone(), copied);
                }
            }
        }

        let declared: BTreeSet<String> = self
            .tensors
            .keys()
            .map(|name| format!("{}{}", prefix, name))
            .collect();
        let unexpected: Vec<&String> = state
            .keys()
            .filter(|key| key.starts_with(prefix) && !declared.contains(*key))
            .collect();

        if !missing.is_empty() || !mismatched.is_empty() || !unexpected.is_empty() {
            let mut reasons = Vec::new();
            if !missing.is_empty() {
                missing.sort();
                reasons.push(format!("missing keys: {}", missing.join(", ")));
            }
            if !unexpected.is_empty() {
                let mut unexpected: Vec<&str> = unexpected.iter().map(|k| k.as_str()).collect();
                unexpected.sort_unstable();
                reasons.push(format!("unexpected keys: {}", unexpected.join(", ")));
            }
            if !mismatched.is_empty() {
                reasons.push(format!("shape mismatch: {}", mismatched.join("; ")));
            }
            return Err(EnhanceError::StateDictMismatch {
                reason: reasons.join("; "),
            });
        }

        let keys = declared.into_iter().collect();
        self.tensors = loaded;
        Ok(keys)
    }

    pub fn to_device(&mut self, device: &Device) -> Result<()> {
        if self.device.same_device(device) {
            return Ok(());
        }
        for tensor in self.tensors.values_mut() {
            *tensor = tensor.to_device(device)?;
        }
        self.device = device.clone();
        Ok(())
    }

    /// Convert floating point parameters to f16.
    pub fn half(&mut self) -> Result<()> {
        for tensor in self.tensors.values_mut() {
            if tensor.dtype().is_float() {
                *tensor = tensor.to_dtype(DType::F16)?;
            }
        }
        self.dtype = DType::F16;
        Ok(())
    }
}
