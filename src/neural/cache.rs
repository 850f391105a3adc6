//! Loaded model cache
//!
//! Memoises fully initialised models per (run dir, device, run mode). Each key
//! owns its own load lock, so a model is constructed at most once even when
//! several callers ask for it at the same time, while loads of different keys
//! do not wait on each other. Lookups never wait on a load in progress.
//! Entries live as long as the cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Instant;

use super::checkpoint;
use super::device::DeviceSpec;
use super::download::CheckpointSource;
use super::hparams::HParams;
use super::model::{ModelFactory, SpeechModel};
use super::precision::RunMode;
use crate::error::{EnhanceError, Result};

/// Identity of a cached model
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    /// `None` means "the default checkpoint"
    pub run_dir: Option<PathBuf>,
    pub device: DeviceSpec,
    pub run_mode: RunMode,
}

impl ModelKey {
    pub fn new(run_dir: Option<&Path>, device: DeviceSpec, run_mode: RunMode) -> Self {
        Self {
            run_dir: run_dir.map(Path::to_path_buf),
            device,
            run_mode,
        }
    }
}

/// One key's model plus the lock serialising its construction
#[derive(Default)]
struct Slot {
    loading: Mutex<()>,
    model: OnceLock<Arc<dyn SpeechModel>>,
}

impl Slot {
    fn loaded(&self) -> bool {
        self.model.get().is_some()
    }
}

/// Construct-once store of ready-to-run models
pub struct ModelCache {
    factory: Arc<dyn ModelFactory>,
    source: Arc<dyn CheckpointSource>,
    slots: Mutex<HashMap<ModelKey, Arc<Slot>>>,
}

impl ModelCache {
    pub fn new(factory: Arc<dyn ModelFactory>, source: Arc<dyn CheckpointSource>) -> Self {
        Self {
            factory,
            source,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the model for this key, loading it on first use.
    ///
    /// A failed or panicking load leaves nothing behind for the key; the next
    /// call tries again from scratch.
    pub fn get_or_load(
        &self,
        run_dir: Option<&Path>,
        device: DeviceSpec,
        run_mode: RunMode,
    ) -> Result<Arc<dyn SpeechModel>> {
        let key = ModelKey::new(run_dir, device, run_mode);
        let slot = self.slot(&key)?;
        if let Some(model) = slot.model.get() {
            tracing::debug!(?key, "Model cache hit");
            return Ok(Arc::clone(model));
        }

        // A panic while loading poisons only the unit guard; the model is unset
        let _loading = slot.loading.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(model) = slot.model.get() {
            return Ok(Arc::clone(model));
        }

        match self.load(&key) {
            Ok(model) => Ok(Arc::clone(slot.model.get_or_init(|| Arc::from(model)))),
            Err(err) => {
                self.forget_failed(&key, &slot);
                Err(err)
            }
        }
    }

    fn slot(&self, key: &ModelKey) -> Result<Arc<Slot>> {
        let mut slots = self.slots.lock().map_err(|_| EnhanceError::LockPoisoned)?;
        Ok(Arc::clone(slots.entry(key.clone()).or_default()))
    }

    /// Drop an empty slot nobody else is waiting on.
    fn forget_failed(&self, key: &ModelKey, slot: &Arc<Slot>) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let unused = slots
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && Arc::strong_count(slot) == 2);
        if unused && !slot.loaded() {
            slots.remove(key);
        }
    }

    fn load(&self, key: &ModelKey) -> Result<Box<dyn SpeechModel>> {
        let start = Instant::now();
        let run_dir = match &key.run_dir {
            Some(dir) => dir.clone(),
            None => self.source.fetch()?,
        };
        tracing::info!(
            run_dir = %run_dir.display(),
            device = %key.device,
            run_mode = %key.run_mode,
            "Loading enhancer"
        );

        let hparams = HParams::load(&run_dir)?;
        let mut model = self.factory.build(key.run_mode, &hparams)?;
        let state = checkpoint::load_state_dict(&run_dir)?;
        model.load_state_dict(state)?;
        model.eval();
        model.to_device(&key.device.resolve()?)?;
        if key.run_mode.is_half() {
            model.half()?;
        }

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Enhancer ready"
        );
        Ok(model)
    }

    /// Whether a loaded model exists for `key`
    pub fn contains(&self, key: &ModelKey) -> bool {
        self.slots
            .lock()
            .map(|slots| slots.get(key).is_some_and(|slot| slot.loaded()))
            .unwrap_or(false)
    }

    /// Number of loaded models
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .map(|slots| slots.values().filter(|slot| slot.loaded()).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached model. Callers still holding an `Arc` keep theirs.
    pub fn clear(&self) -> Result<()> {
        self.slots
            .lock()
            .map_err(|_| EnhanceError::LockPoisoned)?
            .clear();
        Ok(())
    }
}
