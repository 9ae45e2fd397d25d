use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::foundation::error::{SpriteError, SpriteResult};
use crate::segment::backend::{ModelLoader, RembgLoader, Segmenter};
use crate::segment::model::ModelId;

/// Owner of loaded segmentation models, shared across concurrent jobs.
///
/// Each model is loaded at most once for the registry's lifetime, even when many
/// callers ask for it at the same time. A failed load is not remembered; the next
/// request tries again.
pub struct ModelRegistry {
    loader: Arc<dyn ModelLoader>,
    loaded: RwLock<HashMap<ModelId, Arc<dyn Segmenter>>>,
    load_locks: [Mutex<()>; ModelId::ALL.len()],
    loads: AtomicUsize,
}

impl ModelRegistry {
    /// Registry loading models through `loader`.
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            loaded: RwLock::new(HashMap::new()),
            load_locks: std::array::from_fn(|_| Mutex::new(())),
            loads: AtomicUsize::new(0),
        }
    }

    /// Registry backed by the `rembg` program (see [`RembgLoader::from_env`]).
    pub fn rembg() -> Self {
        Self::new(Arc::new(RembgLoader::from_env()))
    }

    /// Return the loaded `model`, loading it on first use.
    pub fn get_or_load(&self, model: ModelId) -> SpriteResult<Arc<dyn Segmenter>> {
        if let Some(seg) = self.cached(model) {
            return Ok(seg);
        }

        let _guard = self.load_locks[model.ordinal()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(seg) = self.cached(model) {
            return Ok(seg);
        }

        let started = std::time::Instant::now();
        let seg = self
            .loader
            .load(model)
            .map_err(|e| SpriteError::ModelInvocation {
                model,
                message: format!("failed to load model: {e:#}"),
            })?;
        self.loads.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            model = %model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model loaded"
        );

        self.loaded
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(model, Arc::clone(&seg));
        Ok(seg)
    }

    /// Models currently loaded, in [`ModelId::ALL`] order.
    pub fn loaded_models(&self) -> Vec<ModelId> {
        let loaded = self.loaded.read().unwrap_or_else(PoisonError::into_inner);
        ModelId::ALL
            .into_iter()
            .filter(|m| loaded.contains_key(m))
            .collect()
    }

    /// Number of successful loads performed so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    fn cached(&self, model: ModelId) -> Option<Arc<dyn Segmenter>> {
        self.loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&model)
            .cloned()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("loaded", &self.loaded_models())
            .field("loads", &self.load_count())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/segment/registry.rs"]
mod tests;
