//! Registry of open containers.
//!
//! The registry memoizes `SlideEngine::open` per container path: opening a
//! container parses its whole IFD chain, so the engines are kept in an LRU
//! and concurrent opens of the same path are collapsed into one parse with a
//! singleflight pattern.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::io::FileRangeReader;
use crate::tile::SlideEngine;

/// State of an in-flight open operation.
struct InFlightOpen {
    /// Wakes waiters when the open completes
    notify: Notify,
    /// Open outcome, set before waiters are notified
    result: Mutex<Option<Result<Arc<SlideEngine<FileRangeReader>>, EngineError>>>,
}

// =============================================================================
// SlideEngineRegistry
// =============================================================================

/// Opens containers on demand and keeps their engines alive.
///
/// Each engine carries its own tile cache and I/O guard, so containers are
/// fully independent of each other.
pub struct SlideEngineRegistry {
    config: EngineConfig,

    /// Opened engines, keyed by container path
    engines: RwLock<LruCache<String, Arc<SlideEngine<FileRangeReader>>>>,

    /// In-flight opens for the singleflight pattern
    in_flight: Mutex<HashMap<String, Arc<InFlightOpen>>>,
}

impl SlideEngineRegistry {
    /// Create a registry; `config.open_containers` bounds the engine LRU.
    pub fn new(config: EngineConfig) -> Self {
        let capacity = std::num::NonZeroUsize::new(config.open_containers)
            .unwrap_or(std::num::NonZeroUsize::new(1).unwrap());
        Self {
            config,
            engines: RwLock::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Get the engine for a container, opening it if not already held.
    ///
    /// # Errors
    /// `ContainerOpen` when the path cannot be read, plus everything
    /// `SlideEngine::open` reports about the container's structure.
    pub async fn open(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Arc<SlideEngine<FileRangeReader>>, EngineError> {
        let key = path.as_ref().to_string_lossy().into_owned();

        // Fast path: already open
        {
            let mut engines = self.engines.write().await;
            if let Some(engine) = engines.get(&key) {
                return Ok(engine.clone());
            }
        }

        loop {
            let state = {
                let mut in_flight = self.in_flight.lock().await;

                if let Some(state) = in_flight.get(&key) {
                    // Another task is opening this container
                    state.clone()
                } else {
                    // We're the leader for this open
                    let state = Arc::new(InFlightOpen {
                        notify: Notify::new(),
                        result: Mutex::new(None),
                    });
                    in_flight.insert(key.clone(), state.clone());
                    drop(in_flight);

                    let result = self.open_engine(&key).await;

                    if let Ok(ref engine) = result {
                        let mut engines = self.engines.write().await;
                        engines.put(key.clone(), engine.clone());
                    }

                    {
                        let mut result_guard = state.result.lock().await;
                        *result_guard = Some(result.clone());
                    }
                    {
                        let mut in_flight = self.in_flight.lock().await;
                        in_flight.remove(&key);
                    }
                    state.notify.notify_waiters();

                    return result;
                }
            };

            let notified = state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let result_guard = state.result.lock().await;
                if let Some(ref result) = *result_guard {
                    return result.clone();
                }
            }

            notified.await;

            let result_guard = state.result.lock().await;
            if let Some(ref result) = *result_guard {
                return result.clone();
            }
        }
    }

    async fn open_engine(
        &self,
        key: &str,
    ) -> Result<Arc<SlideEngine<FileRangeReader>>, EngineError> {
        debug!(path = key, "opening container");

        let reader =
            FileRangeReader::open(key).map_err(|e| EngineError::ContainerOpen(e.to_string()))?;
        let engine = SlideEngine::open(reader, &self.config).await?;

        Ok(Arc::new(engine))
    }

    /// Drop an engine from the registry, forcing a re-open on next access.
    pub async fn invalidate(&self, path: impl AsRef<Path>) {
        let key = path.as_ref().to_string_lossy().into_owned();
        let mut engines = self.engines.write().await;
        engines.pop(&key);
    }

    /// Drop all engines.
    pub async fn clear(&self) {
        let mut engines = self.engines.write().await;
        engines.clear();
    }

    /// Number of engines currently held.
    pub async fn open_count(&self) -> usize {
        let engines = self.engines.read().await;
        engines.len()
    }
}
