//! Bounded memoization of raw recording folders
//!
//! Parsing a subject's raw recordings is the most expensive operation
//! in the crate, and analysis sessions revisit the same few subjects
//! repeatedly. A small least-recently-used cache keyed by the full
//! loader argument tuple absorbs those repeats. Capacity is injectable
//! so tests can exercise eviction deterministically; the process-wide
//! default keeps the 5 most recent sessions.

use crate::storage::RecordingSession;
use crate::Result;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

/// Default capacity of the process-wide cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 5;

static GLOBAL_CACHE: OnceLock<RecordingCache> = OnceLock::new();

/// Cache key: the full argument tuple of the subject-folder loader.
///
/// Ordering inside the phase and stream lists is significant; two keys
/// naming the same phases in different order do not hit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordingKey {
    /// Base storage location
    pub base_path: PathBuf,
    /// Subject identifier
    pub subject: String,
    /// Full ordered phase-name list of the session
    pub phase_names: Vec<String>,
    /// Phases requested from the session, in request order
    pub selected_phases: Vec<String>,
    /// Requested datastreams, in request order
    pub streams: Vec<String>,
}

/// Capacity-bounded LRU cache of parsed recording sessions.
pub struct RecordingCache {
    inner: Mutex<LruCache<RecordingKey, Arc<RecordingSession>>>,
}

impl std::fmt::Debug for RecordingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingCache")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl RecordingCache {
    /// Create a cache holding at most `capacity` sessions.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Return the cached session for `key`, loading and inserting it on
    /// a miss. On overflow the least-recently-used entry is evicted.
    ///
    /// # Errors
    ///
    /// Loader failures propagate unchanged and are not cached.
    pub fn get_or_load(
        &self,
        key: &RecordingKey,
        load: impl FnOnce() -> Result<RecordingSession>,
    ) -> Result<Arc<RecordingSession>> {
        let mut cache = self.lock();
        if let Some(session) = cache.get(key) {
            return Ok(Arc::clone(session));
        }
        drop(cache);

        let session = Arc::new(load()?);
        self.lock().put(key.clone(), Arc::clone(&session));
        Ok(session)
    }

    /// Whether `key` is currently cached. Does not touch recency.
    #[must_use]
    pub fn contains(&self, key: &RecordingKey) -> bool {
        self.lock().contains(key)
    }

    /// Number of cached sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop all cached sessions.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<RecordingKey, Arc<RecordingSession>>> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Process-wide recording cache shared by all datasets that do not
/// inject their own.
pub fn global() -> &'static RecordingCache {
    GLOBAL_CACHE.get_or_init(|| {
        RecordingCache::new(NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    })
}
