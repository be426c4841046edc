use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use parking_lot::RwLock;
use crate::core::error::Result;
use crate::mvcc::controller::TxId;
use crate::reader::field_cache::FieldValueCache;

/// The index as of one transaction.
///
/// `refs` counts every holder plus one reference owned by the snapshot chain.
/// Requesting disposal gives up the chain's reference, so the count reaches
/// zero exactly once: when disposal was requested and the last holder left.
/// That final decrement tears the reader down.
pub struct SnapshotState<R> {
    as_of: TxId,
    reader: RwLock<Option<Arc<R>>>,
    refs: AtomicUsize,
    disposal_requested: AtomicBool,
    disposed: AtomicBool,
    field_cache: FieldValueCache,
}

impl<R> SnapshotState<R> {
    pub(crate) fn new(as_of: TxId, field_cache_capacity: usize) -> Self {
        SnapshotState {
            as_of,
            reader: RwLock::new(None),
            refs: AtomicUsize::new(1),
            disposal_requested: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            field_cache: FieldValueCache::new(field_cache_capacity),
        }
    }

    pub fn as_of(&self) -> TxId {
        self.as_of
    }

    /// Callers currently holding this state. A point-in-time reading.
    pub fn usage_count(&self) -> usize {
        let refs = self.refs.load(Ordering::Acquire);
        if self.disposal_requested.load(Ordering::Acquire) {
            refs
        } else {
            refs.saturating_sub(1)
        }
    }

    pub fn is_disposal_requested(&self) -> bool {
        self.disposal_requested.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub fn is_reader_built(&self) -> bool {
        self.reader.read().is_some()
    }

    pub fn field_cache(&self) -> &FieldValueCache {
        &self.field_cache
    }

    /// Takes a reference unless the state is already being torn down.
    pub(crate) fn try_retain(&self) -> bool {
        let mut current = self.refs.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return false;
            }
            match self.refs.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    pub(crate) fn release(&self) {
        if self.refs.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.dispose();
        }
    }

    /// One-way. Drops the chain's reference.
    pub(crate) fn request_disposal(&self) {
        if !self.disposal_requested.swap(true, Ordering::AcqRel) {
            self.release();
        }
    }

    fn dispose(&self) {
        let reader = self.reader.write().take();
        self.field_cache.clear();
        self.disposed.store(true, Ordering::Release);
        log::debug!(
            "disposed snapshot {} (reader built: {})",
            self.as_of,
            reader.is_some()
        );
        drop(reader);
    }

    /// Returns the reader, building it on first use.
    ///
    /// Construction runs at most once at a time and its result is memoized.
    /// A failed construction leaves the slot empty so a later caller retries.
    pub(crate) fn reader_or_init<F>(&self, init: F) -> Result<Arc<R>>
    where
        F: FnOnce() -> Result<R>,
    {
        if let Some(reader) = self.reader.read().as_ref() {
            return Ok(reader.clone());
        }

        let mut slot = self.reader.write();
        if let Some(reader) = slot.as_ref() {
            return Ok(reader.clone());
        }

        let reader = Arc::new(init()?);
        *slot = Some(reader.clone());
        Ok(reader)
    }
}

impl<R> std::fmt::Debug for SnapshotState<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotState")
            .field("as_of", &self.as_of)
            .field("usage", &self.usage_count())
            .field("disposal_requested", &self.is_disposal_requested())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
