use std::ops::Deref;
use std::sync::Arc;
use parking_lot::{Mutex, RwLock};
use crate::core::error::{Error, ErrorKind, Result};
use crate::mvcc::controller::{CommitListener, TxId};
use crate::reader::snapshot_state::SnapshotState;

const DEFAULT_FIELD_CACHE_CAPACITY: usize = 16 * 1024;

/// Builds the reader of one index generation.
///
/// `ctx` comes from the first caller that needs the reader, which is not
/// necessarily the thread that published the generation.
pub trait ReaderFactory: Send + Sync {
    type Reader: Send + Sync;
    type Context: ?Sized;

    fn open(&self, as_of: TxId, ctx: &Self::Context) -> Result<Self::Reader>;
}

type Chain<R> = Arc<Vec<Arc<SnapshotState<R>>>>;

/// Generation chain of index snapshots, newest first.
///
/// `publish` is serialized internally; `acquire` and handle release can run
/// from any number of threads at any time. Readers of the chain clone the
/// current `Arc<Vec<_>>`, so they never see a half-applied publish.
pub struct SnapshotHolder<F: ReaderFactory> {
    factory: F,
    chain: RwLock<Chain<F::Reader>>,
    publish_lock: Mutex<()>,
    field_cache_capacity: usize,
}

impl<F: ReaderFactory> SnapshotHolder<F> {
    pub fn new(factory: F) -> Self {
        Self::with_field_cache_capacity(factory, DEFAULT_FIELD_CACHE_CAPACITY)
    }

    pub fn with_field_cache_capacity(factory: F, field_cache_capacity: usize) -> Self {
        SnapshotHolder {
            factory,
            chain: RwLock::new(Arc::new(Vec::new())),
            publish_lock: Mutex::new(()),
            field_cache_capacity,
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Records a new generation for `tx` and reclaims generations no future
    /// reader can resolve to.
    ///
    /// The newest entry at or below `oldest_reachable` is kept as the floor;
    /// everything older leaves the chain and is disposed once its last
    /// holder releases it.
    pub fn publish(&self, tx: TxId, oldest_reachable: TxId) -> Result<()> {
        let _writer = self.publish_lock.lock();

        let current = self.chain.read().clone();
        if let Some(newest) = current.first() {
            if tx <= newest.as_of() {
                return Err(Error::new(
                    ErrorKind::InvalidState,
                    format!("Cannot publish {} after {}", tx, newest.as_of()),
                ));
            }
        }

        let mut next = Vec::with_capacity(current.len() + 1);
        next.push(Arc::new(SnapshotState::new(tx, self.field_cache_capacity)));
        next.extend(current.iter().cloned());

        let removed = match next.iter().position(|s| s.as_of() <= oldest_reachable) {
            Some(floor) => next.split_off(floor + 1),
            None => Vec::new(),
        };

        *self.chain.write() = Arc::new(next);

        if !removed.is_empty() {
            log::debug!(
                "published {}; reclaiming {} snapshot(s) below {}",
                tx,
                removed.len(),
                oldest_reachable
            );
        } else {
            log::debug!("published {}", tx);
        }

        for state in removed {
            state.request_disposal();
        }

        Ok(())
    }

    /// Pins the newest generation visible to `tx`.
    ///
    /// The reader is built from `ctx` if no earlier caller built it. When
    /// building fails the pin is rolled back before the error is returned.
    pub fn acquire(&self, tx: TxId, ctx: &F::Context) -> Result<SnapshotHandle<F::Reader>> {
        loop {
            let chain = self.chain.read().clone();
            let state = chain
                .iter()
                .find(|s| s.as_of() <= tx)
                .cloned()
                .ok_or_else(|| {
                    Error::new(
                        ErrorKind::NoSnapshotAvailable,
                        format!("No index snapshot is visible to {}", tx),
                    )
                })?;

            // Lost a race with reclamation; the state is already out of the chain.
            if !state.try_retain() {
                continue;
            }

            return match state.reader_or_init(|| self.factory.open(state.as_of(), ctx)) {
                Ok(reader) => Ok(SnapshotHandle {
                    state,
                    reader: Some(reader),
                }),
                Err(err) => {
                    state.release();
                    log::warn!("failed to open reader for {}: {}", state.as_of(), err);
                    Err(Error::new(
                        ErrorKind::ReaderConstructionFailed,
                        format!("Opening reader for {} failed: {}", state.as_of(), err),
                    ))
                }
            };
        }
    }

    /// Transaction ids of the visible chain, newest first.
    pub fn chain(&self) -> Vec<TxId> {
        self.chain.read().iter().map(|s| s.as_of()).collect()
    }

    pub fn states(&self) -> Vec<Arc<SnapshotState<F::Reader>>> {
        self.chain.read().as_ref().clone()
    }

    pub fn len(&self) -> usize {
        self.chain.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.read().is_empty()
    }
}

impl<F: ReaderFactory> CommitListener for SnapshotHolder<F> {
    fn on_commit(&self, committed: TxId, oldest_reachable: TxId) -> Result<()> {
        self.publish(committed, oldest_reachable)
    }
}

/// A pinned snapshot. Dropping it releases the pin.
pub struct SnapshotHandle<R> {
    state: Arc<SnapshotState<R>>,
    reader: Option<Arc<R>>,
}

impl<R> SnapshotHandle<R> {
    pub fn as_of(&self) -> TxId {
        self.state.as_of()
    }

    pub fn state(&self) -> &Arc<SnapshotState<R>> {
        &self.state
    }

    pub fn reader(&self) -> &R {
        match &self.reader {
            Some(reader) => reader,
            None => unreachable!("reader is only taken when the handle drops"),
        }
    }

    pub fn release(self) {
        drop(self);
    }
}

impl<R> Deref for SnapshotHandle<R> {
    type Target = R;

    fn deref(&self) -> &R {
        self.reader()
    }
}

impl<R> Drop for SnapshotHandle<R> {
    fn drop(&mut self) {
        // Our reader reference must be gone before the release can tear it down.
        self.reader.take();
        self.state.release();
    }
}
