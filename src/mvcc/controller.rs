use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::collections::BTreeMap;
use std::sync::Arc;
use crate::core::types::Document;
use crate::core::error::Result;

/// Transaction ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId(pub u64);

impl TxId {
    pub fn new(id: u64) -> Self {
        TxId(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx#{}", self.0)
    }
}

/// Write operation
#[derive(Debug, Clone)]
pub enum Operation {
    AddDocument(Document),
    /// Removes every entry carrying this id.
    DeleteDocument(String),
    /// Replaces every entry carrying `id` with `doc`.
    UpdateDocument { id: String, doc: Document },
}

/// Notified after each commit, while commits are still serialized.
pub trait CommitListener: Send + Sync {
    fn on_commit(&self, committed: TxId, oldest_reachable: TxId) -> Result<()>;
}

/// Minimal multi-version storage engine.
///
/// Every commit produces a new immutable entry set. Read transactions pin
/// the set that was current when they began; versions older than the oldest
/// pinned one are garbage collected after each commit.
pub struct MVCCController {
    versions: Arc<RwLock<BTreeMap<u64, Arc<Vec<Document>>>>>,
    active_reads: Arc<Mutex<BTreeMap<u64, usize>>>,
    current_version: Arc<AtomicU64>,
    listeners: RwLock<Vec<Arc<dyn CommitListener>>>,
    commit_lock: Mutex<()>,
}

/// A pinned read view; doubles as the context readers are built from.
pub struct ReadTransaction {
    id: TxId,
    documents: Arc<Vec<Document>>,
    active_reads: Arc<Mutex<BTreeMap<u64, usize>>>,
}

impl ReadTransaction {
    pub fn id(&self) -> TxId {
        self.id
    }

    /// Entries visible to this transaction.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }
}

impl Drop for ReadTransaction {
    fn drop(&mut self) {
        let mut active = self.active_reads.lock();
        if let Some(count) = active.get_mut(&self.id.0) {
            *count -= 1;
            if *count == 0 {
                active.remove(&self.id.0);
            }
        }
    }
}

impl std::fmt::Debug for ReadTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadTransaction")
            .field("id", &self.id)
            .field("documents", &self.documents.len())
            .finish()
    }
}

impl MVCCController {
    pub fn new() -> Self {
        let mut versions = BTreeMap::new();
        versions.insert(0, Arc::new(Vec::new()));

        MVCCController {
            versions: Arc::new(RwLock::new(versions)),
            active_reads: Arc::new(Mutex::new(BTreeMap::new())),
            current_version: Arc::new(AtomicU64::new(0)),
            listeners: RwLock::new(Vec::new()),
            commit_lock: Mutex::new(()),
        }
    }

    /// Id of the last committed transaction.
    pub fn current_tx(&self) -> TxId {
        TxId(self.current_version.load(Ordering::Acquire))
    }

    /// Oldest transaction id any present or future reader may still request.
    pub fn oldest_reachable(&self) -> TxId {
        let active = self.active_reads.lock();
        Self::oldest_locked(&active, self.current_version.load(Ordering::Acquire))
    }

    fn oldest_locked(active: &BTreeMap<u64, usize>, current: u64) -> TxId {
        TxId(active.keys().next().copied().unwrap_or(current).min(current))
    }

    pub fn subscribe(&self, listener: Arc<dyn CommitListener>) {
        self.listeners.write().push(listener);
    }

    pub fn begin_read(&self) -> ReadTransaction {
        // Registering under the lock keeps `oldest_reachable` from racing past us.
        let mut active = self.active_reads.lock();
        let id = self.current_version.load(Ordering::Acquire);
        *active.entry(id).or_insert(0) += 1;
        drop(active);

        let documents = self.versions
            .read()
            .get(&id)
            .cloned()
            .unwrap_or_default();

        ReadTransaction {
            id: TxId(id),
            documents,
            active_reads: self.active_reads.clone(),
        }
    }

    pub fn commit(&self, operations: Vec<Operation>) -> Result<TxId> {
        let _serialized = self.commit_lock.lock();

        let current = self.current_version.load(Ordering::Acquire);
        let latest = self.versions
            .read()
            .get(&current)
            .cloned()
            .unwrap_or_default();

        let mut documents: Vec<Document> = latest.as_ref().clone();
        for op in operations {
            match op {
                Operation::AddDocument(doc) => documents.push(doc),
                Operation::DeleteDocument(id) => documents.retain(|d| d.id != id),
                Operation::UpdateDocument { id, doc } => {
                    documents.retain(|d| d.id != id);
                    documents.push(doc);
                }
            }
        }

        let tx = current + 1;
        self.versions.write().insert(tx, Arc::new(documents));

        // Readers register under `active_reads`; holding it until listeners
        // ran means no reader can see `tx` before its generation is published.
        let active = self.active_reads.lock();
        self.current_version.store(tx, Ordering::Release);
        let oldest = Self::oldest_locked(&active, tx);

        log::debug!("committed {} (oldest reachable {})", TxId(tx), oldest);

        // `tx` is already visible, so every listener runs even if one fails.
        let listeners = self.listeners.read().clone();
        let mut first_error = None;
        for listener in listeners {
            if let Err(err) = listener.on_commit(TxId(tx), oldest) {
                log::warn!("commit listener failed for {}: {}", TxId(tx), err);
                first_error.get_or_insert(err);
            }
        }
        drop(active);

        self.gc_old_versions(oldest);

        match first_error {
            Some(err) => Err(err),
            None => Ok(TxId(tx)),
        }
    }

    fn gc_old_versions(&self, oldest: TxId) {
        let mut versions = self.versions.write();
        versions.retain(|&v, _| v >= oldest.0);
    }

    pub fn version_count(&self) -> usize {
        self.versions.read().len()
    }
}

impl Default for MVCCController {
    fn default() -> Self {
        Self::new()
    }
}
