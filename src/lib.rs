pub mod core;
pub mod analysis;
pub mod schema;
pub mod index;
pub mod scoring;
pub mod query;
pub mod search;
pub mod mvcc;
pub mod reader;

pub use crate::core::config::Config;
pub use crate::core::database::Database;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::types::{DocOrd, Document, FieldValue};
pub use crate::mvcc::controller::{MVCCController, Operation, ReadTransaction, TxId};
pub use crate::query::request::QueryRequest;
pub use crate::reader::{ReaderFactory, SnapshotHandle, SnapshotHolder};
pub use crate::schema::schema::IndexSchema;
pub use crate::search::{DocumentRetriever, ReadOperation, ResultRetriever};

/*
┌──────────────────────────────────────────────────────────────────────────────────┐
│                              SNAPDEX ARCHITECTURE                                │
└──────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── STORAGE (mvcc) ──────────────────────────────────┐
│  struct MVCCController                                                           │
│  • versions: BTreeMap<u64, Arc<Vec<Document>>>   // one entry set per commit     │
│  • active_reads: BTreeMap<u64, usize>            // pinned read transactions     │
│  • listeners: Vec<Arc<dyn CommitListener>>       // notified on every commit     │
│                                                                                  │
│  commit(ops) ──► on_commit(tx, oldest_reachable) ──► SnapshotHolder::publish     │
└──────────────────────────────────────────────────────────────────────────────────┘
                                        │
                                        ▼
┌──────────────────────────────── READER CACHE (reader) ───────────────────────────┐
│  struct SnapshotHolder<F: ReaderFactory>                                         │
│  • chain: RwLock<Arc<Vec<Arc<SnapshotState>>>>   // newest first, copy-on-write  │
│  • publish_lock: Mutex<()>                       // single writer                │
│                                                                                  │
│  struct SnapshotState<R>                                                         │
│  • as_of: TxId                                                                   │
│  • reader: RwLock<Option<Arc<R>>>                // built on first acquire       │
│  • refs: AtomicUsize                             // holders + 1 for the chain    │
│  • disposal_requested / disposed: AtomicBool                                     │
│  • field_cache: LruCache<(DocOrd, FieldSet), Arc<FieldValues>>                   │
│                                                                                  │
│  acquire(tx, ctx) ──► SnapshotHandle (Deref<Target = R>, releases on drop)       │
└──────────────────────────────────────────────────────────────────────────────────┘
                                        │
                                        ▼
┌──────────────────────────────── EXECUTION (search) ──────────────────────────────┐
│  struct ReadOperation<'a> { handle: &'a SnapshotHandle<InvertedIndex> }          │
│  • query()            adaptive over-fetch paging ──► QueryResults iterator       │
│  • intersect_query()  " INTERSECT " clauses, doubling candidate guess            │
│  • more_like_this()   tf-idf term selection from a seed entry                    │
│  • terms()            dictionary walk for one field                              │
│  • index_entries()    raw indexed view of a page                                 │
│  • facet_counts()     per-snapshot cached field values                           │
│                                                                                  │
│  trait ResultRetriever { key(), retrieve() ──► Include(T) | Skip }               │
└──────────────────────────────────────────────────────────────────────────────────┘
                                        │
                                        ▼
┌──────────────────────────────── INDEX (index, query) ────────────────────────────┐
│  struct InvertedIndex                                                            │
│  • dictionary: fst::Map  "field\0term" ──► posting list                          │
│  • stored: Vec<Document>, doc_values for *_Range fields                          │
│                                                                                  │
│  QueryParser ──► Query AST ──► QueryMatcher (roaring bitmaps + BM25)             │
└──────────────────────────────────────────────────────────────────────────────────┘
*/
