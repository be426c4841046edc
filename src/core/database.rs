use std::sync::Arc;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::types::Document;
use crate::index::factory::InvertedIndexFactory;
use crate::index::inverted::InvertedIndex;
use crate::mvcc::controller::{MVCCController, Operation, ReadTransaction, TxId};
use crate::query::request::QueryRequest;
use crate::reader::holder::{SnapshotHandle, SnapshotHolder};
use crate::schema::schema::IndexSchema;
use crate::search::more_like_this::MoreLikeThisRequest;
use crate::search::paged::QueryResults;
use crate::search::read_operation::ReadOperation;
use crate::search::results::QueryOutcome;
use crate::search::retriever::DocumentRetriever;

pub struct Database {
    config: Config,

    schema: Arc<IndexSchema>,

    mvcc: Arc<MVCCController>,
    holder: Arc<SnapshotHolder<InvertedIndexFactory>>, // one generation per commit
}

impl Database {
    pub fn open(schema: IndexSchema, config: Config) -> Result<Self> {
        let schema = Arc::new(schema);
        let mvcc = Arc::new(MVCCController::new());

        let holder = Arc::new(SnapshotHolder::with_field_cache_capacity(
            InvertedIndexFactory::new(schema.clone()),
            config.field_cache_capacity,
        ));

        // Generation of the empty initial version; later ones follow commits.
        holder.publish(mvcc.current_tx(), mvcc.oldest_reachable())?;
        mvcc.subscribe(holder.clone());

        log::debug!("opened database at {}", mvcc.current_tx());

        Ok(Self {
            config,
            schema,
            mvcc,
            holder,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn schema(&self) -> &Arc<IndexSchema> {
        &self.schema
    }

    pub fn mvcc(&self) -> &Arc<MVCCController> {
        &self.mvcc
    }

    pub fn holder(&self) -> &Arc<SnapshotHolder<InvertedIndexFactory>> {
        &self.holder
    }

    pub fn commit(&self, operations: Vec<Operation>) -> Result<TxId> {
        self.mvcc.commit(operations)
    }

    pub fn add_document(&self, doc: Document) -> Result<TxId> {
        self.commit(vec![Operation::AddDocument(doc)])
    }

    /// Adds all entries in one transaction.
    pub fn add_documents<I>(&self, docs: I) -> Result<TxId>
    where
        I: IntoIterator<Item = Document>,
    {
        self.commit(docs.into_iter().map(Operation::AddDocument).collect())
    }

    pub fn delete_document(&self, id: &str) -> Result<TxId> {
        self.commit(vec![Operation::DeleteDocument(id.to_string())])
    }

    pub fn begin_read(&self) -> ReadTransaction {
        self.mvcc.begin_read()
    }

    /// Pins the generation `tx` sees. Building its reader, if needed, uses `tx`.
    pub fn snapshot(&self, tx: &ReadTransaction) -> Result<SnapshotHandle<InvertedIndex>> {
        self.holder.acquire(tx.id(), tx)
    }

    /// Runs `f` against the generation `tx` sees and releases it afterwards.
    pub fn read<T, F>(&self, tx: &ReadTransaction, f: F) -> Result<T>
    where
        F: FnOnce(&ReadOperation<'_>) -> Result<T>,
    {
        let handle = self.snapshot(tx)?;
        let operation = ReadOperation::new(&handle, &self.config);
        f(&operation)
    }

    /// A request for `query` paged by the configured default page size.
    pub fn request(&self, query: impl Into<String>) -> QueryRequest {
        QueryRequest::with_config(query, &self.config)
    }

    /// Standard query in a fresh read transaction.
    pub fn search(&self, request: &QueryRequest) -> Result<QueryOutcome> {
        let tx = self.begin_read();
        self.read(&tx, |op| drain(op.query(request, &DocumentRetriever)?))
    }

    pub fn intersect(&self, request: &QueryRequest) -> Result<QueryOutcome> {
        let tx = self.begin_read();
        self.read(&tx, |op| drain(op.intersect_query(request, &DocumentRetriever)?))
    }

    pub fn more_like_this(&self, request: &MoreLikeThisRequest) -> Result<QueryOutcome> {
        let tx = self.begin_read();
        self.read(&tx, |op| drain(op.more_like_this(request, &DocumentRetriever)?))
    }
}

fn drain(mut results: QueryResults<'_, DocumentRetriever>) -> Result<QueryOutcome> {
    let hits = results.by_ref().collect::<Result<Vec<_>>>()?;
    Ok(QueryOutcome {
        hits,
        total_results: results.total_results(),
        skipped_results: results.skipped_results(),
    })
}
