use std::sync::Arc;
use crate::core::error::{Error, ErrorKind, Result};
use crate::index::index_writer::IndexWriter;
use crate::index::inverted::InvertedIndex;
use crate::mvcc::controller::{ReadTransaction, TxId};
use crate::reader::holder::ReaderFactory;
use crate::schema::schema::IndexSchema;

/// Builds an [`InvertedIndex`] from the entries a read transaction sees.
pub struct InvertedIndexFactory {
    schema: Arc<IndexSchema>,
}

impl InvertedIndexFactory {
    pub fn new(schema: Arc<IndexSchema>) -> Self {
        InvertedIndexFactory { schema }
    }

    pub fn schema(&self) -> &Arc<IndexSchema> {
        &self.schema
    }
}

impl ReaderFactory for InvertedIndexFactory {
    type Reader = InvertedIndex;
    type Context = ReadTransaction;

    fn open(&self, as_of: TxId, ctx: &ReadTransaction) -> Result<InvertedIndex> {
        // The entries of `ctx` are exactly those of generation `as_of`.
        if ctx.id() != as_of {
            return Err(Error::new(
                ErrorKind::InvalidState,
                format!("{} cannot build the generation of {}", ctx.id(), as_of),
            ));
        }
        IndexWriter::build(self.schema.clone(), ctx.documents())
    }
}
