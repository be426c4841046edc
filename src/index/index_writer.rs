use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use fst::MapBuilder;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocOrd, Document, FieldValue, DOCUMENT_ID_FIELD};
use crate::index::inverted::{term_key, InvertedIndex};
use crate::index::posting::PostingList;
use crate::schema::schema::{is_range_field, IndexSchema};

/// Accumulates entries and freezes them into an [`InvertedIndex`].
pub struct IndexWriter {
    schema: Arc<IndexSchema>,
    terms: BTreeMap<Vec<u8>, PostingList>,
    stored: Vec<Document>,
    doc_values: HashMap<String, Vec<Option<f64>>>,
    field_lengths: HashMap<String, Vec<u32>>,
}

impl IndexWriter {
    pub fn new(schema: Arc<IndexSchema>) -> Self {
        IndexWriter {
            schema,
            terms: BTreeMap::new(),
            stored: Vec::new(),
            doc_values: HashMap::new(),
            field_lengths: HashMap::new(),
        }
    }

    pub fn add_document(&mut self, doc: &Document) -> Result<DocOrd> {
        let ord = u32::try_from(self.stored.len())
            .map(DocOrd)
            .map_err(|_| Error::new(ErrorKind::InvalidState, "Index is full".to_string()))?;

        self.index_terms(ord, DOCUMENT_ID_FIELD, &[doc.id.clone()]);

        let mut stored = Document::new(doc.id.clone());
        stored.add_field(DOCUMENT_ID_FIELD.to_string(), FieldValue::Text(doc.id.clone()));

        for (name, value) in &doc.fields {
            if name == DOCUMENT_ID_FIELD {
                continue;
            }

            let terms = self.schema.terms_for_value(name, value);
            self.index_terms(ord, name, &terms);

            let lengths = self.field_lengths.entry(name.clone()).or_default();
            lengths.resize(ord.0 as usize + 1, 0);
            lengths[ord.0 as usize] = terms.len() as u32;

            if is_range_field(name) {
                let values = self.doc_values.entry(name.clone()).or_default();
                values.resize(ord.0 as usize + 1, None);
                values[ord.0 as usize] = value.as_number();
            }

            if self.schema.is_stored(name) {
                stored.add_field(name.clone(), value.clone());
            }
        }

        self.stored.push(stored);
        Ok(ord)
    }

    fn index_terms(&mut self, ord: DocOrd, field: &str, terms: &[String]) {
        for text in terms {
            self.terms
                .entry(term_key(field, text))
                .or_insert_with(PostingList::new)
                .record(ord);
        }
    }

    pub fn num_docs(&self) -> usize {
        self.stored.len()
    }

    /// Freezes the accumulated entries. The dictionary is built from the
    /// already sorted term map, as the FST requires.
    pub fn finish(self) -> Result<InvertedIndex> {
        let num_docs = self.stored.len();
        let mut builder = MapBuilder::memory();
        let mut postings = Vec::with_capacity(self.terms.len());

        for (idx, (key, list)) in self.terms.into_iter().enumerate() {
            builder.insert(&key, idx as u64)?;
            postings.push(list);
        }
        let dictionary = builder.into_map();

        let mut doc_values = self.doc_values;
        for values in doc_values.values_mut() {
            values.resize(num_docs, None);
        }

        let mut field_lengths = self.field_lengths;
        let mut avg_field_lengths = HashMap::with_capacity(field_lengths.len());
        for (field, lengths) in field_lengths.iter_mut() {
            lengths.resize(num_docs, 0);
            let total: u64 = lengths.iter().map(|l| *l as u64).sum();
            let avg = if num_docs == 0 { 0.0 } else { total as f32 / num_docs as f32 };
            avg_field_lengths.insert(field.clone(), avg);
        }

        Ok(InvertedIndex {
            schema: self.schema,
            dictionary,
            postings,
            stored: self.stored,
            doc_values,
            field_lengths,
            avg_field_lengths,
        })
    }

    /// Builds an index from a slice of entries in one call.
    pub fn build(schema: Arc<IndexSchema>, docs: &[Document]) -> Result<InvertedIndex> {
        let mut writer = IndexWriter::new(schema);
        for doc in docs {
            writer.add_document(doc)?;
        }
        writer.finish()
    }
}
