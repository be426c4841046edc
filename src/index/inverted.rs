use std::collections::{BTreeMap, HashMap};
use std::ops::ControlFlow;
use std::sync::Arc;
use fst::{IntoStreamer, Map, Streamer};
use serde::Serialize;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocOrd, Document};
use crate::index::posting::PostingList;
use crate::schema::schema::IndexSchema;

/// Separates the field name from the term text inside dictionary keys.
/// Zero sorts first, so all terms of one field are contiguous.
const TERM_SEPARATOR: u8 = 0;

pub(crate) fn term_key(field: &str, text: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(field.len() + 1 + text.len());
    key.extend_from_slice(field.as_bytes());
    key.push(TERM_SEPARATOR);
    key.extend_from_slice(text.as_bytes());
    key
}

fn field_prefix(field: &str) -> Vec<u8> {
    term_key(field, "")
}

fn split_key(key: &[u8]) -> Option<(&str, &str)> {
    let sep = key.iter().position(|b| *b == TERM_SEPARATOR)?;
    let field = std::str::from_utf8(&key[..sep]).ok()?;
    let text = std::str::from_utf8(&key[sep + 1..]).ok()?;
    Some((field, text))
}

/// Immutable inverted index: one generation of the search index.
///
/// Built once by [`IndexWriter`](crate::index::index_writer::IndexWriter) and
/// never mutated afterwards, so any number of threads can query it.
pub struct InvertedIndex {
    pub(crate) schema: Arc<IndexSchema>,
    pub(crate) dictionary: Map<Vec<u8>>,
    pub(crate) postings: Vec<PostingList>,
    pub(crate) stored: Vec<Document>,
    pub(crate) doc_values: HashMap<String, Vec<Option<f64>>>,
    pub(crate) field_lengths: HashMap<String, Vec<u32>>,
    pub(crate) avg_field_lengths: HashMap<String, f32>,
}

/// Where a term walk starts inside one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermBound<'a> {
    Unbounded,
    AtOrAfter(&'a str),
    After(&'a str),
}

/// Diagnostic view of what one entry contributed to the index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawEntry {
    pub ord: DocOrd,
    pub key: String,
    pub terms: BTreeMap<String, Vec<String>>,
    pub numeric: BTreeMap<String, f64>,
}

impl RawEntry {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl InvertedIndex {
    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    pub fn num_docs(&self) -> usize {
        self.stored.len()
    }

    pub fn num_terms(&self) -> usize {
        self.dictionary.len()
    }

    /// Stored fields of an entry.
    pub fn document(&self, ord: DocOrd) -> Option<&Document> {
        self.stored.get(ord.0 as usize)
    }

    pub fn key(&self, ord: DocOrd) -> Option<&str> {
        self.document(ord).map(|doc| doc.id.as_str())
    }

    pub fn postings(&self, field: &str, text: &str) -> Option<&PostingList> {
        self.dictionary
            .get(term_key(field, text))
            .and_then(|idx| self.postings.get(idx as usize))
    }

    pub fn doc_freq(&self, field: &str, text: &str) -> usize {
        self.postings(field, text).map(PostingList::len).unwrap_or(0)
    }

    pub fn doc_value(&self, field: &str, ord: DocOrd) -> Option<f64> {
        self.doc_values
            .get(field)
            .and_then(|values| values.get(ord.0 as usize).copied().flatten())
    }

    pub fn has_doc_values(&self, field: &str) -> bool {
        self.doc_values.contains_key(field)
    }

    pub fn field_length(&self, field: &str, ord: DocOrd) -> u32 {
        self.field_lengths
            .get(field)
            .and_then(|lengths| lengths.get(ord.0 as usize).copied())
            .unwrap_or(0)
    }

    pub fn avg_field_length(&self, field: &str) -> f32 {
        self.avg_field_lengths.get(field).copied().unwrap_or(0.0)
    }

    /// Walks the sorted terms of `field` from `start`. Stops at the first
    /// term of another field or when the visitor breaks.
    pub fn visit_terms<F>(&self, field: &str, start: TermBound<'_>, mut visit: F) -> Result<()>
    where
        F: FnMut(&str, &PostingList) -> Result<ControlFlow<()>>,
    {
        let prefix = field_prefix(field);
        let range = self.dictionary.range();
        let mut stream = match start {
            TermBound::Unbounded => range.ge(&prefix).into_stream(),
            TermBound::AtOrAfter(text) => range.ge(term_key(field, text)).into_stream(),
            TermBound::After(text) => range.gt(term_key(field, text)).into_stream(),
        };

        while let Some((key, idx)) = stream.next() {
            if !key.starts_with(&prefix) {
                break;
            }
            let (_, text) = split_key(key).ok_or_else(|| {
                Error::new(ErrorKind::Internal, "Invalid UTF-8 in term dictionary".to_string())
            })?;
            let postings = &self.postings[idx as usize];
            if visit(text, postings)?.is_break() {
                break;
            }
        }

        Ok(())
    }

    /// Rebuilds what an entry contributed: its indexed terms per field and
    /// its numeric doc values. Scans the whole dictionary.
    pub fn raw_entry(&self, ord: DocOrd) -> Option<RawEntry> {
        let doc = self.document(ord)?;
        let mut terms: BTreeMap<String, Vec<String>> = BTreeMap::new();

        let mut stream = self.dictionary.stream();
        while let Some((key, idx)) = stream.next() {
            if !self.postings[idx as usize].contains(ord) {
                continue;
            }
            if let Some((field, text)) = split_key(key) {
                terms.entry(field.to_string()).or_default().push(text.to_string());
            }
        }

        let numeric = self.doc_values
            .iter()
            .filter_map(|(field, values)| {
                values.get(ord.0 as usize).copied().flatten().map(|v| (field.clone(), v))
            })
            .collect();

        Some(RawEntry {
            ord,
            key: doc.id.clone(),
            terms,
            numeric,
        })
    }
}

impl std::fmt::Debug for InvertedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvertedIndex")
            .field("docs", &self.num_docs())
            .field("terms", &self.num_terms())
            .finish()
    }
}
