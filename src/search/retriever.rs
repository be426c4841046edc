use crate::core::error::Result;
use crate::core::types::{DocOrd, Document};
use crate::search::results::SearchHit;

/// A matched entry on its way to becoming a result.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub ord: DocOrd,
    pub document: &'a Document,
    pub score: f32,
    pub fields_to_fetch: Option<&'a [String]>,
}

/// Outcome of materializing a candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieved<T> {
    Include(T),
    /// Rejected after matching; counted as skipped.
    Skip,
}

/// Turns raw matches into caller-visible results.
///
/// Implementations may veto candidates (field-level security, projection
/// filters). The key drives de-duplication of fanned-out entries; entries
/// without a key are never treated as duplicates.
pub trait ResultRetriever {
    type Output;

    fn key(&self, document: &Document) -> Option<String> {
        Some(document.reduce_key().unwrap_or_else(|| document.id.clone()))
    }

    fn retrieve(&self, candidate: Candidate<'_>) -> Result<Retrieved<Self::Output>>;
}

/// Returns stored entries, projected to the requested fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentRetriever;

impl ResultRetriever for DocumentRetriever {
    type Output = SearchHit;

    fn retrieve(&self, candidate: Candidate<'_>) -> Result<Retrieved<SearchHit>> {
        let source = candidate.document;
        let document = match candidate.fields_to_fetch {
            None => source.clone(),
            Some(fields) => {
                let mut projected = Document::new(source.id.clone());
                for name in fields {
                    if let Some(value) = source.get_field(name) {
                        projected.add_field(name.clone(), value.clone());
                    }
                }
                projected
            }
        };

        Ok(Retrieved::Include(SearchHit {
            key: self.key(source).unwrap_or_else(|| source.id.clone()),
            ord: candidate.ord,
            score: candidate.score,
            document,
        }))
    }
}
