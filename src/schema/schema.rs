use std::collections::HashMap;
use serde::{Serialize, Deserialize};
use crate::analysis::analyzer::Analyzer;
use crate::core::types::{FieldValue, DOCUMENT_ID_FIELD, RANGE_SUFFIX, REDUCE_KEY_FIELD};

/// How a field's values become terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldIndexing {
    /// Tokenized and lowercased.
    Analyzed,
    /// The whole value is one term, verbatim.
    Exact,
    /// Not searchable; may still be stored.
    No,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub indexing: FieldIndexing,
    pub stored: bool,
}

/// Per-field indexing rules for one index.
///
/// Fields without a definition fall back to `default_indexing` and
/// `store_by_default`. The reserved id and reduce-key fields and every
/// `_Range` field are always indexed exactly.
#[derive(Debug, Clone)]
pub struct IndexSchema {
    pub fields: HashMap<String, FieldDefinition>,
    pub default_indexing: FieldIndexing,
    pub store_by_default: bool,
    analyzed: Analyzer,
    exact: Analyzer,
}

impl IndexSchema {
    pub fn new() -> Self {
        IndexSchema {
            fields: HashMap::new(),
            default_indexing: FieldIndexing::Analyzed,
            store_by_default: true,
            analyzed: Analyzer::standard(),
            exact: Analyzer::keyword(),
        }
    }

    pub fn add_field(mut self, name: &str, indexing: FieldIndexing, stored: bool) -> Self {
        self.fields.insert(name.to_string(), FieldDefinition {
            name: name.to_string(),
            indexing,
            stored,
        });
        self
    }

    pub fn add_text_field(self, name: &str) -> Self {
        self.add_field(name, FieldIndexing::Analyzed, true)
    }

    pub fn add_exact_field(self, name: &str) -> Self {
        self.add_field(name, FieldIndexing::Exact, true)
    }

    pub fn with_store_by_default(mut self, stored: bool) -> Self {
        self.store_by_default = stored;
        self
    }

    pub fn with_analyzer(mut self, analyzer: Analyzer) -> Self {
        self.analyzed = analyzer;
        self
    }

    pub fn indexing_for(&self, field: &str) -> FieldIndexing {
        if is_reserved(field) || is_range_field(field) {
            return FieldIndexing::Exact;
        }
        self.fields
            .get(field)
            .map(|def| def.indexing)
            .unwrap_or(self.default_indexing)
    }

    pub fn is_stored(&self, field: &str) -> bool {
        if is_reserved(field) {
            return true;
        }
        self.fields
            .get(field)
            .map(|def| def.stored)
            .unwrap_or(self.store_by_default)
    }

    /// Terms a value produces when indexed into `field`.
    pub fn terms_for_value(&self, field: &str, value: &FieldValue) -> Vec<String> {
        self.terms_for_text(field, &value.as_text())
    }

    /// Normalizes query-side text the same way indexing does.
    pub fn terms_for_text(&self, field: &str, text: &str) -> Vec<String> {
        match self.indexing_for(field) {
            FieldIndexing::Analyzed => self.analyzed.terms(text),
            FieldIndexing::Exact => self.exact.terms(text),
            FieldIndexing::No => Vec::new(),
        }
    }

    /// Normalization for wildcard and prefix patterns, which must not be tokenized.
    pub fn normalize_pattern(&self, field: &str, pattern: &str) -> String {
        match self.indexing_for(field) {
            FieldIndexing::Analyzed => pattern.to_lowercase(),
            _ => pattern.to_string(),
        }
    }
}

impl Default for IndexSchema {
    fn default() -> Self {
        Self::new()
    }
}

pub fn is_reserved(field: &str) -> bool {
    field == DOCUMENT_ID_FIELD || field == REDUCE_KEY_FIELD
}

pub fn is_range_field(field: &str) -> bool {
    field.ends_with(RANGE_SUFFIX)
}
