use serde::{Serialize, Deserialize};
use std::collections::HashMap;
use chrono::{DateTime, Utc};

/// Stored field holding the caller-visible key of an entry.
pub const DOCUMENT_ID_FIELD: &str = "__document_id";
/// Stored field holding the reduce key of map/reduce entries.
pub const REDUCE_KEY_FIELD: &str = "__reduce_key";
/// Fields with this suffix are numeric and carry doc values.
pub const RANGE_SUFFIX: &str = "_Range";

/// Position of an entry inside one immutable index reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocOrd(pub u32);

impl DocOrd {
    pub fn new(ord: u32) -> Self {
        DocOrd(ord)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for DocOrd {
    fn from(ord: u32) -> Self {
        DocOrd(ord)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Date(DateTime<Utc>),
    Boolean(bool),
}

impl FieldValue {
    /// Canonical string form, used for exact terms, string sorting and facets.
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Number(num) => num.to_string(),
            FieldValue::Date(date) => date.to_rfc3339(),
            FieldValue::Boolean(b) => b.to_string(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(num) => Some(*num),
            FieldValue::Text(text) => text.parse::<f64>().ok(),
            FieldValue::Date(date) => Some(date.timestamp_millis() as f64),
            FieldValue::Boolean(_) => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        FieldValue::Text(text.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(text: String) -> Self {
        FieldValue::Text(text)
    }
}

impl From<f64> for FieldValue {
    fn from(num: f64) -> Self {
        FieldValue::Number(num)
    }
}

impl From<i64> for FieldValue {
    fn from(num: i64) -> Self {
        FieldValue::Number(num as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(date: DateTime<Utc>) -> Self {
        FieldValue::Date(date)
    }
}

/// One index entry. Several entries may share the same `id` when a stored
/// document fans out into many entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: HashMap<String, FieldValue>,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Document {
            id: id.into(),
            fields: HashMap::new(),
        }
    }

    pub fn add_field(&mut self, name: String, value: FieldValue) {
        self.fields.insert(name, value);
    }

    pub fn with_field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Field names in sorted order.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn reduce_key(&self) -> Option<String> {
        self.fields.get(REDUCE_KEY_FIELD).map(FieldValue::as_text)
    }
}
