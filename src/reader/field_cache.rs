use std::num::NonZeroUsize;
use std::sync::Arc;
use lru::LruCache;
use parking_lot::Mutex;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocOrd, Document};
use crate::schema::schema::IndexSchema;

/// A set of field names, normalized to sorted and de-duplicated order.
///
/// Cache keys compare the full name list, so two different sets never share
/// an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldSet {
    names: Arc<[String]>,
}

impl FieldSet {
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort_unstable();
        names.dedup();
        if names.is_empty() {
            return Err(Error::new(
                ErrorKind::Configuration,
                "Field set must name at least one field".to_string(),
            ));
        }
        Ok(FieldSet { names: names.into() })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Values of a field set for one entry, one slot per field in field-set
/// order. A missing field keeps its slot as `None`, so entries with values
/// under different fields never compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldValues(Vec<Option<String>>);

impl FieldValues {
    pub fn new(values: Vec<Option<String>>) -> Self {
        FieldValues(values)
    }

    pub fn values(&self) -> &[Option<String>] {
        &self.0
    }

    /// Value of the `slot`th field of the set.
    pub fn get(&self, slot: usize) -> Option<&str> {
        self.0.get(slot).and_then(|v| v.as_deref())
    }

    /// True when the entry has none of the fields.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }
}

/// Pulls the stored values of `fields` out of an entry.
///
/// An entry may legitimately lack values, but a set where no field is
/// stored at all can never produce anything and is reported as a
/// configuration error.
pub fn extract_field_values(
    schema: &IndexSchema,
    document: &Document,
    fields: &FieldSet,
) -> Result<FieldValues> {
    let values = FieldValues(
        fields
            .names()
            .iter()
            .map(|name| document.get_field(name).map(|v| v.as_text()))
            .collect(),
    );

    if values.is_empty() && !fields.names().iter().any(|name| schema.is_stored(name)) {
        return Err(Error::new(
            ErrorKind::Configuration,
            format!(
                "Cannot read values of fields {:?}: none of them is stored, did you forget to store the field?",
                fields.names()
            ),
        ));
    }

    Ok(values)
}

/// Bounded memo of per-entry field values, owned by one snapshot.
pub struct FieldValueCache {
    entries: Option<Mutex<LruCache<(DocOrd, FieldSet), Arc<FieldValues>>>>,
}

impl FieldValueCache {
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        FieldValueCache {
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn get_or_insert_with<F>(
        &self,
        ord: DocOrd,
        fields: &FieldSet,
        extract: F,
    ) -> Result<Arc<FieldValues>>
    where
        F: FnOnce() -> Result<FieldValues>,
    {
        let Some(entries) = &self.entries else {
            return extract().map(Arc::new);
        };

        let key = (ord, fields.clone());
        if let Some(values) = entries.lock().get(&key) {
            return Ok(values.clone());
        }

        // Extract outside the lock; a concurrent miss computes the same value.
        let values = Arc::new(extract()?);
        entries.lock().put(key, values.clone());
        Ok(values)
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map(|e| e.lock().len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Some(entries) = &self.entries {
            entries.lock().clear();
        }
    }
}
