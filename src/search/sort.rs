use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Serialize, Deserialize};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::DocOrd;
use crate::index::inverted::InvertedIndex;
use crate::schema::schema::{is_range_field, is_reserved};

/// Pseudo-field sorting by match score.
pub const SCORE_FIELD: &str = "__score";
/// `__alphaNumeric;<field>` sorts `<field>` in natural order.
pub const ALPHANUMERIC_PREFIX: &str = "__alphaNumeric;";
/// `__random;<seed>` shuffles deterministically for a given seed.
pub const RANDOM_PREFIX: &str = "__random;";
/// Bare `__random` shuffles with a fresh seed, like an empty `__random;`.
pub const RANDOM_FIELD: &str = "__random";

/// Explicit comparison kind requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortKind {
    /// Inferred from the field name.
    #[default]
    Default,
    String,
    Numeric,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub descending: bool,
    pub kind: SortKind,
}

impl SortField {
    pub fn asc(field: &str) -> Self {
        SortField {
            field: field.to_string(),
            descending: false,
            kind: SortKind::Default,
        }
    }

    pub fn desc(field: &str) -> Self {
        SortField {
            descending: true,
            ..Self::asc(field)
        }
    }

    pub fn with_kind(mut self, kind: SortKind) -> Self {
        self.kind = kind;
        self
    }

    /// Maps the field token to a comparator.
    pub fn resolve(&self) -> Result<ResolvedSort> {
        let key = self.resolve_key()?;
        Ok(ResolvedSort {
            key,
            descending: self.descending,
        })
    }

    fn resolve_key(&self) -> Result<SortKey> {
        let field = self.field.as_str();

        if field == SCORE_FIELD {
            return match self.kind {
                SortKind::Default => Ok(SortKey::Score),
                kind => Err(self.invalid(&format!("score cannot be sorted as {:?}", kind))),
            };
        }

        if let Some(name) = field.strip_prefix(ALPHANUMERIC_PREFIX) {
            if name.is_empty() {
                return Err(self.invalid("alphanumeric sort needs a field name"));
            }
            if self.kind == SortKind::Numeric {
                return Err(self.invalid("alphanumeric sort cannot be numeric"));
            }
            return Ok(SortKey::AlphaNumeric { field: name.to_string() });
        }

        let random_seed_text = match field {
            RANDOM_FIELD => Some(""),
            _ => field.strip_prefix(RANDOM_PREFIX),
        };
        if let Some(seed) = random_seed_text {
            if self.kind != SortKind::Default {
                return Err(self.invalid("random sort takes no kind"));
            }
            return Ok(SortKey::Random { seed: random_seed(seed) });
        }

        if field.starts_with("__") && !is_reserved(field) {
            return Err(self.invalid("unknown sort token"));
        }

        match (is_range_field(field), self.kind) {
            (true, SortKind::String) => Err(self.invalid("range fields sort numerically")),
            (true, _) => Ok(SortKey::Numeric { field: field.to_string() }),
            (false, SortKind::Numeric) => Err(self.invalid("only range fields sort numerically")),
            (false, _) => Ok(SortKey::String { field: field.to_string() }),
        }
    }

    fn invalid(&self, reason: &str) -> Error {
        Error::new(
            ErrorKind::InvalidSort,
            format!("Cannot sort on '{}': {}", self.field, reason),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Score,
    AlphaNumeric { field: String },
    Random { seed: u64 },
    Numeric { field: String },
    String { field: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSort {
    pub key: SortKey,
    pub descending: bool,
}

/// Sort key of one entry, computed once per candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Score(f32),
    Text(Option<String>),
    Number(Option<f64>),
    Random(u64),
}

impl ResolvedSort {
    /// Best score first.
    pub fn score() -> Self {
        ResolvedSort {
            key: SortKey::Score,
            descending: true,
        }
    }

    pub fn value(&self, index: &InvertedIndex, ord: DocOrd, score: f32) -> SortValue {
        match &self.key {
            SortKey::Score => SortValue::Score(score),
            SortKey::Random { seed } => SortValue::Random(random_key(*seed, ord)),
            SortKey::Numeric { field } => SortValue::Number(index.doc_value(field, ord)),
            SortKey::AlphaNumeric { field } | SortKey::String { field } => SortValue::Text(
                index
                    .document(ord)
                    .and_then(|doc| doc.get_field(field))
                    .map(|value| value.as_text()),
            ),
        }
    }

    /// Missing values sort before present ones in ascending order.
    pub fn compare(&self, a: &SortValue, b: &SortValue) -> Ordering {
        let ordering = match (a, b) {
            (SortValue::Score(x), SortValue::Score(y)) => x.total_cmp(y),
            (SortValue::Random(x), SortValue::Random(y)) => x.cmp(y),
            (SortValue::Number(x), SortValue::Number(y)) => match (x, y) {
                (Some(x), Some(y)) => x.total_cmp(y),
                _ => x.is_some().cmp(&y.is_some()),
            },
            (SortValue::Text(x), SortValue::Text(y)) => match (x, y) {
                (Some(x), Some(y)) if matches!(self.key, SortKey::AlphaNumeric { .. }) => {
                    compare_alphanumeric(x, y)
                }
                (Some(x), Some(y)) => x.cmp(y),
                _ => x.is_some().cmp(&y.is_some()),
            },
            _ => Ordering::Equal,
        };

        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

/// Compares two key lists sort by sort; `Less` means `a` ranks first.
pub fn compare_values(sorts: &[ResolvedSort], a: &[SortValue], b: &[SortValue]) -> Ordering {
    sorts
        .iter()
        .zip(a.iter().zip(b))
        .map(|(sort, (x, y))| sort.compare(x, y))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Numeric seeds are used as-is, other text is hashed, and an empty seed
/// draws a fresh one so every call shuffles differently.
fn random_seed(text: &str) -> u64 {
    if text.is_empty() {
        return rand::random();
    }
    if let Ok(seed) = text.parse::<u64>() {
        return seed;
    }
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

fn random_key(seed: u64, ord: DocOrd) -> u64 {
    StdRng::seed_from_u64(seed.wrapping_add(ord.0 as u64)).next_u64()
}

/// Natural ordering: digit runs compare by numeric value, other runs
/// compare case-insensitively.
pub fn compare_alphanumeric(a: &str, b: &str) -> Ordering {
    let (mut left, mut right) = (a, b);

    while !left.is_empty() && !right.is_empty() {
        let (l, l_rest) = next_chunk(left);
        let (r, r_rest) = next_chunk(right);

        let ordering = if is_digit_run(l) && is_digit_run(r) {
            let l = l.trim_start_matches('0');
            let r = r.trim_start_matches('0');
            l.len().cmp(&r.len()).then_with(|| l.cmp(r))
        } else {
            l.to_lowercase().cmp(&r.to_lowercase())
        };

        if ordering.is_ne() {
            return ordering;
        }
        left = l_rest;
        right = r_rest;
    }

    left.len().cmp(&right.len()).then_with(|| a.cmp(b))
}

fn is_digit_run(chunk: &str) -> bool {
    chunk.starts_with(|c: char| c.is_ascii_digit())
}

fn next_chunk(s: &str) -> (&str, &str) {
    let digits = is_digit_run(s);
    let end = s
        .char_indices()
        .find(|(_, c)| c.is_ascii_digit() != digits)
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s.split_at(end)
}
