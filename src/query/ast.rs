use serde::{Serialize, Deserialize};
use crate::core::types::FieldValue;

/// Main query enum representing all query types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    Term(TermQuery),         // Value analyzed like the field; all resulting terms must match
    Bool(BoolQuery),         // Boolean combinations
    Range(RangeQuery),       // Numeric range on `_Range` fields, term range elsewhere
    Prefix(PrefixQuery),
    Wildcard(WildcardQuery), // Pattern matching with * and ?
    MatchAll,                // Match all documents
}

/// Single term query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermQuery {
    pub field: String,
    pub value: String,
    pub boost: Option<f32>,
}

/// Boolean query with must/should/must_not clauses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoolQuery {
    pub must: Vec<Query>,      // All must match (AND)
    pub should: Vec<Query>,    // At least one must match (OR)
    pub must_not: Vec<Query>,  // None must match (NOT)
    pub filter: Vec<Query>,    // Must match but don't affect score
    pub minimum_should_match: Option<u32>,
    pub boost: Option<f32>,
}

/// Range query over a numeric or text field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeQuery {
    pub field: String,
    pub gt: Option<FieldValue>,   // Greater than
    pub gte: Option<FieldValue>,  // Greater than or equal
    pub lt: Option<FieldValue>,   // Less than
    pub lte: Option<FieldValue>,  // Less than or equal
    pub boost: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixQuery {
    pub field: String,
    pub prefix: String,
    pub boost: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WildcardQuery {
    pub field: String,
    pub pattern: String, //Pattern with wildcards (* and ?)
    pub boost: Option<f32>,
}

impl Query {
    pub fn term(field: &str, value: &str) -> Self {
        Query::Term(TermQuery {
            field: field.to_string(),
            value: value.to_string(),
            boost: None,
        })
    }

    pub fn boost(&self) -> Option<f32> {
        match self {
            Query::Term(q) => q.boost,
            Query::Bool(q) => q.boost,
            Query::Range(q) => q.boost,
            Query::Prefix(q) => q.boost,
            Query::Wildcard(q) => q.boost,
            Query::MatchAll => None,
        }
    }

    pub fn with_boost(self, boost: f32) -> Self {
        match self {
            Query::Term(q) => Query::Term(TermQuery { boost: Some(boost), ..q }),
            Query::Bool(q) => Query::Bool(BoolQuery { boost: Some(boost), ..q }),
            Query::Range(q) => Query::Range(RangeQuery { boost: Some(boost), ..q }),
            Query::Prefix(q) => Query::Prefix(PrefixQuery { boost: Some(boost), ..q }),
            Query::Wildcard(q) => Query::Wildcard(WildcardQuery { boost: Some(boost), ..q }),
            Query::MatchAll => {
                Query::Bool(BoolQuery::new().with_must(Query::MatchAll)).with_boost(boost)
            }
        }
    }

    /// True when any clause carries a boost other than 1.
    pub fn has_boost(&self) -> bool {
        let own = matches!(self.boost(), Some(b) if b != 1.0);
        own || match self {
            Query::Bool(q) => q
                .must
                .iter()
                .chain(&q.should)
                .chain(&q.must_not)
                .chain(&q.filter)
                .any(Query::has_boost),
            _ => false,
        }
    }
}

impl BoolQuery {
    pub fn new() -> Self {
        BoolQuery {
            must: Vec::new(),
            should: Vec::new(),
            must_not: Vec::new(),
            filter: Vec::new(),
            minimum_should_match: None,
            boost: None,
        }
    }

    pub fn with_must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    pub fn with_should(mut self, query: Query) -> Self {
        self.should.push(query);
        self
    }

    pub fn with_must_not(mut self, query: Query) -> Self {
        self.must_not.push(query);
        self
    }

    pub fn with_filter(mut self, query: Query) -> Self {
        self.filter.push(query);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.should.is_empty() && self.must_not.is_empty() && self.filter.is_empty()
    }
}

impl Default for BoolQuery {
    fn default() -> Self {
        Self::new()
    }
}
