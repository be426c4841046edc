use std::collections::HashMap;
use std::ops::ControlFlow;
use regex::Regex;
use roaring::RoaringBitmap;
use tokio_util::sync::CancellationToken;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocOrd, FieldValue};
use crate::index::inverted::{InvertedIndex, TermBound};
use crate::query::ast::{BoolQuery, PrefixQuery, Query, RangeQuery, TermQuery, WildcardQuery};
use crate::schema::schema::is_range_field;
use crate::scoring::scorer::{BM25Scorer, DocStats, Scorer};

/// Matching entries of one query with their scores.
#[derive(Debug, Clone, Default)]
pub struct Matches {
    docs: RoaringBitmap,
    scores: HashMap<u32, f32>,
}

impl Matches {
    fn constant(docs: RoaringBitmap, score: f32) -> Self {
        let scores = docs.iter().map(|doc| (doc, score)).collect();
        Matches { docs, scores }
    }

    pub fn len(&self) -> usize {
        self.docs.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn contains(&self, ord: DocOrd) -> bool {
        self.docs.contains(ord.0)
    }

    pub fn score(&self, ord: DocOrd) -> f32 {
        self.scores.get(&ord.0).copied().unwrap_or(0.0)
    }

    /// Matching ordinals in index order.
    pub fn iter(&self) -> impl Iterator<Item = DocOrd> + '_ {
        self.docs.iter().map(DocOrd)
    }

    pub fn bitmap(&self) -> &RoaringBitmap {
        &self.docs
    }

    fn boosted(mut self, boost: Option<f32>) -> Self {
        if let Some(boost) = boost.filter(|b| *b != 1.0) {
            for score in self.scores.values_mut() {
                *score *= boost;
            }
        }
        self
    }

    /// Keeps docs present in both; scores add up when `scoring` is set.
    fn intersect(mut self, other: &Matches, scoring: bool) -> Self {
        self.docs &= &other.docs;
        let docs = &self.docs;
        self.scores.retain(|doc, _| docs.contains(*doc));
        if scoring {
            for (doc, score) in self.scores.iter_mut() {
                *score += other.scores.get(doc).copied().unwrap_or(0.0);
            }
        }
        self
    }

    fn subtract(mut self, other: &RoaringBitmap) -> Self {
        self.docs -= other;
        let docs = &self.docs;
        self.scores.retain(|doc, _| docs.contains(*doc));
        self
    }
}

/// Evaluates a [`Query`] against one immutable index.
pub struct QueryMatcher<'a> {
    index: &'a InvertedIndex,
    scorer: BM25Scorer,
    cancel: &'a CancellationToken,
}

impl<'a> QueryMatcher<'a> {
    pub fn new(index: &'a InvertedIndex, cancel: &'a CancellationToken) -> Self {
        QueryMatcher {
            index,
            scorer: BM25Scorer::default(),
            cancel,
        }
    }

    pub fn execute(&self, query: &Query) -> Result<Matches> {
        if self.cancel.is_cancelled() {
            return Err(Error::cancelled());
        }

        match query {
            Query::MatchAll => Ok(self.match_all()),
            Query::Term(q) => self.match_term(q),
            Query::Prefix(q) => self.match_prefix(q),
            Query::Wildcard(q) => self.match_wildcard(q),
            Query::Range(q) => self.match_range(q),
            Query::Bool(q) => self.match_bool(q),
        }
    }

    fn match_all(&self) -> Matches {
        let mut docs = RoaringBitmap::new();
        docs.insert_range(0..self.index.num_docs() as u32);
        Matches::constant(docs, 1.0)
    }

    /// Every analyzed term of the value must be present.
    fn match_term(&self, query: &TermQuery) -> Result<Matches> {
        let terms = self.index.schema().terms_for_text(&query.field, &query.value);
        if terms.is_empty() {
            return Ok(Matches::default());
        }

        let mut lists = Vec::with_capacity(terms.len());
        for text in &terms {
            match self.index.postings(&query.field, text) {
                Some(list) => lists.push(list),
                None => return Ok(Matches::default()),
            }
        }

        let mut docs: RoaringBitmap = lists[0].docs().map(|d| d.0).collect();
        for list in &lists[1..] {
            let other: RoaringBitmap = list.docs().map(|d| d.0).collect();
            docs &= other;
        }

        let total_docs = self.index.num_docs();
        let avg_field_length = self.index.avg_field_length(&query.field);
        let mut scores = HashMap::with_capacity(docs.len() as usize);
        for doc in docs.iter() {
            let ord = DocOrd(doc);
            let stats = DocStats {
                field_length: self.index.field_length(&query.field, ord),
                avg_field_length,
                total_docs,
            };
            let score: f32 = lists
                .iter()
                .filter_map(|list| list.get(ord).map(|posting| (posting.term_freq, list.len())))
                .map(|(term_freq, doc_freq)| self.scorer.score(term_freq, doc_freq, &stats))
                .sum();
            scores.insert(doc, score);
        }

        Ok(Matches { docs, scores }.boosted(query.boost))
    }

    fn match_prefix(&self, query: &PrefixQuery) -> Result<Matches> {
        let prefix = self.index.schema().normalize_pattern(&query.field, &query.prefix);
        let mut docs = RoaringBitmap::new();

        self.index.visit_terms(&query.field, TermBound::AtOrAfter(&prefix), |text, postings| {
            if !text.starts_with(prefix.as_str()) {
                return Ok(ControlFlow::Break(()));
            }
            docs.extend(postings.docs().map(|d| d.0));
            Ok(ControlFlow::Continue(()))
        })?;

        Ok(Matches::constant(docs, query.boost.unwrap_or(1.0)))
    }

    fn match_wildcard(&self, query: &WildcardQuery) -> Result<Matches> {
        let pattern = self.index.schema().normalize_pattern(&query.field, &query.pattern);
        let literal: String = pattern.chars().take_while(|c| *c != '*' && *c != '?').collect();
        let regex = wildcard_regex(&pattern)?;
        let mut docs = RoaringBitmap::new();

        self.index.visit_terms(&query.field, TermBound::AtOrAfter(&literal), |text, postings| {
            if !text.starts_with(literal.as_str()) {
                return Ok(ControlFlow::Break(()));
            }
            if regex.is_match(text) {
                docs.extend(postings.docs().map(|d| d.0));
            }
            Ok(ControlFlow::Continue(()))
        })?;

        Ok(Matches::constant(docs, query.boost.unwrap_or(1.0)))
    }

    fn match_range(&self, query: &RangeQuery) -> Result<Matches> {
        let boost = query.boost.unwrap_or(1.0);
        if is_range_field(&query.field) {
            return self.match_numeric_range(query).map(|docs| Matches::constant(docs, boost));
        }

        let schema = self.index.schema();
        let bound = |value: &Option<FieldValue>| {
            value.as_ref().map(|v| schema.normalize_pattern(&query.field, &v.as_text()))
        };
        let (gt, gte, lt, lte) = (bound(&query.gt), bound(&query.gte), bound(&query.lt), bound(&query.lte));

        let start = match (&gte, &gt) {
            (Some(from), _) => TermBound::AtOrAfter(from),
            (None, Some(from)) => TermBound::After(from),
            (None, None) => TermBound::Unbounded,
        };

        let mut docs = RoaringBitmap::new();
        self.index.visit_terms(&query.field, start, |text, postings| {
            let past_upper = match (&lte, &lt) {
                (Some(to), _) => text > to.as_str(),
                (None, Some(to)) => text >= to.as_str(),
                (None, None) => false,
            };
            if past_upper {
                return Ok(ControlFlow::Break(()));
            }
            docs.extend(postings.docs().map(|d| d.0));
            Ok(ControlFlow::Continue(()))
        })?;

        Ok(Matches::constant(docs, boost))
    }

    fn match_numeric_range(&self, query: &RangeQuery) -> Result<RoaringBitmap> {
        let number = |value: &Option<FieldValue>| -> Result<Option<f64>> {
            match value {
                None => Ok(None),
                Some(v) => v.as_number().map(Some).ok_or_else(|| {
                    Error::new(
                        ErrorKind::InvalidArgument,
                        format!("Range on '{}' needs numeric bounds, got {:?}", query.field, v),
                    )
                }),
            }
        };
        let (gt, gte, lt, lte) = (number(&query.gt)?, number(&query.gte)?, number(&query.lt)?, number(&query.lte)?);

        let mut docs = RoaringBitmap::new();
        for ord in 0..self.index.num_docs() as u32 {
            let Some(value) = self.index.doc_value(&query.field, DocOrd(ord)) else {
                continue;
            };
            let inside = gt.is_none_or(|b| value > b)
                && gte.is_none_or(|b| value >= b)
                && lt.is_none_or(|b| value < b)
                && lte.is_none_or(|b| value <= b);
            if inside {
                docs.insert(ord);
            }
        }
        Ok(docs)
    }

    fn match_bool(&self, query: &BoolQuery) -> Result<Matches> {
        let mut result: Option<Matches> = None;

        for clause in &query.must {
            let matches = self.execute(clause)?;
            result = Some(match result {
                Some(acc) => acc.intersect(&matches, true),
                None => matches,
            });
        }

        for clause in &query.filter {
            let matches = self.execute(clause)?;
            result = Some(match result {
                Some(acc) => acc.intersect(&matches, false),
                None => Matches::constant(matches.docs, 0.0),
            });
        }

        if !query.should.is_empty() {
            // Without required clauses at least one optional clause has to match.
            let required = match (query.minimum_should_match, result.is_some()) {
                (Some(n), true) => n as usize,
                (Some(n), false) => (n as usize).max(1),
                (None, true) => 0,
                (None, false) => 1,
            };

            let mut counts: HashMap<u32, (usize, f32)> = HashMap::new();
            for clause in &query.should {
                let matches = self.execute(clause)?;
                for doc in matches.docs.iter() {
                    let entry = counts.entry(doc).or_insert((0, 0.0));
                    entry.0 += 1;
                    entry.1 += matches.scores.get(&doc).copied().unwrap_or(0.0);
                }
            }

            result = Some(match result {
                Some(mut acc) => {
                    if required > 0 {
                        let keep: RoaringBitmap = acc
                            .docs
                            .iter()
                            .filter(|doc| counts.get(doc).is_some_and(|(n, _)| *n >= required))
                            .collect();
                        acc.docs = keep;
                        let docs = &acc.docs;
                        acc.scores.retain(|doc, _| docs.contains(*doc));
                    }
                    for (doc, score) in acc.scores.iter_mut() {
                        if let Some((_, extra)) = counts.get(doc) {
                            *score += extra;
                        }
                    }
                    acc
                }
                None => {
                    let mut docs = RoaringBitmap::new();
                    let mut scores = HashMap::new();
                    for (doc, (n, score)) in counts {
                        if n >= required {
                            docs.insert(doc);
                            scores.insert(doc, score);
                        }
                    }
                    Matches { docs, scores }
                }
            });
        }

        let mut matches = result.unwrap_or_else(|| self.match_all());

        if !query.must_not.is_empty() {
            let mut excluded = RoaringBitmap::new();
            for clause in &query.must_not {
                excluded |= self.execute(clause)?.docs;
            }
            matches = matches.subtract(&excluded);
        }

        Ok(matches.boosted(query.boost))
    }
}

/// Anchored regex for a `*`/`?` pattern; everything else is literal.
fn wildcard_regex(pattern: &str) -> Result<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    let mut literal = String::new();
    for c in pattern.chars() {
        match c {
            '*' | '?' => {
                expr.push_str(&regex::escape(&literal));
                literal.clear();
                expr.push_str(if c == '*' { ".*" } else { "." });
            }
            _ => literal.push(c),
        }
    }
    expr.push_str(&regex::escape(&literal));
    expr.push('$');
    Ok(Regex::new(&expr)?)
}
