use std::cmp::Ordering;
use std::collections::BinaryHeap;
use serde::Serialize;
use crate::core::types::{DocOrd, Document};
use crate::index::inverted::InvertedIndex;
use crate::query::matcher::Matches;
use crate::search::sort::{compare_values, ResolvedSort, SortValue};

/// Matched entry with relevance score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreDoc {
    pub ord: DocOrd,
    pub score: f32,
}

/// Window of collected matches, best first.
#[derive(Debug, Clone, Default)]
pub struct TopDocs {
    pub total_hits: usize,
    pub score_docs: Vec<ScoreDoc>,
}

/// Result materialized by the default retriever.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub key: String,
    pub ord: DocOrd,
    pub score: f32,
    pub document: Document,
}

/// One fully consumed page.
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    pub hits: Vec<SearchHit>,
    pub total_results: usize,
    pub skipped_results: usize,
}

/// How a window of matches is collected.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectStrategy {
    /// Every match in index order.
    All,
    /// The first `size` matches in index order, unscored.
    Bounded,
    /// The best `size` matches under the given sorts.
    Sorted(Vec<ResolvedSort>),
}

pub fn collect(index: &InvertedIndex, matches: &Matches, strategy: &CollectStrategy, size: usize) -> TopDocs {
    let total_hits = matches.len();
    let score_docs = match strategy {
        CollectStrategy::All => matches
            .iter()
            .map(|ord| ScoreDoc { ord, score: matches.score(ord) })
            .collect(),
        CollectStrategy::Bounded => matches
            .iter()
            .take(size)
            .map(|ord| ScoreDoc { ord, score: matches.score(ord) })
            .collect(),
        CollectStrategy::Sorted(sorts) => {
            let mut collector = TopFieldCollector::new(sorts, size);
            for ord in matches.iter() {
                collector.collect(index, ord, matches.score(ord));
            }
            collector.into_sorted()
        }
    };

    TopDocs { total_hits, score_docs }
}

struct Ranked<'s> {
    doc: ScoreDoc,
    values: Vec<SortValue>,
    sorts: &'s [ResolvedSort],
}

// Ties break by index order, so a larger window always extends a smaller one.
impl Ord for Ranked<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_values(self.sorts, &self.values, &other.values)
            .then_with(|| self.doc.ord.cmp(&other.doc.ord))
    }
}

impl PartialOrd for Ranked<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked<'_> {}

/// Top-N collector over arbitrary sorts. The heap keeps the worst
/// retained entry on top so it can be evicted in O(log n).
pub struct TopFieldCollector<'s> {
    sorts: &'s [ResolvedSort],
    heap: BinaryHeap<Ranked<'s>>,
    size: usize,
}

impl<'s> TopFieldCollector<'s> {
    pub fn new(sorts: &'s [ResolvedSort], size: usize) -> Self {
        TopFieldCollector {
            sorts,
            heap: BinaryHeap::with_capacity(size.min(1024) + 1),
            size,
        }
    }

    pub fn collect(&mut self, index: &InvertedIndex, ord: DocOrd, score: f32) {
        if self.size == 0 {
            return;
        }

        let ranked = Ranked {
            doc: ScoreDoc { ord, score },
            values: self.sorts.iter().map(|sort| sort.value(index, ord, score)).collect(),
            sorts: self.sorts,
        };

        if self.heap.len() < self.size {
            self.heap.push(ranked);
        } else if self.heap.peek().is_some_and(|worst| ranked < *worst) {
            self.heap.pop();
            self.heap.push(ranked);
        }
    }

    pub fn into_sorted(self) -> Vec<ScoreDoc> {
        self.heap.into_sorted_vec().into_iter().map(|ranked| ranked.doc).collect()
    }
}
