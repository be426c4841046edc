use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use crate::core::error::Result;
use crate::index::inverted::InvertedIndex;
use crate::query::matcher::Matches;
use crate::query::request::check_cancelled;
use crate::search::results::{collect, CollectStrategy, TopDocs};
use crate::search::retriever::{Candidate, ResultRetriever, Retrieved};

/// Paging parameters shared by every result stream.
#[derive(Clone, Copy)]
pub(crate) struct Page<'a> {
    pub index: &'a InvertedIndex,
    pub start: usize,
    pub page_size: usize,
    pub max_outputs_per_document: usize,
    pub fields_to_fetch: Option<&'a [String]>,
    pub cancel: &'a CancellationToken,
}

enum Source {
    /// Can be re-collected with a larger window.
    Search {
        matches: Matches,
        strategy: CollectStrategy,
        fetch: usize,
    },
    /// A precomputed window.
    Fixed,
}

/// Lazily produced page of results.
///
/// Candidates are walked from `start`; duplicates of an already surfaced key
/// and retriever vetoes are skipped without counting toward the page. When
/// the collected window runs dry before the page is full and more matches
/// exist, the window is widened and collection re-runs. Not restartable:
/// running the query again re-executes it.
pub struct QueryResults<'a, R: ResultRetriever> {
    page: Page<'a>,
    retriever: &'a R,
    source: Source,
    docs: TopDocs,
    position: usize,
    returned: usize,
    skipped: usize,
    total: usize,
    seen: HashSet<String>,
    prefilled: bool,
    done: bool,
}

impl<'a, R: ResultRetriever> QueryResults<'a, R> {
    pub(crate) fn search(page: Page<'a>, retriever: &'a R, matches: Matches, strategy: CollectStrategy) -> Self {
        let fetch = page.start.saturating_add(page.page_size);
        let docs = collect(page.index, &matches, &strategy, fetch);
        let total = docs.total_hits;
        Self::build(page, retriever, Source::Search { matches, strategy, fetch }, docs, total)
    }

    pub(crate) fn fixed(page: Page<'a>, retriever: &'a R, docs: TopDocs, total: usize) -> Self {
        Self::build(page, retriever, Source::Fixed, docs, total)
    }

    fn build(page: Page<'a>, retriever: &'a R, source: Source, docs: TopDocs, total: usize) -> Self {
        QueryResults {
            page,
            retriever,
            source,
            docs,
            position: page.start,
            returned: 0,
            skipped: 0,
            total,
            seen: HashSet::new(),
            prefilled: false,
            done: false,
        }
    }

    /// Marks the keys a previous page surfaced: entries before `start` the
    /// retriever accepts. Vetoed entries leave their key free.
    fn prefill_seen(&mut self) -> Result<()> {
        self.prefilled = true;
        let before = self.docs.score_docs.len().min(self.page.start);

        for score_doc in &self.docs.score_docs[..before] {
            check_cancelled(self.page.cancel)?;

            let Some(document) = self.page.index.document(score_doc.ord) else {
                continue;
            };
            let Some(key) = self.retriever.key(document) else {
                continue;
            };
            if self.seen.contains(&key) {
                continue;
            }

            let candidate = Candidate {
                ord: score_doc.ord,
                document,
                score: score_doc.score,
                fields_to_fetch: self.page.fields_to_fetch,
            };
            if let Retrieved::Include(_) = self.retriever.retrieve(candidate)? {
                self.seen.insert(key);
            }
        }
        Ok(())
    }

    /// Treats `key` as already returned.
    pub(crate) fn exclude_key(&mut self, key: String) {
        self.seen.insert(key);
    }

    /// Match count of the first collection.
    pub fn total_results(&self) -> usize {
        self.total
    }

    /// Candidates rejected as duplicates or vetoed so far.
    pub fn skipped_results(&self) -> usize {
        self.skipped
    }

    fn advance(&mut self) -> Result<Option<R::Output>> {
        if !self.prefilled {
            self.prefill_seen()?;
        }

        while self.returned < self.page.page_size {
            check_cancelled(self.page.cancel)?;

            if self.position >= self.docs.score_docs.len() {
                if self.widen() {
                    continue;
                }
                return Ok(None);
            }

            let score_doc = self.docs.score_docs[self.position];
            self.position += 1;

            let Some(document) = self.page.index.document(score_doc.ord) else {
                self.skipped += 1;
                continue;
            };

            let key = self.retriever.key(document);
            if key.as_ref().is_some_and(|k| self.seen.contains(k)) {
                self.skipped += 1;
                continue;
            }

            let candidate = Candidate {
                ord: score_doc.ord,
                document,
                score: score_doc.score,
                fields_to_fetch: self.page.fields_to_fetch,
            };

            match self.retriever.retrieve(candidate)? {
                Retrieved::Skip => self.skipped += 1,
                Retrieved::Include(output) => {
                    if let Some(key) = key {
                        self.seen.insert(key);
                    }
                    self.returned += 1;
                    return Ok(Some(output));
                }
            }
        }

        Ok(None)
    }

    /// Grows the window by what the page still misses, scaled by how many
    /// entries one document may fan out into.
    fn widen(&mut self) -> bool {
        let Source::Search { matches, strategy, fetch } = &mut self.source else {
            return false;
        };

        let total = matches.len();
        if self.docs.score_docs.len() >= total || *fetch >= total {
            return false;
        }

        let missing = self.page.page_size.saturating_sub(self.returned).max(1);
        *fetch = fetch.saturating_add(missing.saturating_mul(self.page.max_outputs_per_document));
        log::trace!(
            "widening window to {} of {} matches ({} accepted, {} skipped)",
            fetch,
            total,
            self.returned,
            self.skipped
        );

        self.docs = collect(self.page.index, matches, strategy, *fetch);
        true
    }
}

impl<R: ResultRetriever> Iterator for QueryResults<'_, R> {
    type Item = Result<R::Output>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.advance() {
            Ok(Some(output)) => Some(Ok(output)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
