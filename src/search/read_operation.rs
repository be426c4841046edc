use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::DocOrd;
use crate::index::inverted::{InvertedIndex, RawEntry, TermBound};
use crate::mvcc::controller::TxId;
use crate::query::ast::Query;
use crate::query::matcher::{Matches, QueryMatcher};
use crate::query::request::{check_cancelled, QueryRequest};
use crate::reader::field_cache::{extract_field_values, FieldSet, FieldValues};
use crate::reader::holder::SnapshotHandle;
use crate::reader::snapshot_state::SnapshotState;
use crate::search::paged::{Page, QueryResults};
use crate::search::results::{collect, CollectStrategy};
use crate::search::retriever::ResultRetriever;
use crate::search::sort::{ResolvedSort, SortField};

/// Query execution against one pinned snapshot.
///
/// Borrows the handle, so nothing produced here can outlive its release.
pub struct ReadOperation<'a> {
    handle: &'a SnapshotHandle<InvertedIndex>,
    config: &'a Config,
}

impl<'a> ReadOperation<'a> {
    pub fn new(handle: &'a SnapshotHandle<InvertedIndex>, config: &'a Config) -> Self {
        ReadOperation { handle, config }
    }

    pub fn index(&self) -> &'a InvertedIndex {
        self.handle.reader()
    }

    pub fn state(&self) -> &'a SnapshotState<InvertedIndex> {
        self.handle.state()
    }

    pub fn as_of(&self) -> TxId {
        self.handle.as_of()
    }

    pub fn config(&self) -> &'a Config {
        self.config
    }

    /// Standard paginated query.
    pub fn query<'q, R: ResultRetriever>(
        &'q self,
        request: &'q QueryRequest,
        retriever: &'q R,
    ) -> Result<QueryResults<'q, R>> {
        let query = request.parse()?;
        let sorts = resolve_sorts(&request.sort)?;
        let matches = self.execute(&query, &request.cancel)?;
        let strategy = choose_strategy(sorts, &query, request.window(), matches.len());

        log::trace!(
            "query '{}' on {} matched {} entries ({:?})",
            request.query,
            self.as_of(),
            matches.len(),
            strategy
        );

        Ok(QueryResults::search(self.page(request), retriever, matches, strategy))
    }

    /// Raw index view of the requested window, bypassing any retriever.
    pub fn index_entries(&self, request: &QueryRequest) -> Result<Vec<RawEntry>> {
        let query = request.parse()?;
        let sorts = resolve_sorts(&request.sort)?;
        let matches = self.execute(&query, &request.cancel)?;
        let strategy = choose_strategy(sorts, &query, request.window(), matches.len());

        let index = self.index();
        let top = collect(index, &matches, &strategy, request.window());

        let mut entries = Vec::with_capacity(request.page_size.min(top.score_docs.len()));
        for score_doc in top.score_docs.iter().skip(request.start).take(request.page_size) {
            check_cancelled(&request.cancel)?;
            if let Some(entry) = index.raw_entry(score_doc.ord) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Terms of `field` in dictionary order, strictly after `from`.
    pub fn terms(
        &self,
        field: &str,
        from: Option<&str>,
        page_size: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let mut terms = Vec::new();
        if page_size == 0 {
            return Ok(terms);
        }

        let start = from.map_or(TermBound::Unbounded, TermBound::After);
        self.index().visit_terms(field, start, |text, _| {
            check_cancelled(cancel)?;
            terms.push(text.to_string());
            Ok(if terms.len() >= page_size {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            })
        })?;

        Ok(terms)
    }

    /// Entries in this snapshot.
    pub fn entries_count(&self) -> usize {
        self.index().num_docs()
    }

    /// Stored values of `fields` for one entry, memoized per snapshot.
    pub fn field_values(&self, ord: DocOrd, fields: &FieldSet) -> Result<Arc<FieldValues>> {
        let index = self.index();
        let document = index.document(ord).ok_or_else(|| {
            Error::new(ErrorKind::NotFound, format!("No entry at {:?} in {}", ord, self.as_of()))
        })?;

        self.state()
            .field_cache()
            .get_or_insert_with(ord, fields, || extract_field_values(index.schema(), document, fields))
    }

    /// Number of matching entries per distinct value combination, most
    /// frequent first. Entries without any of the values are not counted.
    pub fn facet_counts(
        &self,
        request: &QueryRequest,
        fields: &FieldSet,
    ) -> Result<Vec<(Arc<FieldValues>, usize)>> {
        let query = request.parse()?;
        let matches = self.execute(&query, &request.cancel)?;

        let mut counts: HashMap<Arc<FieldValues>, usize> = HashMap::new();
        for ord in matches.iter() {
            check_cancelled(&request.cancel)?;
            let values = self.field_values(ord, fields)?;
            if !values.is_empty() {
                *counts.entry(values).or_insert(0) += 1;
            }
        }

        let mut facets: Vec<(Arc<FieldValues>, usize)> = counts.into_iter().collect();
        facets.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(facets)
    }

    pub(crate) fn execute(&self, query: &Query, cancel: &CancellationToken) -> Result<Matches> {
        QueryMatcher::new(self.index(), cancel).execute(query)
    }

    pub(crate) fn page<'q>(&'q self, request: &'q QueryRequest) -> Page<'q> {
        Page {
            index: self.index(),
            start: request.start,
            page_size: request.page_size,
            max_outputs_per_document: self.config.max_outputs_per_document.max(1),
            fields_to_fetch: request.fields_to_fetch.as_deref(),
            cancel: &request.cancel,
        }
    }
}

pub(crate) fn resolve_sorts(sort: &[SortField]) -> Result<Vec<ResolvedSort>> {
    sort.iter().map(SortField::resolve).collect()
}

/// Unsorted, unboosted queries skip scoring: everything when the window
/// covers all matches, otherwise the first `window` in index order.
pub(crate) fn choose_strategy(
    sorts: Vec<ResolvedSort>,
    query: &Query,
    window: usize,
    match_count: usize,
) -> CollectStrategy {
    if sorts.is_empty() && !query.has_boost() {
        if window >= match_count {
            CollectStrategy::All
        } else {
            CollectStrategy::Bounded
        }
    } else if sorts.is_empty() {
        CollectStrategy::Sorted(vec![ResolvedSort::score()])
    } else {
        CollectStrategy::Sorted(sorts)
    }
}
