use std::collections::HashMap;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::DocOrd;
use crate::query::request::{check_cancelled, QueryRequest};
use crate::search::paged::QueryResults;
use crate::search::read_operation::{choose_strategy, resolve_sorts, ReadOperation};
use crate::search::results::{collect, ScoreDoc, TopDocs};
use crate::search::retriever::ResultRetriever;

/// Separates the sub-clauses of an intersection query.
pub const INTERSECT_SEPARATOR: &str = " INTERSECT ";

impl<'a> ReadOperation<'a> {
    /// Entries matching every ` INTERSECT `-separated clause.
    ///
    /// The first clause is collected with a guessed window and the others
    /// only filter it. The guess doubles while the page is not covered,
    /// the first clause still has uncollected matches, and the previous
    /// round surfaced new candidates. `total_results` is the first clause's
    /// match count, an upper bound of the real intersection.
    pub fn intersect_query<'q, R: ResultRetriever>(
        &'q self,
        request: &'q QueryRequest,
        retriever: &'q R,
    ) -> Result<QueryResults<'q, R>> {
        let clauses: Vec<&str> = request
            .query
            .split(INTERSECT_SEPARATOR)
            .map(str::trim)
            .filter(|clause| !clause.is_empty())
            .collect();
        if clauses.len() < 2 {
            return Err(Error::new(
                ErrorKind::InvalidIntersectQuery,
                format!(
                    "Intersect query needs at least two clauses separated by '{}': '{}'",
                    INTERSECT_SEPARATOR.trim(),
                    request.query
                ),
            ));
        }

        let queries = clauses
            .iter()
            .map(|clause| request.parse_text(clause))
            .collect::<Result<Vec<_>>>()?;
        let sorts = resolve_sorts(&request.sort)?;

        let first = self.execute(&queries[0], &request.cancel)?;
        let filters = queries[1..]
            .iter()
            .map(|query| self.execute(query, &request.cancel))
            .collect::<Result<Vec<_>>>()?;

        let index = self.index();
        let total = first.len();
        let target = request.window();
        // Never the collect-everything path: the guess bounds each round.
        let strategy = choose_strategy(sorts, &queries[0], 0, usize::MAX);

        let mut guess = target.saturating_mul(2).max(1);
        let mut previous_candidates = 0;
        let mut widenings = 0;

        let intersecting: Vec<ScoreDoc> = loop {
            check_cancelled(&request.cancel)?;

            let top = collect(index, &first, &strategy, guess);
            let mut counts: HashMap<DocOrd, usize> =
                top.score_docs.iter().map(|doc| (doc.ord, 1)).collect();
            for filter in &filters {
                for (ord, count) in counts.iter_mut() {
                    if filter.contains(*ord) {
                        *count += 1;
                    }
                }
            }

            let intersecting: Vec<ScoreDoc> = top
                .score_docs
                .iter()
                .filter(|doc| counts.get(&doc.ord) == Some(&queries.len()))
                .copied()
                .collect();

            let candidates = top.score_docs.len();
            let progressed = candidates > previous_candidates;
            if intersecting.len() >= target
                || total <= guess
                || !progressed
                || widenings >= self.config().max_intersect_widenings
            {
                break intersecting;
            }

            log::trace!(
                "intersect widening {}: {} of {} candidates intersect, guess {} -> {}",
                widenings + 1,
                intersecting.len(),
                candidates,
                guess,
                guess.saturating_mul(2)
            );
            previous_candidates = candidates;
            guess = guess.saturating_mul(2);
            widenings += 1;
        };

        let docs = TopDocs {
            total_hits: total,
            score_docs: intersecting,
        };
        Ok(QueryResults::fixed(self.page(request), retriever, docs, total))
    }
}
