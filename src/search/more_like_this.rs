use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use crate::analysis::filter::StopWordFilter;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocOrd, Document, DOCUMENT_ID_FIELD};
use crate::query::ast::{BoolQuery, Query, TermQuery};
use crate::query::parser::QueryParser;
use crate::query::request::check_cancelled;
use crate::schema::schema::{is_range_field, is_reserved, FieldIndexing};
use crate::scoring::scorer::idf;
use crate::search::paged::{Page, QueryResults};
use crate::search::read_operation::ReadOperation;
use crate::search::results::{collect, CollectStrategy, TopDocs};
use crate::search::retriever::ResultRetriever;
use crate::search::sort::ResolvedSort;

/// Similarity query seeded by an existing entry.
///
/// Tuning values left as `None` fall back to [`Config`](crate::core::config::Config).
#[derive(Debug, Clone)]
pub struct MoreLikeThisRequest {
    pub document_id: Option<String>,
    /// Exact `(field, value)` pairs identifying the seed when no id is given.
    pub group_keys: Vec<(String, String)>,
    /// Fields to mine for terms; empty means every stored field of the seed.
    pub fields: Vec<String>,
    pub additional_query: Option<String>,
    pub default_field: String,
    pub page_size: usize,
    pub min_term_freq: Option<usize>,
    pub min_doc_freq: Option<usize>,
    pub max_doc_freq: Option<usize>,
    pub min_word_len: Option<usize>,
    pub max_query_terms: Option<usize>,
    /// Boost each term by its relative tf-idf weight.
    pub boost: bool,
    pub use_stop_words: bool,
    pub fields_to_fetch: Option<Vec<String>>,
    pub cancel: CancellationToken,
}

impl MoreLikeThisRequest {
    fn new() -> Self {
        MoreLikeThisRequest {
            document_id: None,
            group_keys: Vec::new(),
            fields: Vec::new(),
            additional_query: None,
            default_field: "content".to_string(),
            page_size: 10,
            min_term_freq: None,
            min_doc_freq: None,
            max_doc_freq: None,
            min_word_len: None,
            max_query_terms: None,
            boost: false,
            use_stop_words: false,
            fields_to_fetch: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn for_document(id: &str) -> Self {
        MoreLikeThisRequest {
            document_id: Some(id.to_string()),
            ..Self::new()
        }
    }

    pub fn for_group<I, K, V>(keys: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        MoreLikeThisRequest {
            group_keys: keys.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            ..Self::new()
        }
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_additional_query(mut self, query: &str) -> Self {
        self.additional_query = Some(query.to_string());
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_min_doc_freq(mut self, min_doc_freq: usize) -> Self {
        self.min_doc_freq = Some(min_doc_freq);
        self
    }

    pub fn with_min_term_freq(mut self, min_term_freq: usize) -> Self {
        self.min_term_freq = Some(min_term_freq);
        self
    }

    pub fn with_max_query_terms(mut self, max_query_terms: usize) -> Self {
        self.max_query_terms = Some(max_query_terms);
        self
    }

    pub fn with_boost(mut self, boost: bool) -> Self {
        self.boost = boost;
        self
    }

    pub fn with_stop_words(mut self, use_stop_words: bool) -> Self {
        self.use_stop_words = use_stop_words;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// A candidate query term and its tf-idf weight.
#[derive(Debug, Clone, PartialEq)]
pub struct InterestingTerm {
    pub field: String,
    pub text: String,
    pub score: f32,
}

impl<'a> ReadOperation<'a> {
    /// Entries similar to the seed, best first. The seed and every entry
    /// sharing its key are excluded; keys are de-duplicated, first wins.
    pub fn more_like_this<'q, R: ResultRetriever>(
        &'q self,
        request: &'q MoreLikeThisRequest,
        retriever: &'q R,
    ) -> Result<QueryResults<'q, R>> {
        let index = self.index();
        let seed = self.resolve_seed(request)?;
        let seed_doc = index.document(seed).ok_or_else(|| {
            Error::new(ErrorKind::SeedNotFound, format!("Seed entry {:?} is gone", seed))
        })?;

        let terms = self.interesting_terms(request, seed_doc)?;
        let page = Page {
            index,
            start: 0,
            page_size: request.page_size,
            max_outputs_per_document: self.config().max_outputs_per_document.max(1),
            fields_to_fetch: request.fields_to_fetch.as_deref(),
            cancel: &request.cancel,
        };

        if terms.is_empty() {
            log::debug!("more like this: seed {:?} yielded no usable terms", seed);
            return Ok(QueryResults::fixed(page, retriever, TopDocs::default(), 0));
        }

        let best = terms.iter().map(|t| t.score).fold(f32::MIN, f32::max);
        let mut similar = BoolQuery::new();
        for term in &terms {
            similar.should.push(Query::Term(TermQuery {
                field: term.field.clone(),
                value: term.text.clone(),
                boost: (request.boost && best > 0.0).then(|| term.score / best),
            }));
        }

        let query = match &request.additional_query {
            Some(text) => {
                let filter = QueryParser::new()
                    .with_default_field(&request.default_field)
                    .parse(text)?;
                similar.filter.push(filter);
                similar.minimum_should_match = Some(1);
                Query::Bool(similar)
            }
            None => Query::Bool(similar),
        };

        let matches = self.execute(&query, &request.cancel)?;
        let size = request
            .page_size
            .saturating_add(1)
            .saturating_mul(page.max_outputs_per_document);
        let mut top = collect(index, &matches, &CollectStrategy::Sorted(vec![ResolvedSort::score()]), size);
        top.score_docs.retain(|doc| doc.ord != seed);

        let total = matches.len() - usize::from(matches.contains(seed));
        let mut results = QueryResults::fixed(page, retriever, top, total);
        if let Some(key) = retriever.key(seed_doc) {
            results.exclude_key(key);
        }
        Ok(results)
    }

    fn resolve_seed(&self, request: &MoreLikeThisRequest) -> Result<DocOrd> {
        let index = self.index();

        let found = if let Some(id) = &request.document_id {
            index
                .postings(DOCUMENT_ID_FIELD, id)
                .and_then(|list| list.docs().next())
        } else if !request.group_keys.is_empty() {
            self.find_group_seed(&request.group_keys, &request.cancel)?
        } else {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "More like this needs a document id or group keys".to_string(),
            ));
        };

        found.ok_or_else(|| {
            let seed = match &request.document_id {
                Some(id) => id.clone(),
                None => format!("{:?}", request.group_keys),
            };
            Error::new(ErrorKind::SeedNotFound, format!("No entry matches seed {}", seed))
        })
    }

    /// First entry whose values equal every group key exactly.
    ///
    /// Indexed terms narrow the candidates; stored values decide equality.
    /// A key on an unstored field only matches through exact indexing.
    fn find_group_seed(
        &self,
        keys: &[(String, String)],
        cancel: &CancellationToken,
    ) -> Result<Option<DocOrd>> {
        let index = self.index();
        let schema = index.schema();

        let mut narrowing = BoolQuery::new();
        for (field, value) in keys {
            if !schema.terms_for_text(field, value).is_empty() {
                narrowing.must.push(Query::term(field, value));
            }
        }
        let query = if narrowing.must.is_empty() {
            Query::MatchAll
        } else {
            Query::Bool(narrowing)
        };

        for ord in self.execute(&query, cancel)?.iter() {
            check_cancelled(cancel)?;
            let Some(doc) = index.document(ord) else {
                continue;
            };
            let equal = keys.iter().all(|(field, value)| {
                if schema.is_stored(field) {
                    doc.get_field(field).is_some_and(|v| v.as_text() == *value)
                } else {
                    schema.indexing_for(field) == FieldIndexing::Exact
                        && !schema.terms_for_text(field, value).is_empty()
                }
            });
            if equal {
                return Ok(Some(ord));
            }
        }
        Ok(None)
    }

    /// Selects the seed's most characteristic terms by tf-idf.
    pub fn interesting_terms(
        &self,
        request: &MoreLikeThisRequest,
        seed: &Document,
    ) -> Result<Vec<InterestingTerm>> {
        let index = self.index();
        let schema = index.schema();
        let config = self.config();

        let min_term_freq = request.min_term_freq.unwrap_or(config.mlt_min_term_freq);
        let min_doc_freq = request.min_doc_freq.unwrap_or(config.mlt_min_doc_freq);
        let max_doc_freq = request.max_doc_freq.unwrap_or(config.mlt_max_doc_freq);
        let min_word_len = request.min_word_len.unwrap_or(config.mlt_min_word_len);
        let max_query_terms = request.max_query_terms.unwrap_or(config.mlt_max_query_terms);
        let stop_words = request.use_stop_words.then(StopWordFilter::english);

        let fields: Vec<String> = if request.fields.is_empty() {
            seed.field_names()
                .into_iter()
                .filter(|name| !is_reserved(name))
                .map(str::to_string)
                .collect()
        } else {
            request.fields.clone()
        };

        let mut frequencies: HashMap<(String, String), usize> = HashMap::new();
        for field in &fields {
            if is_range_field(field) || schema.indexing_for(field) == FieldIndexing::No {
                continue;
            }
            let Some(value) = seed.get_field(field) else {
                continue;
            };
            for text in schema.terms_for_value(field, value) {
                *frequencies.entry((field.clone(), text)).or_insert(0) += 1;
            }
        }

        let total_docs = index.num_docs();
        let mut terms = Vec::new();
        for ((field, text), term_freq) in frequencies {
            check_cancelled(&request.cancel)?;

            if term_freq < min_term_freq || text.chars().count() < min_word_len {
                continue;
            }
            if stop_words.as_ref().is_some_and(|stop| stop.is_stop_word(&text)) {
                continue;
            }
            let doc_freq = index.doc_freq(&field, &text);
            if doc_freq < min_doc_freq || doc_freq > max_doc_freq {
                continue;
            }

            let score = term_freq as f32 * idf(doc_freq, total_docs);
            terms.push(InterestingTerm { field, text, score });
        }

        terms.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.field.cmp(&b.field))
                .then_with(|| a.text.cmp(&b.text))
        });
        terms.truncate(max_query_terms);
        Ok(terms)
    }
}
