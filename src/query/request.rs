use tokio_util::sync::CancellationToken;
use crate::core::config::{Config, DEFAULT_PAGE_SIZE};
use crate::core::error::{Error, Result};
use crate::query::ast::Query;
use crate::query::parser::{BooleanOperator, QueryParser};
use crate::search::sort::SortField;

/// One page request against a snapshot. Immutable for the duration of a call.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub query: String,
    pub default_field: String,
    pub default_operator: BooleanOperator,
    pub sort: Vec<SortField>,
    pub start: usize,
    pub page_size: usize,
    /// Stored fields to project into results; `None` returns every stored field.
    pub fields_to_fetch: Option<Vec<String>>,
    pub cancel: CancellationToken,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        QueryRequest {
            query: query.into(),
            default_field: "content".to_string(),
            default_operator: BooleanOperator::Or,
            sort: Vec::new(),
            start: 0,
            page_size: DEFAULT_PAGE_SIZE,
            fields_to_fetch: None,
            cancel: CancellationToken::new(),
        }
    }

    /// A request paged by `config.default_page_size`.
    pub fn with_config(query: impl Into<String>, config: &Config) -> Self {
        QueryRequest {
            page_size: config.default_page_size,
            ..Self::new(query)
        }
    }

    pub fn with_default_field(mut self, field: &str) -> Self {
        self.default_field = field.to_string();
        self
    }

    pub fn with_default_operator(mut self, operator: BooleanOperator) -> Self {
        self.default_operator = operator;
        self
    }

    pub fn with_sort(mut self, sort: SortField) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_page(mut self, start: usize, page_size: usize) -> Self {
        self.start = start;
        self.page_size = page_size;
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields_to_fetch = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Offset one past the last requested result.
    pub fn window(&self) -> usize {
        self.start.saturating_add(self.page_size)
    }

    pub fn parser(&self) -> QueryParser {
        QueryParser::new()
            .with_default_field(&self.default_field)
            .with_default_operator(self.default_operator)
    }

    pub fn parse(&self) -> Result<Query> {
        self.parse_text(&self.query)
    }

    /// Parses other query text with this request's defaults.
    pub fn parse_text(&self, text: &str) -> Result<Query> {
        self.parser().parse(text)
    }
}

pub(crate) fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::cancelled());
    }
    Ok(())
}
