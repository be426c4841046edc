/// Page size of requests that do not set one.
pub const DEFAULT_PAGE_SIZE: usize = 128;

#[derive(Debug, Clone)]
pub struct Config {
    /// Upper bound on how many index entries one stored document expands into.
    /// Drives over-fetch widening when candidates are skipped.
    pub max_outputs_per_document: usize,
    /// Entries kept per snapshot in the facet field-value cache.
    pub field_cache_capacity: usize,
    /// Page size of requests built through [`Database::request`](crate::core::database::Database::request).
    pub default_page_size: usize,

    // Intersection queries
    pub max_intersect_widenings: usize,

    // More-like-this defaults
    pub mlt_min_term_freq: usize,
    pub mlt_min_doc_freq: usize,
    pub mlt_max_doc_freq: usize,
    pub mlt_min_word_len: usize,
    pub mlt_max_query_terms: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_outputs_per_document: 1,
            field_cache_capacity: 16 * 1024,
            default_page_size: DEFAULT_PAGE_SIZE,

            max_intersect_widenings: 32,

            mlt_min_term_freq: 1,
            mlt_min_doc_freq: 1,
            mlt_max_doc_freq: usize::MAX,
            mlt_min_word_len: 0,
            mlt_max_query_terms: 25,
        }
    }
}

impl Config {
    pub fn with_max_outputs_per_document(mut self, max_outputs: usize) -> Self {
        self.max_outputs_per_document = max_outputs.max(1);
        self
    }

    pub fn with_default_page_size(mut self, page_size: usize) -> Self {
        self.default_page_size = page_size;
        self
    }

    pub fn with_field_cache_capacity(mut self, capacity: usize) -> Self {
        self.field_cache_capacity = capacity;
        self
    }
}
