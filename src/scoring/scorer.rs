/// Scorer trait
pub trait Scorer: Send + Sync {
    fn score(&self, term_freq: u32, doc_freq: usize, doc_stats: &DocStats) -> f32;

    fn name(&self) -> &str;
}

/// Document statistics for scoring
#[derive(Debug, Clone)]
pub struct DocStats {
    pub field_length: u32,      // Tokens in the scored field of this entry
    pub avg_field_length: f32,  // Average length of the field across the index
    pub total_docs: usize,      // Entries in the index
}

/// Smoothed inverse document frequency, never negative.
pub fn idf(doc_freq: usize, total_docs: usize) -> f32 {
    let n = total_docs as f32;
    let df = doc_freq as f32;
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}

/// BM25 Scorer
pub struct BM25Scorer {
    pub k1: f32,  // Term frequency saturation (default: 1.2)
    pub b: f32,   // Length normalization strength (default: 0.75)
}

impl Default for BM25Scorer {
    fn default() -> Self {
        BM25Scorer {
            k1: 1.2,
            b: 0.75,
        }
    }
}

impl Scorer for BM25Scorer {
    fn score(&self, term_freq: u32, doc_freq: usize, doc_stats: &DocStats) -> f32 {
        let tf = term_freq as f32;
        let field_len = doc_stats.field_length.max(1) as f32;
        let avg_len = if doc_stats.avg_field_length > 0.0 {
            doc_stats.avg_field_length
        } else {
            1.0
        };

        let numerator = idf(doc_freq, doc_stats.total_docs) * tf * (self.k1 + 1.0);
        let denominator = tf + self.k1 * (1.0 - self.b + self.b * (field_len / avg_len));

        numerator / denominator
    }

    fn name(&self) -> &str {
        "bm25"
    }
}
