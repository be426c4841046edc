use crate::core::types::DocOrd;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Posting {
    pub doc: DocOrd,
    pub term_freq: u32,       // Occurrences of the term in this entry's field
}

/// Posting list for a term
/// Note: sorted by doc ordinal, entries are appended in ordinal order
#[derive(Debug, Clone, Default)]
pub struct PostingList {
    pub postings: Vec<Posting>,
}

impl PostingList {
    pub fn new() -> Self {
        PostingList {
            postings: Vec::new(),
        }
    }

    /// Adds one occurrence of the term for `doc`.
    pub fn record(&mut self, doc: DocOrd) {
        match self.postings.last_mut() {
            Some(last) if last.doc == doc => last.term_freq += 1,
            Some(last) if last.doc > doc => {
                match self.postings.binary_search_by_key(&doc, |p| p.doc) {
                    Ok(pos) => self.postings[pos].term_freq += 1,
                    Err(pos) => self.postings.insert(pos, Posting { doc, term_freq: 1 }),
                }
            }
            _ => self.postings.push(Posting { doc, term_freq: 1 }),
        }
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn doc_freq(&self) -> u32 {
        self.postings.len() as u32
    }

    pub fn get(&self, doc: DocOrd) -> Option<&Posting> {
        self.postings
            .binary_search_by_key(&doc, |p| p.doc)
            .ok()
            .map(|pos| &self.postings[pos])
    }

    pub fn contains(&self, doc: DocOrd) -> bool {
        self.get(doc).is_some()
    }

    pub fn docs(&self) -> impl Iterator<Item = DocOrd> + '_ {
        self.postings.iter().map(|p| p.doc)
    }
}
