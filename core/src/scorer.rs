//! TF-IDF scoring over a [`CorpusIndex`].
//!
//! `tf = count / max(len, 1)` and `idf = ln(N / (df + 1))`. The idf is not
//! floored: a term present in every document scores negatively. With `N == 0`
//! the idf is `-inf`, so callers must check [`CorpusIndex::is_empty`] first.

use crate::index::CorpusIndex;

/// Occurrences of `term` in `doc_id` divided by the document length.
pub fn term_frequency(index: &CorpusIndex, term: &str, doc_id: &str) -> f64 {
    let term_count = index.term_count(term, doc_id);
    let doc_length = index.doc_length(doc_id).unwrap_or(0).max(1);
    f64::from(term_count) / f64::from(doc_length)
}

pub fn inverse_document_frequency(index: &CorpusIndex, term: &str) -> f64 {
    let total_docs = index.num_docs() as f64;
    let docs_with_term = index.num_docs_containing(term) as f64;
    (total_docs / (docs_with_term + 1.0)).ln()
}

/// TF-IDF contribution of `term` to `doc_id`.
pub fn score(index: &CorpusIndex, term: &str, doc_id: &str) -> f64 {
    term_frequency(index, term, doc_id) * inverse_document_frequency(index, term)
}
