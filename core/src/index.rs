use crate::error::IngestError;
use crate::source::DocumentSource;
use crate::tokenizer::tokenize;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io;

/// term → (document id → occurrences of the term in that document)
pub type Postings = HashMap<String, u32>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub num_docs: usize,
    pub num_terms: usize,
    pub total_tokens: u64,
}

/// Immutable in-memory inverted index. Produced by [`IndexBuilder::finish`].
#[derive(Debug, Default)]
pub struct CorpusIndex {
    postings: HashMap<String, Postings>,
    /// Every ingested document has an entry, including documents with zero tokens.
    doc_lengths: HashMap<String, u32>,
}

impl CorpusIndex {
    /// Build an index from every document a source yields.
    pub fn build<S: DocumentSource>(source: &mut S) -> (Self, IngestReport) {
        let mut builder = IndexBuilder::new();
        let report = builder.ingest_all(source);
        (builder.finish(), report)
    }

    /// Count of distinct documents ingested.
    pub fn num_docs(&self) -> usize { self.doc_lengths.len() }

    pub fn num_terms(&self) -> usize { self.postings.len() }

    pub fn is_empty(&self) -> bool { self.doc_lengths.is_empty() }

    pub fn contains_term(&self, term: &str) -> bool { self.postings.contains_key(term) }

    pub fn postings(&self, term: &str) -> Option<&Postings> { self.postings.get(term) }

    /// Occurrences of `term` in `doc_id`, 0 when absent.
    pub fn term_count(&self, term: &str, doc_id: &str) -> u32 {
        self.postings
            .get(term)
            .and_then(|p| p.get(doc_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn num_docs_containing(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, HashMap::len)
    }

    /// Stored token count of a document; `None` if it was never ingested.
    pub fn doc_length(&self, doc_id: &str) -> Option<u32> { self.doc_lengths.get(doc_id).copied() }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            num_docs: self.num_docs(),
            num_terms: self.num_terms(),
            total_tokens: self.doc_lengths.values().map(|&l| u64::from(l)).sum(),
        }
    }
}

/// What happened to a successfully ingested document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Added,
    /// The id was already indexed; its previous postings and length were discarded.
    Replaced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDocument {
    pub doc_id: Option<String>,
    pub reason: String,
}

/// Per-document outcome of a build.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub indexed: Vec<String>,
    pub skipped: Vec<SkippedDocument>,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool { self.skipped.is_empty() }
}

/// Single-threaded index construction. Consumed by [`IndexBuilder::finish`].
#[derive(Debug, Default)]
pub struct IndexBuilder {
    index: CorpusIndex,
    // doc id → terms it contributed, so a re-ingested id can be fully replaced
    doc_terms: HashMap<String, Vec<String>>,
}

impl IndexBuilder {
    pub fn new() -> Self { Self::default() }

    /// Ingest one document from its lines.
    ///
    /// The document is tokenized completely before the index is touched, so a
    /// read error halfway through leaves no trace of it. Ingesting an id that
    /// is already present overwrites that document.
    pub fn ingest<I>(&mut self, doc_id: &str, lines: I) -> Result<IngestOutcome, IngestError>
    where
        I: IntoIterator<Item = io::Result<String>>,
    {
        let mut counts: HashMap<String, u32> = HashMap::new();
        let mut total_words: u32 = 0;
        for line in lines {
            let line = line.map_err(|source| IngestError::Io { doc_id: doc_id.to_string(), source })?;
            for term in tokenize(&line) {
                *counts.entry(term).or_insert(0) += 1;
                total_words += 1;
            }
        }

        let outcome = if self.index.doc_lengths.contains_key(doc_id) {
            self.remove(doc_id);
            IngestOutcome::Replaced
        } else {
            IngestOutcome::Added
        };

        let mut terms = Vec::with_capacity(counts.len());
        for (term, count) in counts {
            self.index
                .postings
                .entry(term.clone())
                .or_default()
                .insert(doc_id.to_string(), count);
            terms.push(term);
        }
        self.doc_terms.insert(doc_id.to_string(), terms);
        self.index.doc_lengths.insert(doc_id.to_string(), total_words);

        tracing::debug!(doc_id, total_words, ?outcome, "ingested document");
        Ok(outcome)
    }

    /// Ingest an in-memory text, split on line breaks.
    pub fn ingest_text(&mut self, doc_id: &str, text: &str) -> Result<IngestOutcome, IngestError> {
        self.ingest(doc_id, text.lines().map(|l| Ok(l.to_string())))
    }

    /// Drain a document source. Failing documents are skipped and reported.
    pub fn ingest_all<S: DocumentSource>(&mut self, source: &mut S) -> IngestReport {
        let mut report = IngestReport::default();
        while let Some(next) = source.next_document() {
            let result = next.and_then(|doc| {
                let id = doc.id;
                self.ingest(&id, doc.lines).map(|_| id)
            });
            match result {
                Ok(id) => report.indexed.push(id),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping document");
                    report.skipped.push(SkippedDocument {
                        doc_id: err.doc_id().map(str::to_string),
                        reason: err.to_string(),
                    });
                }
            }
        }
        tracing::info!(
            indexed = report.indexed.len(),
            skipped = report.skipped.len(),
            num_terms = self.index.num_terms(),
            "ingested documents"
        );
        report
    }

    pub fn finish(self) -> CorpusIndex { self.index }

    fn remove(&mut self, doc_id: &str) {
        let Some(terms) = self.doc_terms.remove(doc_id) else { return };
        for term in terms {
            if let Entry::Occupied(mut entry) = self.index.postings.entry(term) {
                entry.get_mut().remove(doc_id);
                if entry.get().is_empty() {
                    entry.remove();
                }
            }
        }
        self.index.doc_lengths.remove(doc_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(docs: &[(&str, &str)]) -> CorpusIndex {
        let mut builder = IndexBuilder::new();
        for (id, text) in docs {
            builder.ingest_text(id, text).unwrap();
        }
        builder.finish()
    }

    #[test]
    fn counts_postings_and_lengths() {
        let index = build(&[("a.txt", "the cat\nthe hat"), ("b.txt", "a dog")]);
        assert_eq!(index.num_docs(), 2);
        assert_eq!(index.term_count("the", "a.txt"), 2);
        assert_eq!(index.term_count("the", "b.txt"), 0);
        assert!(index.postings("the").unwrap().get("b.txt").is_none());
        assert_eq!(index.doc_length("a.txt"), Some(4));
        assert_eq!(index.doc_length("b.txt"), Some(2));
        assert_eq!(index.num_docs_containing("the"), 1);
        assert_eq!(index.num_docs_containing("missing"), 0);
    }

    #[test]
    fn empty_document_is_counted_with_zero_length() {
        let index = build(&[("empty.txt", "  \n!!!"), ("b.txt", "word")]);
        assert_eq!(index.num_docs(), 2);
        assert_eq!(index.doc_length("empty.txt"), Some(0));
        assert_eq!(index.stats(), IndexStats { num_docs: 2, num_terms: 1, total_tokens: 1 });
    }

    #[test]
    fn reingest_overwrites_previous_content() {
        let mut builder = IndexBuilder::new();
        assert_eq!(builder.ingest_text("a.txt", "old old words").unwrap(), IngestOutcome::Added);
        assert_eq!(builder.ingest_text("a.txt", "new").unwrap(), IngestOutcome::Replaced);
        let index = builder.finish();
        assert_eq!(index.num_docs(), 1);
        assert_eq!(index.doc_length("a.txt"), Some(1));
        assert!(!index.contains_term("old"));
        assert!(!index.contains_term("words"));
        assert_eq!(index.term_count("new", "a.txt"), 1);
    }

    #[test]
    fn failed_read_leaves_no_partial_document() {
        let mut builder = IndexBuilder::new();
        let lines = vec![
            Ok("partial content".to_string()),
            Err(io::Error::new(io::ErrorKind::Other, "disk gone")),
        ];
        let err = builder.ingest("bad.txt", lines).unwrap_err();
        assert_eq!(err.doc_id(), Some("bad.txt"));
        let index = builder.finish();
        assert!(index.is_empty());
        assert!(!index.contains_term("partial"));
    }
}
