use crate::config::EngineConfig;
use crate::error::SearchError;
use crate::index::CorpusIndex;
use crate::scorer::score;
use crate::tokenizer::tokenize;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDoc {
    pub doc_id: String,
    pub score: f64,
}

/// Shared flag a caller flips to abort an in-flight query.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self { Self::default() }
    pub fn cancel(&self) { self.0.store(true, Ordering::Relaxed); }
    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Relaxed) }
}

type Partial<'a> = HashMap<&'a str, f64>;

/// Evaluates queries against a [`CorpusIndex`] on a bounded worker pool.
///
/// One task runs per distinct query term. Each task fills its own map of
/// partial scores; the maps are summed on the calling thread after every task
/// has joined, so no accumulator is ever shared between workers.
pub struct QueryExecutor {
    pool: rayon::ThreadPool,
}

impl QueryExecutor {
    pub fn new(workers: usize) -> Result<Self, SearchError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("search-worker-{i}"))
            .build()
            .map_err(|e| SearchError::Pool(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, SearchError> {
        Self::new(config.worker_threads)
    }

    pub fn workers(&self) -> usize { self.pool.current_num_threads() }

    /// Ranked document ids for `query`. An empty result means nothing relevant.
    pub fn search(&self, index: &CorpusIndex, query: &str) -> Result<Vec<String>, SearchError> {
        let ranked = self.search_scored(index, query)?;
        Ok(ranked.into_iter().map(|d| d.doc_id).collect())
    }

    pub fn search_scored(&self, index: &CorpusIndex, query: &str) -> Result<Vec<ScoredDoc>, SearchError> {
        self.search_with_cancel(index, query, &CancellationFlag::new())
    }

    /// Like [`search_scored`](Self::search_scored), aborting with
    /// [`SearchError::Cancelled`] once `cancel` is set.
    pub fn search_with_cancel(
        &self,
        index: &CorpusIndex,
        query: &str,
        cancel: &CancellationFlag,
    ) -> Result<Vec<ScoredDoc>, SearchError> {
        if index.is_empty() {
            tracing::debug!(query, "empty corpus, nothing to rank");
            return Ok(Vec::new());
        }
        let terms: BTreeSet<String> = tokenize(query)
            .into_iter()
            .filter(|t| index.contains_term(t))
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let terms: Vec<String> = terms.into_iter().collect();

        let partials = self.fan_out(&terms, |term| score_term(index, term, cancel))?;
        let ranked = rank(merge(partials));
        tracing::debug!(query, terms = terms.len(), hits = ranked.len(), "query evaluated");
        Ok(ranked)
    }

    /// Run `task` once per term on the pool. The first error or panic fails the
    /// whole batch.
    fn fan_out<'a, F>(&self, terms: &'a [String], task: F) -> Result<Vec<Partial<'a>>, SearchError>
    where
        F: Fn(&'a str) -> Result<Partial<'a>, SearchError> + Sync,
    {
        self.pool.install(|| {
            terms
                .par_iter()
                .map(|term| {
                    panic::catch_unwind(AssertUnwindSafe(|| task(term.as_str()))).unwrap_or_else(
                        |payload| {
                            Err(SearchError::TaskFailed {
                                term: term.clone(),
                                reason: panic_message(payload.as_ref()),
                            })
                        },
                    )
                })
                .collect()
        })
    }
}

fn score_term<'a>(
    index: &'a CorpusIndex,
    term: &str,
    cancel: &CancellationFlag,
) -> Result<Partial<'a>, SearchError> {
    let Some(postings) = index.postings(term) else {
        return Ok(HashMap::new());
    };
    let mut partial = HashMap::with_capacity(postings.len());
    for doc_id in postings.keys() {
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        let s = score(index, term, doc_id);
        if !s.is_finite() {
            return Err(SearchError::TaskFailed {
                term: term.to_string(),
                reason: format!("non-finite score {s} for {doc_id}"),
            });
        }
        partial.insert(doc_id.as_str(), s);
    }
    Ok(partial)
}

fn merge<'a>(partials: Vec<Partial<'a>>) -> Partial<'a> {
    let mut totals: Partial<'a> = HashMap::new();
    for partial in partials {
        for (doc_id, s) in partial {
            *totals.entry(doc_id).or_insert(0.0) += s;
        }
    }
    totals
}

/// Descending by score; equal scores fall back to ascending document id.
fn rank(totals: Partial<'_>) -> Vec<ScoredDoc> {
    let mut ranked: Vec<ScoredDoc> = totals
        .into_iter()
        .map(|(doc_id, score)| ScoredDoc { doc_id: doc_id.to_string(), score })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.doc_id.cmp(&b.doc_id)));
    ranked
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}
