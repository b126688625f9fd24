use anyhow::{Context, Result};
use axum::{extract::{Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use search_core::tokenizer::tokenize;
use search_core::{CorpusIndex, DirectorySource, EngineConfig, IndexStats, IngestReport, QueryExecutor, SearchError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub score: f64,
    pub snippet: Option<String>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: IndexStats,
    pub built_at: String,
    pub skipped: Vec<search_core::SkippedDocument>,
}

/// An index together with how it was built. Replaced wholesale on rebuild.
pub struct LoadedIndex {
    pub index: CorpusIndex,
    pub report: IngestReport,
    pub built_at: String,
}

impl LoadedIndex {
    pub fn build(corpus_root: &Path, config: &EngineConfig) -> Self {
        let mut source = DirectorySource::new(corpus_root, &config.extension);
        let (index, report) = CorpusIndex::build(&mut source);
        let built_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        Self { index, report, built_at }
    }

    fn stats_response(&self) -> StatsResponse {
        StatsResponse {
            stats: self.index.stats(),
            built_at: self.built_at.clone(),
            skipped: self.report.skipped.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub corpus_root: PathBuf,
    pub config: EngineConfig,
    pub index: Arc<RwLock<Arc<LoadedIndex>>>,
    pub executor: Arc<QueryExecutor>,
    pub admin_token: Option<String>,
}

impl AppState {
    fn snapshot(&self) -> Arc<LoadedIndex> { self.index.read().clone() }
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl std::fmt::Display) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.to_string() })))
}

pub fn build_app(corpus_dir: impl Into<PathBuf>, config: EngineConfig, admin_token: Option<String>) -> Result<Router> {
    let corpus_root = corpus_dir.into();
    anyhow::ensure!(corpus_root.is_dir(), "corpus directory {} does not exist", corpus_root.display());

    // Build the index at startup
    let loaded = LoadedIndex::build(&corpus_root, &config);
    let stats = loaded.index.stats();
    tracing::info!(
        num_docs = stats.num_docs,
        num_terms = stats.num_terms,
        skipped = loaded.report.skipped.len(),
        "index built"
    );
    let executor = QueryExecutor::from_config(&config).context("creating query workers")?;
    let app_state = AppState {
        corpus_root,
        config,
        index: Arc::new(RwLock::new(Arc::new(loaded))),
        executor: Arc::new(executor),
        admin_token,
    };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/stats", get(stats_handler))
        .route("/index/rebuild", post(rebuild_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let loaded = state.snapshot();
    let executor = state.executor.clone();
    let query = params.q.clone();

    // Scoring is CPU-bound and blocks on the worker pool
    let ranked = tokio::task::spawn_blocking(move || executor.search_scored(&loaded.index, &query))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("query task aborted: {e}")))?
        .map_err(|e: SearchError| {
            tracing::error!(error = %e, q = %params.q, "search failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
        })?;

    let total_hits = ranked.len();
    let k = params.k.clamp(1, 100);
    let terms: BTreeSet<String> = tokenize(&params.q).into_iter().collect();
    let pattern = term_pattern(&terms);
    let results = ranked
        .into_iter()
        .take(k)
        .map(|hit| {
            let snippet = snippet_from_file(&state.corpus_root.join(&hit.doc_id), pattern.as_ref());
            SearchHit { doc_id: hit.doc_id, score: hit.score, snippet }
        })
        .collect();

    let elapsed = start.elapsed();
    Ok(Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), total_hits, results }))
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.snapshot().stats_response())
}

async fn rebuild_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<StatsResponse>, ApiError> {
    authorize(&state, &headers)?;
    let root = state.corpus_root.clone();
    let config = state.config.clone();
    let loaded = tokio::task::spawn_blocking(move || LoadedIndex::build(&root, &config))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("rebuild aborted: {e}")))?;
    let response = loaded.stats_response();
    // In-flight queries keep their snapshot until they finish
    *state.index.write() = Arc::new(loaded);
    tracing::info!(num_docs = response.stats.num_docs, "index rebuilt");
    Ok(Json(response))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(api_error(StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set")),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(api_error(StatusCode::UNAUTHORIZED, "invalid admin token"))
    }
}

fn snippet_from_file(path: &Path, pattern: Option<&Regex>) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    snippet_from_text(&String::from_utf8_lossy(&bytes), pattern)
}

/// Up to 300 bytes around the first whole-word match, matches wrapped in `<em>`.
fn snippet_from_text(text: &str, pattern: Option<&Regex>) -> Option<String> {
    if text.is_empty() { return None; }
    let first_idx = pattern.and_then(|pat| pat.find(text)).map(|m| m.start());
    let snippet = match first_idx {
        Some(idx) => {
            let start = floor_char_boundary(text, idx.saturating_sub(100));
            let end = floor_char_boundary(text, (idx + 200).min(text.len()));
            &text[start..end]
        }
        None => {
            let end = text.char_indices().nth(200).map_or(text.len(), |(i, _)| i);
            &text[..end]
        }
    };
    Some(match pattern {
        Some(pat) => pat
            .replace_all(snippet, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0]))
            .into_owned(),
        None => snippet.to_string(),
    })
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Case-insensitive whole-word alternation of the query terms.
fn term_pattern(terms: &BTreeSet<String>) -> Option<Regex> {
    if terms.is_empty() { return None; }
    let alternation: Vec<String> = terms.iter().map(|t| regex::escape(t)).collect();
    match RegexBuilder::new(&format!(r"\b(?:{})\b", alternation.join("|")))
        .case_insensitive(true)
        .build()
    {
        Ok(pat) => Some(pat),
        Err(err) => {
            tracing::warn!(error = %err, "skipping highlight");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(words: &[&str]) -> Regex {
        let terms: BTreeSet<String> = words.iter().map(|w| w.to_string()).collect();
        term_pattern(&terms).unwrap()
    }

    #[test]
    fn highlights_whole_words_case_insensitively() {
        let out = snippet_from_text("The Cat sat on a category", Some(&pattern(&["cat"]))).unwrap();
        assert_eq!(out, "The <em>Cat</em> sat on a category");
    }

    #[test]
    fn highlighting_does_not_touch_inserted_tags() {
        let out = snippet_from_text("em and cat", Some(&pattern(&["em", "cat"]))).unwrap();
        assert_eq!(out, "<em>em</em> and <em>cat</em>");
    }

    #[test]
    fn snippet_anchors_on_whole_word_not_substring() {
        let text = format!("category {}the cat sat", "filler ".repeat(60));
        let out = snippet_from_text(&text, Some(&pattern(&["cat"]))).unwrap();
        assert!(out.contains("the <em>cat</em> sat"));
        assert!(!out.contains("category"));
    }

    #[test]
    fn snippet_without_match_takes_leading_text() {
        let text = "x".repeat(250);
        assert_eq!(snippet_from_text(&text, Some(&pattern(&["cat"]))).unwrap().len(), 200);
        assert_eq!(snippet_from_text(&text, None).unwrap().len(), 200);
        assert!(snippet_from_text("", None).is_none());
    }

    #[test]
    fn snippet_reads_non_utf8_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.txt");
        std::fs::write(&path, b"caf\xe9 cat").unwrap();
        let out = snippet_from_file(&path, Some(&pattern(&["cat"]))).unwrap();
        assert!(out.ends_with("<em>cat</em>"));
    }

    #[test]
    fn char_boundary_never_splits_multibyte() {
        let s = "héllo";
        assert_eq!(floor_char_boundary(s, 2), 1);
        assert_eq!(floor_char_boundary(s, 3), 3);
        assert_eq!(floor_char_boundary(s, 0), 0);
    }
}
