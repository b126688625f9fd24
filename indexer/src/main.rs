use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use search_core::{CorpusIndex, DirectorySource, EngineConfig, IngestReport, QueryExecutor, ScoredDoc};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use std::io::{self, BufRead, Write};
use std::path::Path;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build an in-memory TF-IDF index over a directory and query it", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a directory, then answer one query or prompt for queries on stdin
    Query {
        /// Corpus directory, walked recursively
        #[arg(long)]
        corpus: String,
        /// Query to run; prompts interactively when omitted
        #[arg(long)]
        query: Option<String>,
        /// File extension to index
        #[arg(long, default_value = EngineConfig::DEFAULT_EXTENSION)]
        ext: String,
        /// Scoring workers per query
        #[arg(long, default_value_t = EngineConfig::DEFAULT_WORKERS)]
        workers: usize,
        /// Print scores next to document ids
        #[arg(long, default_value_t = false)]
        scores: bool,
        /// Print at most this many documents
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Index a directory and print statistics as JSON
    Stats {
        #[arg(long)]
        corpus: String,
        #[arg(long, default_value = EngineConfig::DEFAULT_EXTENSION)]
        ext: String,
    },
}

#[derive(Serialize)]
struct StatsOutput {
    num_docs: usize,
    num_terms: usize,
    total_tokens: u64,
    built_at: String,
    skipped: Vec<search_core::SkippedDocument>,
}

struct OutputOptions {
    scores: bool,
    limit: Option<usize>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Query { corpus, query, ext, workers, scores, limit } => {
            let config = EngineConfig { worker_threads: workers, extension: ext };
            let (index, report) = build_index(&corpus, &config)?;
            print_skipped(&report);
            let exec = QueryExecutor::from_config(&config)?;
            let opts = OutputOptions { scores, limit };
            let stdout = io::stdout();
            match query {
                Some(q) => answer(&exec, &index, &q, &opts, &mut stdout.lock()),
                None => prompt_loop(&exec, &index, &opts, io::stdin().lock(), &mut stdout.lock()),
            }
        }
        Commands::Stats { corpus, ext } => {
            let config = EngineConfig { extension: ext, ..EngineConfig::default() };
            let (index, report) = build_index(&corpus, &config)?;
            let out = stats_output(&index, report);
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
    }
}

fn build_index(corpus: &str, config: &EngineConfig) -> Result<(CorpusIndex, IngestReport)> {
    let root = Path::new(corpus);
    anyhow::ensure!(root.is_dir(), "corpus directory {corpus} does not exist");
    let mut source = DirectorySource::new(root, &config.extension);
    let (index, report) = CorpusIndex::build(&mut source);
    let stats = index.stats();
    tracing::info!(corpus, num_docs = stats.num_docs, num_terms = stats.num_terms, "index built");
    Ok((index, report))
}

fn print_skipped(report: &IngestReport) {
    if report.is_clean() {
        return;
    }
    eprintln!("Skipped {} document(s):", report.skipped.len());
    for skipped in &report.skipped {
        eprintln!("  {}", skipped.reason);
    }
}

fn stats_output(index: &CorpusIndex, report: IngestReport) -> StatsOutput {
    let stats = index.stats();
    StatsOutput {
        num_docs: stats.num_docs,
        num_terms: stats.num_terms,
        total_tokens: stats.total_tokens,
        built_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
        skipped: report.skipped,
    }
}

fn answer<W: Write>(
    exec: &QueryExecutor,
    index: &CorpusIndex,
    query: &str,
    opts: &OutputOptions,
    out: &mut W,
) -> Result<()> {
    let ranked = exec
        .search_scored(index, query)
        .with_context(|| format!("query {query:?} failed"))?;
    writeln!(out, "{}", render(&ranked, opts))?;
    Ok(())
}

fn prompt_loop<R: BufRead, W: Write>(
    exec: &QueryExecutor,
    index: &CorpusIndex,
    opts: &OutputOptions,
    input: R,
    out: &mut W,
) -> Result<()> {
    write!(out, "Enter search query: ")?;
    out.flush()?;
    for line in input.lines() {
        let line = line?;
        answer(exec, index, &line, opts, out)?;
        write!(out, "Enter search query: ")?;
        out.flush()?;
    }
    writeln!(out)?;
    Ok(())
}

fn render(ranked: &[ScoredDoc], opts: &OutputOptions) -> String {
    if ranked.is_empty() {
        return "No relevant documents found.".to_string();
    }
    let shown = &ranked[..opts.limit.unwrap_or(ranked.len()).min(ranked.len())];
    let items: Vec<String> = shown
        .iter()
        .map(|d| if opts.scores { format!("{} ({:.6})", d.doc_id, d.score) } else { d.doc_id.clone() })
        .collect();
    format!("Relevant documents: [{}]", items.join(", "))
}
