use anyhow::Result;
use axum::Router;
use clap::Parser;
use search_core::EngineConfig;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};
use server::build_app;
use tokio::net::TcpListener;

#[derive(Parser)]
struct Args {
    /// Corpus directory, indexed in memory at startup
    #[arg(long, default_value = "./documents")]
    corpus: String,
    /// File extension to index
    #[arg(long, default_value = EngineConfig::DEFAULT_EXTENSION)]
    ext: String,
    /// Scoring workers per query
    #[arg(long, default_value_t = EngineConfig::DEFAULT_WORKERS)]
    workers: usize,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = EngineConfig { worker_threads: args.workers, extension: args.ext };
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let app: Router = build_app(args.corpus.clone(), config, admin_token)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, corpus = %args.corpus, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
