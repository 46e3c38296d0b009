use anyhow::Result;
use clap::Parser;
use engine::config::DEFAULT_CANDIDATE_LIMIT;
use engine::EngineConfig;
use server::build_app;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(about = "Serve keyword, prefix and semantic queries over an index directory")]
struct Args {
    /// Index directory path
    #[arg(long, default_value = "./index")]
    index: PathBuf,
    /// Word vectors (GloVe text format) enabling semantic reranking
    #[arg(long)]
    vectors: Option<PathBuf>,
    /// Keyword candidates handed to the semantic reranker
    #[arg(long, default_value_t = DEFAULT_CANDIDATE_LIMIT)]
    candidate_limit: usize,
    /// Index stopwords too when ingesting through /index
    #[arg(long)]
    keep_stopwords: bool,
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let mut config = EngineConfig::new(&args.index).with_candidate_limit(args.candidate_limit);
    config.remove_stopwords = !args.keep_stopwords;
    let app = build_app(config, args.vectors)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, index = %args.index.display(), "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
