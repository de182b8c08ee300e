//! Stock prediction HTTP server
//!
//! # Usage
//!
//! ```bash
//! export PERPLEXITY_API_KEY="pplx-..."
//! export HF_API_TOKEN="hf_..."
//!
//! cargo run --release --bin stockcast-server -- --port 8000
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use stockcast::{PredictorConfig, SentimentBackend, StockPredictor};
use stockcast_utils::{AppInfo, LogFormat, init_tracing_with};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "stockcast-server")]
#[command(about = "HTTP API for stock price prediction", long_about = None)]
struct Args {
    /// Address to bind
    #[arg(long, env = "STOCKCAST_BIND", default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on
    #[arg(long, env = "STOCKCAST_PORT", default_value_t = 8000)]
    port: u16,

    /// Log output format (pretty or json)
    #[arg(long, env = "STOCKCAST_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,

    /// Sentiment classifier (hosted, vader or disabled)
    #[arg(long, default_value = "hosted")]
    sentiment: String,

    /// Keep trained models for this many seconds (0 disables the cache)
    #[arg(long, default_value_t = 0)]
    model_cache_secs: u64,
}

fn parse_backend(name: &str) -> anyhow::Result<SentimentBackend> {
    match name.to_ascii_lowercase().as_str() {
        "hosted" => Ok(SentimentBackend::Hosted),
        "vader" => Ok(SentimentBackend::Vader),
        "disabled" | "none" => Ok(SentimentBackend::Disabled),
        other => anyhow::bail!("unknown sentiment backend '{other}'"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing_with(args.log_format, "info,tower_http=info");

    let app = AppInfo::new("stockcast-server", env!("CARGO_PKG_VERSION"));
    info!(
        app = %app.app_name,
        version = %app.version,
        environment = %app.environment,
        "starting"
    );

    let mut builder = PredictorConfig::builder()
        .with_env_keys()
        .sentiment_backend(parse_backend(&args.sentiment)?);
    if args.model_cache_secs > 0 {
        builder = builder.model_cache_ttl(std::time::Duration::from_secs(args.model_cache_secs));
    }
    let config = builder.build()?;

    let predictor = Arc::new(StockPredictor::new(config)?);

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    stockcast::server::serve(addr, predictor).await
}
