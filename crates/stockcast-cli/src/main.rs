//! Command-line interface for stockcast

use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::{Table, presets::UTF8_FULL};
use stockcast::{
    Exchange, FeatureRow, NewsArticle, PredictionResponse, PredictorConfig, StockPredictor,
};
use stockcast_utils::{AppInfo, LogFormat, init_tracing_with};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "stockcast")]
#[command(about = "Forecast NSE/BSE stock prices from the command line", long_about = None)]
struct Args {
    /// Print raw JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Log output format (pretty or json)
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Technical indicators for the most recent sessions
    Indicators {
        symbol: String,
        #[arg(long, default_value = "NSE")]
        exchange: String,
        /// Number of trailing rows to show
        #[arg(long, default_value_t = 10)]
        rows: usize,
    },
    /// Latest company news
    News {
        symbol: String,
        #[arg(long, default_value_t = 5)]
        num_articles: usize,
    },
    /// Train a forecaster and print a recommendation
    Predict {
        stock: String,
        #[arg(long, default_value = "NSE")]
        exchange: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing_with(args.log_format, "warn,stockcast=info");

    let app = AppInfo::new("stockcast-cli", env!("CARGO_PKG_VERSION"));
    info!(version = %app.version, environment = %app.environment, "starting");

    let config = PredictorConfig::builder()
        .with_env_keys()
        .build()
        .context("invalid configuration")?;
    let predictor = StockPredictor::new(config)?;

    match args.command {
        Command::Indicators {
            symbol,
            exchange,
            rows,
        } => {
            let table = predictor
                .technical_indicators(&symbol, Exchange::from_code(&exchange))
                .await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&table)?);
            } else {
                println!("{}", indicator_table(&table, rows));
            }
        }
        Command::News {
            symbol,
            num_articles,
        } => {
            let articles = predictor.news(&symbol, num_articles).await;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&articles)?);
            } else if articles.is_empty() {
                println!("No news found for {symbol}");
            } else {
                println!("{}", news_table(&articles));
            }
        }
        Command::Predict { stock, exchange } => {
            let response = predictor
                .predict(&stock, Exchange::from_code(&exchange))
                .await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", prediction_table(&response));
            }
        }
    }

    Ok(())
}

fn indicator_table(rows: &[FeatureRow], last: usize) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Date", "Close", "SMA 20", "EMA 20", "RSI", "MACD", "Signal", "BB upper", "BB lower",
    ]);

    for row in &rows[rows.len().saturating_sub(last)..] {
        table.add_row(vec![
            row.price.timestamp.format("%Y-%m-%d").to_string(),
            format!("{:.2}", row.price.close),
            format!("{:.2}", row.sma_20),
            format!("{:.2}", row.ema_20),
            format!("{:.1}", row.rsi),
            format!("{:.3}", row.macd),
            format!("{:.3}", row.signal_line),
            format!("{:.2}", row.bb_upper),
            format!("{:.2}", row.bb_lower),
        ]);
    }
    table
}

fn news_table(articles: &[NewsArticle]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Title", "Summary"]);
    for article in articles {
        table.add_row(vec![article.title.as_str(), article.description.as_str()]);
    }
    table
}

fn prediction_table(response: &PredictionResponse) -> Table {
    let p = &response.prediction;
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec![response.stock_symbol.as_str(), ""]);

    let rows = [
        ("Action", p.action.to_string()),
        ("Timing", p.timing.to_string()),
        ("Current price", format!("{:.2}", p.current_price)),
        ("Predicted price", format!("{:.2}", p.predicted_price)),
        ("Predicted return", format!("{:.2}%", p.predicted_return)),
        ("Confidence", format!("{:.1}%", p.confidence)),
        ("Volatility", format!("{:.4}", p.volatility)),
        ("Market sentiment", p.market_sentiment.to_string()),
        ("Model R² (train)", format!("{:.3}", p.model_accuracy.train)),
        ("Model R² (test)", format!("{:.3}", p.model_accuracy.test)),
    ];
    for (label, value) in rows {
        table.add_row(vec![label.to_string(), value]);
    }
    table
}
