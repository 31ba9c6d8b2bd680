mod pipeline;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use earnings_config::AppConfig;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use pipeline::{Pipeline, RunSummary};

#[derive(Parser)]
#[command(name = "earnings", about = "Earnings-call transcript features and post-call returns")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment transcripts into sections (writes parsed.jsonl)
    Parse,
    /// Score parsed sections (reads parsed.jsonl, writes features.jsonl)
    Features,
    /// Forward returns around each call date (writes returns.jsonl)
    Returns,
    /// Join features and returns (writes analysis.csv)
    Assemble,
    /// All stages in one pass
    Run,
    /// Download missing price files
    FetchPrices {
        /// Comma-separated tickers; defaults to every ticker in the corpus
        #[arg(short, long, value_delimiter = ',')]
        tickers: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config(&cli.config)?;
    let pipeline = Pipeline::new(config);

    match cli.command {
        Commands::Parse => report(&pipeline.run_parse().await?),
        Commands::Features => report(&pipeline.run_features().await?),
        Commands::Returns => report(&pipeline.run_returns().await?),
        Commands::Assemble => report(&pipeline.run_assemble()?),
        Commands::Run => report(&pipeline.run().await?),
        Commands::FetchPrices { tickers } => {
            let summary = pipeline.fetch_prices(&tickers).await?;
            println!("📦 Prices in {}", pipeline.config().paths.prices_dir.display());
            println!("  Fetched:         {}", summary.fetched.len());
            println!("  Already present: {}", summary.skipped_existing.len());
            if !summary.failed.is_empty() {
                println!("  ❌ Failed:       {}", summary.failed.len());
                for (ticker, reason) in &summary.failed {
                    println!("    {:<8} {}", ticker, reason);
                }
            }
        }
    }

    Ok(())
}

/// The config file when present, else the same path relative to the
/// project root above `target/<profile>/`. Built-in defaults when neither exists.
fn load_config(path: &str) -> anyhow::Result<AppConfig> {
    let candidate = resolve_config_path(path);
    if candidate.exists() {
        return Ok(AppConfig::from_file(&candidate)?);
    }
    warn!("Config {} not found, using defaults", path);
    Ok(AppConfig::from_toml("")?)
}

fn resolve_config_path(path: &str) -> PathBuf {
    let direct = PathBuf::from(path);
    if direct.exists() {
        return direct;
    }
    let project_root = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().and_then(Path::parent).and_then(Path::parent).map(Path::to_path_buf));
    match project_root {
        Some(root) if root.join(path).exists() => root.join(path),
        _ => direct,
    }
}

fn report(summary: &RunSummary) {
    println!("✅ Run {} complete", summary.run_id);
    if summary.transcripts > 0 {
        println!(
            "  Transcripts: {} ({} parsed, {} unreadable, {} low confidence)",
            summary.transcripts, summary.parsed, summary.unreadable_transcripts, summary.low_confidence_parses
        );
    }
    if summary.feature_records > 0 || summary.feature_failures > 0 {
        println!(
            "  Features:    {} ({} failed)",
            summary.feature_records, summary.feature_failures
        );
    }
    if summary.return_records > 0 || summary.tickers_without_prices > 0 {
        println!(
            "  Returns:     {} ({} tickers without prices)",
            summary.return_records, summary.tickers_without_prices
        );
    }
    if let Some(a) = &summary.assembly {
        println!(
            "  Rows:        {} ({} matched, {} features-only, {} returns-only)",
            a.rows, a.matched, a.features_only, a.returns_only
        );
    }
}
