use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dumpstat::config::{AnalyzerConfig, RateMode};

#[derive(Parser, Debug)]
#[command(name = "dumpstat", version, about = "Capture log statistics and anomaly report")]
struct Args {
    /// Capture text file (tcpdump-style output)
    path: PathBuf,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extraction worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Rate normalization: fixed (60 s) or measured from timestamps
    #[arg(long)]
    rate_mode: Option<RateMode>,

    /// Single-line JSON
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dumpstat=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AnalyzerConfig::from_file(path)?,
        None => AnalyzerConfig::from_env()?,
    };
    if let Some(workers) = args.workers {
        config.ingest.workers = workers;
    }
    if let Some(mode) = args.rate_mode {
        config.rate.mode = mode;
    }

    let result = dumpstat::analyze_file(&args.path, &config)?;
    for anomaly in &result.detected_anomalies {
        tracing::warn!(
            "Suspicious Activity Detected: {} from {} - {}",
            anomaly.kind,
            anomaly.ip_source,
            anomaly.details
        );
    }
    println!("{}", result.to_json(!args.compact)?);
    Ok(())
}
