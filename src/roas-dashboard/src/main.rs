//! ROAS Dashboard — spend-to-revenue reconciliation for ad campaigns.
//!
//! Consumes the ad platform's spend CSV export plus a JSON export of the
//! pre-aggregated revenue rows and prints the full dashboard payload.

use clap::Parser;
use roas_core::AnalysisConfig;
use roas_reporting::{run_offline, OfflineInput};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "roas-dashboard")]
#[command(about = "Spend-to-revenue reconciliation and ROAS analytics")]
#[command(version)]
struct Cli {
    /// Ad platform spend report (CSV)
    #[arg(long)]
    spend_csv: PathBuf,

    /// Pre-aggregated revenue rows (JSON export)
    #[arg(long)]
    revenue_json: PathBuf,

    /// Country-level spend report (CSV, optional)
    #[arg(long)]
    country_csv: Option<PathBuf>,

    /// Currency divisor for spend amounts (overrides config)
    #[arg(long, env = "ROAS_DASHBOARD__EXCHANGE_RATE")]
    exchange_rate: Option<f64>,

    /// Double tracked and organic revenue (co-production deals)
    #[arg(long, default_value_t = false)]
    multiply_revenue: bool,

    /// Pretty-print the JSON payload
    #[arg(long, default_value_t = false)]
    pretty: bool,

    /// Write the payload to a file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roas_dashboard=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = AnalysisConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AnalysisConfig::default()
    });
    if let Some(rate) = cli.exchange_rate {
        config.exchange_rate = rate;
    }
    if cli.multiply_revenue {
        config.multiply_revenue = true;
    }

    info!(
        exchange_rate = config.exchange_rate,
        multiply_revenue = config.multiply_revenue,
        "Configuration loaded"
    );

    let spend_csv = fs::read_to_string(&cli.spend_csv)?;
    let country_csv = cli
        .country_csv
        .as_ref()
        .map(fs::read_to_string)
        .transpose()?;
    let input: OfflineInput = serde_json::from_str(&fs::read_to_string(&cli.revenue_json)?)?;

    let result = run_offline(&spend_csv, country_csv.as_deref(), input, &config)?;
    info!(ads = result.ads.len(), "analysis complete");

    let payload = if cli.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    match &cli.output {
        Some(path) => fs::write(path, payload)?,
        None => println!("{payload}"),
    }

    Ok(())
}
