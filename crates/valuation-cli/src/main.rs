//! valuation-cli: score and value securities from a JSON dump of raw metrics.
//!
//! The input file is a JSON array of `{ "ticker", "metrics", "history", "fetched_at"? }`
//! entries, where `metrics` is the provider's key/value mapping and `history`
//! a list of `{ period_end_date, period_type, revenue, net_income }` rows.
//!
//! Usage:
//!   cargo run -p valuation-cli -- --input stocks.json
//!   cargo run -p valuation-cli -- --input stocks.json --db history.db --screen value
//!   cargo run -p valuation-cli -- --input stocks.json --target-market-cap 1000
//!   cargo run -p valuation-cli -- --input stocks.json --target-market-cap 1000 --ticker NVDA --years 5
//!   cargo run -p valuation-cli -- --db history.db --stored NVDA

use analysis_core::{HistoricalSeries, MetricRecord};
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use financial_history::HistoryStore;
use fundamental_analysis::{
    normalize_history, normalize_metrics, screen, FundamentalAnalysisEngine, RawMetrics, RawPeriod, Screen,
    ValuationConfig, ValuationReport,
};
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

const DEFAULT_YEARS: u32 = 5;

#[derive(Debug, Deserialize)]
struct InputEntry {
    ticker: String,
    #[serde(default)]
    metrics: RawMetrics,
    #[serde(default)]
    history: Vec<RawPeriod>,
    /// Defaults to the time of the run
    fetched_at: Option<DateTime<Utc>>,
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn parse_screen(name: &str) -> anyhow::Result<Screen> {
    Ok(match name {
        "high-risk" => Screen::high_risk(),
        "value" => Screen::value(),
        "enhanced-value" => Screen::enhanced_value(),
        "near-value" => Screen::NearValue,
        "quality-growth" => Screen::quality_growth(),
        "growth-inflection" => Screen::growth_inflection(),
        other => bail!("unknown screen '{}'", other),
    })
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  valuation-cli --input FILE                    Analyze every security in FILE");
    eprintln!("  valuation-cli --db PATH --stored TICKER       Re-analyze the latest archived snapshot");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db PATH                  Archive snapshots and merge history in a SQLite DB");
    eprintln!("  --screen NAME              high-risk | value | enhanced-value | near-value | quality-growth | growth-inflection");
    eprintln!("  --target-market-cap B      Rank upside to a market cap, in billions");
    eprintln!("  --ticker T --years N       With --target-market-cap: required growth for one ticker (default {} years)", DEFAULT_YEARS);
    std::process::exit(1);
}

/// Normalizes every entry, skipping (and logging) the ones that fail.
fn load_input(path: &Path) -> anyhow::Result<Vec<(MetricRecord, HistoricalSeries)>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let entries: Vec<InputEntry> =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    let now = Utc::now();

    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        let fetched_at = entry.fetched_at.unwrap_or(now);
        let normalized = normalize_metrics(&entry.ticker, &entry.metrics, fetched_at)
            .and_then(|record| normalize_history(&record.ticker, &entry.history).map(|series| (record, series)));
        match normalized {
            Ok(item) => items.push(item),
            Err(e) => warn!("Skipping '{}': {}", entry.ticker, e),
        }
    }
    Ok(items)
}

/// Archives each snapshot, stores its periods and swaps in the full stored history.
async fn merge_with_store(
    store: &HistoryStore,
    items: Vec<(MetricRecord, HistoricalSeries)>,
) -> anyhow::Result<Vec<(MetricRecord, HistoricalSeries)>> {
    let mut merged = Vec::with_capacity(items.len());
    for (record, series) in items {
        if !store.archive_snapshot(&record).await? {
            info!("{}: snapshot at {} already archived", record.ticker, record.fetched_at);
        }
        store.append_series(&series).await?;
        let full = store.load_series(&record.ticker).await?;
        merged.push((record, full));
    }
    Ok(merged)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "valuation_cli=info,fundamental_analysis=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let input = arg_value(&args, "--input");
    let db_path = arg_value(&args, "--db");
    let stored = arg_value(&args, "--stored");

    let config = ValuationConfig::from_env()?;
    let engine = FundamentalAnalysisEngine::with_config(config);

    let store = match db_path {
        Some(path) => Some(HistoryStore::connect(&format!("sqlite:{}", path)).await?),
        None => None,
    };

    if let Some(ticker) = stored {
        let Some(store) = store.as_ref() else {
            bail!("--stored requires --db");
        };
        match engine.analyze_stored(store, &ticker.to_uppercase()).await? {
            Some(report) => print_json(&report)?,
            None => bail!("no archived snapshot for {}", ticker),
        }
        return Ok(());
    }

    let Some(input) = input else {
        usage();
    };

    let mut items = load_input(Path::new(input))?;
    info!("Loaded {} securities from {}", items.len(), input);
    if let Some(store) = store.as_ref() {
        items = merge_with_store(store, items).await?;
    }

    if let Some(target_b) = arg_value(&args, "--target-market-cap") {
        let target: f64 = target_b
            .parse()
            .with_context(|| format!("invalid --target-market-cap '{}'", target_b))?;
        let target_market_cap = target * 1e9;

        if let Some(ticker) = arg_value(&args, "--ticker") {
            let ticker = ticker.to_uppercase();
            let years = match arg_value(&args, "--years") {
                Some(v) => v.parse().with_context(|| format!("invalid --years '{}'", v))?,
                None => DEFAULT_YEARS,
            };
            let Some((record, series)) = items.iter().find(|(r, _)| r.ticker == ticker) else {
                bail!("{} not found in input", ticker);
            };
            let Some(current) = record.market_cap else {
                bail!("{} has no market cap", ticker);
            };
            let growth = engine.compute_growth_metrics(series);
            let solved = engine.solve_required_growth(current, target_market_cap, years, record, &growth)?;
            print_json(&solved)?;
        } else {
            let records: Vec<MetricRecord> = items.into_iter().map(|(r, _)| r).collect();
            print_json(&engine.rank_upside(&records, target_market_cap)?)?;
        }
        return Ok(());
    }

    let reports: Vec<ValuationReport> = engine.analyze_batch(&items);
    match arg_value(&args, "--screen") {
        Some(name) => {
            let filter = parse_screen(name)?;
            let passed = screen(&reports, &filter);
            info!("{} of {} passed {}", passed.len(), reports.len(), name);
            print_json(&passed)?;
        }
        None => print_json(&reports)?,
    }

    Ok(())
}
