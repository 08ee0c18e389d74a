//! Growth & Consistency Analyzer
//!
//! CAGR over annual history, quarter-over-quarter growth statistics and a
//! 0-100 consistency score over recent quarters.

use analysis_core::stats::{mean, population_std_dev};
use analysis_core::{FinancialPeriod, HistoricalSeries, MetricRecord, PeriodType};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::ValuationConfig;

/// Recent quarters averaged for the quarterly growth figure
const AVG_GROWTH_QUARTERS: usize = 8;
/// Recent quarters compared against the full history for acceleration
const ACCELERATION_RECENT_QUARTERS: usize = 4;
const ACCELERATION_MIN_QUARTERS: usize = 6;
/// Windows shorter than this (in years) are too short to annualize
const MIN_CAGR_YEARS: f64 = 0.5;
/// Leap days and drifting fiscal year-ends must not push the base period
/// out of the window
const CAGR_CUTOFF_SLACK_DAYS: i64 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthMetric {
    Revenue,
    Earnings,
}

impl GrowthMetric {
    fn value(&self, period: &FinancialPeriod) -> Option<f64> {
        match self {
            GrowthMetric::Revenue => period.revenue,
            GrowthMetric::Earnings => period.net_income,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrowthMetrics {
    /// CAGR over the configured window (3 years by default)
    pub revenue_cagr: Option<f64>,
    pub earnings_cagr: Option<f64>,
    pub revenue_cagr_5y: Option<f64>,
    pub earnings_cagr_5y: Option<f64>,
    pub avg_quarterly_revenue_growth: Option<f64>,
    pub avg_quarterly_earnings_growth: Option<f64>,
    /// 0-100
    pub revenue_consistency: Option<f64>,
    /// 0-100
    pub earnings_consistency: Option<f64>,
    pub revenue_accelerating: bool,
    pub earnings_accelerating: bool,
    pub consecutive_profitable_quarters: u32,
    pub data_points: usize,
    pub oldest_period: Option<NaiveDate>,
    pub newest_period: Option<NaiveDate>,
}

impl GrowthMetrics {
    /// Larger of the available revenue and earnings CAGR.
    pub fn best_historical_cagr(&self) -> Option<f64> {
        match (self.revenue_cagr, self.earnings_cagr) {
            (Some(r), Some(e)) => Some(r.max(e)),
            (r, e) => r.or(e),
        }
    }
}

/// `(end / start)^(1/years) - 1`. Both endpoints must be strictly positive:
/// growth across a sign change has no compound rate.
pub fn cagr(start: f64, end: f64, years: f64) -> Option<f64> {
    if !(start > 0.0 && end > 0.0 && years > 0.0) {
        return None;
    }
    let rate = (end / start).powf(1.0 / years) - 1.0;
    rate.is_finite().then_some(rate)
}

/// CAGR over the annual periods ending within `years` of the most recent one,
/// give or take a month. With less history the window shrinks, down to two
/// data points.
pub fn windowed_cagr(series: &HistoricalSeries, metric: GrowthMetric, years: u32) -> Option<f64> {
    let points: Vec<(NaiveDate, f64)> = series
        .of_type(PeriodType::Annual)
        .into_iter()
        .filter_map(|p| metric.value(p).map(|v| (p.period_end, v)))
        .collect();

    let (newest_date, _) = *points.last()?;
    let window_days = (f64::from(years) * 365.25).round() as i64 + CAGR_CUTOFF_SLACK_DAYS;
    let cutoff = newest_date - Duration::days(window_days);
    let window: Vec<&(NaiveDate, f64)> = points.iter().filter(|(d, _)| *d >= cutoff).collect();
    if window.len() < 2 {
        return None;
    }

    let (start_date, start) = *window[0];
    let (end_date, end) = *window[window.len() - 1];
    let elapsed_years = (end_date - start_date).num_days() as f64 / 365.25;
    if elapsed_years < MIN_CAGR_YEARS {
        return None;
    }
    cagr(start, end, elapsed_years)
}

/// Quarter-over-quarter growth rates across the last `window` transitions.
/// Pairs with a missing or zero base are skipped. The base is taken in
/// absolute value so that a shrinking loss reads as positive growth.
pub fn quarterly_growth_rates(series: &HistoricalSeries, metric: GrowthMetric, window: usize) -> Vec<f64> {
    let quarters = series.of_type(PeriodType::Quarterly);
    let start = quarters.len().saturating_sub(window + 1);
    quarters[start..]
        .windows(2)
        .filter_map(|pair| {
            let prev = metric.value(pair[0])?;
            let curr = metric.value(pair[1])?;
            if prev == 0.0 {
                return None;
            }
            Some((curr - prev) / prev.abs())
        })
        .collect()
}

/// Mean quarter-over-quarter growth over the last `periods` transitions.
pub fn average_quarterly_growth(series: &HistoricalSeries, metric: GrowthMetric, periods: usize) -> Option<f64> {
    let rates = quarterly_growth_rates(series, metric, periods);
    if rates.is_empty() {
        None
    } else {
        Some(mean(&rates))
    }
}

/// Consistency score in [0, 100]:
/// - up to 40 for the share of quarters with positive growth
/// - up to 30 for low volatility, `30 / (1 + scale * std_dev)`
/// - 30 when mean growth is positive
///
/// Needs at least two growth observations.
pub fn consistency_score(
    series: &HistoricalSeries,
    metric: GrowthMetric,
    window_quarters: usize,
    volatility_scale: f64,
) -> Option<f64> {
    let rates = quarterly_growth_rates(series, metric, window_quarters);
    if rates.len() < 2 {
        return None;
    }

    let positive = rates.iter().filter(|r| **r > 0.0).count() as f64;
    let frequency_score = 40.0 * positive / rates.len() as f64;

    let volatility_score = 30.0 / (1.0 + volatility_scale * population_std_dev(&rates));

    let average_score = if mean(&rates) > 0.0 { 30.0 } else { 0.0 };

    Some((frequency_score + volatility_score + average_score).clamp(0.0, 100.0))
}

/// Recent growth beats the full-history average by more than 10% of its magnitude.
pub fn is_accelerating(series: &HistoricalSeries, metric: GrowthMetric) -> bool {
    let quarters = series.of_type(PeriodType::Quarterly).len();
    if quarters < ACCELERATION_MIN_QUARTERS {
        return false;
    }
    let recent = average_quarterly_growth(series, metric, ACCELERATION_RECENT_QUARTERS);
    let historical = average_quarterly_growth(series, metric, quarters - 1);
    match (recent, historical) {
        (Some(recent), Some(historical)) => recent > historical + historical.abs() * 0.1,
        _ => false,
    }
}

/// Count back from the latest quarter while net income is positive.
pub fn consecutive_profitable_quarters(series: &HistoricalSeries) -> u32 {
    series
        .of_type(PeriodType::Quarterly)
        .iter()
        .rev()
        .take_while(|p| p.net_income.map_or(false, |ni| ni > 0.0))
        .count() as u32
}

/// Where a growth rate used for valuation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthSource {
    HistoricalCagr,
    /// Average quarter-over-quarter growth, annualized
    QuarterlyAverage,
    /// Provider's single-point year-over-year figure
    Reported,
}

impl GrowthSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrowthSource::HistoricalCagr => "historical_cagr",
            GrowthSource::QuarterlyAverage => "quarterly_average",
            GrowthSource::Reported => "reported",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedGrowth {
    pub rate: f64,
    pub source: GrowthSource,
}

/// Growth rate for a growth-driven model. Stored history wins over the
/// provider's single point: the CAGR over `cagr_window_years` first, then
/// the recent quarterly average compounded over four quarters, then the
/// reported figure.
pub fn resolve_growth(
    record: &MetricRecord,
    history: &HistoricalSeries,
    metric: GrowthMetric,
    cagr_window_years: u32,
) -> Option<ResolvedGrowth> {
    if let Some(rate) = windowed_cagr(history, metric, cagr_window_years) {
        return Some(ResolvedGrowth {
            rate,
            source: GrowthSource::HistoricalCagr,
        });
    }

    let annualized = average_quarterly_growth(history, metric, AVG_GROWTH_QUARTERS)
        .filter(|q| *q > -1.0)
        .map(|q| (1.0 + q).powi(4) - 1.0)
        .filter(|g| g.is_finite());
    if let Some(rate) = annualized {
        return Some(ResolvedGrowth {
            rate,
            source: GrowthSource::QuarterlyAverage,
        });
    }

    let reported = match metric {
        GrowthMetric::Revenue => record.revenue_growth,
        GrowthMetric::Earnings => record.earnings_growth,
    };
    reported.map(|rate| ResolvedGrowth {
        rate,
        source: GrowthSource::Reported,
    })
}

/// Mean PEG over every positive earnings growth figure: the historical CAGR,
/// the annualized quarterly average and the reported rate. Needs a positive P/E.
pub fn peg_average(record: &MetricRecord, growth: &GrowthMetrics) -> Option<f64> {
    let pe = record.pe_ratio.filter(|pe| *pe > 0.0)?;
    let quarterly = growth
        .avg_quarterly_earnings_growth
        .filter(|q| *q > -1.0)
        .map(|q| (1.0 + q).powi(4) - 1.0);
    let pegs: Vec<f64> = [growth.earnings_cagr, quarterly, record.earnings_growth]
        .into_iter()
        .flatten()
        .filter(|g| *g > 0.0)
        .map(|g| pe / (g * 100.0))
        .collect();
    if pegs.is_empty() {
        None
    } else {
        Some(mean(&pegs))
    }
}

pub fn compute_growth_metrics(series: &HistoricalSeries, config: &ValuationConfig) -> GrowthMetrics {
    let window = config.consistency_window_quarters;
    let scale = config.consistency_volatility_scale;
    let periods = series.periods();

    GrowthMetrics {
        revenue_cagr: windowed_cagr(series, GrowthMetric::Revenue, config.cagr_window_years),
        earnings_cagr: windowed_cagr(series, GrowthMetric::Earnings, config.cagr_window_years),
        revenue_cagr_5y: windowed_cagr(series, GrowthMetric::Revenue, 5),
        earnings_cagr_5y: windowed_cagr(series, GrowthMetric::Earnings, 5),
        avg_quarterly_revenue_growth: average_quarterly_growth(series, GrowthMetric::Revenue, AVG_GROWTH_QUARTERS),
        avg_quarterly_earnings_growth: average_quarterly_growth(series, GrowthMetric::Earnings, AVG_GROWTH_QUARTERS),
        revenue_consistency: consistency_score(series, GrowthMetric::Revenue, window, scale),
        earnings_consistency: consistency_score(series, GrowthMetric::Earnings, window, scale),
        revenue_accelerating: is_accelerating(series, GrowthMetric::Revenue),
        earnings_accelerating: is_accelerating(series, GrowthMetric::Earnings),
        consecutive_profitable_quarters: consecutive_profitable_quarters(series),
        data_points: series.len(),
        oldest_period: periods.iter().map(|p| p.period_end).min(),
        newest_period: periods.iter().map(|p| p.period_end).max(),
    }
}
