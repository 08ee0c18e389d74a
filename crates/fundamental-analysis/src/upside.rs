//! Upside / Required-Growth Solver
//!
//! Inverse problem of the growth models: given a target market cap and a
//! horizon, what compound growth does the company need, and is that in line
//! with what it has done before?

use analysis_core::{AnalysisError, MetricRecord};
use serde::{Deserialize, Serialize};

use crate::growth::GrowthMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feasibility {
    /// Within the historical CAGR times the tolerance
    Feasible,
    Ambitious,
    /// No historical CAGR to compare against
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearProjection {
    pub year: u32,
    pub market_cap: f64,
    /// Assumes a constant share count; `None` without a current price
    pub price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredGrowth {
    pub current_market_cap: f64,
    pub target_market_cap: f64,
    pub years: u32,
    pub required_cagr: f64,
    pub historical_revenue_cagr: Option<f64>,
    pub historical_earnings_cagr: Option<f64>,
    pub feasibility: Feasibility,
    pub projection: Vec<YearProjection>,
}

/// One row of an upside ranking against a common target market cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsideCandidate {
    pub ticker: String,
    pub company_name: Option<String>,
    pub sector: Option<String>,
    pub current_market_cap: f64,
    pub current_price: Option<f64>,
    pub upside_multiple: f64,
    pub upside: f64,
    pub target_price: Option<f64>,
}

fn positive_amount(value: f64, name: &str) -> Result<f64, AnalysisError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(AnalysisError::InvalidArgument(format!("{} must be a positive number, got {}", name, value)))
    }
}

/// Feasibility of `required` against the better of the two historical CAGRs.
/// The tolerance only ever loosens the bar.
pub fn assess_feasibility(required: f64, growth: &GrowthMetrics, tolerance: f64) -> Feasibility {
    match growth.best_historical_cagr() {
        None => Feasibility::Unknown,
        Some(best) => {
            let ceiling = if best > 0.0 { best * tolerance } else { best };
            if required <= ceiling {
                Feasibility::Feasible
            } else {
                Feasibility::Ambitious
            }
        }
    }
}

/// Solves `target = current * (1 + r)^years` for `r` and projects each year.
///
/// Non-positive market caps and a zero horizon are caller errors.
pub fn solve_required_growth(
    current_market_cap: f64,
    target_market_cap: f64,
    years: u32,
    record: &MetricRecord,
    growth: &GrowthMetrics,
    tolerance: f64,
) -> Result<RequiredGrowth, AnalysisError> {
    let current = positive_amount(current_market_cap, "current market cap")?;
    let target = positive_amount(target_market_cap, "target market cap")?;
    if years == 0 {
        return Err(AnalysisError::InvalidArgument("years must be at least 1".to_string()));
    }

    let required_cagr = (target / current).powf(1.0 / years as f64) - 1.0;
    let price = record.current_price.filter(|p| *p > 0.0);

    let projection = (1..=years)
        .map(|year| {
            let factor = (1.0 + required_cagr).powi(year as i32);
            YearProjection {
                year,
                market_cap: current * factor,
                price: price.map(|p| p * factor),
            }
        })
        .collect();

    Ok(RequiredGrowth {
        current_market_cap: current,
        target_market_cap: target,
        years,
        required_cagr,
        historical_revenue_cagr: growth.revenue_cagr,
        historical_earnings_cagr: growth.earnings_cagr,
        feasibility: assess_feasibility(required_cagr, growth, tolerance),
        projection,
    })
}

/// Ranks records by how far their market cap is from `target_market_cap`,
/// largest multiple first. Records without a positive market cap are skipped.
pub fn rank_upside(records: &[MetricRecord], target_market_cap: f64) -> Result<Vec<UpsideCandidate>, AnalysisError> {
    let target = positive_amount(target_market_cap, "target market cap")?;

    let mut candidates: Vec<UpsideCandidate> = records
        .iter()
        .filter_map(|r| {
            let market_cap = r.market_cap.filter(|mc| *mc > 0.0)?;
            let multiple = target / market_cap;
            Some(UpsideCandidate {
                ticker: r.ticker.clone(),
                company_name: r.company_name.clone(),
                sector: r.sector.clone(),
                current_market_cap: market_cap,
                current_price: r.current_price,
                upside_multiple: multiple,
                upside: multiple - 1.0,
                target_price: r.current_price.map(|p| p * multiple),
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.upside_multiple
            .partial_cmp(&a.upside_multiple)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    Ok(candidates)
}
