//! Bull / base / bear scenarios
//!
//! Three horizon prices from shifted growth and exit multiples. Profitable
//! companies are projected on EPS and a P/E, the rest on revenue and a P/S.
//! Scenarios are reported alongside the consensus and never feed it.

use analysis_core::{upside, HistoricalSeries, MetricRecord};
use serde::{Deserialize, Serialize};

use crate::config::ValuationConfig;
use crate::growth::{resolve_growth, GrowthMetric, GrowthSource};

const DEFAULT_EARNINGS_GROWTH: f64 = 0.12;
const MIN_EARNINGS_GROWTH: f64 = 0.05;
const MAX_EARNINGS_GROWTH: f64 = 0.30;
/// Exit P/E when the record has no positive P/E
const FALLBACK_PE: f64 = 20.0;
const FALLBACK_BASE_PE: f64 = 18.0;

const DEFAULT_REVENUE_GROWTH: f64 = 0.20;

/// (case, growth multiplier, P/E multiplier)
const EARNINGS_CASES: [(ScenarioCase, f64, f64); 3] = [
    (ScenarioCase::Bear, 0.5, 0.7),
    (ScenarioCase::Base, 1.0, 1.0),
    (ScenarioCase::Bull, 1.5, 1.2),
];

/// (case, growth multiplier, exit P/S)
const REVENUE_CASES: [(ScenarioCase, f64, f64); 3] = [
    (ScenarioCase::Bear, 0.5, 2.0),
    (ScenarioCase::Base, 1.0, 5.0),
    (ScenarioCase::Bull, 1.3, 8.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioCase {
    Bear,
    Base,
    Bull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioBasis {
    /// EPS compounded and priced at a P/E
    Earnings,
    /// Revenue compounded and priced at a P/S
    Revenue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub case: ScenarioCase,
    pub growth_rate: f64,
    /// P/E or P/S depending on the basis
    pub exit_multiple: f64,
    /// Final EPS or final total revenue
    pub final_value: f64,
    pub target_price: f64,
    pub upside: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioAnalysis {
    pub basis: ScenarioBasis,
    pub years: u32,
    /// `None` when no growth was available and the default was assumed
    pub growth_source: Option<GrowthSource>,
    /// Bear, base, bull
    pub scenarios: Vec<Scenario>,
}

impl ScenarioAnalysis {
    pub fn get(&self, case: ScenarioCase) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.case == case)
    }
}

/// Scenarios over `config.horizon_years`. `None` when the record has neither
/// positive EPS nor positive revenue with a share count.
pub fn scenario_analysis(
    record: &MetricRecord,
    history: &HistoricalSeries,
    config: &ValuationConfig,
) -> Option<ScenarioAnalysis> {
    let years = config.horizon_years;
    let compound = |value: f64, growth: f64| value * (1.0 + growth).powi(years as i32);

    if let Some(eps) = record.eps.filter(|e| *e > 0.0) {
        let resolved = resolve_growth(record, history, GrowthMetric::Earnings, config.cagr_window_years);
        let base_growth = resolved
            .map_or(DEFAULT_EARNINGS_GROWTH, |g| g.rate)
            .clamp(MIN_EARNINGS_GROWTH, MAX_EARNINGS_GROWTH);
        let pe = record.pe_ratio.filter(|pe| *pe > 0.0);

        let scenarios = EARNINGS_CASES
            .iter()
            .map(|&(case, growth_mult, pe_mult)| {
                let growth_rate = base_growth * growth_mult;
                let exit_multiple = match (case, pe) {
                    (ScenarioCase::Base, Some(pe)) => pe,
                    (ScenarioCase::Base, None) => FALLBACK_BASE_PE,
                    (_, pe) => pe.unwrap_or(FALLBACK_PE) * pe_mult,
                };
                let final_eps = compound(eps, growth_rate);
                let target_price = final_eps * exit_multiple;
                Scenario {
                    case,
                    growth_rate,
                    exit_multiple,
                    final_value: final_eps,
                    target_price,
                    upside: upside(target_price, record.current_price),
                }
            })
            .collect();

        return Some(ScenarioAnalysis {
            basis: ScenarioBasis::Earnings,
            years,
            growth_source: resolved.map(|g| g.source),
            scenarios,
        });
    }

    let revenue = record.revenue.filter(|r| *r > 0.0)?;
    let shares = record.shares_outstanding.filter(|s| *s > 0.0)?;
    let resolved = resolve_growth(record, history, GrowthMetric::Revenue, config.cagr_window_years);
    // shrinking revenue would invert bear and bull
    let base_growth = resolved.map_or(DEFAULT_REVENUE_GROWTH, |g| g.rate).max(0.0);

    let scenarios = REVENUE_CASES
        .iter()
        .map(|&(case, growth_mult, exit_ps)| {
            let growth_rate = base_growth * growth_mult;
            let final_revenue = compound(revenue, growth_rate);
            let target_price = final_revenue * exit_ps / shares;
            Scenario {
                case,
                growth_rate,
                exit_multiple: exit_ps,
                final_value: final_revenue,
                target_price,
                upside: upside(target_price, record.current_price),
            }
        })
        .collect();

    Some(ScenarioAnalysis {
        basis: ScenarioBasis::Revenue,
        years,
        growth_source: resolved.map(|g| g.source),
        scenarios,
    })
}
