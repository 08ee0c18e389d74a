//! Valuation Model Suite
//!
//! Eight independent fair-value estimators behind the [`ValuationModel`]
//! trait. Each model checks its own input domain and reports an
//! [`InvalidReason`] instead of producing a number it cannot justify.

mod dcf;
mod earnings_growth;
mod gordon;
mod graham;
mod monte_carlo;
mod peg;
mod ps_sector;
mod revenue_growth;

pub use dcf::DiscountedCashFlow;
pub use earnings_growth::EarningsGrowthProjection;
pub use gordon::{sustainable_dividend_growth, GordonGrowth};
pub use graham::GrahamNumber;
pub use monte_carlo::MonteCarloBand;
pub use peg::PegValuation;
pub use ps_sector::PriceToSalesSector;
pub use revenue_growth::RevenueGrowthProjection;

use analysis_core::{
    HistoricalSeries, InvalidReason, MetricRecord, ValuationModel, ValuationModelKind, ValuationModelResult,
};
use tracing::debug;

use crate::config::ValuationConfig;

/// The full set of models, evaluated in [`ValuationModelKind::ALL`] order.
pub struct ValuationSuite {
    models: Vec<Box<dyn ValuationModel>>,
}

impl ValuationSuite {
    pub fn new(config: &ValuationConfig) -> Self {
        Self {
            models: vec![
                Box::new(GrahamNumber::new()),
                Box::new(GordonGrowth::from_config(config)),
                Box::new(PegValuation::from_config(config)),
                Box::new(PriceToSalesSector::from_config(config)),
                Box::new(EarningsGrowthProjection::from_config(config)),
                Box::new(RevenueGrowthProjection::from_config(config)),
                Box::new(DiscountedCashFlow::from_config(config)),
                Box::new(MonteCarloBand::from_config(config)),
            ],
        }
    }

    pub fn models(&self) -> &[Box<dyn ValuationModel>] {
        &self.models
    }

    /// One result per model, in suite order. A model never aborts the run.
    pub fn evaluate_all(&self, record: &MetricRecord, history: &HistoricalSeries) -> Vec<ValuationModelResult> {
        self.models
            .iter()
            .map(|model| {
                let result = model.evaluate(record, history);
                if let Some(reason) = result.invalid_reason() {
                    debug!("{} {} invalid: {}", record.ticker, model.kind(), reason);
                }
                result
            })
            .collect()
    }
}

pub fn run_all_valuation_models(
    record: &MetricRecord,
    history: &HistoricalSeries,
    config: &ValuationConfig,
) -> Vec<ValuationModelResult> {
    ValuationSuite::new(config).evaluate_all(record, history)
}

/// Value of a required input, or the reason it is missing.
pub(crate) fn required(value: Option<f64>, field: &str) -> Result<f64, InvalidReason> {
    value.ok_or_else(|| InvalidReason::unavailable(field))
}

/// Collapses a model's fallible estimate into its result.
pub(crate) fn settle(
    kind: ValuationModelKind,
    estimate: Result<ValuationModelResult, InvalidReason>,
) -> ValuationModelResult {
    estimate.unwrap_or_else(|reason| ValuationModelResult::invalid(kind, reason))
}

/// Compounds `start` for `years` periods. Growth decays by `decay` of itself
/// after each period and never drops below `floor`. Returns every value
/// including `start`.
pub(crate) fn project_decaying_growth(start: f64, growth: f64, decay: f64, floor: f64, years: u32) -> Vec<f64> {
    let mut path = Vec::with_capacity(years as usize + 1);
    path.push(start);
    let mut rate = growth;
    let mut value = start;
    for _ in 0..years {
        value *= 1.0 + rate;
        path.push(value);
        rate = (rate * (1.0 - decay)).max(floor);
    }
    path
}

/// Annualized return from `price` to `target` over `years`.
pub(crate) fn annualized_return(target: f64, price: Option<f64>, years: u32) -> Option<f64> {
    match price {
        Some(p) if p > 0.0 && target > 0.0 && years > 0 => Some((target / p).powf(1.0 / years as f64) - 1.0),
        _ => None,
    }
}
