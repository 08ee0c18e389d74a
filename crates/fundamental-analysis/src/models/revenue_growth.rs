use analysis_core::{HistoricalSeries, InvalidReason, MetricRecord, ValuationModel, ValuationModelKind, ValuationModelResult};
use serde_json::json;

use super::{annualized_return, project_decaying_growth, required, settle};
use crate::config::ValuationConfig;
use crate::growth::{resolve_growth, GrowthMetric};

/// Revenue projection for companies priced on sales. Final revenue at a
/// terminal P/S gives a target market cap, divided back into a share price.
#[derive(Debug, Clone)]
pub struct RevenueGrowthProjection {
    pub years: u32,
    pub decay: f64,
    pub growth_floor: f64,
    pub default_terminal_ps: f64,
    pub max_terminal_ps: f64,
    pub target_margin_floor: f64,
    pub cagr_window_years: u32,
}

impl RevenueGrowthProjection {
    pub fn from_config(config: &ValuationConfig) -> Self {
        Self {
            years: config.horizon_years,
            decay: config.revenue_growth_decay,
            growth_floor: config.growth_floor,
            default_terminal_ps: config.default_terminal_ps,
            max_terminal_ps: config.max_terminal_ps,
            target_margin_floor: config.target_margin_floor,
            cagr_window_years: config.cagr_window_years,
        }
    }

    fn estimate(&self, record: &MetricRecord, history: &HistoricalSeries) -> Result<ValuationModelResult, InvalidReason> {
        let revenue = match record.revenue {
            Some(r) if r > 0.0 => r,
            _ => return Err(InvalidReason::NoRevenue),
        };
        let shares = required(record.shares_outstanding.filter(|s| *s > 0.0), "shares_outstanding")?;
        let resolved = resolve_growth(record, history, GrowthMetric::Revenue, self.cagr_window_years)
            .ok_or_else(|| InvalidReason::unavailable("revenue_growth"))?;
        let growth = resolved.rate;

        let terminal_ps = record
            .ps_ratio
            .filter(|ps| *ps > 0.0)
            .unwrap_or(self.default_terminal_ps)
            .min(self.max_terminal_ps);
        let target_margin = record
            .profit_margin
            .unwrap_or(self.target_margin_floor)
            .max(self.target_margin_floor);

        let path = project_decaying_growth(revenue, growth, self.decay, self.growth_floor, self.years);
        let final_revenue = path.last().copied().unwrap_or(revenue);
        let target_market_cap = final_revenue * terminal_ps;
        let target = target_market_cap / shares;
        let implied_eps = final_revenue * target_margin / shares;

        Ok(ValuationModelResult::valid(
            self.kind(),
            target,
            record.current_price,
            json!({
                "starting_revenue": revenue,
                "final_revenue": final_revenue,
                "initial_growth": growth,
                "growth_source": resolved.source.as_str(),
                "growth_decay": self.decay,
                "terminal_ps": terminal_ps,
                "target_market_cap": target_market_cap,
                "target_margin": target_margin,
                "implied_eps": implied_eps,
                "years": self.years,
                "annualized_return": annualized_return(target, record.current_price, self.years),
            }),
        ))
    }
}

impl ValuationModel for RevenueGrowthProjection {
    fn kind(&self) -> ValuationModelKind {
        ValuationModelKind::RevenueGrowth
    }

    fn evaluate(&self, record: &MetricRecord, history: &HistoricalSeries) -> ValuationModelResult {
        settle(self.kind(), self.estimate(record, history))
    }
}
