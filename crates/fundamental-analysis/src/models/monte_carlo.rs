use analysis_core::stats::{mean, percentile_sorted};
use analysis_core::{
    HistoricalSeries, InvalidReason, MetricRecord, PriceBand, ValuationModel, ValuationModelKind, ValuationModelResult,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand::distributions::Distribution;
use rayon::prelude::*;
use serde_json::json;
use statrs::distribution::Normal;

use super::settle;
use crate::config::ValuationConfig;
use crate::growth::{resolve_growth, GrowthMetric, ResolvedGrowth};

/// Simulated prices never go below a cent.
const PRICE_FLOOR: f64 = 0.01;

/// Geometric price simulation with daily normal returns over the horizon.
///
/// Every path draws from its own generator seeded with `seed + path index`,
/// so results are reproducible and independent of how rayon splits the work.
/// The median (p50) is the representative target.
#[derive(Debug, Clone)]
pub struct MonteCarloBand {
    pub years: u32,
    pub volatility: f64,
    pub simulations: u32,
    pub seed: u64,
    pub trading_days: u32,
    pub default_return: f64,
    pub cagr_window_years: u32,
}

impl MonteCarloBand {
    pub fn from_config(config: &ValuationConfig) -> Self {
        Self {
            years: config.horizon_years,
            volatility: config.mc_volatility,
            simulations: config.mc_simulations,
            seed: config.mc_seed,
            trading_days: config.mc_trading_days,
            default_return: config.mc_default_return,
            cagr_window_years: config.cagr_window_years,
        }
    }

    /// Annual drift implied by the company's growth, tempered and capped,
    /// with the growth it was derived from.
    pub fn expected_return(&self, record: &MetricRecord, history: &HistoricalSeries) -> (f64, Option<ResolvedGrowth>) {
        let positive = |metric| {
            resolve_growth(record, history, metric, self.cagr_window_years).filter(|g: &ResolvedGrowth| g.rate > 0.0)
        };
        if let Some(g) = positive(GrowthMetric::Earnings) {
            return (g.rate.min(0.25), Some(g));
        }
        if let Some(g) = positive(GrowthMetric::Revenue) {
            return ((g.rate * 0.7).min(0.20), Some(g));
        }
        (self.default_return, None)
    }

    /// Final price of every simulated path, sorted ascending.
    fn simulate(&self, start_price: f64, annual_return: f64) -> Result<Vec<f64>, InvalidReason> {
        let days = self.trading_days as f64;
        let daily_return = annual_return / days;
        let daily_vol = self.volatility / days.sqrt();
        let steps = self.years * self.trading_days;

        let noise = if daily_vol > 0.0 {
            Some(Normal::new(daily_return, daily_vol).map_err(|_| InvalidReason::unavailable("volatility"))?)
        } else {
            None
        };

        let mut finals: Vec<f64> = (0..self.simulations)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(i as u64));
                let mut price = start_price;
                for _ in 0..steps {
                    let step = match &noise {
                        Some(normal) => normal.sample(&mut rng),
                        None => daily_return,
                    };
                    price = (price * (1.0 + step)).max(PRICE_FLOOR);
                }
                price
            })
            .collect();

        finals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        Ok(finals)
    }

    fn estimate(&self, record: &MetricRecord, history: &HistoricalSeries) -> Result<ValuationModelResult, InvalidReason> {
        let price = match record.current_price {
            Some(p) if p > 0.0 => p,
            _ => return Err(InvalidReason::unavailable("current_price")),
        };
        let (expected_return, growth) = self.expected_return(record, history);
        let finals = self.simulate(price, expected_return)?;

        let band = PriceBand {
            p10: percentile_sorted(&finals, 10.0),
            p25: percentile_sorted(&finals, 25.0),
            p50: percentile_sorted(&finals, 50.0),
            p75: percentile_sorted(&finals, 75.0),
            p90: percentile_sorted(&finals, 90.0),
        };
        let n = finals.len() as f64;
        let share_at_least = |level: f64| finals.iter().filter(|p| **p >= level).count() as f64 / n;

        let result = ValuationModelResult::valid(
            self.kind(),
            band.p50,
            Some(price),
            json!({
                "simulations": self.simulations,
                "years": self.years,
                "expected_return": expected_return,
                "growth_source": growth.map(|g| g.source.as_str()),
                "volatility": self.volatility,
                "mean_price": mean(&finals),
                "probability_profit": share_at_least(price),
                "probability_up_50": share_at_least(price * 1.5),
                "probability_double": share_at_least(price * 2.0),
                "probability_down_50": finals.iter().filter(|p| **p < price * 0.5).count() as f64 / n,
            }),
        );
        Ok(result.with_band(band))
    }
}

impl ValuationModel for MonteCarloBand {
    fn kind(&self) -> ValuationModelKind {
        ValuationModelKind::MonteCarlo
    }

    fn evaluate(&self, record: &MetricRecord, history: &HistoricalSeries) -> ValuationModelResult {
        settle(self.kind(), self.estimate(record, history))
    }
}
