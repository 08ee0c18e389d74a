use analysis_core::{HistoricalSeries, InvalidReason, MetricRecord, ValuationModel, ValuationModelKind, ValuationModelResult};
use serde_json::json;

use super::{annualized_return, project_decaying_growth, required, settle};
use crate::config::ValuationConfig;
use crate::growth::{resolve_growth, GrowthMetric};

/// Projects EPS forward with decaying growth and prices the final year at a
/// terminal P/E. The target is a horizon price, not a present value.
#[derive(Debug, Clone)]
pub struct EarningsGrowthProjection {
    pub years: u32,
    pub decay: f64,
    pub growth_floor: f64,
    pub default_terminal_pe: f64,
    pub max_terminal_pe: f64,
    pub cagr_window_years: u32,
}

impl EarningsGrowthProjection {
    pub fn from_config(config: &ValuationConfig) -> Self {
        Self {
            years: config.horizon_years,
            decay: config.earnings_growth_decay,
            growth_floor: config.growth_floor,
            default_terminal_pe: config.default_terminal_pe,
            max_terminal_pe: config.max_terminal_pe,
            cagr_window_years: config.cagr_window_years,
        }
    }

    fn terminal_pe(&self, record: &MetricRecord) -> f64 {
        record
            .pe_ratio
            .filter(|pe| *pe > 0.0)
            .unwrap_or(self.default_terminal_pe)
            .min(self.max_terminal_pe)
    }

    fn estimate(&self, record: &MetricRecord, history: &HistoricalSeries) -> Result<ValuationModelResult, InvalidReason> {
        let eps = required(record.eps, "eps")?;
        if eps <= 0.0 {
            return Err(InvalidReason::NonPositiveEarnings);
        }
        let resolved = resolve_growth(record, history, GrowthMetric::Earnings, self.cagr_window_years)
            .ok_or_else(|| InvalidReason::unavailable("earnings_growth"))?;
        let growth = resolved.rate;

        let terminal_pe = self.terminal_pe(record);
        let path = project_decaying_growth(eps, growth, self.decay, self.growth_floor, self.years);
        let final_eps = path.last().copied().unwrap_or(eps);
        let target = final_eps * terminal_pe;

        Ok(ValuationModelResult::valid(
            self.kind(),
            target,
            record.current_price,
            json!({
                "starting_eps": eps,
                "final_eps": final_eps,
                "eps_path": path,
                "initial_growth": growth,
                "growth_source": resolved.source.as_str(),
                "growth_decay": self.decay,
                "terminal_pe": terminal_pe,
                "years": self.years,
                "annualized_return": annualized_return(target, record.current_price, self.years),
            }),
        ))
    }
}

impl ValuationModel for EarningsGrowthProjection {
    fn kind(&self) -> ValuationModelKind {
        ValuationModelKind::EarningsGrowth
    }

    fn evaluate(&self, record: &MetricRecord, history: &HistoricalSeries) -> ValuationModelResult {
        settle(self.kind(), self.estimate(record, history))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::*;
    use analysis_core::{FinancialPeriod, ModelOutcome, PeriodType};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn model() -> EarningsGrowthProjection {
        EarningsGrowthProjection::from_config(&ValuationConfig::default())
    }

    #[test]
    fn test_projection() {
        let mut r = sample_record();
        r.earnings_growth = Some(0.10);
        r.pe_ratio = Some(30.0);
        let result = model().evaluate(&r, &empty_history());

        let mut eps = 5.0;
        let mut g: f64 = 0.10;
        for _ in 0..5 {
            eps *= 1.0 + g;
            g = (g * 0.9).max(0.03);
        }
        // terminal P/E capped at 25
        assert_relative_eq!(result.target_price().unwrap(), eps * 25.0, epsilon = 1e-9);
    }

    #[test]
    fn test_default_terminal_pe_without_positive_pe() {
        let mut r = sample_record();
        r.pe_ratio = None;
        assert_relative_eq!(model().terminal_pe(&r), 20.0);
        r.pe_ratio = Some(-4.0);
        assert_relative_eq!(model().terminal_pe(&r), 20.0);
    }

    #[test]
    fn test_requires_positive_eps_and_growth() {
        let mut r = sample_record();
        r.eps = Some(0.0);
        assert_eq!(
            model().evaluate(&r, &empty_history()).invalid_reason(),
            Some(&InvalidReason::NonPositiveEarnings)
        );

        let mut r = sample_record();
        r.earnings_growth = None;
        assert_eq!(
            model().evaluate(&r, &empty_history()).invalid_reason(),
            Some(&InvalidReason::unavailable("earnings_growth"))
        );
    }

    #[test]
    fn test_growth_from_history_without_reported_figure() {
        let mut history = HistoricalSeries::new("SAMPLE");
        for (year, ni) in [(2020, 100.0), (2023, 133.1)] {
            history.insert(FinancialPeriod {
                period_end: NaiveDate::from_ymd_opt(year, 12, 31).unwrap(),
                period_type: PeriodType::Annual,
                revenue: None,
                net_income: Some(ni),
            });
        }
        let mut r = sample_record();
        r.earnings_growth = None;

        let result = model().evaluate(&r, &history);
        match result.outcome {
            ModelOutcome::Valid { details, .. } => {
                assert_eq!(details["growth_source"], "historical_cagr");
                let g = details["initial_growth"].as_f64().unwrap();
                assert!((g - 0.1).abs() < 0.001);
            }
            other => panic!("expected valid, got {:?}", other),
        }
    }
}
