use analysis_core::{HistoricalSeries, InvalidReason, MetricRecord, ValuationModel, ValuationModelKind, ValuationModelResult};
use serde_json::json;

use super::{required, settle};
use crate::config::ValuationConfig;
use crate::growth::{resolve_growth, GrowthMetric};

/// Fair P/E from a fair PEG ratio: `fair_peg * growth%`, priced on trailing EPS.
#[derive(Debug, Clone)]
pub struct PegValuation {
    pub fair_peg: f64,
    /// Caps earnings growth before pricing; uncapped when `None`
    pub growth_cap: Option<f64>,
    /// Lookback for the historical earnings CAGR
    pub cagr_window_years: u32,
}

impl PegValuation {
    pub fn from_config(config: &ValuationConfig) -> Self {
        Self {
            fair_peg: config.fair_peg,
            growth_cap: config.peg_growth_cap,
            cagr_window_years: config.cagr_window_years,
        }
    }

    fn estimate(&self, record: &MetricRecord, history: &HistoricalSeries) -> Result<ValuationModelResult, InvalidReason> {
        let resolved = resolve_growth(record, history, GrowthMetric::Earnings, self.cagr_window_years)
            .ok_or(InvalidReason::NonPositiveGrowth)?;
        let growth = resolved.rate;
        if growth <= 0.0 {
            return Err(InvalidReason::NonPositiveGrowth);
        }
        let eps = required(record.eps, "eps")?;
        if eps <= 0.0 {
            return Err(InvalidReason::NonPositiveEarnings);
        }

        let growth_used = self.growth_cap.map_or(growth, |cap| growth.min(cap));
        let fair_pe = self.fair_peg * growth_used * 100.0;
        let current_peg = record.pe_ratio.filter(|pe| *pe > 0.0).map(|pe| pe / (growth * 100.0));

        Ok(ValuationModelResult::valid(
            self.kind(),
            fair_pe * eps,
            record.current_price,
            json!({
                "earnings_growth": growth,
                "growth_source": resolved.source.as_str(),
                "growth_used": growth_used,
                "fair_peg": self.fair_peg,
                "fair_pe": fair_pe,
                "current_peg": current_peg,
            }),
        ))
    }
}

impl ValuationModel for PegValuation {
    fn kind(&self) -> ValuationModelKind {
        ValuationModelKind::Peg
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

    fn model() -> PegValuation {
        PegValuation::from_config(&ValuationConfig::default())
    }

    #[test]
    fn test_peg_fair_price() {
        // 1.5 * 15 = 22.5x on EPS 5
        let result = model().evaluate(&sample_record(), &empty_history());
        assert_relative_eq!(result.target_price().unwrap(), 112.5, epsilon = 1e-9);
    }

    #[test]
    fn test_high_growth_uncapped_by_default() {
        let mut r = sample_record();
        r.earnings_growth = Some(0.80);
        let result = model().evaluate(&r, &empty_history());
        // 1.5 * 80 * 5
        assert_relative_eq!(result.target_price().unwrap(), 600.0, epsilon = 1e-9);
    }

    #[test]
    fn test_growth_cap_is_opt_in() {
        let capped = PegValuation {
            growth_cap: Some(0.50),
            ..model()
        };
        let mut r = sample_record();
        r.earnings_growth = Some(2.0);
        let result = capped.evaluate(&r, &empty_history());
        assert_relative_eq!(result.target_price().unwrap(), 1.5 * 50.0 * 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_non_positive_growth_invalid() {
        for g in [Some(0.0), Some(-0.2), None] {
            let mut r = sample_record();
            r.earnings_growth = g;
            let result = model().evaluate(&r, &empty_history());
            assert_eq!(result.invalid_reason(), Some(&InvalidReason::NonPositiveGrowth));
        }
    }

    #[test]
    fn test_falls_back_to_historical_cagr() {
        let mut history = HistoricalSeries::new("SAMPLE");
        for (year, ni) in [(2020, 100.0), (2023, 133.1)] {
            history.insert(FinancialPeriod {
                period_end: NaiveDate::from_ymd_opt(year, 12, 31).unwrap(),
                period_type: PeriodType::Annual,
                revenue: Some(1.0),
                net_income: Some(ni),
            });
        }
        let mut r = sample_record();
        r.earnings_growth = None;
        let result = model().evaluate(&r, &history);
        // ~10% CAGR -> ~15x
        let price = result.target_price().unwrap();
        assert!((price - 75.0).abs() < 0.5, "price {}", price);
        match result.outcome {
            ModelOutcome::Valid { details, .. } => assert_eq!(details["growth_source"], "historical_cagr"),
            other => panic!("expected valid, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_eps_invalid() {
        let mut r = sample_record();
        r.eps = Some(-2.0);
        let result = model().evaluate(&r, &empty_history());
        assert_eq!(result.invalid_reason(), Some(&InvalidReason::NonPositiveEarnings));
    }
}
