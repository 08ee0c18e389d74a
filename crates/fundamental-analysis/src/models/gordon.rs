use analysis_core::{HistoricalSeries, InvalidReason, MetricRecord, ValuationModel, ValuationModelKind, ValuationModelResult};
use serde_json::json;

use super::settle;
use crate::config::ValuationConfig;

/// Retention-based growth estimate `ROE * (1 - payout)`, with ROE taken as
/// EPS / book value per share and payout as dividend / EPS.
pub fn sustainable_dividend_growth(record: &MetricRecord) -> Option<f64> {
    let eps = record.eps.filter(|e| *e > 0.0)?;
    let bvps = record.book_value_per_share.filter(|b| *b > 0.0)?;
    let dividend = record.dividend_rate.filter(|d| *d > 0.0)?;

    let roe = eps / bvps;
    let payout = dividend / eps;
    let growth = roe * (1.0 - payout);
    growth.is_finite().then_some(growth)
}

/// Dividend discount model, `D1 / (r - g)` with `D1 = D0 * (1 + g)`.
#[derive(Debug, Clone)]
pub struct GordonGrowth {
    pub required_return: f64,
    /// Used in place of the derived growth rate when set
    pub growth_override: Option<f64>,
    pub default_growth: f64,
}

impl GordonGrowth {
    pub fn from_config(config: &ValuationConfig) -> Self {
        Self {
            required_return: config.required_return,
            growth_override: config.dividend_growth_override,
            default_growth: config.default_dividend_growth,
        }
    }

    fn growth_estimate(&self, record: &MetricRecord) -> (f64, &'static str) {
        if let Some(g) = self.growth_override {
            return (g, "override");
        }
        match sustainable_dividend_growth(record) {
            Some(g) => (g, "sustainable"),
            None => (self.default_growth, "default"),
        }
    }

    fn estimate(&self, record: &MetricRecord) -> Result<ValuationModelResult, InvalidReason> {
        let dividend = match record.dividend_rate {
            Some(d) if d > 0.0 => d,
            _ => return Err(InvalidReason::NoDividend),
        };

        let (growth, growth_source) = self.growth_estimate(record);
        let r = self.required_return;
        // Singularity at g == r and a negative price beyond it
        if growth >= r {
            return Err(InvalidReason::GrowthNotBelowRequiredReturn {
                growth,
                required_return: r,
            });
        }

        let next_dividend = dividend * (1.0 + growth);
        let value = next_dividend / (r - growth);

        Ok(ValuationModelResult::valid(
            self.kind(),
            value,
            record.current_price,
            json!({
                "dividend_rate": dividend,
                "next_dividend": next_dividend,
                "growth": growth,
                "growth_source": growth_source,
                "required_return": r,
            }),
        ))
    }
}

impl ValuationModel for GordonGrowth {
    fn kind(&self) -> ValuationModelKind {
        ValuationModelKind::GordonGrowth
    }

    fn evaluate(&self, record: &MetricRecord, _history: &HistoricalSeries) -> ValuationModelResult {
        settle(self.kind(), self.estimate(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::*;
    use approx::assert_relative_eq;

    fn model(required_return: f64, growth: Option<f64>) -> GordonGrowth {
        GordonGrowth {
            required_return,
            growth_override: growth,
            default_growth: 0.03,
        }
    }

    #[test]
    fn test_gordon_value() {
        let mut r = sample_record();
        r.dividend_rate = Some(2.0);
        let result = model(0.08, Some(0.03)).evaluate(&r, &empty_history());
        // 2.06 / 0.05
        assert_relative_eq!(result.target_price().unwrap(), 41.2, epsilon = 1e-9);
    }

    #[test]
    fn test_growth_at_or_above_required_return_invalid() {
        for dividend in [0.01, 1.0, 2.0, 100.0] {
            for (r, g) in [(0.08, 0.10), (0.08, 0.08), (0.05, 0.5)] {
                let mut record = sample_record();
                record.dividend_rate = Some(dividend);
                let result = model(r, Some(g)).evaluate(&record, &empty_history());
                assert!(matches!(
                    result.invalid_reason(),
                    Some(InvalidReason::GrowthNotBelowRequiredReturn { .. })
                ));
            }
        }
    }

    #[test]
    fn test_no_dividend_invalid() {
        for dividend in [None, Some(0.0)] {
            let mut r = sample_record();
            r.dividend_rate = dividend;
            let result = model(0.09, None).evaluate(&r, &empty_history());
            assert_eq!(result.invalid_reason(), Some(&InvalidReason::NoDividend));
        }
    }

    #[test]
    fn test_sustainable_growth() {
        // ROE 0.25, payout 0.8
        let g = sustainable_dividend_growth(&sample_record()).unwrap();
        assert_relative_eq!(g, 0.05, epsilon = 1e-12);

        let mut r = sample_record();
        r.eps = Some(-1.0);
        assert!(sustainable_dividend_growth(&r).is_none());
    }

    #[test]
    fn test_default_growth_when_not_derivable() {
        let mut r = sample_record();
        r.book_value_per_share = None;
        let m = model(0.09, None);
        let result = m.evaluate(&r, &empty_history());
        // 4 * 1.03 / 0.06
        assert_relative_eq!(result.target_price().unwrap(), 4.12 / 0.06, epsilon = 1e-9);
    }
}
