use analysis_core::{HistoricalSeries, InvalidReason, MetricRecord, ValuationModel, ValuationModelKind, ValuationModelResult};
use serde_json::json;

use super::{required, settle};

/// 15x earnings times 1.5x book
const GRAHAM_MULTIPLIER: f64 = 22.5;

/// Benjamin Graham's intrinsic value, `sqrt(22.5 * EPS * BVPS)`.
#[derive(Debug, Clone, Default)]
pub struct GrahamNumber;

impl GrahamNumber {
    pub fn new() -> Self {
        Self
    }

    fn estimate(&self, record: &MetricRecord) -> Result<ValuationModelResult, InvalidReason> {
        let eps = required(record.eps, "eps")?;
        if eps <= 0.0 {
            return Err(InvalidReason::NonPositiveEarnings);
        }
        let bvps = required(record.book_value_per_share, "book_value_per_share")?;
        if bvps <= 0.0 {
            return Err(InvalidReason::NonPositiveBookValue);
        }

        let value = (GRAHAM_MULTIPLIER * eps * bvps).sqrt();
        let margin_of_safety = record.current_price.map(|price| (value - price) / value);

        Ok(ValuationModelResult::valid(
            self.kind(),
            value,
            record.current_price,
            json!({
                "eps": eps,
                "book_value_per_share": bvps,
                "margin_of_safety": margin_of_safety,
            }),
        ))
    }
}

impl ValuationModel for GrahamNumber {
    fn kind(&self) -> ValuationModelKind {
        ValuationModelKind::Graham
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

    #[test]
    fn test_graham_number() {
        let result = GrahamNumber::new().evaluate(&sample_record(), &empty_history());
        // sqrt(22.5 * 5 * 20) = sqrt(2250)
        assert_relative_eq!(result.target_price().unwrap(), 2250.0_f64.sqrt(), epsilon = 1e-9);
        assert_relative_eq!(result.target_price().unwrap(), 47.434, epsilon = 1e-3);
        assert!(result.upside().unwrap() < 0.0);
    }

    #[test]
    fn test_non_positive_eps_invalid_for_any_book_value() {
        for eps in [0.0, -0.01, -5.0] {
            for bvps in [None, Some(-10.0), Some(0.0), Some(20.0), Some(1e6)] {
                let mut r = sample_record();
                r.eps = Some(eps);
                r.book_value_per_share = bvps;
                let result = GrahamNumber::new().evaluate(&r, &empty_history());
                assert_eq!(result.invalid_reason(), Some(&InvalidReason::NonPositiveEarnings));
            }
        }
    }

    #[test]
    fn test_book_value_required() {
        let mut r = sample_record();
        r.book_value_per_share = None;
        let result = GrahamNumber::new().evaluate(&r, &empty_history());
        assert_eq!(result.invalid_reason(), Some(&InvalidReason::unavailable("book_value_per_share")));

        r.book_value_per_share = Some(-1.0);
        let result = GrahamNumber::new().evaluate(&r, &empty_history());
        assert_eq!(result.invalid_reason(), Some(&InvalidReason::NonPositiveBookValue));
    }

    #[test]
    fn test_margin_of_safety() {
        let mut r = sample_record();
        r.current_price = Some(2250.0_f64.sqrt() / 2.0);
        let result = GrahamNumber::new().evaluate(&r, &empty_history());
        match result.outcome {
            analysis_core::ModelOutcome::Valid { details, .. } => {
                assert_relative_eq!(details["margin_of_safety"].as_f64().unwrap(), 0.5, epsilon = 1e-9);
            }
            other => panic!("expected valid, got {:?}", other),
        }
    }
}
