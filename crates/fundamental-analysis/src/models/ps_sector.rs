use std::collections::BTreeMap;

use analysis_core::{HistoricalSeries, InvalidReason, MetricRecord, ValuationModel, ValuationModelKind, ValuationModelResult};
use serde_json::json;

use super::settle;
use crate::config::ValuationConfig;

/// Prices revenue per share at the sector's median P/S, not the stock's own.
#[derive(Debug, Clone)]
pub struct PriceToSalesSector {
    pub sector_medians: BTreeMap<String, f64>,
}

impl PriceToSalesSector {
    pub fn from_config(config: &ValuationConfig) -> Self {
        Self {
            sector_medians: config.sector_ps_medians.clone(),
        }
    }

    fn estimate(&self, record: &MetricRecord) -> Result<ValuationModelResult, InvalidReason> {
        let sector = record
            .sector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| InvalidReason::unavailable("sector"))?;
        let median = *self
            .sector_medians
            .get(sector)
            .ok_or_else(|| InvalidReason::UnknownSector {
                sector: sector.to_string(),
            })?;

        if record.revenue.map_or(false, |r| r <= 0.0) {
            return Err(InvalidReason::NoRevenue);
        }
        let revenue_per_share = record
            .revenue_per_share()
            .ok_or_else(|| InvalidReason::unavailable("revenue_per_share"))?;

        Ok(ValuationModelResult::valid(
            self.kind(),
            median * revenue_per_share,
            record.current_price,
            json!({
                "sector": sector,
                "sector_median_ps": median,
                "revenue_per_share": revenue_per_share,
                "current_ps": record.ps_ratio,
            }),
        ))
    }
}

impl ValuationModel for PriceToSalesSector {
    fn kind(&self) -> ValuationModelKind {
        ValuationModelKind::PriceToSalesSector
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

    fn model() -> PriceToSalesSector {
        PriceToSalesSector::from_config(&ValuationConfig::default())
    }

    #[test]
    fn test_sector_median_pricing() {
        // Technology median 6x on $25 of revenue per share
        let result = model().evaluate(&sample_record(), &empty_history());
        assert_relative_eq!(result.target_price().unwrap(), 150.0, epsilon = 1e-9);
    }

    #[test]
    fn test_own_ps_does_not_matter() {
        let mut r = sample_record();
        r.ps_ratio = Some(80.0);
        let result = model().evaluate(&r, &empty_history());
        assert_relative_eq!(result.target_price().unwrap(), 150.0, epsilon = 1e-9);
    }

    #[test]
    fn test_unknown_or_missing_sector() {
        let mut r = sample_record();
        r.sector = Some("Crypto Mining".to_string());
        let result = model().evaluate(&r, &empty_history());
        assert!(matches!(result.invalid_reason(), Some(InvalidReason::UnknownSector { .. })));

        r.sector = None;
        let result = model().evaluate(&r, &empty_history());
        assert_eq!(result.invalid_reason(), Some(&InvalidReason::unavailable("sector")));
    }

    #[test]
    fn test_revenue_required() {
        let mut r = sample_record();
        r.revenue = Some(0.0);
        let result = model().evaluate(&r, &empty_history());
        assert_eq!(result.invalid_reason(), Some(&InvalidReason::NoRevenue));

        r.revenue = Some(1e9);
        r.shares_outstanding = None;
        let result = model().evaluate(&r, &empty_history());
        assert!(!result.is_valid());
    }
}
