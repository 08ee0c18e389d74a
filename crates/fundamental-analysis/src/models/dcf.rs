use analysis_core::{HistoricalSeries, InvalidReason, MetricRecord, ValuationModel, ValuationModelKind, ValuationModelResult};
use serde_json::json;

use super::{required, settle};
use crate::config::ValuationConfig;

/// Simplified discounted cash flow with a Gordon terminal value.
///
/// Free cash flow is approximated from earnings (a conversion share of net
/// income) or, for unprofitable companies, from a thin revenue margin.
#[derive(Debug, Clone)]
pub struct DiscountedCashFlow {
    pub fcf_growth: f64,
    pub discount_rate: f64,
    pub terminal_growth: f64,
    pub years: u32,
    pub fcf_conversion: f64,
    pub revenue_fcf_margin: f64,
}

impl DiscountedCashFlow {
    pub fn from_config(config: &ValuationConfig) -> Self {
        Self {
            fcf_growth: config.dcf_fcf_growth,
            discount_rate: config.dcf_discount_rate,
            terminal_growth: config.dcf_terminal_growth,
            years: config.dcf_years,
            fcf_conversion: config.dcf_fcf_conversion,
            revenue_fcf_margin: config.dcf_revenue_fcf_margin,
        }
    }

    fn base_fcf(&self, record: &MetricRecord, shares: f64) -> Result<(f64, &'static str), InvalidReason> {
        if let Some(eps) = record.eps.filter(|e| *e > 0.0) {
            return Ok((eps * shares * self.fcf_conversion, "earnings"));
        }
        match record.revenue {
            Some(revenue) if revenue > 0.0 => Ok((revenue * self.revenue_fcf_margin, "revenue")),
            _ => Err(InvalidReason::NoRevenue),
        }
    }

    fn estimate(&self, record: &MetricRecord) -> Result<ValuationModelResult, InvalidReason> {
        if self.discount_rate <= self.terminal_growth {
            return Err(InvalidReason::GrowthNotBelowRequiredReturn {
                growth: self.terminal_growth,
                required_return: self.discount_rate,
            });
        }
        let shares = required(record.shares_outstanding.filter(|s| *s > 0.0), "shares_outstanding")?;
        let (base_fcf, fcf_basis) = self.base_fcf(record, shares)?;

        let mut pv_fcf = 0.0;
        let mut last_fcf = base_fcf;
        for year in 1..=self.years {
            last_fcf = base_fcf * (1.0 + self.fcf_growth).powi(year as i32);
            pv_fcf += last_fcf / (1.0 + self.discount_rate).powi(year as i32);
        }

        let terminal_value = last_fcf * (1.0 + self.terminal_growth) / (self.discount_rate - self.terminal_growth);
        let pv_terminal = terminal_value / (1.0 + self.discount_rate).powi(self.years as i32);
        let intrinsic_value = pv_fcf + pv_terminal;

        Ok(ValuationModelResult::valid(
            self.kind(),
            intrinsic_value / shares,
            record.current_price,
            json!({
                "base_fcf": base_fcf,
                "fcf_basis": fcf_basis,
                "fcf_growth": self.fcf_growth,
                "discount_rate": self.discount_rate,
                "terminal_growth": self.terminal_growth,
                "pv_fcf": pv_fcf,
                "terminal_value": terminal_value,
                "pv_terminal": pv_terminal,
                "intrinsic_value": intrinsic_value,
            }),
        ))
    }
}

impl ValuationModel for DiscountedCashFlow {
    fn kind(&self) -> ValuationModelKind {
        ValuationModelKind::Dcf
    }

    fn evaluate(&self, record: &MetricRecord, _history: &HistoricalSeries) -> ValuationModelResult {
        settle(self.kind(), self.estimate(record))
    }
}
