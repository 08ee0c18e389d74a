use serde::{Deserialize, Serialize};

use crate::ValuationReport;

/// Filters over analyzed reports. Every ratio test requires the ratio to be
/// present; a missing value never passes a threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum Screen {
    /// Bubble score at or above the threshold
    HighRisk { min_bubble_score: u8 },
    /// Profitable with P/E and P/S at or under the limits
    Value { max_pe: f64, max_ps: f64 },
    /// Value box backed by consistent, positive quarterly growth
    EnhancedValue {
        max_pe: f64,
        max_ps: f64,
        min_consistency: f64,
        min_quarterly_growth: f64,
    },
    /// Profitable, close to but not inside the default value box
    NearValue,
    /// Strong historical CAGR delivered consistently at a reasonable PEG
    QualityGrowth {
        min_cagr: f64,
        min_consistency: f64,
        max_peg: f64,
    },
    /// Growth accelerating with reasonable consistency and P/E
    GrowthInflection { min_consistency: f64, max_pe: f64 },
}

impl Screen {
    pub fn high_risk() -> Self {
        Screen::HighRisk { min_bubble_score: 6 }
    }

    pub fn value() -> Self {
        Screen::Value {
            max_pe: 20.0,
            max_ps: 3.0,
        }
    }

    pub fn enhanced_value() -> Self {
        Screen::EnhancedValue {
            max_pe: 20.0,
            max_ps: 3.0,
            min_consistency: 60.0,
            min_quarterly_growth: 0.05,
        }
    }

    pub fn quality_growth() -> Self {
        Screen::QualityGrowth {
            min_cagr: 0.20,
            min_consistency: 70.0,
            max_peg: 2.5,
        }
    }

    pub fn growth_inflection() -> Self {
        Screen::GrowthInflection {
            min_consistency: 60.0,
            max_pe: 40.0,
        }
    }

    pub fn matches(&self, report: &ValuationReport) -> bool {
        let record = &report.record;
        let pe = record.pe_ratio;
        let ps = record.ps_ratio;
        let growth = &report.growth;

        match self {
            Screen::HighRisk { min_bubble_score } => report.assessment.score >= *min_bubble_score,
            Screen::Value { max_pe, max_ps } => {
                record.is_profitable()
                    && pe.map_or(false, |pe| pe <= *max_pe)
                    && ps.map_or(false, |ps| ps <= *max_ps)
            }
            Screen::EnhancedValue {
                max_pe,
                max_ps,
                min_consistency,
                min_quarterly_growth,
            } => {
                let at_least = |values: [Option<f64>; 2], floor: f64| values.iter().flatten().any(|v| *v >= floor);
                Screen::Value {
                    max_pe: *max_pe,
                    max_ps: *max_ps,
                }
                .matches(report)
                    && at_least([growth.revenue_consistency, growth.earnings_consistency], *min_consistency)
                    && at_least(
                        [growth.avg_quarterly_revenue_growth, growth.avg_quarterly_earnings_growth],
                        *min_quarterly_growth,
                    )
            }
            Screen::NearValue => match (pe, ps) {
                (Some(pe), Some(ps)) if record.is_profitable() => {
                    let is_value = pe <= 20.0 && ps <= 3.0;
                    let close_on_pe = pe > 20.0 && pe <= 30.0 && ps <= 5.0;
                    let close_on_ps = pe <= 25.0 && ps > 3.0 && ps <= 5.0;
                    !is_value && (close_on_pe || close_on_ps)
                }
                _ => false,
            },
            Screen::QualityGrowth {
                min_cagr,
                min_consistency,
                max_peg,
            } => {
                growth.best_historical_cagr().map_or(false, |c| c >= *min_cagr)
                    && growth.earnings_consistency.map_or(false, |c| c >= *min_consistency)
                    && report.peg_average.map_or(false, |peg| peg <= *max_peg)
            }
            Screen::GrowthInflection { min_consistency, max_pe } => {
                let consistent = [growth.revenue_consistency, growth.earnings_consistency]
                    .iter()
                    .flatten()
                    .any(|c| *c >= *min_consistency);
                (growth.revenue_accelerating || growth.earnings_accelerating)
                    && consistent
                    && pe.map_or(true, |pe| pe <= *max_pe)
            }
        }
    }

    /// Lower sorts first.
    fn rank_key(&self, report: &ValuationReport) -> f64 {
        let record = &report.record;
        match self {
            Screen::HighRisk { .. } => -(report.assessment.score as f64),
            Screen::Value { .. } => record.pe_ratio.unwrap_or(f64::MAX),
            Screen::EnhancedValue { .. } => -report.growth.revenue_consistency.unwrap_or(0.0),
            // distance to the value box on whichever axis is outside it
            Screen::NearValue => match (record.pe_ratio, record.ps_ratio) {
                (Some(pe), Some(ps)) if pe <= 20.0 => ps - 3.0,
                (Some(pe), Some(ps)) if ps <= 3.0 => pe - 20.0,
                (Some(pe), Some(ps)) => (pe - 20.0) / 10.0 + (ps - 3.0) / 2.0,
                _ => f64::MAX,
            },
            Screen::QualityGrowth { .. } => -report.growth.best_historical_cagr().unwrap_or(f64::MIN),
            Screen::GrowthInflection { .. } => -report.growth.earnings_consistency.unwrap_or(0.0),
        }
    }
}

/// Reports passing `screen`, best first. Ties keep ticker order.
pub fn screen<'a>(reports: &'a [ValuationReport], screen: &Screen) -> Vec<&'a ValuationReport> {
    let mut passed: Vec<&ValuationReport> = reports.iter().filter(|r| screen.matches(r)).collect();
    passed.sort_by(|a, b| {
        screen
            .rank_key(a)
            .partial_cmp(&screen.rank_key(b))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.record.ticker.cmp(&b.record.ticker))
    });
    passed
}
