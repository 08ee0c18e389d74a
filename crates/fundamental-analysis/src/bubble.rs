//! Bubble Score Engine
//!
//! Additive 0-10 overvaluation heuristic. Each factor is independent, so the
//! order of evaluation does not matter; the sum is capped at 10.

use analysis_core::{BubbleAssessment, Classification, MetricRecord, RiskLevel};

pub const MAX_BUBBLE_SCORE: u8 = 10;

/// Score at or above which a stock is classified overvalued regardless of ratios
const OVERVALUED_SCORE: u8 = 6;

/// Highest matching P/E tier only.
fn pe_points(pe: Option<f64>) -> u8 {
    match pe {
        Some(pe) if pe > 200.0 => 3,
        Some(pe) if pe > 100.0 => 2,
        Some(pe) if pe > 50.0 => 1,
        _ => 0,
    }
}

/// Highest matching P/S tier only.
fn ps_points(ps: Option<f64>) -> u8 {
    match ps {
        Some(ps) if ps > 50.0 => 3,
        Some(ps) if ps > 20.0 => 2,
        Some(ps) if ps > 10.0 => 1,
        _ => 0,
    }
}

fn profitability_points(record: &MetricRecord) -> u8 {
    if record.is_profitable() {
        0
    } else {
        2
    }
}

/// Rich P/S without the growth to justify it. Unavailable growth is treated
/// as not demonstrated.
fn growth_mismatch_points(record: &MetricRecord) -> u8 {
    let rich = record.ps_ratio.map_or(false, |ps| ps > 15.0);
    let slow = record.revenue_growth.map_or(true, |g| g < 0.20);
    if rich && slow {
        2
    } else {
        0
    }
}

/// Raw bubble score in [0, 10].
pub fn bubble_score(record: &MetricRecord) -> u8 {
    let total = pe_points(record.pe_ratio)
        + ps_points(record.ps_ratio)
        + profitability_points(record)
        + growth_mismatch_points(record);
    total.min(MAX_BUBBLE_SCORE)
}

/// Style bucket. Ratio checks require the ratio to be present and positive;
/// a missing P/E never reads as "cheap".
pub fn classify(record: &MetricRecord, score: u8) -> Classification {
    let pe = record.pe_ratio.filter(|pe| *pe > 0.0);
    let ps = record.ps_ratio.filter(|ps| *ps > 0.0);
    let growth = record.revenue_growth;

    if let (Some(pe), Some(ps)) = (pe, ps) {
        if pe < 20.0 && ps < 3.0 {
            return Classification::ValuePlay;
        }
    }

    if score >= OVERVALUED_SCORE {
        return Classification::Overvalued;
    }

    if let Some(g) = growth {
        let pe_justified = pe.map_or(false, |pe| pe < g * 100.0);
        let ps_reasonable = ps.map_or(false, |ps| ps < 10.0);
        if g > 0.30 && (pe_justified || ps_reasonable) {
            return Classification::Growth;
        }
    }

    if pe.map_or(false, |pe| pe > 100.0) || ps.map_or(false, |ps| ps > 30.0) {
        return Classification::Overvalued;
    }

    Classification::FairlyValued
}

/// Score, risk level and classification for one record.
pub fn compute_bubble_score(record: &MetricRecord) -> BubbleAssessment {
    let score = bubble_score(record);
    BubbleAssessment {
        score,
        risk_level: RiskLevel::from_score(score),
        classification: classify(record, score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(pe: Option<f64>, ps: Option<f64>, net_income: Option<f64>, growth: Option<f64>) -> MetricRecord {
        let mut r = MetricRecord::new("TEST", Utc::now());
        r.pe_ratio = pe;
        r.ps_ratio = ps;
        r.net_income = net_income;
        r.revenue_growth = growth;
        r
    }

    #[test]
    fn test_tiers_are_not_cumulative() {
        assert_eq!(pe_points(Some(250.0)), 3);
        assert_eq!(pe_points(Some(150.0)), 2);
        assert_eq!(pe_points(Some(60.0)), 1);
        assert_eq!(pe_points(Some(50.0)), 0);
        assert_eq!(pe_points(None), 0);
        assert_eq!(ps_points(Some(51.0)), 3);
        assert_eq!(ps_points(Some(21.0)), 2);
        assert_eq!(ps_points(Some(10.5)), 1);
        assert_eq!(ps_points(Some(10.0)), 0);
    }

    #[test]
    fn test_cheap_profitable_scores_zero() {
        for pe in [5.0, 20.0, 49.9, 50.0] {
            for ps in [0.5, 3.0, 9.9, 10.0] {
                let r = record(Some(pe), Some(ps), Some(1e9), Some(0.05));
                assert_eq!(bubble_score(&r), 0, "pe={} ps={}", pe, ps);
            }
        }
    }

    #[test]
    fn test_unprofitable_adds_two() {
        let r = record(Some(15.0), Some(2.0), Some(-5.0), Some(0.1));
        assert_eq!(bubble_score(&r), 2);
        let r = record(Some(15.0), Some(2.0), None, Some(0.1));
        assert_eq!(bubble_score(&r), 2);
        let r = record(Some(15.0), Some(2.0), Some(0.0), Some(0.1));
        assert_eq!(bubble_score(&r), 2);
    }

    #[test]
    fn test_high_ps_low_growth() {
        // ps 16 -> +1 tier, +2 mismatch
        let r = record(None, Some(16.0), Some(1.0), Some(0.10));
        assert_eq!(bubble_score(&r), 3);
        let r = record(None, Some(16.0), Some(1.0), Some(0.25));
        assert_eq!(bubble_score(&r), 1);
        let r = record(None, Some(16.0), Some(1.0), None);
        assert_eq!(bubble_score(&r), 3);
    }

    #[test]
    fn test_score_is_capped() {
        let r = record(Some(500.0), Some(100.0), Some(-1.0), Some(0.0));
        assert_eq!(bubble_score(&r), 10);
        let a = compute_bubble_score(&r);
        assert_eq!(a.risk_level, RiskLevel::Extreme);
        assert_eq!(a.classification, Classification::Overvalued);
    }

    #[test]
    fn test_score_bounded_and_monotonic_over_grid() {
        let pes = [None, Some(-10.0), Some(10.0), Some(51.0), Some(101.0), Some(201.0), Some(1e6)];
        let pss = [None, Some(0.0), Some(5.0), Some(11.0), Some(16.0), Some(21.0), Some(51.0)];
        let incomes = [None, Some(-1.0), Some(1.0)];
        let growths = [None, Some(-0.5), Some(0.1), Some(0.5)];
        for ni in incomes {
            for g in growths {
                for ps in pss {
                    let mut last = 0;
                    for pe in pes.iter().skip(2) {
                        let s = bubble_score(&record(*pe, ps, ni, g));
                        assert!(s <= MAX_BUBBLE_SCORE);
                        assert!(s >= last);
                        last = s;
                    }
                }
                for pe in pes {
                    let mut last = 0;
                    for ps in pss.iter().skip(2) {
                        let s = bubble_score(&record(pe, *ps, ni, g));
                        assert!(s <= MAX_BUBBLE_SCORE);
                        assert!(s >= last);
                        last = s;
                    }
                }
            }
        }
    }

    #[test]
    fn test_classification() {
        let value = record(Some(12.0), Some(1.5), Some(1.0), Some(0.05));
        assert_eq!(compute_bubble_score(&value).classification, Classification::ValuePlay);

        let growth = record(Some(35.0), Some(8.0), Some(1.0), Some(0.45));
        assert_eq!(compute_bubble_score(&growth).classification, Classification::Growth);

        let rich = record(Some(120.0), Some(12.0), Some(1.0), Some(0.10));
        assert_eq!(compute_bubble_score(&rich).classification, Classification::Overvalued);

        let fair = record(Some(25.0), Some(4.0), Some(1.0), Some(0.08));
        assert_eq!(compute_bubble_score(&fair).classification, Classification::FairlyValued);
    }

    #[test]
    fn test_missing_pe_is_not_value() {
        let r = record(None, Some(1.0), Some(1.0), Some(0.05));
        assert_eq!(compute_bubble_score(&r).classification, Classification::FairlyValued);
    }
}
