use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One normalized fundamentals snapshot for one security.
///
/// Every numeric field is `None` when the provider did not supply a usable
/// value. A present `Some(0.0)` is a real zero (e.g. a zero dividend yield).
/// Records are never updated in place: a re-fetch produces a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub ticker: String,
    pub company_name: Option<String>,
    pub sector: Option<String>,
    pub fetched_at: DateTime<Utc>,

    // Price / valuation
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub forward_pe: Option<f64>,
    pub ps_ratio: Option<f64>,
    pub eps: Option<f64>,
    pub book_value_per_share: Option<f64>,

    // Income
    pub revenue: Option<f64>,
    pub net_income: Option<f64>,
    pub profit_margin: Option<f64>,
    pub operating_margin: Option<f64>,

    // Growth (YoY, fraction)
    pub revenue_growth: Option<f64>,
    pub earnings_growth: Option<f64>,

    // Dividends
    /// Currency per share per year
    pub dividend_rate: Option<f64>,
    /// Fraction of price
    pub dividend_yield: Option<f64>,

    /// Bubble score, risk level and classification; computed, never fetched.
    #[serde(default)]
    pub derived: Option<BubbleAssessment>,
}

impl MetricRecord {
    /// Empty record for `ticker` with every metric unavailable.
    pub fn new(ticker: impl Into<String>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            ticker: ticker.into(),
            company_name: None,
            sector: None,
            fetched_at,
            current_price: None,
            market_cap: None,
            shares_outstanding: None,
            pe_ratio: None,
            forward_pe: None,
            ps_ratio: None,
            eps: None,
            book_value_per_share: None,
            revenue: None,
            net_income: None,
            profit_margin: None,
            operating_margin: None,
            revenue_growth: None,
            earnings_growth: None,
            dividend_rate: None,
            dividend_yield: None,
            derived: None,
        }
    }

    /// Net income strictly positive. Unavailable counts as unprofitable.
    pub fn is_profitable(&self) -> bool {
        self.net_income.map_or(false, |ni| ni > 0.0)
    }

    /// Revenue divided by shares outstanding, when both are positive.
    pub fn revenue_per_share(&self) -> Option<f64> {
        match (self.revenue, self.shares_outstanding) {
            (Some(revenue), Some(shares)) if revenue > 0.0 && shares > 0.0 => Some(revenue / shares),
            _ => None,
        }
    }

    /// Returns a copy carrying the derived assessment; the original is untouched.
    pub fn with_assessment(&self, assessment: BubbleAssessment) -> Self {
        Self {
            derived: Some(assessment),
            ..self.clone()
        }
    }
}

/// Overvaluation risk bucket for a bubble score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    VeryHigh,
    Extreme,
}

impl RiskLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=1 => RiskLevel::Low,
            2..=3 => RiskLevel::Medium,
            4..=5 => RiskLevel::High,
            6..=7 => RiskLevel::VeryHigh,
            _ => RiskLevel::Extreme,
        }
    }

    pub fn to_label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::VeryHigh => "VERY HIGH",
            RiskLevel::Extreme => "EXTREME",
        }
    }
}

/// Coarse style bucket derived from bubble score, P/E, P/S and growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    ValuePlay,
    Growth,
    FairlyValued,
    Overvalued,
}

impl Classification {
    pub fn to_label(&self) -> &'static str {
        match self {
            Classification::ValuePlay => "Value Play",
            Classification::Growth => "Growth",
            Classification::FairlyValued => "Fairly Valued",
            Classification::Overvalued => "Overvalued",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BubbleAssessment {
    /// 0 to 10
    pub score: u8,
    pub risk_level: RiskLevel,
    pub classification: Classification,
}

/// Reporting granularity of a financial period
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Quarterly,
    Annual,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Quarterly => "quarterly",
            PeriodType::Annual => "annual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quarterly" | "quarter" | "q" => Some(PeriodType::Quarterly),
            "annual" | "yearly" | "year" | "a" => Some(PeriodType::Annual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialPeriod {
    pub period_end: NaiveDate,
    pub period_type: PeriodType,
    pub revenue: Option<f64>,
    pub net_income: Option<f64>,
}

/// Append-only per-security history of reported periods.
///
/// Periods are kept sorted by end date. A period is identified by
/// (period_end, period_type); once present it is never replaced, so a later
/// restatement or a provider that drops old periods cannot alter what was
/// already recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SeriesRepr")]
pub struct HistoricalSeries {
    ticker: String,
    periods: Vec<FinancialPeriod>,
}

#[derive(Deserialize)]
struct SeriesRepr {
    ticker: String,
    #[serde(default)]
    periods: Vec<FinancialPeriod>,
}

impl From<SeriesRepr> for HistoricalSeries {
    fn from(repr: SeriesRepr) -> Self {
        let mut series = HistoricalSeries::new(repr.ticker);
        series.extend(repr.periods);
        series
    }
}

impl HistoricalSeries {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            periods: Vec::new(),
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// Insert-if-absent. Returns `true` when the period was new.
    pub fn insert(&mut self, period: FinancialPeriod) -> bool {
        let key = (period.period_end, period.period_type);
        match self
            .periods
            .binary_search_by(|p| (p.period_end, p.period_type).cmp(&key))
        {
            Ok(_) => false,
            Err(idx) => {
                self.periods.insert(idx, period);
                true
            }
        }
    }

    /// Inserts every period not already present; returns how many were new.
    pub fn extend<I: IntoIterator<Item = FinancialPeriod>>(&mut self, periods: I) -> usize {
        periods.into_iter().map(|p| self.insert(p)).filter(|&new| new).count()
    }

    /// All periods, oldest first.
    pub fn periods(&self) -> &[FinancialPeriod] {
        &self.periods
    }

    /// Periods of one granularity, oldest first.
    pub fn of_type(&self, period_type: PeriodType) -> Vec<&FinancialPeriod> {
        self.periods
            .iter()
            .filter(|p| p.period_type == period_type)
            .collect()
    }

    pub fn quarterly(&self) -> Vec<&FinancialPeriod> {
        self.of_type(PeriodType::Quarterly)
    }

    pub fn annual(&self) -> Vec<&FinancialPeriod> {
        self.of_type(PeriodType::Annual)
    }

    pub fn get(&self, period_end: NaiveDate, period_type: PeriodType) -> Option<&FinancialPeriod> {
        self.periods
            .iter()
            .find(|p| p.period_end == period_end && p.period_type == period_type)
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }
}

/// Identifier of one fair-value estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationModelKind {
    Graham,
    GordonGrowth,
    Peg,
    PriceToSalesSector,
    EarningsGrowth,
    RevenueGrowth,
    Dcf,
    MonteCarlo,
}

impl ValuationModelKind {
    pub const ALL: [ValuationModelKind; 8] = [
        ValuationModelKind::Graham,
        ValuationModelKind::GordonGrowth,
        ValuationModelKind::Peg,
        ValuationModelKind::PriceToSalesSector,
        ValuationModelKind::EarningsGrowth,
        ValuationModelKind::RevenueGrowth,
        ValuationModelKind::Dcf,
        ValuationModelKind::MonteCarlo,
    ];

    pub fn to_label(&self) -> &'static str {
        match self {
            ValuationModelKind::Graham => "Graham Number",
            ValuationModelKind::GordonGrowth => "Gordon Growth",
            ValuationModelKind::Peg => "PEG Valuation",
            ValuationModelKind::PriceToSalesSector => "P/S vs Sector",
            ValuationModelKind::EarningsGrowth => "Earnings Growth Model",
            ValuationModelKind::RevenueGrowth => "Revenue Growth Model",
            ValuationModelKind::Dcf => "DCF Model",
            ValuationModelKind::MonteCarlo => "Monte Carlo Simulation",
        }
    }
}

impl fmt::Display for ValuationModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_label())
    }
}

/// Why a model declined to produce a target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvalidReason {
    #[error("{field} unavailable")]
    Unavailable { field: String },

    #[error("negative earnings")]
    NonPositiveEarnings,

    #[error("non-positive book value")]
    NonPositiveBookValue,

    #[error("no dividend")]
    NoDividend,

    #[error("growth unavailable or non-positive")]
    NonPositiveGrowth,

    #[error("growth {growth:.4} is not below required return {required_return:.4}")]
    GrowthNotBelowRequiredReturn { growth: f64, required_return: f64 },

    #[error("sector {sector} not in lookup table")]
    UnknownSector { sector: String },

    #[error("no revenue")]
    NoRevenue,

    #[error("computed fair value is not a positive number")]
    NonPositiveFairValue,
}

impl InvalidReason {
    pub fn unavailable(field: &str) -> Self {
        InvalidReason::Unavailable {
            field: field.to_string(),
        }
    }
}

/// Distribution summary for models that produce a range rather than a point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBand {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModelOutcome {
    Valid {
        target_price: f64,
        /// (target - price) / price; `None` when the current price is unavailable
        upside: Option<f64>,
        #[serde(default)]
        band: Option<PriceBand>,
        details: serde_json::Value,
    },
    Invalid {
        reason: InvalidReason,
    },
}

/// Outcome of one valuation model for one security
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationModelResult {
    pub model: ValuationModelKind,
    pub outcome: ModelOutcome,
}

/// Fractional upside of `target` over `current_price`.
pub fn upside(target: f64, current_price: Option<f64>) -> Option<f64> {
    match current_price {
        Some(price) if price > 0.0 => Some((target - price) / price),
        _ => None,
    }
}

impl ValuationModelResult {
    pub fn invalid(model: ValuationModelKind, reason: InvalidReason) -> Self {
        Self {
            model,
            outcome: ModelOutcome::Invalid { reason },
        }
    }

    /// Valid result, unless `target_price` is not a finite positive number,
    /// in which case the model is marked invalid instead.
    pub fn valid(
        model: ValuationModelKind,
        target_price: f64,
        current_price: Option<f64>,
        details: serde_json::Value,
    ) -> Self {
        if !target_price.is_finite() || target_price <= 0.0 {
            return Self::invalid(model, InvalidReason::NonPositiveFairValue);
        }
        Self {
            model,
            outcome: ModelOutcome::Valid {
                target_price,
                upside: upside(target_price, current_price),
                band: None,
                details,
            },
        }
    }

    pub fn with_band(mut self, price_band: PriceBand) -> Self {
        if let ModelOutcome::Valid { band, .. } = &mut self.outcome {
            *band = Some(price_band);
        }
        self
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.outcome, ModelOutcome::Valid { .. })
    }

    pub fn target_price(&self) -> Option<f64> {
        match &self.outcome {
            ModelOutcome::Valid { target_price, .. } => Some(*target_price),
            ModelOutcome::Invalid { .. } => None,
        }
    }

    pub fn upside(&self) -> Option<f64> {
        match &self.outcome {
            ModelOutcome::Valid { upside, .. } => *upside,
            ModelOutcome::Invalid { .. } => None,
        }
    }

    pub fn invalid_reason(&self) -> Option<&InvalidReason> {
        match &self.outcome {
            ModelOutcome::Valid { .. } => None,
            ModelOutcome::Invalid { reason } => Some(reason),
        }
    }
}

/// Consensus recommendation tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Recommendation {
    Sell,
    Hold,
    Buy,
    StrongBuy,
}

impl Recommendation {
    /// One tier lower; `Sell` is the floor.
    pub fn downgrade(self) -> Self {
        match self {
            Recommendation::StrongBuy => Recommendation::Buy,
            Recommendation::Buy => Recommendation::Hold,
            Recommendation::Hold | Recommendation::Sell => Recommendation::Sell,
        }
    }

    pub fn to_label(&self) -> &'static str {
        match self {
            Recommendation::StrongBuy => "Strong Buy",
            Recommendation::Buy => "Buy",
            Recommendation::Hold => "Hold",
            Recommendation::Sell => "Sell",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusSummary {
    /// Equal-weighted mean of valid model targets
    pub target_price: f64,
    pub upside: Option<f64>,
    /// 0-100, higher when valid targets cluster tightly
    pub agreement_score: f64,
    pub min_target: f64,
    pub max_target: f64,
    pub valid_models: usize,
    /// `None` when the current price is unavailable
    pub recommendation: Option<Recommendation>,
}

/// Aggregated valuation across models. `summary` is `None` when no model was valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub summary: Option<ConsensusSummary>,
    pub models: Vec<ValuationModelResult>,
}

impl ConsensusResult {
    pub fn is_available(&self) -> bool {
        self.summary.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(date: &str, period_type: PeriodType, revenue: f64) -> FinancialPeriod {
        FinancialPeriod {
            period_end: date.parse().unwrap(),
            period_type,
            revenue: Some(revenue),
            net_income: None,
        }
    }

    #[test]
    fn test_series_insert_is_idempotent() {
        let mut series = HistoricalSeries::new("AAPL");
        assert!(series.insert(period("2023-12-31", PeriodType::Annual, 100.0)));
        assert!(!series.insert(period("2023-12-31", PeriodType::Annual, 999.0)));

        let stored = series
            .get("2023-12-31".parse().unwrap(), PeriodType::Annual)
            .unwrap();
        assert_eq!(stored.revenue, Some(100.0));
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_series_same_date_different_granularity() {
        let mut series = HistoricalSeries::new("AAPL");
        assert!(series.insert(period("2023-12-31", PeriodType::Annual, 400.0)));
        assert!(series.insert(period("2023-12-31", PeriodType::Quarterly, 100.0)));
        assert_eq!(series.annual().len(), 1);
        assert_eq!(series.quarterly().len(), 1);
    }

    #[test]
    fn test_series_kept_sorted() {
        let mut series = HistoricalSeries::new("MSFT");
        let added = series.extend(vec![
            period("2023-06-30", PeriodType::Quarterly, 3.0),
            period("2022-12-31", PeriodType::Quarterly, 1.0),
            period("2023-03-31", PeriodType::Quarterly, 2.0),
            period("2023-03-31", PeriodType::Quarterly, 42.0),
        ]);
        assert_eq!(added, 3);
        let revenues: Vec<f64> = series.quarterly().iter().filter_map(|p| p.revenue).collect();
        assert_eq!(revenues, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_series_deserialize_dedupes_first_wins() {
        let json = r#"{"ticker":"X","periods":[
            {"period_end":"2023-12-31","period_type":"annual","revenue":1.0,"net_income":null},
            {"period_end":"2023-12-31","period_type":"annual","revenue":2.0,"net_income":null}
        ]}"#;
        let series: HistoricalSeries = serde_json::from_str(json).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.periods()[0].revenue, Some(1.0));
    }

    #[test]
    fn test_valid_result_guards_non_positive_target() {
        let r = ValuationModelResult::valid(ValuationModelKind::Dcf, -5.0, Some(10.0), serde_json::json!({}));
        assert!(!r.is_valid());
        assert_eq!(r.invalid_reason(), Some(&InvalidReason::NonPositiveFairValue));

        let r = ValuationModelResult::valid(ValuationModelKind::Dcf, f64::NAN, Some(10.0), serde_json::json!({}));
        assert!(!r.is_valid());
    }

    #[test]
    fn test_valid_result_upside() {
        let r = ValuationModelResult::valid(ValuationModelKind::Graham, 15.0, Some(10.0), serde_json::json!({}));
        assert_eq!(r.target_price(), Some(15.0));
        assert!((r.upside().unwrap() - 0.5).abs() < 1e-12);

        let r = ValuationModelResult::valid(ValuationModelKind::Graham, 15.0, None, serde_json::json!({}));
        assert!(r.is_valid());
        assert!(r.upside().is_none());
    }

    #[test]
    fn test_risk_level_mapping() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(1), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(3), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(4), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(7), RiskLevel::VeryHigh);
        assert_eq!(RiskLevel::from_score(8), RiskLevel::Extreme);
        assert_eq!(RiskLevel::from_score(10), RiskLevel::Extreme);
    }

    #[test]
    fn test_recommendation_downgrade() {
        assert_eq!(Recommendation::StrongBuy.downgrade(), Recommendation::Buy);
        assert_eq!(Recommendation::Hold.downgrade(), Recommendation::Sell);
        assert_eq!(Recommendation::Sell.downgrade(), Recommendation::Sell);
    }

    #[test]
    fn test_with_assessment_leaves_original() {
        let record = MetricRecord::new("T", Utc::now());
        let scored = record.with_assessment(BubbleAssessment {
            score: 2,
            risk_level: RiskLevel::Medium,
            classification: Classification::FairlyValued,
        });
        assert!(record.derived.is_none());
        assert_eq!(scored.derived.unwrap().score, 2);
    }
}
