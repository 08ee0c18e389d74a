pub mod bubble;
pub mod config;
pub mod consensus;
pub mod growth;
pub mod models;
pub mod normalizer;
pub mod scenarios;
pub mod screener;
pub mod upside;

pub use bubble::compute_bubble_score;
pub use config::ValuationConfig;
pub use consensus::build_consensus;
pub use growth::{compute_growth_metrics, peg_average, resolve_growth, GrowthMetrics, GrowthSource, ResolvedGrowth};
pub use models::{run_all_valuation_models, ValuationSuite};
pub use normalizer::{normalize_history, normalize_metrics, RawMetrics, RawPeriod};
pub use scenarios::{scenario_analysis, Scenario, ScenarioAnalysis, ScenarioBasis, ScenarioCase};
pub use screener::{screen, Screen};
pub use upside::{rank_upside, solve_required_growth, Feasibility, RequiredGrowth, UpsideCandidate, YearProjection};

use analysis_core::{
    AnalysisError, BubbleAssessment, ConsensusResult, HistoricalSeries, HistoryReader, MetricRecord,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Everything derived for one security from one record and its history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationReport {
    /// Input record carrying the derived bubble assessment
    pub record: MetricRecord,
    pub assessment: BubbleAssessment,
    pub growth: GrowthMetrics,
    /// Mean PEG across the available earnings growth figures
    pub peg_average: Option<f64>,
    pub consensus: ConsensusResult,
    /// Bull/base/bear horizon prices; not part of the consensus
    pub scenarios: Option<ScenarioAnalysis>,
}

impl ValuationReport {
    pub fn ticker(&self) -> &str {
        &self.record.ticker
    }
}

/// Entry point tying the scoring, growth and valuation components to one
/// configuration. Stateless apart from the config; safe to share across threads.
pub struct FundamentalAnalysisEngine {
    config: ValuationConfig,
    suite: ValuationSuite,
}

impl FundamentalAnalysisEngine {
    pub fn new() -> Self {
        Self::with_config(ValuationConfig::default())
    }

    pub fn with_config(config: ValuationConfig) -> Self {
        let suite = ValuationSuite::new(&config);
        Self { config, suite }
    }

    pub fn config(&self) -> &ValuationConfig {
        &self.config
    }

    pub fn compute_bubble_score(&self, record: &MetricRecord) -> BubbleAssessment {
        compute_bubble_score(record)
    }

    pub fn compute_growth_metrics(&self, series: &HistoricalSeries) -> GrowthMetrics {
        compute_growth_metrics(series, &self.config)
    }

    pub fn run_all_valuation_models(
        &self,
        record: &MetricRecord,
        series: &HistoricalSeries,
    ) -> Vec<analysis_core::ValuationModelResult> {
        self.suite.evaluate_all(record, series)
    }

    pub fn build_consensus(
        &self,
        results: Vec<analysis_core::ValuationModelResult>,
        current_price: Option<f64>,
    ) -> ConsensusResult {
        build_consensus(results, current_price, &self.config)
    }

    pub fn scenario_analysis(&self, record: &MetricRecord, series: &HistoricalSeries) -> Option<ScenarioAnalysis> {
        scenario_analysis(record, series, &self.config)
    }

    pub fn solve_required_growth(
        &self,
        current_market_cap: f64,
        target_market_cap: f64,
        years: u32,
        record: &MetricRecord,
        growth: &GrowthMetrics,
    ) -> Result<RequiredGrowth, AnalysisError> {
        solve_required_growth(
            current_market_cap,
            target_market_cap,
            years,
            record,
            growth,
            self.config.feasibility_tolerance,
        )
    }

    pub fn rank_upside(
        &self,
        records: &[MetricRecord],
        target_market_cap: f64,
    ) -> Result<Vec<UpsideCandidate>, AnalysisError> {
        rank_upside(records, target_market_cap)
    }

    /// Full derivation for one security. The input record is not modified;
    /// the report carries a copy with the assessment attached.
    pub fn analyze(&self, record: &MetricRecord, series: &HistoricalSeries) -> ValuationReport {
        let assessment = self.compute_bubble_score(record);
        let growth = self.compute_growth_metrics(series);
        let results = self.run_all_valuation_models(record, series);
        let consensus = self.build_consensus(results, record.current_price);
        let scenarios = self.scenario_analysis(record, series);

        match &consensus.summary {
            Some(summary) => debug!(
                "{}: bubble {} ({}), consensus {:.2} from {} models",
                record.ticker,
                assessment.score,
                assessment.risk_level.to_label(),
                summary.target_price,
                summary.valid_models
            ),
            None => debug!(
                "{}: bubble {} ({}), no consensus",
                record.ticker,
                assessment.score,
                assessment.risk_level.to_label()
            ),
        }

        ValuationReport {
            record: record.with_assessment(assessment),
            assessment,
            peg_average: peg_average(record, &growth),
            growth,
            consensus,
            scenarios,
        }
    }

    /// Analyzes every security in parallel. Output order matches input order.
    pub fn analyze_batch(&self, items: &[(MetricRecord, HistoricalSeries)]) -> Vec<ValuationReport> {
        let reports: Vec<ValuationReport> = items
            .par_iter()
            .map(|(record, series)| self.analyze(record, series))
            .collect();
        info!("Analyzed {} securities", reports.len());
        reports
    }

    /// Re-derives the report for `ticker` from stored data: the latest
    /// archived snapshot plus the stored history. `None` when nothing is archived.
    pub async fn analyze_stored<R: HistoryReader + ?Sized>(
        &self,
        reader: &R,
        ticker: &str,
    ) -> Result<Option<ValuationReport>, AnalysisError> {
        let Some(record) = reader.latest_snapshot(ticker).await? else {
            return Ok(None);
        };
        let series = reader.load_series(ticker).await?;
        Ok(Some(self.analyze(&record, &series)))
    }
}

impl Default for FundamentalAnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{Classification, FinancialPeriod, PeriodType, Recommendation, RiskLevel};
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::json;

    fn raw_metrics() -> RawMetrics {
        json!({
            "longName": "Sample Corp",
            "sector": "Technology",
            "currentPrice": 100.0,
            "marketCap": 100e9,
            "sharesOutstanding": 1e9,
            "trailingPE": 20.0,
            "trailingEps": 5.0,
            "priceToSalesTrailing12Months": 4.0,
            "bookValue": 20.0,
            "totalRevenue": 25e9,
            "netIncomeToCommon": 5e9,
            "profitMargins": 0.2,
            "revenueGrowth": 0.12,
            "earningsGrowth": 0.15,
            "dividendRate": 4.0,
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    fn history() -> HistoricalSeries {
        let mut series = HistoricalSeries::new("SMPL");
        for (i, year) in (2020..=2023).enumerate() {
            series.insert(FinancialPeriod {
                period_end: NaiveDate::from_ymd_opt(year, 12, 31).unwrap(),
                period_type: PeriodType::Annual,
                revenue: Some(20e9 * 1.1_f64.powi(i as i32)),
                net_income: Some(4e9 * 1.1_f64.powi(i as i32)),
            });
        }
        series
    }

    #[test]
    fn test_analyze_end_to_end() {
        let fetched_at = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let record = normalize_metrics("smpl", &raw_metrics(), fetched_at).unwrap();
        let engine = FundamentalAnalysisEngine::new();
        let report = engine.analyze(&record, &history());

        assert_eq!(report.ticker(), "SMPL");
        assert_eq!(report.assessment.score, 0);
        assert_eq!(report.assessment.risk_level, RiskLevel::Low);
        assert_eq!(report.assessment.classification, Classification::FairlyValued);
        assert_eq!(report.record.derived, Some(report.assessment));
        assert!(record.derived.is_none());

        let cagr = report.growth.revenue_cagr.unwrap();
        assert!((cagr - 0.1).abs() < 0.001);

        let summary = report.consensus.summary.as_ref().unwrap();
        assert_eq!(summary.valid_models, 8);
        assert!(summary.min_target <= summary.target_price && summary.target_price <= summary.max_target);
        assert!(summary.recommendation.is_some());

        // historical and reported PEG averaged
        assert!(report.peg_average.unwrap() > 0.0);
        let scenarios = report.scenarios.as_ref().unwrap();
        assert_eq!(scenarios.basis, ScenarioBasis::Earnings);
        assert_eq!(scenarios.growth_source, Some(GrowthSource::HistoricalCagr));
        assert_eq!(scenarios.scenarios.len(), 3);
    }

    #[test]
    fn test_scenarios_do_not_move_consensus() {
        let record = normalize_metrics("SMPL", &raw_metrics(), Utc::now()).unwrap();
        let engine = FundamentalAnalysisEngine::new();
        let report = engine.analyze(&record, &history());
        let direct = engine.build_consensus(engine.run_all_valuation_models(&record, &history()), record.current_price);
        assert_eq!(report.consensus, direct);
        assert!(report.scenarios.is_some());
    }

    #[test]
    fn test_analyze_batch_preserves_order() {
        let engine = FundamentalAnalysisEngine::new();
        let fetched_at = Utc::now();
        let items: Vec<_> = ["AAA", "BBB", "CCC", "DDD"]
            .iter()
            .map(|t| (normalize_metrics(t, &raw_metrics(), fetched_at).unwrap(), HistoricalSeries::new(*t)))
            .collect();

        let reports = engine.analyze_batch(&items);
        let tickers: Vec<_> = reports.iter().map(|r| r.ticker()).collect();
        assert_eq!(tickers, vec!["AAA", "BBB", "CCC", "DDD"]);
        assert_eq!(reports[0].consensus, reports[3].consensus);
    }

    #[test]
    fn test_unprofitable_record_has_partial_consensus() {
        let mut raw = raw_metrics();
        raw.insert("trailingEps".into(), json!(-1.5));
        raw.insert("netIncomeToCommon".into(), json!(-1.5e9));
        raw.remove("trailingPE");
        raw.remove("dividendRate");
        let record = normalize_metrics("LOSS", &raw, Utc::now()).unwrap();

        let report = FundamentalAnalysisEngine::new().analyze(&record, &HistoricalSeries::new("LOSS"));
        assert!(report.assessment.score >= 2);
        let summary = report.consensus.summary.unwrap();
        // Graham, Gordon, PEG and the earnings projection drop out
        assert_eq!(summary.valid_models, 4);
    }

    #[test]
    fn test_solver_uses_configured_tolerance() {
        let engine = FundamentalAnalysisEngine::with_config(ValuationConfig {
            feasibility_tolerance: 2.0,
            ..ValuationConfig::default()
        });
        let record = normalize_metrics("SMPL", &raw_metrics(), Utc::now()).unwrap();
        let growth = engine.compute_growth_metrics(&history());
        // needs ~14.9%/yr against a ~10% history
        let solved = engine.solve_required_growth(100e9, 200e9, 5, &record, &growth).unwrap();
        assert_eq!(solved.feasibility, Feasibility::Feasible);

        let strict = FundamentalAnalysisEngine::new();
        let solved = strict.solve_required_growth(100e9, 200e9, 5, &record, &growth).unwrap();
        assert_eq!(solved.feasibility, Feasibility::Ambitious);
    }

    #[test]
    fn test_overvalued_consensus_is_not_a_buy() {
        let mut raw = raw_metrics();
        raw.insert("currentPrice".into(), json!(1000.0));
        raw.insert("marketCap".into(), json!(1000e9));
        let record = normalize_metrics("PRICY", &raw, Utc::now()).unwrap();
        let report = FundamentalAnalysisEngine::new().analyze(&record, &history());
        let summary = report.consensus.summary.unwrap();
        assert!(summary.upside.unwrap() < 0.0);
        assert_eq!(summary.recommendation, Some(Recommendation::Sell));
    }

    struct FixedReader {
        record: Option<MetricRecord>,
        series: HistoricalSeries,
    }

    #[async_trait]
    impl HistoryReader for FixedReader {
        async fn load_series(&self, _ticker: &str) -> Result<HistoricalSeries, AnalysisError> {
            Ok(self.series.clone())
        }

        async fn latest_snapshot(&self, _ticker: &str) -> Result<Option<MetricRecord>, AnalysisError> {
            Ok(self.record.clone())
        }
    }

    #[tokio::test]
    async fn test_analyze_stored() {
        let engine = FundamentalAnalysisEngine::new();
        let record = normalize_metrics("SMPL", &raw_metrics(), Utc::now()).unwrap();
        let reader = FixedReader {
            record: Some(record.clone()),
            series: history(),
        };
        let report = engine.analyze_stored(&reader, "SMPL").await.unwrap().unwrap();
        assert_eq!(report, engine.analyze(&record, &history()));

        let empty = FixedReader {
            record: None,
            series: HistoricalSeries::new("NONE"),
        };
        assert!(engine.analyze_stored(&empty, "NONE").await.unwrap().is_none());
    }
}
