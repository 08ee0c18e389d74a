use async_trait::async_trait;
use crate::{AnalysisError, HistoricalSeries, MetricRecord, ValuationModelKind, ValuationModelResult};

/// A fair-value estimator.
///
/// Implementations never fail: missing or nonsensical inputs produce an
/// invalid result carrying the reason, so one model cannot abort the run.
pub trait ValuationModel: Send + Sync {
    fn kind(&self) -> ValuationModelKind;

    fn evaluate(&self, record: &MetricRecord, history: &HistoricalSeries) -> ValuationModelResult;
}

/// Read access to previously stored records and histories
#[async_trait]
pub trait HistoryReader: Send + Sync {
    async fn load_series(&self, ticker: &str) -> Result<HistoricalSeries, AnalysisError>;

    async fn latest_snapshot(&self, ticker: &str) -> Result<Option<MetricRecord>, AnalysisError>;
}
