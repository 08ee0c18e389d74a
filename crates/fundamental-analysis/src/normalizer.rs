//! Metric Normalizer
//!
//! Converts loosely-typed provider output into a [`MetricRecord`] and a
//! [`HistoricalSeries`]. This is the only place where raw zeros are
//! interpreted: every downstream component sees `None` for missing data.

use analysis_core::{AnalysisError, FinancialPeriod, HistoricalSeries, MetricRecord, PeriodType};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw provider payload: field name -> loosely typed value
pub type RawMetrics = serde_json::Map<String, Value>;

/// One raw historical row as fetched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPeriod {
    pub period_end_date: String,
    pub period_type: String,
    #[serde(default)]
    pub revenue: Value,
    #[serde(default, alias = "earnings")]
    pub net_income: Value,
}

/// How a literal zero from the feed is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZeroPolicy {
    /// Upstream zeros for this field are data-quality artifacts
    Missing,
    /// Zero is a real value (e.g. no dividend, breakeven margin)
    Meaningful,
}

/// Coerce one raw value to a finite float, or `None`.
fn to_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn apply_policy(n: f64, policy: ZeroPolicy) -> Option<f64> {
    if policy == ZeroPolicy::Missing && n == 0.0 {
        None
    } else {
        Some(n)
    }
}

/// First usable value among `keys`.
fn field(raw: &RawMetrics, keys: &[&str], policy: ZeroPolicy) -> Option<f64> {
    keys.iter().find_map(|key| {
        let value = raw.get(*key)?;
        let parsed = to_number(value);
        if parsed.is_none() && !value.is_null() {
            tracing::warn!(field = *key, value = %value, "unparseable metric value dropped");
        }
        parsed.and_then(|n| apply_policy(n, policy))
    })
}

fn text(raw: &RawMetrics, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        let s = raw.get(*key)?.as_str()?.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("unknown") || s.eq_ignore_ascii_case("n/a") {
            None
        } else {
            Some(s.to_string())
        }
    })
}

fn positive_ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d > 0.0 => {
            let r = n / d;
            (r.is_finite() && r > 0.0).then_some(r)
        }
        _ => None,
    }
}

fn normalize_ticker(ticker: &str) -> Result<String, AnalysisError> {
    let t = ticker.trim().to_uppercase();
    if t.is_empty() {
        return Err(AnalysisError::InvalidArgument("ticker must not be empty".to_string()));
    }
    Ok(t)
}

/// Build a [`MetricRecord`] from one raw provider payload.
pub fn normalize_metrics(
    ticker: &str,
    raw: &RawMetrics,
    fetched_at: DateTime<Utc>,
) -> Result<MetricRecord, AnalysisError> {
    use ZeroPolicy::{Meaningful, Missing};

    let mut record = MetricRecord::new(normalize_ticker(ticker)?, fetched_at);

    record.company_name = text(raw, &["longName", "shortName", "company_name"]);
    record.sector = text(raw, &["sector"]);

    let price = field(raw, &["currentPrice", "regularMarketPrice", "current_price"], Missing);
    let market_cap = field(raw, &["marketCap", "market_cap"], Missing);
    let eps = field(raw, &["trailingEps", "eps"], Missing);
    let revenue = field(raw, &["totalRevenue", "revenue"], Missing);

    let shares = field(raw, &["sharesOutstanding", "shares_outstanding"], Missing)
        .or_else(|| positive_ratio(market_cap, price));

    let pe = field(raw, &["trailingPE", "pe_ratio"], Missing).or_else(|| match eps {
        Some(e) if e > 0.0 => positive_ratio(price, Some(e)),
        _ => None,
    });

    let ps = field(raw, &["priceToSalesTrailing12Months", "ps_ratio"], Missing)
        .or_else(|| positive_ratio(market_cap, revenue));

    // Book value: direct field, else equity / shares, else price / (P/B)
    let book_value = field(raw, &["bookValue", "book_value_per_share"], Missing)
        .or_else(|| {
            let equity = field(raw, &["totalStockholderEquity", "stockholders_equity"], Missing);
            match (equity, shares) {
                (Some(e), Some(s)) if s > 0.0 => Some(e / s),
                _ => None,
            }
        })
        .or_else(|| positive_ratio(price, field(raw, &["priceToBook", "price_to_book"], Missing)));

    let dividend_rate = field(
        raw,
        &["dividendRate", "trailingAnnualDividendRate", "dividend_rate"],
        Meaningful,
    );
    let dividend_yield = field(raw, &["dividendYield", "dividend_yield"], Meaningful).or_else(|| {
        match (dividend_rate, price) {
            (Some(rate), Some(p)) if p > 0.0 => Some(rate / p),
            _ => None,
        }
    });

    record.current_price = price;
    record.market_cap = market_cap;
    record.shares_outstanding = shares;
    record.pe_ratio = pe;
    record.forward_pe = field(raw, &["forwardPE", "forward_pe"], Missing);
    record.ps_ratio = ps;
    record.eps = eps;
    record.book_value_per_share = book_value;
    record.revenue = revenue;
    record.net_income = field(raw, &["netIncomeToCommon", "net_income", "earnings"], Missing);
    record.profit_margin = field(raw, &["profitMargins", "profit_margin"], Meaningful);
    record.operating_margin = field(raw, &["operatingMargins", "operating_margin"], Meaningful);
    record.revenue_growth = field(raw, &["revenueGrowth", "revenue_growth"], Missing);
    record.earnings_growth = field(raw, &["earningsGrowth", "earnings_growth"], Missing);
    record.dividend_rate = dividend_rate;
    record.dividend_yield = dividend_yield;

    tracing::debug!(ticker = %record.ticker, "normalized metrics");
    Ok(record)
}

fn parse_period_end(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Build a [`HistoricalSeries`] from raw rows. A row whose date cannot be
/// read fails the whole series; rows of an unsupported period type are
/// skipped. Duplicate periods keep the first occurrence.
pub fn normalize_history(ticker: &str, rows: &[RawPeriod]) -> Result<HistoricalSeries, AnalysisError> {
    let mut series = HistoricalSeries::new(normalize_ticker(ticker)?);

    for row in rows {
        let period_end = parse_period_end(&row.period_end_date).ok_or_else(|| {
            AnalysisError::InvalidData(format!(
                "{}: unreadable period end date '{}'",
                series.ticker(),
                row.period_end_date
            ))
        })?;
        let Some(period_type) = PeriodType::parse(&row.period_type) else {
            tracing::warn!(
                ticker = %series.ticker(),
                date = %row.period_end_date,
                period_type = %row.period_type,
                "skipping unsupported period type"
            );
            continue;
        };

        series.insert(FinancialPeriod {
            period_end,
            period_type,
            revenue: to_number(&row.revenue).and_then(|n| apply_policy(n, ZeroPolicy::Missing)),
            net_income: to_number(&row.net_income).and_then(|n| apply_policy(n, ZeroPolicy::Missing)),
        });
    }

    Ok(series)
}
