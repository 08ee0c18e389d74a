//! Policy parameters for scoring and valuation.
//!
//! None of these constants is a law of finance; they are tunable assumptions.
//! `ValuationConfig::default()` carries the house values and
//! `ValuationConfig::from_env()` lets a deployment override any of them
//! through `VALUATION_*` environment variables.

use analysis_core::AnalysisError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationConfig {
    /// Required annual return for dividend discounting (Gordon Growth)
    pub required_return: f64,
    /// Forces the dividend growth estimate instead of deriving it
    pub dividend_growth_override: Option<f64>,
    /// Dividend growth used when the sustainable rate cannot be derived
    pub default_dividend_growth: f64,

    /// Fair PEG ratio assumed by the PEG model
    pub fair_peg: f64,
    /// Earnings growth above this fraction is capped before pricing.
    /// Off by default.
    pub peg_growth_cap: Option<f64>,

    /// Sector median P/S ratios, keyed by provider sector name
    pub sector_ps_medians: BTreeMap<String, f64>,

    /// Projection horizon of the earnings/revenue growth and Monte Carlo models
    pub horizon_years: u32,
    pub earnings_growth_decay: f64,
    pub revenue_growth_decay: f64,
    /// Decayed growth never falls below this rate
    pub growth_floor: f64,
    pub default_terminal_pe: f64,
    pub max_terminal_pe: f64,
    pub default_terminal_ps: f64,
    pub max_terminal_ps: f64,
    /// Minimum profit margin assumed at maturity by the revenue model
    pub target_margin_floor: f64,

    pub dcf_fcf_growth: f64,
    pub dcf_discount_rate: f64,
    pub dcf_terminal_growth: f64,
    pub dcf_years: u32,
    /// Share of net income assumed to convert to free cash flow
    pub dcf_fcf_conversion: f64,
    /// FCF margin assumed for companies without positive earnings
    pub dcf_revenue_fcf_margin: f64,

    /// Annualized volatility of simulated price paths
    pub mc_volatility: f64,
    pub mc_simulations: u32,
    pub mc_seed: u64,
    pub mc_trading_days: u32,
    /// Expected return used when neither growth figure is positive
    pub mc_default_return: f64,

    /// Default CAGR lookback in years
    pub cagr_window_years: u32,
    /// Quarters of history scored for consistency
    pub consistency_window_quarters: usize,
    /// Higher values punish growth volatility harder
    pub consistency_volatility_scale: f64,

    /// Required CAGR up to `max(historical CAGR) * tolerance` counts as feasible
    pub feasibility_tolerance: f64,

    /// Coefficient of variation at which agreement reaches zero
    pub agreement_cv_ceiling: f64,
    /// Agreement at or above this is "high"
    pub high_agreement: f64,
    /// Agreement below this is "low" and downgrades the recommendation
    pub moderate_agreement: f64,
    pub strong_buy_upside: f64,
    pub buy_upside: f64,
    /// Upside below this is a Sell
    pub sell_upside: f64,
}

fn default_sector_ps_medians() -> BTreeMap<String, f64> {
    [
        ("Technology", 6.0),
        ("Communication Services", 3.0),
        ("Healthcare", 4.0),
        ("Financial Services", 3.0),
        ("Consumer Cyclical", 1.5),
        ("Consumer Defensive", 1.2),
        ("Industrials", 2.0),
        ("Energy", 1.2),
        ("Utilities", 2.5),
        ("Real Estate", 5.0),
        ("Basic Materials", 1.5),
    ]
    .into_iter()
    .map(|(sector, ps)| (sector.to_string(), ps))
    .collect()
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            required_return: 0.09,
            dividend_growth_override: None,
            default_dividend_growth: 0.03,
            fair_peg: 1.5,
            peg_growth_cap: None,
            sector_ps_medians: default_sector_ps_medians(),
            horizon_years: 5,
            earnings_growth_decay: 0.10,
            revenue_growth_decay: 0.15,
            growth_floor: 0.03,
            default_terminal_pe: 20.0,
            max_terminal_pe: 25.0,
            default_terminal_ps: 5.0,
            max_terminal_ps: 10.0,
            target_margin_floor: 0.15,
            dcf_fcf_growth: 0.10,
            dcf_discount_rate: 0.10,
            dcf_terminal_growth: 0.03,
            dcf_years: 10,
            dcf_fcf_conversion: 0.8,
            dcf_revenue_fcf_margin: 0.05,
            mc_volatility: 0.30,
            mc_simulations: 1000,
            mc_seed: 42,
            mc_trading_days: 252,
            mc_default_return: 0.08,
            cagr_window_years: 3,
            consistency_window_quarters: 12,
            consistency_volatility_scale: 10.0,
            feasibility_tolerance: 1.2,
            agreement_cv_ceiling: 1.0,
            high_agreement: 70.0,
            moderate_agreement: 40.0,
            strong_buy_upside: 0.25,
            buy_upside: 0.10,
            sell_upside: -0.10,
        }
    }
}

fn env_value<T: FromStr>(key: &str) -> Result<Option<T>, AnalysisError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AnalysisError::Config(format!("{} has invalid value '{}'", key, raw))),
        _ => Ok(None),
    }
}

fn overlay<T: FromStr>(target: &mut T, key: &str) -> Result<(), AnalysisError> {
    if let Some(value) = env_value(key)? {
        *target = value;
    }
    Ok(())
}

impl ValuationConfig {
    /// Defaults overlaid with any `VALUATION_*` environment variables.
    pub fn from_env() -> Result<Self, AnalysisError> {
        let mut c = Self::default();

        overlay(&mut c.required_return, "VALUATION_REQUIRED_RETURN")?;
        if let Some(g) = env_value::<f64>("VALUATION_DIVIDEND_GROWTH")? {
            c.dividend_growth_override = Some(g);
        }
        overlay(&mut c.default_dividend_growth, "VALUATION_DEFAULT_DIVIDEND_GROWTH")?;
        overlay(&mut c.fair_peg, "VALUATION_FAIR_PEG")?;
        if let Some(cap) = env_value::<f64>("VALUATION_PEG_GROWTH_CAP")? {
            c.peg_growth_cap = Some(cap);
        }
        overlay(&mut c.horizon_years, "VALUATION_HORIZON_YEARS")?;
        overlay(&mut c.dcf_discount_rate, "VALUATION_DCF_DISCOUNT_RATE")?;
        overlay(&mut c.dcf_terminal_growth, "VALUATION_DCF_TERMINAL_GROWTH")?;
        overlay(&mut c.dcf_fcf_growth, "VALUATION_DCF_FCF_GROWTH")?;
        overlay(&mut c.mc_volatility, "VALUATION_MC_VOLATILITY")?;
        overlay(&mut c.mc_simulations, "VALUATION_MC_SIMULATIONS")?;
        overlay(&mut c.mc_seed, "VALUATION_MC_SEED")?;
        overlay(&mut c.cagr_window_years, "VALUATION_CAGR_WINDOW_YEARS")?;
        overlay(&mut c.consistency_volatility_scale, "VALUATION_CONSISTENCY_VOLATILITY_SCALE")?;
        overlay(&mut c.feasibility_tolerance, "VALUATION_FEASIBILITY_TOLERANCE")?;
        overlay(&mut c.agreement_cv_ceiling, "VALUATION_AGREEMENT_CV_CEILING")?;

        c.validate()?;
        Ok(c)
    }

    /// Rejects parameter combinations that would make a formula meaningless.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let fail = |msg: &str| Err(AnalysisError::Config(msg.to_string()));

        // NaN slips through every ordered comparison below
        let numbers = [
            ("required_return", self.required_return),
            ("dividend_growth_override", self.dividend_growth_override.unwrap_or(0.0)),
            ("default_dividend_growth", self.default_dividend_growth),
            ("fair_peg", self.fair_peg),
            ("peg_growth_cap", self.peg_growth_cap.unwrap_or(0.0)),
            ("earnings_growth_decay", self.earnings_growth_decay),
            ("revenue_growth_decay", self.revenue_growth_decay),
            ("growth_floor", self.growth_floor),
            ("default_terminal_pe", self.default_terminal_pe),
            ("max_terminal_pe", self.max_terminal_pe),
            ("default_terminal_ps", self.default_terminal_ps),
            ("max_terminal_ps", self.max_terminal_ps),
            ("target_margin_floor", self.target_margin_floor),
            ("dcf_fcf_growth", self.dcf_fcf_growth),
            ("dcf_discount_rate", self.dcf_discount_rate),
            ("dcf_terminal_growth", self.dcf_terminal_growth),
            ("dcf_fcf_conversion", self.dcf_fcf_conversion),
            ("dcf_revenue_fcf_margin", self.dcf_revenue_fcf_margin),
            ("mc_volatility", self.mc_volatility),
            ("mc_default_return", self.mc_default_return),
            ("consistency_volatility_scale", self.consistency_volatility_scale),
            ("feasibility_tolerance", self.feasibility_tolerance),
            ("agreement_cv_ceiling", self.agreement_cv_ceiling),
            ("high_agreement", self.high_agreement),
            ("moderate_agreement", self.moderate_agreement),
            ("strong_buy_upside", self.strong_buy_upside),
            ("buy_upside", self.buy_upside),
            ("sell_upside", self.sell_upside),
        ];
        if let Some((name, _)) = numbers.iter().find(|(_, v)| !v.is_finite()) {
            return Err(AnalysisError::Config(format!("{} must be a finite number", name)));
        }
        if let Some((sector, _)) = self.sector_ps_medians.iter().find(|(_, v)| !(v.is_finite() && **v > 0.0)) {
            return Err(AnalysisError::Config(format!("sector P/S median for {} must be positive", sector)));
        }

        if self.required_return <= 0.0 {
            return fail("required_return must be positive");
        }
        if self.fair_peg <= 0.0 {
            return fail("fair_peg must be positive");
        }
        if self.horizon_years == 0 || self.dcf_years == 0 {
            return fail("projection horizons must be at least one year");
        }
        if self.mc_simulations == 0 || self.mc_trading_days == 0 {
            return fail("Monte Carlo needs at least one simulation and one step per year");
        }
        if self.mc_volatility < 0.0 {
            return fail("mc_volatility must not be negative");
        }
        if self.cagr_window_years == 0 {
            return fail("cagr_window_years must be at least one");
        }
        if self.consistency_window_quarters < 2 {
            return fail("consistency_window_quarters must be at least two");
        }
        if self.consistency_volatility_scale < 0.0 {
            return fail("consistency_volatility_scale must not be negative");
        }
        if self.feasibility_tolerance <= 0.0 {
            return fail("feasibility_tolerance must be positive");
        }
        if self.agreement_cv_ceiling <= 0.0 {
            return fail("agreement_cv_ceiling must be positive");
        }
        if self.moderate_agreement > self.high_agreement {
            return fail("moderate_agreement must not exceed high_agreement");
        }
        if !(self.sell_upside < self.buy_upside && self.buy_upside <= self.strong_buy_upside) {
            return fail("upside thresholds must satisfy sell < buy <= strong_buy");
        }
        Ok(())
    }
}
