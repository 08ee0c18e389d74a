//! Consensus Aggregator
//!
//! Combines valid model targets into one equal-weighted fair value, scores
//! how tightly the models agree and maps the result to a recommendation.

use analysis_core::stats::{coefficient_of_variation, mean, min_max};
use analysis_core::{upside, ConsensusResult, ConsensusSummary, Recommendation, ValuationModelResult};
use tracing::debug;

use crate::config::ValuationConfig;

/// Agreement in [0, 100] from the coefficient of variation of the targets:
/// 100 at zero dispersion, falling linearly to 0 at `cv_ceiling`.
/// A single target has nothing to agree with and scores 0.
pub fn agreement_score(targets: &[f64], cv_ceiling: f64) -> f64 {
    if targets.len() < 2 {
        return 0.0;
    }
    match coefficient_of_variation(targets) {
        Some(cv) => (100.0 * (1.0 - cv / cv_ceiling)).clamp(0.0, 100.0),
        None => 0.0,
    }
}

/// Upside sets the tier; weak agreement lowers it.
///
/// Below moderate agreement the tier drops one step and is never better than
/// Hold, so any buy call needs at least moderate agreement. Between moderate
/// and high agreement a Strong Buy is held to Buy.
pub fn recommend(upside: f64, agreement: f64, config: &ValuationConfig) -> Recommendation {
    let base = if upside >= config.strong_buy_upside {
        Recommendation::StrongBuy
    } else if upside >= config.buy_upside {
        Recommendation::Buy
    } else if upside >= config.sell_upside {
        Recommendation::Hold
    } else {
        Recommendation::Sell
    };

    if agreement < config.moderate_agreement {
        base.downgrade().min(Recommendation::Hold)
    } else if base == Recommendation::StrongBuy && agreement < config.high_agreement {
        Recommendation::Buy
    } else {
        base
    }
}

/// Aggregates model results. Invalid results are kept in `models` for audit
/// but never contribute to the target. With no valid model the summary is
/// `None`; no placeholder target is produced.
pub fn build_consensus(
    results: Vec<ValuationModelResult>,
    current_price: Option<f64>,
    config: &ValuationConfig,
) -> ConsensusResult {
    let targets: Vec<f64> = results.iter().filter_map(|r| r.target_price()).collect();

    let summary = min_max(&targets).map(|(min_target, max_target)| {
        let target_price = mean(&targets);
        let agreement = agreement_score(&targets, config.agreement_cv_ceiling);
        let consensus_upside = upside(target_price, current_price);

        ConsensusSummary {
            target_price,
            upside: consensus_upside,
            agreement_score: agreement,
            min_target,
            max_target,
            valid_models: targets.len(),
            recommendation: consensus_upside.map(|u| recommend(u, agreement, config)),
        }
    });

    if summary.is_none() {
        debug!("No valid valuation model; consensus unavailable");
    }

    ConsensusResult {
        summary,
        models: results,
    }
}
