use crate::config::EvaluatorConfig;
use crate::error::OddsError;
use crate::evaluator::odds::{expected_value, implied_probability, round2};
use crate::evaluator::types::{BestOdds, ValueBet};
use tracing::debug;

/// Build a value bet from the best available price and a model probability.
///
/// Returns `Ok(None)` when the price is the absent sentinel or the EV falls
/// below the configured threshold.
pub fn value_bet(
    market_id: &str,
    best: &BestOdds,
    ai_probability: f64,
    config: &EvaluatorConfig,
) -> Result<Option<ValueBet>, OddsError> {
    if !best.is_available() {
        return Ok(None);
    }

    let ev = expected_value(ai_probability, best.price)?;
    if ev < config.min_ev_percent {
        debug!(
            "{} {}: EV {:.2}% below minimum {:.2}%",
            market_id, best.outcome, ev, config.min_ev_percent
        );
        return Ok(None);
    }

    let implied = implied_probability(best.price).ok_or(OddsError::InvalidPrice(best.price))?;

    Ok(Some(ValueBet {
        market: market_id.to_string(),
        outcome: best.outcome.clone(),
        point: best.point,
        ai_probability,
        implied_probability: implied,
        ev,
        best_odds: best.price,
        bookmaker: best.bookmaker.clone(),
        fair_odds: fair_odds(ai_probability),
        kelly_fraction: kelly_fraction(
            ai_probability,
            best.price,
            config.kelly_multiplier,
            config.max_stake_fraction,
        ),
    }))
}

/// Break-even decimal odds for a probability, rounded to 2 decimals.
pub fn fair_odds(probability: f64) -> Option<f64> {
    (probability > 0.0 && probability.is_finite()).then(|| round2(1.0 / probability))
}

/// Fractional Kelly stake for decimal odds.
/// Formula: f* = (bp - q) / b
/// where b = price - 1, p = win probability, q = 1 - p
pub fn kelly_fraction(probability: f64, price: f64, multiplier: f64, max_fraction: f64) -> f64 {
    let odds = price - 1.0;
    if odds <= 0.0 || !odds.is_finite() {
        return 0.0;
    }

    let lose_prob = 1.0 - probability;
    let kelly = (odds * probability - lose_prob) / odds;

    // No negative stakes
    (kelly * multiplier).max(0.0).min(max_fraction)
}
