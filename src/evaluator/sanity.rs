use chrono::{DateTime, Utc};
use crate::config::SanityConfig;
use crate::evaluator::types::{ArbitrageResult, ValueBet};
use tracing::warn;

/// Flags opportunities that are more likely bad data than real edges.
#[derive(Debug, Clone)]
pub struct SanityGuard {
    config: SanityConfig,
}

impl SanityGuard {
    pub fn new(config: SanityConfig) -> Self {
        Self { config }
    }

    pub fn check_value_bet(&self, bet: &ValueBet) -> Result<(), SanityError> {
        if bet.ev > self.config.max_plausible_ev_percent {
            warn!(
                "{} {} @ {:.2} ({}): EV {:.2}% looks like a data error",
                bet.market, bet.outcome, bet.best_odds, bet.bookmaker, bet.ev
            );
            return Err(SanityError::EvTooGoodToBeTrue(bet.ev));
        }
        Ok(())
    }

    pub fn check_arbitrage(&self, market_id: &str, result: &ArbitrageResult) -> Result<(), SanityError> {
        if result.margin_percent > self.config.max_plausible_margin_percent {
            warn!(
                "{}: arbitrage margin {:.2}% looks like a palpable error",
                market_id, result.margin_percent
            );
            return Err(SanityError::MarginTooGoodToBeTrue(result.margin_percent));
        }
        Ok(())
    }

    pub fn check_snapshot_age(
        &self,
        fetched_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), SanityError> {
        let age_secs = (now - fetched_at).num_seconds();
        let max_age = i64::try_from(self.config.max_snapshot_age_secs).unwrap_or(i64::MAX);
        if age_secs > max_age {
            return Err(SanityError::StaleSnapshot(age_secs));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SanityError {
    #[error("EV too good to be true: {0:.2}%")]
    EvTooGoodToBeTrue(f64),

    #[error("Arbitrage margin too good to be true: {0:.2}%")]
    MarginTooGoodToBeTrue(f64),

    #[error("Odds snapshot is stale: {0}s old")]
    StaleSnapshot(i64),
}
