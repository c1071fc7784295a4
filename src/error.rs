use thiserror::Error;

/// Contract violations raised by the odds evaluator and market construction.
///
/// Missing market data is never an error here: absent outcomes come back as
/// sentinel `BestOdds` and under-determined arbitrage as `None`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OddsError {
    #[error("Invalid decimal odds: {0} (must be finite and > 1.0)")]
    InvalidPrice(f64),

    #[error("Invalid probability: {0} (must be within [0, 1])")]
    InvalidProbability(f64),

    #[error("Outcome '{outcome}' is not part of market {market}")]
    UnknownOutcome { market: String, outcome: String },

    #[error("Duplicate quote from {bookmaker} for '{outcome}' in market {market}")]
    DuplicateQuote {
        market: String,
        bookmaker: String,
        outcome: String,
    },
}
