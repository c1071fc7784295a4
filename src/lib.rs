//! Bookmaker odds evaluation: best prices, arbitrage detection and
//! expected value of bets against model probabilities.

pub mod config;
pub mod data;
pub mod error;
pub mod evaluator;
pub mod monitoring;
pub mod scan;

pub use data::types::{Market, MarketKind, Quote};
pub use error::OddsError;
pub use evaluator::odds::{best_line, best_odds, calculate_arbitrage, expected_value};
pub use evaluator::types::{ArbitrageResult, BestOdds, FeaturedLine, ValueBet};
