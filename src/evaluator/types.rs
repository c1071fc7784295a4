use serde::Serialize;
use crate::data::types::LineKind;

/// Best available price for one outcome.
///
/// A price of `0.0` with an empty bookmaker means no quote covered the outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestOdds {
    pub outcome: String,
    pub price: f64,
    pub bookmaker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point: Option<f64>,
}

impl BestOdds {
    pub fn absent(outcome: impl Into<String>) -> Self {
        Self {
            outcome: outcome.into(),
            price: 0.0,
            bookmaker: String::new(),
            point: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.price > 0.0 && !self.bookmaker.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArbitrageResult {
    pub is_arbitrage: bool,
    /// `(1 - sum) * 100`, rounded to 2 decimals. Negative means overround.
    pub margin_percent: f64,
    /// `sum * 100`, rounded to 2 decimals.
    pub total_implied_percent: f64,
    /// Unrounded sum of implied probabilities.
    pub implied_sum: f64,
    /// The valid prices the result was computed from.
    pub prices: Vec<f64>,
}

impl ArbitrageResult {
    /// Split `total` across outcomes in proportion to their implied probability.
    pub fn stakes(&self, total: f64) -> Vec<f64> {
        self.prices
            .iter()
            .map(|price| total * (1.0 / price) / self.implied_sum)
            .collect()
    }

    /// Payout of the proportional stake split, identical whichever outcome wins.
    pub fn guaranteed_return(&self, total: f64) -> f64 {
        total / self.implied_sum
    }
}

/// The line picked for arbitrage comparison in a two-sided line market.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeaturedLine {
    pub kind: LineKind,
    /// Line value from the first outcome's perspective.
    pub point: f64,
    pub sides: [BestOdds; 2],
}

impl FeaturedLine {
    pub fn prices(&self) -> [f64; 2] {
        [self.sides[0].price, self.sides[1].price]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueBet {
    pub market: String,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point: Option<f64>,
    pub ai_probability: f64,
    pub implied_probability: f64,
    /// Expected return in percent of stake.
    pub ev: f64,
    pub best_odds: f64,
    pub bookmaker: String,
    /// Break-even decimal odds for the model probability.
    pub fair_odds: Option<f64>,
    /// Suggested stake as a fraction of bankroll.
    pub kelly_fraction: f64,
}
