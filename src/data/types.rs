use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::error::OddsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketKind {
    Moneyline,
    Totals,
    Spread,
}

/// Two-sided markets priced around a numeric line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineKind {
    Totals,
    Spread,
}

impl MarketKind {
    pub fn line_kind(&self) -> Option<LineKind> {
        match self {
            MarketKind::Moneyline => None,
            MarketKind::Totals => Some(LineKind::Totals),
            MarketKind::Spread => Some(LineKind::Spread),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketKind::Moneyline => "h2h",
            MarketKind::Totals => "totals",
            MarketKind::Spread => "spreads",
        }
    }
}

impl std::fmt::Display for MarketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LineKind {
    /// Line value a quote belongs to, seen from the first outcome's side.
    /// Totals share the point; spreads mirror it (home -1.5 vs away +1.5).
    pub fn line_key(&self, side: usize, point: f64) -> f64 {
        // + 0.0 folds -0.0 into 0.0
        match (self, side) {
            (LineKind::Spread, 1) => -point + 0.0,
            _ => point + 0.0,
        }
    }
}

/// A single bookmaker price in decimal odds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bookmaker: String,
    pub outcome: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<f64>,
}

impl Quote {
    pub fn new(bookmaker: impl Into<String>, outcome: impl Into<String>, price: f64) -> Self {
        Self {
            bookmaker: bookmaker.into(),
            outcome: outcome.into(),
            price,
            point: None,
        }
    }

    pub fn with_point(mut self, point: f64) -> Self {
        self.point = Some(point);
        self
    }
}

/// A decimal price must be finite and pay back more than the stake.
pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 1.0
}

/// Mutually exclusive outcomes of one event together with the quotes covering them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub event: String,
    pub kind: MarketKind,
    pub outcomes: Vec<String>,
    pub quotes: Vec<Quote>,
}

impl Market {
    pub fn new(
        id: impl Into<String>,
        event: impl Into<String>,
        kind: MarketKind,
        outcomes: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            event: event.into(),
            kind,
            outcomes,
            quotes: Vec::new(),
        }
    }

    pub fn has_outcome(&self, outcome: &str) -> bool {
        self.outcomes.iter().any(|o| o == outcome)
    }

    /// Add a quote, enforcing the market invariants.
    pub fn add_quote(&mut self, quote: Quote) -> Result<(), OddsError> {
        if !is_valid_price(quote.price) {
            return Err(OddsError::InvalidPrice(quote.price));
        }

        if !self.has_outcome(&quote.outcome) {
            return Err(OddsError::UnknownOutcome {
                market: self.id.clone(),
                outcome: quote.outcome,
            });
        }

        let duplicate = self.quotes.iter().any(|q| {
            q.bookmaker == quote.bookmaker && q.outcome == quote.outcome && q.point == quote.point
        });
        if duplicate {
            return Err(OddsError::DuplicateQuote {
                market: self.id.clone(),
                bookmaker: quote.bookmaker,
                outcome: quote.outcome,
            });
        }

        self.quotes.push(quote);
        Ok(())
    }

    pub fn outcome_refs(&self) -> Vec<&str> {
        self.outcomes.iter().map(String::as_str).collect()
    }
}

/// Label an outcome the way probability tables key it.
/// Totals: "Over 2.5". Spreads carry the sign: "Arsenal -1.5", "Chelsea +1.5".
pub fn outcome_label(kind: MarketKind, outcome: &str, point: Option<f64>) -> String {
    match (kind, point) {
        (MarketKind::Spread, Some(point)) => format!("{} {:+}", outcome, point),
        (_, Some(point)) => format!("{} {}", outcome, point),
        (_, None) => outcome.to_string(),
    }
}

/// Upstream model estimates of the true probability of an outcome.
pub trait ProbabilitySource {
    fn probability(&self, market_id: &str, outcome_label: &str) -> Option<f64>;
}

/// Model probabilities keyed by market id, then outcome label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProbabilityTable(pub HashMap<String, HashMap<String, f64>>);

impl ProbabilityTable {
    pub fn insert(&mut self, market_id: &str, outcome_label: &str, probability: f64) {
        self.0
            .entry(market_id.to_string())
            .or_default()
            .insert(outcome_label.to_string(), probability);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, f64)> {
        self.0.iter().flat_map(|(market, outcomes)| {
            outcomes
                .iter()
                .map(move |(outcome, p)| (market.as_str(), outcome.as_str(), *p))
        })
    }

    pub fn len(&self) -> usize {
        self.0.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProbabilitySource for ProbabilityTable {
    fn probability(&self, market_id: &str, outcome_label: &str) -> Option<f64> {
        self.0.get(market_id)?.get(outcome_label).copied()
    }
}
