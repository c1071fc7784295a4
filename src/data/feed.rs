use chrono::{DateTime, Utc};
use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::Path;
use tracing::{debug, warn};
use crate::data::types::{Market, MarketKind, ProbabilityTable, Quote};

/// One odds snapshot as delivered by the odds feed.
#[derive(Debug, Clone, Deserialize)]
pub struct OddsSnapshot {
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub events: Vec<FeedEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedEvent {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub commence_time: Option<DateTime<Utc>>,
    /// Moneyline without a draw outcome.
    #[serde(default)]
    pub two_way: bool,
    #[serde(default)]
    pub bookmakers: Vec<FeedBookmaker>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedBookmaker {
    pub name: String,
    #[serde(default)]
    pub h2h: Labelled<FeedPrice>,
    #[serde(default)]
    pub totals: Labelled<OneOrMany<FeedLine>>,
    #[serde(default)]
    pub spreads: Labelled<OneOrMany<FeedLine>>,
}

/// Entries keyed by outcome label, kept in the order the feed lists them.
#[derive(Debug, Clone)]
pub struct Labelled<T>(pub Vec<(String, T)>);

impl<T> Default for Labelled<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> Labelled<T> {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(label, entry)| (label.as_str(), entry))
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Labelled<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LabelledVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for LabelledVisitor<T> {
            type Value = Labelled<T>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of outcome labels to quotes")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((label, entry)) = map.next_entry::<String, T>()? {
                    entries.push((label, entry));
                }
                Ok(Labelled(entries))
            }
        }

        deserializer.deserialize_map(LabelledVisitor(PhantomData))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedPrice {
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedLine {
    #[serde(default)]
    pub point: Option<f64>,
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    fn to_vec(&self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item.clone()],
            OneOrMany::Many(items) => items.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid label pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Counts from turning a snapshot into markets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub events: usize,
    pub markets: usize,
    pub accepted: usize,
    pub rejected: usize,
}

/// Splits labels like "Over 2.5" or "Arsenal -1.5" into outcome and point.
pub struct LabelParser {
    re: Regex,
}

impl LabelParser {
    pub fn new() -> Result<Self, FeedError> {
        Ok(Self {
            re: Regex::new(r"^(.*\S)\s+([+-]?\d+(?:\.\d+)?)$")?,
        })
    }

    pub fn split<'a>(&self, label: &'a str) -> (&'a str, Option<f64>) {
        let label = label.trim();
        match self.re.captures(label) {
            Some(cap) => {
                let outcome = cap.get(1).map_or(label, |m| m.as_str());
                let point = cap.get(2).and_then(|m| m.as_str().parse::<f64>().ok());
                match point {
                    Some(point) => (outcome, Some(point)),
                    None => (label, None),
                }
            }
            None => (label, None),
        }
    }
}

pub fn load_snapshot(path: impl AsRef<Path>) -> Result<OddsSnapshot, FeedError> {
    let path = path.as_ref();
    let contents = read(path)?;
    serde_json::from_str(&contents).map_err(|source| FeedError::Json {
        path: path.display().to_string(),
        source,
    })
}

pub fn load_probabilities(path: impl AsRef<Path>) -> Result<ProbabilityTable, FeedError> {
    let path = path.as_ref();
    let contents = read(path)?;
    serde_json::from_str(&contents).map_err(|source| FeedError::Json {
        path: path.display().to_string(),
        source,
    })
}

fn read(path: &Path) -> Result<String, FeedError> {
    fs::read_to_string(path).map_err(|source| FeedError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Convert a feed snapshot into validated markets.
///
/// Each event yields a moneyline, totals and spreads market when quoted.
/// Quotes that break market invariants are dropped and counted.
pub fn build_markets(snapshot: &OddsSnapshot) -> Result<(Vec<Market>, IngestStats), FeedError> {
    let parser = LabelParser::new()?;
    let mut stats = IngestStats {
        events: snapshot.events.len(),
        ..IngestStats::default()
    };
    let mut markets = Vec::new();

    for event in &snapshot.events {
        let description = format!("{} vs {}", event.home_team, event.away_team);

        let mut moneyline_outcomes = vec![event.home_team.clone()];
        if !event.two_way {
            moneyline_outcomes.push("Draw".to_string());
        }
        moneyline_outcomes.push(event.away_team.clone());

        let mut moneyline = Market::new(
            format!("{}:{}", event.id, MarketKind::Moneyline),
            description.as_str(),
            MarketKind::Moneyline,
            moneyline_outcomes,
        );
        let mut totals = Market::new(
            format!("{}:{}", event.id, MarketKind::Totals),
            description.as_str(),
            MarketKind::Totals,
            vec!["Over".to_string(), "Under".to_string()],
        );
        let mut spreads = Market::new(
            format!("{}:{}", event.id, MarketKind::Spread),
            description.as_str(),
            MarketKind::Spread,
            vec![event.home_team.clone(), event.away_team.clone()],
        );

        for bookmaker in &event.bookmakers {
            for (label, entry) in bookmaker.h2h.iter() {
                let quote = Quote::new(&bookmaker.name, canonical(&moneyline, label), entry.price);
                ingest(&mut moneyline, quote, &mut stats);
            }

            for (market, lines) in [(&mut totals, &bookmaker.totals), (&mut spreads, &bookmaker.spreads)] {
                for (label, entries) in lines.iter() {
                    // a label that already names an outcome carries no line
                    let (outcome, label_point) = if market.has_outcome(&canonical(market, label)) {
                        (label, None)
                    } else {
                        parser.split(label)
                    };

                    for entry in entries.to_vec() {
                        let point = match (entry.point, label_point) {
                            (Some(point), Some(parsed)) if point != parsed => {
                                warn!(
                                    "{}: {} quoted '{}' with point {}, skipping",
                                    market.id, bookmaker.name, label, point
                                );
                                stats.rejected += 1;
                                continue;
                            }
                            (Some(point), _) | (None, Some(point)) => point,
                            (None, None) => {
                                warn!(
                                    "{}: {} quoted '{}' without a line, skipping",
                                    market.id, bookmaker.name, label
                                );
                                stats.rejected += 1;
                                continue;
                            }
                        };

                        let quote = Quote::new(&bookmaker.name, canonical(market, outcome), entry.price)
                            .with_point(point);
                        ingest(market, quote, &mut stats);
                    }
                }
            }
        }

        for market in [moneyline, totals, spreads] {
            if market.quotes.is_empty() {
                debug!("{}: no quotes, dropping", market.id);
                continue;
            }
            markets.push(market);
        }
    }

    stats.markets = markets.len();
    Ok((markets, stats))
}

/// Match a feed label to the market's outcome name, ignoring case.
fn canonical(market: &Market, label: &str) -> String {
    market
        .outcomes
        .iter()
        .find(|o| o.eq_ignore_ascii_case(label.trim()))
        .cloned()
        .unwrap_or_else(|| label.trim().to_string())
}

fn ingest(market: &mut Market, quote: Quote, stats: &mut IngestStats) {
    let bookmaker = quote.bookmaker.clone();
    match market.add_quote(quote) {
        Ok(()) => stats.accepted += 1,
        Err(e) => {
            warn!("Rejected quote from {}: {}", bookmaker, e);
            stats.rejected += 1;
        }
    }
}
