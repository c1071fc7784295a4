//! One refresh cycle: evaluate every market of a snapshot into a report.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use crate::config::EvaluatorConfig;
use crate::data::types::{outcome_label, Market, MarketKind, ProbabilitySource};
use crate::evaluator::odds::{best_line, best_odds, calculate_arbitrage};
use crate::evaluator::sanity::SanityGuard;
use crate::evaluator::types::{ArbitrageResult, BestOdds, ValueBet};
use crate::evaluator::value::value_bet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketArbitrage {
    pub market_id: String,
    pub event: String,
    pub kind: MarketKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point: Option<f64>,
    pub legs: Vec<BestOdds>,
    pub result: ArbitrageResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub generated_at: DateTime<Utc>,
    pub value_bets: Vec<ValueBet>,
    /// Every market with a computable arbitrage check, profitable or not.
    pub arbitrages: Vec<MarketArbitrage>,
    pub markets_scanned: usize,
    pub markets_skipped: usize,
    pub flagged: usize,
}

impl ScanReport {
    pub fn profitable_arbitrages(&self) -> impl Iterator<Item = &MarketArbitrage> {
        self.arbitrages.iter().filter(|a| a.result.is_arbitrage)
    }
}

pub struct Scanner {
    config: EvaluatorConfig,
    guard: SanityGuard,
}

impl Scanner {
    pub fn new(config: EvaluatorConfig, guard: SanityGuard) -> Self {
        Self { config, guard }
    }

    pub fn scan(
        &self,
        markets: &[Market],
        probabilities: &impl ProbabilitySource,
        now: DateTime<Utc>,
    ) -> ScanReport {
        let mut report = ScanReport {
            generated_at: now,
            value_bets: Vec::new(),
            arbitrages: Vec::new(),
            markets_scanned: markets.len(),
            markets_skipped: 0,
            flagged: 0,
        };

        for market in markets {
            let (legs, point) = match market.kind.line_kind() {
                None => (best_odds(market, &market.outcome_refs()), None),
                Some(kind) => match best_line(market, kind) {
                    Some(line) => (line.sides.to_vec(), Some(line.point)),
                    None => {
                        debug!("{}: no line quoted on both sides", market.id);
                        report.markets_skipped += 1;
                        continue;
                    }
                },
            };

            let arbitrage = self.evaluate_arbitrage(market, &legs, point, &mut report);
            let value_bets = self.evaluate_value(market, &legs, probabilities, &mut report);

            if !arbitrage && value_bets == 0 && !legs.iter().any(BestOdds::is_available) {
                report.markets_skipped += 1;
            }
        }

        info!(
            "Scanned {} markets: {} value bets, {} arbitrage checks ({} profitable), {} skipped, {} flagged",
            report.markets_scanned,
            report.value_bets.len(),
            report.arbitrages.len(),
            report.profitable_arbitrages().count(),
            report.markets_skipped,
            report.flagged
        );

        report
    }

    /// Arbitrage needs a price for every outcome; a partial set would
    /// overstate the margin.
    fn evaluate_arbitrage(
        &self,
        market: &Market,
        legs: &[BestOdds],
        point: Option<f64>,
        report: &mut ScanReport,
    ) -> bool {
        if !legs.iter().all(BestOdds::is_available) {
            debug!("{}: incomplete outcome set, arbitrage suppressed", market.id);
            return false;
        }

        let prices: Vec<f64> = legs.iter().map(|leg| leg.price).collect();
        let Some(result) = calculate_arbitrage(&prices) else {
            return false;
        };

        if self.guard.check_arbitrage(&market.id, &result).is_err() {
            report.flagged += 1;
            return false;
        }

        if result.is_arbitrage {
            info!(
                "Arbitrage on {} ({}): margin {:.2}%, implied {:.2}%",
                market.event, market.id, result.margin_percent, result.total_implied_percent
            );
        }

        report.arbitrages.push(MarketArbitrage {
            market_id: market.id.clone(),
            event: market.event.clone(),
            kind: market.kind,
            point,
            legs: legs.to_vec(),
            result,
        });
        true
    }

    fn evaluate_value(
        &self,
        market: &Market,
        legs: &[BestOdds],
        probabilities: &impl ProbabilitySource,
        report: &mut ScanReport,
    ) -> usize {
        let mut found = 0;

        for leg in legs.iter().filter(|leg| leg.is_available()) {
            let label = outcome_label(market.kind, &leg.outcome, leg.point);
            let Some(probability) = probabilities.probability(&market.id, &label) else {
                continue;
            };

            match value_bet(&market.id, leg, probability, &self.config) {
                Ok(Some(bet)) => {
                    if self.guard.check_value_bet(&bet).is_err() {
                        report.flagged += 1;
                        continue;
                    }
                    info!(
                        "Value bet: {} {} @ {:.2} ({}) EV {:.2}% model {:.1}% implied {:.1}%",
                        market.event,
                        label,
                        bet.best_odds,
                        bet.bookmaker,
                        bet.ev,
                        bet.ai_probability * 100.0,
                        bet.implied_probability * 100.0
                    );
                    report.value_bets.push(bet);
                    found += 1;
                }
                Ok(None) => {}
                Err(e) => warn!("{} {}: {}", market.id, label, e),
            }
        }

        found
    }
}
