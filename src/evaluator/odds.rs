//! Core odds arithmetic: best prices, implied probability, arbitrage and EV.
//!
//! Every function here is pure. Missing data comes back as a sentinel
//! (`BestOdds::absent`, `None`) so one uncovered outcome never aborts the
//! evaluation of the rest of a snapshot.

use tracing::debug;
use crate::data::types::{is_valid_price, LineKind, Market};
use crate::error::OddsError;
use crate::evaluator::types::{ArbitrageResult, BestOdds, FeaturedLine};

/// Round half away from zero to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Implied probability of decimal odds, `None` for prices that aren't valid odds.
pub fn implied_probability(price: f64) -> Option<f64> {
    is_valid_price(price).then(|| 1.0 / price)
}

/// Best price per requested outcome across all bookmakers in the market.
///
/// Ties keep the first quote seen. Outcomes nobody quotes come back as
/// `BestOdds::absent`; callers must not run dependent calculations on them.
pub fn best_odds(market: &Market, outcomes: &[&str]) -> Vec<BestOdds> {
    debug_assert!(
        !outcomes.is_empty(),
        "best_odds called without outcomes for market {}",
        market.id
    );

    outcomes
        .iter()
        .map(|outcome| {
            let mut best = BestOdds::absent(*outcome);
            for quote in market
                .quotes
                .iter()
                .filter(|q| q.outcome == *outcome && is_valid_price(q.price))
            {
                if quote.price > best.price {
                    best = BestOdds {
                        outcome: quote.outcome.clone(),
                        price: quote.price,
                        bookmaker: quote.bookmaker.clone(),
                        point: quote.point,
                    };
                }
            }
            best
        })
        .collect()
}

/// Arbitrage check over one price per outcome of an exhaustive outcome set.
///
/// Prices that aren't valid decimal odds are dropped first. Returns `None`
/// when fewer than two prices remain, since a partial set can't be evaluated.
pub fn calculate_arbitrage(prices: &[f64]) -> Option<ArbitrageResult> {
    let valid: Vec<f64> = prices.iter().copied().filter(|p| is_valid_price(*p)).collect();
    if valid.len() < 2 {
        debug!("Arbitrage not computable: {} valid prices", valid.len());
        return None;
    }

    let implied_sum: f64 = valid.iter().map(|p| 1.0 / p).sum();

    Some(ArbitrageResult {
        // decided on the unrounded sum
        is_arbitrage: implied_sum < 1.0,
        margin_percent: round2((1.0 - implied_sum) * 100.0),
        total_implied_percent: round2(implied_sum * 100.0),
        implied_sum,
        prices: valid,
    })
}

/// Featured line of a two-sided line market.
///
/// Quotes are grouped by line value (spreads mirrored onto the first side),
/// keeping the best price per side per line. The first line, in order of
/// appearance, with both sides quoted is returned.
pub fn best_line(market: &Market, kind: LineKind) -> Option<FeaturedLine> {
    if market.kind.line_kind() != Some(kind) {
        debug!("Market {} is {}, not a {:?} market", market.id, market.kind, kind);
        return None;
    }
    if market.outcomes.len() != 2 {
        debug!("Market {} has {} outcomes, need 2 for a line", market.id, market.outcomes.len());
        return None;
    }

    let mut lines: Vec<(f64, [BestOdds; 2])> = Vec::new();

    for quote in &market.quotes {
        let Some(point) = quote.point else { continue };
        if !is_valid_price(quote.price) {
            continue;
        }
        let Some(side) = market.outcomes.iter().position(|o| *o == quote.outcome) else {
            continue;
        };

        let key = kind.line_key(side, point);
        let index = match lines.iter().position(|(line, _)| *line == key) {
            Some(index) => index,
            None => {
                lines.push((
                    key,
                    [
                        BestOdds::absent(market.outcomes[0].as_str()),
                        BestOdds::absent(market.outcomes[1].as_str()),
                    ],
                ));
                lines.len() - 1
            }
        };

        let slot = &mut lines[index].1[side];
        if quote.price > slot.price {
            *slot = BestOdds {
                outcome: quote.outcome.clone(),
                price: quote.price,
                bookmaker: quote.bookmaker.clone(),
                point: Some(point),
            };
        }
    }

    lines
        .into_iter()
        .find(|(_, sides)| sides.iter().all(BestOdds::is_available))
        .map(|(point, sides)| FeaturedLine { kind, point, sides })
}

/// Expected return of a bet in percent: `(p * price - 1) * 100`.
///
/// Negative EV is a valid result. Inputs outside the contract (probability
/// outside `[0, 1]`, price not valid decimal odds) are reported as errors
/// rather than coerced.
pub fn expected_value(ai_probability: f64, price: f64) -> Result<f64, OddsError> {
    if !ai_probability.is_finite() || !(0.0..=1.0).contains(&ai_probability) {
        return Err(OddsError::InvalidProbability(ai_probability));
    }
    if !is_valid_price(price) {
        return Err(OddsError::InvalidPrice(price));
    }

    Ok((ai_probability * price - 1.0) * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::{MarketKind, Quote};

    fn moneyline(quotes: Vec<Quote>) -> Market {
        let mut market = Market::new(
            "evt1:h2h",
            "Home vs Away",
            MarketKind::Moneyline,
            vec!["Home".into(), "Draw".into(), "Away".into()],
        );
        market.quotes = quotes;
        market
    }

    fn totals(quotes: Vec<Quote>) -> Market {
        let mut market = Market::new(
            "evt1:totals",
            "Home vs Away",
            MarketKind::Totals,
            vec!["Over".into(), "Under".into()],
        );
        market.quotes = quotes;
        market
    }

    #[test]
    fn test_arbitrage_equal_prices_overround() {
        let result = calculate_arbitrage(&[2.0, 2.0, 2.0]).unwrap();

        assert_eq!(result.total_implied_percent, 150.00);
        assert_eq!(result.margin_percent, -50.00);
        assert!(!result.is_arbitrage);
    }

    #[test]
    fn test_arbitrage_detected() {
        let result = calculate_arbitrage(&[4.5, 4.0, 2.5]).unwrap();

        assert!(result.is_arbitrage);
        assert!((result.implied_sum - 0.872222).abs() < 1e-6);
        assert_eq!(result.margin_percent, 12.78);
        assert_eq!(result.total_implied_percent, 87.22);
    }

    #[test]
    fn test_arbitrage_equal_prices_property() {
        for k in 2..=3usize {
            for n in [1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 10.0] {
                let prices = vec![n; k];
                let result = calculate_arbitrage(&prices).unwrap();
                let expected = round2(k as f64 / n * 100.0);

                assert_eq!(result.total_implied_percent, expected, "k={} n={}", k, n);
                assert_eq!(result.is_arbitrage, n > k as f64, "k={} n={}", k, n);
            }
        }
    }

    #[test]
    fn test_arbitrage_single_price_not_computable() {
        assert!(calculate_arbitrage(&[1.5]).is_none());
        assert!(calculate_arbitrage(&[]).is_none());
    }

    #[test]
    fn test_arbitrage_filters_invalid_prices() {
        // Absent sentinels and sub-evens prices are dropped before summing
        assert!(calculate_arbitrage(&[0.0, 2.5]).is_none());
        assert!(calculate_arbitrage(&[0.8, f64::NAN, 3.0]).is_none());

        let result = calculate_arbitrage(&[0.0, 2.1, 2.1, -1.0]).unwrap();
        assert_eq!(result.prices, vec![2.1, 2.1]);
        assert!(result.is_arbitrage);
    }

    #[test]
    fn test_arbitrage_flag_uses_unrounded_sum() {
        // Sum is just under 1.0 but rounds to 100.00%
        let result = calculate_arbitrage(&[2.000001, 2.000001]).unwrap();
        assert!(result.is_arbitrage);
        assert_eq!(result.total_implied_percent, 100.00);
        assert_eq!(result.margin_percent, 0.00);

        let even = calculate_arbitrage(&[2.0, 2.0]).unwrap();
        assert!(!even.is_arbitrage);
    }

    #[test]
    fn test_arbitrage_stakes_equalise_payout() {
        let result = calculate_arbitrage(&[4.5, 4.0, 2.5]).unwrap();
        let stakes = result.stakes(100.0);

        assert!((stakes.iter().sum::<f64>() - 100.0).abs() < 1e-9);
        let payout = result.guaranteed_return(100.0);
        for (stake, price) in stakes.iter().zip(&result.prices) {
            assert!((stake * price - payout).abs() < 1e-9);
        }
        assert!(payout > 100.0);
    }

    #[test]
    fn test_best_odds_picks_max_and_sentinel() {
        let market = moneyline(vec![
            Quote::new("BookA", "Home", 2.1),
            Quote::new("BookB", "Home", 2.3),
            Quote::new("BookA", "Draw", 3.0),
        ]);

        let best = best_odds(&market, &["Home", "Draw", "Away"]);

        assert_eq!(best[0].price, 2.3);
        assert_eq!(best[0].bookmaker, "BookB");
        assert_eq!(best[1].price, 3.0);
        assert_eq!(best[1].bookmaker, "BookA");
        assert_eq!(best[2], BestOdds::absent("Away"));
        assert!(!best[2].is_available());
    }

    #[test]
    fn test_best_odds_tie_keeps_first_seen() {
        let market = moneyline(vec![
            Quote::new("BookA", "Home", 2.3),
            Quote::new("BookB", "Home", 2.3),
        ]);
        assert_eq!(best_odds(&market, &["Home", "Away"])[0].bookmaker, "BookA");

        let reversed = moneyline(vec![
            Quote::new("BookB", "Home", 2.3),
            Quote::new("BookA", "Home", 2.3),
        ]);
        assert_eq!(best_odds(&reversed, &["Home", "Away"])[0].bookmaker, "BookB");
    }

    #[test]
    fn test_best_odds_is_maximum_of_inputs() {
        let quotes = vec![
            Quote::new("A", "Home", 1.95),
            Quote::new("B", "Home", 2.05),
            Quote::new("C", "Home", 2.01),
            Quote::new("A", "Away", 3.9),
            Quote::new("B", "Away", 3.75),
            Quote::new("A", "Draw", 3.3),
            Quote::new("C", "Draw", 3.4),
        ];
        let market = moneyline(quotes.clone());
        let best = best_odds(&market, &["Home", "Draw", "Away"]);

        for entry in &best {
            let max = quotes
                .iter()
                .filter(|q| q.outcome == entry.outcome)
                .map(|q| q.price)
                .fold(f64::MIN, f64::max);
            assert_eq!(entry.price, max);
            assert!(quotes
                .iter()
                .filter(|q| q.outcome == entry.outcome)
                .all(|q| entry.price >= q.price));
        }
    }

    #[test]
    fn test_evaluator_is_idempotent() {
        let market = moneyline(vec![
            Quote::new("BookA", "Home", 2.1),
            Quote::new("BookB", "Draw", 3.3),
            Quote::new("BookC", "Away", 3.8),
        ]);

        assert_eq!(
            best_odds(&market, &["Home", "Draw", "Away"]),
            best_odds(&market, &["Home", "Draw", "Away"])
        );

        let first = calculate_arbitrage(&[2.1, 3.3, 3.8]).unwrap();
        let second = calculate_arbitrage(&[2.1, 3.3, 3.8]).unwrap();
        assert_eq!(first.implied_sum.to_bits(), second.implied_sum.to_bits());
        assert_eq!(first, second);

        let ev_a = expected_value(0.47, 2.1).unwrap();
        let ev_b = expected_value(0.47, 2.1).unwrap();
        assert_eq!(ev_a.to_bits(), ev_b.to_bits());
    }

    #[test]
    fn test_expected_value() {
        assert!((expected_value(0.5, 2.2).unwrap() - 10.0).abs() < 1e-9);
        assert!((expected_value(0.3, 2.2).unwrap() + 34.0).abs() < 1e-9);
        assert!((expected_value(0.0, 3.0).unwrap() + 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_expected_value_rejects_out_of_contract_inputs() {
        assert_eq!(expected_value(1.2, 2.0), Err(OddsError::InvalidProbability(1.2)));
        assert_eq!(expected_value(-0.1, 2.0), Err(OddsError::InvalidProbability(-0.1)));
        assert!(matches!(
            expected_value(f64::NAN, 2.0),
            Err(OddsError::InvalidProbability(_))
        ));
        assert_eq!(expected_value(0.5, 1.0), Err(OddsError::InvalidPrice(1.0)));
        assert_eq!(expected_value(0.5, 0.0), Err(OddsError::InvalidPrice(0.0)));
    }

    #[test]
    fn test_implied_probability() {
        assert_eq!(implied_probability(2.0), Some(0.5));
        assert_eq!(implied_probability(4.0), Some(0.25));
        assert_eq!(implied_probability(1.0), None);
        assert_eq!(implied_probability(f64::INFINITY), None);
    }

    #[test]
    fn test_best_line_first_complete_line() {
        let market = totals(vec![
            Quote::new("A", "Over", 1.9).with_point(3.5),
            Quote::new("A", "Over", 1.8).with_point(2.5),
            Quote::new("B", "Under", 2.05).with_point(2.5),
            Quote::new("B", "Over", 1.85).with_point(2.5),
            Quote::new("C", "Under", 1.95).with_point(3.5),
        ]);

        let line = best_line(&market, LineKind::Totals).unwrap();

        // 3.5 appears first and completes later, so it is still featured
        assert_eq!(line.point, 3.5);
        assert_eq!(line.prices(), [1.9, 1.95]);
        assert_eq!(line.sides[1].bookmaker, "C");
    }

    #[test]
    fn test_best_line_keeps_best_price_per_side() {
        let market = totals(vec![
            Quote::new("A", "Over", 1.8).with_point(2.5),
            Quote::new("B", "Over", 1.92).with_point(2.5),
            Quote::new("C", "Under", 2.0).with_point(2.5),
            Quote::new("D", "Under", 1.97).with_point(2.5),
        ]);

        let line = best_line(&market, LineKind::Totals).unwrap();
        assert_eq!(line.sides[0].bookmaker, "B");
        assert_eq!(line.sides[1].bookmaker, "C");
        assert_eq!(line.sides[0].point, Some(2.5));
    }

    #[test]
    fn test_best_line_skips_incomplete_lines() {
        let market = totals(vec![
            Quote::new("A", "Over", 1.9).with_point(1.5),
            Quote::new("A", "Over", 1.8).with_point(2.5),
            Quote::new("B", "Under", 2.05).with_point(2.5),
        ]);
        assert_eq!(best_line(&market, LineKind::Totals).unwrap().point, 2.5);

        let one_sided = totals(vec![Quote::new("A", "Over", 1.9).with_point(1.5)]);
        assert!(best_line(&one_sided, LineKind::Totals).is_none());
    }

    #[test]
    fn test_best_line_mirrors_spreads() {
        let mut market = Market::new(
            "evt1:spreads",
            "Home vs Away",
            MarketKind::Spread,
            vec!["Home".into(), "Away".into()],
        );
        market.quotes = vec![
            Quote::new("A", "Home", 2.1).with_point(-1.5),
            Quote::new("B", "Away", 1.8).with_point(-1.5),
            Quote::new("C", "Away", 2.0).with_point(1.5),
        ];

        let line = best_line(&market, LineKind::Spread).unwrap();
        assert_eq!(line.point, -1.5);
        assert_eq!(line.sides[1].bookmaker, "C");
        assert_eq!(line.sides[1].point, Some(1.5));
    }

    #[test]
    fn test_best_line_wrong_kind() {
        let market = totals(vec![
            Quote::new("A", "Over", 1.9).with_point(2.5),
            Quote::new("B", "Under", 1.9).with_point(2.5),
        ]);
        assert!(best_line(&market, LineKind::Spread).is_none());
        assert!(best_line(&moneyline(vec![]), LineKind::Totals).is_none());
    }
}
