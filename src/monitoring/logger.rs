use anyhow::Result;
use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use crate::evaluator::types::{BestOdds, ValueBet};
use crate::scan::{MarketArbitrage, ScanReport};

const HEADER: &str = "timestamp,type,market_id,outcome,point,bookmaker,price,ai_probability,implied_probability,ev_pct,margin_pct,implied_total_pct,kelly_fraction";

/// Append-only CSV trail of every opportunity a refresh reported.
pub struct CsvLogger {
    log_path: String,
}

impl CsvLogger {
    pub fn new(log_path: String) -> Result<Self> {
        // Create CSV file with headers if it doesn't exist
        if !std::path::Path::new(&log_path).exists() {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .open(&log_path)?;

            writeln!(file, "{}", HEADER)?;
        }

        Ok(Self { log_path })
    }

    pub fn log_report(&self, report: &ScanReport) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.log_path)?;

        for bet in &report.value_bets {
            writeln!(file, "{}", value_bet_row(report.generated_at, bet))?;
        }
        for arb in report.profitable_arbitrages() {
            writeln!(file, "{}", arbitrage_row(report.generated_at, arb))?;
        }

        Ok(())
    }

    /// Log a free-form event
    pub fn log_event(&self, event: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.log_path)?;

        writeln!(
            file,
            "{},EVENT,,{},,,,,,,,,",
            Utc::now().to_rfc3339(),
            escape(event)
        )?;

        Ok(())
    }
}

fn value_bet_row(at: DateTime<Utc>, bet: &ValueBet) -> String {
    format!(
        "{},VALUE,{},{},{},{},{:.2},{:.4},{:.4},{:.2},,,{:.4}",
        at.to_rfc3339(),
        escape(&bet.market),
        escape(&bet.outcome),
        bet.point.map(|p| p.to_string()).unwrap_or_default(),
        escape(&bet.bookmaker),
        bet.best_odds,
        bet.ai_probability,
        bet.implied_probability,
        bet.ev,
        bet.kelly_fraction
    )
}

fn arbitrage_row(at: DateTime<Utc>, arb: &MarketArbitrage) -> String {
    format!(
        "{},ARB,{},{},{},{},{},,,,{:.2},{:.2},",
        at.to_rfc3339(),
        escape(&arb.market_id),
        escape(&join_legs(&arb.legs, |leg| leg.outcome.clone())),
        arb.point.map(|p| p.to_string()).unwrap_or_default(),
        escape(&join_legs(&arb.legs, |leg| leg.bookmaker.clone())),
        join_legs(&arb.legs, |leg| format!("{:.2}", leg.price)),
        arb.result.margin_percent,
        arb.result.total_implied_percent
    )
}

fn join_legs(legs: &[BestOdds], field: impl Fn(&BestOdds) -> String) -> String {
    legs.iter().map(field).collect::<Vec<_>>().join("|")
}

/// Quote a field when it contains CSV metacharacters.
fn escape(field: &str) -> String {
    if field.contains(&[',', '"', '\n'][..]) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::MarketKind;
    use crate::evaluator::odds::calculate_arbitrage;

    fn report() -> ScanReport {
        let legs = vec![
            BestOdds {
                outcome: "Over".to_string(),
                price: 2.1,
                bookmaker: "A".to_string(),
                point: Some(2.5),
            },
            BestOdds {
                outcome: "Under".to_string(),
                price: 2.05,
                bookmaker: "B".to_string(),
                point: Some(2.5),
            },
        ];
        ScanReport {
            generated_at: Utc::now(),
            value_bets: vec![ValueBet {
                market: "epl-001:h2h".to_string(),
                outcome: "Arsenal".to_string(),
                point: None,
                ai_probability: 0.5,
                implied_probability: 1.0 / 2.2,
                ev: 10.0,
                best_odds: 2.2,
                bookmaker: "Bet365".to_string(),
                fair_odds: Some(2.0),
                kelly_fraction: 0.02,
            }],
            arbitrages: vec![MarketArbitrage {
                market_id: "epl-001:totals".to_string(),
                event: "Arsenal vs Chelsea".to_string(),
                kind: MarketKind::Totals,
                point: Some(2.5),
                legs,
                result: calculate_arbitrage(&[2.1, 2.05]).unwrap(),
            }],
            markets_scanned: 2,
            markets_skipped: 0,
            flagged: 0,
        }
    }

    #[test]
    fn test_logger_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opps.csv").display().to_string();

        CsvLogger::new(path.clone()).unwrap();
        CsvLogger::new(path.clone()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.starts_with("timestamp,type"));
    }

    #[test]
    fn test_logger_writes_report_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opps.csv").display().to_string();
        let logger = CsvLogger::new(path.clone()).unwrap();

        logger.log_report(&report()).unwrap();
        logger.log_event("snapshot stale, skipped").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].contains(",VALUE,epl-001:h2h,Arsenal,,Bet365,2.20,0.5000,0.4545,10.00,,,0.0200"));
        assert!(lines[2].contains(",ARB,epl-001:totals,Over|Under,2.5,A|B,2.10|2.05,,,,3.60,96.40,"));
        assert!(lines[3].contains(",EVENT,,\"snapshot stale, skipped\","));

        let columns = HEADER.split(',').count();
        for line in &lines[1..3] {
            assert_eq!(line.split(',').count(), columns, "{}", line);
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
