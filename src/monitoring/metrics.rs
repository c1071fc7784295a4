use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::fs;
use crate::data::feed::IngestStats;
use crate::scan::ScanReport;

/// Refresh counters, exported in the Prometheus textfile format.
pub struct Metrics {
    registry: Registry,
    refreshes: IntCounter,
    quotes_accepted: IntCounter,
    quotes_rejected: IntCounter,
    value_bets: IntCounter,
    arbitrages: IntCounter,
    flagged: IntCounter,
    markets_last_scan: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let refreshes = IntCounter::new("oddsedge_refreshes_total", "Completed refresh cycles")?;
        let quotes_accepted =
            IntCounter::new("oddsedge_quotes_accepted_total", "Quotes accepted at ingestion")?;
        let quotes_rejected =
            IntCounter::new("oddsedge_quotes_rejected_total", "Quotes rejected at ingestion")?;
        let value_bets = IntCounter::new("oddsedge_value_bets_total", "Value bets reported")?;
        let arbitrages =
            IntCounter::new("oddsedge_arbitrages_total", "Profitable arbitrages reported")?;
        let flagged = IntCounter::new(
            "oddsedge_flagged_total",
            "Opportunities dropped as implausible",
        )?;
        let markets_last_scan =
            IntGauge::new("oddsedge_markets_last_scan", "Markets in the latest snapshot")?;

        registry.register(Box::new(refreshes.clone()))?;
        registry.register(Box::new(quotes_accepted.clone()))?;
        registry.register(Box::new(quotes_rejected.clone()))?;
        registry.register(Box::new(value_bets.clone()))?;
        registry.register(Box::new(arbitrages.clone()))?;
        registry.register(Box::new(flagged.clone()))?;
        registry.register(Box::new(markets_last_scan.clone()))?;

        Ok(Self {
            registry,
            refreshes,
            quotes_accepted,
            quotes_rejected,
            value_bets,
            arbitrages,
            flagged,
            markets_last_scan,
        })
    }

    pub fn record(&self, stats: &IngestStats, report: &ScanReport) {
        self.refreshes.inc();
        self.quotes_accepted.inc_by(stats.accepted as u64);
        self.quotes_rejected.inc_by(stats.rejected as u64);
        self.value_bets.inc_by(report.value_bets.len() as u64);
        self.arbitrages.inc_by(report.profitable_arbitrages().count() as u64);
        self.flagged.inc_by(report.flagged as u64);
        self.markets_last_scan.set(report.markets_scanned as i64);
    }

    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Write the textfile atomically so a collector never reads half a file.
    pub fn write_textfile(&self, path: &str) -> Result<()> {
        let tmp = format!("{}.tmp", path);
        fs::write(&tmp, self.render()?)
            .with_context(|| format!("Failed to write metrics to {}", tmp))?;
        fs::rename(&tmp, path).with_context(|| format!("Failed to move metrics to {}", path))?;
        Ok(())
    }
}
