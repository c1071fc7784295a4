use anyhow::Result;
use chrono::Utc;
use oddsedge::config::{Config, EnvConfig};
use oddsedge::data::cache::ProbabilityCache;
use oddsedge::data::feed::{build_markets, load_probabilities, load_snapshot};
use oddsedge::evaluator::sanity::SanityGuard;
use oddsedge::monitoring::logger::CsvLogger;
#[cfg(feature = "metrics")]
use oddsedge::monitoring::metrics::Metrics;
use oddsedge::scan::Scanner;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Reference stake used when logging arbitrage splits.
const ARB_LOG_STAKE: f64 = 100.0;

struct Runtime {
    config: Config,
    scanner: Scanner,
    guard: SanityGuard,
    cache: ProbabilityCache,
    logger: Option<CsvLogger>,
    #[cfg(feature = "metrics")]
    metrics: Option<Metrics>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🚀 oddsedge starting...");

    // Load configuration
    let env_config = EnvConfig::load()?;
    info!("Loading configuration from {}", env_config.config_path);
    let mut config = Config::load(&env_config.config_path)?;
    config.apply_env(&env_config);

    info!("Odds snapshot: {}", config.feed.odds_path);
    info!("Model probabilities: {}", config.feed.probabilities_path);
    info!("Minimum EV: {:.2}%", config.evaluator.min_ev_percent);
    info!("Refresh interval: {}s", config.feed.refresh_interval_secs);

    let logger = if config.monitoring.csv_logging {
        info!("CSV opportunity log: {}", config.monitoring.csv_log_path);
        Some(CsvLogger::new(config.monitoring.csv_log_path.clone())?)
    } else {
        None
    };

    #[cfg(feature = "metrics")]
    let metrics = if config.monitoring.prometheus_enabled {
        info!("Prometheus textfile: {}", config.monitoring.prometheus_textfile);
        Some(Metrics::new()?)
    } else {
        None
    };
    #[cfg(not(feature = "metrics"))]
    if config.monitoring.prometheus_enabled {
        warn!("prometheus_enabled is set but oddsedge was built without the metrics feature");
    }

    let guard = SanityGuard::new(config.sanity.clone());
    let runtime = Runtime {
        scanner: Scanner::new(config.evaluator.clone(), guard.clone()),
        guard,
        cache: ProbabilityCache::new(Duration::from_secs(config.feed.probability_ttl_secs)),
        logger,
        #[cfg(feature = "metrics")]
        metrics,
        config,
    };

    if env_config.run_once {
        return refresh(&runtime);
    }

    info!("✅ Initialized, waiting for odds refreshes");

    let mut interval =
        tokio::time::interval(Duration::from_secs(runtime.config.feed.refresh_interval_secs));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = refresh(&runtime) {
                    warn!("Refresh failed: {:#}", e);
                }
            }
            _ = &mut shutdown => {
                info!("Shutting down...");
                break;
            }
        }
    }

    Ok(())
}

/// One refresh cycle over the current snapshot.
fn refresh(runtime: &Runtime) -> Result<()> {
    let feed = &runtime.config.feed;

    match load_probabilities(&feed.probabilities_path) {
        Ok(table) => {
            debug!("Loaded {} model probabilities", table.len());
            runtime.cache.insert_table(&table);
        }
        Err(e) => warn!("Model probabilities unavailable, using cached estimates: {}", e),
    }
    let expired = runtime.cache.purge_expired();
    if expired > 0 {
        debug!("Expired {} cached probabilities", expired);
    }

    let snapshot = load_snapshot(&feed.odds_path)?;
    let now = Utc::now();

    if let Err(e) = runtime.guard.check_snapshot_age(snapshot.fetched_at, now) {
        warn!("{}, skipping refresh", e);
        if let Some(logger) = &runtime.logger {
            logger.log_event(&e.to_string())?;
        }
        return Ok(());
    }

    let (markets, stats) = build_markets(&snapshot)?;
    info!(
        "Snapshot {}: {} events, {} markets, {} quotes accepted, {} rejected",
        snapshot.fetched_at.to_rfc3339(),
        stats.events,
        stats.markets,
        stats.accepted,
        stats.rejected
    );

    let report = runtime.scanner.scan(&markets, &runtime.cache, now);

    for arb in report.profitable_arbitrages() {
        let split: Vec<String> = arb
            .legs
            .iter()
            .zip(arb.result.stakes(ARB_LOG_STAKE))
            .map(|(leg, stake)| format!("{} {:.2} @ {:.2} ({})", leg.outcome, stake, leg.price, leg.bookmaker))
            .collect();
        info!(
            "Stake split for {} on {}: {} -> returns {:.2}",
            ARB_LOG_STAKE,
            arb.market_id,
            split.join(", "),
            arb.result.guaranteed_return(ARB_LOG_STAKE)
        );
    }

    if let Some(logger) = &runtime.logger {
        logger.log_report(&report)?;
    }

    #[cfg(feature = "metrics")]
    if let Some(metrics) = &runtime.metrics {
        metrics.record(&stats, &report);
        metrics.write_textfile(&runtime.config.monitoring.prometheus_textfile)?;
    }

    Ok(())
}
