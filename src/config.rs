use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
    #[serde(default)]
    pub sanity: SanityConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub odds_path: String,
    pub probabilities_path: String,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_probability_ttl")]
    pub probability_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluatorConfig {
    /// Value bets below this EV (percent) are not reported.
    #[serde(default)]
    pub min_ev_percent: f64,
    #[serde(default = "default_kelly_multiplier")]
    pub kelly_multiplier: f64,
    #[serde(default = "default_max_stake_fraction")]
    pub max_stake_fraction: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SanityConfig {
    #[serde(default = "default_max_plausible_ev")]
    pub max_plausible_ev_percent: f64,
    #[serde(default = "default_max_plausible_margin")]
    pub max_plausible_margin_percent: f64,
    #[serde(default = "default_max_snapshot_age")]
    pub max_snapshot_age_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub csv_logging: bool,
    #[serde(default = "default_csv_log_path")]
    pub csv_log_path: String,
    #[serde(default)]
    pub prometheus_enabled: bool,
    #[serde(default = "default_prometheus_textfile")]
    pub prometheus_textfile: String,
}

fn default_refresh_interval() -> u64 { 30 }
fn default_probability_ttl() -> u64 { 900 }
fn default_kelly_multiplier() -> f64 { 0.25 }
fn default_max_stake_fraction() -> f64 { 0.05 }
fn default_max_plausible_ev() -> f64 { 30.0 }
fn default_max_plausible_margin() -> f64 { 10.0 }
fn default_max_snapshot_age() -> u64 { 300 }
fn default_csv_log_path() -> String { "opportunities.csv".to_string() }
fn default_prometheus_textfile() -> String { "oddsedge.prom".to_string() }

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            min_ev_percent: 0.0,
            kelly_multiplier: default_kelly_multiplier(),
            max_stake_fraction: default_max_stake_fraction(),
        }
    }
}

impl Default for SanityConfig {
    fn default() -> Self {
        Self {
            max_plausible_ev_percent: default_max_plausible_ev(),
            max_plausible_margin_percent: default_max_plausible_margin(),
            max_snapshot_age_secs: default_max_snapshot_age(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            csv_logging: false,
            csv_log_path: default_csv_log_path(),
            prometheus_enabled: false,
            prometheus_textfile: default_prometheus_textfile(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub config_path: String,
    pub odds_path: Option<String>,
    pub probabilities_path: Option<String>,
    pub run_once: bool,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {}", path))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;

        if config.evaluator.kelly_multiplier < 0.0 || config.evaluator.max_stake_fraction < 0.0 {
            anyhow::bail!("Kelly multiplier and max stake fraction must be non-negative");
        }
        if config.feed.refresh_interval_secs == 0 {
            anyhow::bail!("feed.refresh_interval_secs must be at least 1");
        }

        Ok(config)
    }

    /// Environment overrides take precedence over the file.
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(path) = &env.odds_path {
            self.feed.odds_path = path.clone();
        }
        if let Some(path) = &env.probabilities_path {
            self.feed.probabilities_path = path.clone();
        }
    }
}

impl EnvConfig {
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            config_path: std::env::var("ODDSEDGE_CONFIG")
                .unwrap_or_else(|_| "config.toml".to_string()),
            odds_path: std::env::var("ODDS_SNAPSHOT_PATH").ok(),
            probabilities_path: std::env::var("PROBABILITIES_PATH").ok(),
            run_once: std::env::var("ODDSEDGE_RUN_ONCE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("ODDSEDGE_RUN_ONCE must be true or false")?,
        })
    }
}
