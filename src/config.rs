use anyhow::{bail, Context, Result};
use chrono::FixedOffset;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::model::timeframe::Timeframe;
use crate::stream::ReconnectPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub exchange: ExchangeConfig,
    pub chart: ChartConfig,
    pub stream: StreamConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub rest_base_url: String,
    pub ws_url: String,
    pub symbol: String,
    /// Offset of the exchange's calendar, used to name day/year partitions.
    pub partition_utc_offset_hours: i32,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            rest_base_url: "https://public.bitbank.cc".to_string(),
            ws_url: "wss://stream.bitbank.cc/socket.io/?EIO=4&transport=websocket".to_string(),
            symbol: "btc_jpy".to_string(),
            partition_utc_offset_hours: 9,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub timeframe: Timeframe,
    pub window_capacity: usize,
    pub backfill_count: usize,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::default(),
            window_capacity: 200,
            backfill_count: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub base_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    /// Serve a local random walk instead of the exchange stream.
    pub mock: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_reconnect_attempts: 5,
            mock: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl ExchangeConfig {
    pub fn partition_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.partition_utc_offset_hours * 3600).with_context(|| {
            format!(
                "exchange.partition_utc_offset_hours {} is out of range",
                self.partition_utc_offset_hours
            )
        })
    }
}

impl StreamConfig {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_attempts: self.max_reconnect_attempts,
        }
    }
}

impl Config {
    /// `.env`, then `config/default.toml` (defaults when absent), then
    /// `STACKER_*` overrides.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::load_from(Path::new(DEFAULT_CONFIG_PATH))?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&config_str).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn parse(toml_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(tf) = var("STACKER_TIMEFRAME") {
            self.chart.timeframe = tf
                .parse()
                .with_context(|| format!("STACKER_TIMEFRAME '{}' is invalid", tf))?;
        }
        if let Some(mock) = var("STACKER_MOCK_FEED") {
            self.stream.mock = match mock.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                other => bail!("STACKER_MOCK_FEED '{}' is not a boolean", other),
            };
        }
        if let Some(level) = var("STACKER_LOG") {
            self.logging.level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.chart.window_capacity == 0 {
            bail!("chart.window_capacity must be > 0");
        }
        if self.chart.backfill_count == 0 {
            bail!("chart.backfill_count must be > 0");
        }
        if self.stream.base_delay_ms == 0 {
            bail!("stream.base_delay_ms must be > 0");
        }
        if self.exchange.symbol.trim().is_empty() {
            bail!("exchange.symbol must not be empty");
        }
        self.exchange.partition_offset()?;
        check_url(&self.exchange.rest_base_url, &["http", "https"], "exchange.rest_base_url")?;
        check_url(&self.exchange.ws_url, &["ws", "wss"], "exchange.ws_url")?;
        Ok(())
    }
}

fn check_url(raw: &str, schemes: &[&str], field: &str) -> Result<()> {
    let url = url::Url::parse(raw).with_context(|| format!("{} '{}' is not a URL", field, raw))?;
    if !schemes.contains(&url.scheme()) {
        bail!("{} must use one of {:?}, got '{}'", field, schemes, url.scheme());
    }
    Ok(())
}
