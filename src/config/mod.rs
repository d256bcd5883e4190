//! Configuration management module

pub mod settings;

pub use settings::*;

use crate::{MonitorError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for the monitor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Cycle and alerting parameters
    pub monitor: MonitorSettings,
    /// Exchange credentials and endpoints
    pub exchanges: ExchangeListConfig,
    /// Chat delivery settings
    pub telegram: TelegramConfig,
    /// Metrics settings
    pub monitoring: MonitoringConfig,
}

/// When a cycle report is handed to the delivery channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyMode {
    /// Every cycle report is delivered
    #[default]
    Always,
    /// Only reports with a below-threshold pair or an error are delivered
    AlertsOnly,
}

/// Cycle and alerting parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Differential below which a pair is flagged (fraction per funding interval)
    pub threshold_differential: Decimal,
    /// Largest absolute quantity difference still treated as a hedge
    pub quantity_match_tolerance: Decimal,
    /// Minutes between two cycles in continuous mode
    pub cycle_interval_minutes: u64,
    /// Timeout applied to every exchange request
    pub fetch_timeout_secs: u64,
    /// Minutes between two summary reports (disabled when unset)
    pub summary_interval_minutes: Option<u64>,
    /// Rescale every rate to this funding interval before comparing (disabled when unset)
    pub normalize_to_interval_hours: Option<u32>,
    /// Delivery policy for cycle reports
    pub notify_mode: NotifyMode,
}

/// Exchange list configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeListConfig {
    /// Binance USDⓈ-M futures account
    pub binance: ExchangeConfig,
    /// Bybit linear perpetual account
    pub bybit: ExchangeConfig,
}

/// Individual exchange configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// API key
    pub api_key: String,
    /// API secret
    pub api_secret: String,
    /// REST API base URL override
    pub rest_api_url: Option<String>,
    /// Validity window of signed requests in milliseconds
    pub recv_window_ms: u64,
}

/// Telegram bot configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather
    pub bot_token: String,
    /// Target chat identifier
    pub chat_id: String,
    /// Bot API base URL override
    pub api_url: Option<String>,
}

/// Monitoring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Enable the Prometheus metrics endpoint
    pub enable_metrics: bool,
    /// Listen address of the metrics endpoint
    pub metrics_listen_addr: String,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            threshold_differential: Decimal::ZERO,
            quantity_match_tolerance: Decimal::ZERO,
            cycle_interval_minutes: ConfigDefaults::CYCLE_INTERVAL_MINUTES,
            fetch_timeout_secs: ConfigDefaults::FETCH_TIMEOUT_SECS,
            summary_interval_minutes: None,
            normalize_to_interval_hours: None,
            notify_mode: NotifyMode::Always,
        }
    }
}

impl MonitorSettings {
    /// Interval between cycles
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_minutes * 60)
    }

    /// Timeout applied to a single exchange request
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Interval between summary reports, if enabled
    pub fn summary_interval(&self) -> Option<Duration> {
        self.summary_interval_minutes
            .map(|minutes| Duration::from_secs(minutes * 60))
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            rest_api_url: None,
            recv_window_ms: ConfigDefaults::RECV_WINDOW_MS,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: false,
            metrics_listen_addr: ConfigDefaults::METRICS_LISTEN_ADDR.to_string(),
        }
    }
}

/// Variable names understood for compatibility with plain `.env` deployments
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("BINANCE_API_KEY", "exchanges.binance.api_key"),
    ("BINANCE_API_SECRET", "exchanges.binance.api_secret"),
    ("BYBIT_API_KEY", "exchanges.bybit.api_key"),
    ("BYBIT_API_SECRET", "exchanges.bybit.api_secret"),
    ("TELEGRAM_BOT_TOKEN", "telegram.bot_token"),
    ("TELEGRAM_CHAT_ID", "telegram.chat_id"),
    ("QUERY_INTERVAL_MINUTES", "monitor.cycle_interval_minutes"),
    ("FUNDING_RATE_THRESHOLD", "monitor.threshold_differential"),
];

impl MonitorConfig {
    /// Load configuration: optional TOML file, then `FRM_*` variables, then the
    /// plain `.env` variable names
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut builder = ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()).required(false))
            .add_source(
                ::config::Environment::with_prefix(ConfigDefaults::ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        for (var, key) in LEGACY_ENV_KEYS {
            builder = builder
                .set_override_option(*key, std::env::var(var).ok())
                .map_err(|e| MonitorError::Config(format!("Invalid override {}: {}", var, e)))?;
        }

        let mut config: MonitorConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| MonitorError::Config(format!("Failed to load config: {}", e)))?;

        config.expand_env_vars()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let monitor = &self.monitor;
        ConfigValidator::validate_positive(
            monitor.cycle_interval_minutes,
            "cycle_interval_minutes",
        )?;
        ConfigValidator::validate_positive(monitor.fetch_timeout_secs, "fetch_timeout_secs")?;
        ConfigValidator::validate_non_negative(
            monitor.quantity_match_tolerance,
            "quantity_match_tolerance",
        )?;

        if let Some(minutes) = monitor.summary_interval_minutes {
            ConfigValidator::validate_positive(minutes, "summary_interval_minutes")?;
        }
        if let Some(hours) = monitor.normalize_to_interval_hours {
            ConfigValidator::validate_positive(u64::from(hours), "normalize_to_interval_hours")?;
        }

        let exchanges = [
            ("binance", &self.exchanges.binance),
            ("bybit", &self.exchanges.bybit),
        ];
        for (name, exchange) in exchanges {
            ConfigValidator::validate_present(&exchange.api_key, &format!("{} api_key", name))?;
            ConfigValidator::validate_present(
                &exchange.api_secret,
                &format!("{} api_secret", name),
            )?;
            ConfigValidator::validate_positive(
                exchange.recv_window_ms,
                &format!("{} recv_window_ms", name),
            )?;
            if let Some(url) = &exchange.rest_api_url {
                ConfigValidator::validate_url(url, &format!("{} rest_api_url", name))?;
            }
        }

        ConfigValidator::validate_present(&self.telegram.bot_token, "telegram bot_token")?;
        ConfigValidator::validate_present(&self.telegram.chat_id, "telegram chat_id")?;
        if let Some(url) = &self.telegram.api_url {
            ConfigValidator::validate_url(url, "telegram api_url")?;
        }

        if self.monitoring.enable_metrics {
            self.monitoring
                .metrics_listen_addr
                .parse::<std::net::SocketAddr>()
                .map_err(|e| MonitorError::Config(format!("Invalid metrics_listen_addr: {}", e)))?;
        }

        Ok(())
    }

    /// Render the effective configuration as TOML with secrets masked
    pub fn redacted(&self) -> Result<String> {
        let mut copy = self.clone();
        for secret in [
            &mut copy.exchanges.binance.api_key,
            &mut copy.exchanges.binance.api_secret,
            &mut copy.exchanges.bybit.api_key,
            &mut copy.exchanges.bybit.api_secret,
            &mut copy.telegram.bot_token,
        ] {
            if !secret.is_empty() {
                *secret = "****".to_string();
            }
        }

        toml::to_string_pretty(&copy)
            .map_err(|e| MonitorError::Config(format!("Failed to render config: {}", e)).into())
    }

    /// Expand environment variables in configuration
    fn expand_env_vars(&mut self) -> Result<()> {
        for value in [
            &mut self.exchanges.binance.api_key,
            &mut self.exchanges.binance.api_secret,
            &mut self.exchanges.bybit.api_key,
            &mut self.exchanges.bybit.api_secret,
            &mut self.telegram.bot_token,
            &mut self.telegram.chat_id,
        ] {
            EnvExpander::expand_in_place(value)?;
        }
        Ok(())
    }
}
