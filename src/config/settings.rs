//! Settings management utilities

use crate::{MonitorError, Result};
use rust_decimal::Decimal;
use std::env;

/// Environment variable expansion utility
pub struct EnvExpander;

impl EnvExpander {
    /// Expand environment variables in a string
    /// Supports the ${VAR_NAME} pattern
    pub fn expand(input: &str) -> Result<String> {
        let mut result = input.to_string();

        while let Some(start) = result.find("${") {
            if let Some(end) = result[start..].find('}') {
                let var_name = &result[start + 2..start + end];
                let var_value = env::var(var_name).map_err(|_| {
                    MonitorError::Config(format!("Environment variable '{}' not found", var_name))
                })?;

                result.replace_range(start..start + end + 1, &var_value);
            } else {
                return Err(MonitorError::Config(
                    "Unclosed environment variable reference".to_string(),
                )
                .into());
            }
        }

        Ok(result)
    }

    /// Expand every `${VAR}` reference of a string field in place
    pub fn expand_in_place(value: &mut String) -> Result<()> {
        if value.contains("${") {
            *value = Self::expand(value)?;
        }
        Ok(())
    }
}

/// Configuration validation utilities
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a required string setting is present
    pub fn validate_present(value: &str, name: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(MonitorError::Config(format!("{} must be set", name)).into());
        }
        Ok(())
    }

    /// Validate a strictly positive integer setting
    pub fn validate_positive(value: u64, name: &str) -> Result<()> {
        if value == 0 {
            return Err(MonitorError::Config(format!("{} must be greater than 0", name)).into());
        }
        Ok(())
    }

    /// Validate a decimal setting that may be zero but never negative
    pub fn validate_non_negative(value: Decimal, name: &str) -> Result<()> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MonitorError::Config(format!("{} cannot be negative", name)).into());
        }
        Ok(())
    }

    /// Validate a URL format
    pub fn validate_url(url: &str, name: &str) -> Result<()> {
        if url.is_empty() {
            return Err(MonitorError::Config(format!("{} cannot be empty", name)).into());
        }

        let parsed = url::Url::parse(url)
            .map_err(|e| MonitorError::Config(format!("{} must be a valid URL: {}", name, e)))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(MonitorError::Config(format!("{} must be an http(s) URL", name)).into());
        }

        Ok(())
    }
}

/// Configuration defaults
pub struct ConfigDefaults;

impl ConfigDefaults {
    /// Default minutes between two monitoring cycles
    pub const CYCLE_INTERVAL_MINUTES: u64 = 30;

    /// Default per-request timeout in seconds
    pub const FETCH_TIMEOUT_SECS: u64 = 10;

    /// Default signed request validity window in milliseconds
    pub const RECV_WINDOW_MS: u64 = 5000;

    /// Default Prometheus listen address
    pub const METRICS_LISTEN_ADDR: &'static str = "127.0.0.1:9184";

    /// Default config file location
    pub const CONFIG_PATH: &'static str = "config/monitor.toml";

    /// Prefix of structured environment overrides (`FRM_MONITOR__...`)
    pub const ENV_PREFIX: &'static str = "FRM";
}
