//! Exchange connector implementations

pub mod auth;
pub mod binance;
pub mod bybit;
pub mod traits;

pub use binance::BinanceConnector;
pub use bybit::BybitConnector;
pub use traits::*;

use crate::{config::ExchangeConfig, MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Supported exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    /// Binance USDⓈ-M futures
    Binance,
    /// Bybit linear perpetuals
    Bybit,
}

impl Exchange {
    /// Lowercase exchange name
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Binance => "binance",
            Exchange::Bybit => "bybit",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for Exchange {
    type Err = MonitorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "binance" => Ok(Exchange::Binance),
            "bybit" => Ok(Exchange::Bybit),
            _ => Err(MonitorError::Config(format!("Unknown exchange: {}", s))),
        }
    }
}

/// Connector factory for creating exchange connectors
pub struct ConnectorFactory;

impl ConnectorFactory {
    /// Create a connector for the specified exchange
    pub fn create_connector(
        exchange: Exchange,
        config: &ExchangeConfig,
        timeout: Duration,
    ) -> Result<Arc<dyn ExchangeConnector>> {
        match exchange {
            Exchange::Binance => Ok(Arc::new(BinanceConnector::new(config, timeout)?)),
            Exchange::Bybit => Ok(Arc::new(BybitConnector::new(config, timeout)?)),
        }
    }
}
