//! Funding-Rate Spread Monitor
//!
//! Watches delta-neutral funding-rate arbitrage positions held across Binance and
//! Bybit perpetual futures, pairs the hedged legs, and reports the funding-rate
//! differential of every pair, flagging pairs whose spread fell below a threshold.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connectors;
pub mod monitor;
pub mod notify;
pub mod stats;
pub mod utils;

// Re-export commonly used types
pub use crate::config::MonitorConfig;
pub use connectors::{Exchange, ExchangeConnector};
pub use monitor::{CycleReport, CycleScheduler, RatedPair};
pub use notify::{ReportSink, TelegramNotifier};

/// Result type used throughout the application
pub type Result<T> = anyhow::Result<T>;

/// Common error types for the monitor
#[derive(thiserror::Error, Debug)]
pub enum MonitorError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Exchange rejected the request
    #[error("{exchange} API error {code}: {message}")]
    Api {
        /// Exchange that answered
        exchange: Exchange,
        /// HTTP status or exchange return code
        code: i64,
        /// Message returned by the exchange
        message: String,
    },

    /// Parse error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Timeout error
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Notification delivery error
    #[error("Delivery error: {0}")]
    Delivery(String),
}

/// A whole exchange's position list could not be obtained this cycle.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("positions unavailable on {exchange}: {reason}")]
pub struct FetchError {
    /// Exchange whose positions failed
    pub exchange: Exchange,
    /// Human readable cause
    pub reason: String,
}

/// The funding rate of one leg could not be obtained.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("funding rate unavailable for {symbol} on {exchange}: {reason}")]
pub struct RateUnavailable {
    /// Exchange queried
    pub exchange: Exchange,
    /// Instrument symbol
    pub symbol: String,
    /// Human readable cause
    pub reason: String,
}

/// A report could not be handed to the delivery channel.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("report delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
