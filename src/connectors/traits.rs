//! Exchange connector trait and shared response helpers

use super::Exchange;
use crate::{
    monitor::{FundingRate, Position},
    FetchError, MonitorError, RateUnavailable, Result,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Funding interval assumed when an exchange does not report one
pub const DEFAULT_FUNDING_INTERVAL_HOURS: u32 = 8;

/// Read-only access to one exchange account and its market data
#[async_trait]
pub trait ExchangeConnector: Send + Sync {
    /// Exchange served by this connector
    fn exchange(&self) -> Exchange;

    /// All open perpetual positions of the account; zero-size entries are omitted
    async fn fetch_positions(&self) -> std::result::Result<Vec<Position>, FetchError>;

    /// Current funding rate of one instrument
    async fn fetch_funding_rate(
        &self,
        symbol: &str,
    ) -> std::result::Result<FundingRate, RateUnavailable>;

    /// Check that the exchange answers
    async fn ping(&self) -> Result<()>;
}

/// Parse a decimal sent as a JSON string
pub(crate) fn parse_decimal(value: &str, field: &str) -> Result<Decimal> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|e| {
            MonitorError::ParseError(format!("Invalid {} '{}': {}", field, value, e)).into()
        })
}

/// Flatten an error chain into a single line for cycle reports
pub(crate) fn describe(err: &anyhow::Error) -> String {
    format!("{:#}", err)
}
