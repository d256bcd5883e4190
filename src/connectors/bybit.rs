//! Bybit V5 linear perpetual REST connector

use super::{
    auth::{encode_query, sign_hex, timestamp_ms},
    traits::{describe, parse_decimal, ExchangeConnector, DEFAULT_FUNDING_INTERVAL_HOURS},
    Exchange,
};
use crate::{
    config::ExchangeConfig,
    monitor::{Direction, FundingRate, Position},
    FetchError, MonitorError, RateUnavailable, Result,
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default Bybit REST base URL
pub const BYBIT_URL: &str = "https://api.bybit.com";

/// Page size requested from `/v5/position/list`
const POSITION_PAGE_LIMIT: u32 = 200;

/// Bybit V5 linear perpetual connector
pub struct BybitConnector {
    http: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    recv_window_ms: u64,
}

impl BybitConnector {
    /// Create a connector from exchange credentials
    pub fn new(config: &ExchangeConfig, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.rest_api_url.clone().unwrap_or_else(|| BYBIT_URL.to_string()),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            recv_window_ms: config.recv_window_ms,
        })
    }

    /// Sets a custom base URL (useful for testing).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Open USDT-settled linear positions, following `nextPageCursor` until exhausted
    pub async fn positions(&self) -> Result<Vec<Position>> {
        let mut positions = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut params = vec![
                ("category", "linear".to_string()),
                ("settleCoin", "USDT".to_string()),
                ("limit", POSITION_PAGE_LIMIT.to_string()),
            ];
            if let Some(c) = &cursor {
                params.push(("cursor", c.clone()));
            }

            let page: BybitPositionPage = self.get_signed("/v5/position/list", &params).await?;
            for entry in page.list {
                let size = parse_decimal(&entry.size, "size")?;
                let direction = match entry.side.as_str() {
                    "Buy" => Direction::Long,
                    "Sell" => Direction::Short,
                    _ => continue,
                };
                if size.is_zero() {
                    continue;
                }
                positions.push(Position::new(Exchange::Bybit, entry.symbol, direction, size));
            }

            match page.next_page_cursor.filter(|c| !c.is_empty()) {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => break,
            }
        }

        debug!(count = positions.len(), "Fetched Bybit positions");
        Ok(positions)
    }

    /// Latest funding rate from `/v5/market/tickers`
    pub async fn funding_rate(&self, symbol: &str) -> Result<FundingRate> {
        let params = [("category", "linear".to_string()), ("symbol", symbol.to_string())];
        let (tickers, interval_hours) = tokio::join!(
            self.get_public::<BybitList<BybitTicker>>("/v5/market/tickers", &params),
            self.funding_interval_hours(symbol),
        );

        let ticker = tickers?
            .list
            .into_iter()
            .find(|t| t.symbol == symbol)
            .ok_or_else(|| MonitorError::ParseError(format!("No Bybit ticker for {}", symbol)))?;

        let next_funding_time = ticker
            .next_funding_time
            .as_deref()
            .and_then(|ms| ms.parse::<i64>().ok())
            .filter(|ms| *ms > 0)
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

        Ok(FundingRate {
            exchange: Exchange::Bybit,
            rate: parse_decimal(&ticker.funding_rate, "fundingRate")?,
            symbol: ticker.symbol,
            as_of: Utc::now(),
            interval_hours,
            next_funding_time,
        })
    }

    /// Funding interval from `/v5/market/instruments-info`, reported there in minutes
    async fn funding_interval_hours(&self, symbol: &str) -> u32 {
        let params = [("category", "linear".to_string()), ("symbol", symbol.to_string())];
        match self
            .get_public::<BybitList<BybitInstrument>>("/v5/market/instruments-info", &params)
            .await
        {
            Ok(instruments) => instruments
                .list
                .into_iter()
                .find(|i| i.symbol == symbol)
                .and_then(|i| i.funding_interval)
                .map(|minutes| minutes / 60)
                .filter(|hours| *hours > 0)
                .unwrap_or(DEFAULT_FUNDING_INTERVAL_HOURS),
            Err(e) => {
                warn!(symbol, error = %e, "Funding interval unavailable, assuming default");
                DEFAULT_FUNDING_INTERVAL_HOURS
            }
        }
    }

    async fn get_public<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let mut url = format!("{}{}", self.base_url, path);
        if !params.is_empty() {
            url = format!("{}?{}", url, encode_query(params));
        }
        debug!("GET {}", url);
        self.send(self.http.get(&url)).await
    }

    async fn get_signed<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let query = encode_query(params);
        let timestamp = timestamp_ms().to_string();
        let recv_window = self.recv_window_ms.to_string();
        let payload = format!("{}{}{}{}", timestamp, self.api_key, recv_window, query);
        let signature = sign_hex(&self.api_secret, &payload)?;

        let url = format!("{}{}?{}", self.base_url, path, query);
        debug!("GET {}{} (signed)", self.base_url, path);

        let request = self
            .http
            .get(&url)
            .header("X-BAPI-API-KEY", &self.api_key)
            .header("X-BAPI-SIGN", signature)
            .header("X-BAPI-TIMESTAMP", timestamp)
            .header("X-BAPI-RECV-WINDOW", recv_window);
        self.send(request).await
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                MonitorError::Timeout(format!("Bybit request timed out: {}", e))
            } else {
                MonitorError::Connection(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MonitorError::Api {
                exchange: Exchange::Bybit,
                code: i64::from(status.as_u16()),
                message: text,
            }
            .into());
        }

        let envelope: BybitEnvelope = response.json().await.map_err(|e| {
            MonitorError::ParseError(format!("Failed to parse Bybit response: {}", e))
        })?;

        if envelope.ret_code != 0 {
            return Err(MonitorError::Api {
                exchange: Exchange::Bybit,
                code: envelope.ret_code,
                message: envelope.ret_msg,
            }
            .into());
        }

        serde_json::from_value(envelope.result)
            .map_err(|e| MonitorError::ParseError(format!("Unexpected Bybit result: {}", e)).into())
    }
}

#[async_trait]
impl ExchangeConnector for BybitConnector {
    fn exchange(&self) -> Exchange {
        Exchange::Bybit
    }

    async fn fetch_positions(&self) -> std::result::Result<Vec<Position>, FetchError> {
        self.positions().await.map_err(|e| FetchError {
            exchange: Exchange::Bybit,
            reason: describe(&e),
        })
    }

    async fn fetch_funding_rate(
        &self,
        symbol: &str,
    ) -> std::result::Result<FundingRate, RateUnavailable> {
        self.funding_rate(symbol).await.map_err(|e| RateUnavailable {
            exchange: Exchange::Bybit,
            symbol: symbol.to_string(),
            reason: describe(&e),
        })
    }

    async fn ping(&self) -> Result<()> {
        self.get_public::<serde_json::Value>("/v5/market/time", &[])
            .await
            .context("Bybit ping failed")?;
        Ok(())
    }
}

/// Common V5 response wrapper; `result` is `{}` when `retCode` is non-zero
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitEnvelope {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct BybitList<T> {
    #[serde(default = "Vec::new")]
    list: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitPositionPage {
    #[serde(default)]
    list: Vec<BybitPosition>,
    #[serde(default)]
    next_page_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BybitPosition {
    symbol: String,
    side: String,
    size: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitTicker {
    symbol: String,
    #[serde(default)]
    funding_rate: String,
    #[serde(default)]
    next_funding_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitInstrument {
    symbol: String,
    #[serde(default)]
    funding_interval: Option<u32>,
}
