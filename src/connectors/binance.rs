//! Binance USDⓈ-M futures REST connector

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
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default Binance USDⓈ-M futures REST base URL
pub const BINANCE_FUTURES_URL: &str = "https://fapi.binance.com";

/// Binance USDⓈ-M futures connector
pub struct BinanceConnector {
    http: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    recv_window_ms: u64,
}

impl BinanceConnector {
    /// Create a connector from exchange credentials
    pub fn new(config: &ExchangeConfig, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config
                .rest_api_url
                .clone()
                .unwrap_or_else(|| BINANCE_FUTURES_URL.to_string()),
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

    /// Open positions from `/fapi/v2/positionRisk`
    pub async fn positions(&self) -> Result<Vec<Position>> {
        let raw: Vec<BinancePositionRisk> =
            self.get_signed("/fapi/v2/positionRisk", Vec::new()).await?;

        let mut positions = Vec::new();
        for entry in raw {
            let amount = parse_decimal(&entry.position_amt, "positionAmt")?;
            if amount.is_zero() {
                continue;
            }
            let direction = if amount.is_sign_negative() {
                Direction::Short
            } else {
                Direction::Long
            };
            positions.push(Position::new(Exchange::Binance, entry.symbol, direction, amount));
        }

        debug!(count = positions.len(), "Fetched Binance positions");
        Ok(positions)
    }

    /// Latest funding rate from `/fapi/v1/premiumIndex`
    pub async fn funding_rate(&self, symbol: &str) -> Result<FundingRate> {
        let (index, interval_hours) = tokio::join!(
            self.get_public::<BinancePremiumIndex>(
                "/fapi/v1/premiumIndex",
                vec![("symbol", symbol.to_string())]
            ),
            self.funding_interval_hours(symbol),
        );
        let index = index?;

        let as_of = Some(index.time)
            .filter(|ms| *ms > 0)
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now);
        let next_funding_time = Some(index.next_funding_time)
            .filter(|ms| *ms > 0)
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

        Ok(FundingRate {
            exchange: Exchange::Binance,
            symbol: index.symbol,
            rate: parse_decimal(&index.last_funding_rate, "lastFundingRate")?,
            as_of,
            interval_hours,
            next_funding_time,
        })
    }

    /// Funding interval of a symbol. `/fapi/v1/fundingInfo` only lists symbols with
    /// adjusted parameters; every other symbol settles on the default interval.
    async fn funding_interval_hours(&self, symbol: &str) -> u32 {
        match self.get_public::<Vec<BinanceFundingInfo>>("/fapi/v1/fundingInfo", Vec::new()).await {
            Ok(infos) => infos
                .into_iter()
                .find(|info| info.symbol == symbol)
                .map(|info| info.funding_interval_hours)
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
        params: Vec<(&str, String)>,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);
        self.send(self.http.get(&url).query(&params)).await
    }

    async fn get_signed<T: DeserializeOwned>(
        &self,
        path: &str,
        mut params: Vec<(&str, String)>,
    ) -> Result<T> {
        params.push(("recvWindow", self.recv_window_ms.to_string()));
        params.push(("timestamp", timestamp_ms().to_string()));

        let query = encode_query(&params);
        let signature = sign_hex(&self.api_secret, &query)?;
        let url = format!("{}{}?{}&signature={}", self.base_url, path, query, signature);
        debug!("GET {}{} (signed)", self.base_url, path);

        self.send(self.http.get(&url).header("X-MBX-APIKEY", &self.api_key)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                MonitorError::Timeout(format!("Binance request timed out: {}", e))
            } else {
                MonitorError::Connection(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let (code, message) = match serde_json::from_str::<BinanceErrorBody>(&text) {
                Ok(body) => (body.code, body.msg),
                Err(_) => (i64::from(status.as_u16()), text),
            };
            return Err(MonitorError::Api {
                exchange: Exchange::Binance,
                code,
                message,
            }
            .into());
        }

        response.json::<T>().await.map_err(|e| {
            MonitorError::ParseError(format!("Failed to parse Binance response: {}", e)).into()
        })
    }
}

#[async_trait]
impl ExchangeConnector for BinanceConnector {
    fn exchange(&self) -> Exchange {
        Exchange::Binance
    }

    async fn fetch_positions(&self) -> std::result::Result<Vec<Position>, FetchError> {
        self.positions().await.map_err(|e| FetchError {
            exchange: Exchange::Binance,
            reason: describe(&e),
        })
    }

    async fn fetch_funding_rate(
        &self,
        symbol: &str,
    ) -> std::result::Result<FundingRate, RateUnavailable> {
        self.funding_rate(symbol).await.map_err(|e| RateUnavailable {
            exchange: Exchange::Binance,
            symbol: symbol.to_string(),
            reason: describe(&e),
        })
    }

    async fn ping(&self) -> Result<()> {
        self.get_public::<serde_json::Value>("/fapi/v1/ping", Vec::new())
            .await
            .context("Binance ping failed")?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinancePositionRisk {
    symbol: String,
    position_amt: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinancePremiumIndex {
    symbol: String,
    last_funding_rate: String,
    #[serde(default)]
    next_funding_time: i64,
    #[serde(default)]
    time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceFundingInfo {
    symbol: String,
    funding_interval_hours: u32,
}

#[derive(Debug, Deserialize)]
struct BinanceErrorBody {
    code: i64,
    msg: String,
}
