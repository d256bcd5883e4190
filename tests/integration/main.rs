//! Integration tests for the funding spread monitor

use async_trait::async_trait;
use funding_rate_monitor::{
    config::MonitorSettings,
    connectors::{Exchange, ExchangeConnector},
    monitor::{Direction, FundingRate, Position},
    notify::ReportSink,
    stats::SummaryReport,
    CycleReport, DeliveryError, FetchError, RateUnavailable,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

mod test_end_to_end;
mod test_monitor_cycle;
mod test_scheduler;

/// Shared helpers for integration tests
pub struct TestUtils;

impl TestUtils {
    /// Settings with a one-minute interval and a one-second fetch timeout
    pub fn settings(threshold: Decimal) -> MonitorSettings {
        MonitorSettings {
            threshold_differential: threshold,
            cycle_interval_minutes: 1,
            fetch_timeout_secs: 1,
            ..Default::default()
        }
    }

    /// Wait for a condition to become true
    pub async fn wait_for_condition<F>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> bool,
    {
        let start = std::time::Instant::now();
        while start.elapsed() < timeout {
            if condition() {
                return true;
            }
            sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

/// Connector answering from canned data
pub struct StubConnector {
    exchange: Exchange,
    positions: Vec<Position>,
    rates: HashMap<String, Decimal>,
    positions_failure: Option<String>,
    delay: Option<Duration>,
    position_calls: AtomicUsize,
    rate_calls: Mutex<Vec<String>>,
}

impl StubConnector {
    pub fn new(exchange: Exchange) -> Self {
        Self {
            exchange,
            positions: Vec::new(),
            rates: HashMap::new(),
            positions_failure: None,
            delay: None,
            position_calls: AtomicUsize::new(0),
            rate_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_position(mut self, symbol: &str, direction: Direction, quantity: Decimal) -> Self {
        self.positions
            .push(Position::new(self.exchange, symbol, direction, quantity));
        self
    }

    pub fn with_rate(mut self, symbol: &str, rate: Decimal) -> Self {
        self.rates.insert(symbol.to_string(), rate);
        self
    }

    pub fn failing(mut self, reason: &str) -> Self {
        self.positions_failure = Some(reason.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn position_calls(&self) -> usize {
        self.position_calls.load(Ordering::SeqCst)
    }

    pub fn rate_calls(&self) -> Vec<String> {
        self.rate_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExchangeConnector for StubConnector {
    fn exchange(&self) -> Exchange {
        self.exchange
    }

    async fn fetch_positions(&self) -> Result<Vec<Position>, FetchError> {
        self.position_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            sleep(delay).await;
        }
        match &self.positions_failure {
            Some(reason) => Err(FetchError {
                exchange: self.exchange,
                reason: reason.clone(),
            }),
            None => Ok(self.positions.clone()),
        }
    }

    async fn fetch_funding_rate(&self, symbol: &str) -> Result<FundingRate, RateUnavailable> {
        self.rate_calls.lock().unwrap().push(symbol.to_string());
        match self.rates.get(symbol) {
            Some(rate) => Ok(FundingRate {
                exchange: self.exchange,
                symbol: symbol.to_string(),
                rate: *rate,
                as_of: Utc::now(),
                interval_hours: 8,
                next_funding_time: None,
            }),
            None => Err(RateUnavailable {
                exchange: self.exchange,
                symbol: symbol.to_string(),
                reason: "symbol not listed".to_string(),
            }),
        }
    }

    async fn ping(&self) -> funding_rate_monitor::Result<()> {
        Ok(())
    }
}

/// Sink that keeps everything it is handed
#[derive(Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<CycleReport>>,
    summaries: Mutex<Vec<SummaryReport>>,
    announcements: Mutex<Vec<String>>,
    fail_reports: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail_reports: true,
            ..Default::default()
        }
    }

    pub fn reports(&self) -> Vec<CycleReport> {
        self.reports.lock().unwrap().clone()
    }

    pub fn summaries(&self) -> Vec<SummaryReport> {
        self.summaries.lock().unwrap().clone()
    }

    pub fn announcements(&self) -> Vec<String> {
        self.announcements.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportSink for RecordingSink {
    async fn deliver(&self, report: &CycleReport) -> Result<(), DeliveryError> {
        if self.fail_reports {
            return Err(DeliveryError("sink offline".to_string()));
        }
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }

    async fn deliver_summary(&self, summary: &SummaryReport) -> Result<(), DeliveryError> {
        self.summaries.lock().unwrap().push(summary.clone());
        Ok(())
    }

    async fn announce(&self, text: &str) -> Result<(), DeliveryError> {
        self.announcements.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Wrap concrete stubs as trait objects while keeping handles for assertions
pub fn scheduler_parts(
    a: StubConnector,
    b: StubConnector,
    sink: RecordingSink,
) -> (Arc<StubConnector>, Arc<StubConnector>, Arc<RecordingSink>) {
    (Arc::new(a), Arc::new(b), Arc::new(sink))
}
