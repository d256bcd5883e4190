//! Cycle orchestration: fetch, evaluate, report, sleep

use super::{
    matcher::PairMatcher,
    rates::{rate_pairs, RateJoiner},
    report,
    types::{ArbitragePair, CycleError, CycleReport, FundingRate, Position},
};
use crate::{
    config::{MonitorSettings, NotifyMode},
    connectors::{Exchange, ExchangeConnector},
    log_rated_pair,
    notify::ReportSink,
    stats::StatisticsCollector,
    utils::metrics,
    RateUnavailable,
};
use chrono::Utc;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Lifecycle of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Between cycles, not sleeping
    Idle,
    /// Position and rate requests in flight
    Fetching,
    /// Matching and evaluating
    Processing,
    /// Building and delivering the report
    Reporting,
    /// Waiting for the next cycle
    Sleeping,
    /// Stopped after cancellation
    Terminated,
}

/// Drives monitoring cycles against two exchanges
pub struct CycleScheduler {
    exchange_a: Arc<dyn ExchangeConnector>,
    exchange_b: Arc<dyn ExchangeConnector>,
    sink: Arc<dyn ReportSink>,
    settings: MonitorSettings,
    matcher: PairMatcher,
    joiner: RateJoiner,
    state: watch::Sender<SchedulerState>,
    stats: Option<StatisticsCollector>,
    next_summary_at: Option<Instant>,
}

impl CycleScheduler {
    /// Create a scheduler; summary statistics are kept only when a summary interval is set
    pub fn new(
        exchange_a: Arc<dyn ExchangeConnector>,
        exchange_b: Arc<dyn ExchangeConnector>,
        sink: Arc<dyn ReportSink>,
        settings: MonitorSettings,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        let summary_interval = settings.summary_interval();

        Self {
            matcher: PairMatcher::new(settings.quantity_match_tolerance),
            joiner: RateJoiner::new(settings.normalize_to_interval_hours),
            stats: summary_interval.map(|_| StatisticsCollector::new(Utc::now())),
            next_summary_at: summary_interval.map(|interval| Instant::now() + interval),
            exchange_a,
            exchange_b,
            sink,
            settings,
            state,
        }
    }

    /// Current state
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Observe state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Run a single cycle and hand the report to the sink. Failures end up in the
    /// report or the logs; this never fails.
    pub async fn run_once(&mut self) -> CycleReport {
        let span = info_span!("cycle", cycle_id = %Uuid::new_v4());
        self.cycle().instrument(span).await
    }

    /// Repeat cycles until `shutdown` turns true or its sender is dropped. An
    /// in-flight cycle always completes.
    pub async fn run_forever(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_minutes = self.settings.cycle_interval_minutes,
            threshold = %self.settings.threshold_differential,
            "Starting continuous monitoring"
        );
        self.announce(&format!(
            "Funding spread monitor started\nInterval: {} min, threshold: {}",
            self.settings.cycle_interval_minutes,
            report::format_percent(self.settings.threshold_differential)
        ))
        .await;

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.run_once().await;
            self.send_summary_if_due().await;

            self.set_state(SchedulerState::Sleeping);
            if !sleep_until_next_cycle(self.settings.cycle_interval(), &mut shutdown).await {
                break;
            }
        }

        self.set_state(SchedulerState::Terminated);
        info!("Monitoring stopped");
        self.announce("Funding spread monitor stopped").await;
    }

    async fn cycle(&mut self) -> CycleReport {
        self.set_state(SchedulerState::Fetching);
        let mut errors = Vec::new();

        let (positions_a, positions_b) = tokio::join!(
            self.fetch_positions(&self.exchange_a),
            self.fetch_positions(&self.exchange_b)
        );
        let positions_a = positions_a.unwrap_or_else(|e| {
            errors.push(e);
            Vec::new()
        });
        let positions_b = positions_b.unwrap_or_else(|e| {
            errors.push(e);
            Vec::new()
        });
        debug!(a = positions_a.len(), b = positions_b.len(), "Positions fetched");

        let outcome = self.matcher.match_positions(&positions_a, &positions_b);
        let rates = self.fetch_rates(&outcome.pairs).await;

        self.set_state(SchedulerState::Processing);
        let (joined, rate_errors) = self.joiner.join(outcome.pairs, |exchange, symbol| {
            rates
                .get(&(exchange, symbol.to_string()))
                .cloned()
                .unwrap_or_else(|| {
                    Err(RateUnavailable {
                        exchange,
                        symbol: symbol.to_string(),
                        reason: "rate was not requested".to_string(),
                    })
                })
        });
        errors.extend(rate_errors);
        let rated = rate_pairs(joined, self.settings.threshold_differential);

        self.set_state(SchedulerState::Reporting);
        let cycle_report =
            report::build(rated, errors, Utc::now()).with_unmatched(outcome.unmatched);

        for rated in &cycle_report.rated_pairs {
            if rated.below_threshold {
                log_rated_pair!(warn, rated, "Differential below threshold");
            } else {
                log_rated_pair!(info, rated);
            }
        }
        for err in &cycle_report.errors {
            warn!(error = %err, "Cycle error");
        }

        let alerts = cycle_report.alerts().count();
        metrics::record_cycle(
            cycle_report.rated_pairs.len(),
            alerts,
            cycle_report.errors.len(),
            cycle_report.unmatched.len(),
        );
        if let Some(stats) = self.stats.as_mut() {
            stats.record(&cycle_report);
        }

        if self.should_deliver(&cycle_report) {
            if let Err(e) = self.sink.deliver(&cycle_report).await {
                error!(error = %e, "Failed to deliver cycle report");
                metrics::record_delivery_failure("report");
            }
        } else {
            debug!("Nothing to alert, report not delivered");
        }

        info!(
            pairs = cycle_report.rated_pairs.len(),
            alerts,
            errors = cycle_report.errors.len(),
            unmatched = cycle_report.unmatched.len(),
            "Cycle completed"
        );
        self.set_state(SchedulerState::Idle);
        cycle_report
    }

    async fn fetch_positions(
        &self,
        connector: &Arc<dyn ExchangeConnector>,
    ) -> Result<Vec<Position>, CycleError> {
        let exchange = connector.exchange();
        let limit = self.settings.fetch_timeout();
        match timeout(limit, connector.fetch_positions()).await {
            Ok(result) => result.map_err(CycleError::from),
            Err(_) => Err(CycleError::PositionsUnavailable {
                exchange,
                reason: format!("timed out after {}s", limit.as_secs()),
            }),
        }
    }

    /// One request per distinct (exchange, symbol), all in flight together
    async fn fetch_rates(
        &self,
        pairs: &[ArbitragePair],
    ) -> HashMap<(Exchange, String), Result<FundingRate, RateUnavailable>> {
        let mut keys: Vec<(Exchange, String)> = Vec::new();
        for pair in pairs {
            for leg in [&pair.leg_a, &pair.leg_b] {
                let key = (leg.exchange, pair.symbol.clone());
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }

        let limit = self.settings.fetch_timeout();
        let requests = keys.iter().map(|(exchange, symbol)| {
            let connector = self.connector_for(*exchange);
            async move {
                match timeout(limit, connector.fetch_funding_rate(symbol)).await {
                    Ok(result) => result,
                    Err(_) => Err(RateUnavailable {
                        exchange: *exchange,
                        symbol: symbol.clone(),
                        reason: format!("timed out after {}s", limit.as_secs()),
                    }),
                }
            }
        });
        let results = join_all(requests).await;

        keys.into_iter().zip(results).collect()
    }

    fn connector_for(&self, exchange: Exchange) -> &Arc<dyn ExchangeConnector> {
        if self.exchange_a.exchange() == exchange {
            &self.exchange_a
        } else {
            &self.exchange_b
        }
    }

    fn should_deliver(&self, report: &CycleReport) -> bool {
        match self.settings.notify_mode {
            NotifyMode::Always => true,
            NotifyMode::AlertsOnly => report.has_alerts() || !report.is_clean(),
        }
    }

    async fn send_summary_if_due(&mut self) {
        let (Some(due), Some(interval)) = (self.next_summary_at, self.settings.summary_interval())
        else {
            return;
        };
        if Instant::now() < due {
            return;
        }
        let Some(stats) = self.stats.as_mut() else {
            return;
        };

        let now = Utc::now();
        let summary = stats.summary(now);
        match self.sink.deliver_summary(&summary).await {
            Ok(()) => {
                stats.reset(now);
                self.next_summary_at = Some(Instant::now() + interval);
            }
            Err(e) => {
                error!(error = %e, "Failed to deliver summary, keeping statistics");
                metrics::record_delivery_failure("summary");
            }
        }
    }

    async fn announce(&self, text: &str) {
        if let Err(e) = self.sink.announce(text).await {
            warn!(error = %e, "Failed to send announcement");
            metrics::record_delivery_failure("announcement");
        }
    }

    fn set_state(&self, state: SchedulerState) {
        self.state.send_replace(state);
    }
}

/// Sleep for `interval`. Returns false as soon as shutdown is requested or its
/// sender is gone; other updates of the channel do not end the sleep.
async fn sleep_until_next_cycle(
    interval: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return false;
                }
            }
        }
    }
}
