//! Scheduler behaviour against stub exchanges

use crate::{scheduler_parts, RecordingSink, StubConnector, TestUtils};
use funding_rate_monitor::{
    connectors::Exchange,
    monitor::{CycleError, CycleScheduler, Direction, SchedulerState},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;
use tokio::sync::watch;

#[tokio::test]
async fn test_run_once_delivers_report() {
    let (a, b, sink) = scheduler_parts(
        StubConnector::new(Exchange::Binance)
            .with_position("BTCUSDT", Direction::Short, dec!(1.0))
            .with_rate("BTCUSDT", dec!(-0.000156)),
        StubConnector::new(Exchange::Bybit)
            .with_position("BTCUSDT", Direction::Long, dec!(1.0))
            .with_rate("BTCUSDT", dec!(0.000098)),
        RecordingSink::default(),
    );

    let settings = TestUtils::settings(Decimal::ZERO);
    let mut scheduler = CycleScheduler::new(a.clone(), b.clone(), sink.clone(), settings);
    let report = scheduler.run_once().await;

    assert_eq!(report.rated_pairs.len(), 1);
    assert_eq!(report.rated_pairs[0].differential, dec!(-0.000254));
    assert!(report.rated_pairs[0].below_threshold);
    assert_eq!(sink.reports(), vec![report]);
    assert_eq!(scheduler.state(), SchedulerState::Idle);
}

#[tokio::test]
async fn test_rates_requested_once_per_exchange_and_symbol() {
    let (a, b, sink) = scheduler_parts(
        StubConnector::new(Exchange::Binance)
            .with_position("BTCUSDT", Direction::Long, dec!(2))
            .with_position("BTCUSDT", Direction::Long, dec!(1))
            .with_rate("BTCUSDT", dec!(0.0001)),
        StubConnector::new(Exchange::Bybit)
            .with_position("BTCUSDT", Direction::Short, dec!(1))
            .with_position("BTCUSDT", Direction::Short, dec!(2))
            .with_rate("BTCUSDT", dec!(0.0001)),
        RecordingSink::default(),
    );

    let settings = TestUtils::settings(Decimal::ZERO);
    let mut scheduler = CycleScheduler::new(a.clone(), b.clone(), sink, settings);
    let report = scheduler.run_once().await;

    assert_eq!(report.rated_pairs.len(), 2);
    assert_eq!(report.rated_pairs[0].pair.leg_a.quantity, dec!(2));
    assert_eq!(report.rated_pairs[0].pair.leg_b.quantity, dec!(2));
    assert_eq!(a.rate_calls(), vec!["BTCUSDT".to_string()]);
    assert_eq!(b.rate_calls(), vec!["BTCUSDT".to_string()]);
}

#[tokio::test]
async fn test_slow_exchange_times_out() {
    let (a, b, sink) = scheduler_parts(
        StubConnector::new(Exchange::Binance)
            .with_position("BTCUSDT", Direction::Long, dec!(1))
            .with_delay(Duration::from_secs(3)),
        StubConnector::new(Exchange::Bybit).with_position("BTCUSDT", Direction::Short, dec!(1)),
        RecordingSink::default(),
    );

    let mut scheduler = CycleScheduler::new(a, b, sink.clone(), TestUtils::settings(Decimal::ZERO));
    let report = scheduler.run_once().await;

    assert!(report.rated_pairs.is_empty());
    assert_eq!(
        report.errors,
        vec![CycleError::PositionsUnavailable {
            exchange: Exchange::Binance,
            reason: "timed out after 1s".to_string(),
        }]
    );
    assert_eq!(report.unmatched.len(), 1);
    assert_eq!(report.unmatched[0].exchange, Exchange::Bybit);
    assert_eq!(sink.reports().len(), 1);
}

#[tokio::test]
async fn test_failed_delivery_keeps_running() {
    let (a, b, sink) = scheduler_parts(
        StubConnector::new(Exchange::Binance).failing("maintenance"),
        StubConnector::new(Exchange::Bybit),
        RecordingSink::failing(),
    );

    let settings = TestUtils::settings(Decimal::ZERO);
    let mut scheduler = CycleScheduler::new(a.clone(), b.clone(), sink.clone(), settings);
    let first = scheduler.run_once().await;
    let second = scheduler.run_once().await;

    assert_eq!(first.errors.len(), 1);
    assert_eq!(second.errors.len(), 1);
    assert_eq!(a.position_calls(), 2);
    assert_eq!(b.position_calls(), 2);
    assert!(sink.reports().is_empty());
}

#[tokio::test]
async fn test_run_forever_stops_on_shutdown() {
    let (a, b, sink) = scheduler_parts(
        StubConnector::new(Exchange::Binance)
            .with_position("ETHUSDT", Direction::Long, dec!(10))
            .with_rate("ETHUSDT", dec!(0.0001)),
        StubConnector::new(Exchange::Bybit)
            .with_position("ETHUSDT", Direction::Short, dec!(10))
            .with_rate("ETHUSDT", dec!(0.00005)),
        RecordingSink::default(),
    );

    let mut settings = TestUtils::settings(Decimal::ZERO);
    settings.summary_interval_minutes = Some(0);

    let mut scheduler = CycleScheduler::new(a, b, sink.clone(), settings);
    let state = scheduler.subscribe_state();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        scheduler.run_forever(shutdown_rx).await;
    });

    let sleeping = TestUtils::wait_for_condition(
        || sink.summaries().len() == 1 && *state.borrow() == SchedulerState::Sleeping,
        Duration::from_secs(3),
    )
    .await;
    assert!(sleeping, "first cycle did not complete");

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(3), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();

    assert_eq!(*state.borrow(), SchedulerState::Terminated);

    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].rated_pairs[0].differential, dec!(-0.00005));

    let summaries = sink.summaries();
    assert_eq!(summaries[0].total_checks, 1);
    assert_eq!(summaries[0].total_alerts, 1);

    let announcements = sink.announcements();
    assert_eq!(announcements.len(), 2);
    assert!(announcements[0].contains("started"));
    assert!(announcements[1].contains("stopped"));
}

#[tokio::test]
async fn test_run_forever_stops_when_sender_dropped() {
    let (a, b, sink) = scheduler_parts(
        StubConnector::new(Exchange::Binance),
        StubConnector::new(Exchange::Bybit),
        RecordingSink::default(),
    );

    let settings = TestUtils::settings(Decimal::ZERO);
    let mut scheduler = CycleScheduler::new(a.clone(), b, sink.clone(), settings);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        scheduler.run_forever(shutdown_rx).await;
        scheduler.state()
    });

    let ran =
        TestUtils::wait_for_condition(|| a.position_calls() == 1, Duration::from_secs(3)).await;
    assert!(ran);
    drop(shutdown_tx);

    let state = tokio::time::timeout(Duration::from_secs(3), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();
    assert_eq!(state, SchedulerState::Terminated);
    assert_eq!(sink.reports().len(), 1);
}

#[tokio::test]
async fn test_update_without_shutdown_keeps_sleeping() {
    let (a, b, sink) = scheduler_parts(
        StubConnector::new(Exchange::Binance),
        StubConnector::new(Exchange::Bybit),
        RecordingSink::default(),
    );

    let settings = TestUtils::settings(Decimal::ZERO);
    let mut scheduler = CycleScheduler::new(a.clone(), b, sink, settings);
    let state = scheduler.subscribe_state();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        scheduler.run_forever(shutdown_rx).await;
    });

    let sleeping = TestUtils::wait_for_condition(
        || *state.borrow() == SchedulerState::Sleeping,
        Duration::from_secs(3),
    )
    .await;
    assert!(sleeping);

    shutdown_tx.send(false).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(a.position_calls(), 1);
    assert_eq!(*state.borrow(), SchedulerState::Sleeping);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(3), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();
    assert_eq!(a.position_calls(), 1);
}
