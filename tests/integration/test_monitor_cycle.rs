//! Matching, rate join and evaluation composed without a scheduler

use chrono::Utc;
use funding_rate_monitor::{
    connectors::Exchange,
    monitor::{
        build_report, rate_pairs, CycleError, Direction, FundingRate, PairMatcher, Position,
        RateJoiner,
    },
    RateUnavailable,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

fn rate_table(entries: &[(Exchange, &str, Decimal)]) -> HashMap<(Exchange, String), Decimal> {
    entries
        .iter()
        .map(|(exchange, symbol, rate)| ((*exchange, symbol.to_string()), *rate))
        .collect()
}

fn lookup(
    table: &HashMap<(Exchange, String), Decimal>,
) -> impl FnMut(Exchange, &str) -> Result<FundingRate, RateUnavailable> + '_ {
    move |exchange, symbol| match table.get(&(exchange, symbol.to_string())) {
        Some(rate) => Ok(FundingRate {
            exchange,
            symbol: symbol.to_string(),
            rate: *rate,
            as_of: Utc::now(),
            interval_hours: 8,
            next_funding_time: None,
        }),
        None => Err(RateUnavailable {
            exchange,
            symbol: symbol.to_string(),
            reason: "no quote".to_string(),
        }),
    }
}

#[test]
fn test_long_binance_short_bybit_pipeline() {
    let a = vec![Position::new(Exchange::Binance, "BTCUSDT", Direction::Long, dec!(1.0))];
    let b = vec![Position::new(Exchange::Bybit, "BTCUSDT", Direction::Short, dec!(1.0))];
    let table = rate_table(&[
        (Exchange::Binance, "BTCUSDT", dec!(0.000125)),
        (Exchange::Bybit, "BTCUSDT", dec!(-0.000089)),
    ]);

    let outcome = PairMatcher::new(Decimal::ZERO).match_positions(&a, &b);
    let (joined, errors) = RateJoiner::new(None).join(outcome.pairs, lookup(&table));
    let rated = rate_pairs(joined, Decimal::ZERO);
    let report = build_report(rated, errors, Utc::now()).with_unmatched(outcome.unmatched);

    assert!(report.is_clean());
    assert!(report.unmatched.is_empty());
    assert_eq!(report.rated_pairs.len(), 1);
    assert_eq!(report.rated_pairs[0].differential, dec!(-0.000214));
    assert!(report.rated_pairs[0].below_threshold);

    let text = report.render();
    assert!(text.contains("BTCUSDT x1"));
    assert!(text.contains("[ALERT]"));
    assert!(text.contains("-0.0214%"));
}

#[test]
fn test_differential_follows_role_not_exchange() {
    let a = vec![Position::new(Exchange::Binance, "BTCUSDT", Direction::Short, dec!(1.0))];
    let b = vec![Position::new(Exchange::Bybit, "BTCUSDT", Direction::Long, dec!(1.0))];
    let table = rate_table(&[
        (Exchange::Binance, "BTCUSDT", dec!(-0.000156)),
        (Exchange::Bybit, "BTCUSDT", dec!(0.000098)),
    ]);

    let outcome = PairMatcher::new(Decimal::ZERO).match_positions(&a, &b);
    let (joined, _) = RateJoiner::new(None).join(outcome.pairs, lookup(&table));
    let rated = rate_pairs(joined, Decimal::ZERO);

    assert_eq!(rated[0].differential, dec!(-0.000254));
    assert_eq!(rated[0].short_rate().exchange, Exchange::Binance);
    assert_eq!(rated[0].long_rate().exchange, Exchange::Bybit);
}

#[test]
fn test_missing_rate_drops_only_its_pair() {
    let a = vec![
        Position::new(Exchange::Binance, "BTCUSDT", Direction::Long, dec!(1)),
        Position::new(Exchange::Binance, "ETHUSDT", Direction::Short, dec!(10)),
    ];
    let b = vec![
        Position::new(Exchange::Bybit, "BTCUSDT", Direction::Short, dec!(1)),
        Position::new(Exchange::Bybit, "ETHUSDT", Direction::Long, dec!(10)),
    ];
    let table = rate_table(&[
        (Exchange::Binance, "BTCUSDT", dec!(0.0001)),
        (Exchange::Bybit, "BTCUSDT", dec!(0.0003)),
        (Exchange::Binance, "ETHUSDT", dec!(0.0001)),
    ]);

    let outcome = PairMatcher::new(Decimal::ZERO).match_positions(&a, &b);
    let (joined, errors) = RateJoiner::new(None).join(outcome.pairs, lookup(&table));
    let rated = rate_pairs(joined, Decimal::ZERO);

    assert_eq!(rated.len(), 1);
    assert_eq!(rated[0].symbol(), "BTCUSDT");
    assert_eq!(rated[0].differential, dec!(0.0002));
    assert!(!rated[0].below_threshold);
    assert_eq!(
        errors,
        vec![CycleError::RateUnavailable {
            exchange: Exchange::Bybit,
            symbol: "ETHUSDT".to_string(),
            reason: "no quote".to_string(),
        }]
    );
}

#[test]
fn test_same_direction_and_unknown_symbols_stay_unmatched() {
    let a = vec![
        Position::new(Exchange::Binance, "BTCUSDT", Direction::Long, dec!(1)),
        Position::new(Exchange::Binance, "SOLUSDT", Direction::Long, dec!(50)),
    ];
    let b = vec![
        Position::new(Exchange::Bybit, "BTCUSDT", Direction::Long, dec!(1)),
        Position::new(Exchange::Bybit, "XRPUSDT", Direction::Short, dec!(100)),
    ];

    let outcome = PairMatcher::new(Decimal::ZERO).match_positions(&a, &b);
    assert!(outcome.pairs.is_empty());
    assert_eq!(outcome.unmatched.len(), 4);

    let report = build_report(Vec::new(), Vec::new(), Utc::now()).with_unmatched(outcome.unmatched);
    let text = report.render();
    assert!(text.contains("No hedged pairs found"));
    assert!(text.contains("Unmatched positions:"));
}
