//! Full cycle over HTTP: real connectors and notifier against a mock server

use crate::TestUtils;
use funding_rate_monitor::{
    config::{ExchangeConfig, TelegramConfig},
    connectors::{ConnectorFactory, Exchange},
    monitor::CycleScheduler,
    TelegramNotifier,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn bybit_ok(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "retCode": 0,
        "retMsg": "OK",
        "result": result,
        "time": 1672280219169i64
    }))
}

async fn mount_exchanges(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/fapi/v2/positionRisk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"symbol": "BTCUSDT", "positionAmt": "1.000", "positionSide": "BOTH"},
            {"symbol": "DOGEUSDT", "positionAmt": "-5000", "positionSide": "BOTH"}
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/fapi/v1/premiumIndex"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "symbol": "BTCUSDT",
            "lastFundingRate": "0.00012500",
            "nextFundingTime": 1597392000000i64,
            "time": 1597370495002i64
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/fapi/v1/fundingInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v5/position/list"))
        .respond_with(bybit_ok(serde_json::json!({
            "category": "linear",
            "list": [{"symbol": "BTCUSDT", "side": "Sell", "size": "1"}],
            "nextPageCursor": ""
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v5/market/tickers"))
        .respond_with(bybit_ok(serde_json::json!({
            "category": "linear",
            "list": [{
                "symbol": "BTCUSDT",
                "fundingRate": "-0.000089",
                "nextFundingTime": "1673280000000"
            }]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v5/market/instruments-info"))
        .respond_with(bybit_ok(serde_json::json!({
            "category": "linear",
            "list": [{"symbol": "BTCUSDT", "fundingInterval": 480}]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_cycle_over_http_reaches_telegram() {
    let server = MockServer::start().await;
    mount_exchanges(&server).await;

    Mock::given(method("POST"))
        .and(path("/bot42:token/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "result": {"message_id": 7}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let exchange_config = ExchangeConfig {
        api_key: "key".to_string(),
        api_secret: "secret".to_string(),
        rest_api_url: Some(server.uri()),
        ..Default::default()
    };
    let telegram_config = TelegramConfig {
        bot_token: "42:token".to_string(),
        chat_id: "1001".to_string(),
        api_url: Some(server.uri()),
    };
    let timeout = Duration::from_secs(5);

    let binance =
        ConnectorFactory::create_connector(Exchange::Binance, &exchange_config, timeout).unwrap();
    let bybit =
        ConnectorFactory::create_connector(Exchange::Bybit, &exchange_config, timeout).unwrap();
    let notifier = Arc::new(TelegramNotifier::new(&telegram_config, timeout).unwrap());

    let settings = TestUtils::settings(Decimal::ZERO);
    let mut scheduler = CycleScheduler::new(binance, bybit, notifier, settings);
    let report = scheduler.run_once().await;

    assert!(report.is_clean(), "unexpected errors: {:?}", report.errors);
    assert_eq!(report.rated_pairs.len(), 1);
    assert_eq!(report.rated_pairs[0].differential, dec!(-0.000214));
    assert_eq!(report.unmatched.len(), 1);
    assert_eq!(report.unmatched[0].symbol, "DOGEUSDT");

    let requests = server.received_requests().await.unwrap();
    let message = requests
        .iter()
        .find(|r| r.url.path() == "/bot42:token/sendMessage")
        .expect("no Telegram message sent");
    let body: serde_json::Value = serde_json::from_slice(&message.body).unwrap();
    let text = body["text"].as_str().unwrap();
    assert_eq!(body["chat_id"], "1001");
    assert!(text.starts_with("```"));
    assert!(text.contains("BTCUSDT x1"));
    assert!(text.contains("[ALERT]"));
    assert!(text.contains("DOGEUSDT"));
}
