use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use tower::ServiceExt;

use candle_sim::api::{router, AppState};
use candle_sim::model::candle::Candle;
use candle_sim::simulation::{EngineOptions, JsonFileStateStore, SimulationEngine};
use candle_sim::storage::CsvCandleStore;

fn temp_data_dir(test_name: &str) -> PathBuf {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be monotonic")
        .as_nanos();
    std::env::temp_dir().join(format!("csim-api-{}-{}", test_name, ts))
}

fn test_app(test_name: &str, points: usize) -> (Router, PathBuf) {
    let dir = temp_data_dir(test_name);
    let candles = CsvCandleStore::new(&dir);
    let history: Vec<Candle> = (0..5)
        .map(|i| {
            let t = 1_704_067_200_000 + i as u64 * 3_600_000;
            let o = 20.5 + i as f64;
            Candle::from_ohlc(t, t + 3_599_999, o, o + 1.0, o - 1.0, o + 0.25)
        })
        .collect();
    candles
        .write_window("AVAXUSDT", "recent", "1h", &history)
        .unwrap();

    let engine = SimulationEngine::new(
        candles.clone(),
        JsonFileStateStore::new(dir.join("simulation_state.json")),
        StdRng::seed_from_u64(8),
        EngineOptions {
            points_per_candle: points,
            ..EngineOptions::default()
        },
    )
    .unwrap();
    (router(AppState::new(engine, candles)), dir)
}

async fn call(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_and_root() {
    let (app, dir) = test_app("health", 4);
    let (status, body) = call(&app, Method::GET, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

    let (status, body) = call(&app, Method::GET, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "candle-sim");
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn price_advances_and_reports_progress() {
    let (app, dir) = test_app("price", 4);

    let (status, body) = call(&app, Method::GET, "/market/price?symbol=avaxusdt&interval=1h").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbol"], "AVAXUSDT");
    assert_eq!(body["price"], 20.5);
    assert_eq!(body["timestamp"], "2024-01-01T00:00:00.000Z");
    let progress = &body["simulation_progress"];
    assert_eq!(progress["candle_index"], 0);
    assert_eq!(progress["point_index"], 0);
    assert_eq!(progress["total_candles"], 5);
    assert_eq!(progress["total_points"], 4);

    // Defaults resolve to AVAXUSDT / 1h.
    let (status, body) = call(&app, Method::GET, "/market/price").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["simulation_progress"]["point_index"], 1);
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn price_for_unknown_symbol_is_404() {
    let (app, dir) = test_app("unknown", 4);
    let (status, body) = call(&app, Method::GET, "/market/price?symbol=DOGEUSDT&interval=1h").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("DOGEUSDT"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn invalid_interval_is_400() {
    let (app, dir) = test_app("bad-interval", 4);
    let (status, body) = call(&app, Method::GET, "/market/price?interval=7x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn reset_restarts_the_feed() {
    let (app, dir) = test_app("reset", 4);
    for _ in 0..6 {
        let (status, _) = call(&app, Method::GET, "/market/price").await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = call(
        &app,
        Method::POST,
        "/market/reset-simulation?symbol=AVAXUSDT&interval=1h",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert!(body["timestamp"].is_string());

    let (_, body) = call(&app, Method::GET, "/market/price").await;
    assert_eq!(body["simulation_progress"]["candle_index"], 0);
    assert_eq!(body["simulation_progress"]["point_index"], 0);
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn candles_are_limited_to_the_tail() {
    let (app, dir) = test_app("candles", 4);

    let (status, body) = call(&app, Method::GET, "/market/candles?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["interval"], "1h");
    let candles = body["candles"].as_array().unwrap();
    assert_eq!(candles.len(), 2);
    assert_eq!(candles[0]["open"], 23.5);
    assert_eq!(candles[1]["open"], 24.5);
    assert_eq!(candles[1]["number_of_trades"], 0);
    assert!(candles[0]["datetime"].is_string());

    let (status, body) = call(&app, Method::GET, "/market/candles?symbol=ETHUSDT").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["candles"].as_array().unwrap().is_empty());
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn candles_limit_out_of_range_is_400() {
    let (app, dir) = test_app("limit", 4);
    let (status, _) = call(&app, Method::GET, "/market/candles?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call(&app, Method::GET, "/market/candles?limit=1001").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn concurrent_requests_never_share_a_point() {
    let (app, dir) = test_app("concurrent", 60);
    let app = Arc::new(app);
    let mut handles = Vec::new();
    for _ in 0..20 {
        let app = Arc::clone(&app);
        handles.push(tokio::spawn(async move {
            let (_, body) = call(&app, Method::GET, "/market/price").await;
            body["simulation_progress"]["point_index"].as_u64().unwrap()
        }));
    }
    let mut seen = Vec::new();
    for h in handles {
        seen.push(h.await.unwrap());
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..20).collect::<Vec<u64>>());
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn unreadable_candle_file_is_500() {
    let (app, dir) = test_app("unreadable", 4);
    std::fs::write(dir.join("SOLUSDT_recent_1h.csv"), "time,open\nnot-a-number,1.0\n").unwrap();

    let (status, body) = call(&app, Method::GET, "/market/candles?symbol=SOLUSDT").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());

    let (status, _) = call(&app, Method::GET, "/market/price?symbol=SOLUSDT").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    // Other keys keep working after a failed load.
    let (status, _) = call(&app, Method::GET, "/market/price").await;
    assert_eq!(status, StatusCode::OK);
    let _ = std::fs::remove_dir_all(&dir);
}
