//! HTTP surface driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use ballot_nullables::{NullClock, NullRoundStore};
use ballot_rounds::{RoundConfig, RoundMetrics, RoundScheduler, VoteAggregator};
use ballot_rpc::{build_router, HistoryEntry, RpcState};
use ballot_store::RoundStore;
use ballot_types::{Clock, Timestamp, Winner, WinnerRule};
use ballot_websocket::BroadcastHub;
use serde_json::{json, Value};
use tower::ServiceExt;

struct Api {
    router: Router,
    store: Arc<NullRoundStore>,
    clock: Arc<NullClock>,
}

impl Api {
    fn new(config: RoundConfig) -> Self {
        let store = Arc::new(NullRoundStore::new());
        let clock = Arc::new(NullClock::new(1_000));
        let hub = Arc::new(BroadcastHub::default());
        let metrics = Arc::new(RoundMetrics::new().expect("metrics"));
        let aggregator = Arc::new(VoteAggregator::new(
            store.clone(),
            hub.clone(),
            clock.clone(),
            metrics.clone(),
            config.clone(),
        ));
        let scheduler = RoundScheduler::new(
            store.clone(),
            hub.clone(),
            clock.clone(),
            metrics.clone(),
            config,
        );
        let state = Arc::new(RpcState {
            aggregator,
            hub,
            metrics,
            scheduler: scheduler.handle(),
            send_timeout: Duration::from_secs(1),
        });
        Self {
            router: build_router(state),
            store,
            clock,
        }
    }

    async fn call(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.expect("call");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, bytes.to_vec())
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let (status, bytes) = self
            .call(Request::get(uri).body(Body::empty()).expect("req"))
            .await;
        (status, serde_json::from_slice(&bytes).expect("json"))
    }

    async fn vote(&self, option: &str) -> (StatusCode, Value) {
        let body = json!({ "option": option }).to_string();
        let (status, bytes) = self
            .call(
                Request::post("/api/voting/vote")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .expect("req"),
            )
            .await;
        (status, serde_json::from_slice(&bytes).expect("json"))
    }

    fn close_open_round(&self) {
        let open = self.store.get_open_round().unwrap().unwrap();
        self.store
            .close(open.id, WinnerRule::StrictMajority, self.clock.now())
            .unwrap();
    }
}

#[tokio::test]
async fn vote_returns_the_updated_snapshot() {
    let api = Api::new(RoundConfig::default());

    let (status, body) = api.vote("red").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["red_votes"], 1);
    assert_eq!(body["green_votes"], 0);
    assert_eq!(body["seconds_remaining"], 60);

    api.clock.advance(20);
    let (_, body) = api.vote("Green").await;
    assert_eq!(body["green_votes"], 1);
    assert_eq!(body["seconds_remaining"], 40);

    let (status, status_body) = api.get("/api/voting/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(status_body, body);
}

#[tokio::test]
async fn invalid_option_is_a_bad_request() {
    let api = Api::new(RoundConfig::default());

    let (status, body) = api.vote("blue").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("blue"));
    assert!(api.store.get_open_round().unwrap().is_none());
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let api = Api::new(RoundConfig::default());

    let (status, bytes) = api
        .call(
            Request::post("/api/voting/vote")
                .header("content-type", "application/json")
                .body(Body::from("{\"colour\":\"red\"}"))
                .expect("req"),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn cutoff_is_a_conflict() {
    let api = Api::new(RoundConfig {
        voting_cutoff_secs: 10,
        ..RoundConfig::default()
    });
    api.vote("red").await;
    api.clock.advance(55);

    let (status, body) = api.vote("red").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("cutoff"));
}

#[tokio::test]
async fn storage_outage_is_service_unavailable() {
    let api = Api::new(RoundConfig::default());
    api.store.set_unavailable(true);

    let (status, body) = api.vote("red").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());

    let (status, _) = api.get("/api/voting/status").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn status_without_a_round_is_idle() {
    let api = Api::new(RoundConfig::default());
    let (status, body) = api.get("/api/voting/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "round_id": null, "red_votes": 0, "green_votes": 0, "seconds_remaining": 0 })
    );
}

#[tokio::test]
async fn history_lists_closed_rounds_newest_first() {
    let api = Api::new(RoundConfig::default());

    for option in ["red", "green", "green"] {
        api.vote(option).await;
        api.clock.advance(60);
        api.close_open_round();
    }

    let (status, body) = api.get("/api/history?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    let entries: Vec<HistoryEntry> = serde_json::from_value(body).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].id > entries[1].id);
    assert_eq!(entries[0].winner, Some(Winner::Green));
    assert_eq!(entries[0].closed_at, Some(Timestamp::new(1_180)));

    let (_, all) = api.get("/api/history").await;
    assert_eq!(all.as_array().unwrap().len(), 3);
    assert_eq!(all[2]["winner"], "red");

    let (status, latest) = api.get("/api/history/latest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest, all[0]);
}

#[tokio::test]
async fn latest_is_null_before_any_close() {
    let api = Api::new(RoundConfig::default());
    let (status, body) = api.get("/api/history/latest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn history_limit_out_of_range_is_rejected() {
    let api = Api::new(RoundConfig::default());
    for uri in [
        "/api/history?limit=0",
        "/api/history?limit=501",
        "/api/history?limit=ten",
    ] {
        let (status, body) = api.get(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn health_reports_scheduler_state() {
    let api = Api::new(RoundConfig::default());
    let (status, body) = api.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["scheduler"], "idle");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn metrics_expose_vote_counters() {
    let api = Api::new(RoundConfig::default());
    api.vote("green").await;
    api.vote("blue").await;

    let (status, bytes) = api
        .call(Request::get("/metrics").body(Body::empty()).expect("req"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("ballot_votes_accepted_total{color=\"green\"} 1"));
    assert!(text.contains("ballot_votes_rejected_total 1"));
    assert!(text.contains("ballot_subscribers 0"));
}

#[tokio::test]
async fn cors_preflight_is_allowed() {
    let api = Api::new(RoundConfig::default());
    let response = api
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/voting/vote")
                .header("origin", "http://localhost:5173")
                .header("access-control-request-method", "POST")
                .body(Body::empty())
                .expect("req"),
        )
        .await
        .expect("call");
    assert!(response.status().is_success());
    assert!(response
        .headers()
        .contains_key("access-control-allow-origin"));
}
