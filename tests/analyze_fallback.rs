// tests/analyze_fallback.rs
//
// Model-backend degradation policy, exercised against a local mock of the
// completions endpoint:
// - invalid rubric output → one strict retry → success
// - invalid output twice → stub values marked "fallback-stub"
// - transport/http errors → stub values, no retry
// - backend selection is a pure function of credential presence

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde_json::{json, Value};

use mena_signal::analyze::{build_backend_from_config, ModelBackend, ScoreBackend};
use mena_signal::config::ai::AiConfig;
use mena_signal::item::{ItemDetails, ItemType};

use common::spawn_router;

const VALID_CONTENT: &str = r#"{
    "fit_score": 64,
    "mena_summary": "Strong GCC enterprise fit.",
    "rubric": {
        "budget_buyer_exists": 16,
        "localization_arabic_bilingual": 12,
        "regulatory_friction": 12,
        "distribution_path": 14,
        "time_to_revenue": 10
    }
}"#;

const INVALID_CONTENT: &str = r#"{
    "fit_score": 90,
    "mena_summary": "Numbers do not add up.",
    "rubric": {
        "budget_buyer_exists": 10,
        "localization_arabic_bilingual": 10,
        "regulatory_friction": 10,
        "distribution_path": 10,
        "time_to_revenue": 10
    }
}"#;

#[derive(Clone)]
struct MockModel {
    calls: Arc<AtomicUsize>,
    /// Content returned per call, last entry repeated.
    replies: Arc<Vec<&'static str>>,
}

async fn completions(State(mock): State<MockModel>) -> Json<Value> {
    let n = mock.calls.fetch_add(1, Ordering::SeqCst);
    let content = mock.replies.get(n).or_else(|| mock.replies.last()).unwrap();
    Json(json!({ "choices": [ { "message": { "content": content } } ] }))
}

async fn spawn_mock(replies: Vec<&'static str>) -> (String, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let mock = MockModel {
        calls: calls.clone(),
        replies: Arc::new(replies),
    };
    let router = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(mock);
    let base = spawn_router(router).await;
    (base, calls)
}

fn backend_for(base: &str) -> ModelBackend {
    let cfg = AiConfig {
        base_url: format!("{base}/v1"),
        ..AiConfig::default()
    };
    ModelBackend::new(&cfg, "sk-test".into())
}

fn snapshot() -> mena_signal::analyze::ItemSnapshot {
    mena_signal::analyze::ItemSnapshot {
        title: "Acme raises $12M Series A".into(),
        company_name: Some("Acme".into()),
        item_type: ItemType::Funding,
        summary: Some("Riyadh fintech".into()),
        details: ItemDetails::default(),
    }
}

#[tokio::test]
async fn invalid_output_retries_once_then_succeeds() {
    let (base, calls) = spawn_mock(vec![INVALID_CONTENT, VALID_CONTENT]).await;
    let backend = backend_for(&base);

    let analysis = backend.score(&snapshot()).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2, "exactly one retry");
    assert_eq!(analysis.fit_score, 64);
    assert_eq!(analysis.rubric.sum(), 64);
    assert_eq!(analysis.model_name, "gpt-4o-mini");
}

#[tokio::test]
async fn persistently_invalid_output_degrades_to_stub_values() {
    let (base, calls) = spawn_mock(vec![INVALID_CONTENT, INVALID_CONTENT]).await;
    let backend = backend_for(&base);

    let analysis = backend.score(&snapshot()).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2, "retry budget is one");
    assert_eq!(analysis.fit_score, 50);
    assert_eq!(analysis.rubric.dimensions(), [10, 10, 10, 10, 10]);
    assert_eq!(analysis.model_name, "fallback-stub");
}

#[tokio::test]
async fn prose_reply_also_degrades() {
    let (base, _calls) = spawn_mock(vec!["Sounds promising, high fit!"]).await;
    let backend = backend_for(&base);

    let analysis = backend.score(&snapshot()).await;
    assert_eq!(analysis.model_name, "fallback-stub");
}

#[tokio::test]
async fn unreachable_endpoint_degrades_without_retry() {
    let cfg = AiConfig {
        base_url: "http://127.0.0.1:1/v1".into(),
        request_timeout_secs: 2,
        ..AiConfig::default()
    };
    let backend = ModelBackend::new(&cfg, "sk-test".into());

    let analysis = backend.score(&snapshot()).await;
    assert_eq!(analysis.fit_score, 50);
    assert_eq!(analysis.model_name, "fallback-stub");
}

#[tokio::test]
async fn http_error_degrades_after_a_single_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let router = Router::new().route(
        "/v1/chat/completions",
        post(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                (axum::http::StatusCode::TOO_MANY_REQUESTS, "rate limited")
            }
        }),
    );
    let base = spawn_router(router).await;
    let backend = backend_for(&base);

    let analysis = backend.score(&snapshot()).await;
    assert_eq!(analysis.model_name, "fallback-stub");
    assert_eq!(
        calls.load(Ordering::SeqCst),
        1,
        "transport/status failures skip the strict retry"
    );
}

#[tokio::test]
async fn backend_selection_follows_credential_presence() {
    let without = AiConfig::default();
    assert_eq!(build_backend_from_config(&without).name(), "stub");

    let with = AiConfig {
        api_key: "sk-test".into(),
        ..AiConfig::default()
    };
    assert_eq!(build_backend_from_config(&with).name(), "model");
}
