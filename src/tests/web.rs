use axum::{
    body::Body,
    extract::Request,
    http::StatusCode,
    response::Response,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt; // for .oneshot()

use crate::app_state::AppState;
use crate::config_loader::ExplainerConfig;
use crate::filterweb::{build_filter_router, FilterRequest, TEXT_NOT_A_STRING};
use crate::tests::test_utils::{filter_with, keyword_filter, KeywordClassifier};

fn build_app() -> Router {
    let state = Arc::new(AppState::new(keyword_filter(), Some("sha256:test".to_string())));
    build_filter_router(state)
}

fn filter_request(body: impl Into<Body>) -> Request {
    Request::builder()
        .uri("/api/filter/text")
        .method("POST")
        .header("Content-Type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn filter_returns_200_for_benign_text() {
    let payload = FilterRequest {
        text: Some("hello world".to_string()),
    };
    let response = build_app()
        .oneshot(filter_request(serde_json::to_string(&payload).unwrap()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let predictions = body["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 2);
    let sum: f64 = predictions.iter().map(|p| p.as_f64().unwrap()).sum();
    assert!((sum - 1.0).abs() < 1e-5);
    assert_eq!(body["explanation"].as_array().unwrap().len(), 4);
    assert_eq!(body["blocked"], json!(false));
}

#[tokio::test]
async fn filter_blocks_above_threshold() {
    let response = build_app()
        .oneshot(filter_request(json!({ "text": "free money now" }).to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["blocked"], json!(true));
    assert!(body["predictions"][1].as_f64().unwrap() > 0.913);
}

#[tokio::test]
async fn missing_text_is_400() {
    let response = build_app().oneshot(filter_request("{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({ "error": "No text provided" }));
}

#[tokio::test]
async fn empty_or_null_text_is_400() {
    for payload in [json!({ "text": "" }), json!({ "text": null })] {
        let response = build_app()
            .oneshot(filter_request(payload.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], json!("No text provided"));
    }
}

#[tokio::test]
async fn malformed_body_is_400() {
    let response = build_app().oneshot(filter_request("not json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], json!("No text provided"));
}

#[tokio::test]
async fn non_string_text_is_400_with_its_own_message() {
    let response = build_app()
        .oneshot(filter_request(json!({ "text": 123 }).to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({ "error": TEXT_NOT_A_STRING }));
}

#[tokio::test]
async fn text_larger_than_default_body_limit_is_accepted() {
    // ~2.4 MB, above axum's 2 MB default; the tokenizer truncates it
    let text = "hello ".repeat(400_000);
    let response = build_app()
        .oneshot(filter_request(json!({ "text": text }).to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["explanation"].as_array().unwrap().len(), 512);
    assert_eq!(body["blocked"], json!(false));
}

#[tokio::test]
async fn tokenizer_failure_is_500_with_message() {
    let filter = filter_with(KeywordClassifier::failing(), ExplainerConfig::default());
    let app = build_filter_router(Arc::new(AppState::new(filter, None)));

    let response = app
        .oneshot(filter_request(json!({ "text": "hello" }).to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Tokenization failed: simulated tokenizer failure" })
    );
}

#[tokio::test]
async fn status_reports_model_and_threshold() {
    let req = Request::builder()
        .uri("/api/filter/status")
        .body(Body::empty())
        .unwrap();
    let response = build_app().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["model"]["model_id"], json!("keyword-test"));
    assert_eq!(body["model"]["fingerprint"], json!("sha256:test"));
    assert_eq!(body["blocked_label"], json!("blocked"));
    assert_eq!(body["explainer"], json!("permutation"));
    assert!((body["block_threshold"].as_f64().unwrap() - 0.913).abs() < 1e-6);
}

#[tokio::test]
async fn health_endpoints_respond() {
    let app = build_app();
    let health = app
        .clone()
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(json_body(health).await, json!({ "status": "ok" }));

    let ready = app
        .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(ready.status(), StatusCode::OK);
    assert_eq!(json_body(ready).await["ready"], json!(true));
}
