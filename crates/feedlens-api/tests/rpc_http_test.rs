//! HTTP-level tests for the JSON-RPC endpoint.
//!
//! Requests go through the full router (tracing and request-id layers
//! included) backed by the in-memory store and the scripted backend.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use feedlens_api::{router, AppState};
use feedlens_core::Comment;
use feedlens_db::MemoryStore;
use feedlens_inference::mock::MockGenerationBackend;
use feedlens_jobs::{
    CommentAnalysisHandler, CommentAnalyzer, DispatcherBuilder, DuplicateDetectionHandler,
    NgramHandler,
};

fn comment(user: &str, text: &str) -> Comment {
    Comment {
        id: 0,
        user_hash: user.into(),
        app_id: Some(1),
        title: Some("پشتیبانی".into()),
        description: Some(text.into()),
        grade: Some(2),
        sentiment_result: Some("negative".into()),
        created_at: None,
        is_repetitive: false,
        duplicate_of: None,
        is_analyzed: false,
    }
}

fn app(store: &MemoryStore) -> Router {
    let backend = Arc::new(MockGenerationBackend::new());
    let dispatcher = DispatcherBuilder::new()
        .with_handler(CommentAnalysisHandler::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            CommentAnalyzer::new(backend),
        ))
        .with_handler(NgramHandler::new(Arc::new(store.clone())))
        .with_handler(DuplicateDetectionHandler::new(Arc::new(store.clone())))
        .build();
    router(AppState::new(Arc::new(dispatcher)))
}

async fn post_raw(app: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn call(app: &Router, method: &str, params: Value) -> Value {
    let request = json!({"jsonrpc": "2.0", "method": method, "params": params, "id": 1});
    let (status, body) = post_raw(app, "/", &request.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    body
}

async fn poll_until_done(app: &Router, task_id: &Value) -> Value {
    for _ in 0..200 {
        let body = call(app, "check_task_status", json!([task_id])).await;
        let status = body["result"]["status"].as_str().unwrap().to_string();
        if status == "completed" || status == "failed" {
            return body["result"].clone();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {task_id} never finished");
}

#[tokio::test]
async fn test_parse_error_is_http_200() {
    let store = MemoryStore::new();
    let app = app(&store);

    let (status, body) = post_raw(&app, "/rpc", "{not json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"]["code"], -32700);
    assert_eq!(body["id"], Value::Null);
}

#[tokio::test]
async fn test_submit_then_poll_to_completion() {
    let store = MemoryStore::new();
    for user in ["a", "b", "c"] {
        store
            .add_comment(comment(user, "پشتیبانی جواب نمیده پشتیبانی ضعیف"))
            .await;
    }
    let app = app(&store);

    let started = call(&app, "ngram_analysis", json!({"sentiment": "negative", "top_k": 5})).await;
    let task_id = started["result"]["task_id"].clone();
    assert!(task_id.is_string());
    assert!(started["result"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Task started"));

    let view = poll_until_done(&app, &task_id).await;
    assert_eq!(view["status"], "completed");
    assert_eq!(view["error"], Value::Null);
    assert_eq!(view["result"]["document_count"], 3);
}

#[tokio::test]
async fn test_unknown_task_and_unknown_method() {
    let store = MemoryStore::new();
    let app = app(&store);

    let body = call(&app, "check_task_status", json!({"task_id": 999})).await;
    assert_eq!(body["result"]["status"], "error");
    assert_eq!(body["result"]["message"], "Task ID not found");

    let body = call(&app, "check_add_url", json!({})).await;
    assert_eq!(body["error"]["code"], -32601);
}

#[tokio::test]
async fn test_unregistered_job_is_submission_error() {
    let store = MemoryStore::new();
    let app = app(&store);

    let body = call(&app, "crawl_comments", json!({"app_ids": [1]})).await;
    assert_eq!(body["error"]["code"], -32000);
}

#[tokio::test]
async fn test_notification_gets_generic_body() {
    let store = MemoryStore::new();
    let app = app(&store);

    let request = json!({"jsonrpc": "2.0", "method": "duplicate_detection"});
    let (status, body) = post_raw(&app, "/", &request.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"error": "Internal server error"}));

    // The job itself still ran.
    let tasks = call(&app, "list_tasks", json!([])).await;
    assert_eq!(tasks["result"].as_object().unwrap().len(), 1);
}

#[tokio::test]
async fn test_request_id_header_is_set() {
    let store = MemoryStore::new();
    let app = app(&store);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["jobs"].as_array().unwrap().len(), 3);
}
