mod support;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use emotrack::classifier::Classifier;
use emotrack::router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use support::{face, noon_ago, now_ts, temp_db, test_state, FailingClassifier, ScriptedClassifier};

fn app_with(classifier: Arc<dyn Classifier>) -> (Router, TempDir) {
    let (db, guard) = temp_db();
    (router(test_state(db, classifier)), guard)
}

fn test_app() -> (Router, TempDir) {
    app_with(Arc::new(ScriptedClassifier::new(Vec::new())))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("request");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    send(app, request).await
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request");
    send(app, request).await
}

async fn post_bytes(app: &Router, uri: &str, body: Vec<u8>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(Body::from(body))
        .expect("build request");
    send(app, request).await
}

async fn delete(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    send(app, request).await
}

fn batch_body(records: &[(f64, &str)]) -> Value {
    let emotions: Vec<Value> = records
        .iter()
        .map(|(timestamp, emotion)| json!({ "timestamp": timestamp, "emotion": emotion }))
        .collect();
    json!({ "emotions": emotions })
}

#[tokio::test]
async fn root_reports_the_service_banner() {
    let (app, _guard) = test_app();
    let (status, body) = get(&app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "EmoTrack API is running");
}

#[tokio::test]
async fn health_reports_a_connected_store() {
    let (app, _guard) = test_app();
    let (status, body) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn batch_then_summary_roundtrip() {
    let (app, _guard) = test_app();
    let base = now_ts();

    let (status, body) = post_json(
        &app,
        "/emotions/batch",
        batch_body(&[
            (base - 30.0, "HAPPY"),
            (base - 20.0, "HAPPY"),
            (base - 10.0, "SAD"),
            (base - 5.0, "ANGRY"),
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Saved 4 emotions");

    let (status, body) = get(&app, "/emotions/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_emotions_recorded"], 4);

    let happy = &body["emotion_distribution"]["HAPPY"];
    assert_eq!(happy["count"], 2);
    let pct = happy["percentage"].as_f64().expect("percentage");
    assert!((pct - 50.0).abs() < 0.01);

    assert_eq!(body["most_recent"]["emotion"], "ANGRY");
    assert!(body["date_range"]["start"].is_string());
    assert!(body["date_range"]["end"].is_string());
}

#[tokio::test]
async fn summary_of_an_empty_store() {
    let (app, _guard) = test_app();
    let (status, body) = get(&app, "/emotions/summary").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_emotions_recorded"], 0);
    assert!(body["most_recent"]["emotion"].is_null());
    assert!(body["date_range"]["start"].is_null());
}

#[tokio::test]
async fn daily_stats_shape_and_window() {
    let (app, _guard) = test_app();
    let (today, today_date) = noon_ago(0);
    let (yesterday, _) = noon_ago(1);

    post_json(
        &app,
        "/emotions/batch",
        batch_body(&[
            (yesterday, "HAPPY"),
            (today, "CALM"),
            (today + 1.0, "CALM"),
        ]),
    )
    .await;

    let (status, body) = get(&app, "/emotions/daily-stats").await;
    assert_eq!(status, StatusCode::OK);

    let stats = body["stats"].as_array().expect("stats array");
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0]["date"], today_date.as_str());
    assert_eq!(stats[0]["emotion"], "CALM");
    assert_eq!(stats[0]["count"], 2);
    let pct = stats[0]["percentage"].as_f64().expect("percentage");
    assert!((pct - 100.0).abs() < 0.01);

    let (status, body) = get(&app, "/emotions/daily-stats?days=-5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"].as_array().expect("stats array").len(), 0);
}

#[tokio::test]
async fn export_serves_json_and_csv() {
    let (app, _guard) = test_app();
    let base = now_ts();

    post_json(
        &app,
        "/emotions/batch",
        batch_body(&[
            (base - 2.0, "HAPPY"),
            (base - 1.0, "SAD"),
            (base, "CALM"),
        ]),
    )
    .await;

    let (status, body) = get(&app, "/emotions/export").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["format"], "json");
    let rows = body["data"].as_array().expect("rows");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["emotion"], "CALM");
    for row in rows {
        assert!(row["id"].is_i64());
        assert!(row["timestamp"].is_f64());
        assert!(row["emotion"].is_string());
        assert!(row["created_at"].is_string());
    }

    let (status, body) = get(&app, "/emotions/export?format=csv").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["format"], "csv");
    let csv = body["data"].as_str().expect("csv string");
    assert_eq!(csv.lines().next(), Some("id,timestamp,emotion,created_at"));
    assert_eq!(csv.lines().count(), 4);
    let first_row = csv.lines().nth(1).expect("first row");
    assert_eq!(first_row.split(',').nth(2), Some("CALM"));
}

#[tokio::test]
async fn csv_export_quotes_labels_that_would_break_rows() {
    let (app, _guard) = test_app();
    let base = now_ts();

    post_json(
        &app,
        "/emotions/batch",
        batch_body(&[
            (base - 2.0, "CALM"),
            (base - 1.0, "HAPPY,SAD"),
            (base, r#"SAY "CHEESE""#),
        ]),
    )
    .await;

    let (status, body) = get(&app, "/emotions/export?format=csv").await;
    assert_eq!(status, StatusCode::OK);
    let csv = body["data"].as_str().expect("csv string");

    // A label holding the delimiter stays one field.
    assert!(csv.contains(r#","HAPPY,SAD","#));
    // Embedded quotes are doubled inside the wrapping quotes.
    assert!(csv.contains(r#","SAY ""CHEESE""","#));

    let plain_row = csv
        .lines()
        .find(|line| line.contains(",CALM,"))
        .expect("unquoted row");
    assert_eq!(plain_row.split(',').count(), 4);
}

#[tokio::test]
async fn export_rejects_unknown_formats() {
    let (app, _guard) = test_app();
    let (status, body) = get(&app, "/emotions/export?format=xml").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Format must be 'json' or 'csv', got 'xml'");
}

#[tokio::test]
async fn clear_requires_explicit_confirmation() {
    let (app, _guard) = test_app();
    let base = now_ts();

    post_json(
        &app,
        "/emotions/batch",
        batch_body(&[(base - 1.0, "HAPPY"), (base, "SAD")]),
    )
    .await;

    let (status, body) = delete(&app, "/emotions/clear").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["detail"],
        "Confirmation required. Use ?confirm=true to delete all emotion data"
    );

    let (status, _) = delete(&app, "/emotions/clear?confirm=false").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = get(&app, "/emotions/summary").await;
    assert_eq!(body["total_emotions_recorded"], 2, "refused clear deletes nothing");

    let (status, body) = delete(&app, "/emotions/clear?confirm=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Deleted 2 emotion records");

    let (_, body) = get(&app, "/emotions/summary").await;
    assert_eq!(body["total_emotions_recorded"], 0);
}

#[tokio::test]
async fn detect_emotion_reports_face_then_no_face() {
    let (app, _guard) = app_with(Arc::new(ScriptedClassifier::new(vec![face(
        "HAPPY", 97.5,
    )])));

    let (status, body) = post_bytes(&app, "/detect-emotion", b"jpeg bytes".to_vec()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["emotion"], "HAPPY");
    let confidence = body["confidence"].as_f64().expect("confidence");
    assert!((confidence - 97.5).abs() < 0.01);
    assert!(body["all_emotions"].is_array());

    // Script exhausted: the stub now reports no face.
    let (status, body) = post_bytes(&app, "/detect-emotion", b"jpeg bytes".to_vec()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["emotion"], "NO FACE");
    assert_eq!(body["confidence"], 0.0);
    assert!(body.get("all_emotions").is_none());
}

#[tokio::test]
async fn detect_emotion_rejects_an_empty_body() {
    let (app, _guard) = test_app();
    let (status, body) = post_bytes(&app, "/detect-emotion", Vec::new()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "No image data provided");
}

#[tokio::test]
async fn detect_emotion_surfaces_classifier_failures() {
    let (app, _guard) = app_with(Arc::new(FailingClassifier));
    let (status, body) = post_bytes(&app, "/detect-emotion", b"jpeg bytes".to_vec()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body["detail"].as_str().expect("detail");
    assert!(detail.starts_with("Emotion detection failed"));
}

#[tokio::test]
async fn malformed_batch_payloads_are_client_errors() {
    let (app, _guard) = test_app();

    let (status, _) = post_json(&app, "/emotions/batch", json!({ "emotions": "nope" })).await;
    assert!(status.is_client_error());

    let (status, _) = post_json(&app, "/emotions/batch", json!({})).await;
    assert!(status.is_client_error());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/emotions/batch")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .expect("build request");
    let (status, _) = send(&app, request).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn tracking_lifecycle_over_http() {
    let (app, _guard) = test_app();

    let (status, body) = post_json(&app, "/tracking/start", json!(null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running"], true);
    assert!(body["session_id"].is_string());

    let (status, body) = post_json(&app, "/tracking/start", json!(null)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "tracking already active");

    let (status, body) = get(&app, "/tracking/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running"], true);

    let (status, body) = post_json(&app, "/tracking/stop", json!(null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running"], false);
    assert_eq!(body["buffered"], 0);

    let (status, body) = post_json(&app, "/tracking/stop", json!(null)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "no tracking session active");

    let (status, body) = get(&app, "/tracking/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running"], false);
    assert!(body["session_id"].is_null());
}
