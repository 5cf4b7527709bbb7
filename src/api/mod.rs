use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    classifier::{Classifier, Detection, EmotionScore, NO_FACE},
    db::{Database, EmotionRecord, EmotionStat, EmotionSummary, StoredEmotion},
    tracker::{TrackerController, TrackerStatus},
};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub classifier: Arc<dyn Classifier>,
    pub tracker: TrackerController,
}

/// Error envelope for every handler: FastAPI-style `{"detail": ...}` body.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("request failed: {}", self.message);
        }
        (self.status, Json(json!({ "detail": self.message }))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(format!("{err:#}"))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/detect-emotion", post(detect_emotion))
        .route("/emotions/batch", post(save_batch))
        .route("/emotions/summary", get(emotions_summary))
        .route("/emotions/daily-stats", get(emotions_daily_stats))
        .route("/emotions/export", get(emotions_export))
        .route("/emotions/clear", delete(emotions_clear))
        .route("/tracking/start", post(tracking_start))
        .route("/tracking/stop", post(tracking_stop))
        .route("/tracking/status", get(tracking_status))
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "EmoTrack API is running" }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    match state.db.ping().await {
        Ok(()) => Json(json!({ "status": "healthy", "database": "connected" })),
        Err(err) => Json(json!({ "status": "unhealthy", "error": format!("{err:#}") })),
    }
}

#[derive(Serialize)]
struct DetectResponse {
    emotion: String,
    confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    all_emotions: Option<Vec<EmotionScore>>,
}

async fn detect_emotion(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DetectResponse>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::bad_request("No image data provided"));
    }

    let detection = state
        .classifier
        .classify(&body)
        .await
        .map_err(|err| ApiError::internal(format!("Emotion detection failed: {err}")))?;

    let response = match detection {
        Detection::Face {
            emotion,
            confidence,
            all_emotions,
        } => DetectResponse {
            emotion,
            confidence,
            all_emotions: Some(all_emotions),
        },
        Detection::NoFace => DetectResponse {
            emotion: NO_FACE.to_string(),
            confidence: 0.0,
            all_emotions: None,
        },
    };

    Ok(Json(response))
}

#[derive(Deserialize)]
struct BatchRequest {
    emotions: Vec<EmotionRecord>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

async fn save_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let saved = state.db.insert_emotions(request.emotions).await?;
    Ok(Json(MessageResponse {
        message: format!("Saved {saved} emotions"),
    }))
}

async fn emotions_summary(
    State(state): State<AppState>,
) -> Result<Json<EmotionSummary>, ApiError> {
    let summary = state.db.summary().await?;
    Ok(Json(summary))
}

#[derive(Deserialize)]
struct DailyStatsQuery {
    days: Option<i64>,
}

#[derive(Serialize)]
struct DailyStatsResponse {
    stats: Vec<EmotionStat>,
}

async fn emotions_daily_stats(
    State(state): State<AppState>,
    Query(query): Query<DailyStatsQuery>,
) -> Result<Json<DailyStatsResponse>, ApiError> {
    let stats = state.db.daily_stats(query.days.unwrap_or(7)).await?;
    Ok(Json(DailyStatsResponse { stats }))
}

#[derive(Deserialize)]
struct ExportQuery {
    format: Option<String>,
}

#[derive(Serialize)]
struct ExportResponse {
    format: &'static str,
    data: ExportData,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ExportData {
    Rows(Vec<StoredEmotion>),
    Csv(String),
}

async fn emotions_export(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Json<ExportResponse>, ApiError> {
    let format = query.format.unwrap_or_else(|| "json".to_string());

    let rows = match format.as_str() {
        "json" | "csv" => state.db.export_all().await?,
        other => {
            return Err(ApiError::bad_request(format!(
                "Format must be 'json' or 'csv', got '{other}'"
            )))
        }
    };

    let response = match format.as_str() {
        "json" => ExportResponse {
            format: "json",
            data: ExportData::Rows(rows),
        },
        _ => ExportResponse {
            format: "csv",
            data: ExportData::Csv(to_csv(&rows)),
        },
    };

    Ok(Json(response))
}

fn to_csv(rows: &[StoredEmotion]) -> String {
    let mut out = String::from("id,timestamp,emotion,created_at\n");
    for row in rows {
        out.push_str(&format!(
            "{},{},{},{}\n",
            row.id,
            row.timestamp,
            csv_field(&row.emotion),
            csv_field(row.created_at.as_deref().unwrap_or(""))
        ));
    }
    out
}

/// RFC 4180 quoting. Labels are stored verbatim, so a field can carry the
/// delimiter itself.
fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[derive(Deserialize)]
struct ClearQuery {
    confirm: Option<bool>,
}

async fn emotions_clear(
    State(state): State<AppState>,
    Query(query): Query<ClearQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !query.confirm.unwrap_or(false) {
        return Err(ApiError::bad_request(
            "Confirmation required. Use ?confirm=true to delete all emotion data",
        ));
    }

    let deleted = state.db.clear_all(true).await?;
    Ok(Json(MessageResponse {
        message: format!("Deleted {deleted} emotion records"),
    }))
}

async fn tracking_start(
    State(state): State<AppState>,
) -> Result<Json<TrackerStatus>, ApiError> {
    if state.tracker.is_running().await {
        return Err(ApiError::conflict("tracking already active"));
    }

    let status = state.tracker.start().await?;
    Ok(Json(status))
}

async fn tracking_stop(State(state): State<AppState>) -> Result<Json<TrackerStatus>, ApiError> {
    match state.tracker.stop().await? {
        Some(status) => Ok(Json(status)),
        None => Err(ApiError::conflict("no tracking session active")),
    }
}

async fn tracking_status(State(state): State<AppState>) -> Json<TrackerStatus> {
    Json(state.tracker.status().await)
}
