//! HTTP surface for Syllatrack.
//!
//! A thin axum layer over [`Tracker`]: each handler maps a request onto one
//! tracker operation and its result onto a status code and JSON body.

mod error;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use syllatrack_core::insights::Insights;
use syllatrack_core::{NewCourse, NewTask, Tracker};
use syllatrack_shared::dates::{parse_date_safe, today_local};
use syllatrack_shared::{Course, Result, SyllatrackError, Task};

pub use error::ApiError;

/// Largest accepted request body; uploads arrive base64-encoded.
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Application state shared across HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub tracker: Tracker,
    /// Upcoming-list length when a request names none.
    pub upcoming_limit: usize,
}

impl AppState {
    pub fn new(tracker: Tracker, upcoming_limit: usize) -> Self {
        Self {
            tracker,
            upcoming_limit,
        }
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/courses", get(list_courses).post(create_course))
        .route("/courses/{id}", get(get_course).delete(delete_course))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/{id}", delete(delete_task))
        .route("/upload-syllabus", post(upload_syllabus))
        .route("/insights", get(insights));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve `router` until the process stops.
pub async fn serve(router: Router, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| SyllatrackError::Network(format!("failed to bind {addr}: {e}")))?;
    info!(%addr, "listening");

    axum::serve(listener, router)
        .await
        .map_err(|e| SyllatrackError::Network(format!("server error: {e}")))
}

// ---------------------------------------------------------------------------
// Request shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserQuery {
    user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseQuery {
    course_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsightsQuery {
    user_id: Option<String>,
    today: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadRequest {
    #[serde(default)]
    file_base64: Option<String>,
    #[serde(default)]
    file_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    message: &'static str,
    blob_name: String,
}

fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> std::result::Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {}", e.body_text())))
}

fn query<T>(q: std::result::Result<Query<T>, QueryRejection>) -> std::result::Result<T, ApiError> {
    q.map(|Query(value)| value)
        .map_err(|e| ApiError::BadRequest(format!("invalid query: {}", e.body_text())))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /health
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/courses?userId=
async fn list_courses(
    State(state): State<AppState>,
    q: std::result::Result<Query<UserQuery>, QueryRejection>,
) -> std::result::Result<Json<Vec<Course>>, ApiError> {
    let q = query(q)?;
    let courses = state
        .tracker
        .list_courses(q.user_id.as_deref())
        .await
        .map_err(ApiError::from_service("Error retrieving courses"))?;
    Ok(Json(courses))
}

/// POST /api/courses
async fn create_course(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewCourse>, JsonRejection>,
) -> std::result::Result<(StatusCode, Json<Course>), ApiError> {
    let course = state
        .tracker
        .create_course(json_body(body)?)
        .await
        .map_err(ApiError::from_service("Error creating course"))?;
    Ok((StatusCode::CREATED, Json(course)))
}

/// GET /api/courses/{id}?userId=
async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
    q: std::result::Result<Query<UserQuery>, QueryRejection>,
) -> std::result::Result<Json<Course>, ApiError> {
    let q = query(q)?;
    state
        .tracker
        .get_course(&id, q.user_id.as_deref())
        .await
        .map_err(ApiError::from_service("Error retrieving course"))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Course not found".into()))
}

/// DELETE /api/courses/{id}?userId=
async fn delete_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
    q: std::result::Result<Query<UserQuery>, QueryRejection>,
) -> std::result::Result<Json<Value>, ApiError> {
    let q = query(q)?;
    let report = state
        .tracker
        .delete_course_cascade(&id, q.user_id.as_deref())
        .await
        .map_err(ApiError::from_service("Error deleting course"))?;

    Ok(Json(json!({
        "message": "Course deleted",
        "tasksDeleted": report.tasks_deleted,
        "tasksFailed": report.tasks_failed,
    })))
}

/// GET /api/tasks?courseId=
async fn list_tasks(
    State(state): State<AppState>,
    q: std::result::Result<Query<CourseQuery>, QueryRejection>,
) -> std::result::Result<Json<Vec<Task>>, ApiError> {
    let q = query(q)?;
    let tasks = state
        .tracker
        .list_tasks(q.course_id.as_deref())
        .await
        .map_err(ApiError::from_service("Error retrieving tasks"))?;
    Ok(Json(tasks))
}

/// POST /api/tasks
async fn create_task(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewTask>, JsonRejection>,
) -> std::result::Result<(StatusCode, Json<Task>), ApiError> {
    let task = state
        .tracker
        .create_task(json_body(body)?)
        .await
        .map_err(ApiError::from_service("Error creating task"))?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// DELETE /api/tasks/{id}?courseId=
async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    q: std::result::Result<Query<CourseQuery>, QueryRejection>,
) -> std::result::Result<Json<Value>, ApiError> {
    let q = query(q)?;
    state
        .tracker
        .delete_task(&id, q.course_id.as_deref())
        .await
        .map_err(ApiError::from_service("Error deleting task"))?;
    Ok(Json(json!({ "message": "Task deleted" })))
}

/// POST /api/upload-syllabus
async fn upload_syllabus(
    State(state): State<AppState>,
    body: std::result::Result<Json<UploadRequest>, JsonRejection>,
) -> std::result::Result<Json<UploadResponse>, ApiError> {
    let req = json_body(body)?;
    let encoded = req
        .file_base64
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("fileBase64 is required in the request body".into()))?;

    let bytes = decode_upload(&encoded)
        .ok_or_else(|| ApiError::BadRequest("fileBase64 is not valid base64".into()))?;

    let blob_name = state
        .tracker
        .upload_document(&bytes, req.file_name.as_deref())
        .await
        .map_err(ApiError::from_service("Error uploading syllabus"))?;

    Ok(Json(UploadResponse {
        message: "Syllabus uploaded",
        blob_name,
    }))
}

/// GET /api/insights?userId=&today=&limit=
async fn insights(
    State(state): State<AppState>,
    q: std::result::Result<Query<InsightsQuery>, QueryRejection>,
) -> std::result::Result<Json<Insights>, ApiError> {
    let q = query(q)?;
    let today = match q.today.as_deref() {
        Some(raw) => parse_date_safe(Some(raw))
            .ok_or_else(|| ApiError::BadRequest("today must be YYYY-MM-DD".into()))?,
        None => today_local(),
    };
    let limit = q.limit.unwrap_or(state.upcoming_limit);

    let view = state
        .tracker
        .insights(q.user_id.as_deref(), today, limit)
        .await
        .map_err(ApiError::from_service("Error computing insights"))?;
    Ok(Json(view))
}

/// Decode a base64 payload, tolerating a `data:...;base64,` prefix and line breaks.
fn decode_upload(encoded: &str) -> Option<Vec<u8>> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => encoded,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact).ok()
}
