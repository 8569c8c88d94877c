//! HTTP API
//!
//! 前台登记、站点操作与统计查询的对外接口。所有处理器都委托给
//! 队列引擎，错误按类别映射到HTTP状态码：参数问题400、找不到404、
//! 并发冲突（占用、状态转换、非占用者）409，其余500。

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, patch, post},
    Router,
};
use chrono::Utc;
use clinicq_admin::{DailyReport, QueueStatistics};
use clinicq_core::{utils::offset_from_hours, ClinicError, Priority};
use clinicq_station::QueueEngine;
use serde::Deserialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

/// API共享状态
pub struct ApiState {
    pub engine: Arc<QueueEngine>,
    pub utc_offset_hours: i8,
}

/// API错误包装，负责HTTP状态码映射
pub struct ApiError(ClinicError);

impl From<ClinicError> for ApiError {
    fn from(e: ClinicError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ClinicError::Validation(_) | ClinicError::Config(_) => StatusCode::BAD_REQUEST,
            ClinicError::NotFound(_) | ClinicError::EmptyQueue { .. } => StatusCode::NOT_FOUND,
            ClinicError::SlotOccupied { .. }
            | ClinicError::SlotEmpty { .. }
            | ClinicError::InvalidStateTransition { .. }
            | ClinicError::NotOccupant { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// 构建路由
pub fn create_app(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(api_root))
        .route("/health", get(health))
        .route("/patients", post(register_patient).get(list_patients))
        .route("/patients/:id", delete(remove_patient))
        .route("/patients/:id/notes", patch(update_notes))
        .route("/patients/:id/reroute", post(reroute_patient))
        .route("/stations", get(list_stations))
        .route("/stations/:id/queue", get(station_queue))
        .route("/stations/:id/current", get(station_current))
        .route("/stations/:id/call", post(call_next))
        .route("/stations/:id/recall", post(recall))
        .route("/stations/:id/finish", post(finish))
        .route("/stations/:id/no-show", post(no_show))
        .route("/stats", get(statistics))
        .route("/report/daily", get(daily_report))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "ClinicQ API",
        "version": "1.0.0",
        "status": "running",
        "endpoints": {
            "health": "/health",
            "patients": "/patients",
            "stations": "/stations",
            "stats": "/stats",
        }
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    name: String,
    priority: Priority,
    station_id: Option<String>,
}

async fn register_patient(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    info!("Registering patient: {}", req.name);
    let patient = state
        .engine
        .register(&req.name, req.priority, req.station_id.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

async fn list_patients(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let patients = state.engine.store().snapshot().await;
    let total = patients.len();
    Json(json!({
        "patients": patients,
        "total": total,
    }))
}

async fn remove_patient(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if state.engine.remove_patient(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ClinicError::NotFound(format!("patient {} not found", id)).into())
    }
}

#[derive(Debug, Deserialize)]
struct NotesRequest {
    notes: Option<String>,
}

async fn update_notes(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<NotesRequest>,
) -> ApiResult<impl IntoResponse> {
    let patient = state.engine.update_notes(id, req.notes).await?;
    Ok(Json(patient))
}

#[derive(Debug, Deserialize)]
struct RerouteRequest {
    station_id: String,
}

async fn reroute_patient(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<RerouteRequest>,
) -> ApiResult<impl IntoResponse> {
    let patient = state.engine.reroute(id, &req.station_id).await?;
    Ok(Json(patient))
}

async fn list_stations(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.engine.stations())
}

async fn station_queue(
    State(state): State<Arc<ApiState>>,
    Path(station_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let waiting = state.engine.waiting_for(&station_id).await?;
    let total = waiting.len();
    Ok(Json(json!({
        "station_id": station_id,
        "waiting": waiting,
        "total": total,
    })))
}

async fn station_current(
    State(state): State<Arc<ApiState>>,
    Path(station_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let current = state.engine.current_call(&station_id).await?;
    Ok(Json(json!({
        "station_id": station_id,
        "current": current,
    })))
}

async fn call_next(
    State(state): State<Arc<ApiState>>,
    Path(station_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let patient = state.engine.call(&station_id).await?;
    Ok(Json(patient))
}

async fn recall(
    State(state): State<Arc<ApiState>>,
    Path(station_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let patient = state.engine.recall(&station_id).await?;
    Ok(Json(patient))
}

#[derive(Debug, Deserialize)]
struct FinishRequest {
    patient_id: Uuid,
    route_to: Option<String>,
}

async fn finish(
    State(state): State<Arc<ApiState>>,
    Path(station_id): Path<String>,
    Json(req): Json<FinishRequest>,
) -> ApiResult<impl IntoResponse> {
    let patient = state
        .engine
        .finish(&station_id, req.patient_id, req.route_to.as_deref())
        .await?;
    Ok(Json(patient))
}

#[derive(Debug, Deserialize)]
struct NoShowRequest {
    patient_id: Uuid,
}

async fn no_show(
    State(state): State<Arc<ApiState>>,
    Path(station_id): Path<String>,
    Json(req): Json<NoShowRequest>,
) -> ApiResult<impl IntoResponse> {
    let patient = state.engine.no_show(&station_id, req.patient_id).await?;
    Ok(Json(patient))
}

async fn statistics(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let patients = state.engine.store().snapshot().await;
    let history = state.engine.store().history().await;
    let stats = QueueStatistics::collect(&patients, &history, Utc::now());
    Json(json!({
        "overview": state.engine.overview().await,
        "stats": stats,
    }))
}

async fn daily_report(State(state): State<Arc<ApiState>>) -> ApiResult<impl IntoResponse> {
    let patients = state.engine.store().snapshot().await;
    let history = state.engine.store().history().await;
    let now = Utc::now();
    let stats = QueueStatistics::collect(&patients, &history, now);

    let offset = offset_from_hours(state.utc_offset_hours)?;
    let overview = state.engine.overview().await;
    let report = DailyReport::build(overview.unit, now.with_timezone(&offset).date_naive(), stats);
    let text = report.render_text();

    Ok(Json(json!({
        "report": report,
        "text": text,
    })))
}
