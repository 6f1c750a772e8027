//! HTTP surface for the advisory service
//!
//! Thin axum handlers over [`AdvisoryService`]. Every failure is a JSON
//! `{"error": "..."}` body: 400 for caller mistakes, 404 for unknown reports,
//! 500 for everything else.

use crate::db::{FeedbackSummary, StoredReport};
use crate::service::{
    AdvisoryService, AnalysisRequest, AnalysisResponse, OfflineRecord, ServiceError, SyncSummary,
};
use crate::types::Feedback;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const DEFAULT_REPORT_LIMIT: usize = 20;
const MAX_REPORT_LIMIT: usize = 500;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AdvisoryService>,
}

pub fn router(service: Arc<AdvisoryService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .route("/analyze", post(analyze))
        .route("/feedback", post(feedback))
        .route("/feedback/summary", get(feedback_summary))
        .route("/sync-offline", post(sync_offline))
        .route("/reports", get(list_reports))
        .route("/reports/:report_id", get(get_report))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
}

/// Bind and serve until the process is stopped
pub async fn serve(service: Arc<AdvisoryService>, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("CropGuard listening on http://{}", addr);
    axum::serve(listener, router(service)).await?;
    Ok(())
}

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Request(e) => ApiError::BadRequest(e.to_string()),
            ServiceError::Internal(e) => ApiError::Internal(e),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(e) => {
                error!(error = %format!("{:#}", e), "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
    crops: usize,
    diseases: usize,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    let kb = state.service.engine().knowledge_base();
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        crops: kb.crop_count(),
        diseases: kb.disease_count(),
    })
}

async fn analyze(
    State(state): State<AppState>,
    body: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let Json(request) = body?;
    Ok(Json(state.service.analyze(request).await?))
}

async fn feedback(
    State(state): State<AppState>,
    body: Result<Json<Feedback>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(feedback) = body?;
    state.service.record_feedback(&feedback)?;
    Ok(Json(serde_json::json!({ "status": "feedback recorded" })))
}

async fn feedback_summary(
    State(state): State<AppState>,
) -> Result<Json<FeedbackSummary>, ApiError> {
    Ok(Json(state.service.feedback_summary()?))
}

/// A device may push one record or its whole queue
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SyncPayload {
    Batch(Vec<OfflineRecord>),
    Single(OfflineRecord),
}

async fn sync_offline(
    State(state): State<AppState>,
    body: Result<Json<SyncPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = body?;
    match payload {
        SyncPayload::Single(record) => {
            let response = state.service.sync_offline(record).await?;
            Ok(Json(response).into_response())
        }
        SyncPayload::Batch(records) => {
            let summary: SyncSummary = state.service.sync_batch(records).await?;
            Ok(Json(summary).into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReportQuery {
    limit: Option<usize>,
}

async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Vec<StoredReport>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_REPORT_LIMIT)
        .min(MAX_REPORT_LIMIT);
    Ok(Json(state.service.recent_reports(limit)?))
}

async fn get_report(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> Result<Json<StoredReport>, ApiError> {
    state
        .service
        .report(&report_id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Report {} not found", report_id)))
}
