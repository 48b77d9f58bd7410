use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::admission::AdmissionController;
use crate::config::NodeConfig;
use crate::error::MeshError;
use crate::fleet::NodeLoad;
use crate::http::ErrorBody;
use crate::job::{Job, JobRequest, JobStore};
use crate::lifecycle::JobLifecycle;
use crate::stats::{NodeStats, StatsSnapshot};

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<NodeConfig>,
    pub admission: Arc<AdmissionController>,
    pub lifecycle: Arc<JobLifecycle>,
    pub store: Arc<dyn JobStore>,
    pub stats: Arc<NodeStats>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusBody {
    pub status: String,
}

impl IntoResponse for MeshError {
    fn into_response(self) -> Response {
        let status = match &self {
            MeshError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            MeshError::Conflict(_) => StatusCode::CONFLICT,
            MeshError::CapacityExceeded(_) => StatusCode::SERVICE_UNAVAILABLE,
            MeshError::NotFound(_) => StatusCode::NOT_FOUND,
            MeshError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            MeshError::Peer(_)
            | MeshError::Io(_)
            | MeshError::Json(_)
            | MeshError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorBody {
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Build the node's API router. The job routes double as the targets for
/// peer forwarding (submission POST and kill DELETE).
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let jobs = format!("/{}", state.config.job_resource_prefix);
    let job = format!("/{}/{{id}}", state.config.job_resource_prefix);
    let job_status = format!("/{}/{{id}}/status", state.config.job_resource_prefix);

    Router::new()
        .route(&jobs, get(list_jobs).post(submit_job))
        .route(&job, get(get_job).delete(kill_job))
        .route(&job_status, get(get_job_status))
        .route("/api/v1/node/load", get(node_load))
        .route("/api/v1/node/stats", get(node_stats))
        .layer(cors)
        .with_state(state)
}

async fn submit_job(
    State(state): State<ApiState>,
    Json(request): Json<JobRequest>,
) -> Result<Json<Job>, MeshError> {
    let job = state.admission.submit(request).await?;
    Ok(Json(job))
}

async fn list_jobs(State(state): State<ApiState>) -> Json<Vec<Job>> {
    Json(state.store.all().await)
}

async fn get_job(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, MeshError> {
    Ok(Json(state.store.get(&id).await?))
}

async fn get_job_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<JobStatusBody>, MeshError> {
    let status = state.lifecycle.get_status(&id).await?;
    Ok(Json(JobStatusBody {
        status: status.to_string(),
    }))
}

async fn kill_job(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, MeshError> {
    Ok(Json(state.lifecycle.kill(&id).await?))
}

async fn node_load(State(state): State<ApiState>) -> Json<NodeLoad> {
    Json(NodeLoad {
        host_name: state.config.host_name.clone(),
        running_jobs: state.store.count_active().await,
    })
}

async fn node_stats(State(state): State<ApiState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}
