//! axum router and handlers for the REST API.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::db::{Database, SnapshotStore};
use crate::error::{AppError, ErrorCode};
use crate::types::{
    LatestSnapshot, NewProject, NewTask, Project, SnapshotMeta, SnapshotRecord, Task, TaskRecord,
    TaskUpdate, new_id,
};

/// State shared across handlers.
#[derive(Clone)]
pub struct ApiServer {
    db: Arc<Database>,
}

impl ApiServer {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }
}

/// Error response: an [`AppError`] rendered as JSON with a matching status.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.code {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::DuplicateKey => StatusCode::CONFLICT,
            ErrorCode::StorageUnavailable | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(AppError::from_anyhow(err))
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = ?self.0.code, message = %self.0.message, "Request failed");
        }
        (status, Json(self.0)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Body of successful deletes.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// Request body for `POST /api/snapshots`.
#[derive(Debug, Deserialize)]
pub struct CreateSnapshotRequest {
    pub id: Option<String>,
    pub description: Option<String>,
    pub data: Option<Vec<Project>>,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

async fn list_projects(State(state): State<ApiServer>) -> ApiResult<Json<Vec<Project>>> {
    Ok(Json(state.db().projects_with_tasks()?))
}

async fn get_project(
    State(state): State<ApiServer>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Project>> {
    state
        .db()
        .project_with_tasks(&project_id)?
        .map(Json)
        .ok_or_else(|| AppError::project_not_found(&project_id).into())
}

async fn create_project(
    State(state): State<ApiServer>,
    Json(input): Json<NewProject>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let record = state.db().insert_project(input)?;
    Ok((
        StatusCode::CREATED,
        Json(Project {
            id: record.id,
            name: record.name,
            tasks: Vec::new(),
        }),
    ))
}

async fn delete_project(
    State(state): State<ApiServer>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.db().delete_project(&project_id)?;
    Ok(MessageResponse::new("Project deleted successfully"))
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

async fn create_task(
    State(state): State<ApiServer>,
    Json(input): Json<NewTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let record = state.db().insert_task(input)?;
    Ok((StatusCode::CREATED, Json(Task::from_record(&record))))
}

async fn update_task(
    State(state): State<ApiServer>,
    Path(task_id): Path<String>,
    Json(update): Json<TaskUpdate>,
) -> ApiResult<Json<TaskRecord>> {
    Ok(Json(state.db().update_task(&task_id, update)?))
}

async fn delete_task(
    State(state): State<ApiServer>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.db().delete_task(&task_id)?;
    Ok(MessageResponse::new("Task deleted successfully"))
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

async fn list_snapshots(State(state): State<ApiServer>) -> ApiResult<Json<Vec<SnapshotMeta>>> {
    Ok(Json(state.db().list_snapshots()?))
}

async fn get_snapshot(
    State(state): State<ApiServer>,
    Path(snapshot_id): Path<String>,
) -> ApiResult<Json<SnapshotRecord>> {
    Ok(Json(state.db().get_snapshot(&snapshot_id)?))
}

async fn latest_snapshot(State(state): State<ApiServer>) -> ApiResult<Json<LatestSnapshot>> {
    Ok(Json(state.db().latest_snapshot()?))
}

async fn create_snapshot(
    State(state): State<ApiServer>,
    Json(request): Json<CreateSnapshotRequest>,
) -> ApiResult<(StatusCode, Json<SnapshotMeta>)> {
    let data = request
        .data
        .ok_or_else(|| AppError::required("data", "Snapshot data"))?;
    let id = request.id.unwrap_or_else(new_id);
    let meta = state
        .db()
        .create_snapshot(&id, request.description.as_deref(), &data)?;
    Ok((StatusCode::CREATED, Json(meta)))
}

async fn delete_snapshot(
    State(state): State<ApiServer>,
    Path(snapshot_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.db().delete_snapshot(&snapshot_id)?;
    Ok(MessageResponse::new("Snapshot deleted successfully"))
}

/// Build the router with all routes.
pub fn build_router(state: ApiServer) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/{project_id}",
            get(get_project).delete(delete_project),
        )
        .route("/api/tasks", post(create_task))
        .route(
            "/api/tasks/{task_id}",
            put(update_task).delete(delete_task),
        )
        .route("/api/snapshots", get(list_snapshots).post(create_snapshot))
        .route("/api/snapshots/latest/data", get(latest_snapshot))
        .route(
            "/api/snapshots/{snapshot_id}",
            get(get_snapshot).delete(delete_snapshot),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve in the background.
///
/// Returns a sender that shuts the server down and the bound address.
pub async fn start_server(
    db: Arc<Database>,
    addr: SocketAddr,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr)> {
    let app = build_router(ApiServer::new(db));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("API server listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("API server shutting down");
            })
            .await
        {
            error!("API server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr))
}
