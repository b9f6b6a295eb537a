// SPDX-License-Identifier: MIT

//! HTTP surface of the orchestrator
//!
//! Public routes under `/api/v1` require a bearer token; the `/internal`
//! routes are for workers on a trusted network.

pub mod auth;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::common::{self, CalcError};
use crate::engine::config::{OperationTimes, ServerConfig};
use crate::engine::model::Expression;
use crate::engine::store::{ExpressionStore, SqliteStore, TaskStore};
use crate::engine::{Calculator, Dispatcher, SubmitRequest, TaskReport};
use auth::{Owner, TokenKeys};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub calculator: Calculator,
    pub dispatcher: Dispatcher,
    pub keys: TokenKeys,
}

impl AppState {
    pub fn new<S>(store: Arc<S>, times: OperationTimes, keys: TokenKeys) -> Self
    where
        S: ExpressionStore + TaskStore + 'static,
    {
        Self {
            calculator: Calculator::new(store.clone(), store.clone()),
            dispatcher: Dispatcher::new(store, times),
            keys,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/v1/calculate", post(calculate))
        .route("/api/v1/expressions", get(list_expressions))
        .route("/api/v1/expressions/{id}", get(get_expression))
        .route("/internal/task", get(next_task).post(submit_result))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(config: ServerConfig) -> common::Result<()> {
    let store = Arc::new(SqliteStore::open(&config.database)?);
    log::info!("Opened store at {}", config.database.display());

    let keys = TokenKeys::new(&config.jwt_secret, config.token_ttl_secs)?;
    let app = router(AppState::new(store, config.operation_times, keys));

    let addr = SocketAddr::new(config.host, config.port);
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
    }
}

impl IntoResponse for CalcError {
    fn into_response(self) -> Response {
        let status = match &self {
            CalcError::InvalidExpression(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CalcError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            CalcError::UnknownTask(_) | CalcError::NotFound { .. } => StatusCode::NOT_FOUND,
            CalcError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status.is_server_error() {
            log::error!("Request failed: {}", self);
            "internal server error".to_string()
        } else {
            log::debug!("Request rejected: {}", self);
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Run a store-bound closure off the async runtime
async fn blocking<T, F>(f: F) -> common::Result<T>
where
    F: FnOnce() -> common::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CalcError::Other(format!("blocking task failed: {}", e)))?
}

fn summary(expr: &Expression) -> Value {
    json!({
        "id": expr.id,
        "status": expr.status,
        "result": expr.visible_result(),
    })
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
struct CalculateRequest {
    expression: String,
}

async fn calculate(
    State(state): State<AppState>,
    Owner(owner): Owner,
    payload: Result<Json<CalculateRequest>, JsonRejection>,
) -> Result<Response, CalcError> {
    let Json(request) = payload.map_err(|e| CalcError::invalid_payload(e.body_text()))?;

    let calculator = state.calculator.clone();
    let expr = blocking(move || calculator.submit(owner, &request.expression)).await?;

    Ok((StatusCode::CREATED, Json(json!({ "id": expr.id }))).into_response())
}

async fn list_expressions(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<Value>, CalcError> {
    let calculator = state.calculator.clone();
    let expressions = blocking(move || calculator.list(owner)).await?;

    let items: Vec<Value> = expressions.iter().map(summary).collect();
    Ok(Json(json!({ "expressions": items })))
}

async fn get_expression(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<Value>, CalcError> {
    let calculator = state.calculator.clone();
    let expr = blocking(move || calculator.get(owner, &id)).await?;

    Ok(Json(json!({
        "expression": {
            "id": expr.id,
            "expression": expr.text,
            "status": expr.status,
            "result": expr.visible_result(),
        }
    })))
}

async fn next_task(State(state): State<AppState>) -> Result<Response, CalcError> {
    let dispatcher = state.dispatcher.clone();
    match blocking(move || dispatcher.next()).await? {
        Some(task) => Ok(Json(json!({ "task": task })).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn submit_result(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, CalcError> {
    let Json(raw) = payload.map_err(|e| CalcError::invalid_payload(e.body_text()))?;
    let request = SubmitRequest::from_json(&raw)?;
    let message = match request.report {
        TaskReport::Result(_) => "result submitted",
        TaskReport::Failed(_) => "failure recorded",
    };

    let dispatcher = state.dispatcher.clone();
    let outcome = blocking(move || dispatcher.accept(&request)).await?;

    Ok(Json(json!({
        "message": message,
        "expression_id": outcome.expression_id,
        "expression_completed": outcome.expression_completed,
        "expression_failed": outcome.expression_failed,
    })))
}
