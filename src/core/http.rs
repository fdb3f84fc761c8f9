//! HTTP endpoint server using Axum

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, Level};

use crate::batch::aggregator::BatchState;
use crate::batch::analysis::analyze;
use crate::batch::dispatcher::Dispatcher;
use crate::config::Universe;
use crate::db::BatchStore;
use crate::error::DispatchError;
use crate::metrics::Metrics;
use crate::models::batch::{BatchId, BatchSummary};

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
    pub store: Arc<dyn BatchStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub universe: Universe,
}

impl AppState {
    pub fn new(
        metrics: Arc<Metrics>,
        store: Arc<dyn BatchStore>,
        dispatcher: Arc<Dispatcher>,
        universe: Universe,
    ) -> Self {
        Self {
            metrics,
            start_time: Arc::new(Instant::now()),
            store,
            dispatcher,
            universe,
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let in_flight = state.dispatcher.coordinator().aggregator().in_flight().await;
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "batches_in_flight": in_flight,
        "service": "stockscan-coordinator"
    }))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();
    state.metrics.http_requests_in_flight.dec();

    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    if status.is_server_error() {
        error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis(),
            "HTTP request error"
        );
    }

    response
}

#[derive(Debug, Deserialize)]
struct LatestQuery {
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct SubmitRequest {
    symbols: Option<Vec<String>>,
    strategies: Option<Vec<String>>,
}

fn parse_batch_id(raw: &str) -> Result<BatchId, StatusCode> {
    raw.parse().map_err(|_| StatusCode::BAD_REQUEST)
}

async fn load_summary(state: &AppState, batch_id: BatchId) -> Result<BatchSummary, StatusCode> {
    state
        .store
        .get(batch_id)
        .await
        .map_err(|e| {
            error!(error = %e, batch_id = %batch_id, "Failed to load batch");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)
}

/// Most recent batch summaries
async fn list_batches(
    State(state): State<AppState>,
    Query(params): Query<LatestQuery>,
) -> Result<Json<Value>, StatusCode> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let batches = state.store.get_latest(limit).await.map_err(|e| {
        error!(error = %e, "Failed to load latest batches");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(json!({ "count": batches.len(), "batches": batches })))
}

async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BatchSummary>, StatusCode> {
    let batch_id = parse_batch_id(&id)?;
    load_summary(&state, batch_id).await.map(Json)
}

async fn get_batch_by_symbol(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let batch_id = parse_batch_id(&id)?;
    let summary = load_summary(&state, batch_id).await?;
    Ok(Json(json!({
        "batch_id": batch_id,
        "symbols": summary.grouped_by_symbol(),
    })))
}

async fn get_batch_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let batch_id = parse_batch_id(&id)?;
    let summary = load_summary(&state, batch_id).await?;
    Ok(Json(json!(analyze(&summary))))
}

/// Live state of a batch, including ones that have not finished yet
async fn get_batch_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let batch_id = parse_batch_id(&id)?;
    let aggregator = state.dispatcher.coordinator().aggregator();

    let label = match aggregator.state(batch_id).await {
        Some(BatchState::Pending) => "pending",
        Some(BatchState::Completed) => "completed",
        Some(BatchState::TimedOut) => "timed_out",
        Some(BatchState::Aborted) => "aborted",
        None => match state.store.get(batch_id).await {
            Ok(Some(summary)) => summary.status.as_str(),
            Ok(None) => return Err(StatusCode::NOT_FOUND),
            Err(e) => {
                error!(error = %e, batch_id = %batch_id, "Failed to load batch");
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
        },
    };
    let progress = aggregator.progress(batch_id).await;

    Ok(Json(json!({
        "batch_id": batch_id,
        "state": label,
        "received": progress.map(|(received, _)| received),
        "expected": progress.map(|(_, expected)| expected),
    })))
}

/// Ad-hoc batch submission; omitted lists fall back to the configured universe
async fn submit_batch(
    State(state): State<AppState>,
    body: Option<Json<SubmitRequest>>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let symbols = request
        .symbols
        .unwrap_or_else(|| state.universe.symbols.clone());
    let strategies = request
        .strategies
        .unwrap_or_else(|| state.universe.strategies.clone());

    match state.dispatcher.submit_batch(&symbols, &strategies).await {
        Ok(batch_id) => Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "batch_id": batch_id, "expected_tasks": expected(&symbols, &strategies) })),
        )),
        Err(e) => {
            let status = match &e {
                DispatchError::EmptyUniverse => StatusCode::BAD_REQUEST,
                DispatchError::Registration(_) => StatusCode::CONFLICT,
                DispatchError::Enqueue { .. } => StatusCode::SERVICE_UNAVAILABLE,
            };
            Err((status, Json(json!({ "error": e.to_string() }))))
        }
    }
}

fn expected(symbols: &[String], strategies: &[String]) -> usize {
    let distinct = |values: &[String]| {
        values
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .collect::<std::collections::HashSet<_>>()
            .len()
    };
    distinct(symbols) * distinct(strategies)
}

async fn abort_batch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let batch_id = parse_batch_id(&id)?;
    if state.dispatcher.coordinator().abort(batch_id).await {
        Ok(Json(json!({ "batch_id": batch_id, "aborted": true })))
    } else {
        Err(StatusCode::CONFLICT)
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/batches", get(list_batches).post(submit_batch))
        .route("/api/batches/{id}", get(get_batch))
        .route("/api/batches/{id}/symbols", get(get_batch_by_symbol))
        .route("/api/batches/{id}/analysis", get(get_batch_analysis))
        .route("/api/batches/{id}/status", get(get_batch_status))
        .route("/api/batches/{id}/abort", post(abort_batch))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn start_server(state: AppState, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(port = port, "HTTP server listening on port {}", port);
    axum::serve(listener, app).await?;

    Ok(())
}
