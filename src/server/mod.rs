//! Minimal HTTP surface over the subgraph engine.
//!
//! One route does the work: `POST /subgraphs/{ontology}`. Everything else a
//! deployment needs around it (authentication, CRUD, reporting) lives in
//! other services; this process only exposes the traversal core and a
//! health probe.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::error::{GraphKbError, Result};
use crate::model::Rid;
use crate::schema::SchemaRegistry;
use crate::store::SessionPool;
use crate::subgraph::{
    self, Direction, SubgraphKind, SubgraphResult, SubgraphType, TraverseOptions,
    DEFAULT_MAX_DEPTH,
};

/// Shared state behind every handler.
pub struct AppState {
    pub pool: SessionPool,
    pub registry: SchemaRegistry,
}

type SharedState = Arc<AppState>;

/// Binds the listener and serves until shutdown.
pub async fn serve(config: &ServerConfig, state: SharedState) -> Result<()> {
    let app = build_router(state);
    let addr = SocketAddr::from((config.host, config.port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| GraphKbError::Internal(format!("cannot bind {addr}: {err}")))?;
    info!(%addr, "graphkb listening");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| GraphKbError::Internal(format!("server error: {err}")))?;
    Ok(())
}

/// The application router; public so tests can drive it without a socket.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/subgraphs/:ontology", post(subgraph_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => error!(?err, "failed to listen for shutdown signal"),
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Body of `POST /subgraphs/{ontology}`. Every field is optional; an absent
/// body means the complete ontology.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SubgraphRequest {
    pub subgraph_type: Option<SubgraphType>,
    pub base: Option<Vec<String>>,
    pub edges: Option<Vec<String>>,
    pub tree_edges: Option<Vec<String>>,
    pub max_depth: Option<i64>,
    pub return_properties: Option<Vec<String>>,
    pub subgraph: Option<SubgraphKind>,
    pub first_generation_only: Option<bool>,
}

impl SubgraphRequest {
    fn into_options(self) -> Result<TraverseOptions> {
        let subgraph_type = self.subgraph_type.unwrap_or(SubgraphType::Complete);
        let (direction, mut first_generation_only) = subgraph_type.dispatch();
        if let Some(flag) = self.first_generation_only {
            // Only meaningful for the directed shapes, where it toggles
            // between one generation and the transitive walk.
            if matches!(
                direction,
                Some(Direction::Ascending) | Some(Direction::Descending)
            ) {
                first_generation_only = flag;
            }
        }
        let base = self
            .base
            .unwrap_or_default()
            .iter()
            .map(|raw| Rid::parse(raw))
            .collect::<Result<Vec<_>>>()?;
        let defaults = TraverseOptions::default();
        Ok(TraverseOptions {
            direction,
            first_generation_only,
            subgraph: self.subgraph.unwrap_or(SubgraphKind::Real),
            base,
            edges: self.edges.unwrap_or(defaults.edges),
            tree_edges: self.tree_edges.unwrap_or(defaults.tree_edges),
            max_depth: self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
            return_properties: self.return_properties.unwrap_or_default(),
            directed_adjacency: defaults.directed_adjacency,
            allow_self_loops: defaults.allow_self_loops,
        })
    }
}

#[derive(Debug, Serialize)]
struct SubgraphResponse {
    result: SubgraphResult,
}

async fn subgraph_handler(
    State(state): State<SharedState>,
    Path(ontology): Path<String>,
    body: Option<Json<serde_json::Value>>,
) -> std::result::Result<Json<SubgraphResponse>, AppError> {
    // An absent body means the complete ontology; a present but malformed
    // one is the caller's mistake.
    let request = match body {
        None | Some(Json(serde_json::Value::Null)) => SubgraphRequest::default(),
        Some(Json(value)) => serde_json::from_value(value)
            .map_err(|err| GraphKbError::Validation(format!("malformed request body: {err}")))?,
    };
    let opts = request.into_options()?;
    let result = traverse_with_retry(&state, &ontology, &opts).await?;
    Ok(Json(SubgraphResponse { result }))
}

/// Runs a traversal, attempting one reconnect when the store transport
/// fails. Traversals are pure reads, so the retry needs no compensation.
async fn traverse_with_retry(
    state: &SharedState,
    ontology: &str,
    opts: &TraverseOptions,
) -> Result<SubgraphResult> {
    match traverse_once(state, ontology, opts).await {
        Err(GraphKbError::Connection(reason)) => {
            warn!(%reason, "store connection failed; retrying once");
            traverse_once(state, ontology, opts).await
        }
        other => other,
    }
}

async fn traverse_once(
    state: &SharedState,
    ontology: &str,
    opts: &TraverseOptions,
) -> Result<SubgraphResult> {
    let session = state.pool.acquire().await?;
    subgraph::traverse(&session, &state.registry, ontology, opts).await
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorPayload,
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    name: &'static str,
    message: String,
}

struct AppError(GraphKbError);

impl From<GraphKbError> for AppError {
    fn from(err: GraphKbError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GraphKbError::Validation(_) => StatusCode::BAD_REQUEST,
            GraphKbError::NotFound(_) => StatusCode::NOT_FOUND,
            GraphKbError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.0, "request failed");
        }
        let body = Json(ErrorBody {
            error: ErrorPayload {
                name: self.0.kind(),
                message: self.0.to_string(),
            },
        });
        (status, body).into_response()
    }
}
