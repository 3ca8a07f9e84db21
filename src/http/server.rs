//! HTTP server setup and the admission-controlled query path.
//!
//! # Responsibilities
//! - Create the Axum router and wire up middleware (tracing, request ID)
//! - Dispatch `/select/...` requests
//! - Run each query request in its own worker task under admission control
//! - Tie the worker's cancellation to the client connection and to shutdown
//! - Allow cross-origin reads of query results

use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admission::{AdmissionController, PendingWait};
use crate::http::request::{self, select_subpath};
use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::query::{LogQuery, QueryExecutor};

/// Query path, relative to `/select`.
pub const QUERY_PATH: &str = "/logsql/query";

/// Label used for the per-path request counter.
const QUERY_PATH_LABEL: &str = "/select/logsql/query";

/// Largest form body accepted on the query path.
const MAX_FORM_BYTES: usize = 1024 * 1024;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<AdmissionController>,
    pub executor: Arc<dyn QueryExecutor>,
    /// Root token; every request worker gets a child of it.
    pub shutdown: CancellationToken,
}

/// HTTP front end of the query gate.
pub struct HttpServer {
    router: Router,
    shutdown: CancellationToken,
}

impl HttpServer {
    pub fn new(
        controller: Arc<AdmissionController>,
        executor: Arc<dyn QueryExecutor>,
        shutdown: CancellationToken,
    ) -> Self {
        let state = AppState {
            controller,
            executor,
            shutdown: shutdown.clone(),
        };
        Self {
            router: Self::build_router(state),
            shutdown,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(select_handler)
            .with_state(state)
            .layer(CorsLayer::new().allow_origin(Any))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until the shutdown token is cancelled.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let shutdown = self.shutdown.clone();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Entry point for every request; only `/select/` paths are served.
async fn select_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let path = request.uri().path().to_owned();
    match select_subpath(&path) {
        Some(subpath) if subpath == QUERY_PATH => query_handler(state, request).await,
        _ => ApiError::NotFound(path).into_response(),
    }
}

/// Admission-controlled query execution.
async fn query_handler(state: AppState, request: Request<Body>) -> Response {
    let identity = request::identity(&request);
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, MAX_FORM_BYTES).await {
        Ok(body) => body,
        Err(e) => return ApiError::BadRequest(e.to_string()).into_response(),
    };
    let query = LogQuery::from_parts(parts.uri.query(), &body);

    // If this handler is dropped (client went away) the guard cancels the
    // worker's token; server shutdown cancels it through the parent.
    let cancel = state.shutdown.child_token();
    let _disconnect = cancel.clone().drop_guard();

    let wait = PendingWait::new(query.timeout().map(str::to_owned), cancel, identity);
    let AppState { controller, executor, .. } = state;

    let worker = tokio::spawn(async move {
        controller
            .run(wait, |budget, cancel| {
                // Only admitted queries count as served requests.
                metrics::record_http_request(QUERY_PATH_LABEL);
                executor.execute(query, budget, cancel)
            })
            .await
    });

    match worker.await {
        Ok(Ok(Some(Ok(response)))) => response.into_response(),
        Ok(Ok(Some(Err(e)))) => ApiError::Query(e).into_response(),
        // Abandoned while queued; only reachable here during shutdown.
        Ok(Ok(None)) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        Ok(Err(e)) => ApiError::Admission(e).into_response(),
        Err(e) => ApiError::Internal(e.to_string()).into_response(),
    }
}
