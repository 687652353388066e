//! Listeners and the JSON-over-HTTP surface.
//!
//! The gRPC service (see [`crate::grpc`]) is always served. An optional
//! HTTP listener exposes the same five operations as unary JSON calls under
//! `POST /sql.SQLServices/<Method>`, with HTTP headers as the call metadata.
//! Every handled call answers 200 with an envelope; admission and database
//! failures live inside it.

use crate::error::{GatewayError, Result};
use crate::gate::{CallMetadata, AUTH_KEY};
use crate::grpc;
use crate::service::{Operation, QueryRequest, SqlService};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Path prefix shared by all RPC methods.
pub const SERVICE_PATH: &str = "/sql.SQLServices";

/// Builds the router for the given service.
pub fn router(service: SqlService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(&format!("{SERVICE_PATH}/:method"), post(dispatch))
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn dispatch(
    State(service): State<SqlService>,
    Path(method): Path<String>,
    headers: HeaderMap,
    Json(request): Json<QueryRequest>,
) -> Response {
    let Some(op) = Operation::from_name(&method) else {
        debug!("Unknown RPC method {}", method);
        return (StatusCode::NOT_FOUND, format!("unknown method: {method}")).into_response();
    };

    let metadata = metadata_from_headers(&headers);
    let envelope = service.call(op, metadata.as_ref(), &request).await;
    Json(envelope).into_response()
}

/// Converts request headers into call metadata.
///
/// Returns `None` when the first `auth` value is not readable text, since
/// that is the value admission uses. Other unreadable values are skipped.
pub fn metadata_from_headers(headers: &HeaderMap) -> Option<CallMetadata> {
    let mut metadata = CallMetadata::new();
    if let Some(auth) = headers.get(AUTH_KEY) {
        metadata.insert(AUTH_KEY, auth.to_str().ok()?);
    }

    for value in headers.get_all(AUTH_KEY).iter().skip(1) {
        if let Ok(text) = value.to_str() {
            metadata.insert(AUTH_KEY, text);
        }
    }
    for (name, value) in headers {
        if name.as_str() == AUTH_KEY {
            continue;
        }
        if let Ok(text) = value.to_str() {
            metadata.insert(name.as_str(), text);
        }
    }
    Some(metadata)
}

/// Binds the listener. Failure here is fatal to the process.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| GatewayError::server(format!("Could not listen on {addr}: {e}")))
}

/// Serves JSON calls until `shutdown` is cancelled, then drains in-flight calls.
pub async fn serve_http(
    listener: TcpListener,
    service: SqlService,
    shutdown: CancellationToken,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("HTTP listening on {}", addr);
    }

    axum::serve(listener, router(service))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| GatewayError::server(e.to_string()))
}

/// Serves gRPC, plus HTTP when a listener is given, until `shutdown` is cancelled.
pub async fn serve(
    grpc_listener: TcpListener,
    http_listener: Option<TcpListener>,
    service: SqlService,
    shutdown: CancellationToken,
) -> Result<()> {
    let grpc = grpc::serve(grpc_listener, service.clone(), shutdown.clone());
    match http_listener {
        Some(listener) => {
            tokio::try_join!(grpc, serve_http(listener, service, shutdown))?;
            Ok(())
        }
        None => grpc.await,
    }
}

/// Cancels `token` on Ctrl-C or SIGTERM.
pub async fn shutdown_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Could not listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown requested, finishing in-flight calls");
    token.cancel();
}
