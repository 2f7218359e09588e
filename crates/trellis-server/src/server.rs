//! HTTP server - SSE stream, command submission and health endpoints
//!
//! The open-stream and submit-command endpoints are correlated only through
//! the session id: the id travels to the client as the first frame of the
//! stream, and every submission carries it back as a query parameter.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use trellis_gateway::{DisconnectGuard, DispatchError, SessionRegistry, StreamFrame, StreamMessage};

use crate::state::AppState;

/// Submit-command request body.
#[derive(Debug, Deserialize)]
pub struct SubmitCommandRequest {
    pub command: String,
    #[serde(default)]
    pub args: Value,
}

/// Immediate acknowledgment for an accepted submission. The command result
/// itself arrives asynchronously on the session's stream.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAck {
    pub accepted: bool,
    pub session_id: String,
    pub command: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Run the HTTP server until a termination signal arrives.
pub async fn run_server(state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.config.host, state.config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

    let registry = Arc::clone(&state.registry);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Trellis server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the route table.
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/sse", get(sse_handler))
        .route("/messages", post(messages_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Wait for a termination signal, then close every live stream so clients
/// see a clean terminator instead of an abrupt TCP reset.
async fn shutdown_signal(registry: Arc<SessionRegistry>) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down, closing {} active sessions", registry.len());
    registry.close_all();
}

/// Open-stream endpoint.
///
/// The session id reaches the client as the first frame of the stream
/// itself, not in the response body; it is the address for every later
/// submission.
async fn sse_handler(State(state): State<Arc<AppState>>) -> Response {
    let (session, mut rx) = state.registry.create();

    let endpoint = format!("/messages?sessionId={}", session.id);
    if let Err(e) = session
        .transport
        .push(StreamMessage::new("endpoint", endpoint))
    {
        error!(session_id = %session.id, "error establishing SSE stream: {}", e);
        state.registry.remove(&session.id);
        let body = ErrorResponse {
            error: "Error establishing SSE stream".to_string(),
            code: "STREAM_OPEN_FAILED".to_string(),
        };
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
    }

    info!(session_id = %session.id, "established SSE stream");

    // The guard rides inside the stream: when the client disconnects the
    // stream is dropped and the transport closes promptly.
    let guard = DisconnectGuard::new(Arc::clone(&session.transport));
    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(frame) = rx.recv().await {
            match frame {
                StreamFrame::Message(msg) => {
                    yield Ok::<Event, Infallible>(
                        Event::default().event(msg.event).data(msg.data),
                    );
                }
                StreamFrame::Shutdown => break,
            }
        }
    };

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Submit-command endpoint.
///
/// The response only reports whether dispatch was accepted; results,
/// including command failures, arrive on the stream.
async fn messages_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
    Json(req): Json<SubmitCommandRequest>,
) -> Response {
    let Some(session_id) = query.session_id else {
        let body = ErrorResponse {
            error: "Missing sessionId parameter".to_string(),
            code: "MISSING_SESSION_ID".to_string(),
        };
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    };

    match state
        .router
        .dispatch(&session_id, &req.command, &req.args)
        .await
    {
        Ok(()) => {
            let ack = SubmitAck {
                accepted: true,
                session_id,
                command: req.command,
            };
            (StatusCode::ACCEPTED, Json(ack)).into_response()
        }
        Err(DispatchError::SessionNotFound(id)) => {
            warn!(session_id = %id, "no active transport for session");
            let body = ErrorResponse {
                error: "Session not found".to_string(),
                code: "SESSION_NOT_FOUND".to_string(),
            };
            (StatusCode::NOT_FOUND, Json(body)).into_response()
        }
    }
}

/// Health endpoint: synchronous, side-effect-free, never fails.
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Trellis command gateway is running",
        "commands": state.router.command_names(),
        "activeSessions": state.registry.len(),
        "endpoints": {
            "sse": "/sse",
            "messages": "/messages?sessionId=<session_id>",
            "health": "/health",
        },
        "crudApiUrl": state.config.crud_api_url,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
