//! Build relay webhook event source.
//!
//! Binds an HTTP server that receives build-success notifications and hands
//! each payload to a [`pipeline::RelayLauncher`].
//!
//! ## Routes
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `POST` | `/hooks/unity/build/success` | Build-success webhook |
//! | `GET` | `/health` | Liveness probe |
//!
//! CORS is permissive and inbound calls are not authenticated.
//!
//! ## Acknowledgement contract
//!
//! [`AckMode`] decides when the webhook is answered:
//!
//! - [`AckMode::Eager`]: the relay task is launched and detached, and the
//!   caller gets `200 Success` immediately. Failures are visible only in the
//!   logs.
//! - [`AckMode::AwaitCompletion`]: the handler waits for the relay task. The
//!   caller gets `200 Success` once the run has completed. An aborted run is
//!   answered with the error text: `422` when the notification itself was
//!   unusable (missing fields, no share identifier), `502` for everything
//!   else. CDN calls that answered with an error status do not count as an
//!   aborted run.
//!
//! In both modes a body that is not valid JSON is rejected by the extractor
//! before any relay task starts.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pipeline::{RelayError, RelayLauncher};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Path of the build-success webhook.
pub const BUILD_SUCCESS_PATH: &str = "/hooks/unity/build/success";

/// Default listening port.
pub const DEFAULT_PORT: u16 = 4000;

/// When the webhook caller gets its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    /// Respond as soon as the relay task is launched.
    #[default]
    Eager,
    /// Respond after the relay task finishes, reporting its outcome.
    AwaitCompletion,
}

impl std::str::FromStr for AckMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eager" => Ok(Self::Eager),
            "await" => Ok(Self::AwaitCompletion),
            other => Err(format!(
                "unknown acknowledgement mode '{other}' (expected 'eager' or 'await')"
            )),
        }
    }
}

/// Errors running the HTTP server.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("HTTP server failed: {0}")]
    Serve(#[source] std::io::Error),
}

#[derive(Clone)]
struct ListenerState {
    launcher: Arc<dyn RelayLauncher>,
    ack_mode: AckMode,
}

/// HTTP receiver for build-success webhooks.
#[derive(Clone)]
pub struct WebhookListener {
    state: ListenerState,
}

impl WebhookListener {
    pub fn new(launcher: Arc<dyn RelayLauncher>, ack_mode: AckMode) -> Self {
        Self {
            state: ListenerState { launcher, ack_mode },
        }
    }

    /// Builds the axum router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .route(BUILD_SUCCESS_PATH, post(build_success))
            .route("/health", get(health))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Binds `addr` and serves until `shutdown` resolves.
    ///
    /// In-flight requests are drained on shutdown; detached relay tasks are
    /// not waited for.
    pub async fn serve<F>(self, addr: SocketAddr, shutdown: F) -> Result<(), ListenerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind { addr, source })?;
        info!(%addr, ack_mode = ?self.state.ack_mode, "listening for build notifications");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ListenerError::Serve)
    }
}

async fn build_success(
    State(state): State<ListenerState>,
    Json(payload): Json<serde_json::Value>,
) -> Response {
    let task = state.launcher.launch(payload);
    let run_id = task.run_id();

    match state.ack_mode {
        AckMode::Eager => {
            info!(%run_id, "build notification accepted");
            task.detach();
            (StatusCode::OK, "Success").into_response()
        }
        AckMode::AwaitCompletion => match task.wait().await {
            Ok(_) => (StatusCode::OK, "Success").into_response(),
            Err(e) => {
                error!(%run_id, error = %e, "build notification failed");
                (failure_status(&e), e.to_string()).into_response()
            }
        },
    }
}

/// Status returned in [`AckMode::AwaitCompletion`] for an aborted run.
fn failure_status(error: &RelayError) -> StatusCode {
    match error {
        RelayError::MalformedNotification { .. } | RelayError::MissingShareId { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::BAD_GATEWAY,
    }
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
