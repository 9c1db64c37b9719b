//! Observer HTTP server lifecycle management.
//!
//! Provides [`start_server`], which binds the configured address and
//! serves the router until the process terminates.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Errors that can occur while starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listen address could not be parsed or bound.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal I/O error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

/// Start the Observer HTTP server.
///
/// Binds `host:port`, builds the router, and serves requests until the
/// process is terminated.
///
/// # Errors
///
/// Returns [`ServerError`] if the TCP listener cannot bind or the server
/// encounters a fatal I/O error.
pub async fn start_server(host: &str, port: u16, state: Arc<AppState>) -> Result<(), ServerError> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))?;

    let router = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

    info!(%addr, "Observer server listening");

    axum::serve(listener, router)
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    Ok(())
}
