//! HTTP API server for voxchat

pub mod events;
pub mod health;
pub mod voice;
pub mod websocket;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use futures::{Stream, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::config::ServerConfig;
use crate::turn::{TurnEvent, TurnPipeline, TurnStream};

pub use events::WireEvent;

/// Shared state for API handlers
pub struct ApiState {
    pub pipeline: TurnPipeline,
    /// One permit per turn allowed to stream at once
    pub turn_slots: Arc<Semaphore>,
    pub time_limit: Option<Duration>,
}

impl ApiState {
    /// Create state for a pipeline and server limits
    #[must_use]
    pub fn new(pipeline: TurnPipeline, server: &ServerConfig) -> Self {
        Self {
            pipeline,
            turn_slots: Arc::new(Semaphore::new(server.concurrency_limit)),
            time_limit: server.time_limit,
        }
    }

    /// Reserve a turn slot, or `None` if all are taken
    #[must_use]
    pub fn try_reserve_turn(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.turn_slots).try_acquire_owned().ok()
    }
}

/// Hold a turn slot for the life of a turn and enforce the time limit
///
/// The slot is released when the returned stream is dropped. Past the
/// deadline the turn stream is dropped, which closes its upstream requests.
pub fn limit_turn(
    events: TurnStream,
    permit: OwnedSemaphorePermit,
    time_limit: Option<Duration>,
) -> impl Stream<Item = TurnEvent> + Send {
    async_stream::stream! {
        let _permit = permit;
        let deadline = time_limit.map(|limit| tokio::time::Instant::now() + limit);
        let mut events = events;

        loop {
            let next = match deadline {
                Some(deadline) => {
                    if let Ok(next) = tokio::time::timeout_at(deadline, events.next()).await {
                        next
                    } else {
                        tracing::warn!("turn exceeded time limit, abandoning");
                        break;
                    }
                }
                None => events.next().await,
            };

            let Some(event) = next else { break };
            yield event;
        }
    }
}

/// Build the router with all routes
pub fn router(state: Arc<ApiState>) -> Router {
    let router = Router::new()
        .nest("/api", voice::router(state.clone()))
        .merge(websocket::router(state))
        .merge(health::router());

    // CORS layer for cross-origin requests from the browser client
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router.layer(cors).layer(TraceLayer::new_for_http())
}

/// Run the API server until interrupted
///
/// # Errors
///
/// Returns error if server fails to bind or run
pub async fn serve(state: Arc<ApiState>, port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

    tracing::info!(port, "API server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
