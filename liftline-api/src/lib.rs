//! # Liftline API Server
//!
//! HTTP front end for the resort caches.
//!
//! ## Endpoints
//!
//! - `GET /health` - Cache contents, browser state, active scrapes
//! - `GET /resorts` - Known resort keys
//! - `GET /:resort` - Terrain status feed for one resort
//! - `GET /trailmap/:resort` - Trail-map image for one resort
//! - `GET /alta` - Alta lift report
//!
//! ## Example
//!
//! ```rust,ignore
//! use liftline_api::{ApiServer, AppState, ServerConfig};
//!
//! let config = ServerConfig::from_env()?;
//! let addr = config.socket_addr();
//! let server = ApiServer::new(Arc::new(AppState::new(config)?));
//! server.run(addr, tokio::signal::ctrl_c().map(|_| ())).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod dto;
mod error;
mod handlers;
mod routes;
mod state;

pub use dto::HealthResponse;
pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, ServerConfig};

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::Request;
use axum::{Router, ServiceExt};
use tower::Layer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// API server for Liftline.
pub struct ApiServer {
    state: Arc<AppState>,
}

impl ApiServer {
    /// Creates a server over prepared state.
    pub fn new(state: Arc<AppState>) -> Self {
        handlers::mark_started();
        Self { state }
    }

    /// Shared state.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Creates the router with all routes configured.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        create_router(self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// The router wrapped so `/resorts/` routes like `/resorts`.
    pub fn app(&self) -> NormalizePath<Router> {
        NormalizePathLayer::trim_trailing_slash().layer(self.router())
    }

    /// Serves on `addr` until `shutdown` resolves.
    ///
    /// Runs the eviction sweeper for the lifetime of the server and closes
    /// the browser once in-flight requests have drained.
    pub async fn run(self, addr: SocketAddr, shutdown: impl Future<Output = ()> + Send + 'static) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let sweeper = self.state.sweeper().spawn();

        info!("Liftline API server listening on {}", addr);

        let served = axum::serve(listener, ServiceExt::<Request>::into_make_service(self.app()))
            .with_graceful_shutdown(shutdown)
            .await;

        info!("Shutting down");
        sweeper.abort();
        self.state.browser.shutdown().await;
        served
    }
}
