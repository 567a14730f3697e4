//! HTTP server for greenmap
//!
//! # Endpoints
//!
//! - `GET /layer/{name}` - One layer as GeoJSON in EPSG:4326
//! - `GET /layers` - Loaded layers with feature counts and extents
//! - `GET /site_details/{reference}` - Joined records for one site
//! - `GET /plasma` - Plasma colormap
//! - `GET /health` - Health check
//! - `GET /`, `/map`, `/info_overview` - HTML pages
//! - `GET /static/*` - Client assets
//! - `GET /swagger-ui` - OpenAPI documentation

pub mod api;
pub mod colormap;
pub mod html;
pub mod state;

use greenmap_common::Result;
use std::sync::Arc;
use tokio::net::TcpListener;

pub use api::build_router;
pub use state::ServerState;

/// Bind `host:port` and serve until Ctrl-C
pub async fn serve(state: Arc<ServerState>, host: &str, port: u16) -> Result<()> {
    let listener = TcpListener::bind((host, port)).await?;
    serve_listener(listener, state).await
}

/// Serve on an already bound listener until Ctrl-C
pub async fn serve_listener(listener: TcpListener, state: Arc<ServerState>) -> Result<()> {
    let addr = listener.local_addr()?;
    let app = build_router(state);

    tracing::info!("listening on http://{addr}");
    tracing::info!("swagger UI at http://{addr}/swagger-ui/");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
