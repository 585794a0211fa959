use anyhow::{Context, Result};
use axum::{
    Router,
    extract::State,
    http::{HeaderMap, Method, Uri},
    response::Response,
    routing::any,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::registry::{Registry, Route};

macro_rules! route_handler {
    ($name:ident, $route:expr) => {
        async fn $name(
            State(registry): State<Registry>,
            method: Method,
            uri: Uri,
            headers: HeaderMap,
        ) -> Response {
            registry.serve($route, method, &uri, &headers).await
        }
    };
}

route_handler!(health, Route::Health);
route_handler!(discovery, Route::Discovery);
route_handler!(list_packages, Route::ListPackages);
route_handler!(list_versions, Route::ListVersions);
route_handler!(list_files, Route::ListFiles);
route_handler!(resource, Route::Resource);

/// HTTP surface: fixed service routes, everything else is a registry path.
pub fn router(registry: Registry) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/up", any(health))
        .route("/.well-known/deno-import-intellisense.json", any(discovery))
        .route("/_list_packages", any(list_packages))
        .route("/_list_versions", any(list_versions))
        .route("/_list_files", any(list_files))
        .fallback(resource)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

/// Serves until ctrl+c.
pub async fn serve(registry: Registry, addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    let local = listener.local_addr().context("reading bound address")?;
    info!(addr = %local, "starting HTTP server");

    axum::serve(listener, router(registry))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received, draining connections");
}
