//! HTTP server facade for SHELF with Axum, error handling, and OpenAPI support.

use anyhow::Context;
use axum::{routing::get, Router};

use shelf_kernel::ModuleRegistry;

pub mod error;
pub mod router;

use router::RouterBuilder;

/// Start the HTTP server with the given module registry.
///
/// `callback_routes` is merged at the router root; the identity-provider gate
/// uses it to mount its own paths (e.g. `/logout`).
pub async fn start_server(
    registry: &ModuleRegistry,
    settings: &shelf_kernel::settings::Settings,
    callback_routes: Router,
) -> anyhow::Result<()> {
    tracing::info!(
        "starting HTTP server on {}:{}",
        settings.server.host,
        settings.server.port
    );

    // Build the main router
    let app = build_router(registry, settings, callback_routes)
        .context("failed to build HTTP router")?;

    // Create the server
    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", settings.server.host, settings.server.port))
            .await
            .context("failed to bind to address")?;

    tracing::info!(
        "HTTP server listening on http://{}:{}",
        settings.server.host,
        settings.server.port
    );
    tracing::info!(
        "API documentation available at http://{}:{}/api-docs",
        settings.server.host,
        settings.server.port
    );

    // Start serving
    axum::serve(listener, app)
        .await
        .context("HTTP server failed")?;

    Ok(())
}

/// Build the main HTTP router with all module routes mounted
fn build_router(
    registry: &ModuleRegistry,
    settings: &shelf_kernel::settings::Settings,
    callback_routes: Router,
) -> anyhow::Result<Router> {
    let mut router_builder = RouterBuilder::new();

    // Liveness and health check routes
    router_builder = router_builder
        .route("/", get(liveness))
        .route("/healthz", get(health_check));

    // Identity-provider callback routes mount at the root
    router_builder = router_builder.merge(callback_routes);

    // Mount module routes
    for module in registry.modules() {
        let module_name = module.name();
        let module_router = module.routes();

        tracing::info!(
            module = module_name,
            "mounting module routes under /api/{}",
            module_name
        );
        router_builder = router_builder.mount_module(module_name, module_router);
    }

    // Add OpenAPI documentation
    router_builder = router_builder.with_openapi(registry);

    // Global middlewares go last so the layers wrap every mounted route
    router_builder = router_builder
        .with_tracing()
        .with_cors()
        .with_request_id()
        .with_timeout(settings.server.request_timeout_ms);

    Ok(router_builder.build())
}

/// Liveness endpoint
async fn liveness() -> &'static str {
    "SHELF API is running. See /api-docs for the Swagger documentation."
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
