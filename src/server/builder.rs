//! ServerBuilder for fluent API to build HTTP servers

use crate::config::CrudConfig;
use anyhow::Result;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builder for the HTTP application
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_config(CrudConfig::from_yaml_file("crud.yaml")?)
///     .with_routes(users::routes(state))
///     .build()?;
/// ```
pub struct ServerBuilder {
    config: Option<Arc<CrudConfig>>,
    routes: Vec<Router>,
    cors: Option<CorsLayer>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new() -> Self {
        Self {
            config: None,
            routes: Vec::new(),
            cors: None,
        }
    }

    /// Set the runtime configuration
    pub fn with_config(mut self, config: impl Into<Arc<CrudConfig>>) -> Self {
        self.config = Some(config.into());
        self
    }

    /// Add routes to the server
    pub fn with_routes(mut self, routes: Router) -> Self {
        self.routes.push(routes);
        self
    }

    /// Answer cross-origin requests with the given policy
    pub fn with_cors(mut self, cors: CorsLayer) -> Self {
        self.cors = Some(cors);
        self
    }

    /// Build the router with health routes and request tracing
    pub fn build(self) -> Result<Router> {
        let collections = match &self.config {
            Some(config) => {
                config.validate()?;
                config.collections.clone()
            }
            None => Vec::new(),
        };

        let mut app = health_routes(collections);
        for routes in self.routes {
            app = app.merge(routes);
        }

        let app = match self.cors {
            Some(cors) => app.layer(cors),
            None => app,
        };
        Ok(app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http())))
    }

    /// Serve the application with graceful shutdown
    ///
    /// This will:
    /// - Bind to the provided address
    /// - Start serving requests
    /// - Handle SIGTERM and SIGINT (Ctrl+C) for graceful shutdown
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn health_routes(collections: Vec<String>) -> Router {
    let body = Arc::new(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "collections": collections,
    }));
    let health = move || {
        let body = body.clone();
        async move { Json(Value::clone(&body)) }
    };
    Router::new()
        .route("/health", get(health.clone()))
        .route("/healthz", get(health))
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
