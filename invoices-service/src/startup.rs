//! Application startup and lifecycle management.

use crate::config::InvoicesConfig;
use crate::handlers;
use crate::services::{init_metrics, Clock, Database, InvoiceStore, SystemClock};
use axum::extract::Request;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::{Router, ServiceExt};
use service_core::error::AppError;
use service_core::middleware::{request_id_middleware, track_http_metrics};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::Layer;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn InvoiceStore>,
    pub clock: Arc<dyn Clock>,
}

/// Build the HTTP router with all routes and middleware.
///
/// Routes are trailing-slash tolerant: `run_until_stopped` wraps the
/// router in a path-normalization layer, and tests that need the same
/// behavior should do the same.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/invoices",
            get(handlers::invoices::list_invoices).post(handlers::invoices::create_invoice),
        )
        .route(
            "/invoices/archived",
            get(handlers::invoices::list_archived),
        )
        .route(
            "/invoices/statistics",
            get(handlers::invoices::invoice_statistics),
        )
        .route("/invoices/product", get(handlers::invoices::list_products))
        .route("/invoices/products", get(handlers::invoices::list_products))
        .route(
            "/invoices/revenue_by_company",
            get(handlers::invoices::revenue_by_company),
        )
        .route(
            "/invoices/:id",
            get(handlers::invoices::get_invoice)
                .put(handlers::invoices::update_invoice)
                .delete(handlers::invoices::delete_invoice),
        )
        .route(
            "/invoices/:id/restore",
            post(handlers::invoices::restore_invoice),
        )
        .route(
            "/invoices/:id/create_credit_note",
            post(handlers::invoices::create_credit_note),
        )
        .route(
            "/persons",
            get(handlers::persons::list_persons).post(handlers::persons::create_person),
        )
        .route(
            "/persons/statistics",
            get(handlers::persons::person_statistics),
        )
        .route(
            "/persons/:id",
            get(handlers::persons::get_person)
                .put(handlers::persons::update_person)
                .delete(handlers::persons::delete_person),
        )
        .route(
            "/identification/:identification_number/sales",
            get(handlers::identification::sales),
        )
        .route(
            "/identification/:identification_number/purchases",
            get(handlers::identification::purchases),
        )
        .route(
            "/identification/:identification_number/both",
            get(handlers::identification::both),
        );

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .nest("/api", api)
        // Allow browser clients from any origin
        .layer(CorsLayer::permissive())
        // Add metrics middleware
        .layer(from_fn(track_http_metrics))
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http_request",
                request_id = %request_id,
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
            )
        }))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
    config: InvoicesConfig,
}

impl Application {
    /// Build the application against PostgreSQL, running migrations on startup.
    pub async fn build(config: InvoicesConfig) -> Result<Self, AppError> {
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            e
        })?;

        Self::with_store(config, Arc::new(db), Arc::new(SystemClock)).await
    }

    /// Build the application on top of an already-constructed store.
    /// Use this in tests to swap in an in-memory store or a fixed clock.
    pub async fn with_store(
        config: InvoicesConfig,
        store: Arc<dyn InvoiceStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        // Initialize metrics
        init_metrics();

        let state = AppState { store, clock };

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Invoices service listener bound");

        Ok(Self {
            port,
            listener,
            state,
            config,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);
        let app = NormalizePathLayer::trim_trailing_slash().layer(router);

        tracing::info!(
            service = %self.config.service_name,
            version = %self.config.service_version,
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(
            self.listener,
            ServiceExt::<Request>::into_make_service(app),
        )
        .await
    }
}
