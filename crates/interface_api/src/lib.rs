//! HTTP API Layer
//!
//! This crate provides the REST API for the folio ledger using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: One per ledger operation, plus a tagged-request dispatch route
//! - **Middleware**: JWT authentication, access logging, request ids
//! - **DTOs**: Validated request bodies for the resource routes
//! - **Error Handling**: Ledger error kinds mapped to status codes
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let app = create_router(service, config);
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    http::HeaderName,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use domain_folio::FolioService;

use crate::config::ApiConfig;
use crate::handlers::{audit, folio, health, invoice, ledger};
use crate::middleware::{access_log_middleware, auth_middleware, REQUEST_ID_HEADER};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FolioService>,
    pub config: ApiConfig,
}

/// Creates the main API router
///
/// # Arguments
///
/// * `service` - Folio ledger service wired to its store and collaborators
/// * `config` - API configuration
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(service: Arc<FolioService>, config: ApiConfig) -> Router {
    let state = AppState { service, config };
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let folio_routes = Router::new()
        .route("/", post(folio::create_folio))
        .route("/:id", get(folio::get_folio))
        .route("/:id/charges", post(folio::post_charge))
        .route("/:id/adjustments", post(folio::post_adjustment))
        .route("/:id/payments", post(folio::post_payment))
        .route("/:id/close", post(folio::close_folio))
        .route("/:id/reopen", post(folio::reopen_folio));

    let booking_routes = Router::new()
        .route("/:id/folios", get(folio::list_folios))
        .route("/:id/settle", post(folio::settle_booking));

    let invoice_routes = Router::new()
        .route("/", post(invoice::compile_invoice))
        .route("/:id", get(invoice::get_invoice))
        .route("/:id/issue", post(invoice::issue_invoice))
        .route("/:id/paid", post(invoice::mark_invoice_paid));

    // Protected API routes
    let api_routes = Router::new()
        .route("/ledger", post(ledger::dispatch))
        .nest("/folios", folio_routes)
        .route("/charges/:id/void", post(folio::void_charge))
        .route("/transfers", post(folio::transfer))
        .nest("/bookings", booking_routes)
        .nest("/invoices", invoice_routes)
        .route("/audit", get(audit::audit_trail))
        .layer(axum_middleware::from_fn(access_log_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Outermost first: CORS, then the request id, which the trace span and
    // the response both carry
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let edge = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(edge)
        .layer(cors)
        .with_state(state)
}
