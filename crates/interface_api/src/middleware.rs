//! API middleware

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{info, warn};

use domain_folio::RequestContext;

use crate::auth::Claims;
use crate::error::ApiError;
use crate::AppState;

/// Header carrying the request id set by the request-id layer
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Authentication middleware
///
/// Validates JWT tokens and stores the claims and the ledger request context
/// in the request extensions
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|header| header.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => {
            warn!("Missing or invalid Authorization header");
            return ApiError::Unauthorized.into_response();
        }
    };

    match crate::auth::validate_token(token, &state.config.jwt_secret) {
        Ok(claims) => {
            let mut ctx = claims.request_context();
            if let Some(request_id) = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|h| h.to_str().ok())
            {
                ctx = ctx.with_correlation_id(request_id);
            }
            request.extensions_mut().insert::<RequestContext>(ctx);
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => {
            warn!(error = %e, "Token validation failed");
            ApiError::Unauthorized.into_response()
        }
    }
}

/// Access log middleware
///
/// Logs every API request with its caller and outcome
pub async fn access_log_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let (user_id, tenant_id) = request
        .extensions()
        .get::<Claims>()
        .map(|c| (c.sub.clone(), c.tenant_id.to_string()))
        .unwrap_or_else(|| ("anonymous".to_string(), "-".to_string()));

    let start = Utc::now();

    let response = next.run(request).await;

    let duration = Utc::now() - start;
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        user = %user_id,
        tenant_id = %tenant_id,
        status = %status.as_u16(),
        duration_ms = duration.num_milliseconds(),
        "API request"
    );

    response
}
