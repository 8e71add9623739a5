//! Tagged request dispatch

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};

use domain_folio::{LedgerRequest, LedgerResponse, RequestContext};

use crate::{error::ApiError, AppState};

/// Runs any ledger operation given as a tagged request
///
/// The body names the operation in its `operation` field; unknown
/// operations and unknown fields are rejected as validation errors.
pub async fn dispatch(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<Json<LedgerRequest>, JsonRejection>,
) -> Result<Json<LedgerResponse>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(state.service.handle(&ctx, request).await?))
}
