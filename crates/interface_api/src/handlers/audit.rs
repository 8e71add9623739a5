//! Audit trail export

use axum::{
    extract::{Query, State},
    Extension, Json,
};

use domain_folio::{AuditEntry, AuditQuery, RequestContext};

use crate::{error::ApiError, AppState};

/// Exports the tenant's audit trail, oldest first
///
/// Filters: `entity_id`, `from` (inclusive), `to` (exclusive), `limit`.
pub async fn audit_trail(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    Ok(Json(state.service.audit_trail(&ctx, &query).await?))
}
