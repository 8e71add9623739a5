//! Invoice handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use core_kernel::InvoiceId;
use domain_folio::{CompileInvoice, Invoice, RequestContext};

use crate::{error::ApiError, AppState};

/// Compiles a draft invoice from folios or explicit lines
pub async fn compile_invoice(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<CompileInvoice>,
) -> Result<(StatusCode, Json<Invoice>), ApiError> {
    let invoice = state.service.compile_invoice(&ctx, &request).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(invoice_id): Path<InvoiceId>,
) -> Result<Json<Invoice>, ApiError> {
    Ok(Json(state.service.get_invoice(&ctx, invoice_id).await?))
}

/// Issues a draft invoice
pub async fn issue_invoice(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(invoice_id): Path<InvoiceId>,
) -> Result<Json<Invoice>, ApiError> {
    Ok(Json(state.service.issue_invoice(&ctx, invoice_id).await?))
}

/// Marks an issued invoice as paid
pub async fn mark_invoice_paid(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(invoice_id): Path<InvoiceId>,
) -> Result<Json<Invoice>, ApiError> {
    Ok(Json(state.service.mark_invoice_paid(&ctx, invoice_id).await?))
}
