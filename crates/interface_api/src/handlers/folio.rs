//! Folio, charge, payment, transfer and settlement handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use core_kernel::{BookingId, ChargeId, FolioId};
use domain_folio::{
    Charge, CreateFolio, Folio, FolioStatement, Payment, RequestContext, SettlementOutcome,
    TransferRecord,
};

use crate::dto::folio::*;
use crate::dto::ValidatedJson;
use crate::{error::ApiError, AppState};

/// Opens a folio for a booking
pub async fn create_folio(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<CreateFolio>,
) -> Result<(StatusCode, Json<Folio>), ApiError> {
    let folio = state.service.create_folio(&ctx, &request).await?;
    Ok((StatusCode::CREATED, Json(folio)))
}

/// Gets a folio with its ledgers and balance
pub async fn get_folio(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(folio_id): Path<FolioId>,
) -> Result<Json<FolioStatement>, ApiError> {
    Ok(Json(state.service.get_folio(&ctx, folio_id).await?))
}

/// Lists the folios of a booking
pub async fn list_folios(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(booking_id): Path<BookingId>,
) -> Result<Json<Vec<Folio>>, ApiError> {
    Ok(Json(state.service.list_folios(&ctx, booking_id).await?))
}

/// Posts a charge
pub async fn post_charge(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(folio_id): Path<FolioId>,
    ValidatedJson(body): ValidatedJson<ChargeBody>,
) -> Result<(StatusCode, Json<Charge>), ApiError> {
    let charge = state.service.post_charge(&ctx, &body.into_request(folio_id)).await?;
    Ok((StatusCode::CREATED, Json(charge)))
}

/// Posts a negative adjustment
pub async fn post_adjustment(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(folio_id): Path<FolioId>,
    ValidatedJson(body): ValidatedJson<AdjustmentBody>,
) -> Result<(StatusCode, Json<Charge>), ApiError> {
    let charge = state.service.post_adjustment(&ctx, &body.into_request(folio_id)).await?;
    Ok((StatusCode::CREATED, Json(charge)))
}

/// Voids a charge
pub async fn void_charge(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(charge_id): Path<ChargeId>,
    ValidatedJson(body): ValidatedJson<ReasonBody>,
) -> Result<Json<Charge>, ApiError> {
    Ok(Json(state.service.void_charge(&ctx, &body.into_void(charge_id)).await?))
}

/// Posts a payment
pub async fn post_payment(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(folio_id): Path<FolioId>,
    ValidatedJson(body): ValidatedJson<PaymentBody>,
) -> Result<(StatusCode, Json<Payment>), ApiError> {
    let payment = state.service.post_payment(&ctx, &body.into_request(folio_id)).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// Closes a folio
pub async fn close_folio(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(folio_id): Path<FolioId>,
    ValidatedJson(body): ValidatedJson<CloseBody>,
) -> Result<Json<Folio>, ApiError> {
    Ok(Json(state.service.close_folio(&ctx, &body.into_close(folio_id)).await?))
}

/// Reopens a closed folio
pub async fn reopen_folio(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(folio_id): Path<FolioId>,
    ValidatedJson(body): ValidatedJson<ReasonBody>,
) -> Result<Json<Folio>, ApiError> {
    Ok(Json(state.service.reopen_folio(&ctx, &body.into_reopen(folio_id)).await?))
}

/// Moves charges between folios of one booking
pub async fn transfer(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    ValidatedJson(body): ValidatedJson<TransferBody>,
) -> Result<(StatusCode, Json<TransferRecord>), ApiError> {
    let record = state.service.transfer(&ctx, &body.into()).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Settles a booking and closes all of its folios
pub async fn settle_booking(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(booking_id): Path<BookingId>,
    ValidatedJson(body): ValidatedJson<CloseBody>,
) -> Result<Json<SettlementOutcome>, ApiError> {
    Ok(Json(state.service.settle_and_close(&ctx, &body.into_settle(booking_id)).await?))
}
