//! API error handling

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use domain_folio::{ErrorKind, FolioError};

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error(transparent)]
    Ledger(#[from] FolioError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Status code of a ledger error kind
    pub fn status_for(kind: ErrorKind) -> StatusCode {
        match kind {
            ErrorKind::Validation | ErrorKind::TransactionFailure => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::State | ErrorKind::Concurrency | ErrorKind::OutstandingBalance => StatusCode::CONFLICT,
            ErrorKind::Permission => StatusCode::FORBIDDEN,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn kind_name(kind: ErrorKind) -> String {
    serde_json::to_value(kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "internal".to_string())
}

/// Per-folio or per-charge context carried by a ledger error
fn ledger_details(err: &FolioError) -> Option<serde_json::Value> {
    match err {
        FolioError::OutstandingBalance { folios } => serde_json::to_value(folios).ok(),
        FolioError::TransactionFailure { rejected } => serde_json::to_value(rejected).ok(),
        FolioError::DuplicateFolio { existing: Some(folio_id), .. } => {
            Some(serde_json::json!({ "existing_folio_id": folio_id }))
        }
        _ => None,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request".to_string(), msg, None),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized".to_string(),
                "Unauthorized".to_string(),
                None,
            ),
            ApiError::Validation { message, details } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation".to_string(),
                message,
                details,
            ),
            ApiError::Ledger(err) => {
                let kind = err.kind();
                let status = Self::status_for(kind);
                if kind == ErrorKind::Internal {
                    error!(error = %err, "Ledger operation failed");
                }
                (status, kind_name(kind), err.to_string(), ledger_details(&err))
            }
            ApiError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal".to_string(),
                    msg,
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: error_type,
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            // Well-formed JSON that does not fit the request type, e.g. an unknown field
            JsonRejection::JsonDataError(err) => ApiError::Validation {
                message: err.body_text(),
                details: None,
            },
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields: Vec<String> = errors.field_errors().keys().map(|k| k.to_string()).collect();
        ApiError::Validation {
            message: errors.to_string(),
            details: Some(serde_json::json!({ "fields": fields })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{ChargeId, FolioId, PortError};

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ErrorKind::Validation, StatusCode::UNPROCESSABLE_ENTITY),
            (ErrorKind::NotFound, StatusCode::NOT_FOUND),
            (ErrorKind::State, StatusCode::CONFLICT),
            (ErrorKind::Concurrency, StatusCode::CONFLICT),
            (ErrorKind::OutstandingBalance, StatusCode::CONFLICT),
            (ErrorKind::Permission, StatusCode::FORBIDDEN),
            (ErrorKind::TransactionFailure, StatusCode::UNPROCESSABLE_ENTITY),
            (ErrorKind::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (kind, status) in cases {
            assert_eq!(ApiError::status_for(kind), status, "{:?}", kind);
        }
    }

    #[test]
    fn test_ledger_error_response() {
        let response = ApiError::from(FolioError::ClosedFolio(FolioId::new())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = ApiError::from(FolioError::Store(PortError::internal("pool closed"))).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_kind_name_is_snake_case() {
        assert_eq!(kind_name(ErrorKind::OutstandingBalance), "outstanding_balance");
        assert_eq!(kind_name(ErrorKind::NotFound), "not_found");
    }

    #[test]
    fn test_transfer_rejections_in_details() {
        let err = FolioError::TransactionFailure {
            rejected: vec![domain_folio::ChargeRejection {
                charge_id: ChargeId::new(),
                reason: domain_folio::ChargeRejectionReason::Voided,
            }],
        };
        let details = ledger_details(&err).unwrap();
        assert_eq!(details[0]["reason"], "voided");
    }
}
