//! Folio domain errors
//!
//! Every failure of a ledger operation is one variant of [`FolioError`]; each
//! variant maps onto exactly one [`ErrorKind`] so callers can branch on the
//! category while still receiving the specific context (folio, charge, amount).

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use core_kernel::{BookingId, ChargeId, FolioId, Money, MoneyError, PortError};

use crate::folio::FolioType;

/// Error category exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    State,
    Concurrency,
    OutstandingBalance,
    Permission,
    TransactionFailure,
    Internal,
}

/// A folio blocking settlement, with its freshly computed balance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutstandingFolio {
    pub folio_id: FolioId,
    pub folio_number: String,
    pub folio_type: FolioType,
    pub balance: Money,
}

/// Why a charge was rejected from a transfer batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeRejectionReason {
    /// Unknown, foreign, or currently posted on another folio
    NotOnSourceFolio,
    /// Voided charges stay where they were voided
    Voided,
}

/// A single charge rejected from a transfer batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeRejection {
    pub charge_id: ChargeId,
    pub reason: ChargeRejectionReason,
}

/// Errors that can occur in the folio domain
#[derive(Debug, Error)]
pub enum FolioError {
    /// Malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Non-positive monetary amount
    #[error("Invalid amount {amount}: must be greater than zero")]
    InvalidAmount { amount: Decimal },

    /// Unknown entity, or one that belongs to another tenant
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The booking collaborator does not know the booking
    #[error("Booking not found: {0}")]
    BookingNotFound(BookingId),

    /// An open folio of this type already exists for the booking
    #[error("Booking {booking_id} already has an open {folio_type} folio")]
    DuplicateFolio {
        booking_id: BookingId,
        folio_type: FolioType,
        existing: Option<FolioId>,
    },

    /// Ledger mutation attempted on a closed folio
    #[error("Folio {0} is closed")]
    ClosedFolio(FolioId),

    /// Second void of the same charge
    #[error("Charge {0} is already voided")]
    AlreadyVoided(ChargeId),

    /// Lifecycle transition not permitted from the current state
    #[error("Invalid {entity} transition from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Optimistic-lock conflict that survived the retry budget
    #[error("Concurrent modification: {0}")]
    Concurrency(String),

    /// Settlement or close blocked by non-zero balances
    #[error("Outstanding balance on {} folio(s)", .folios.len())]
    OutstandingBalance { folios: Vec<OutstandingFolio> },

    /// Override or admin action without the required permission
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Multi-charge batch rejected as a whole
    #[error("Transfer aborted: {} charge(s) rejected", .rejected.len())]
    TransactionFailure { rejected: Vec<ChargeRejection> },

    /// Arithmetic failure (currency mismatch, invalid rate)
    #[error("Calculation error: {0}")]
    Calculation(#[from] MoneyError),

    /// Snapshot serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persistence or collaborator failure
    #[error("Storage error: {0}")]
    Store(#[from] PortError),
}

impl FolioError {
    /// Creates a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        FolioError::Validation(message.into())
    }

    /// Creates a not-found error for the given entity
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        FolioError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns the caller-facing category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            FolioError::Validation(_) | FolioError::InvalidAmount { .. } => ErrorKind::Validation,
            FolioError::Calculation(_) => ErrorKind::Validation,
            FolioError::NotFound { .. } | FolioError::BookingNotFound(_) => ErrorKind::NotFound,
            FolioError::DuplicateFolio { .. }
            | FolioError::ClosedFolio(_)
            | FolioError::AlreadyVoided(_)
            | FolioError::InvalidTransition { .. } => ErrorKind::State,
            FolioError::Concurrency(_) => ErrorKind::Concurrency,
            FolioError::OutstandingBalance { .. } => ErrorKind::OutstandingBalance,
            FolioError::Permission(_) => ErrorKind::Permission,
            FolioError::TransactionFailure { .. } => ErrorKind::TransactionFailure,
            FolioError::Serialization(_) => ErrorKind::Internal,
            FolioError::Store(port) => match port {
                PortError::NotFound { .. } => ErrorKind::NotFound,
                PortError::Validation { .. } => ErrorKind::Validation,
                PortError::Conflict { .. } => ErrorKind::Concurrency,
                PortError::AlreadyExists { .. } => ErrorKind::State,
                _ => ErrorKind::Internal,
            },
        }
    }

    /// Returns true if this is an optimistic-lock conflict from the store
    pub(crate) fn is_store_conflict(&self) -> bool {
        matches!(self, FolioError::Store(port) if port.is_conflict())
    }
}
