//! Folios
//!
//! A folio is the running account of a single payer within a booking. Every
//! booking has at most one open guest folio and at most one open company
//! folio at any time; the folio number is allocated from a per-tenant,
//! per-year sequence and never reused.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BookingId, Currency, FolioId, PartyId, TenantId};

use crate::error::FolioError;

/// Who the folio is billed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolioType {
    /// The guest's own account
    Guest,
    /// Direct-billed company account
    Company,
}

impl FolioType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FolioType::Guest => "guest",
            FolioType::Company => "company",
        }
    }
}

impl fmt::Display for FolioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FolioType {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guest" => Ok(FolioType::Guest),
            "company" => Ok(FolioType::Company),
            other => Err(FolioError::validation(format!("unknown folio type '{}'", other))),
        }
    }
}

/// Folio lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolioStatus {
    Open,
    Closed,
}

impl FolioStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FolioStatus::Open => "open",
            FolioStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for FolioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FolioStatus {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(FolioStatus::Open),
            "closed" => Ok(FolioStatus::Closed),
            other => Err(FolioError::validation(format!("unknown folio status '{}'", other))),
        }
    }
}

/// Formats a folio number, e.g. `F2026-000001`
pub fn format_folio_number(year: i32, sequence: u32) -> String {
    format!("F{}-{:06}", year, sequence)
}

/// A folio: the account header that charges and payments post against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folio {
    /// Unique identifier
    pub id: FolioId,
    /// Owning tenant (property group)
    pub tenant_id: TenantId,
    /// Booking this folio belongs to
    pub booking_id: BookingId,
    /// Guest or company
    pub folio_type: FolioType,
    /// Guest or company the folio is billed to
    pub owner_id: PartyId,
    /// Human-readable number, unique per tenant
    pub folio_number: String,
    /// Currency of every amount on the folio
    pub currency: Currency,
    /// Lifecycle status
    pub status: FolioStatus,
    /// Optimistic-lock version, managed by the ledger store
    pub version: u64,
    /// When the folio was opened
    pub created_at: DateTime<Utc>,
    /// When the folio was last closed
    pub closed_at: Option<DateTime<Utc>>,
    /// Actor who last closed the folio
    pub closed_by: Option<String>,
    /// Recorded reason for a forced close
    pub close_reason: Option<String>,
}

impl Folio {
    /// Opens a new folio
    ///
    /// # Arguments
    ///
    /// * `tenant_id` - Owning tenant
    /// * `booking_id` - Booking the folio belongs to
    /// * `folio_type` - Guest or company
    /// * `owner_id` - Payer of the folio
    /// * `folio_number` - Allocated folio number
    /// * `currency` - Ledger currency
    pub fn open(
        tenant_id: TenantId,
        booking_id: BookingId,
        folio_type: FolioType,
        owner_id: PartyId,
        folio_number: String,
        currency: Currency,
    ) -> Self {
        Self {
            id: FolioId::new_v7(),
            tenant_id,
            booking_id,
            folio_type,
            owner_id,
            folio_number,
            currency,
            status: FolioStatus::Open,
            version: 0,
            created_at: Utc::now(),
            closed_at: None,
            closed_by: None,
            close_reason: None,
        }
    }

    /// Returns true if the folio accepts ledger postings
    pub fn is_open(&self) -> bool {
        self.status == FolioStatus::Open
    }

    /// Fails with `ClosedFolio` unless the folio is open
    pub fn ensure_open(&self) -> Result<(), FolioError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(FolioError::ClosedFolio(self.id))
        }
    }

    /// Closes the folio
    ///
    /// Balance checks are the caller's responsibility; this only enforces
    /// the lifecycle.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` if the folio is already closed
    pub fn close(&mut self, actor: &str, reason: Option<String>) -> Result<(), FolioError> {
        if !self.is_open() {
            return Err(self.invalid_transition(FolioStatus::Closed));
        }
        self.status = FolioStatus::Closed;
        self.closed_at = Some(Utc::now());
        self.closed_by = Some(actor.to_string());
        self.close_reason = reason;
        Ok(())
    }

    /// Reopens a closed folio
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` if the folio is already open
    pub fn reopen(&mut self) -> Result<(), FolioError> {
        if self.is_open() {
            return Err(self.invalid_transition(FolioStatus::Open));
        }
        self.status = FolioStatus::Open;
        self.closed_at = None;
        self.closed_by = None;
        self.close_reason = None;
        Ok(())
    }

    fn invalid_transition(&self, to: FolioStatus) -> FolioError {
        FolioError::InvalidTransition {
            entity: "folio",
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }
}
