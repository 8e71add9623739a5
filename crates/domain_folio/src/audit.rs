//! Audit log
//!
//! Append-only record of every mutating operation. Entries are never written
//! on their own: each one travels in the same change set as the mutation it
//! describes, so either both are committed or neither is.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use core_kernel::{AuditEntryId, TenantId};

use crate::context::RequestContext;
use crate::error::FolioError;
use crate::service::FolioService;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    FolioCreated,
    FolioClosed,
    FolioForceClosed,
    FolioReopened,
    ChargePosted,
    ChargeVoided,
    AdjustmentPosted,
    PaymentPosted,
    ChargesTransferred,
    InvoiceCompiled,
    InvoiceIssued,
    InvoicePaid,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::FolioCreated => "folio_created",
            AuditAction::FolioClosed => "folio_closed",
            AuditAction::FolioForceClosed => "folio_force_closed",
            AuditAction::FolioReopened => "folio_reopened",
            AuditAction::ChargePosted => "charge_posted",
            AuditAction::ChargeVoided => "charge_voided",
            AuditAction::AdjustmentPosted => "adjustment_posted",
            AuditAction::PaymentPosted => "payment_posted",
            AuditAction::ChargesTransferred => "charges_transferred",
            AuditAction::InvoiceCompiled => "invoice_compiled",
            AuditAction::InvoiceIssued => "invoice_issued",
            AuditAction::InvoicePaid => "invoice_paid",
        }
    }

    /// Parses the stored form
    pub fn parse(value: &str) -> Option<Self> {
        [
            AuditAction::FolioCreated,
            AuditAction::FolioClosed,
            AuditAction::FolioForceClosed,
            AuditAction::FolioReopened,
            AuditAction::ChargePosted,
            AuditAction::ChargeVoided,
            AuditAction::AdjustmentPosted,
            AuditAction::PaymentPosted,
            AuditAction::ChargesTransferred,
            AuditAction::InvoiceCompiled,
            AuditAction::InvoiceIssued,
            AuditAction::InvoicePaid,
        ]
        .into_iter()
        .find(|action| action.as_str() == value)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of entity an entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Folio,
    Charge,
    Payment,
    Transfer,
    Invoice,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Folio => "folio",
            EntityType::Charge => "charge",
            EntityType::Payment => "payment",
            EntityType::Transfer => "transfer",
            EntityType::Invoice => "invoice",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "folio" => Some(EntityType::Folio),
            "charge" => Some(EntityType::Charge),
            "payment" => Some(EntityType::Payment),
            "transfer" => Some(EntityType::Transfer),
            "invoice" => Some(EntityType::Invoice),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub tenant_id: TenantId,
    pub actor: String,
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// Starts an entry for `action` on an entity, attributed to the context's actor
    pub fn new(
        ctx: &RequestContext,
        action: AuditAction,
        entity_type: EntityType,
        entity_id: impl Into<Uuid>,
    ) -> Self {
        Self {
            id: AuditEntryId::new_v7(),
            tenant_id: ctx.tenant_id,
            actor: ctx.actor.id.clone(),
            action,
            entity_type,
            entity_id: entity_id.into(),
            before: None,
            after: None,
            reason: None,
            timestamp: Utc::now(),
        }
    }

    /// Attaches the state before the mutation
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the snapshot cannot be encoded
    pub fn before<T: Serialize>(mut self, state: &T) -> Result<Self, FolioError> {
        self.before = Some(serde_json::to_value(state)?);
        Ok(self)
    }

    /// Attaches the state after the mutation
    pub fn after<T: Serialize>(mut self, state: &T) -> Result<Self, FolioError> {
        self.after = Some(serde_json::to_value(state)?);
        Ok(self)
    }

    /// Attaches a free-text reason (void, force, reopen, transfer)
    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }
}

/// Filter for audit trail export
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditQuery {
    /// Only entries about this entity
    #[serde(default)]
    pub entity_id: Option<Uuid>,
    /// Inclusive lower bound
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of entries, oldest first
    #[serde(default)]
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn for_entity(entity_id: impl Into<Uuid>) -> Self {
        Self {
            entity_id: Some(entity_id.into()),
            ..Default::default()
        }
    }

    /// Returns true if `entry` passes the entity and time filters
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.entity_id.map_or(true, |id| entry.entity_id == id)
            && self.from.map_or(true, |from| entry.timestamp >= from)
            && self.to.map_or(true, |to| entry.timestamp < to)
    }

    /// Rejects inverted time ranges
    pub fn validate(&self) -> Result<(), FolioError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(FolioError::validation("audit query 'from' is after 'to'"));
            }
        }
        Ok(())
    }
}

impl FolioService {
    /// Returns the tenant's audit entries matching `query`, oldest first
    pub async fn audit_trail(
        &self,
        ctx: &RequestContext,
        query: &AuditQuery,
    ) -> Result<Vec<AuditEntry>, FolioError> {
        query.validate()?;
        Ok(self.store().audit_entries(ctx.tenant_id, query).await?)
    }
}
