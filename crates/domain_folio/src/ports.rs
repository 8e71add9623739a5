//! Folio Domain Ports
//!
//! This module defines the port interfaces the folio ledger depends on,
//! enabling swappable implementations (PostgreSQL, in-memory, remote
//! collaborators).
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────┐
//!                 │ FolioService │
//!                 └──────┬───────┘
//!        ┌───────────────┼──────────────────┐
//!        ▼               ▼                  ▼
//!  LedgerStore      BookingPort      HousekeepingPort
//!  (folios, charges, (booking exists, (room dirty after
//!   payments, audit)  checked out)     checkout)
//! ```
//!
//! Every mutation reaches the store as a single [`ChangeSet`]: the
//! preconditions it was decided under plus the writes it produces. The store
//! applies a change set atomically; if any precondition no longer holds the
//! whole commit fails with `PortError::Conflict` and nothing is written.
//!
//! # Version management
//!
//! Versions are owned by the store:
//! - a folio's version is bumped once per commit that updates the folio or
//!   inserts/updates any of its charges or payments (for a charge moving
//!   between folios, both folios count as touched);
//! - a charge's version is bumped each time the charge is updated.
//!
//! Versions carried on written entities are ignored.

use async_trait::async_trait;

use core_kernel::{
    BookingId, ChargeId, DomainPort, FolioId, HealthCheckable, InvoiceId, PortError, TenantId,
};

use crate::audit::{AuditEntry, AuditQuery};
use crate::charge::Charge;
use crate::folio::{Folio, FolioType};
use crate::invoice::{Invoice, InvoiceStatus};
use crate::payment::Payment;
use crate::transfer::TransferRecord;

/// Condition that must still hold when a change set is committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// The folio exists and is open
    FolioOpen(FolioId),
    /// The folio is unchanged since it was read at `version`
    FolioVersion { folio_id: FolioId, version: u64 },
    /// The charge is unchanged since it was read at `version`
    ChargeVersion { charge_id: ChargeId, version: u64 },
    /// The booking has exactly `count` open folios; together with a
    /// `FolioVersion` guard on each of them this pins the open set
    OpenFolioCount { booking_id: BookingId, count: usize },
    /// The invoice is still in `status`
    InvoiceState { invoice_id: InvoiceId, status: InvoiceStatus },
}

/// A single write inside a change set
#[derive(Debug, Clone)]
pub enum LedgerWrite {
    InsertFolio(Folio),
    UpdateFolio(Folio),
    InsertCharge(Charge),
    UpdateCharge(Charge),
    InsertPayment(Payment),
    InsertTransfer(TransferRecord),
    InsertInvoice(Invoice),
    UpdateInvoice(Invoice),
    AppendAudit(AuditEntry),
}

impl LedgerWrite {
    /// Tenant of the written entity
    pub fn tenant_id(&self) -> TenantId {
        match self {
            LedgerWrite::InsertFolio(f) | LedgerWrite::UpdateFolio(f) => f.tenant_id,
            LedgerWrite::InsertCharge(c) | LedgerWrite::UpdateCharge(c) => c.tenant_id,
            LedgerWrite::InsertPayment(p) => p.tenant_id,
            LedgerWrite::InsertTransfer(t) => t.tenant_id,
            LedgerWrite::InsertInvoice(i) | LedgerWrite::UpdateInvoice(i) => i.tenant_id,
            LedgerWrite::AppendAudit(a) => a.tenant_id,
        }
    }
}

/// An atomic unit of ledger mutation
#[derive(Debug, Clone)]
pub struct ChangeSet {
    pub tenant_id: TenantId,
    pub preconditions: Vec<Precondition>,
    pub writes: Vec<LedgerWrite>,
}

impl ChangeSet {
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            preconditions: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// Adds a precondition
    pub fn require(mut self, precondition: Precondition) -> Self {
        self.preconditions.push(precondition);
        self
    }

    /// Adds a write
    pub fn write(mut self, write: LedgerWrite) -> Self {
        self.writes.push(write);
        self
    }

    /// Adds the audit entry describing this change
    pub fn audit(self, entry: AuditEntry) -> Self {
        self.write(LedgerWrite::AppendAudit(entry))
    }

    /// Fails if any write targets another tenant
    pub fn check_tenant(&self) -> Result<(), PortError> {
        match self.writes.iter().find(|w| w.tenant_id() != self.tenant_id) {
            Some(_) => Err(PortError::validation("change set writes outside its tenant")),
            None => Ok(()),
        }
    }

    /// Bookings whose set of open folios this change set reads or may grow
    ///
    /// Stores serialize commits per booking on these so an open folio cannot
    /// appear between a settlement's read and its commit.
    pub fn guarded_bookings(&self) -> Vec<BookingId> {
        let mut bookings = Vec::new();
        let guarded = self.preconditions.iter().filter_map(|p| match p {
            Precondition::OpenFolioCount { booking_id, .. } => Some(*booking_id),
            _ => None,
        });
        let opened = self.writes.iter().filter_map(|w| match w {
            LedgerWrite::InsertFolio(f) | LedgerWrite::UpdateFolio(f) if f.is_open() => Some(f.booking_id),
            _ => None,
        });
        for booking_id in guarded.chain(opened) {
            if !bookings.contains(&booking_id) {
                bookings.push(booking_id);
            }
        }
        bookings.sort_by_key(|b| *b.as_uuid());
        bookings
    }

    /// Folios whose version a commit of this change set bumps
    ///
    /// `previous_folio` resolves the current folio of an updated charge so a
    /// charge moving between folios touches both.
    pub fn touched_folios(&self, previous_folio: impl Fn(ChargeId) -> Option<FolioId>) -> Vec<FolioId> {
        let mut touched = Vec::new();
        let mut touch = |id: FolioId| {
            if !touched.contains(&id) {
                touched.push(id);
            }
        };
        for write in &self.writes {
            match write {
                LedgerWrite::UpdateFolio(f) => touch(f.id),
                LedgerWrite::InsertCharge(c) => touch(c.folio_id),
                LedgerWrite::UpdateCharge(c) => {
                    if let Some(previous) = previous_folio(c.id) {
                        touch(previous);
                    }
                    touch(c.folio_id);
                }
                LedgerWrite::InsertPayment(p) => touch(p.folio_id),
                _ => {}
            }
        }
        touched
    }
}

/// Per-tenant numbering sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceKind {
    Folio,
    Invoice,
}

impl SequenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceKind::Folio => "folio",
            SequenceKind::Invoice => "invoice",
        }
    }
}

/// Persistence port for the ledger
///
/// All reads are tenant-scoped: an id that exists under another tenant is
/// reported exactly like an unknown id.
#[async_trait]
pub trait LedgerStore: DomainPort + HealthCheckable {
    /// Allocates the next number of a per-tenant, per-year sequence
    ///
    /// Numbers are strictly increasing; gaps are allowed.
    async fn next_sequence(
        &self,
        tenant_id: TenantId,
        kind: SequenceKind,
        year: i32,
    ) -> Result<u32, PortError>;

    async fn get_folio(&self, tenant_id: TenantId, id: FolioId) -> Result<Option<Folio>, PortError>;

    /// All folios of a booking, oldest first
    async fn folios_for_booking(
        &self,
        tenant_id: TenantId,
        booking_id: BookingId,
    ) -> Result<Vec<Folio>, PortError>;

    async fn get_charge(&self, tenant_id: TenantId, id: ChargeId) -> Result<Option<Charge>, PortError>;

    /// Charges currently on a folio (voided included), in posting order
    async fn charges_for_folio(
        &self,
        tenant_id: TenantId,
        folio_id: FolioId,
    ) -> Result<Vec<Charge>, PortError>;

    /// Payments on a folio, in posting order
    async fn payments_for_folio(
        &self,
        tenant_id: TenantId,
        folio_id: FolioId,
    ) -> Result<Vec<Payment>, PortError>;

    async fn get_invoice(&self, tenant_id: TenantId, id: InvoiceId) -> Result<Option<Invoice>, PortError>;

    /// Audit entries matching `query`, oldest first
    async fn audit_entries(
        &self,
        tenant_id: TenantId,
        query: &AuditQuery,
    ) -> Result<Vec<AuditEntry>, PortError>;

    /// Applies a change set atomically
    ///
    /// # Errors
    ///
    /// * `Conflict` - a precondition no longer holds
    /// * `AlreadyExists` - a second open folio of one type for a booking
    /// * `NotFound` - an update targets an unknown row
    /// * `Validation` - a write targets another tenant
    async fn commit(&self, changes: ChangeSet) -> Result<(), PortError>;
}

/// Booking collaborator
#[async_trait]
pub trait BookingPort: DomainPort {
    /// Returns true if the booking exists in the tenant
    async fn booking_exists(&self, tenant_id: TenantId, booking_id: BookingId) -> Result<bool, PortError>;

    /// Signals that every folio of the booking is settled and closed
    async fn mark_checked_out(&self, tenant_id: TenantId, booking_id: BookingId) -> Result<(), PortError>;
}

/// Housekeeping collaborator
#[async_trait]
pub trait HousekeepingPort: DomainPort {
    /// Flags the booking's room for cleaning after checkout
    async fn mark_room_dirty(&self, tenant_id: TenantId, booking_id: BookingId) -> Result<(), PortError>;
}

/// Looks up the open folio of a type within a booking's folios
pub fn open_folio_of_type(folios: &[Folio], folio_type: FolioType) -> Option<&Folio> {
    folios.iter().find(|f| f.folio_type == folio_type && f.is_open())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folio::format_folio_number;
    use core_kernel::{Currency, PartyId};

    fn folio(tenant_id: TenantId) -> Folio {
        Folio::open(
            tenant_id,
            BookingId::new(),
            FolioType::Guest,
            PartyId::new(),
            format_folio_number(2026, 1),
            Currency::EUR,
        )
    }

    #[test]
    fn test_foreign_tenant_write_rejected() {
        let changes = ChangeSet::new(TenantId::new()).write(LedgerWrite::InsertFolio(folio(TenantId::new())));
        assert!(matches!(changes.check_tenant(), Err(PortError::Validation { .. })));
    }

    #[test]
    fn test_touched_folios_deduplicated() {
        let tenant_id = TenantId::new();
        let mut updated = folio(tenant_id);
        updated.close("fd", None).unwrap();
        let changes = ChangeSet::new(tenant_id)
            .write(LedgerWrite::UpdateFolio(updated.clone()))
            .write(LedgerWrite::UpdateFolio(updated.clone()));

        assert_eq!(changes.touched_folios(|_| None), vec![updated.id]);
    }

    #[test]
    fn test_guarded_bookings_cover_new_and_reopened_folios() {
        let tenant_id = TenantId::new();
        let created = folio(tenant_id);
        let mut closed = folio(tenant_id);
        closed.close("fd", None).unwrap();
        let settled = BookingId::new();

        let changes = ChangeSet::new(tenant_id)
            .require(Precondition::OpenFolioCount { booking_id: settled, count: 2 })
            .write(LedgerWrite::InsertFolio(created.clone()))
            .write(LedgerWrite::UpdateFolio(closed.clone()));

        let bookings = changes.guarded_bookings();
        assert_eq!(bookings.len(), 2);
        assert!(bookings.contains(&settled));
        assert!(bookings.contains(&created.booking_id));
        assert!(!bookings.contains(&closed.booking_id));
    }
}
