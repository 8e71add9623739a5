//! In-memory adapters
//!
//! Implementations of the folio ports that keep everything in process
//! memory. Used by tests and by the API when no database is configured.
//!
//! The ledger store commits by staging a copy of its state, applying every
//! write to the copy and swapping it in only if all writes succeeded, all
//! under one write lock. A failed precondition or write leaves the store
//! exactly as it was.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use core_kernel::{
    BookingId, ChargeId, DomainPort, FolioId, HealthCheckResult, HealthCheckable,
    InvoiceId, PortError, TenantId,
};

use crate::audit::{AuditEntry, AuditQuery};
use crate::charge::Charge;
use crate::folio::Folio;
use crate::invoice::Invoice;
use crate::payment::Payment;
use crate::ports::{
    BookingPort, ChangeSet, HousekeepingPort, LedgerStore, LedgerWrite, Precondition, SequenceKind,
};
use crate::transfer::TransferRecord;

#[derive(Debug, Clone, Default)]
struct LedgerState {
    folios: HashMap<FolioId, Folio>,
    charges: HashMap<ChargeId, Charge>,
    payments: Vec<Payment>,
    transfers: Vec<TransferRecord>,
    invoices: HashMap<InvoiceId, Invoice>,
    audit: Vec<AuditEntry>,
    sequences: HashMap<(TenantId, SequenceKind, i32), u32>,
}

impl LedgerState {
    fn check(&self, tenant_id: TenantId, precondition: &Precondition) -> Result<(), PortError> {
        match *precondition {
            Precondition::FolioOpen(folio_id) => match self.folio(tenant_id, folio_id) {
                Some(f) if f.is_open() => Ok(()),
                Some(_) => Err(PortError::conflict(format!("folio {} is no longer open", folio_id))),
                None => Err(PortError::not_found("Folio", folio_id)),
            },
            Precondition::FolioVersion { folio_id, version } => match self.folio(tenant_id, folio_id) {
                Some(f) if f.version == version => Ok(()),
                Some(f) => Err(PortError::conflict(format!(
                    "folio {} changed (expected version {}, found {})",
                    folio_id, version, f.version
                ))),
                None => Err(PortError::not_found("Folio", folio_id)),
            },
            Precondition::ChargeVersion { charge_id, version } => match self.charges.get(&charge_id) {
                Some(c) if c.tenant_id == tenant_id && c.version == version => Ok(()),
                Some(c) if c.tenant_id == tenant_id => Err(PortError::conflict(format!(
                    "charge {} changed (expected version {}, found {})",
                    charge_id, version, c.version
                ))),
                _ => Err(PortError::not_found("Charge", charge_id)),
            },
            Precondition::OpenFolioCount { booking_id, count } => {
                let open = self
                    .folios
                    .values()
                    .filter(|f| f.tenant_id == tenant_id && f.booking_id == booking_id && f.is_open())
                    .count();
                if open == count {
                    Ok(())
                } else {
                    Err(PortError::conflict(format!(
                        "booking {} has {} open folio(s), expected {}",
                        booking_id, open, count
                    )))
                }
            }
            Precondition::InvoiceState { invoice_id, status } => {
                match self.invoices.get(&invoice_id).filter(|i| i.tenant_id == tenant_id) {
                    Some(i) if i.status == status => Ok(()),
                    Some(i) => Err(PortError::conflict(format!(
                        "invoice {} is {}, expected {}",
                        invoice_id, i.status, status
                    ))),
                    None => Err(PortError::not_found("Invoice", invoice_id)),
                }
            }
        }
    }

    fn folio(&self, tenant_id: TenantId, id: FolioId) -> Option<&Folio> {
        self.folios.get(&id).filter(|f| f.tenant_id == tenant_id)
    }

    /// Rejects a second open folio of one type for a booking
    fn check_open_unique(&self, folio: &Folio) -> Result<(), PortError> {
        let clash = folio.is_open()
            && self.folios.values().any(|other| {
                other.id != folio.id
                    && other.tenant_id == folio.tenant_id
                    && other.booking_id == folio.booking_id
                    && other.folio_type == folio.folio_type
                    && other.is_open()
            });
        if clash {
            return Err(PortError::already_exists(
                "OpenFolio",
                format!("{}/{}", folio.booking_id, folio.folio_type),
            ));
        }
        Ok(())
    }

    fn apply(&mut self, write: LedgerWrite) -> Result<(), PortError> {
        match write {
            LedgerWrite::InsertFolio(folio) => {
                if self.folios.contains_key(&folio.id) {
                    return Err(PortError::already_exists("Folio", folio.id));
                }
                if self
                    .folios
                    .values()
                    .any(|f| f.tenant_id == folio.tenant_id && f.folio_number == folio.folio_number)
                {
                    return Err(PortError::already_exists("FolioNumber", &folio.folio_number));
                }
                self.check_open_unique(&folio)?;
                self.folios.insert(folio.id, Folio { version: 0, ..folio });
            }
            LedgerWrite::UpdateFolio(folio) => {
                let version = self
                    .folios
                    .get(&folio.id)
                    .map(|f| f.version)
                    .ok_or_else(|| PortError::not_found("Folio", folio.id))?;
                self.check_open_unique(&folio)?;
                // bumped with the other touched folios
                self.folios.insert(folio.id, Folio { version, ..folio });
            }
            LedgerWrite::InsertCharge(charge) => {
                if self.charges.contains_key(&charge.id) {
                    return Err(PortError::already_exists("Charge", charge.id));
                }
                self.charges.insert(charge.id, Charge { version: 0, ..charge });
            }
            LedgerWrite::UpdateCharge(charge) => {
                let version = self
                    .charges
                    .get(&charge.id)
                    .map(|c| c.version)
                    .ok_or_else(|| PortError::not_found("Charge", charge.id))?;
                if !self.folios.contains_key(&charge.folio_id) {
                    return Err(PortError::not_found("Folio", charge.folio_id));
                }
                self.charges.insert(charge.id, Charge { version: version + 1, ..charge });
            }
            LedgerWrite::InsertPayment(payment) => {
                if !self.folios.contains_key(&payment.folio_id) {
                    return Err(PortError::not_found("Folio", payment.folio_id));
                }
                self.payments.push(payment);
            }
            LedgerWrite::InsertTransfer(transfer) => self.transfers.push(transfer),
            LedgerWrite::InsertInvoice(invoice) => {
                if self.invoices.contains_key(&invoice.id) {
                    return Err(PortError::already_exists("Invoice", invoice.id));
                }
                self.invoices.insert(invoice.id, invoice);
            }
            LedgerWrite::UpdateInvoice(invoice) => {
                if !self.invoices.contains_key(&invoice.id) {
                    return Err(PortError::not_found("Invoice", invoice.id));
                }
                self.invoices.insert(invoice.id, invoice);
            }
            LedgerWrite::AppendAudit(entry) => self.audit.push(entry),
        }
        Ok(())
    }
}

/// In-memory [`LedgerStore`]
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
    fail_next_commit: AtomicBool,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next commit fail after its writes have been staged
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Number of audit entries across all tenants
    pub async fn audit_len(&self) -> usize {
        self.state.read().await.audit.len()
    }

    /// Transfer records of a tenant, oldest first
    pub async fn transfers(&self, tenant_id: TenantId) -> Vec<TransferRecord> {
        self.state
            .read()
            .await
            .transfers
            .iter()
            .filter(|t| t.tenant_id == tenant_id)
            .cloned()
            .collect()
    }
}

impl DomainPort for InMemoryLedgerStore {}

#[async_trait]
impl HealthCheckable for InMemoryLedgerStore {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::healthy("in-memory-ledger", 0).with_message("In-memory store always healthy")
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn next_sequence(
        &self,
        tenant_id: TenantId,
        kind: SequenceKind,
        year: i32,
    ) -> Result<u32, PortError> {
        let mut state = self.state.write().await;
        let next = state.sequences.entry((tenant_id, kind, year)).or_insert(0);
        *next += 1;
        Ok(*next)
    }

    async fn get_folio(&self, tenant_id: TenantId, id: FolioId) -> Result<Option<Folio>, PortError> {
        Ok(self.state.read().await.folio(tenant_id, id).cloned())
    }

    async fn folios_for_booking(
        &self,
        tenant_id: TenantId,
        booking_id: BookingId,
    ) -> Result<Vec<Folio>, PortError> {
        let state = self.state.read().await;
        let mut folios: Vec<Folio> = state
            .folios
            .values()
            .filter(|f| f.tenant_id == tenant_id && f.booking_id == booking_id)
            .cloned()
            .collect();
        folios.sort_by_key(|f| (f.created_at, *f.id.as_uuid()));
        Ok(folios)
    }

    async fn get_charge(&self, tenant_id: TenantId, id: ChargeId) -> Result<Option<Charge>, PortError> {
        Ok(self
            .state
            .read()
            .await
            .charges
            .get(&id)
            .filter(|c| c.tenant_id == tenant_id)
            .cloned())
    }

    async fn charges_for_folio(
        &self,
        tenant_id: TenantId,
        folio_id: FolioId,
    ) -> Result<Vec<Charge>, PortError> {
        let state = self.state.read().await;
        let mut charges: Vec<Charge> = state
            .charges
            .values()
            .filter(|c| c.tenant_id == tenant_id && c.folio_id == folio_id)
            .cloned()
            .collect();
        charges.sort_by_key(|c| (c.posted_at, *c.id.as_uuid()));
        Ok(charges)
    }

    async fn payments_for_folio(
        &self,
        tenant_id: TenantId,
        folio_id: FolioId,
    ) -> Result<Vec<Payment>, PortError> {
        Ok(self
            .state
            .read()
            .await
            .payments
            .iter()
            .filter(|p| p.tenant_id == tenant_id && p.folio_id == folio_id)
            .cloned()
            .collect())
    }

    async fn get_invoice(&self, tenant_id: TenantId, id: InvoiceId) -> Result<Option<Invoice>, PortError> {
        Ok(self
            .state
            .read()
            .await
            .invoices
            .get(&id)
            .filter(|i| i.tenant_id == tenant_id)
            .cloned())
    }

    async fn audit_entries(
        &self,
        tenant_id: TenantId,
        query: &AuditQuery,
    ) -> Result<Vec<AuditEntry>, PortError> {
        let state = self.state.read().await;
        let matching = state
            .audit
            .iter()
            .filter(|e| e.tenant_id == tenant_id && query.matches(e))
            .cloned();
        Ok(match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), PortError> {
        changes.check_tenant()?;

        let mut state = self.state.write().await;
        for precondition in &changes.preconditions {
            state.check(changes.tenant_id, precondition)?;
        }

        let touched = changes.touched_folios(|id| state.charges.get(&id).map(|c| c.folio_id));
        let mut staged = state.clone();
        for write in changes.writes {
            staged.apply(write)?;
        }
        for folio_id in &touched {
            if let Some(folio) = staged.folios.get_mut(folio_id) {
                folio.version += 1;
            }
        }

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(PortError::internal("injected commit failure"));
        }

        *state = staged;
        Ok(())
    }
}

/// In-memory booking collaborator
#[derive(Debug, Default)]
pub struct MockBookingPort {
    bookings: Arc<RwLock<HashMap<(TenantId, BookingId), bool>>>,
    fail_checkout: AtomicBool,
    accept_unknown: bool,
}

impl MockBookingPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// A booking port that treats every booking id as an existing booking
    pub fn accepting_unknown() -> Self {
        Self {
            accept_unknown: true,
            ..Self::default()
        }
    }

    /// Registers a booking that is not yet checked out
    pub async fn register(&self, tenant_id: TenantId, booking_id: BookingId) {
        self.bookings.write().await.insert((tenant_id, booking_id), false);
    }

    pub async fn is_checked_out(&self, tenant_id: TenantId, booking_id: BookingId) -> bool {
        self.bookings
            .read()
            .await
            .get(&(tenant_id, booking_id))
            .copied()
            .unwrap_or(false)
    }

    /// Makes every `mark_checked_out` call fail
    pub fn fail_checkout(&self) {
        self.fail_checkout.store(true, Ordering::SeqCst);
    }
}

impl DomainPort for MockBookingPort {}

#[async_trait]
impl BookingPort for MockBookingPort {
    async fn booking_exists(&self, tenant_id: TenantId, booking_id: BookingId) -> Result<bool, PortError> {
        Ok(self.accept_unknown || self.bookings.read().await.contains_key(&(tenant_id, booking_id)))
    }

    async fn mark_checked_out(&self, tenant_id: TenantId, booking_id: BookingId) -> Result<(), PortError> {
        if self.fail_checkout.load(Ordering::SeqCst) {
            return Err(PortError::unavailable("booking"));
        }
        let mut bookings = self.bookings.write().await;
        if self.accept_unknown {
            bookings.insert((tenant_id, booking_id), true);
            return Ok(());
        }
        bookings
            .get_mut(&(tenant_id, booking_id))
            .map(|checked_out| *checked_out = true)
            .ok_or_else(|| PortError::not_found("Booking", booking_id))
    }
}

/// In-memory housekeeping collaborator recording dirty rooms
#[derive(Debug, Default)]
pub struct MockHousekeepingPort {
    dirty: Arc<RwLock<HashSet<(TenantId, BookingId)>>>,
}

impl MockHousekeepingPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_dirty(&self, tenant_id: TenantId, booking_id: BookingId) -> bool {
        self.dirty.read().await.contains(&(tenant_id, booking_id))
    }
}

impl DomainPort for MockHousekeepingPort {}

#[async_trait]
impl HousekeepingPort for MockHousekeepingPort {
    async fn mark_room_dirty(&self, tenant_id: TenantId, booking_id: BookingId) -> Result<(), PortError> {
        self.dirty.write().await.insert((tenant_id, booking_id));
        Ok(())
    }
}
