//! PostgreSQL Ledger Adapter
//!
//! This module provides the database adapter for the folio ledger,
//! implementing the `LedgerStore` port on top of the `FolioRepository`.
//!
//! # Commit protocol
//!
//! A change set is applied inside one transaction:
//!
//! 1. take the advisory lock of every booking whose open folios it counts
//!    or may add to, in id order;
//! 2. lock every charge the change set guards or updates, in id order;
//! 3. lock every folio it guards or touches, in id order;
//! 4. lock every invoice it guards, in id order;
//! 5. check the preconditions against the locked rows;
//! 6. apply the writes in order;
//! 7. bump the version of every touched folio.
//!
//! Locks are always taken in that order so two commits never wait on each
//! other in opposite orders. Any failure drops the transaction, which rolls
//! everything back.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresLedgerStore;
//! use domain_folio::{FolioService, LedgerStore};
//! use std::sync::Arc;
//!
//! let store: Arc<dyn LedgerStore> = Arc::new(PostgresLedgerStore::new(pool));
//! let service = FolioService::new(store, bookings, housekeeping, config);
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use core_kernel::{
    BookingId, ChargeId, DomainPort, FolioId, HealthCheckResult, HealthCheckable,
    InvoiceId, PortError, TenantId,
};
use domain_folio::{
    AuditEntry, AuditQuery, ChangeSet, Charge, Folio, FolioStatus, Invoice, LedgerStore,
    LedgerWrite, Payment, Precondition, SequenceKind, TransferRecord,
};

use crate::error::DatabaseError;
use crate::repositories::folio::{self as rows, FolioRepository, LockedCharge, LockedFolio, LockedInvoice};

const ADAPTER_ID: &str = "postgres-ledger-store";

/// PostgreSQL-backed implementation of the `LedgerStore` port
///
/// # Error Handling
///
/// Database errors are translated to `PortError` variants:
/// - a failed precondition -> `PortError::Conflict`
/// - a second open folio of one type -> `PortError::AlreadyExists`
/// - a serialization failure or deadlock -> `PortError::Conflict`
/// - other errors -> see `From<DatabaseError> for PortError`
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    repository: FolioRepository,
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Creates a new PostgreSQL ledger store
    ///
    /// # Arguments
    ///
    /// * `pool` - The PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: FolioRepository::new(pool.clone()),
            pool,
        }
    }

    /// Returns a reference to the underlying repository
    ///
    /// This is useful for reads that aren't exposed through the port trait,
    /// such as the transfer history of a folio.
    pub fn repository(&self) -> &FolioRepository {
        &self.repository
    }

    /// Transfers into or out of a folio, oldest first
    pub async fn transfers_for_folio(
        &self,
        tenant_id: TenantId,
        folio_id: FolioId,
    ) -> Result<Vec<TransferRecord>, PortError> {
        Ok(self.repository.transfers_for_folio(tenant_id, folio_id).await?)
    }

    async fn apply(&self, changes: &ChangeSet) -> Result<(), StoreFailure> {
        let tenant_id = changes.tenant_id;
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        let mut locked = LockedRows::default();

        for booking_id in changes.guarded_bookings() {
            rows::lock_booking(&mut *tx, tenant_id, booking_id).await?;
        }
        for booking_id in counted_bookings(changes) {
            let open = rows::count_open_folios(&mut *tx, tenant_id, booking_id).await?;
            locked.open_folios.insert(*booking_id.as_uuid(), open);
        }

        let charge_ids = sorted(charges_to_lock(changes));
        locked.charges = rows::lock_charges(&mut *tx, tenant_id, &charge_ids)
            .await?
            .into_iter()
            .map(|c| (c.charge_id, c))
            .collect();

        let mut folio_ids = folios_to_lock(changes);
        folio_ids.extend(locked.charges.values().map(|c| c.folio_id));
        let folio_ids = sorted(folio_ids);
        locked.folios = rows::lock_folios(&mut *tx, tenant_id, &folio_ids)
            .await?
            .into_iter()
            .map(|f| (f.folio_id, f))
            .collect();

        let invoice_ids = sorted(invoices_to_lock(changes));
        locked.invoices = rows::lock_invoices(&mut *tx, tenant_id, &invoice_ids)
            .await?
            .into_iter()
            .map(|i| (i.invoice_id, i))
            .collect();

        for precondition in &changes.preconditions {
            check(precondition, &locked)?;
        }

        let charges = &locked.charges;
        let touched: Vec<Uuid> = changes
            .touched_folios(|id| charges.get(id.as_uuid()).map(|c| FolioId::from(c.folio_id)))
            .into_iter()
            .map(Uuid::from)
            .collect();

        for write in &changes.writes {
            apply_write(&mut *tx, write).await?;
        }
        rows::bump_folio_versions(&mut *tx, tenant_id, &touched).await?;

        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(())
    }
}

/// Rows locked by a commit, plus the open-folio count of each guarded booking
#[derive(Debug, Default)]
struct LockedRows {
    folios: HashMap<Uuid, LockedFolio>,
    charges: HashMap<Uuid, LockedCharge>,
    invoices: HashMap<Uuid, LockedInvoice>,
    open_folios: HashMap<Uuid, i64>,
}

/// Why a commit failed: a precondition or a database error
enum StoreFailure {
    Precondition(PortError),
    Database(DatabaseError),
}

impl From<DatabaseError> for StoreFailure {
    fn from(error: DatabaseError) -> Self {
        StoreFailure::Database(error)
    }
}

impl From<StoreFailure> for PortError {
    fn from(failure: StoreFailure) -> Self {
        match failure {
            StoreFailure::Precondition(error) => error,
            StoreFailure::Database(error) => error.into(),
        }
    }
}

fn sorted(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    ids.sort();
    ids.dedup();
    ids
}

fn charges_to_lock(changes: &ChangeSet) -> Vec<Uuid> {
    let guarded = changes.preconditions.iter().filter_map(|p| match p {
        Precondition::ChargeVersion { charge_id, .. } => Some(*charge_id.as_uuid()),
        _ => None,
    });
    let updated = changes.writes.iter().filter_map(|w| match w {
        LedgerWrite::UpdateCharge(c) => Some(*c.id.as_uuid()),
        _ => None,
    });
    guarded.chain(updated).collect()
}

fn folios_to_lock(changes: &ChangeSet) -> Vec<Uuid> {
    let guarded = changes.preconditions.iter().filter_map(|p| match p {
        Precondition::FolioOpen(id) => Some(*id.as_uuid()),
        Precondition::FolioVersion { folio_id, .. } => Some(*folio_id.as_uuid()),
        _ => None,
    });
    let touched = changes.writes.iter().filter_map(|w| match w {
        LedgerWrite::UpdateFolio(f) => Some(*f.id.as_uuid()),
        LedgerWrite::InsertCharge(c) | LedgerWrite::UpdateCharge(c) => Some(*c.folio_id.as_uuid()),
        LedgerWrite::InsertPayment(p) => Some(*p.folio_id.as_uuid()),
        _ => None,
    });
    guarded.chain(touched).collect()
}

fn invoices_to_lock(changes: &ChangeSet) -> Vec<Uuid> {
    changes
        .preconditions
        .iter()
        .filter_map(|p| match p {
            Precondition::InvoiceState { invoice_id, .. } => Some(*invoice_id.as_uuid()),
            _ => None,
        })
        .collect()
}

fn counted_bookings(changes: &ChangeSet) -> Vec<BookingId> {
    changes
        .preconditions
        .iter()
        .filter_map(|p| match p {
            Precondition::OpenFolioCount { booking_id, .. } => Some(*booking_id),
            _ => None,
        })
        .collect()
}

fn check(precondition: &Precondition, locked: &LockedRows) -> Result<(), StoreFailure> {
    let LockedRows { folios, charges, invoices, open_folios } = locked;
    let result = match *precondition {
        Precondition::FolioOpen(folio_id) => match folios.get(folio_id.as_uuid()) {
            Some(f) if f.status == FolioStatus::Open.as_str() => Ok(()),
            Some(_) => Err(PortError::conflict(format!("folio {} is no longer open", folio_id))),
            None => Err(PortError::not_found("Folio", folio_id)),
        },
        Precondition::FolioVersion { folio_id, version } => match folios.get(folio_id.as_uuid()) {
            Some(f) if matches_version(f.version, version) => Ok(()),
            Some(f) => Err(PortError::conflict(format!(
                "folio {} changed (expected version {}, found {})",
                folio_id, version, f.version
            ))),
            None => Err(PortError::not_found("Folio", folio_id)),
        },
        Precondition::ChargeVersion { charge_id, version } => match charges.get(charge_id.as_uuid()) {
            Some(c) if matches_version(c.version, version) => Ok(()),
            Some(c) => Err(PortError::conflict(format!(
                "charge {} changed (expected version {}, found {})",
                charge_id, version, c.version
            ))),
            None => Err(PortError::not_found("Charge", charge_id)),
        },
        Precondition::OpenFolioCount { booking_id, count } => {
            let open = open_folios.get(booking_id.as_uuid()).copied().unwrap_or_default();
            if usize::try_from(open).map_or(false, |open| open == count) {
                Ok(())
            } else {
                Err(PortError::conflict(format!(
                    "booking {} has {} open folio(s), expected {}",
                    booking_id, open, count
                )))
            }
        }
        Precondition::InvoiceState { invoice_id, status } => match invoices.get(invoice_id.as_uuid()) {
            Some(i) if i.status == status.as_str() => Ok(()),
            Some(i) => Err(PortError::conflict(format!(
                "invoice {} is {}, expected {}",
                invoice_id, i.status, status
            ))),
            None => Err(PortError::not_found("Invoice", invoice_id)),
        },
    };
    result.map_err(StoreFailure::Precondition)
}

fn matches_version(stored: i64, expected: u64) -> bool {
    u64::try_from(stored).map_or(false, |stored| stored == expected)
}

async fn apply_write(conn: &mut PgConnection, write: &LedgerWrite) -> Result<(), DatabaseError> {
    match write {
        LedgerWrite::InsertFolio(folio) => rows::insert_folio(conn, folio).await,
        LedgerWrite::UpdateFolio(folio) => rows::update_folio(conn, folio).await,
        LedgerWrite::InsertCharge(charge) => rows::insert_charge(conn, charge).await,
        LedgerWrite::UpdateCharge(charge) => rows::update_charge(conn, charge).await,
        LedgerWrite::InsertPayment(payment) => rows::insert_payment(conn, payment).await,
        LedgerWrite::InsertTransfer(transfer) => rows::insert_transfer(conn, transfer).await,
        LedgerWrite::InsertInvoice(invoice) => rows::insert_invoice(conn, invoice).await,
        LedgerWrite::UpdateInvoice(invoice) => rows::update_invoice(conn, invoice).await,
        LedgerWrite::AppendAudit(entry) => rows::insert_audit(conn, entry).await,
    }
}

impl DomainPort for PostgresLedgerStore {}

#[async_trait]
impl HealthCheckable for PostgresLedgerStore {
    /// Checks database connectivity
    ///
    /// Performs a simple SELECT 1 query to verify the connection pool
    /// is operational and the database is responsive.
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult::healthy(ADAPTER_ID, latency_ms),
            Err(e) => HealthCheckResult::unhealthy(ADAPTER_ID, latency_ms, format!("Database error: {}", e)),
        }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, kind = kind.as_str()))]
    async fn next_sequence(
        &self,
        tenant_id: TenantId,
        kind: SequenceKind,
        year: i32,
    ) -> Result<u32, PortError> {
        Ok(self.repository.next_sequence(tenant_id, kind, year).await?)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, folio_id = %id))]
    async fn get_folio(&self, tenant_id: TenantId, id: FolioId) -> Result<Option<Folio>, PortError> {
        debug!("Loading folio");
        Ok(self.repository.find_folio(tenant_id, id).await?)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, booking_id = %booking_id))]
    async fn folios_for_booking(
        &self,
        tenant_id: TenantId,
        booking_id: BookingId,
    ) -> Result<Vec<Folio>, PortError> {
        Ok(self.repository.folios_for_booking(tenant_id, booking_id).await?)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, charge_id = %id))]
    async fn get_charge(&self, tenant_id: TenantId, id: ChargeId) -> Result<Option<Charge>, PortError> {
        Ok(self.repository.find_charge(tenant_id, id).await?)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, folio_id = %folio_id))]
    async fn charges_for_folio(
        &self,
        tenant_id: TenantId,
        folio_id: FolioId,
    ) -> Result<Vec<Charge>, PortError> {
        Ok(self.repository.charges_for_folio(tenant_id, folio_id).await?)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, folio_id = %folio_id))]
    async fn payments_for_folio(
        &self,
        tenant_id: TenantId,
        folio_id: FolioId,
    ) -> Result<Vec<Payment>, PortError> {
        Ok(self.repository.payments_for_folio(tenant_id, folio_id).await?)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %id))]
    async fn get_invoice(&self, tenant_id: TenantId, id: InvoiceId) -> Result<Option<Invoice>, PortError> {
        Ok(self.repository.find_invoice(tenant_id, id).await?)
    }

    #[instrument(skip(self, query), fields(tenant_id = %tenant_id))]
    async fn audit_entries(
        &self,
        tenant_id: TenantId,
        query: &AuditQuery,
    ) -> Result<Vec<AuditEntry>, PortError> {
        Ok(self.repository.audit_entries(tenant_id, query).await?)
    }

    #[instrument(
        skip(self, changes),
        fields(
            tenant_id = %changes.tenant_id,
            preconditions = changes.preconditions.len(),
            writes = changes.writes.len()
        )
    )]
    async fn commit(&self, changes: ChangeSet) -> Result<(), PortError> {
        changes.check_tenant()?;

        match self.apply(&changes).await {
            Ok(()) => {
                debug!("Change set committed");
                Ok(())
            }
            Err(failure) => {
                let error = PortError::from(failure);
                if error.is_conflict() {
                    warn!(error = %error, "Change set rejected");
                }
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{Currency, PartyId, Rate};
    use domain_folio::{format_folio_number, ChargeCategory, FolioType, InvoiceStatus};
    use rust_decimal_macros::dec;

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
    fn test_lock_sets_cover_guards_and_touched_rows() {
        let tenant_id = TenantId::new();
        let source = folio(tenant_id);
        let target = folio(tenant_id);
        let mut charge = Charge::post(
            &source,
            ChargeCategory::Room,
            "Room 101",
            dec!(1),
            dec!(150),
            Rate::new(dec!(0.18)),
            "fd",
        )
        .unwrap();
        charge.folio_id = target.id;

        let changes = ChangeSet::new(tenant_id)
            .require(Precondition::FolioOpen(source.id))
            .require(Precondition::ChargeVersion {
                charge_id: charge.id,
                version: 0,
            })
            .write(LedgerWrite::UpdateCharge(charge.clone()));

        assert_eq!(charges_to_lock(&changes), vec![*charge.id.as_uuid()]);
        let folios = sorted(folios_to_lock(&changes));
        assert!(folios.contains(source.id.as_uuid()));
        assert!(folios.contains(target.id.as_uuid()));
    }

    #[test]
    fn test_sorted_deduplicates() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ids = sorted(vec![b, a, b]);
        assert_eq!(ids.len(), 2);
        assert!(ids[0] < ids[1]);
    }

    #[test]
    fn test_closed_folio_fails_open_precondition_with_conflict() {
        let id = FolioId::new();
        let mut locked = LockedRows::default();
        locked.folios.insert(
            *id.as_uuid(),
            LockedFolio {
                folio_id: *id.as_uuid(),
                status: "closed".to_string(),
                version: 3,
            },
        );

        let error: PortError = check(&Precondition::FolioOpen(id), &locked)
            .err()
            .map(PortError::from)
            .unwrap();
        assert!(error.is_conflict());
    }

    #[test]
    fn test_stale_charge_version_is_conflict() {
        let id = ChargeId::new();
        let mut locked = LockedRows::default();
        locked.charges.insert(
            *id.as_uuid(),
            LockedCharge {
                charge_id: *id.as_uuid(),
                folio_id: Uuid::new_v4(),
                version: 2,
            },
        );

        let stale = Precondition::ChargeVersion { charge_id: id, version: 1 };
        let current = Precondition::ChargeVersion { charge_id: id, version: 2 };
        assert!(check(&stale, &locked).is_err());
        assert!(check(&current, &locked).is_ok());
    }

    #[test]
    fn test_paid_invoice_fails_stale_status_guard() {
        let id = InvoiceId::new();
        let mut locked = LockedRows::default();
        locked.invoices.insert(
            *id.as_uuid(),
            LockedInvoice {
                invoice_id: *id.as_uuid(),
                status: InvoiceStatus::Paid.as_str().to_string(),
            },
        );

        let stale = Precondition::InvoiceState { invoice_id: id, status: InvoiceStatus::Draft };
        let current = Precondition::InvoiceState { invoice_id: id, status: InvoiceStatus::Paid };
        let error = check(&stale, &locked).err().map(PortError::from).unwrap();
        assert!(error.is_conflict());
        assert!(check(&current, &locked).is_ok());
        assert_eq!(invoices_to_lock(&ChangeSet::new(TenantId::new()).require(stale)), vec![*id.as_uuid()]);
    }

    #[test]
    fn test_new_open_folio_fails_settlement_count() {
        let booking_id = BookingId::new();
        let mut locked = LockedRows::default();
        locked.open_folios.insert(*booking_id.as_uuid(), 2);

        let settled_one = Precondition::OpenFolioCount { booking_id, count: 1 };
        let error = check(&settled_one, &locked).err().map(PortError::from).unwrap();
        assert!(error.is_conflict());
        assert!(check(&Precondition::OpenFolioCount { booking_id, count: 2 }, &locked).is_ok());

        let changes = ChangeSet::new(TenantId::new()).require(settled_one);
        assert_eq!(counted_bookings(&changes), vec![booking_id]);
        assert_eq!(changes.guarded_bookings(), vec![booking_id]);
    }

    #[test]
    fn test_missing_folio_is_not_found() {
        let error = check(
            &Precondition::FolioVersion {
                folio_id: FolioId::new(),
                version: 0,
            },
            &LockedRows::default(),
        )
        .err()
        .map(PortError::from)
        .unwrap();
        assert!(error.is_not_found());
    }
}
