//! Folio application service
//!
//! `FolioService` is the single entry point of the ledger. It owns no state:
//! every call reads what it needs from the injected [`LedgerStore`], decides,
//! and hands one [`ChangeSet`] back to the store. Operations are split across
//! modules by component (`manager`, `ledger`, `transfer`, `settlement`,
//! `invoice`, `audit`), each adding an `impl FolioService` block.

use std::future::Future;
use std::sync::Arc;

use chrono::{Datelike, Utc};
use tracing::{debug, warn};

use core_kernel::{FolioId, Money};

use crate::balance::{BalanceBreakdown, BalanceCalculator};
use crate::charge::Charge;
use crate::config::LedgerConfig;
use crate::context::RequestContext;
use crate::error::FolioError;
use crate::folio::Folio;
use crate::payment::Payment;
use crate::ports::{BookingPort, ChangeSet, HousekeepingPort, LedgerStore, SequenceKind};

/// The ledger rows of one folio, read together
#[derive(Debug, Clone)]
pub(crate) struct FolioLedger {
    pub charges: Vec<Charge>,
    pub payments: Vec<Payment>,
}

impl FolioLedger {
    pub fn breakdown(&self, folio: &Folio) -> Result<BalanceBreakdown, FolioError> {
        BalanceCalculator::breakdown(folio, &self.charges, &self.payments)
    }
}

/// Folio ledger application service
pub struct FolioService {
    store: Arc<dyn LedgerStore>,
    bookings: Arc<dyn BookingPort>,
    housekeeping: Arc<dyn HousekeepingPort>,
    config: LedgerConfig,
}

impl FolioService {
    /// Creates a new service
    ///
    /// # Arguments
    ///
    /// * `store` - Ledger persistence
    /// * `bookings` - Booking collaborator
    /// * `housekeeping` - Housekeeping collaborator
    /// * `config` - Ledger tunables
    pub fn new(
        store: Arc<dyn LedgerStore>,
        bookings: Arc<dyn BookingPort>,
        housekeeping: Arc<dyn HousekeepingPort>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            store,
            bookings,
            housekeeping,
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// The underlying ledger store
    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    pub(crate) fn bookings(&self) -> &dyn BookingPort {
        self.bookings.as_ref()
    }

    pub(crate) fn housekeeping(&self) -> &dyn HousekeepingPort {
        self.housekeeping.as_ref()
    }

    /// Loads a folio of the caller's tenant
    pub(crate) async fn load_folio(
        &self,
        ctx: &RequestContext,
        folio_id: FolioId,
    ) -> Result<Folio, FolioError> {
        self.store
            .get_folio(ctx.tenant_id, folio_id)
            .await?
            .ok_or_else(|| FolioError::not_found("Folio", folio_id))
    }

    /// Reads a folio's charges and payments
    pub(crate) async fn load_ledger(
        &self,
        ctx: &RequestContext,
        folio: &Folio,
    ) -> Result<FolioLedger, FolioError> {
        let charges = self.store.charges_for_folio(ctx.tenant_id, folio.id).await?;
        let payments = self.store.payments_for_folio(ctx.tenant_id, folio.id).await?;
        debug!(
            folio_id = %folio.id,
            charges = charges.len(),
            payments = payments.len(),
            "Loaded folio ledger"
        );
        Ok(FolioLedger { charges, payments })
    }

    /// Recomputes a folio's balance from the ledgers
    pub(crate) async fn current_balance(
        &self,
        ctx: &RequestContext,
        folio: &Folio,
    ) -> Result<Money, FolioError> {
        Ok(self.load_ledger(ctx, folio).await?.breakdown(folio)?.balance)
    }

    /// Allocates the next number of `kind` for the current year
    pub(crate) async fn next_number(
        &self,
        ctx: &RequestContext,
        kind: SequenceKind,
    ) -> Result<(i32, u32), FolioError> {
        let year = Utc::now().year();
        let sequence = self.store.next_sequence(ctx.tenant_id, kind, year).await?;
        Ok((year, sequence))
    }

    pub(crate) async fn commit(&self, changes: ChangeSet) -> Result<(), FolioError> {
        Ok(self.store.commit(changes).await?)
    }

    /// Runs `attempt`, re-running it after an optimistic-lock conflict
    ///
    /// Each attempt must re-read and re-validate everything it decides on.
    /// After `max_conflict_retries` retries the conflict surfaces as
    /// `FolioError::Concurrency`.
    pub(crate) async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt: F,
    ) -> Result<T, FolioError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FolioError>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(err) if err.is_store_conflict() => {
                    if retries >= self.config.max_conflict_retries {
                        warn!(operation, retries, error = %err, "Conflict persisted, giving up");
                        return Err(FolioError::Concurrency(format!(
                            "{} conflicted with a concurrent update",
                            operation
                        )));
                    }
                    retries += 1;
                    warn!(operation, retry = retries, error = %err, "Optimistic lock conflict, retrying");
                }
                result => return result,
            }
        }
    }
}
