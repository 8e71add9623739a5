//! Folio manager
//!
//! Creates, closes and reopens folios and serves folio statements. Enforces
//! one open folio per type per booking; the store's uniqueness constraint
//! backs this up for concurrent creates.

use tracing::{debug, info, instrument};

use core_kernel::{BookingId, FolioId, PortError};

use crate::audit::{AuditAction, AuditEntry, EntityType};
use crate::context::{Permission, RequestContext};
use crate::error::{FolioError, OutstandingFolio};
use crate::folio::{format_folio_number, Folio, FolioType};
use crate::ports::{open_folio_of_type, ChangeSet, LedgerWrite, Precondition, SequenceKind};
use crate::requests::{CloseFolio, CreateFolio, FolioStatement, ReopenFolio};
use crate::service::FolioService;

impl FolioService {
    /// Opens a new folio for a booking
    ///
    /// # Errors
    ///
    /// * `BookingNotFound` - the booking collaborator does not know the booking
    /// * `DuplicateFolio` - an open folio of the same type already exists
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id, booking_id = %request.booking_id))]
    pub async fn create_folio(
        &self,
        ctx: &RequestContext,
        request: &CreateFolio,
    ) -> Result<Folio, FolioError> {
        if !self.bookings().booking_exists(ctx.tenant_id, request.booking_id).await? {
            return Err(FolioError::BookingNotFound(request.booking_id));
        }

        let existing = self.store().folios_for_booking(ctx.tenant_id, request.booking_id).await?;
        if let Some(open) = open_folio_of_type(&existing, request.folio_type) {
            return Err(duplicate(request.booking_id, request.folio_type, Some(open.id)));
        }

        let (year, sequence) = self.next_number(ctx, SequenceKind::Folio).await?;
        let folio = Folio::open(
            ctx.tenant_id,
            request.booking_id,
            request.folio_type,
            request.owner_id,
            format_folio_number(year, sequence),
            request.currency.unwrap_or(self.config().currency),
        );

        let changes = ChangeSet::new(ctx.tenant_id)
            .write(LedgerWrite::InsertFolio(folio.clone()))
            .audit(AuditEntry::new(ctx, AuditAction::FolioCreated, EntityType::Folio, folio.id).after(&folio)?);

        match self.commit(changes).await {
            Err(FolioError::Store(PortError::AlreadyExists { .. })) => {
                Err(duplicate(request.booking_id, request.folio_type, None))
            }
            result => result,
        }?;

        info!(
            folio_id = %folio.id,
            folio_number = %folio.folio_number,
            folio_type = %folio.folio_type,
            actor = %ctx.actor.id,
            "Folio opened"
        );
        Ok(folio)
    }

    /// Closes a folio whose balance is settled
    ///
    /// A folio outside the settlement tolerance only closes when `force` is
    /// set and the actor holds [`Permission::Override`]; the forced close is
    /// audited with its reason.
    ///
    /// # Errors
    ///
    /// * `OutstandingBalance` - balance outside tolerance and not forced
    /// * `Permission` - forced close without the override permission
    /// * `InvalidTransition` - the folio is already closed
    /// * `Concurrency` - the folio kept changing underneath the close
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id, folio_id = %request.folio_id))]
    pub async fn close_folio(
        &self,
        ctx: &RequestContext,
        request: &CloseFolio,
    ) -> Result<Folio, FolioError> {
        self.with_retry("close_folio", move || self.try_close_folio(ctx, request)).await
    }

    async fn try_close_folio(
        &self,
        ctx: &RequestContext,
        request: &CloseFolio,
    ) -> Result<Folio, FolioError> {
        let before = self.load_folio(ctx, request.folio_id).await?;
        let balance = self.current_balance(ctx, &before).await?;

        let outstanding = before.is_open() && !balance.is_within(self.config().settlement_tolerance);
        if outstanding && !request.force {
            return Err(FolioError::OutstandingBalance {
                folios: vec![OutstandingFolio {
                    folio_id: before.id,
                    folio_number: before.folio_number.clone(),
                    folio_type: before.folio_type,
                    balance,
                }],
            });
        }

        let (action, reason) = if outstanding {
            ctx.actor.require(Permission::Override, "forced close")?;
            let reason = request
                .reason
                .clone()
                .unwrap_or_else(|| format!("forced close with outstanding balance {}", balance));
            (AuditAction::FolioForceClosed, Some(reason))
        } else {
            (AuditAction::FolioClosed, request.reason.clone())
        };

        let mut folio = before.clone();
        let close_reason = if outstanding { reason.clone() } else { None };
        folio.close(ctx.actor_id(), close_reason)?;

        let changes = ChangeSet::new(ctx.tenant_id)
            .require(Precondition::FolioVersion { folio_id: before.id, version: before.version })
            .write(LedgerWrite::UpdateFolio(folio.clone()))
            .audit(
                AuditEntry::new(ctx, action, EntityType::Folio, folio.id)
                    .before(&before)?
                    .after(&folio)?
                    .with_reason(reason),
            );
        self.commit(changes).await?;
        folio.version += 1;

        info!(
            folio_id = %folio.id,
            balance = %balance,
            forced = outstanding,
            actor = %ctx.actor.id,
            "Folio closed"
        );
        Ok(folio)
    }

    /// Reopens a closed folio
    ///
    /// # Errors
    ///
    /// * `Permission` - the actor lacks [`Permission::Admin`]
    /// * `Validation` - blank reason
    /// * `InvalidTransition` - the folio is already open
    /// * `DuplicateFolio` - another folio of the same type has been opened since
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id, folio_id = %request.folio_id))]
    pub async fn reopen_folio(
        &self,
        ctx: &RequestContext,
        request: &ReopenFolio,
    ) -> Result<Folio, FolioError> {
        ctx.actor.require(Permission::Admin, "reopening a folio")?;
        if request.reason.trim().is_empty() {
            return Err(FolioError::validation("a reason is required to reopen a folio"));
        }
        self.with_retry("reopen_folio", move || self.try_reopen_folio(ctx, request)).await
    }

    async fn try_reopen_folio(
        &self,
        ctx: &RequestContext,
        request: &ReopenFolio,
    ) -> Result<Folio, FolioError> {
        let before = self.load_folio(ctx, request.folio_id).await?;
        let mut folio = before.clone();
        folio.reopen()?;

        let siblings = self.store().folios_for_booking(ctx.tenant_id, folio.booking_id).await?;
        if let Some(open) = open_folio_of_type(&siblings, folio.folio_type) {
            return Err(duplicate(folio.booking_id, folio.folio_type, Some(open.id)));
        }

        let changes = ChangeSet::new(ctx.tenant_id)
            .require(Precondition::FolioVersion { folio_id: before.id, version: before.version })
            .write(LedgerWrite::UpdateFolio(folio.clone()))
            .audit(
                AuditEntry::new(ctx, AuditAction::FolioReopened, EntityType::Folio, folio.id)
                    .before(&before)?
                    .after(&folio)?
                    .with_reason(Some(request.reason.trim().to_string())),
            );

        match self.commit(changes).await {
            Err(FolioError::Store(PortError::AlreadyExists { .. })) => {
                Err(duplicate(folio.booking_id, folio.folio_type, None))
            }
            result => result,
        }?;
        folio.version += 1;

        info!(folio_id = %folio.id, actor = %ctx.actor.id, reason = %request.reason, "Folio reopened");
        Ok(folio)
    }

    /// Returns a folio with its ledgers and freshly computed balance
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn get_folio(
        &self,
        ctx: &RequestContext,
        folio_id: FolioId,
    ) -> Result<FolioStatement, FolioError> {
        let folio = self.load_folio(ctx, folio_id).await?;
        let ledger = self.load_ledger(ctx, &folio).await?;
        let breakdown = ledger.breakdown(&folio)?;
        Ok(FolioStatement {
            folio,
            charges: ledger.charges,
            payments: ledger.payments,
            balance: breakdown.balance,
            breakdown,
        })
    }

    /// Lists every folio of a booking, open and closed
    pub async fn list_folios(
        &self,
        ctx: &RequestContext,
        booking_id: BookingId,
    ) -> Result<Vec<Folio>, FolioError> {
        let folios = self.store().folios_for_booking(ctx.tenant_id, booking_id).await?;
        debug!(booking_id = %booking_id, count = folios.len(), "Listed folios");
        Ok(folios)
    }
}

fn duplicate(booking_id: BookingId, folio_type: FolioType, existing: Option<FolioId>) -> FolioError {
    FolioError::DuplicateFolio {
        booking_id,
        folio_type,
        existing,
    }
}
