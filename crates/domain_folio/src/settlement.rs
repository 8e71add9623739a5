//! Checkout settlement guard
//!
//! Checkout closes every open folio of a booking in one commit, but only once
//! each freshly recomputed balance is within the settlement tolerance (or the
//! actor forces it with the override permission). The booking and
//! housekeeping collaborators are signalled after the commit.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use core_kernel::{BookingId, FolioId, Money};

use crate::audit::{AuditAction, AuditEntry, EntityType};
use crate::context::{Permission, RequestContext};
use crate::error::{FolioError, OutstandingFolio};
use crate::folio::{Folio, FolioType};
use crate::ports::{ChangeSet, LedgerWrite, Precondition};
use crate::requests::SettleAndClose;
use crate::service::FolioService;

/// Balance of one folio at settlement time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolioBalance {
    pub folio_id: FolioId,
    pub folio_number: String,
    pub folio_type: FolioType,
    pub balance: Money,
}

/// Result of a successful settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub booking_id: BookingId,
    /// Folios closed by this settlement
    pub folios_closed: Vec<FolioId>,
    /// Balance of each closed folio at close time
    pub balances: Vec<FolioBalance>,
    /// Sum of the closed folios' balances
    pub total_balance: Money,
    /// True if at least one folio closed outside tolerance
    pub forced: bool,
    /// Collaborator signals that failed after the commit
    pub notification_failures: Vec<String>,
}

impl FolioService {
    /// Settles a booking at checkout and closes all of its open folios
    ///
    /// # Errors
    ///
    /// * `BookingNotFound` - the booking collaborator does not know the booking
    /// * `OutstandingBalance` - one or more folios outside tolerance, not forced;
    ///   lists every offending folio and closes nothing
    /// * `Permission` - forced settlement without the override permission
    /// * `Concurrency` - a folio kept changing underneath the settlement
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id, booking_id = %request.booking_id))]
    pub async fn settle_and_close(
        &self,
        ctx: &RequestContext,
        request: &SettleAndClose,
    ) -> Result<SettlementOutcome, FolioError> {
        if !self.bookings().booking_exists(ctx.tenant_id, request.booking_id).await? {
            return Err(FolioError::BookingNotFound(request.booking_id));
        }

        let mut outcome = self
            .with_retry("settle_and_close", move || self.try_settle(ctx, request))
            .await?;

        if let Err(err) = self.bookings().mark_checked_out(ctx.tenant_id, request.booking_id).await {
            warn!(booking_id = %request.booking_id, error = %err, "Failed to mark booking checked out");
            outcome.notification_failures.push(format!("booking: {}", err));
        }
        if let Err(err) = self.housekeeping().mark_room_dirty(ctx.tenant_id, request.booking_id).await {
            warn!(booking_id = %request.booking_id, error = %err, "Failed to flag room for housekeeping");
            outcome.notification_failures.push(format!("housekeeping: {}", err));
        }

        Ok(outcome)
    }

    async fn try_settle(
        &self,
        ctx: &RequestContext,
        request: &SettleAndClose,
    ) -> Result<SettlementOutcome, FolioError> {
        let tolerance = self.config().settlement_tolerance;
        let folios = self.store().folios_for_booking(ctx.tenant_id, request.booking_id).await?;

        let mut open: Vec<(Folio, Money)> = Vec::new();
        for folio in folios.into_iter().filter(Folio::is_open) {
            let balance = self.current_balance(ctx, &folio).await?;
            open.push((folio, balance));
        }

        let outstanding: Vec<OutstandingFolio> = open
            .iter()
            .filter(|(_, balance)| !balance.is_within(tolerance))
            .map(|(folio, balance)| OutstandingFolio {
                folio_id: folio.id,
                folio_number: folio.folio_number.clone(),
                folio_type: folio.folio_type,
                balance: *balance,
            })
            .collect();

        let forced = !outstanding.is_empty();
        if forced {
            if !request.force {
                return Err(FolioError::OutstandingBalance { folios: outstanding });
            }
            ctx.actor.require(Permission::Override, "forced settlement")?;
        }

        let currency = open.first().map_or(self.config().currency, |(f, _)| f.currency);
        let total_balance = Money::checked_sum(currency, open.iter().map(|(_, balance)| balance))?;

        let mut changes = ChangeSet::new(ctx.tenant_id).require(Precondition::OpenFolioCount {
            booking_id: request.booking_id,
            count: open.len(),
        });
        let mut balances = Vec::with_capacity(open.len());
        for (before, balance) in &open {
            let outside = !balance.is_within(tolerance);
            let (action, reason) = if outside {
                let reason = request
                    .reason
                    .clone()
                    .unwrap_or_else(|| format!("forced settlement with outstanding balance {}", balance));
                (AuditAction::FolioForceClosed, Some(reason))
            } else {
                (AuditAction::FolioClosed, None)
            };

            let mut folio = before.clone();
            folio.close(ctx.actor_id(), reason.clone())?;

            changes = changes
                .require(Precondition::FolioVersion { folio_id: before.id, version: before.version })
                .write(LedgerWrite::UpdateFolio(folio.clone()))
                .audit(
                    AuditEntry::new(ctx, action, EntityType::Folio, folio.id)
                        .before(before)?
                        .after(&folio)?
                        .with_reason(reason),
                );
            balances.push(FolioBalance {
                folio_id: folio.id,
                folio_number: folio.folio_number.clone(),
                folio_type: folio.folio_type,
                balance: *balance,
            });
        }

        self.commit(changes).await?;

        info!(
            booking_id = %request.booking_id,
            folios_closed = balances.len(),
            total_balance = %total_balance,
            forced,
            actor = %ctx.actor.id,
            "Booking settled"
        );

        Ok(SettlementOutcome {
            booking_id: request.booking_id,
            folios_closed: balances.iter().map(|b| b.folio_id).collect(),
            balances,
            total_balance,
            forced,
            notification_failures: Vec::new(),
        })
    }
}
