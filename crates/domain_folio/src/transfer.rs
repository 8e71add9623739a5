//! Transfer engine
//!
//! Moves specific unvoided charges from one folio to another folio of the
//! same booking. A transfer is all or nothing: every requested charge is
//! checked first, and a single rejected charge aborts the whole batch.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use core_kernel::{ChargeId, FolioId, Money, TenantId, TransferId};

use crate::audit::{AuditAction, AuditEntry, EntityType};
use crate::charge::Charge;
use crate::context::RequestContext;
use crate::error::{ChargeRejection, ChargeRejectionReason, FolioError};
use crate::folio::Folio;
use crate::ports::{ChangeSet, LedgerWrite, Precondition};
use crate::requests::TransferCharges;
use crate::service::FolioService;

/// Record of one completed transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: TransferId,
    pub tenant_id: TenantId,
    pub from_folio_id: FolioId,
    pub to_folio_id: FolioId,
    pub charge_ids: Vec<ChargeId>,
    /// Sum of the moved charge totals
    pub amount: Money,
    pub reason: String,
    pub performed_by: String,
    pub performed_at: DateTime<Utc>,
}

impl TransferCharges {
    /// Checks the request shape before anything is loaded
    fn validate(&self) -> Result<(), FolioError> {
        if self.charge_ids.is_empty() {
            return Err(FolioError::validation("transfer requires at least one charge"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.charge_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(FolioError::validation(format!("charge {} listed more than once", dup)));
        }
        if self.reason.trim().is_empty() {
            return Err(FolioError::validation("transfer reason must not be blank"));
        }
        Ok(())
    }
}

/// Checks that two folios may exchange charges
fn check_folio_pair(from: &Folio, to: &Folio) -> Result<(), FolioError> {
    if from.id == to.id {
        return Err(FolioError::validation("source and target folio must differ"));
    }
    if from.booking_id != to.booking_id {
        return Err(FolioError::validation("folios belong to different bookings"));
    }
    if from.currency != to.currency {
        return Err(FolioError::validation(format!(
            "cannot transfer between {} and {} folios",
            from.currency, to.currency
        )));
    }
    from.ensure_open()?;
    to.ensure_open()
}

/// Classifies a requested charge as movable or rejected
fn check_charge(
    id: ChargeId,
    charge: Option<Charge>,
    from: &Folio,
) -> Result<Charge, ChargeRejection> {
    let reject = |reason| ChargeRejection { charge_id: id, reason };
    match charge {
        Some(c) if c.folio_id != from.id => Err(reject(ChargeRejectionReason::NotOnSourceFolio)),
        Some(c) if c.voided => Err(reject(ChargeRejectionReason::Voided)),
        Some(c) => Ok(c),
        None => Err(reject(ChargeRejectionReason::NotOnSourceFolio)),
    }
}

impl FolioService {
    /// Moves charges between two open folios of the same booking
    ///
    /// # Errors
    ///
    /// * `NotFound` - either folio is unknown to the caller's tenant
    /// * `Validation` - same folio, different bookings, empty or duplicated
    ///   charge list
    /// * `ClosedFolio` - either folio is closed
    /// * `TransactionFailure` - one or more charges are not movable; lists each
    /// * `Concurrency` - a charge kept changing underneath the transfer
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id, from = %request.from_folio_id, to = %request.to_folio_id))]
    pub async fn transfer(
        &self,
        ctx: &RequestContext,
        request: &TransferCharges,
    ) -> Result<TransferRecord, FolioError> {
        request.validate()?;
        self.with_retry("transfer", move || self.try_transfer(ctx, request)).await
    }

    async fn try_transfer(
        &self,
        ctx: &RequestContext,
        request: &TransferCharges,
    ) -> Result<TransferRecord, FolioError> {
        let from = self.load_folio(ctx, request.from_folio_id).await?;
        let to = self.load_folio(ctx, request.to_folio_id).await?;
        check_folio_pair(&from, &to)?;

        let mut movable = Vec::with_capacity(request.charge_ids.len());
        let mut rejected = Vec::new();
        for id in &request.charge_ids {
            let charge = self.store().get_charge(ctx.tenant_id, *id).await?;
            match check_charge(*id, charge, &from) {
                Ok(charge) => movable.push(charge),
                Err(rejection) => rejected.push(rejection),
            }
        }
        if !rejected.is_empty() {
            return Err(FolioError::TransactionFailure { rejected });
        }

        let amount = Money::checked_sum(from.currency, movable.iter().map(|c| &c.total))?;
        let record = TransferRecord {
            id: TransferId::new_v7(),
            tenant_id: ctx.tenant_id,
            from_folio_id: from.id,
            to_folio_id: to.id,
            charge_ids: request.charge_ids.clone(),
            amount,
            reason: request.reason.trim().to_string(),
            performed_by: ctx.actor.id.clone(),
            performed_at: Utc::now(),
        };

        let mut changes = ChangeSet::new(ctx.tenant_id)
            .require(Precondition::FolioOpen(from.id))
            .require(Precondition::FolioOpen(to.id));
        for charge in &movable {
            let mut moved = charge.clone();
            moved.folio_id = to.id;
            changes = changes
                .require(Precondition::ChargeVersion { charge_id: charge.id, version: charge.version })
                .write(LedgerWrite::UpdateCharge(moved));
        }
        let changes = changes
            .write(LedgerWrite::InsertTransfer(record.clone()))
            .audit(
                AuditEntry::new(ctx, AuditAction::ChargesTransferred, EntityType::Transfer, record.id)
                    .before(&movable)?
                    .after(&record)?
                    .with_reason(Some(record.reason.clone())),
            );
        self.commit(changes).await?;

        info!(
            transfer_id = %record.id,
            from_folio_id = %from.id,
            to_folio_id = %to.id,
            charges = record.charge_ids.len(),
            amount = %record.amount,
            actor = %ctx.actor.id,
            "Charges transferred"
        );
        Ok(record)
    }
}
