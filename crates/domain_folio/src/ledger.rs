//! Charge and payment ledger operations
//!
//! Appends only require the folio to still be open at commit time, so any
//! number of concurrent postings to the same folio succeed without lost
//! updates. Voids guard on the charge's version.

use tracing::{info, instrument};

use crate::audit::{AuditAction, AuditEntry, EntityType};
use crate::charge::Charge;
use crate::context::RequestContext;
use crate::error::FolioError;
use crate::payment::Payment;
use crate::ports::{ChangeSet, LedgerWrite, Precondition};
use crate::requests::{PostAdjustment, PostCharge, PostPayment, VoidCharge};
use crate::service::FolioService;

impl FolioService {
    /// Posts a charge to an open folio
    ///
    /// # Errors
    ///
    /// * `ClosedFolio` - the folio is closed
    /// * `Validation` - invalid quantity, unit price, tax rate or description
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id, folio_id = %request.folio_id))]
    pub async fn post_charge(
        &self,
        ctx: &RequestContext,
        request: &PostCharge,
    ) -> Result<Charge, FolioError> {
        self.with_retry("post_charge", move || async move {
            let folio = self.load_folio(ctx, request.folio_id).await?;
            folio.ensure_open()?;

            let charge = Charge::post(
                &folio,
                request.category.clone(),
                &request.description,
                request.quantity,
                request.unit_price,
                request.tax_rate,
                ctx.actor_id(),
            )?;
            self.append_charge(ctx, charge, AuditAction::ChargePosted, None).await
        })
        .await
    }

    /// Posts a negative adjustment (refund or correction) to an open folio
    ///
    /// # Errors
    ///
    /// * `ClosedFolio` - the folio is closed
    /// * `InvalidAmount` - amount <= 0
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id, folio_id = %request.folio_id))]
    pub async fn post_adjustment(
        &self,
        ctx: &RequestContext,
        request: &PostAdjustment,
    ) -> Result<Charge, FolioError> {
        self.with_retry("post_adjustment", move || async move {
            let folio = self.load_folio(ctx, request.folio_id).await?;
            folio.ensure_open()?;

            let charge = Charge::adjustment(&folio, &request.description, request.amount, ctx.actor_id())?;
            self.append_charge(ctx, charge, AuditAction::AdjustmentPosted, request.reason.clone())
                .await
        })
        .await
    }

    async fn append_charge(
        &self,
        ctx: &RequestContext,
        charge: Charge,
        action: AuditAction,
        reason: Option<String>,
    ) -> Result<Charge, FolioError> {
        let changes = ChangeSet::new(ctx.tenant_id)
            .require(Precondition::FolioOpen(charge.folio_id))
            .write(LedgerWrite::InsertCharge(charge.clone()))
            .audit(
                AuditEntry::new(ctx, action, EntityType::Charge, charge.id)
                    .after(&charge)?
                    .with_reason(reason),
            );
        self.commit(changes).await?;

        info!(
            charge_id = %charge.id,
            folio_id = %charge.folio_id,
            category = %charge.category,
            total = %charge.total,
            actor = %ctx.actor.id,
            "Charge posted"
        );
        Ok(charge)
    }

    /// Voids a charge, excluding it from the balance
    ///
    /// # Errors
    ///
    /// * `NotFound` - unknown charge
    /// * `AlreadyVoided` - the charge was voided before; nothing is logged
    /// * `ClosedFolio` - the owning folio is closed
    /// * `Concurrency` - the charge kept changing underneath the void
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id, charge_id = %request.charge_id))]
    pub async fn void_charge(
        &self,
        ctx: &RequestContext,
        request: &VoidCharge,
    ) -> Result<Charge, FolioError> {
        self.with_retry("void_charge", move || async move {
            let before = self
                .store()
                .get_charge(ctx.tenant_id, request.charge_id)
                .await?
                .ok_or_else(|| FolioError::not_found("Charge", request.charge_id))?;
            if before.voided {
                return Err(FolioError::AlreadyVoided(before.id));
            }
            self.load_folio(ctx, before.folio_id).await?.ensure_open()?;

            let mut charge = before.clone();
            charge.void(&request.reason, ctx.actor_id())?;

            let changes = ChangeSet::new(ctx.tenant_id)
                .require(Precondition::FolioOpen(charge.folio_id))
                .require(Precondition::ChargeVersion { charge_id: charge.id, version: before.version })
                .write(LedgerWrite::UpdateCharge(charge.clone()))
                .audit(
                    AuditEntry::new(ctx, AuditAction::ChargeVoided, EntityType::Charge, charge.id)
                        .before(&before)?
                        .after(&charge)?
                        .with_reason(charge.void_reason.clone()),
                );
            self.commit(changes).await?;
            charge.version += 1;

            info!(
                charge_id = %charge.id,
                folio_id = %charge.folio_id,
                total = %charge.total,
                actor = %ctx.actor.id,
                "Charge voided"
            );
            Ok(charge)
        })
        .await
    }

    /// Posts a payment to an open folio
    ///
    /// # Errors
    ///
    /// * `ClosedFolio` - the folio is closed
    /// * `InvalidAmount` - amount <= 0
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id, folio_id = %request.folio_id))]
    pub async fn post_payment(
        &self,
        ctx: &RequestContext,
        request: &PostPayment,
    ) -> Result<Payment, FolioError> {
        self.with_retry("post_payment", move || async move {
            let folio = self.load_folio(ctx, request.folio_id).await?;
            folio.ensure_open()?;

            let payment = Payment::post(
                &folio,
                request.amount,
                &request.method,
                request.payment_type,
                request.reference.clone(),
                ctx.actor_id(),
            )?;

            let changes = ChangeSet::new(ctx.tenant_id)
                .require(Precondition::FolioOpen(folio.id))
                .write(LedgerWrite::InsertPayment(payment.clone()))
                .audit(AuditEntry::new(ctx, AuditAction::PaymentPosted, EntityType::Payment, payment.id).after(&payment)?);
            self.commit(changes).await?;

            info!(
                payment_id = %payment.id,
                folio_id = %folio.id,
                amount = %payment.amount,
                payment_type = %payment.payment_type,
                actor = %ctx.actor.id,
                "Payment posted"
            );
            Ok::<_, FolioError>(payment)
        })
        .await
    }
}
