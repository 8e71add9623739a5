//! Tagged request and response types
//!
//! Each ledger operation has exactly one request type. Requests deserialize
//! from JSON tagged by `operation` and reject unknown fields, so a typo in a
//! field name is a validation error rather than a silently ignored value.
//!
//! ```json
//! {"operation": "post_payment", "folio_id": "...", "amount": "100.00",
//!  "method": "card", "payment_type": "prepayment"}
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{BookingId, ChargeId, Currency, FolioId, InvoiceId, Money, PartyId, Rate};

use crate::audit::{AuditEntry, AuditQuery};
use crate::balance::BalanceBreakdown;
use crate::charge::{Charge, ChargeCategory};
use crate::context::RequestContext;
use crate::error::FolioError;
use crate::folio::{Folio, FolioType};
use crate::invoice::{CustomerInfo, Invoice, InvoiceSource};
use crate::payment::{Payment, PaymentType};
use crate::service::FolioService;
use crate::settlement::SettlementOutcome;
use crate::transfer::TransferRecord;

fn default_quantity() -> Decimal {
    Decimal::ONE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateFolio {
    pub booking_id: BookingId,
    pub folio_type: FolioType,
    pub owner_id: PartyId,
    /// Defaults to the ledger currency
    #[serde(default)]
    pub currency: Option<Currency>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostCharge {
    pub folio_id: FolioId,
    pub category: ChargeCategory,
    pub description: String,
    #[serde(default = "default_quantity")]
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub tax_rate: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostAdjustment {
    pub folio_id: FolioId,
    pub description: String,
    /// Positive amount credited back to the folio
    pub amount: Decimal,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoidCharge {
    pub charge_id: ChargeId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostPayment {
    pub folio_id: FolioId,
    pub amount: Decimal,
    pub method: String,
    pub payment_type: PaymentType,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferCharges {
    pub from_folio_id: FolioId,
    pub to_folio_id: FolioId,
    pub charge_ids: Vec<ChargeId>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetFolio {
    pub folio_id: FolioId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListFolios {
    pub booking_id: BookingId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CloseFolio {
    pub folio_id: FolioId,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReopenFolio {
    pub folio_id: FolioId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettleAndClose {
    pub booking_id: BookingId,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompileInvoice {
    pub source: InvoiceSource,
    pub customer_info: CustomerInfo,
    /// Currency of explicit line items; folio-sourced invoices use the folios' currency
    #[serde(default)]
    pub currency: Option<Currency>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvoiceRef {
    pub invoice_id: InvoiceId,
}

/// A folio with its ledgers and freshly computed balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolioStatement {
    pub folio: Folio,
    pub charges: Vec<Charge>,
    pub payments: Vec<Payment>,
    pub balance: Money,
    pub breakdown: BalanceBreakdown,
}

/// Any ledger operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum LedgerRequest {
    CreateFolio(CreateFolio),
    GetFolio(GetFolio),
    ListFolios(ListFolios),
    CloseFolio(CloseFolio),
    ReopenFolio(ReopenFolio),
    PostCharge(PostCharge),
    PostAdjustment(PostAdjustment),
    VoidCharge(VoidCharge),
    PostPayment(PostPayment),
    Transfer(TransferCharges),
    SettleAndClose(SettleAndClose),
    CompileInvoice(CompileInvoice),
    GetInvoice(InvoiceRef),
    IssueInvoice(InvoiceRef),
    MarkInvoicePaid(InvoiceRef),
    AuditTrail(AuditQuery),
}

impl LedgerRequest {
    /// Operation name as it appears in the `operation` tag
    pub fn operation(&self) -> &'static str {
        match self {
            LedgerRequest::CreateFolio(_) => "create_folio",
            LedgerRequest::GetFolio(_) => "get_folio",
            LedgerRequest::ListFolios(_) => "list_folios",
            LedgerRequest::CloseFolio(_) => "close_folio",
            LedgerRequest::ReopenFolio(_) => "reopen_folio",
            LedgerRequest::PostCharge(_) => "post_charge",
            LedgerRequest::PostAdjustment(_) => "post_adjustment",
            LedgerRequest::VoidCharge(_) => "void_charge",
            LedgerRequest::PostPayment(_) => "post_payment",
            LedgerRequest::Transfer(_) => "transfer",
            LedgerRequest::SettleAndClose(_) => "settle_and_close",
            LedgerRequest::CompileInvoice(_) => "compile_invoice",
            LedgerRequest::GetInvoice(_) => "get_invoice",
            LedgerRequest::IssueInvoice(_) => "issue_invoice",
            LedgerRequest::MarkInvoicePaid(_) => "mark_invoice_paid",
            LedgerRequest::AuditTrail(_) => "audit_trail",
        }
    }
}

/// Result of a ledger operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", content = "data", rename_all = "snake_case")]
pub enum LedgerResponse {
    Folio(Folio),
    Folios(Vec<Folio>),
    Statement(FolioStatement),
    Charge(Charge),
    Payment(Payment),
    Transfer(TransferRecord),
    Settlement(SettlementOutcome),
    Invoice(Invoice),
    AuditTrail(Vec<AuditEntry>),
}

impl FolioService {
    /// Dispatches a tagged request to its operation
    #[tracing::instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id, actor = %ctx.actor.id, operation = request.operation()))]
    pub async fn handle(
        &self,
        ctx: &RequestContext,
        request: LedgerRequest,
    ) -> Result<LedgerResponse, FolioError> {
        let response = match request {
            LedgerRequest::CreateFolio(r) => LedgerResponse::Folio(self.create_folio(ctx, &r).await?),
            LedgerRequest::GetFolio(r) => LedgerResponse::Statement(self.get_folio(ctx, r.folio_id).await?),
            LedgerRequest::ListFolios(r) => LedgerResponse::Folios(self.list_folios(ctx, r.booking_id).await?),
            LedgerRequest::CloseFolio(r) => LedgerResponse::Folio(self.close_folio(ctx, &r).await?),
            LedgerRequest::ReopenFolio(r) => LedgerResponse::Folio(self.reopen_folio(ctx, &r).await?),
            LedgerRequest::PostCharge(r) => LedgerResponse::Charge(self.post_charge(ctx, &r).await?),
            LedgerRequest::PostAdjustment(r) => LedgerResponse::Charge(self.post_adjustment(ctx, &r).await?),
            LedgerRequest::VoidCharge(r) => LedgerResponse::Charge(self.void_charge(ctx, &r).await?),
            LedgerRequest::PostPayment(r) => LedgerResponse::Payment(self.post_payment(ctx, &r).await?),
            LedgerRequest::Transfer(r) => LedgerResponse::Transfer(self.transfer(ctx, &r).await?),
            LedgerRequest::SettleAndClose(r) => LedgerResponse::Settlement(self.settle_and_close(ctx, &r).await?),
            LedgerRequest::CompileInvoice(r) => LedgerResponse::Invoice(self.compile_invoice(ctx, &r).await?),
            LedgerRequest::GetInvoice(r) => LedgerResponse::Invoice(self.get_invoice(ctx, r.invoice_id).await?),
            LedgerRequest::IssueInvoice(r) => LedgerResponse::Invoice(self.issue_invoice(ctx, r.invoice_id).await?),
            LedgerRequest::MarkInvoicePaid(r) => LedgerResponse::Invoice(self.mark_invoice_paid(ctx, r.invoice_id).await?),
            LedgerRequest::AuditTrail(q) => LedgerResponse::AuditTrail(self.audit_trail(ctx, &q).await?),
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_tagged_request() {
        let folio_id = FolioId::new();
        let json = serde_json::json!({
            "operation": "post_charge",
            "folio_id": folio_id,
            "category": "room",
            "description": "Room 101",
            "unit_price": "150.00",
            "tax_rate": "0.18"
        });

        let request: LedgerRequest = serde_json::from_value(json).unwrap();
        match request {
            LedgerRequest::PostCharge(charge) => {
                assert_eq!(charge.folio_id, folio_id);
                assert_eq!(charge.quantity, Decimal::ONE);
                assert_eq!(charge.category, ChargeCategory::Room);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let json = serde_json::json!({
            "operation": "get_folio",
            "folio_id": FolioId::new(),
            "include_voided": true
        });
        assert!(serde_json::from_value::<LedgerRequest>(json).is_err());
    }

    #[test]
    fn test_unknown_operation_rejected() {
        let json = serde_json::json!({"operation": "delete_folio", "folio_id": FolioId::new()});
        assert!(serde_json::from_value::<LedgerRequest>(json).is_err());
    }
}
