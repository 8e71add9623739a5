//! Invoice compilation
//!
//! An invoice is a frozen snapshot of line items, either taken from the
//! unvoided charges of one or more folios or supplied explicitly. Per line:
//!
//! - net = round(quantity × unit_price)
//! - VAT = round(net × vat_rate)
//! - additional taxes are flat amounts or round(net × rate)
//! - withholding = round(VAT × fraction), informational only
//!
//! The invoice total is subtotal + VAT + additional taxes; withholding does
//! not reduce it.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use core_kernel::{ChargeId, Currency, FolioId, InvoiceId, Money, Rate, TenantId};

use crate::audit::{AuditAction, AuditEntry, EntityType};
use crate::charge::{Charge, ChargeCategory};
use crate::context::RequestContext;
use crate::error::FolioError;
use crate::ports::{ChangeSet, LedgerWrite, Precondition, SequenceKind};
use crate::requests::CompileInvoice;
use crate::service::FolioService;

/// Formats an invoice number, e.g. `INV2026-000001`
pub fn format_invoice_number(year: i32, sequence: u32) -> String {
    format!("INV{}-{:06}", year, sequence)
}

/// Invoice lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::Paid => "paid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(InvoiceStatus::Draft),
            "issued" => Some(InvoiceStatus::Issued),
            "paid" => Some(InvoiceStatus::Paid),
            _ => None,
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Billing details of the invoiced party
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomerInfo {
    pub name: String,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl CustomerInfo {
    /// Fails if the customer name is blank
    pub fn validate(&self) -> Result<(), FolioError> {
        if self.name.trim().is_empty() {
            return Err(FolioError::validation("customer name must not be blank"));
        }
        Ok(())
    }
}

/// A tax levied on a line in addition to VAT
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdditionalTax {
    /// Fixed amount per line
    Flat { name: String, amount: Decimal },
    /// Percentage of the line's net amount
    Percentage { name: String, rate: Rate },
}

impl AdditionalTax {
    pub fn name(&self) -> &str {
        match self {
            AdditionalTax::Flat { name, .. } | AdditionalTax::Percentage { name, .. } => name,
        }
    }

    fn apply(&self, net: &Money) -> Result<Money, FolioError> {
        match self {
            AdditionalTax::Flat { amount, .. } if *amount < Decimal::ZERO => Err(FolioError::validation(
                format!("additional tax '{}' must not be negative", self.name()),
            )),
            AdditionalTax::Flat { amount, .. } => Ok(Money::new(*amount, net.currency()).round_to_currency()),
            AdditionalTax::Percentage { rate, .. } if !rate.is_fraction() => Err(FolioError::validation(
                format!("additional tax '{}' rate must lie in [0, 1]", self.name()),
            )),
            AdditionalTax::Percentage { rate, .. } => Ok(rate.apply_rounded(net)?),
        }
    }
}

/// Share of the VAT withheld by the buyer, within [0, 1]
///
/// Deserializes from a ratio string ("7/10"), a decimal string ("0.7"),
/// a percentage string ("70%") or a JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WithholdingFraction(Rate);

impl WithholdingFraction {
    /// Wraps a rate, rejecting values outside [0, 1]
    pub fn new(rate: Rate) -> Result<Self, FolioError> {
        if rate.is_fraction() {
            Ok(Self(rate))
        } else {
            Err(FolioError::validation(format!(
                "withholding fraction must lie in [0, 1], got {}",
                rate.as_decimal()
            )))
        }
    }

    /// Parses "7/10", "0.7" or "70%"
    pub fn parse(value: &str) -> Result<Self, FolioError> {
        Self::new(value.parse::<Rate>()?)
    }

    pub fn rate(&self) -> Rate {
        self.0
    }
}

impl<'de> Deserialize<'de> for WithholdingFraction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(Decimal),
        }

        let fraction = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => WithholdingFraction::parse(&text),
            Raw::Number(value) => WithholdingFraction::new(Rate::new(value)),
        };
        fraction.map_err(de::Error::custom)
    }
}

fn default_quantity() -> Decimal {
    Decimal::ONE
}

/// An explicit invoice line before computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvoiceLineInput {
    pub description: String,
    #[serde(default)]
    pub category: Option<ChargeCategory>,
    #[serde(default = "default_quantity")]
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub vat_rate: Rate,
    #[serde(default)]
    pub additional_taxes: Vec<AdditionalTax>,
    #[serde(default)]
    pub withholding: Option<WithholdingFraction>,
    #[serde(default)]
    pub source_charge_id: Option<ChargeId>,
}

impl InvoiceLineInput {
    /// Snapshots an unvoided charge as an invoice line
    pub fn from_charge(charge: &Charge) -> Self {
        Self {
            description: charge.description.clone(),
            category: Some(charge.category.clone()),
            quantity: charge.quantity,
            unit_price: charge.unit_price.amount(),
            vat_rate: charge.tax_rate,
            additional_taxes: Vec::new(),
            withholding: None,
            source_charge_id: Some(charge.id),
        }
    }
}

/// Where the invoice lines come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceSource {
    /// Unvoided charges of these folios
    FolioIds(Vec<FolioId>),
    /// Explicit lines
    LineItems(Vec<InvoiceLineInput>),
}

/// A tax amount applied to a line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedTax {
    pub name: String,
    pub amount: Money,
}

/// A computed invoice line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub description: String,
    pub category: Option<ChargeCategory>,
    pub quantity: Decimal,
    pub unit_price: Money,
    pub net: Money,
    pub vat_rate: Rate,
    pub vat: Money,
    pub additional_taxes: Vec<AppliedTax>,
    pub withholding_rate: Option<Rate>,
    pub withholding: Money,
    /// net + VAT + additional taxes
    pub total: Money,
    pub source_charge_id: Option<ChargeId>,
}

impl InvoiceLine {
    /// Computes one line in `currency`
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a blank description, quantity <= 0, a rate
    /// outside [0, 1], or figures too large to compute
    pub fn compute(input: &InvoiceLineInput, currency: Currency) -> Result<Self, FolioError> {
        if input.description.trim().is_empty() {
            return Err(FolioError::validation("invoice line description must not be blank"));
        }
        if input.quantity <= Decimal::ZERO {
            return Err(FolioError::validation(format!(
                "invoice line quantity must be greater than zero, got {}",
                input.quantity
            )));
        }
        if !input.vat_rate.is_fraction() {
            return Err(FolioError::validation(format!(
                "VAT rate must lie in [0, 1], got {}",
                input.vat_rate.as_decimal()
            )));
        }

        let unit_price = Money::new(input.unit_price, currency);
        let net = unit_price.multiply(input.quantity)?.round_to_currency();
        let vat = input.vat_rate.apply_rounded(&net)?;

        let additional_taxes = input
            .additional_taxes
            .iter()
            .map(|tax| {
                Ok(AppliedTax {
                    name: tax.name().to_string(),
                    amount: tax.apply(&net)?,
                })
            })
            .collect::<Result<Vec<_>, FolioError>>()?;
        let additional = Money::checked_sum(currency, additional_taxes.iter().map(|t| &t.amount))?;

        let withholding_rate = input.withholding.map(|w| w.rate());
        let withholding = match withholding_rate {
            Some(rate) => rate.apply_rounded(&vat)?,
            None => Money::zero(currency),
        };

        Ok(Self {
            description: input.description.trim().to_string(),
            category: input.category.clone(),
            quantity: input.quantity,
            unit_price,
            net,
            vat_rate: input.vat_rate,
            vat,
            additional_taxes,
            withholding_rate,
            withholding,
            total: net.checked_add(&vat)?.checked_add(&additional)?,
            source_charge_id: input.source_charge_id,
        })
    }

    fn additional_total(&self) -> Result<Money, FolioError> {
        Ok(Money::checked_sum(self.net.currency(), self.additional_taxes.iter().map(|t| &t.amount))?)
    }
}

/// An invoice snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub tenant_id: TenantId,
    pub invoice_number: String,
    pub customer: CustomerInfo,
    pub currency: Currency,
    pub source_folio_ids: Vec<FolioId>,
    pub lines: Vec<InvoiceLine>,
    pub subtotal: Money,
    pub total_vat: Money,
    pub total_additional_taxes: Money,
    pub vat_withholding: Money,
    pub total: Money,
    /// total_vat - vat_withholding
    pub vendor_vat_receivable: Money,
    /// total - vat_withholding
    pub amount_due_to_vendor: Money,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub issued_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Invoice {
    /// Computes a draft invoice from line inputs
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty line set, a blank customer name or
    /// any invalid line
    pub fn compile(
        tenant_id: TenantId,
        invoice_number: String,
        customer: CustomerInfo,
        currency: Currency,
        source_folio_ids: Vec<FolioId>,
        inputs: &[InvoiceLineInput],
        created_by: &str,
    ) -> Result<Self, FolioError> {
        customer.validate()?;
        if inputs.is_empty() {
            return Err(FolioError::validation("invoice has no lines"));
        }

        let lines = inputs
            .iter()
            .map(|input| InvoiceLine::compute(input, currency))
            .collect::<Result<Vec<_>, _>>()?;

        let subtotal = Money::checked_sum(currency, lines.iter().map(|l| &l.net))?;
        let total_vat = Money::checked_sum(currency, lines.iter().map(|l| &l.vat))?;
        let vat_withholding = Money::checked_sum(currency, lines.iter().map(|l| &l.withholding))?;
        let mut total_additional_taxes = Money::zero(currency);
        for line in &lines {
            total_additional_taxes = total_additional_taxes.checked_add(&line.additional_total()?)?;
        }
        let total = subtotal.checked_add(&total_vat)?.checked_add(&total_additional_taxes)?;

        Ok(Self {
            id: InvoiceId::new_v7(),
            tenant_id,
            invoice_number,
            customer,
            currency,
            source_folio_ids,
            lines,
            subtotal,
            total_vat,
            total_additional_taxes,
            vat_withholding,
            total,
            vendor_vat_receivable: total_vat.checked_sub(&vat_withholding)?,
            amount_due_to_vendor: total.checked_sub(&vat_withholding)?,
            status: InvoiceStatus::Draft,
            created_at: Utc::now(),
            created_by: created_by.to_string(),
            issued_at: None,
            paid_at: None,
        })
    }

    /// draft -> issued
    pub fn issue(&mut self) -> Result<(), FolioError> {
        self.transition(InvoiceStatus::Draft, InvoiceStatus::Issued)?;
        self.issued_at = Some(Utc::now());
        Ok(())
    }

    /// issued -> paid
    pub fn mark_paid(&mut self) -> Result<(), FolioError> {
        self.transition(InvoiceStatus::Issued, InvoiceStatus::Paid)?;
        self.paid_at = Some(Utc::now());
        Ok(())
    }

    fn transition(&mut self, from: InvoiceStatus, to: InvoiceStatus) -> Result<(), FolioError> {
        if self.status != from {
            return Err(FolioError::InvalidTransition {
                entity: "invoice",
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }
}

impl FolioService {
    /// Compiles a draft invoice from folios or explicit lines
    ///
    /// # Errors
    ///
    /// * `NotFound` - a source folio is unknown to the caller's tenant
    /// * `Validation` - no lines, blank customer name, invalid line, or
    ///   source folios in different currencies
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id))]
    pub async fn compile_invoice(
        &self,
        ctx: &RequestContext,
        request: &CompileInvoice,
    ) -> Result<Invoice, FolioError> {
        request.customer_info.validate()?;

        let (currency, folio_ids, inputs) = match &request.source {
            InvoiceSource::LineItems(lines) => (
                request.currency.unwrap_or(self.config().currency),
                Vec::new(),
                lines.clone(),
            ),
            InvoiceSource::FolioIds(ids) => {
                if ids.is_empty() {
                    return Err(FolioError::validation("invoice requires at least one folio"));
                }
                let mut currency = None;
                let mut inputs = Vec::new();
                for id in ids {
                    let folio = self.load_folio(ctx, *id).await?;
                    if currency.is_some_and(|c| c != folio.currency) {
                        return Err(FolioError::validation("source folios use different currencies"));
                    }
                    currency = Some(folio.currency);
                    let ledger = self.load_ledger(ctx, &folio).await?;
                    inputs.extend(ledger.charges.iter().filter(|c| !c.voided).map(InvoiceLineInput::from_charge));
                }
                (currency.unwrap_or(self.config().currency), ids.clone(), inputs)
            }
        };

        if inputs.is_empty() {
            return Err(FolioError::validation("invoice has no lines"));
        }

        let (year, sequence) = self.next_number(ctx, SequenceKind::Invoice).await?;
        let invoice = Invoice::compile(
            ctx.tenant_id,
            format_invoice_number(year, sequence),
            request.customer_info.clone(),
            currency,
            folio_ids,
            &inputs,
            ctx.actor_id(),
        )?;

        let changes = ChangeSet::new(ctx.tenant_id)
            .write(LedgerWrite::InsertInvoice(invoice.clone()))
            .audit(AuditEntry::new(ctx, AuditAction::InvoiceCompiled, EntityType::Invoice, invoice.id).after(&invoice)?);
        self.commit(changes).await?;

        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            lines = invoice.lines.len(),
            total = %invoice.total,
            actor = %ctx.actor.id,
            "Invoice compiled"
        );
        Ok(invoice)
    }

    /// Returns an invoice of the caller's tenant
    pub async fn get_invoice(
        &self,
        ctx: &RequestContext,
        invoice_id: InvoiceId,
    ) -> Result<Invoice, FolioError> {
        self.store()
            .get_invoice(ctx.tenant_id, invoice_id)
            .await?
            .ok_or_else(|| FolioError::not_found("Invoice", invoice_id))
    }

    /// Issues a draft invoice
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn issue_invoice(
        &self,
        ctx: &RequestContext,
        invoice_id: InvoiceId,
    ) -> Result<Invoice, FolioError> {
        self.advance_invoice(ctx, invoice_id, AuditAction::InvoiceIssued, Invoice::issue)
            .await
    }

    /// Marks an issued invoice as paid
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn mark_invoice_paid(
        &self,
        ctx: &RequestContext,
        invoice_id: InvoiceId,
    ) -> Result<Invoice, FolioError> {
        self.advance_invoice(ctx, invoice_id, AuditAction::InvoicePaid, Invoice::mark_paid)
            .await
    }

    async fn advance_invoice(
        &self,
        ctx: &RequestContext,
        invoice_id: InvoiceId,
        action: AuditAction,
        step: fn(&mut Invoice) -> Result<(), FolioError>,
    ) -> Result<Invoice, FolioError> {
        self.with_retry(action.as_str(), move || self.try_advance_invoice(ctx, invoice_id, action, step))
            .await
    }

    async fn try_advance_invoice(
        &self,
        ctx: &RequestContext,
        invoice_id: InvoiceId,
        action: AuditAction,
        step: fn(&mut Invoice) -> Result<(), FolioError>,
    ) -> Result<Invoice, FolioError> {
        let before = self.get_invoice(ctx, invoice_id).await?;
        let mut invoice = before.clone();
        step(&mut invoice)?;

        let changes = ChangeSet::new(ctx.tenant_id)
            .require(Precondition::InvoiceState { invoice_id, status: before.status })
            .write(LedgerWrite::UpdateInvoice(invoice.clone()))
            .audit(
                AuditEntry::new(ctx, action, EntityType::Invoice, invoice.id)
                    .before(&before.status)?
                    .after(&invoice.status)?,
            );
        self.commit(changes).await?;

        info!(
            invoice_id = %invoice.id,
            status = %invoice.status,
            actor = %ctx.actor.id,
            "Invoice status changed"
        );
        Ok(invoice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn customer() -> CustomerInfo {
        CustomerInfo {
            name: "Acme Travel Ltd".to_string(),
            tax_id: Some("TR-1234567890".to_string()),
            address: None,
            email: None,
        }
    }

    fn line(unit_price: Decimal, vat: Decimal) -> InvoiceLineInput {
        InvoiceLineInput {
            description: "Accommodation".to_string(),
            category: None,
            quantity: dec!(1),
            unit_price,
            vat_rate: Rate::new(vat),
            additional_taxes: Vec::new(),
            withholding: None,
            source_charge_id: None,
        }
    }

    fn compile(lines: &[InvoiceLineInput]) -> Result<Invoice, FolioError> {
        Invoice::compile(
            TenantId::new(),
            format_invoice_number(2026, 1),
            customer(),
            Currency::EUR,
            Vec::new(),
            lines,
            "accounting",
        )
    }

    #[test]
    fn test_vat_withholding_and_additional_tax() {
        let mut accommodation = line(dec!(400), dec!(0.18));
        accommodation.additional_taxes.push(AdditionalTax::Percentage {
            name: "accommodation tax".to_string(),
            rate: Rate::new(dec!(0.02)),
        });
        let mut catering = line(dec!(150), dec!(0.18));
        catering.withholding = Some(WithholdingFraction::parse("7/10").unwrap());

        let invoice = compile(&[accommodation, catering]).unwrap();

        assert_eq!(invoice.subtotal.amount(), dec!(550.00));
        assert_eq!(invoice.total_vat.amount(), dec!(99.00));
        assert_eq!(invoice.total_additional_taxes.amount(), dec!(8.00));
        assert_eq!(invoice.vat_withholding.amount(), dec!(18.90));
        assert_eq!(invoice.total.amount(), dec!(657.00));
        assert_eq!(invoice.vendor_vat_receivable.amount(), dec!(80.10));
        assert_eq!(invoice.amount_due_to_vendor.amount(), dec!(638.10));
        assert_eq!(invoice.status, InvoiceStatus::Draft);
    }

    #[test]
    fn test_flat_additional_tax() {
        let mut stay = line(dec!(100), dec!(0));
        stay.additional_taxes.push(AdditionalTax::Flat {
            name: "tourism levy".to_string(),
            amount: dec!(2.50),
        });
        let invoice = compile(&[stay]).unwrap();
        assert_eq!(invoice.total.amount(), dec!(102.50));
    }

    #[test]
    fn test_withholding_forms() {
        for text in ["7/10", "0.7", "70%"] {
            assert_eq!(
                WithholdingFraction::parse(text).unwrap().rate().as_decimal(),
                dec!(0.7),
                "parsing {}",
                text
            );
        }
        assert!(WithholdingFraction::parse("3/2").is_err());
        assert!(WithholdingFraction::parse("-0.1").is_err());

        let from_json: WithholdingFraction = serde_json::from_value(serde_json::json!("5/10")).unwrap();
        assert_eq!(from_json.rate().as_decimal(), dec!(0.5));
        assert!(serde_json::from_value::<WithholdingFraction>(serde_json::json!("11/10")).is_err());
    }

    #[test]
    fn test_oversized_line_is_a_validation_error() {
        let mut banquet = line(dec!(10000000000000000), dec!(0.18));
        banquet.quantity = dec!(10000000000000000);
        let err = compile(&[banquet]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);

        assert!(WithholdingFraction::parse("79228162514264337593543950335/0.0000001").is_err());
    }

    #[test]
    fn test_empty_invoice_rejected() {
        assert!(matches!(compile(&[]), Err(FolioError::Validation(_))));
    }

    #[test]
    fn test_lifecycle() {
        let mut invoice = compile(&[line(dec!(10), dec!(0))]).unwrap();
        assert!(matches!(invoice.mark_paid(), Err(FolioError::InvalidTransition { .. })));

        invoice.issue().unwrap();
        assert!(invoice.issued_at.is_some());
        assert!(matches!(invoice.issue(), Err(FolioError::InvalidTransition { .. })));

        invoice.mark_paid().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_source_deserializes_both_forms() {
        let by_folio: InvoiceSource =
            serde_json::from_value(serde_json::json!({"folio_ids": [FolioId::new()]})).unwrap();
        assert!(matches!(by_folio, InvoiceSource::FolioIds(ids) if ids.len() == 1));

        let by_lines: InvoiceSource = serde_json::from_value(serde_json::json!({
            "line_items": [{"description": "Hall rental", "unit_price": "400", "vat_rate": "0.18",
                            "additional_taxes": [{"kind": "percentage", "name": "levy", "rate": "0.02"}]}]
        }))
        .unwrap();
        assert!(matches!(by_lines, InvoiceSource::LineItems(lines) if lines[0].additional_taxes.len() == 1));
    }
}
