//! Folio, charge and payment request bodies

use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use core_kernel::{BookingId, ChargeId, FolioId, Rate};
use domain_folio::{
    ChargeCategory, CloseFolio, PaymentType, PostAdjustment, PostCharge, PostPayment,
    ReopenFolio, SettleAndClose, TransferCharges, VoidCharge,
};

fn default_quantity() -> Decimal {
    Decimal::ONE
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ChargeBody {
    pub category: ChargeCategory,
    #[validate(length(min = 1, max = 200, message = "Description is required"))]
    pub description: String,
    #[serde(default = "default_quantity")]
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub tax_rate: Rate,
}

impl ChargeBody {
    pub fn into_request(self, folio_id: FolioId) -> PostCharge {
        PostCharge {
            folio_id,
            category: self.category,
            description: self.description,
            quantity: self.quantity,
            unit_price: self.unit_price,
            tax_rate: self.tax_rate,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AdjustmentBody {
    #[validate(length(min = 1, max = 200, message = "Description is required"))]
    pub description: String,
    pub amount: Decimal,
    #[serde(default)]
    pub reason: Option<String>,
}

impl AdjustmentBody {
    pub fn into_request(self, folio_id: FolioId) -> PostAdjustment {
        PostAdjustment {
            folio_id,
            description: self.description,
            amount: self.amount,
            reason: self.reason,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PaymentBody {
    pub amount: Decimal,
    #[validate(length(min = 1, max = 40, message = "Payment method is required"))]
    pub method: String,
    pub payment_type: PaymentType,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub reference: Option<String>,
}

impl PaymentBody {
    pub fn into_request(self, folio_id: FolioId) -> PostPayment {
        PostPayment {
            folio_id,
            amount: self.amount,
            method: self.method,
            payment_type: self.payment_type,
            reference: self.reference,
        }
    }
}

/// Body of close and settle requests
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CloseBody {
    #[serde(default)]
    pub force: bool,
    #[validate(length(min = 1, message = "Reason must not be blank"))]
    #[serde(default)]
    pub reason: Option<String>,
}

impl CloseBody {
    pub fn into_close(self, folio_id: FolioId) -> CloseFolio {
        CloseFolio {
            folio_id,
            force: self.force,
            reason: self.reason,
        }
    }

    pub fn into_settle(self, booking_id: BookingId) -> SettleAndClose {
        SettleAndClose {
            booking_id,
            force: self.force,
            reason: self.reason,
        }
    }
}

/// Body of reopen and void requests
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ReasonBody {
    #[validate(length(min = 1, max = 500, message = "Reason is required"))]
    pub reason: String,
}

impl ReasonBody {
    pub fn into_reopen(self, folio_id: FolioId) -> ReopenFolio {
        ReopenFolio {
            folio_id,
            reason: self.reason,
        }
    }

    pub fn into_void(self, charge_id: ChargeId) -> VoidCharge {
        VoidCharge {
            charge_id,
            reason: self.reason,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct TransferBody {
    pub from_folio_id: FolioId,
    pub to_folio_id: FolioId,
    #[validate(length(min = 1, message = "At least one charge is required"))]
    pub charge_ids: Vec<ChargeId>,
    #[validate(length(min = 1, max = 500, message = "Reason is required"))]
    pub reason: String,
}

impl From<TransferBody> for TransferCharges {
    fn from(body: TransferBody) -> Self {
        TransferCharges {
            from_folio_id: body.from_folio_id,
            to_folio_id: body.to_folio_id,
            charge_ids: body.charge_ids,
            reason: body.reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_body_defaults() {
        let body: ChargeBody = serde_json::from_value(serde_json::json!({
            "category": "minibar",
            "description": "Water",
            "unit_price": "4.50"
        }))
        .unwrap();
        assert!(body.validate().is_ok());

        let request = body.into_request(FolioId::new());
        assert_eq!(request.quantity, Decimal::ONE);
        assert_eq!(request.tax_rate, Rate::default());
    }

    #[test]
    fn test_blank_description_rejected() {
        let body: ChargeBody = serde_json::from_value(serde_json::json!({
            "category": "room",
            "description": "",
            "unit_price": "150.00"
        }))
        .unwrap();
        let errors = body.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("description"));
    }

    #[test]
    fn test_empty_transfer_rejected() {
        let body = TransferBody {
            from_folio_id: FolioId::new(),
            to_folio_id: FolioId::new(),
            charge_ids: vec![],
            reason: "billing instruction".to_string(),
        };
        assert!(body.validate().is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = serde_json::from_value::<PaymentBody>(serde_json::json!({
            "amount": "10",
            "method": "cash",
            "payment_type": "final",
            "tip": "2"
        }));
        assert!(result.is_err());
    }
}
