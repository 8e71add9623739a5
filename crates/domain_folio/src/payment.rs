//! Payment ledger entries
//!
//! Payments are fully immutable. There is no payment reversal; refunds are
//! posted as negative adjustment charges.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{FolioId, Money, PaymentId, TenantId};

use crate::error::FolioError;
use crate::folio::Folio;

/// When in the stay the payment was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Prepayment,
    Deposit,
    Interim,
    Final,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Prepayment => "prepayment",
            PaymentType::Deposit => "deposit",
            PaymentType::Interim => "interim",
            PaymentType::Final => "final",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentType {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prepayment" => Ok(PaymentType::Prepayment),
            "deposit" => Ok(PaymentType::Deposit),
            "interim" => Ok(PaymentType::Interim),
            "final" => Ok(PaymentType::Final),
            other => Err(FolioError::validation(format!("unknown payment type '{}'", other))),
        }
    }
}

/// A payment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub tenant_id: TenantId,
    pub folio_id: FolioId,
    /// Always positive
    pub amount: Money,
    /// Opaque tender description (card, cash, bank transfer)
    pub method: String,
    pub payment_type: PaymentType,
    /// External reference (terminal receipt, bank ref)
    pub reference: Option<String>,
    pub posted_at: DateTime<Utc>,
    pub posted_by: String,
}

impl Payment {
    /// Creates a payment against `folio`
    ///
    /// Overpayment is allowed and yields a negative balance.
    ///
    /// # Errors
    ///
    /// * `InvalidAmount` - amount <= 0 once rounded to minor units
    /// * `Validation` - blank method
    pub fn post(
        folio: &Folio,
        amount: Decimal,
        method: &str,
        payment_type: PaymentType,
        reference: Option<String>,
        posted_by: &str,
    ) -> Result<Self, FolioError> {
        let rounded = Money::new(amount, folio.currency).round_to_currency();
        if !rounded.is_positive() {
            return Err(FolioError::InvalidAmount { amount });
        }
        if method.trim().is_empty() {
            return Err(FolioError::validation("payment method must not be blank"));
        }

        Ok(Self {
            id: PaymentId::new_v7(),
            tenant_id: folio.tenant_id,
            folio_id: folio.id,
            amount: rounded,
            method: method.trim().to_string(),
            payment_type,
            reference: reference.filter(|r| !r.trim().is_empty()),
            posted_at: Utc::now(),
            posted_by: posted_by.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folio::{format_folio_number, FolioType};
    use core_kernel::{BookingId, Currency, PartyId};
    use rust_decimal_macros::dec;

    fn folio() -> Folio {
        Folio::open(
            TenantId::new(),
            BookingId::new(),
            FolioType::Guest,
            PartyId::new(),
            format_folio_number(2026, 7),
            Currency::EUR,
        )
    }

    #[test]
    fn test_prepayment() {
        let payment = Payment::post(
            &folio(),
            dec!(100.00),
            "card",
            PaymentType::Prepayment,
            Some("AUTH-9921".to_string()),
            "frontdesk",
        )
        .unwrap();
        assert_eq!(payment.amount.amount(), dec!(100.00));
        assert_eq!(payment.reference.as_deref(), Some("AUTH-9921"));
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        for amount in [dec!(0), dec!(-5), dec!(0.004)] {
            let err = Payment::post(&folio(), amount, "cash", PaymentType::Final, None, "fd")
                .unwrap_err();
            assert!(matches!(err, FolioError::InvalidAmount { .. }));
        }
    }

    #[test]
    fn test_payment_type_parsing() {
        assert_eq!("interim".parse::<PaymentType>().unwrap(), PaymentType::Interim);
        assert!("refund".parse::<PaymentType>().is_err());
    }
}
