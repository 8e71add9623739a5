//! Charge ledger entries
//!
//! Charges are itemized and append-only. Once posted, only the void fields
//! change (and `folio_id` when the transfer engine moves the charge); a
//! voided charge stays on the ledger but no longer counts toward the balance.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{ChargeId, FolioId, Money, MoneyError, Rate, TenantId};

use crate::error::FolioError;
use crate::folio::Folio;

/// Revenue category of a charge
///
/// Serialized as a plain string; unknown categories are kept verbatim
/// as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChargeCategory {
    Room,
    Food,
    Beverage,
    Minibar,
    Spa,
    Laundry,
    CityTax,
    Telephone,
    Parking,
    /// Corrections and refunds
    Adjustment,
    Other(String),
}

impl ChargeCategory {
    pub fn as_str(&self) -> &str {
        match self {
            ChargeCategory::Room => "room",
            ChargeCategory::Food => "food",
            ChargeCategory::Beverage => "beverage",
            ChargeCategory::Minibar => "minibar",
            ChargeCategory::Spa => "spa",
            ChargeCategory::Laundry => "laundry",
            ChargeCategory::CityTax => "city_tax",
            ChargeCategory::Telephone => "telephone",
            ChargeCategory::Parking => "parking",
            ChargeCategory::Adjustment => "adjustment",
            ChargeCategory::Other(name) => name,
        }
    }
}

impl From<String> for ChargeCategory {
    fn from(value: String) -> Self {
        match value.as_str() {
            "room" => ChargeCategory::Room,
            "food" => ChargeCategory::Food,
            "beverage" => ChargeCategory::Beverage,
            "minibar" => ChargeCategory::Minibar,
            "spa" => ChargeCategory::Spa,
            "laundry" => ChargeCategory::Laundry,
            "city_tax" => ChargeCategory::CityTax,
            "telephone" => ChargeCategory::Telephone,
            "parking" => ChargeCategory::Parking,
            "adjustment" => ChargeCategory::Adjustment,
            _ => ChargeCategory::Other(value),
        }
    }
}

impl From<ChargeCategory> for String {
    fn from(category: ChargeCategory) -> Self {
        category.as_str().to_string()
    }
}

impl fmt::Display for ChargeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line figures of a charge, all rounded to the currency's minor units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargeAmounts {
    pub amount: Money,
    pub tax_amount: Money,
    pub total: Money,
}

impl ChargeAmounts {
    /// Computes amount = round(quantity × unit_price),
    /// tax = round(amount × tax_rate) and total = amount + tax
    ///
    /// # Errors
    ///
    /// `MoneyError::Overflow` when a figure leaves the decimal range
    pub fn compute(quantity: Decimal, unit_price: &Money, tax_rate: Rate) -> Result<Self, MoneyError> {
        let amount = unit_price.multiply(quantity)?.round_to_currency();
        let tax_amount = tax_rate.apply_rounded(&amount)?;
        Ok(Self {
            amount,
            tax_amount,
            total: amount.checked_add(&tax_amount)?,
        })
    }
}

/// A posted charge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    pub id: ChargeId,
    pub tenant_id: TenantId,
    /// Folio the charge currently sits on
    pub folio_id: FolioId,
    pub category: ChargeCategory,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    pub amount: Money,
    pub tax_rate: Rate,
    pub tax_amount: Money,
    pub total: Money,
    pub voided: bool,
    pub void_reason: Option<String>,
    pub voided_by: Option<String>,
    pub voided_at: Option<DateTime<Utc>>,
    pub posted_at: DateTime<Utc>,
    pub posted_by: String,
    /// Optimistic-lock version, managed by the ledger store
    pub version: u64,
}

impl Charge {
    /// Builds a charge against `folio`, validating the line and computing
    /// its amounts
    ///
    /// # Errors
    ///
    /// * `Validation` - blank description, quantity <= 0, negative unit price,
    ///   a tax rate outside [0, 1], or a line too large to compute
    pub fn post(
        folio: &Folio,
        category: ChargeCategory,
        description: &str,
        quantity: Decimal,
        unit_price: Decimal,
        tax_rate: Rate,
        posted_by: &str,
    ) -> Result<Self, FolioError> {
        if unit_price < Decimal::ZERO {
            return Err(FolioError::validation(format!(
                "unit_price must not be negative, got {}",
                unit_price
            )));
        }
        Self::build(folio, category, description, quantity, unit_price, tax_rate, posted_by)
    }

    /// Builds a negative adjustment charge of `-amount` (refund or correction)
    ///
    /// # Errors
    ///
    /// * `InvalidAmount` - amount <= 0 once rounded to minor units
    /// * `Validation` - blank description
    pub fn adjustment(
        folio: &Folio,
        description: &str,
        amount: Decimal,
        posted_by: &str,
    ) -> Result<Self, FolioError> {
        let rounded = Money::new(amount, folio.currency).round_to_currency().amount();
        if rounded <= Decimal::ZERO {
            return Err(FolioError::InvalidAmount { amount });
        }
        Self::build(
            folio,
            ChargeCategory::Adjustment,
            description,
            Decimal::ONE,
            -rounded,
            Rate::ZERO,
            posted_by,
        )
    }

    fn build(
        folio: &Folio,
        category: ChargeCategory,
        description: &str,
        quantity: Decimal,
        unit_price: Decimal,
        tax_rate: Rate,
        posted_by: &str,
    ) -> Result<Self, FolioError> {
        if description.trim().is_empty() {
            return Err(FolioError::validation("description must not be blank"));
        }
        if quantity <= Decimal::ZERO {
            return Err(FolioError::validation(format!(
                "quantity must be greater than zero, got {}",
                quantity
            )));
        }
        if !tax_rate.is_fraction() {
            return Err(FolioError::validation(format!(
                "tax_rate must lie in [0, 1], got {}",
                tax_rate.as_decimal()
            )));
        }

        let unit_price = Money::new(unit_price, folio.currency);
        let amounts = ChargeAmounts::compute(quantity, &unit_price, tax_rate)?;

        Ok(Self {
            id: ChargeId::new_v7(),
            tenant_id: folio.tenant_id,
            folio_id: folio.id,
            category,
            description: description.trim().to_string(),
            quantity,
            unit_price,
            amount: amounts.amount,
            tax_rate,
            tax_amount: amounts.tax_amount,
            total: amounts.total,
            voided: false,
            void_reason: None,
            voided_by: None,
            voided_at: None,
            posted_at: Utc::now(),
            posted_by: posted_by.to_string(),
            version: 0,
        })
    }

    /// Marks the charge voided
    ///
    /// # Errors
    ///
    /// Returns `AlreadyVoided` on a second void; the charge is left untouched
    pub fn void(&mut self, reason: &str, actor: &str) -> Result<(), FolioError> {
        if self.voided {
            return Err(FolioError::AlreadyVoided(self.id));
        }
        if reason.trim().is_empty() {
            return Err(FolioError::validation("void reason must not be blank"));
        }
        self.voided = true;
        self.void_reason = Some(reason.trim().to_string());
        self.voided_by = Some(actor.to_string());
        self.voided_at = Some(Utc::now());
        Ok(())
    }

    /// Returns the total that counts toward the folio balance
    pub fn effective_total(&self) -> Option<&Money> {
        (!self.voided).then_some(&self.total)
    }
}
