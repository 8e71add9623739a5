//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random ledger inputs that
//! respect the domain's validation rules, plus `fake`-based generators for
//! realistic names and descriptions.

use core_kernel::{Currency, FolioId, Rate};
use domain_folio::{ChargeCategory, CustomerInfo, PaymentType, PostCharge};
use fake::faker::address::en::StreetName;
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::SafeEmail;
use fake::faker::lorem::en::Words;
use fake::Fake;
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for generating ledger currencies
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::EUR),
        Just(Currency::USD),
        Just(Currency::GBP),
        Just(Currency::TRY),
        Just(Currency::CHF),
    ]
}

/// Strategy for generating valid positive amounts in minor units
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..10_000_000i64
}

/// Strategy for unit prices with two decimal places (0.01 to 99,999.99)
pub fn unit_price_strategy() -> impl Strategy<Value = Decimal> {
    positive_amount_minor_strategy().prop_map(|minor| Decimal::new(minor, 2))
}

/// Strategy for positive quantities, whole or with one decimal place
pub fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    prop_oneof![
        (1i64..10i64).prop_map(|n| Decimal::new(n, 0)),
        (1i64..100i64).prop_map(|n| Decimal::new(n, 1)),
    ]
}

/// Strategy for tax rates in [0, 1] with four decimal places
pub fn tax_rate_strategy() -> impl Strategy<Value = Rate> {
    (0i64..=10_000i64).prop_map(|n| Rate::new(Decimal::new(n, 4)))
}

/// Strategy for payment amounts (0.01 to 99,999.99)
pub fn payment_amount_strategy() -> impl Strategy<Value = Decimal> {
    unit_price_strategy()
}

/// Strategy for charge categories, including a custom one
pub fn charge_category_strategy() -> impl Strategy<Value = ChargeCategory> {
    prop_oneof![
        Just(ChargeCategory::Room),
        Just(ChargeCategory::Food),
        Just(ChargeCategory::Beverage),
        Just(ChargeCategory::Minibar),
        Just(ChargeCategory::Spa),
        Just(ChargeCategory::CityTax),
        "[a-z]{3,10}".prop_map(ChargeCategory::from),
    ]
}

/// Strategy for payment types
pub fn payment_type_strategy() -> impl Strategy<Value = PaymentType> {
    prop_oneof![
        Just(PaymentType::Prepayment),
        Just(PaymentType::Deposit),
        Just(PaymentType::Interim),
        Just(PaymentType::Final),
    ]
}

/// Line parameters of a charge, independent of any folio
#[derive(Debug, Clone)]
pub struct ChargeSpec {
    pub category: ChargeCategory,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: Rate,
}

impl ChargeSpec {
    /// Builds a `PostCharge` request for `folio_id`
    pub fn request(&self, folio_id: FolioId) -> PostCharge {
        PostCharge {
            folio_id,
            category: self.category.clone(),
            description: format!("{} charge", self.category),
            quantity: self.quantity,
            unit_price: self.unit_price,
            tax_rate: self.tax_rate,
        }
    }
}

/// Strategy for valid charge specifications
pub fn charge_spec_strategy() -> impl Strategy<Value = ChargeSpec> {
    (
        charge_category_strategy(),
        quantity_strategy(),
        unit_price_strategy(),
        tax_rate_strategy(),
    )
        .prop_map(|(category, quantity, unit_price, tax_rate)| ChargeSpec {
            category,
            quantity,
            unit_price,
            tax_rate,
        })
}

/// Strategy for a short run of charges
pub fn charge_specs_strategy(max: usize) -> impl Strategy<Value = Vec<ChargeSpec>> {
    proptest::collection::vec(charge_spec_strategy(), 1..=max)
}

/// Generates a customer with a realistic company name and contact details
pub fn fake_customer() -> CustomerInfo {
    CustomerInfo {
        name: CompanyName().fake(),
        tax_id: Some(format!("VAT{}", (100_000_000u32..999_999_999u32).fake::<u32>())),
        address: Some(StreetName().fake()),
        email: Some(SafeEmail().fake()),
    }
}

/// Generates a short charge description
pub fn fake_description() -> String {
    let words: Vec<String> = Words(2..4).fake();
    words.join(" ")
}
