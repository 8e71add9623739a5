//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for common ledger entities. These
//! fixtures are consistent and predictable, and mirror the reference stay
//! used throughout the test suite: a 150.00 room night at 18% VAT, a
//! 100.00 prepayment, and a two-line corporate invoice.

use core_kernel::{Currency, Money, Rate, TenantId};
use domain_folio::{
    Actor, AdditionalTax, ChargeCategory, CustomerInfo, InvoiceLineInput, Permission,
    RequestContext, WithholdingFraction,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Nightly room rate
    pub fn eur_room_rate() -> Money {
        Money::new(dec!(150.00), Currency::EUR)
    }

    /// Room night including 18% VAT
    pub fn eur_room_total() -> Money {
        Money::new(dec!(177.00), Currency::EUR)
    }

    /// Prepayment taken at check-in
    pub fn eur_prepayment() -> Money {
        Money::new(dec!(100.00), Currency::EUR)
    }
}

/// Fixture for tax rates
pub struct RateFixtures;

impl RateFixtures {
    /// Standard VAT rate used by the reference stay
    pub fn vat_18() -> Rate {
        Rate::new(dec!(0.18))
    }

    /// Accommodation levy applied as an additional tax
    pub fn levy_2() -> Rate {
        Rate::new(dec!(0.02))
    }

    /// VAT withholding share used on corporate invoices
    pub fn withholding_seven_tenths() -> WithholdingFraction {
        // "7/10" is a valid fraction
        WithholdingFraction::parse("7/10").unwrap()
    }
}

/// Fixture for string test data
pub struct StringFixtures;

impl StringFixtures {
    pub fn room_description() -> &'static str {
        "Room 101 - Deluxe King"
    }

    pub fn card_method() -> &'static str {
        "card"
    }

    pub fn clerk() -> &'static str {
        "frontdesk-1"
    }

    pub fn manager() -> &'static str {
        "duty-manager"
    }
}

/// Fixture for request contexts
pub struct ContextFixtures;

impl ContextFixtures {
    /// A front-desk clerk without elevated permissions
    pub fn clerk(tenant_id: TenantId) -> RequestContext {
        RequestContext::new(tenant_id, Actor::new(StringFixtures::clerk()))
    }

    /// A duty manager holding the override and admin permissions
    pub fn manager(tenant_id: TenantId) -> RequestContext {
        RequestContext::new(
            tenant_id,
            Actor::new(StringFixtures::manager())
                .with_permission(Permission::Override)
                .with_permission(Permission::Admin),
        )
    }
}

/// Fixture for invoice inputs
pub struct InvoiceFixtures;

impl InvoiceFixtures {
    pub fn customer() -> CustomerInfo {
        CustomerInfo {
            name: "Acme Travel Ltd".to_string(),
            tax_id: Some("TR1234567890".to_string()),
            address: Some("1 Harbour Road".to_string()),
            email: Some("ap@acme.example".to_string()),
        }
    }

    /// Accommodation line: 1 x 400 at 18% VAT plus a 2% levy
    pub fn accommodation_line() -> InvoiceLineInput {
        InvoiceLineInput {
            description: "Accommodation".to_string(),
            category: Some(ChargeCategory::Room),
            quantity: Decimal::ONE,
            unit_price: dec!(400),
            vat_rate: RateFixtures::vat_18(),
            additional_taxes: vec![AdditionalTax::Percentage {
                name: "accommodation levy".to_string(),
                rate: RateFixtures::levy_2(),
            }],
            withholding: None,
            source_charge_id: None,
        }
    }

    /// Services line: 1 x 150 at 18% VAT with 7/10 of the VAT withheld
    pub fn services_line() -> InvoiceLineInput {
        InvoiceLineInput {
            description: "Meeting room".to_string(),
            category: Some(ChargeCategory::Other("meeting_room".to_string())),
            quantity: Decimal::ONE,
            unit_price: dec!(150),
            vat_rate: RateFixtures::vat_18(),
            additional_taxes: Vec::new(),
            withholding: Some(RateFixtures::withholding_seven_tenths()),
            source_charge_id: None,
        }
    }

    /// Both lines of the reference corporate invoice
    ///
    /// Compiles to subtotal 550.00, VAT 99.00, additional taxes 8.00,
    /// withholding 18.90 and total 657.00.
    pub fn corporate_lines() -> Vec<InvoiceLineInput> {
        vec![Self::accommodation_line(), Self::services_line()]
    }
}
