//! Property-based tests for ledger invariants

use proptest::prelude::*;
use rust_decimal::Decimal;

use core_kernel::{BookingId, Currency, Money, PartyId, Rate, TenantId};

use domain_folio::{
    format_folio_number, BalanceCalculator, Charge, ChargeCategory, Folio, FolioType, InvoiceLine,
    InvoiceLineInput, Payment, PaymentType,
};
use test_utils::{
    charge_specs_strategy, currency_strategy, payment_amount_strategy, payment_type_strategy,
    tax_rate_strategy,
};

fn folio() -> Folio {
    Folio::open(
        TenantId::new(),
        BookingId::new(),
        FolioType::Guest,
        PartyId::new(),
        format_folio_number(2026, 1),
        Currency::EUR,
    )
}

fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..5_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..20i64).prop_map(Decimal::from)
}

proptest! {
    #[test]
    fn balance_is_unvoided_charges_minus_payments(
        lines in prop::collection::vec((quantity_strategy(), amount_strategy(), tax_rate_strategy(), any::<bool>()), 0..15),
        payments in prop::collection::vec(1i64..1_000_000i64, 0..8),
    ) {
        let folio = folio();
        let mut charges = Vec::new();
        let mut expected = Decimal::ZERO;
        for (quantity, unit_price, rate, voided) in lines {
            let mut charge = Charge::post(&folio, ChargeCategory::Food, "Dinner", quantity, unit_price, rate, "pos").unwrap();
            if voided {
                charge.void("returned", "pos").unwrap();
            } else {
                expected += charge.total.amount();
            }
            charges.push(charge);
        }
        let posted: Vec<Payment> = payments
            .into_iter()
            .map(|cents| Payment::post(&folio, Decimal::new(cents, 2), "card", PaymentType::Interim, None, "fd").unwrap())
            .collect();
        for payment in &posted {
            expected -= payment.amount.amount();
        }

        let balance = BalanceCalculator::compute(&folio, &charges, &posted).unwrap();
        prop_assert_eq!(balance.amount(), expected);
    }

    #[test]
    fn balance_stays_in_folio_currency(
        currency in currency_strategy(),
        specs in charge_specs_strategy(8),
        paid in payment_amount_strategy(),
        payment_type in payment_type_strategy(),
    ) {
        let mut folio = folio();
        folio.currency = currency;
        let charges: Vec<Charge> = specs
            .iter()
            .map(|spec| {
                let request = spec.request(folio.id);
                Charge::post(
                    &folio,
                    request.category,
                    &request.description,
                    request.quantity,
                    request.unit_price,
                    request.tax_rate,
                    "pos",
                )
                .unwrap()
            })
            .collect();
        let payment = Payment::post(&folio, paid, "card", payment_type, None, "fd").unwrap();

        let charged = Money::checked_sum(currency, charges.iter().map(|c| &c.total)).unwrap();
        let balance = BalanceCalculator::compute(&folio, &charges, std::slice::from_ref(&payment)).unwrap();
        prop_assert_eq!(balance.currency(), currency);
        prop_assert_eq!(balance, charged.checked_sub(&payment.amount).unwrap());
    }

    #[test]
    fn charge_total_is_amount_plus_tax(
        quantity in quantity_strategy(),
        unit_price in amount_strategy(),
        rate in tax_rate_strategy(),
    ) {
        let charge = Charge::post(&folio(), ChargeCategory::Spa, "Massage", quantity, unit_price, rate, "spa").unwrap();
        prop_assert_eq!(charge.total, charge.amount.checked_add(&charge.tax_amount).unwrap());
        prop_assert_eq!(charge.amount.round_to_currency(), charge.amount);
        prop_assert_eq!(charge.tax_amount.round_to_currency(), charge.tax_amount);
    }

    #[test]
    fn second_void_never_changes_balance(unit_price in amount_strategy()) {
        let folio = folio();
        let mut charge = Charge::post(&folio, ChargeCategory::Room, "Room", Decimal::ONE, unit_price, Rate::ZERO, "fd").unwrap();
        charge.void("first", "fd").unwrap();
        let before = BalanceCalculator::compute(&folio, std::slice::from_ref(&charge), &[]).unwrap();

        prop_assert!(charge.void("second", "fd").is_err());
        let after = BalanceCalculator::compute(&folio, std::slice::from_ref(&charge), &[]).unwrap();
        prop_assert_eq!(before, after);
        prop_assert!(after.is_zero());
    }

    #[test]
    fn transfer_round_trip_restores_balances(
        amounts in prop::collection::vec(amount_strategy(), 1..10),
        selector in prop::collection::vec(any::<bool>(), 10),
    ) {
        let from = folio();
        let mut to = folio();
        to.booking_id = from.booking_id;

        let mut charges: Vec<Charge> = amounts
            .iter()
            .map(|price| Charge::post(&from, ChargeCategory::Minibar, "Snack", Decimal::ONE, *price, Rate::ZERO, "hk").unwrap())
            .collect();
        let balances = |charges: &[Charge]| -> (Money, Money) {
            (
                BalanceCalculator::compute(&from, charges, &[]).unwrap(),
                BalanceCalculator::compute(&to, charges, &[]).unwrap(),
            )
        };
        let original = balances(&charges);

        for (charge, moved) in charges.iter_mut().zip(&selector) {
            if *moved {
                charge.folio_id = to.id;
            }
        }
        let (moved_from, moved_to) = balances(&charges);
        prop_assert_eq!(moved_from.checked_add(&moved_to).unwrap(), original.0);

        for charge in charges.iter_mut() {
            charge.folio_id = from.id;
        }
        prop_assert_eq!(balances(&charges), original);
    }

    #[test]
    fn invoice_line_total_ignores_withholding(
        unit_price in amount_strategy(),
        vat in tax_rate_strategy(),
        withheld in 0i64..=10i64,
    ) {
        let input = InvoiceLineInput {
            description: "Banquet".to_string(),
            category: None,
            quantity: Decimal::ONE,
            unit_price,
            vat_rate: vat,
            additional_taxes: Vec::new(),
            withholding: Some(domain_folio::WithholdingFraction::parse(&format!("{}/10", withheld)).unwrap()),
            source_charge_id: None,
        };
        let line = InvoiceLine::compute(&input, Currency::EUR).unwrap();
        prop_assert_eq!(line.total, line.net.checked_add(&line.vat).unwrap());
        prop_assert!(line.withholding.amount() <= line.vat.amount());
    }
}
