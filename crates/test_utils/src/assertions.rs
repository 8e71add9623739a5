//! Custom Test Assertions
//!
//! Assertion helpers for ledger types whose failure messages name the
//! folio, the amounts and the error kind involved.

use core_kernel::Money;
use domain_folio::{BalanceCalculator, Charge, ErrorKind, Folio, FolioError, FolioStatus, Payment};
use rust_decimal::Decimal;

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(
        money.is_zero(),
        "Expected zero money, got {} {}",
        money.currency().symbol(),
        money.amount()
    );
}

/// Asserts that a result failed with an error of `kind`
///
/// # Panics
///
/// Panics if the result is `Ok` or fails with a different kind
pub fn assert_error_kind<T: std::fmt::Debug>(result: &Result<T, FolioError>, kind: ErrorKind) {
    match result {
        Ok(value) => panic!("Expected {:?} error, got Ok({:?})", kind, value),
        Err(error) => assert_eq!(
            error.kind(),
            kind,
            "Expected {:?} error, got {:?}: {}",
            kind,
            error.kind(),
            error
        ),
    }
}

/// Asserts that a folio is closed and records who closed it
pub fn assert_folio_closed(folio: &Folio) {
    assert_eq!(folio.status, FolioStatus::Closed, "Folio {} is still open", folio.folio_number);
    assert!(folio.closed_at.is_some(), "Closed folio {} has no closed_at", folio.folio_number);
    assert!(folio.closed_by.is_some(), "Closed folio {} has no closed_by", folio.folio_number);
}

/// Asserts the ledger invariant: balance equals the unvoided charge totals
/// minus the payments
///
/// # Panics
///
/// Panics if `balance` differs from the sum recomputed from the rows
pub fn assert_balance_invariant(folio: &Folio, charges: &[Charge], payments: &[Payment], balance: &Money) {
    let charged: Decimal = charges
        .iter()
        .filter(|c| c.folio_id == folio.id && !c.voided)
        .map(|c| c.total.amount())
        .sum();
    let paid: Decimal = payments
        .iter()
        .filter(|p| p.folio_id == folio.id)
        .map(|p| p.amount.amount())
        .sum();

    assert_eq!(
        balance.amount(),
        charged - paid,
        "Balance of {} ({}) != charges ({}) - payments ({})",
        folio.folio_number,
        balance.amount(),
        charged,
        paid
    );

    let recomputed = BalanceCalculator::compute(folio, charges, payments)
        .expect("Balance computation failed");
    assert_eq!(recomputed.amount(), balance.amount());
}
