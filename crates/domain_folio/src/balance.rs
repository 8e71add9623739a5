//! Balance calculation
//!
//! The balance is never stored. It is derived from the two ledgers every time
//! it is needed: Σ(total of unvoided charges) − Σ(payment amounts).

use serde::{Deserialize, Serialize};

use core_kernel::Money;

use crate::charge::Charge;
use crate::error::FolioError;
use crate::folio::Folio;
use crate::payment::Payment;

/// Balance components of a folio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceBreakdown {
    /// Sum of unvoided charge totals
    pub charges: Money,
    /// Sum of voided charge totals (informational)
    pub voided: Money,
    /// Sum of payments
    pub payments: Money,
    /// charges - payments
    pub balance: Money,
}

/// Pure balance calculator
pub struct BalanceCalculator;

impl BalanceCalculator {
    /// Computes the balance of `folio` from its ledger rows
    ///
    /// Rows belonging to other folios are ignored.
    ///
    /// # Errors
    ///
    /// Returns `Calculation` if a row is in a different currency
    pub fn compute(
        folio: &Folio,
        charges: &[Charge],
        payments: &[Payment],
    ) -> Result<Money, FolioError> {
        Ok(Self::breakdown(folio, charges, payments)?.balance)
    }

    /// Computes the full breakdown of `folio`'s balance
    pub fn breakdown(
        folio: &Folio,
        charges: &[Charge],
        payments: &[Payment],
    ) -> Result<BalanceBreakdown, FolioError> {
        let own_charges = || charges.iter().filter(|c| c.folio_id == folio.id);

        let charged = Money::checked_sum(
            folio.currency,
            own_charges().filter_map(Charge::effective_total),
        )?;
        let voided = Money::checked_sum(
            folio.currency,
            own_charges().filter(|c| c.voided).map(|c| &c.total),
        )?;
        let paid = Money::checked_sum(
            folio.currency,
            payments.iter().filter(|p| p.folio_id == folio.id).map(|p| &p.amount),
        )?;

        Ok(BalanceBreakdown {
            charges: charged,
            voided,
            payments: paid,
            balance: charged.checked_sub(&paid)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charge::ChargeCategory;
    use crate::folio::{format_folio_number, FolioType};
    use crate::payment::PaymentType;
    use core_kernel::{BookingId, Currency, PartyId, Rate, TenantId};
    use rust_decimal_macros::dec;

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

    #[test]
    fn test_empty_folio_has_zero_balance() {
        let balance = BalanceCalculator::compute(&folio(), &[], &[]).unwrap();
        assert!(balance.is_zero());
    }

    #[test]
    fn test_voided_charges_excluded() {
        let folio = folio();
        let room = Charge::post(&folio, ChargeCategory::Room, "Room", dec!(1), dec!(150), Rate::new(dec!(0.18)), "fd").unwrap();
        let mut minibar = Charge::post(&folio, ChargeCategory::Minibar, "Water", dec!(2), dec!(4), Rate::ZERO, "hk").unwrap();
        minibar.void("guest did not consume", "fd").unwrap();
        let prepayment = Payment::post(&folio, dec!(100), "card", PaymentType::Prepayment, None, "fd").unwrap();

        let breakdown = BalanceCalculator::breakdown(&folio, &[room, minibar], &[prepayment]).unwrap();
        assert_eq!(breakdown.charges.amount(), dec!(177.00));
        assert_eq!(breakdown.voided.amount(), dec!(8));
        assert_eq!(breakdown.payments.amount(), dec!(100));
        assert_eq!(breakdown.balance.amount(), dec!(77.00));
    }

    #[test]
    fn test_other_folio_rows_ignored() {
        let mine = folio();
        let theirs = folio();
        let foreign = Charge::post(&theirs, ChargeCategory::Spa, "Massage", dec!(1), dec!(80), Rate::ZERO, "spa").unwrap();

        let balance = BalanceCalculator::compute(&mine, &[foreign], &[]).unwrap();
        assert!(balance.is_zero());
    }
}
