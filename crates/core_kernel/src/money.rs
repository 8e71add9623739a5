//! Money and rates
//!
//! Folio figures are `Money` values backed by `rust_decimal`. Every posted
//! charge, tax amount and invoice line is rounded to the currency's minor
//! units, half away from zero. Amounts of different currencies never mix:
//! sums and differences go through the checked operations.

use std::fmt;
use std::ops::Neg;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// ISO 4217 currencies a property may bill in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    EUR,
    USD,
    GBP,
    CHF,
    TRY,
    JPY,
}

impl Currency {
    pub const ALL: [Currency; 6] = [
        Currency::EUR,
        Currency::USD,
        Currency::GBP,
        Currency::CHF,
        Currency::TRY,
        Currency::JPY,
    ];

    /// Minor-unit digits
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::EUR => "€",
            Currency::USD => "$",
            Currency::GBP => "£",
            Currency::CHF => "CHF",
            Currency::TRY => "₺",
            Currency::JPY => "¥",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Currency::EUR => "EUR",
            Currency::USD => "USD",
            Currency::GBP => "GBP",
            Currency::CHF => "CHF",
            Currency::TRY => "TRY",
            Currency::JPY => "JPY",
        }
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Currency::ALL
            .into_iter()
            .find(|currency| currency.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| MoneyError::UnknownCurrency(code.to_string()))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Currency mismatch: cannot operate on {0} and {1}")]
    CurrencyMismatch(String, String),

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Invalid rate: {0}")]
    InvalidRate(String),

    #[error("Rate denominator is zero")]
    ZeroDenominator,

    #[error("Amount out of range: {0}")]
    Overflow(String),
}

/// An amount in one currency
///
/// Kept at the precision it was given; only `round_to_currency` rounds, so
/// quantity × unit price is rounded exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self::new(self.amount.abs(), self.currency)
    }

    /// Commercial rounding to the currency's minor units
    pub fn round_to_currency(&self) -> Self {
        Self {
            amount: self.amount.round_dp_with_strategy(
                self.currency.decimal_places(),
                RoundingStrategy::MidpointAwayFromZero,
            ),
            currency: self.currency,
        }
    }

    /// |amount| <= tolerance
    pub fn is_within(&self, tolerance: Decimal) -> bool {
        self.amount.abs() <= tolerance
    }

    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency(other)?;
        self.amount
            .checked_add(other.amount)
            .map(|amount| Self::new(amount, self.currency))
            .ok_or_else(|| MoneyError::Overflow(format!("{} + {}", self.amount, other.amount)))
    }

    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency(other)?;
        self.amount
            .checked_sub(other.amount)
            .map(|amount| Self::new(amount, self.currency))
            .ok_or_else(|| MoneyError::Overflow(format!("{} - {}", self.amount, other.amount)))
    }

    /// Sums `values` starting from zero in `currency`
    pub fn checked_sum<'a>(
        currency: Currency,
        values: impl IntoIterator<Item = &'a Money>,
    ) -> Result<Money, MoneyError> {
        values
            .into_iter()
            .try_fold(Money::zero(currency), |total, value| total.checked_add(value))
    }

    /// Unrounded product, e.g. quantity × unit price
    pub fn multiply(&self, factor: Decimal) -> Result<Money, MoneyError> {
        self.amount
            .checked_mul(factor)
            .map(|amount| Self::new(amount, self.currency))
            .ok_or_else(|| MoneyError::Overflow(format!("{} × {}", self.amount, factor)))
    }

    fn same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency == other.currency {
            Ok(())
        } else {
            Err(MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                other.currency.to_string(),
            ))
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.dp$}",
            self.currency.symbol(),
            self.amount,
            dp = self.currency.decimal_places() as usize
        )
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.amount, self.currency)
    }
}

/// A tax rate or withholding fraction
///
/// Parses from a decimal ("0.18"), a percentage ("18%") or a ratio ("7/10");
/// withholding fractions are quoted as ratios on invoices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate {
    value: Decimal,
}

impl Rate {
    pub const ZERO: Rate = Rate { value: Decimal::ZERO };

    pub fn new(value: Decimal) -> Self {
        Self { value }
    }

    pub fn from_percentage(percentage: Decimal) -> Self {
        Self {
            value: percentage / dec!(100),
        }
    }

    pub fn from_ratio(numerator: Decimal, denominator: Decimal) -> Result<Self, MoneyError> {
        if denominator.is_zero() {
            return Err(MoneyError::ZeroDenominator);
        }
        numerator
            .checked_div(denominator)
            .map(Self::new)
            .ok_or_else(|| MoneyError::Overflow(format!("{}/{}", numerator, denominator)))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.value
    }

    pub fn as_percentage(&self) -> Decimal {
        self.value.saturating_mul(dec!(100))
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// 0 <= rate <= 1
    pub fn is_fraction(&self) -> bool {
        self.value >= Decimal::ZERO && self.value <= Decimal::ONE
    }

    /// Unrounded share of `money`
    pub fn apply(&self, money: &Money) -> Result<Money, MoneyError> {
        money.multiply(self.value)
    }

    /// Share of `money` rounded to minor units
    pub fn apply_rounded(&self, money: &Money) -> Result<Money, MoneyError> {
        Ok(self.apply(money)?.round_to_currency())
    }
}

impl FromStr for Rate {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parse = |part: &str| {
            Decimal::from_str(part.trim()).map_err(|_| MoneyError::InvalidRate(s.to_string()))
        };

        match (s.split_once('/'), s.strip_suffix('%')) {
            (Some((numerator, denominator)), _) => Rate::from_ratio(parse(numerator)?, parse(denominator)?),
            (None, Some(percentage)) => Ok(Rate::from_percentage(parse(percentage)?)),
            (None, None) => Ok(Rate::new(parse(s)?)),
        }
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percentage().round_dp(4).normalize())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn rounding_to_currency_is_idempotent(
            amount in -1_000_000_000i64..1_000_000_000i64,
        ) {
            let money = Money::new(Decimal::new(amount, 4), Currency::EUR);
            let once = money.round_to_currency();
            prop_assert_eq!(once.round_to_currency(), once);
            prop_assert!((once.amount() - money.amount()).abs() <= dec!(0.005));
        }

        #[test]
        fn checked_sum_matches_decimal_sum(
            cents in prop::collection::vec(-1_000_000i64..1_000_000i64, 0..20)
        ) {
            let values: Vec<Money> = cents.iter().map(|c| Money::new(Decimal::new(*c, 2), Currency::EUR)).collect();
            let expected: Decimal = cents.iter().map(|c| Decimal::new(*c, 2)).sum();
            prop_assert_eq!(Money::checked_sum(Currency::EUR, values.iter()).unwrap().amount(), expected);
        }
    }
}
