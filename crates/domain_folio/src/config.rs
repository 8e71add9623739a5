//! Ledger configuration

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use core_kernel::{CoreError, Currency};

/// Tunables for the folio ledger
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Currency new folios are opened in
    #[serde(default = "default_currency")]
    pub currency: Currency,
    /// Largest absolute balance still considered settled
    #[serde(default = "default_settlement_tolerance")]
    pub settlement_tolerance: Decimal,
    /// Automatic retries after an optimistic-lock conflict
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
}

fn default_currency() -> Currency {
    Currency::EUR
}

fn default_settlement_tolerance() -> Decimal {
    dec!(0.01)
}

fn default_max_conflict_retries() -> u32 {
    1
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            settlement_tolerance: default_settlement_tolerance(),
            max_conflict_retries: default_max_conflict_retries(),
        }
    }
}

impl LedgerConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` for a negative tolerance or an
    /// unbounded retry budget
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.settlement_tolerance < Decimal::ZERO {
            return Err(CoreError::Configuration(format!(
                "settlement_tolerance must not be negative, got {}",
                self.settlement_tolerance
            )));
        }
        if self.max_conflict_retries > 10 {
            return Err(CoreError::Configuration(format!(
                "max_conflict_retries must be at most 10, got {}",
                self.max_conflict_retries
            )));
        }
        Ok(())
    }
}
