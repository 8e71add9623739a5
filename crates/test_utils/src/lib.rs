//! Shared helpers for the folio ledger test suites
//!
//! `builders` assembles a `FolioService` over the in-memory store together
//! with request builders for charges and payments. `database` starts a
//! PostgreSQL container for the `#[ignore]`d adapter tests. `fixtures`
//! and `generators` supply hotel figures, fixed and random, and
//! `assertions` checks balances and folio state with readable failures.

pub mod assertions;
pub mod builders;
pub mod database;
pub mod fixtures;
pub mod generators;

pub use assertions::*;
pub use builders::*;
pub use database::*;
pub use fixtures::*;
pub use generators::*;
