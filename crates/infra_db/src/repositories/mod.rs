//! Repository implementations for the folio ledger
//!
//! Repositories encapsulate SQL queries and map between database rows and
//! domain types.
//!
//! # Architecture
//!
//! Each repository follows these principles:
//! - Every read is scoped by tenant
//! - Runtime-checked queries with `FromRow` row types
//! - Writes take a `PgConnection` so callers control the transaction
//! - Row locks are taken in id order to avoid deadlocks

pub mod folio;
pub mod stay;

pub use folio::FolioRepository;
pub use stay::StayRepository;
