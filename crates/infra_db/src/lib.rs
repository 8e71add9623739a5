//! Infrastructure Database Layer
//!
//! This crate provides the PostgreSQL persistence for the folio ledger using
//! SQLx: connection pooling, the schema, repositories, and the adapters that
//! implement the domain's ports.
//!
//! # Architecture
//!
//! The crate follows the repository pattern, providing data access abstractions
//! that hide the database implementation details from the domain layer.
//!
//! # Atomic commits
//!
//! The domain hands every mutation to the store as one change set. The
//! ledger adapter applies it in a single transaction with row locks, so a
//! posting, its folio version bump and its audit entry land together or not
//! at all.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{apply_schema, create_pool, DatabaseConfig, PostgresLedgerStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/folio_ledger")).await?;
//! apply_schema(&pool).await?;
//! let store = PostgresLedgerStore::new(pool);
//! ```

pub mod adapters;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::{PostgresLedgerStore, PostgresStayAdapter};
pub use error::DatabaseError;
pub use pool::{
    apply_schema, create_pool, DatabaseConfig, DatabasePool, DEFAULT_DATABASE_URL, SCHEMA_SQL,
};
pub use repositories::{FolioRepository, StayRepository};
