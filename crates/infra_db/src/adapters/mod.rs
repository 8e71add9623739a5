//! Port Adapters
//!
//! This module provides adapter implementations for the folio domain ports,
//! connecting them to the PostgreSQL database layer.
//!
//! # Architecture
//!
//! Each adapter:
//! - Implements one or more of the domain's port traits
//! - Translates between domain models and database row types
//! - Uses the repository layer for database operations
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::{PostgresLedgerStore, PostgresStayAdapter};
//! use domain_folio::LedgerStore;
//!
//! let store = PostgresLedgerStore::new(pool.clone());
//! let stays = PostgresStayAdapter::new(pool);
//! let folio = store.get_folio(tenant_id, folio_id).await?;
//! ```

pub mod ledger;
pub mod stay;

pub use ledger::PostgresLedgerStore;
pub use stay::PostgresStayAdapter;
