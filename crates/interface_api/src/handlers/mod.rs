//! Request handlers

pub mod audit;
pub mod folio;
pub mod health;
pub mod invoice;
pub mod ledger;
