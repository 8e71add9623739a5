//! Core Kernel - Foundational types for the folio ledger
//!
//! This crate provides the building blocks shared by every layer of the
//! property-management ledger:
//! - Money types with precise decimal arithmetic and commercial rounding
//! - Rates (tax, withholding) parsed from decimals, percentages or ratios
//! - Strongly-typed identifiers for tenants, bookings, folios and ledger rows
//! - Port infrastructure for swappable persistence and collaborator adapters

pub mod money;
pub mod identifiers;
pub mod error;
pub mod ports;

pub use money::{Money, Currency, MoneyError, Rate};
pub use identifiers::{
    TenantId, BookingId, PartyId, FolioId, ChargeId, PaymentId,
    TransferId, InvoiceId, AuditEntryId,
};
pub use error::CoreError;
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth,
    OperationMetadata,
};
