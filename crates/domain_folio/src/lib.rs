//! Folio Domain - Charge & Payment Ledger
//!
//! This crate implements the folio ledger of a multi-tenant hotel
//! property-management system: the guest or company sub-account that
//! accumulates itemized charges and payments during a stay and must reconcile
//! to a verifiable balance before the stay can be closed.
//!
//! # Components
//!
//! - **Folio Manager**: opens, closes and reopens folios; one open folio per
//!   type per booking
//! - **Charge Ledger**: append-only itemized charges with void marking
//! - **Payment Ledger**: append-only payments; refunds are negative adjustments
//! - **Balance Calculator**: Σ(unvoided charge totals) − Σ(payments), always
//!   recomputed
//! - **Transfer Engine**: all-or-nothing reassignment of charges between folios
//! - **Checkout Settlement Guard**: closes every folio of a booking once all
//!   balances are settled
//! - **Invoice Compiler**: frozen invoice snapshots with VAT, additional taxes
//!   and VAT withholding
//! - **Audit Log**: an entry for every mutation, committed atomically with it
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_folio::{FolioService, LedgerRequest, RequestContext};
//!
//! let service = FolioService::new(store, bookings, housekeeping, LedgerConfig::default());
//! let ctx = RequestContext::new(tenant_id, Actor::new("frontdesk-1"));
//!
//! let request: LedgerRequest = serde_json::from_str(body)?;
//! let response = service.handle(&ctx, request).await?;
//! ```

pub mod audit;
pub mod balance;
pub mod charge;
pub mod config;
pub mod context;
pub mod error;
pub mod folio;
pub mod invoice;
pub mod ledger;
pub mod manager;
pub mod memory;
pub mod payment;
pub mod ports;
pub mod requests;
pub mod service;
pub mod settlement;
pub mod transfer;

pub use audit::{AuditAction, AuditEntry, AuditQuery, EntityType};
pub use balance::{BalanceBreakdown, BalanceCalculator};
pub use charge::{Charge, ChargeAmounts, ChargeCategory};
pub use config::LedgerConfig;
pub use context::{Actor, Permission, RequestContext};
pub use error::{ChargeRejection, ChargeRejectionReason, ErrorKind, FolioError, OutstandingFolio};
pub use folio::{format_folio_number, Folio, FolioStatus, FolioType};
pub use invoice::{
    format_invoice_number, AdditionalTax, AppliedTax, CustomerInfo, Invoice, InvoiceLine,
    InvoiceLineInput, InvoiceSource, InvoiceStatus, WithholdingFraction,
};
pub use memory::{InMemoryLedgerStore, MockBookingPort, MockHousekeepingPort};
pub use payment::{Payment, PaymentType};
pub use ports::{BookingPort, ChangeSet, HousekeepingPort, LedgerStore, LedgerWrite, Precondition, SequenceKind};
pub use requests::{
    CloseFolio, CompileInvoice, CreateFolio, FolioStatement, GetFolio, InvoiceRef, LedgerRequest,
    LedgerResponse, ListFolios, PostAdjustment, PostCharge, PostPayment, ReopenFolio,
    SettleAndClose, TransferCharges, VoidCharge,
};
pub use service::FolioService;
pub use settlement::{FolioBalance, SettlementOutcome};
pub use transfer::TransferRecord;
