//! Typed ledger identifiers
//!
//! Every entity id wraps a UUID; the wrapper type keeps a `ChargeId` from
//! being passed where a `FolioId` is expected. Ids render as `FOL-<uuid>`
//! in logs and error messages but serialize as the bare UUID.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

macro_rules! ledger_ids {
    ($($(#[$doc:meta])* $name:ident => $prefix:literal;)+) => {$(
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Random (v4) id
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Time-ordered (v7) id; ledger rows use these so that insertion
            /// order and id order agree
            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            pub fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }

        /// Accepts `FOL-<uuid>` style text or a bare UUID, never another
        /// type's prefix
        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                match Uuid::parse_str(raw) {
                    Ok(uuid) => Ok(Self(uuid)),
                    Err(_) => Err(CoreError::invalid_identifier(stringify!($name), s)),
                }
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    )+};
}

ledger_ids! {
    /// Property (hotel) owning the data; every query is scoped by it
    TenantId => "TEN";
    /// Reservation held by the booking system
    BookingId => "BKG";
    /// Guest or company a folio is addressed to
    PartyId => "PTY";
    FolioId => "FOL";
    ChargeId => "CHG";
    PaymentId => "PAY";
    /// One charge move between folios
    TransferId => "TRF";
    InvoiceId => "INV";
    AuditEntryId => "AUD";
}
