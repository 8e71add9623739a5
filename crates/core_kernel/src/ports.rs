//! Port plumbing shared by the ledger and its adapters
//!
//! Domain crates declare the ports (ledger store, booking and housekeeping
//! collaborators); `infra_db` and the in-memory adapters implement them.
//! Every adapter reports failures as [`PortError`] and can be probed with
//! [`HealthCheckable`].
//!
//! ```text
//!   FolioService ──► LedgerStore / BookingPort / HousekeepingPort
//!                          ▲                      ▲
//!                  PostgreSQL adapters     in-memory adapters
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Failure reported by a port adapter
#[derive(Debug, Error)]
pub enum PortError {
    #[error("Not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    /// The adapter refused the input (constraint, foreign key, tenant scope)
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// A unique key is already taken, e.g. a second open folio of one type
    #[error("Already exists: {entity_type} {id}")]
    AlreadyExists { entity_type: String, id: String },

    /// A commit precondition no longer holds
    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// A collaborator (booking, housekeeping) did not answer
    #[error("Collaborator unavailable: {service}")]
    ServiceUnavailable { service: String },

    /// A stored row could not be mapped back to a domain type
    #[error("Transformation error: {message}")]
    Transformation { message: String },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
}

impl PortError {
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        PortError::Validation { message: message.into() }
    }

    pub fn already_exists(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::AlreadyExists {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        PortError::Conflict { message: message.into() }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        PortError::Connection {
            message: message.into(),
            source: None,
        }
    }

    pub fn unavailable(service: impl Into<String>) -> Self {
        PortError::ServiceUnavailable { service: service.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        PortError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// True for failures a caller may retry unchanged
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PortError::Connection { .. } | PortError::ServiceUnavailable { .. }
        )
    }

    /// True when an optimistic commit lost a race
    pub fn is_conflict(&self) -> bool {
        matches!(self, PortError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }
}

/// Marker for port traits: adapters are shared across tasks behind `Arc`
pub trait DomainPort: Send + Sync + 'static {}

/// Health of one adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterHealth {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

/// Outcome of probing an adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub adapter_id: String,
    pub status: AdapterHealth,
    pub latency_ms: u64,
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthCheckResult {
    pub fn healthy(adapter_id: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            status: AdapterHealth::Healthy,
            latency_ms,
            message: None,
            checked_at: Utc::now(),
        }
    }

    pub fn unhealthy(adapter_id: impl Into<String>, latency_ms: u64, message: impl Into<String>) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            status: AdapterHealth::Unhealthy,
            latency_ms,
            message: Some(message.into()),
            checked_at: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.status == AdapterHealth::Healthy
    }
}

/// Adapters that can report their own health
#[async_trait::async_trait]
pub trait HealthCheckable: Send + Sync {
    async fn health_check(&self) -> HealthCheckResult;
}

/// Who started an operation and which request it belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationMetadata {
    /// Request id propagated from the edge
    pub correlation_id: Option<String>,
    /// Actor id (front-desk user, night audit job)
    pub initiated_by: Option<String>,
}

impl OperationMetadata {
    pub fn initiated_by(mut self, actor: impl Into<String>) -> Self {
        self.initiated_by = Some(actor.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}
