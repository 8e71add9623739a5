//! Request context
//!
//! Every operation runs on behalf of an actor inside exactly one tenant.
//! The context is built by the interface layer from authenticated claims.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use core_kernel::{OperationMetadata, TenantId};

use crate::error::FolioError;

/// Elevated permissions checked by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Force-close or force-settle folios with outstanding balances
    Override,
    /// Reopen closed folios
    Admin,
}

/// The user or system performing an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub permissions: BTreeSet<Permission>,
}

impl Actor {
    /// Creates an actor with no elevated permissions
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            permissions: BTreeSet::new(),
        }
    }

    /// Grants a permission
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.insert(permission);
        self
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Fails with `Permission` unless the actor holds `permission`
    pub fn require(&self, permission: Permission, action: &str) -> Result<(), FolioError> {
        if self.has(permission) {
            Ok(())
        } else {
            Err(FolioError::Permission(format!(
                "{} requires the {:?} permission",
                action, permission
            )))
        }
    }
}

/// Tenant, actor and tracing metadata for one operation
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub tenant_id: TenantId,
    pub actor: Actor,
    pub metadata: OperationMetadata,
}

impl RequestContext {
    pub fn new(tenant_id: TenantId, actor: Actor) -> Self {
        let metadata = OperationMetadata::default().initiated_by(actor.id.clone());
        Self {
            tenant_id,
            actor,
            metadata,
        }
    }

    /// Attaches a correlation id for log correlation
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.metadata.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn actor_id(&self) -> &str {
        &self.actor.id
    }
}
