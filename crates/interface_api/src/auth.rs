//! Authentication and authorization
//!
//! Bearer tokens carry the actor (`sub`), the tenant and the actor's roles.
//! Roles are translated into ledger permissions when the request context is
//! built; the ledger itself decides which operations need them.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind as JwtErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use core_kernel::TenantId;
use domain_folio::{Actor, Permission, RequestContext};

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Tenant the user acts in
    pub tenant_id: TenantId,
    /// User's roles
    pub roles: Vec<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

impl Claims {
    /// Builds the actor, granting permissions for the user's roles
    pub fn actor(&self) -> Actor {
        self.roles
            .iter()
            .flat_map(|role| permissions_for_role(role))
            .fold(Actor::new(self.sub.clone()), |actor, permission| {
                actor.with_permission(permission)
            })
    }

    /// Builds the request context for a ledger call
    pub fn request_context(&self) -> RequestContext {
        RequestContext::new(self.tenant_id, self.actor())
    }
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
}

/// Creates a new JWT token
///
/// # Arguments
///
/// * `user_id` - User identifier
/// * `tenant_id` - Tenant the token is scoped to
/// * `roles` - User's roles
/// * `secret` - JWT secret key
/// * `expiration_secs` - Token validity in seconds
pub fn create_token(
    user_id: &str,
    tenant_id: TenantId,
    roles: Vec<String>,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: user_id.to_string(),
        tenant_id,
        roles,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
///
/// # Arguments
///
/// * `token` - The JWT token to validate
/// * `secret` - JWT secret key
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        JwtErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// Ledger permissions granted by a role
pub fn permissions_for_role(role: &str) -> Vec<Permission> {
    match role {
        roles::ADMIN => vec![Permission::Override, Permission::Admin],
        roles::FOLIO_OVERRIDE => vec![Permission::Override],
        roles::FOLIO_ADMIN => vec![Permission::Admin],
        _ => Vec::new(),
    }
}

/// Role names
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const FOLIO_OVERRIDE: &str = "folio:override";
    pub const FOLIO_ADMIN: &str = "folio:admin";
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_token_round_trip() {
        let tenant_id = TenantId::new();
        let token = create_token("frontdesk-1", tenant_id, vec![roles::FOLIO_OVERRIDE.to_string()], SECRET, 60).unwrap();
        let claims = validate_token(&token, SECRET).unwrap();

        assert_eq!(claims.sub, "frontdesk-1");
        assert_eq!(claims.tenant_id, tenant_id);
        let ctx = claims.request_context();
        assert_eq!(ctx.tenant_id, tenant_id);
        assert!(ctx.actor.has(Permission::Override));
        assert!(!ctx.actor.has(Permission::Admin));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_token("u", TenantId::new(), vec![], SECRET, 60).unwrap();
        assert!(matches!(validate_token(&token, "other"), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_admin_role_implies_both_permissions() {
        let permissions = permissions_for_role(roles::ADMIN);
        assert!(permissions.contains(&Permission::Override));
        assert!(permissions.contains(&Permission::Admin));
        assert!(permissions_for_role("housekeeping").is_empty());
    }

    #[test]
    fn test_expired_token() {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "u".to_string(),
            tenant_id: TenantId::new(),
            roles: vec![],
            exp: now - 3600,
            iat: now - 7200,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(AuthError::TokenExpired)));
    }
}
