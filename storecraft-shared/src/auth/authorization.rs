//! Role-based authorization for dashboard operations
//!
//! Two levels of checking:
//!
//! - [`require_permission`] trusts the role carried by the access token and
//!   costs nothing; used for ordinary reads and writes.
//! - [`require_current_role`] re-reads the membership from the database, so
//!   a demoted or removed user loses access before their token expires; used
//!   for store settings and destructive operations.
//!
//! # Example
//!
//! ```no_run
//! use storecraft_shared::auth::authorization::{require_permission, ResourcePermission};
//! use storecraft_shared::auth::middleware::AuthContext;
//!
//! fn update_product(auth: &AuthContext) -> Result<(), Box<dyn std::error::Error>> {
//!     require_permission(auth, ResourcePermission::Write)?;
//!     // ... perform the update
//!     Ok(())
//! }
//! ```

use sqlx::PgPool;
use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::membership::{Membership, MembershipRole};

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Not a member of store {0}")]
    NotMember(Uuid),

    #[error("Insufficient permissions: requires {} role, has {}", required.as_str(), actual.as_str())]
    InsufficientRole {
        required: MembershipRole,
        actual: MembershipRole,
    },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// What an operation does to store data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourcePermission {
    /// View catalog, orders, customers, notifications
    Read,

    /// Create and edit catalog entries, orders, customers
    Write,

    /// Store settings and deletions
    Manage,

    /// Deleting the store
    Own,
}

impl ResourcePermission {
    pub fn min_role(&self) -> MembershipRole {
        match self {
            ResourcePermission::Read => MembershipRole::Viewer,
            ResourcePermission::Write => MembershipRole::Staff,
            ResourcePermission::Manage => MembershipRole::Admin,
            ResourcePermission::Own => MembershipRole::Owner,
        }
    }
}

fn check_role(actual: MembershipRole, required: MembershipRole) -> Result<(), AuthzError> {
    if actual.has_permission(&required) {
        Ok(())
    } else {
        Err(AuthzError::InsufficientRole { required, actual })
    }
}

/// Checks the role carried by the session token
pub fn require_permission(
    auth: &AuthContext,
    permission: ResourcePermission,
) -> Result<(), AuthzError> {
    check_role(auth.role, permission.min_role())
}

/// Checks the user's role as currently stored
///
/// # Errors
///
/// - `AuthzError::NotMember` if the membership was removed
/// - `AuthzError::InsufficientRole` if the current role is too low
pub async fn require_current_role(
    pool: &PgPool,
    auth: &AuthContext,
    permission: ResourcePermission,
) -> Result<MembershipRole, AuthzError> {
    let role = Membership::get_role(pool, auth.tenant_id, auth.user_id)
        .await?
        .ok_or(AuthzError::NotMember(auth.tenant_id))?;

    check_role(role, permission.min_role())?;

    Ok(role)
}
