//! Owner-only mutation checks.

use std::fmt;

use tracing::{error, warn};

use crate::auth::context::IdentityContext;

/// A resource that records which principal owns it.
pub trait OwnableResource {
    /// Login handle of the owner, or `None` when the record is inconsistent.
    fn owner_handle(&self) -> Option<&str>;

    /// Short label used in log lines, e.g. `article:3f2a…`.
    fn resource_label(&self) -> String;
}

/// Why a mutation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthzError {
    /// No identity on the request
    Unauthenticated,
    /// The resource has no recorded owner (data integrity fault)
    NoOwner,
    /// The caller is not the owner
    NotOwner,
}

impl fmt::Display for AuthzError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "Authentication required"),
            Self::NoOwner => write!(f, "Resource has no recorded owner"),
            Self::NotOwner => write!(f, "Only the owner may modify this resource"),
        }
    }
}

impl std::error::Error for AuthzError {}

/// Decides whether the caller may modify or delete a resource.
///
/// Pure with respect to its inputs apart from logging. Must run after the
/// resource is loaded and before any write.
pub struct OwnershipGuard;

impl OwnershipGuard {
    /// Allow the mutation only when the caller owns the resource.
    ///
    /// Handles compare exactly, with no case folding or trimming.
    pub fn authorize<R>(resource: &R, ctx: &IdentityContext) -> Result<(), AuthzError>
    where
        R: OwnableResource + ?Sized,
    {
        let Some(caller) = ctx.handle() else {
            return Err(AuthzError::Unauthenticated);
        };

        let Some(owner) = resource.owner_handle() else {
            error!(
                resource = %resource.resource_label(),
                "Resource has no owner; refusing mutation"
            );
            return Err(AuthzError::NoOwner);
        };

        if owner != caller.as_str() {
            warn!(
                resource = %resource.resource_label(),
                owner = %owner,
                caller = %caller,
                "Mutation refused: caller is not the owner"
            );
            return Err(AuthzError::NotOwner);
        }

        Ok(())
    }

    /// Non-logging variant for presentation hints such as `canEdit`.
    pub fn is_owner<R>(resource: &R, ctx: &IdentityContext) -> bool
    where
        R: OwnableResource + ?Sized,
    {
        match (ctx.handle(), resource.owner_handle()) {
            (Some(caller), Some(owner)) => owner == caller.as_str(),
            _ => false,
        }
    }
}
