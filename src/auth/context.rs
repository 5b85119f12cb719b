//! Request-scoped identity.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use http::request::Parts;

use crate::types::PrincipalHandle;

/// Who is calling, as established by the authentication gate.
///
/// Created at most once per request and immutable afterwards. Handlers take
/// it as an extractor argument; a request the gate never saw (or one that was
/// cancelled before the gate finished) reads as `Anonymous`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdentityContext {
    #[default]
    Anonymous,
    Authenticated { handle: PrincipalHandle },
}

impl IdentityContext {
    /// Context for a resolved principal.
    pub fn authenticated(handle: impl Into<PrincipalHandle>) -> Self {
        Self::Authenticated {
            handle: handle.into(),
        }
    }

    /// Check if this is an anonymous caller.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// Get the principal handle, if authenticated.
    pub fn handle(&self) -> Option<&PrincipalHandle> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated { handle } => Some(handle),
        }
    }

    /// Get a display-friendly name for this caller.
    pub fn display(&self) -> String {
        match self {
            Self::Anonymous => "Anonymous".to_string(),
            Self::Authenticated { handle } => handle.to_string(),
        }
    }
}

impl<S> FromRequestParts<S> for IdentityContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<IdentityContext>()
            .cloned()
            .unwrap_or_default())
    }
}
