//! Authentication and ownership module.
//!
//! Identity is established once per request by the [`AuthGate`] middleware
//! and read by handlers as an [`IdentityContext`] extractor:
//!
//! - **Bearer token**: an HS256 JWT issued by [`TokenService`] at login
//! - **Anonymous**: no header, a bad token, or an unknown principal
//!
//! ## Security Model
//!
//! - The gate never rejects a request; it only decides who the caller is
//! - Reads are open to everyone
//! - Creating content requires an authenticated caller
//! - Updating or deleting content requires the caller to be its owner,
//!   enforced by [`OwnershipGuard`] after the resource is loaded and before
//!   any write
//!
//! ## Usage
//!
//! ```ignore
//! let router = Router::new()
//!     .route("/api/articles/{id}", put(update_article))
//!     .layer(middleware::from_fn_with_state(gate, authenticate::<UserStore>));
//!
//! async fn update_article(ctx: IdentityContext, /* ... */) -> Result<_, ApiError> {
//!     let article = load(&id).await?;
//!     OwnershipGuard::authorize(&article, &ctx)?;
//!     // write
//! }
//! ```

mod context;
mod gate;
mod ownership;
mod password;
mod token;
mod user_store;

pub use context::IdentityContext;
pub use gate::{AuthGate, BEARER_PREFIX, authenticate};
pub use ownership::{AuthzError, OwnableResource, OwnershipGuard};
pub use password::{Argon2Params, hash_password, verify_password};
pub use token::{Clock, IssuedToken, SystemClock, TOKEN_TTL_HOURS, TokenClaims, TokenError, TokenService};
pub use user_store::{PrincipalLookup, UserStore};

#[cfg(test)]
pub(crate) use token::ManualClock;
