// Core modules
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod types;

// Re-export key types and functions
pub use api::{AppState, create_router};
pub use auth::{
    AuthGate, AuthzError, IdentityContext, OwnableResource, OwnershipGuard, TokenError,
    TokenService, UserStore,
};
pub use config::{AuthConfig, ConfigError, ServerConfig};
pub use db::{DatabaseConfig, Db, create_connection, ensure_schema};
pub use types::{ArticleSlug, PrincipalHandle};
