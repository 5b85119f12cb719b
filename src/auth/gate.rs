//! Authentication gate for HTTP requests.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use http::header::AUTHORIZATION;
use tracing::{debug, error, warn};

use crate::auth::context::IdentityContext;
use crate::auth::token::{TokenError, TokenService};
use crate::auth::user_store::{PrincipalLookup, UserStore};
use crate::config::AuthConfig;
use crate::types::PrincipalHandle;

/// Scheme marker expected at the start of the `Authorization` header.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Establishes the identity of each inbound request.
///
/// Never fails a request: every problem with the presented credential
/// degrades to [`IdentityContext::Anonymous`] and routes that need a caller
/// reject later.
pub struct AuthGate<L = UserStore> {
    tokens: Arc<TokenService>,
    users: Arc<L>,
    lookup_timeout: Duration,
}

impl<L> Clone for AuthGate<L> {
    fn clone(&self) -> Self {
        Self {
            tokens: self.tokens.clone(),
            users: self.users.clone(),
            lookup_timeout: self.lookup_timeout,
        }
    }
}

impl<L: PrincipalLookup> AuthGate<L> {
    /// Create a new gate.
    pub fn new(tokens: Arc<TokenService>, users: Arc<L>, config: &AuthConfig) -> Self {
        Self {
            tokens,
            users,
            lookup_timeout: config.lookup_timeout(),
        }
    }

    /// Resolve the `Authorization` header value to an identity.
    ///
    /// 1. Missing header or non-Bearer scheme → anonymous
    /// 2. Malformed or expired token → anonymous (logged)
    /// 3. Valid token whose subject is not a known principal → anonymous
    /// 4. Store failure or timeout → anonymous (fail closed)
    pub async fn identify(&self, authorization: Option<&str>) -> IdentityContext {
        let Some(token) = authorization.and_then(|h| h.strip_prefix(BEARER_PREFIX)) else {
            return IdentityContext::Anonymous;
        };

        let handle = match self.tokens.verify(token) {
            Ok(handle) => handle,
            Err(TokenError::Expired) => {
                warn!("Bearer token expired; continuing as anonymous");
                return IdentityContext::Anonymous;
            }
            Err(err @ TokenError::Malformed(_)) => {
                warn!(reason = err.reason(), "Bearer token rejected; continuing as anonymous");
                return IdentityContext::Anonymous;
            }
        };

        self.resolve(handle).await
    }

    async fn resolve(&self, handle: PrincipalHandle) -> IdentityContext {
        let lookup = self.users.resolve_principal(&handle);

        match tokio::time::timeout(self.lookup_timeout, lookup).await {
            Ok(Ok(Some(principal))) => {
                debug!("Token verified for principal: {}", principal);
                IdentityContext::Authenticated { handle: principal }
            }
            Ok(Ok(None)) => {
                warn!(principal = %handle, "Token subject is not a known principal; continuing as anonymous");
                IdentityContext::Anonymous
            }
            Ok(Err(e)) => {
                error!(principal = %handle, "Principal lookup failed: {:#}", e);
                IdentityContext::Anonymous
            }
            Err(_) => {
                error!(
                    principal = %handle,
                    timeout_ms = u64::try_from(self.lookup_timeout.as_millis()).unwrap_or(u64::MAX),
                    "Principal lookup timed out"
                );
                IdentityContext::Anonymous
            }
        }
    }
}

/// Middleware publishing an [`IdentityContext`] into the request extensions.
///
/// Install with `axum::middleware::from_fn_with_state(gate, authenticate::<UserStore>)`
/// so it runs before every handler. A context already present on the request
/// is left untouched.
pub async fn authenticate<L>(State(gate): State<AuthGate<L>>, mut request: Request, next: Next) -> Response
where
    L: PrincipalLookup + 'static,
{
    if request.extensions().get::<IdentityContext>().is_none() {
        let authorization = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let ctx = gate.identify(authorization.as_deref()).await;
        request.extensions_mut().insert(ctx);
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::Argon2Params;
    use crate::auth::token::ManualClock;
    use crate::db::{DatabaseConfig, create_connection, ensure_schema};
    use axum::{Router, body::Body, middleware, routing::get};
    use chrono::{Duration as ChronoDuration, Utc};
    use tower::ServiceExt;

    const SECRET: &str = "gate-test-secret-key-with-32-bytes!!";

    struct Fixture {
        gate: AuthGate,
        tokens: Arc<TokenService>,
        clock: Arc<ManualClock>,
    }

    async fn setup() -> Fixture {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        let db = create_connection(config).await.unwrap();
        ensure_schema(&db).await.unwrap();

        let users = UserStore::new(db).with_hash_params(Argon2Params::insecure_fast());
        users.create_user("alice@x.com", "Alice", "pw").await.unwrap();

        let auth_config = AuthConfig::new(SECRET);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let tokens = Arc::new(TokenService::new(&auth_config).unwrap().with_clock(clock.clone()));
        let gate = AuthGate::new(tokens.clone(), Arc::new(users), &auth_config);

        Fixture { gate, tokens, clock }
    }

    fn bearer(tokens: &TokenService, handle: &str) -> String {
        let issued = tokens.issue(&PrincipalHandle::new(handle)).unwrap();
        format!("Bearer {}", issued.token)
    }

    #[tokio::test]
    async fn test_missing_header_is_anonymous() {
        let fx = setup().await;
        assert_eq!(fx.gate.identify(None).await, IdentityContext::Anonymous);
    }

    #[tokio::test]
    async fn test_other_scheme_is_anonymous() {
        let fx = setup().await;
        let token = fx.tokens.issue(&PrincipalHandle::new("alice@x.com")).unwrap().token;

        for header in [format!("Basic {}", token), format!("bearer {}", token), token.clone()] {
            assert_eq!(fx.gate.identify(Some(&header)).await, IdentityContext::Anonymous);
        }
    }

    #[tokio::test]
    async fn test_valid_token_authenticates() {
        let fx = setup().await;
        let header = bearer(&fx.tokens, "alice@x.com");

        assert_eq!(
            fx.gate.identify(Some(&header)).await,
            IdentityContext::authenticated("alice@x.com")
        );
    }

    #[tokio::test]
    async fn test_malformed_token_is_anonymous() {
        let fx = setup().await;
        assert_eq!(
            fx.gate.identify(Some("Bearer not.a.token")).await,
            IdentityContext::Anonymous
        );
        assert_eq!(fx.gate.identify(Some("Bearer ")).await, IdentityContext::Anonymous);
    }

    #[tokio::test]
    async fn test_expired_token_is_anonymous() {
        let fx = setup().await;
        let header = bearer(&fx.tokens, "alice@x.com");

        fx.clock.advance(ChronoDuration::hours(25));
        assert_eq!(fx.gate.identify(Some(&header)).await, IdentityContext::Anonymous);
    }

    #[tokio::test]
    async fn test_unknown_principal_is_anonymous() {
        let fx = setup().await;
        let header = bearer(&fx.tokens, "ghost@x.com");

        assert_eq!(fx.gate.identify(Some(&header)).await, IdentityContext::Anonymous);
    }

    #[tokio::test]
    async fn test_extra_space_after_scheme_is_anonymous() {
        let fx = setup().await;
        let token = fx.tokens.issue(&PrincipalHandle::new("alice@x.com")).unwrap().token;

        for header in [format!("Bearer  {}", token), format!("Bearer {} ", token)] {
            assert_eq!(fx.gate.identify(Some(&header)).await, IdentityContext::Anonymous);
        }
    }

    /// Lookup that never completes.
    struct StalledLookup;

    impl PrincipalLookup for StalledLookup {
        fn resolve_principal<'a>(
            &'a self,
            _handle: &'a PrincipalHandle,
        ) -> impl std::future::Future<Output = anyhow::Result<Option<PrincipalHandle>>> + Send + 'a {
            std::future::pending()
        }
    }

    /// Lookup whose backing store is down.
    struct FailingLookup;

    impl PrincipalLookup for FailingLookup {
        fn resolve_principal<'a>(
            &'a self,
            _handle: &'a PrincipalHandle,
        ) -> impl std::future::Future<Output = anyhow::Result<Option<PrincipalHandle>>> + Send + 'a {
            std::future::ready(Err(anyhow::anyhow!("connection refused")))
        }
    }

    fn gate_with<L: PrincipalLookup>(users: L, timeout: Duration) -> (AuthGate<L>, String) {
        let config = AuthConfig::new(SECRET).with_lookup_timeout(timeout);
        let tokens = Arc::new(TokenService::new(&config).unwrap());
        let header = bearer(&tokens, "alice@x.com");
        (AuthGate::new(tokens, Arc::new(users), &config), header)
    }

    #[tokio::test]
    async fn test_lookup_timeout_is_anonymous() {
        let (gate, header) = gate_with(StalledLookup, Duration::from_millis(20));

        let ctx = tokio::time::timeout(Duration::from_secs(5), gate.identify(Some(&header)))
            .await
            .expect("gate must give up on a stalled lookup");
        assert_eq!(ctx, IdentityContext::Anonymous);
    }

    #[tokio::test]
    async fn test_lookup_error_is_anonymous() {
        let (gate, header) = gate_with(FailingLookup, Duration::from_secs(2));
        assert_eq!(gate.identify(Some(&header)).await, IdentityContext::Anonymous);
    }

    #[tokio::test]
    async fn test_middleware_fails_closed_on_stalled_lookup() {
        let (gate, header) = gate_with(StalledLookup, Duration::from_millis(20));
        let app = Router::new()
            .route("/", get(echo_identity))
            .layer(middleware::from_fn_with_state(gate, authenticate::<StalledLookup>));

        let request = http::Request::builder()
            .uri("/")
            .header(AUTHORIZATION, header)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(body_string(response).await, "Anonymous");
    }

    async fn echo_identity(ctx: IdentityContext) -> String {
        ctx.display()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_middleware_publishes_context() {
        let fx = setup().await;
        let app = Router::new()
            .route("/", get(echo_identity))
            .layer(middleware::from_fn_with_state(fx.gate.clone(), authenticate::<UserStore>));

        let request = http::Request::builder()
            .uri("/")
            .header(AUTHORIZATION, bearer(&fx.tokens, "alice@x.com"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(body_string(response).await, "alice@x.com");

        let request = http::Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(body_string(response).await, "Anonymous");
    }

    #[tokio::test]
    async fn test_middleware_keeps_existing_context() {
        async fn preset(mut request: Request, next: Next) -> Response {
            request
                .extensions_mut()
                .insert(IdentityContext::authenticated("preset@x.com"));
            next.run(request).await
        }

        let fx = setup().await;
        // Layers added later run first: `preset` runs before the gate.
        let app = Router::new()
            .route("/", get(echo_identity))
            .layer(middleware::from_fn_with_state(fx.gate.clone(), authenticate::<UserStore>))
            .layer(middleware::from_fn(preset));

        let request = http::Request::builder()
            .uri("/")
            .header(AUTHORIZATION, bearer(&fx.tokens, "alice@x.com"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(body_string(response).await, "preset@x.com");
    }
}
