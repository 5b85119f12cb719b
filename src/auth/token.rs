//! Signed, time-bounded identity tokens.
//!
//! Tokens are compact HS256 JWTs (`header.payload.signature`, each segment
//! base64url without padding) carrying exactly `sub`, `iat` and `exp`.
//! Any standard HS256 implementation sharing the secret can read them.

use std::fmt;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::types::PrincipalHandle;

/// Fixed validity window of an issued token.
pub const TOKEN_TTL_HOURS: i64 = 24;

/// Source of "now" for issuance and expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Claims carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Principal login handle
    pub sub: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expires at (Unix seconds)
    pub exp: i64,
}

/// A freshly issued token and the window it is valid for.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Token verification failures.
///
/// `Malformed` covers both unparsable tokens and signature mismatches so
/// callers cannot tell them apart; the reason is for server logs only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    Malformed(String),
    Expired,
}

impl TokenError {
    /// Internal detail suitable for logs, never for responses.
    pub fn reason(&self) -> &str {
        match self {
            Self::Malformed(reason) => reason,
            Self::Expired => "token expired",
        }
    }
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(_) => write!(f, "Malformed token"),
            Self::Expired => write!(f, "Token has expired"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Issues and verifies tokens with the process-wide signing key.
///
/// Holds only immutable state, so one instance behind an `Arc` serves every
/// request concurrently.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    /// Derive the signing key from configuration.
    pub fn new(config: &AuthConfig) -> Result<Self> {
        config.validate()?;

        let secret = config.jwt_secret.as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against our own clock with no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock used for issuance and expiry checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Issue a token for `handle`, valid for [`TOKEN_TTL_HOURS`] from now.
    pub fn issue(&self, handle: &PrincipalHandle) -> Result<IssuedToken> {
        self.issue_at(handle, self.clock.now())
    }

    /// Issue a token as if the current instant were `now`.
    pub fn issue_at(&self, handle: &PrincipalHandle, now: DateTime<Utc>) -> Result<IssuedToken> {
        let iat = now.timestamp();
        let exp = iat + Duration::hours(TOKEN_TTL_HOURS).num_seconds();

        let claims = TokenClaims {
            sub: handle.as_str().to_string(),
            iat,
            exp,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow!("sign token: {}", e))?;

        Ok(IssuedToken {
            token,
            issued_at: timestamp(iat)?,
            expires_at: timestamp(exp)?,
        })
    }

    /// Verify a serialized token and return its subject.
    pub fn verify(&self, token: &str) -> Result<PrincipalHandle, TokenError> {
        self.verify_at(token, self.clock.now())
    }

    /// Verify a serialized token as of `now`.
    ///
    /// The signature is checked before any claim is trusted; only then is
    /// `now >= exp` reported as [`TokenError::Expired`].
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<PrincipalHandle, TokenError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;

        let claims = data.claims;
        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(PrincipalHandle::new(claims.sub))
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| anyhow!("timestamp {} out of range", secs))
}

/// Clock pinned to an instant that tests move by hand.
#[cfg(test)]
pub(crate) struct ManualClock(std::sync::Mutex<DateTime<Utc>>);

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new(now: DateTime<Utc>) -> Self {
        Self(std::sync::Mutex::new(now))
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    const SECRET: &str = "test-secret-key-for-jwt-at-least-32-bytes";

    fn service() -> TokenService {
        TokenService::new(&AuthConfig::new(SECRET)).unwrap()
    }

    fn segments(token: &str) -> Vec<String> {
        token.split('.').map(str::to_string).collect()
    }

    #[test]
    fn test_issue_and_verify_round_trip() {
        let svc = service();
        for handle in ["alice@x.com", "bob@x.com", "ünïcode@x.com"] {
            let issued = svc.issue(&PrincipalHandle::new(handle)).unwrap();
            assert_eq!(svc.verify(&issued.token).unwrap().as_str(), handle);
        }
    }

    #[test]
    fn test_issued_window_is_24_hours() {
        let svc = service();
        let issued = svc.issue(&PrincipalHandle::new("alice@x.com")).unwrap();
        assert_eq!(issued.expires_at - issued.issued_at, Duration::hours(24));
    }

    #[test]
    fn test_wire_format() {
        let svc = service();
        let issued = svc.issue(&PrincipalHandle::new("alice@x.com")).unwrap();

        let parts = segments(&issued.token);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| !p.contains('=')));

        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(&parts[0]).unwrap()).unwrap();
        assert_eq!(header["alg"], "HS256");
        assert_eq!(header["typ"], "JWT");

        let payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(&parts[1]).unwrap()).unwrap();
        assert_eq!(payload["sub"], "alice@x.com");
        assert_eq!(payload["iat"], issued.issued_at.timestamp());
        assert_eq!(payload["exp"], issued.expires_at.timestamp());
        assert_eq!(payload.as_object().unwrap().len(), 3);

        // HMAC-SHA256 output
        assert_eq!(URL_SAFE_NO_PAD.decode(&parts[2]).unwrap().len(), 32);
    }

    #[test]
    fn test_expiry_boundary() {
        let svc = service();
        let issued_at = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let issued = svc.issue_at(&PrincipalHandle::new("alice@x.com"), issued_at).unwrap();

        for offset in [Duration::zero(), Duration::hours(1), Duration::hours(24) - Duration::seconds(1)] {
            assert!(svc.verify_at(&issued.token, issued_at + offset).is_ok());
        }

        for offset in [Duration::hours(24), Duration::hours(25), Duration::days(365)] {
            assert_eq!(
                svc.verify_at(&issued.token, issued_at + offset),
                Err(TokenError::Expired)
            );
        }
    }

    #[test]
    fn test_clock_drives_expiry() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let svc = service().with_clock(clock.clone());

        let issued = svc.issue(&PrincipalHandle::new("alice@x.com")).unwrap();
        assert!(svc.verify(&issued.token).is_ok());

        clock.advance(Duration::hours(25));
        assert_eq!(svc.verify(&issued.token), Err(TokenError::Expired));
    }

    #[test]
    fn test_every_signature_bit_flip_is_rejected() {
        let svc = service();
        let issued = svc.issue(&PrincipalHandle::new("alice@x.com")).unwrap();
        let parts = segments(&issued.token);
        let signature = URL_SAFE_NO_PAD.decode(&parts[2]).unwrap();

        for byte in 0..signature.len() {
            for bit in 0..8 {
                let mut tampered = signature.clone();
                tampered[byte] ^= 1 << bit;
                let token = format!("{}.{}.{}", parts[0], parts[1], URL_SAFE_NO_PAD.encode(&tampered));

                assert!(
                    matches!(svc.verify(&token), Err(TokenError::Malformed(_))),
                    "flip of byte {} bit {} was accepted",
                    byte,
                    bit
                );
            }
        }
    }

    #[test]
    fn test_subject_substitution_is_rejected() {
        let svc = service();
        let issued = svc.issue(&PrincipalHandle::new("alice@x.com")).unwrap();
        let parts = segments(&issued.token);

        let mut payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(&parts[1]).unwrap()).unwrap();
        payload["sub"] = serde_json::Value::from("bob@x.com");
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());

        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
        assert!(matches!(svc.verify(&forged), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_extended_expiry_is_rejected() {
        let svc = service();
        let issued = svc.issue(&PrincipalHandle::new("alice@x.com")).unwrap();
        let parts = segments(&issued.token);

        let mut payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(&parts[1]).unwrap()).unwrap();
        payload["exp"] = serde_json::Value::from(issued.expires_at.timestamp() + 3600);
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());

        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
        assert!(matches!(svc.verify(&forged), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_wrong_secret_is_malformed() {
        let issued = service().issue(&PrincipalHandle::new("alice@x.com")).unwrap();

        let other = TokenService::new(&AuthConfig::new("another-secret-that-is-32-bytes-long")).unwrap();
        assert!(matches!(other.verify(&issued.token), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_expired_with_bad_signature_is_malformed() {
        let svc = service();
        let issued_at = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let issued = svc.issue_at(&PrincipalHandle::new("alice@x.com"), issued_at).unwrap();

        let other = TokenService::new(&AuthConfig::new("another-secret-that-is-32-bytes-long")).unwrap();
        assert!(matches!(other.verify(&issued.token), Err(TokenError::Malformed(_))));
        assert_eq!(svc.verify(&issued.token), Err(TokenError::Expired));
    }

    #[test]
    fn test_other_algorithm_is_malformed() {
        let svc = service();
        let claims = TokenClaims {
            sub: "alice@x.com".to_string(),
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(svc.verify(&token), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_missing_expiry_is_malformed() {
        #[derive(Serialize)]
        struct NoExp {
            sub: String,
            iat: i64,
        }

        let svc = service();
        let token = encode(
            &Header::new(Algorithm::HS256),
            &NoExp {
                sub: "alice@x.com".to_string(),
                iat: Utc::now().timestamp(),
            },
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(svc.verify(&token), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let svc = service();
        for token in ["", "invalid", "not.a.token", "too.many.parts.in.this.token", "a.b"] {
            assert!(
                matches!(svc.verify(token), Err(TokenError::Malformed(_))),
                "Expected Malformed for token: {}",
                token
            );
        }
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(TokenService::new(&AuthConfig::new("short")).is_err());
    }

    #[test]
    fn test_error_display_does_not_leak_reason() {
        let err = TokenError::Malformed("InvalidSignature".to_string());
        assert_eq!(err.to_string(), "Malformed token");
        assert_eq!(err.reason(), "InvalidSignature");
        assert_eq!(TokenError::Expired.to_string(), "Token has expired");
    }
}
