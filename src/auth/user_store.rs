//! Principal storage and credential checks.

use std::future::Future;
use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use chrono::Utc;

use crate::auth::password::{Argon2Params, hash_password, verify_password};
use crate::db::Db;
use crate::db::schema::{UserCreate, UserRecord};
use crate::types::PrincipalHandle;

/// Password hashed for unknown emails so both login branches pay for Argon2.
const DUMMY_PASSWORD: &str = "techblog-dummy-password";

/// Resolves a token subject to a stored principal.
///
/// The authentication gate depends on this rather than on the store type.
pub trait PrincipalLookup: Send + Sync {
    /// The stored handle for `handle`, or `None` when no such principal exists.
    fn resolve_principal<'a>(
        &'a self,
        handle: &'a PrincipalHandle,
    ) -> impl Future<Output = Result<Option<PrincipalHandle>>> + Send + 'a;
}

/// User store for database operations.
///
/// The auth core only reads through it: resolving a login handle to a
/// principal and comparing a presented password against the stored hash.
/// Creation exists for seeding and administration.
pub struct UserStore {
    db: Db,
    hash_params: Argon2Params,
    dummy_hash: OnceLock<String>,
}

impl UserStore {
    /// Create a new user store.
    pub fn new(db: Db) -> Self {
        Self {
            db,
            hash_params: Argon2Params::default(),
            dummy_hash: OnceLock::new(),
        }
    }

    /// Override the Argon2 cost used for newly hashed passwords.
    pub fn with_hash_params(mut self, params: Argon2Params) -> Self {
        self.hash_params = params;
        self.dummy_hash = OnceLock::new();
        self
    }

    /// Resolve a login handle to a principal.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let query = "SELECT * FROM user WHERE email = $email LIMIT 1";

        let mut res = self.db
            .query(query)
            .bind(("email", email.to_string()))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next())
    }

    /// Create a principal with a freshly hashed password.
    ///
    /// Fails if the email is already taken.
    pub async fn create_user(&self, email: &str, name: &str, password: &str) -> Result<UserRecord> {
        let create = UserCreate {
            email: email.to_string(),
            name: name.to_string(),
            password_hash: hash_password(password, self.hash_params)?,
        };

        let query = r#"
            CREATE user CONTENT {
                email: $email,
                name: $name,
                password_hash: $password_hash,
                created_at: $created_at
            }
        "#;

        let mut res = self.db
            .query(query)
            .bind(("email", create.email))
            .bind(("name", create.name))
            .bind(("password_hash", create.password_hash))
            .bind(("created_at", Utc::now()))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        users.into_iter().next()
            .ok_or_else(|| anyhow!("Failed to create user"))
    }

    /// Create the user unless one with this email already exists.
    ///
    /// Returns `true` when a new user was created.
    pub async fn ensure_user(&self, email: &str, name: &str, password: &str) -> Result<bool> {
        if self.find_by_email(email).await?.is_some() {
            return Ok(false);
        }
        self.create_user(email, name, password).await?;
        Ok(true)
    }

    /// Check a login attempt.
    ///
    /// Returns the principal only when the email exists and the password
    /// matches; an unknown email and a wrong password are indistinguishable,
    /// in the response and in the Argon2 work done.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<Option<UserRecord>> {
        let Some(user) = self.find_by_email(email).await? else {
            verify_password(password, self.dummy_hash()?)?;
            return Ok(None);
        };

        if verify_password(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// Hash of [`DUMMY_PASSWORD`] with this store's parameters, built on first use.
    fn dummy_hash(&self) -> Result<&str> {
        if let Some(hash) = self.dummy_hash.get() {
            return Ok(hash.as_str());
        }
        let hash = hash_password(DUMMY_PASSWORD, self.hash_params)?;
        Ok(self.dummy_hash.get_or_init(|| hash).as_str())
    }
}

impl PrincipalLookup for UserStore {
    fn resolve_principal<'a>(
        &'a self,
        handle: &'a PrincipalHandle,
    ) -> impl Future<Output = Result<Option<PrincipalHandle>>> + Send + 'a {
        async move {
            let user = self.find_by_email(handle.as_str()).await?;
            Ok(user.map(|u| PrincipalHandle::new(u.email)))
        }
    }
}
