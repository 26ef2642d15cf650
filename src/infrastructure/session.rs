use crate::domain::{Role, User, UserStatus};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64, Engine};
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

const SESSION_TTL_DAYS: i64 = 30;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("An account with this email already exists")]
    EmailTaken,
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// A signed-in user plus the opaque bearer token identifying the session.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Authentication boundary. Tokens are opaque to callers.
#[async_trait]
pub trait SessionGateway: Send + Sync {
    /// Stores a new account. The user row is written exactly as given.
    async fn sign_up(&self, user: &User, password: &str) -> Result<(), SessionError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, SessionError>;
    /// `None` for unknown or expired tokens.
    async fn current_user(&self, token: &str) -> Result<Option<User>, SessionError>;
    async fn sign_out(&self, token: &str) -> Result<(), SessionError>;
    /// Deletes sessions past their expiry; returns how many were removed.
    async fn purge_expired(&self) -> Result<u64, SessionError>;
}

/// Only the digest of a session token is ever persisted.
pub fn hash_session_token(token: &str) -> String {
    format!("sha256:{:x}", Sha256::digest(token.as_bytes()))
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64.encode(bytes)
}

pub fn hash_password(password: &str) -> Result<String, SessionError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| SessionError::Hashing(e.to_string()))
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "Stored password hash is malformed");
            false
        }
    }
}

pub struct PostgresSessionGateway {
    pool: PgPool,
}

impl PostgresSessionGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionGateway for PostgresSessionGateway {
    async fn sign_up(&self, user: &User, password: &str) -> Result<(), SessionError> {
        let password_hash = hash_password(password)?;

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, phone, role, status, company_name, address, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.role.to_string())
        .bind(user.status.to_string())
        .bind(&user.company_name)
        .bind(&user.address)
        .bind(&password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => SessionError::EmailTaken,
            other => SessionError::DatabaseError(other),
        })?;

        info!(user_id = %user.id, "Account created");
        Ok(())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, SessionError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, phone, role, status, company_name, address, password_hash, created_at, updated_at
            FROM users
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(SessionError::InvalidCredentials);
        };

        let stored_hash: Option<String> = row.try_get("password_hash")?;
        if !stored_hash.is_some_and(|h| verify_password(password, &h)) {
            return Err(SessionError::InvalidCredentials);
        }

        let user = row_to_user(&row)?;
        let token = generate_token();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(hash_session_token(&token))
        .bind(user.id)
        .bind(now)
        .bind(now + Duration::days(SESSION_TTL_DAYS))
        .execute(&self.pool)
        .await?;

        info!(user_id = %user.id, "Signed in");
        Ok(Session { token, user })
    }

    async fn current_user(&self, token: &str) -> Result<Option<User>, SessionError> {
        let row = sqlx::query(
            r#"
            SELECT u.id, u.name, u.email, u.phone, u.role, u.status, u.company_name, u.address, u.created_at, u.updated_at
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token_hash = $1 AND s.expires_at > $2
            "#,
        )
        .bind(hash_session_token(token))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn sign_out(&self, token: &str) -> Result<(), SessionError> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(hash_session_token(token))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, SessionError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_user(row: &sqlx::postgres::PgRow) -> Result<User, SessionError> {
    let role: String = row.try_get("role")?;
    let status: String = row.try_get("status")?;

    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        role: Role::from_str(&role)
            .map_err(|_| SessionError::InvalidData(format!("Unknown role: {}", role)))?,
        status: UserStatus::from_str(&status)
            .map_err(|_| SessionError::InvalidData(format!("Unknown user status: {}", status)))?,
        company_name: row.try_get("company_name")?,
        address: row.try_get("address")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
