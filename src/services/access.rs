//! Access control service
//!
//! Authorization is a single shared-password tier: any authorized operator is
//! also an admin. Authorization checks fail closed — a storage error reads as
//! "not authorized", never as a crash.

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::error::ApiError;
use crate::models::AuthorizedUser;

/// Access control errors
#[derive(Error, Debug)]
pub enum AccessError {
    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),
}

impl From<AccessError> for ApiError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::Store(err) => err.into(),
        }
    }
}

/// Access control over the authorized_users table
#[derive(Clone)]
pub struct AccessService {
    pool: SqlitePool,
}

impl AccessService {
    /// Create a new access service instance
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Check whether an identity is authorized. Fail-closed: unknown
    /// identities and storage errors both read as false.
    pub async fn is_authorized(&self, identity: i64) -> bool {
        let row: Result<Option<(bool,)>, sqlx::Error> = sqlx::query_as(
            "SELECT is_authorized FROM authorized_users WHERE external_identity = ?",
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await;

        match row {
            Ok(Some((flag,))) => flag,
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(
                    identity,
                    error = %e,
                    "Authorization check failed, treating as not authorized"
                );
                false
            }
        }
    }

    /// Grant authorization, idempotently. Upserts on the unique
    /// external_identity, then re-reads to confirm the flag actually landed.
    pub async fn authorize(&self, identity: i64) -> Result<bool, AccessError> {
        sqlx::query(
            r#"
            INSERT INTO authorized_users (external_identity, is_authorized)
            VALUES (?, TRUE)
            ON CONFLICT (external_identity) DO UPDATE SET is_authorized = TRUE
            "#,
        )
        .bind(identity)
        .execute(&self.pool)
        .await?;

        let confirmed: Option<(bool,)> = sqlx::query_as(
            "SELECT is_authorized FROM authorized_users WHERE external_identity = ?",
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await?;

        Ok(confirmed.map(|(flag,)| flag).unwrap_or(false))
    }

    /// Admin capability check. Currently every authorized operator is an
    /// admin; a real role system only needs to change this one method.
    pub async fn is_admin(&self, identity: i64) -> bool {
        self.is_authorized(identity).await
    }

    /// List authorized operators
    pub async fn list_authorized(&self) -> Result<Vec<AuthorizedUser>, AccessError> {
        let users = sqlx::query_as::<_, AuthorizedUser>(
            r#"
            SELECT id, external_identity, is_authorized
            FROM authorized_users
            WHERE is_authorized = TRUE
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}

/// SHA-256 digest of the input as lowercase hex
pub fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Check a candidate password against the stored digest.
///
/// The comparison target is itself a digest, but the comparison is still
/// constant-content to avoid timing side channels.
pub fn verify_password(candidate: &str, stored_digest_hex: &str) -> bool {
    constant_time_eq(
        sha256_hex(candidate).as_bytes(),
        stored_digest_hex.as_bytes(),
    )
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
