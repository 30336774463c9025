//! Ban list service
//!
//! A row in banned_users blocks the identity from every gated action,
//! including re-authorization, until an admin unbans it.

use sqlx::SqlitePool;
use sqlx::types::chrono::Utc;
use thiserror::Error;

use crate::error::ApiError;
use crate::models::BannedEntry;

/// Ban guard errors
#[derive(Error, Debug)]
pub enum BanError {
    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),
}

impl From<BanError> for ApiError {
    fn from(e: BanError) -> Self {
        match e {
            BanError::Store(err) => err.into(),
        }
    }
}

/// Ban list over the banned_users table
#[derive(Clone)]
pub struct BanService {
    pool: SqlitePool,
}

impl BanService {
    /// Create a new ban service instance
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up the ban entry for an identity, if any
    pub async fn is_banned(&self, identity: i64) -> Result<Option<BannedEntry>, BanError> {
        let entry = sqlx::query_as::<_, BannedEntry>(
            r#"
            SELECT id, external_identity, banned_at, reason
            FROM banned_users
            WHERE external_identity = ?
            "#,
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Ban an identity. Returns false when already banned; the original
    /// reason is never overwritten.
    pub async fn ban(&self, identity: i64, reason: &str) -> Result<bool, BanError> {
        let result = sqlx::query(
            r#"
            INSERT INTO banned_users (external_identity, banned_at, reason)
            VALUES (?, ?, ?)
            ON CONFLICT (external_identity) DO NOTHING
            "#,
        )
        .bind(identity)
        .bind(Utc::now())
        .bind(reason)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            tracing::warn!(identity, reason, "Identity banned");
        }
        Ok(inserted)
    }

    /// Lift a ban. Returns false when the identity was not banned.
    pub async fn unban(&self, identity: i64) -> Result<bool, BanError> {
        let result = sqlx::query("DELETE FROM banned_users WHERE external_identity = ?")
            .bind(identity)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            tracing::info!(identity, "Identity unbanned");
        }
        Ok(removed)
    }

    /// List banned identities, newest ban first
    pub async fn list_banned(&self) -> Result<Vec<BannedEntry>, BanError> {
        let entries = sqlx::query_as::<_, BannedEntry>(
            r#"
            SELECT id, external_identity, banned_at, reason
            FROM banned_users
            ORDER BY banned_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
