//! Access-control models for the Loanbook backend

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use validator::Validate;

/// Operator identity row, created lazily on first successful authorization
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct AuthorizedUser {
    pub id: i64,
    pub external_identity: i64,
    pub is_authorized: bool,
}

/// Ban list entry; presence blocks every gated action for the identity
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct BannedEntry {
    pub id: i64,
    pub external_identity: i64,
    pub banned_at: DateTime<Utc>,
    pub reason: String,
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to authorize with the shared operator password
#[derive(Debug, Deserialize, Validate)]
pub struct AuthRequest {
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: String,
}

/// Response to a successful authorization
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub authorized: bool,
}

/// Request to ban an identity
#[derive(Debug, Deserialize)]
pub struct BanRequest {
    pub identity: i64,
    pub reason: Option<String>,
}

/// Outcome of a ban/unban mutation
#[derive(Debug, Serialize)]
pub struct BanOutcome {
    pub identity: i64,
    pub changed: bool,
}
