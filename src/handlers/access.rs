//! Authorization and ban administration HTTP handlers

use axum::{extract::Path, extract::State, Json};
use validator::Validate;

use crate::error::ApiError;
use crate::middleware::Operator;
use crate::models::{AuthRequest, AuthResponse, AuthorizedUser, BanOutcome, BanRequest, BannedEntry};
use crate::services::verify_password;
use crate::state::AppState;

/// POST /api/auth - Authorize the calling identity with the shared password
///
/// Runs behind the public gate (ban + rate limit, no auth requirement), so
/// brute-force attempts burn through the attempt window and escalate.
pub async fn authenticate(
    State(state): State<AppState>,
    Operator(identity): Operator,
    Json(req): Json<AuthRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    state.auth_gate.check(identity).await?;
    req.validate()?;

    if !verify_password(&req.password, &state.config.operator_password_sha256) {
        tracing::warn!(identity, "Failed password attempt");
        return Err(ApiError::Unauthorized("Invalid password".to_string()));
    }

    let confirmed = state.access_service.authorize(identity).await?;
    if !confirmed {
        return Err(ApiError::StoreUnavailable(
            "authorization could not be confirmed".to_string(),
        ));
    }

    state.auth_gate.complete(identity).await;
    tracing::info!(identity, "Operator authorized");

    Ok(Json(AuthResponse { authorized: true }))
}

/// GET /api/operators - List authorized operators
pub async fn list_operators(
    State(state): State<AppState>,
    Operator(identity): Operator,
) -> Result<Json<Vec<AuthorizedUser>>, ApiError> {
    state.gate.check(identity).await?;

    let operators = state.access_service.list_authorized().await?;

    state.gate.complete(identity).await;
    Ok(Json(operators))
}

/// GET /api/bans - List banned identities, newest ban first
pub async fn list_bans(
    State(state): State<AppState>,
    Operator(identity): Operator,
) -> Result<Json<Vec<BannedEntry>>, ApiError> {
    state.gate.check(identity).await?;

    let entries = state.ban_service.list_banned().await?;

    state.gate.complete(identity).await;
    Ok(Json(entries))
}

/// POST /api/bans - Ban an identity
pub async fn create_ban(
    State(state): State<AppState>,
    Operator(identity): Operator,
    Json(req): Json<BanRequest>,
) -> Result<Json<BanOutcome>, ApiError> {
    state.gate.check(identity).await?;

    let reason = req.reason.as_deref().unwrap_or("Banned by operator");
    let changed = state.ban_service.ban(req.identity, reason).await?;
    if !changed {
        return Err(ApiError::AlreadyExists(format!(
            "Identity {} is already banned",
            req.identity
        )));
    }

    state.gate.complete(identity).await;
    Ok(Json(BanOutcome {
        identity: req.identity,
        changed,
    }))
}

/// DELETE /api/bans/:identity - Lift a ban
pub async fn delete_ban(
    State(state): State<AppState>,
    Operator(identity): Operator,
    Path(target): Path<i64>,
) -> Result<Json<BanOutcome>, ApiError> {
    state.gate.check(identity).await?;

    let changed = state.ban_service.unban(target).await?;
    if !changed {
        return Err(ApiError::NotFound(format!(
            "Identity {} is not banned",
            target
        )));
    }

    state.gate.complete(identity).await;
    Ok(Json(BanOutcome {
        identity: target,
        changed,
    }))
}
