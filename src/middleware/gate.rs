//! Gated-action pipeline
//!
//! Every gated operation passes an ordered list of guards before its handler
//! runs: ban check first (no attempt recorded for banned identities), then
//! the rate limiter with ban escalation, then authorization. Each guard can
//! short-circuit with a typed [`Rejection`].

use axum::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ApiError;
use crate::middleware::rate_limiter::RateLimiter;
use crate::services::{AccessService, BanService};

/// Typed short-circuit result from a guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Identity is on the ban list (pre-existing or just escalated)
    Banned { reason: String },
    /// Over the attempt limit; wait out the window
    RateLimited { minutes_left: i64, violations: u32 },
    /// Identity is not authorized
    Unauthorized,
    /// The authoritative answer could not be determined
    Unavailable(String),
}

impl From<Rejection> for ApiError {
    fn from(r: Rejection) -> Self {
        match r {
            Rejection::Banned { reason } => ApiError::Banned(reason),
            Rejection::RateLimited {
                minutes_left,
                violations,
            } => ApiError::TooManyRequests {
                minutes_left,
                violations,
            },
            Rejection::Unauthorized => ApiError::Unauthorized(
                "You are not authorized. Authorize with POST /api/auth".to_string(),
            ),
            Rejection::Unavailable(msg) => ApiError::StoreUnavailable(msg),
        }
    }
}

/// One step of the gated-action pipeline
#[async_trait]
pub trait Guard: Send + Sync {
    async fn check(&self, identity: i64) -> Result<(), Rejection>;
}

/// Rejects banned identities before anything else runs, so a banned
/// identity's requests never even count as attempts.
pub struct BanGuard {
    bans: Arc<BanService>,
}

impl BanGuard {
    pub fn new(bans: Arc<BanService>) -> Self {
        Self { bans }
    }
}

#[async_trait]
impl Guard for BanGuard {
    async fn check(&self, identity: i64) -> Result<(), Rejection> {
        match self.bans.is_banned(identity).await {
            Ok(Some(entry)) => {
                tracing::warn!(identity, "Rejected banned identity");
                Err(Rejection::Banned {
                    reason: entry.reason,
                })
            }
            Ok(None) => Ok(()),
            Err(e) => Err(Rejection::Unavailable(e.to_string())),
        }
    }
}

/// Records the attempt, then enforces the sliding window. Repeat violations
/// escalate to an automatic ban; admins are exempt from escalation but still
/// wait out the window.
pub struct RateLimitGuard {
    limiter: Arc<RateLimiter>,
    access: Arc<AccessService>,
    bans: Arc<BanService>,
    max_attempts: usize,
    window: Duration,
    ban_after: u32,
}

impl RateLimitGuard {
    pub fn new(
        limiter: Arc<RateLimiter>,
        access: Arc<AccessService>,
        bans: Arc<BanService>,
        max_attempts: usize,
        window: Duration,
        ban_after: u32,
    ) -> Self {
        Self {
            limiter,
            access,
            bans,
            max_attempts,
            window,
            ban_after,
        }
    }

    async fn rate_limited(&self, identity: i64, violations: u32) -> Rejection {
        let left = self
            .limiter
            .retry_after(identity, self.window)
            .await
            .unwrap_or(Duration::ZERO);
        Rejection::RateLimited {
            minutes_left: (left.as_secs() / 60) as i64,
            violations,
        }
    }
}

#[async_trait]
impl Guard for RateLimitGuard {
    async fn check(&self, identity: i64) -> Result<(), Rejection> {
        self.limiter.record_attempt(identity).await;

        if !self
            .limiter
            .is_rate_limited(identity, self.max_attempts, self.window)
            .await
        {
            return Ok(());
        }

        // Admins never accrue violations and are never auto-banned.
        if self.access.is_admin(identity).await {
            let violations = self.limiter.violations(identity).await;
            return Err(self.rate_limited(identity, violations).await);
        }

        let violations = self.limiter.register_violation(identity).await;
        tracing::warn!(identity, violations, "Rate limit exceeded");

        if violations >= self.ban_after {
            let reason = format!("Rate limit exceeded {} times", violations);
            return match self.bans.ban(identity, &reason).await {
                Ok(_) => {
                    tracing::warn!(identity, "Banned after repeated rate limit violations");
                    Err(Rejection::Banned { reason })
                }
                Err(e) => Err(Rejection::Unavailable(e.to_string())),
            };
        }

        Err(self.rate_limited(identity, violations).await)
    }
}

/// Requires the identity to be authorized. Storage failures inside
/// `is_authorized` already read as "not authorized" (fail-closed).
pub struct AuthGuard {
    access: Arc<AccessService>,
}

impl AuthGuard {
    pub fn new(access: Arc<AccessService>) -> Self {
        Self { access }
    }
}

#[async_trait]
impl Guard for AuthGuard {
    async fn check(&self, identity: i64) -> Result<(), Rejection> {
        if self.access.is_authorized(identity).await {
            Ok(())
        } else {
            tracing::debug!(identity, "Rejected unauthorized identity");
            Err(Rejection::Unauthorized)
        }
    }
}

/// An ordered guard pipeline plus the completion hook that forgives past
/// violations once a gated action succeeds.
pub struct Gate {
    guards: Vec<Arc<dyn Guard>>,
    limiter: Arc<RateLimiter>,
}

impl Gate {
    pub fn new(guards: Vec<Arc<dyn Guard>>, limiter: Arc<RateLimiter>) -> Self {
        Self { guards, limiter }
    }

    /// Run every guard in order; the first rejection wins.
    pub async fn check(&self, identity: i64) -> Result<(), Rejection> {
        for guard in &self.guards {
            guard.check(identity).await?;
        }
        Ok(())
    }

    /// Mark a gated action as successfully completed. A borderline abuser who
    /// eventually behaves is not banned for earlier mistakes.
    pub async fn complete(&self, identity: i64) {
        self.limiter.reset_violations(identity).await;
    }
}
