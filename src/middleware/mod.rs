//! Middleware for the Loanbook API
//!
//! This module provides the gated-action pipeline (ban check, rate limiting,
//! authorization), operator identity extraction, request tracing, and
//! security headers.

pub mod gate;
pub mod identity;
pub mod rate_limiter;
mod security;
mod tracing;

pub use gate::{AuthGuard, BanGuard, Gate, Guard, RateLimitGuard, Rejection};
pub use identity::{Operator, OPERATOR_ID_HEADER};
pub use rate_limiter::RateLimiter;
pub use security::{hsts_header, security_headers};
pub use tracing::request_tracing;
