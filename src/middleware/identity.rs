//! Operator identity extraction
//!
//! The chat adapter forwards the stable numeric identity of the operator in
//! the `x-operator-id` header; every gated endpoint extracts it from there.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

/// Header carrying the adapter-validated operator identity
pub const OPERATOR_ID_HEADER: &str = "x-operator-id";

/// Operator identity extracted from the request headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operator(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for Operator
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts.headers.get(OPERATOR_ID_HEADER).ok_or_else(|| {
            ApiError::Unauthorized(format!("{} header required", OPERATOR_ID_HEADER))
        })?;

        let identity = raw
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .ok_or_else(|| {
                ApiError::InvalidArgument(format!(
                    "{} must be a numeric identity",
                    OPERATOR_ID_HEADER
                ))
            })?;

        Ok(Operator(identity))
    }
}
