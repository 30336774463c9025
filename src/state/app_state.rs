//! Application state shared across handlers

use std::sync::Arc;

use crate::config::Config;
use crate::middleware::Gate;
use crate::services::{AccessService, BanService, LoanService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub loan_service: Arc<LoanService>,
    pub access_service: Arc<AccessService>,
    pub ban_service: Arc<BanService>,
    /// Full pipeline: ban check, rate limit, authorization
    pub gate: Arc<Gate>,
    /// Pipeline for the password endpoint: ban check and rate limit only
    pub auth_gate: Arc<Gate>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        loan_service: Arc<LoanService>,
        access_service: Arc<AccessService>,
        ban_service: Arc<BanService>,
        gate: Arc<Gate>,
        auth_gate: Arc<Gate>,
    ) -> Self {
        Self {
            config,
            loan_service,
            access_service,
            ban_service,
            gate,
            auth_gate,
        }
    }
}
