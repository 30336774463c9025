//! Borrower and loan route definitions

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn loan_routes() -> Router<AppState> {
    Router::new()
        .route("/api/borrowers", post(create_borrower))
        .route("/api/loans", get(list_active_loans).post(create_loan))
        .route("/api/loans/search", get(search_loans))
        .route("/api/loans/:id", get(get_loan))
        .route("/api/loans/:id/payments", put(set_payments))
        .route("/api/loans/:id/payments/adjust", post(adjust_payments))
}
