//! Borrower and loan HTTP handlers
//!
//! Every handler follows the gated-action protocol: run the guard pipeline,
//! perform the operation, and report completion so past violations are
//! forgiven on success.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use validator::Validate;

use crate::error::ApiError;
use crate::middleware::Operator;
use crate::models::{
    suggested_installment, AdjustPaymentsRequest, CreateBorrowerRequest, CreateLoanRequest,
    CreatedResponse, LoanView, NewLoan, SearchLoansQuery, SetPaymentsRequest,
};
use crate::state::AppState;

/// POST /api/borrowers - Find-or-create a borrower (case-insensitive dedup)
pub async fn create_borrower(
    State(state): State<AppState>,
    Operator(identity): Operator,
    Json(req): Json<CreateBorrowerRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    state.gate.check(identity).await?;
    req.validate()?;

    let id = state
        .loan_service
        .create_borrower(&req.name, req.phone.as_deref())
        .await?;

    state.gate.complete(identity).await;
    Ok(Json(CreatedResponse { id }))
}

/// POST /api/loans - Create a loan for an existing borrower
pub async fn create_loan(
    State(state): State<AppState>,
    Operator(identity): Operator,
    Json(req): Json<CreateLoanRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    state.gate.check(identity).await?;
    req.validate()?;

    // The installment contract is fixed here, on the adapter side of the
    // engine boundary; the engine stores it as given.
    let payment_amount = req
        .payment_amount
        .unwrap_or_else(|| suggested_installment(req.total_amount, req.number_of_payments));

    let id = state
        .loan_service
        .create_loan(NewLoan {
            borrower_id: req.borrower_id,
            total_amount: req.total_amount,
            payment_frequency: req.payment_frequency,
            number_of_payments: req.number_of_payments,
            payment_amount,
        })
        .await?;

    state.gate.complete(identity).await;
    Ok(Json(CreatedResponse { id }))
}

/// GET /api/loans - Active loans, newest first
pub async fn list_active_loans(
    State(state): State<AppState>,
    Operator(identity): Operator,
) -> Result<Json<Vec<LoanView>>, ApiError> {
    state.gate.check(identity).await?;

    let loans = state.loan_service.list_active_loans().await?;

    state.gate.complete(identity).await;
    Ok(Json(loans))
}

/// GET /api/loans/search?q=frag - Case-insensitive substring search on
/// borrower name, all statuses
pub async fn search_loans(
    State(state): State<AppState>,
    Operator(identity): Operator,
    Query(query): Query<SearchLoansQuery>,
) -> Result<Json<Vec<LoanView>>, ApiError> {
    state.gate.check(identity).await?;

    let fragment = query.q.trim();
    if fragment.is_empty() {
        return Err(ApiError::InvalidArgument(
            "search fragment must not be empty".to_string(),
        ));
    }

    let loans = state.loan_service.search_loans_by_name(fragment).await?;

    state.gate.complete(identity).await;
    Ok(Json(loans))
}

/// GET /api/loans/:id - Loan details regardless of status
pub async fn get_loan(
    State(state): State<AppState>,
    Operator(identity): Operator,
    Path(loan_id): Path<i64>,
) -> Result<Json<LoanView>, ApiError> {
    state.gate.check(identity).await?;

    let loan = state
        .loan_service
        .get_loan_details(loan_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Loan {} not found", loan_id)))?;

    state.gate.complete(identity).await;
    Ok(Json(loan))
}

/// POST /api/loans/:id/payments/adjust - Step the remaining payment count
/// up or down by one
pub async fn adjust_payments(
    State(state): State<AppState>,
    Operator(identity): Operator,
    Path(loan_id): Path<i64>,
    Json(req): Json<AdjustPaymentsRequest>,
) -> Result<Json<LoanView>, ApiError> {
    state.gate.check(identity).await?;

    let loan = state
        .loan_service
        .adjust_payment_count(loan_id, req.direction)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Loan {} not found", loan_id)))?;

    state.gate.complete(identity).await;
    Ok(Json(loan))
}

/// PUT /api/loans/:id/payments - Set the remaining payment count outright
pub async fn set_payments(
    State(state): State<AppState>,
    Operator(identity): Operator,
    Path(loan_id): Path<i64>,
    Json(req): Json<SetPaymentsRequest>,
) -> Result<Json<LoanView>, ApiError> {
    state.gate.check(identity).await?;

    if req.count < 0 {
        return Err(ApiError::InvalidArgument(
            "payment count must not be negative".to_string(),
        ));
    }

    let updated = state.loan_service.set_payment_count(loan_id, req.count).await?;
    if !updated {
        return Err(ApiError::NotFound(format!("Loan {} not found", loan_id)));
    }

    let loan = state
        .loan_service
        .get_loan_details(loan_id)
        .await?
        .ok_or_else(|| ApiError::InternalError("loan vanished after update".to_string()))?;

    state.gate.complete(identity).await;
    Ok(Json(loan))
}
