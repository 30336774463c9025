//! Data models for the Loanbook backend
//!
//! Monetary amounts are stored as i64 minor units (cents) to keep installment
//! arithmetic exact.

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use validator::Validate;

pub mod access;
pub use access::*;

/// Loan status enum
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Completed,
}

/// Payment frequency enum
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentFrequency {
    Weekly,
    Monthly,
}

/// Borrower model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Borrower {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Loan model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Loan {
    pub id: i64,
    pub borrower_id: i64,
    pub total_amount: i64,
    pub remaining_amount: i64,
    pub payment_frequency: PaymentFrequency,
    pub number_of_payments: i64,
    pub payment_amount: i64,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
}

/// Loan joined with its borrower's name, as rendered to the adapter
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct LoanView {
    pub id: i64,
    pub borrower_name: String,
    pub total_amount: i64,
    pub remaining_amount: i64,
    pub payment_amount: i64,
    pub payment_frequency: PaymentFrequency,
    pub number_of_payments: i64,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
}

/// Validated input to the loan engine's create operation.
///
/// Unlike [`CreateLoanRequest`], the installment here is definite: the
/// adapter has already fixed it.
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub borrower_id: i64,
    pub total_amount: i64,
    pub payment_frequency: PaymentFrequency,
    pub number_of_payments: i64,
    pub payment_amount: i64,
}

/// Direction for single-step payment count adjustments
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AdjustDirection {
    Increase,
    Decrease,
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to create (or dedup-lookup) a borrower
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBorrowerRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub phone: Option<String>,
}

/// Response carrying a created/found entity id
#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: i64,
}

/// Request to create a new loan
///
/// `payment_amount` is the fixed installment in cents. When omitted, the
/// handler derives it by rounding `total_amount / number_of_payments`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLoanRequest {
    pub borrower_id: i64,
    #[validate(range(min = 1, message = "total_amount must be positive"))]
    pub total_amount: i64,
    pub payment_frequency: PaymentFrequency,
    #[validate(range(min = 1, message = "number_of_payments must be positive"))]
    pub number_of_payments: i64,
    #[validate(range(min = 1, message = "payment_amount must be positive"))]
    pub payment_amount: Option<i64>,
}

/// Request body for adjusting a loan's remaining payment count by one step
#[derive(Debug, Deserialize)]
pub struct AdjustPaymentsRequest {
    pub direction: AdjustDirection,
}

/// Request body for setting a loan's remaining payment count
#[derive(Debug, Deserialize)]
pub struct SetPaymentsRequest {
    pub count: i64,
}

/// Query for searching loans by borrower name
#[derive(Debug, Deserialize)]
pub struct SearchLoansQuery {
    pub q: String,
}

/// Round `total / payments` to whole cents, half away from zero.
///
/// The installment contract is fixed at creation; this mirrors what the chat
/// adapter shows the operator before confirming.
pub fn suggested_installment(total_amount: i64, number_of_payments: i64) -> i64 {
    debug_assert!(number_of_payments > 0);
    (total_amount + number_of_payments / 2) / number_of_payments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggested_installment_exact_division() {
        // 1200.00 over 12 payments -> 100.00
        assert_eq!(suggested_installment(120_000, 12), 10_000);
    }

    #[test]
    fn test_suggested_installment_rounds_half_up() {
        // 1.50 over 4 payments -> 0.375 -> 0.38
        assert_eq!(suggested_installment(150, 4), 38);
        // 1000.00 over 3 payments -> 333.33
        assert_eq!(suggested_installment(100_000, 3), 33_333);
    }

    #[test]
    fn test_adjust_direction_deserializes_lowercase() {
        let d: AdjustDirection = serde_json::from_str("\"increase\"").unwrap();
        assert_eq!(d, AdjustDirection::Increase);
        let d: AdjustDirection = serde_json::from_str("\"decrease\"").unwrap();
        assert_eq!(d, AdjustDirection::Decrease);
    }

    #[test]
    fn test_payment_frequency_roundtrip() {
        let f: PaymentFrequency = serde_json::from_str("\"monthly\"").unwrap();
        assert_eq!(f, PaymentFrequency::Monthly);
        assert_eq!(serde_json::to_string(&PaymentFrequency::Weekly).unwrap(), "\"weekly\"");
    }

    #[test]
    fn test_create_loan_request_validation() {
        let req = CreateLoanRequest {
            borrower_id: 1,
            total_amount: 0,
            payment_frequency: PaymentFrequency::Monthly,
            number_of_payments: 12,
            payment_amount: None,
        };
        assert!(validator::Validate::validate(&req).is_err());

        let req = CreateLoanRequest {
            total_amount: 120_000,
            ..req
        };
        assert!(validator::Validate::validate(&req).is_ok());
    }
}
