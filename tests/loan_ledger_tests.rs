//! Loan engine behavior tests
//!
//! These run against an in-memory SQLite database with the real migrations,
//! covering borrower dedup, loan creation, payment-count transitions, and
//! search.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use loanbook_server::models::{AdjustDirection, LoanStatus, NewLoan, PaymentFrequency};
use loanbook_server::services::{LoanError, LoanService};

async fn setup() -> (SqlitePool, LoanService) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");

    let service = LoanService::new(pool.clone());
    (pool, service)
}

fn monthly_loan(borrower_id: i64, total: i64, payments: i64, installment: i64) -> NewLoan {
    NewLoan {
        borrower_id,
        total_amount: total,
        payment_frequency: PaymentFrequency::Monthly,
        number_of_payments: payments,
        payment_amount: installment,
    }
}

// ============================================================================
// Borrower dedup
// ============================================================================

#[tokio::test]
async fn test_create_borrower_is_idempotent_case_insensitive() {
    let (pool, service) = setup().await;

    let first = service.create_borrower("Alice", None).await.unwrap();
    let second = service.create_borrower("Alice", None).await.unwrap();
    let shouted = service.create_borrower("ALICE", Some("555-0100")).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first, shouted);

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM borrowers")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_create_borrower_rejects_empty_name() {
    let (_pool, service) = setup().await;

    let err = service.create_borrower("   ", None).await.unwrap_err();
    assert!(matches!(err, LoanError::InvalidArgument(_)));
}

// ============================================================================
// Loan creation
// ============================================================================

#[tokio::test]
async fn test_create_loan_then_details() {
    let (_pool, service) = setup().await;

    let borrower = service.create_borrower("Alice", None).await.unwrap();
    let loan_id = service
        .create_loan(monthly_loan(borrower, 50_000, 5, 10_000))
        .await
        .unwrap();

    let view = service.get_loan_details(loan_id).await.unwrap().unwrap();
    assert_eq!(view.borrower_name, "Alice");
    assert_eq!(view.total_amount, 50_000);
    assert_eq!(view.remaining_amount, 50_000);
    assert_eq!(view.payment_amount, 10_000);
    assert_eq!(view.number_of_payments, 5);
    assert_eq!(view.status, LoanStatus::Active);
}

#[tokio::test]
async fn test_create_loan_for_missing_borrower() {
    let (_pool, service) = setup().await;

    let err = service
        .create_loan(monthly_loan(999, 50_000, 5, 10_000))
        .await
        .unwrap_err();
    assert!(matches!(err, LoanError::BorrowerNotFound(999)));
}

#[tokio::test]
async fn test_create_loan_rejects_nonpositive_inputs() {
    let (_pool, service) = setup().await;
    let borrower = service.create_borrower("Alice", None).await.unwrap();

    let err = service
        .create_loan(monthly_loan(borrower, 0, 5, 10_000))
        .await
        .unwrap_err();
    assert!(matches!(err, LoanError::InvalidArgument(_)));

    let err = service
        .create_loan(monthly_loan(borrower, 50_000, 0, 10_000))
        .await
        .unwrap_err();
    assert!(matches!(err, LoanError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_get_loan_details_missing_is_none() {
    let (_pool, service) = setup().await;
    assert!(service.get_loan_details(42).await.unwrap().is_none());
}

// ============================================================================
// Payment count transitions
// ============================================================================

#[tokio::test]
async fn test_set_payment_count_zero_completes_loan() {
    let (_pool, service) = setup().await;
    let borrower = service.create_borrower("Alice", None).await.unwrap();
    let loan_id = service
        .create_loan(monthly_loan(borrower, 50_000, 5, 10_000))
        .await
        .unwrap();

    assert!(service.set_payment_count(loan_id, 0).await.unwrap());

    let view = service.get_loan_details(loan_id).await.unwrap().unwrap();
    assert_eq!(view.status, LoanStatus::Completed);
    assert_eq!(view.remaining_amount, 0);
    assert_eq!(view.number_of_payments, 0);
}

#[tokio::test]
async fn test_set_payment_count_recomputes_remaining() {
    let (_pool, service) = setup().await;
    let borrower = service.create_borrower("Alice", None).await.unwrap();
    let loan_id = service
        .create_loan(monthly_loan(borrower, 50_000, 5, 10_000))
        .await
        .unwrap();

    assert!(service.set_payment_count(loan_id, 3).await.unwrap());

    let view = service.get_loan_details(loan_id).await.unwrap().unwrap();
    assert_eq!(view.number_of_payments, 3);
    assert_eq!(view.remaining_amount, 30_000);
    assert_eq!(view.status, LoanStatus::Active);
}

#[tokio::test]
async fn test_set_payment_count_rejects_negative_and_missing() {
    let (_pool, service) = setup().await;
    let borrower = service.create_borrower("Alice", None).await.unwrap();
    let loan_id = service
        .create_loan(monthly_loan(borrower, 50_000, 5, 10_000))
        .await
        .unwrap();

    assert!(!service.set_payment_count(loan_id, -1).await.unwrap());
    assert!(!service.set_payment_count(999, 3).await.unwrap());

    // Neither call touched the loan.
    let view = service.get_loan_details(loan_id).await.unwrap().unwrap();
    assert_eq!(view.number_of_payments, 5);
}

#[tokio::test]
async fn test_decrease_never_goes_below_zero() {
    let (_pool, service) = setup().await;
    let borrower = service.create_borrower("Alice", None).await.unwrap();
    let loan_id = service
        .create_loan(monthly_loan(borrower, 10_000, 1, 10_000))
        .await
        .unwrap();

    let view = service
        .adjust_payment_count(loan_id, AdjustDirection::Decrease)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(view.number_of_payments, 0);
    assert_eq!(view.status, LoanStatus::Completed);

    // Completed is terminal; a further decrease is rejected rather than
    // driving the count negative.
    let err = service
        .adjust_payment_count(loan_id, AdjustDirection::Decrease)
        .await
        .unwrap_err();
    assert!(matches!(err, LoanError::LoanCompleted(_)));
}

#[tokio::test]
async fn test_increase_is_unbounded_above() {
    let (_pool, service) = setup().await;
    let borrower = service.create_borrower("Alice", None).await.unwrap();
    let loan_id = service
        .create_loan(monthly_loan(borrower, 20_000, 2, 10_000))
        .await
        .unwrap();

    let view = service
        .adjust_payment_count(loan_id, AdjustDirection::Increase)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(view.number_of_payments, 3);
    assert_eq!(view.remaining_amount, 30_000);
}

#[tokio::test]
async fn test_adjust_missing_loan_is_none() {
    let (_pool, service) = setup().await;
    assert!(service
        .adjust_payment_count(123, AdjustDirection::Increase)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_completed_loan_rejects_adjustment() {
    let (_pool, service) = setup().await;
    let borrower = service.create_borrower("Alice", None).await.unwrap();
    let loan_id = service
        .create_loan(monthly_loan(borrower, 50_000, 5, 10_000))
        .await
        .unwrap();

    assert!(service.set_payment_count(loan_id, 0).await.unwrap());

    // No path back to active: incrementing from zero is rejected.
    let err = service
        .adjust_payment_count(loan_id, AdjustDirection::Increase)
        .await
        .unwrap_err();
    assert!(matches!(err, LoanError::LoanCompleted(_)));

    let err = service.set_payment_count(loan_id, 5).await.unwrap_err();
    assert!(matches!(err, LoanError::LoanCompleted(_)));
}

#[tokio::test]
async fn test_twelve_monthly_installments_complete_the_loan() {
    let (_pool, service) = setup().await;
    let borrower = service.create_borrower("Bob", None).await.unwrap();

    // 1200.00 over 12 monthly payments of 100.00 each.
    let loan_id = service
        .create_loan(monthly_loan(borrower, 120_000, 12, 10_000))
        .await
        .unwrap();

    for expected_left in (1..=11).rev() {
        let view = service
            .adjust_payment_count(loan_id, AdjustDirection::Decrease)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.number_of_payments, expected_left);
        assert_eq!(view.remaining_amount, 10_000 * expected_left);
        assert_eq!(view.status, LoanStatus::Active);
    }

    // The 12th payment retires the loan.
    let view = service
        .adjust_payment_count(loan_id, AdjustDirection::Decrease)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(view.number_of_payments, 0);
    assert_eq!(view.remaining_amount, 0);
    assert_eq!(view.status, LoanStatus::Completed);
}

// ============================================================================
// Listing and search
// ============================================================================

#[tokio::test]
async fn test_list_active_is_newest_first_and_skips_completed() {
    let (_pool, service) = setup().await;
    let borrower = service.create_borrower("Alice", None).await.unwrap();

    let older = service
        .create_loan(monthly_loan(borrower, 10_000, 1, 10_000))
        .await
        .unwrap();
    let newer = service
        .create_loan(monthly_loan(borrower, 20_000, 2, 10_000))
        .await
        .unwrap();

    let loans = service.list_active_loans().await.unwrap();
    assert_eq!(
        loans.iter().map(|l| l.id).collect::<Vec<_>>(),
        vec![newer, older]
    );

    assert!(service.set_payment_count(newer, 0).await.unwrap());

    let loans = service.list_active_loans().await.unwrap();
    assert_eq!(loans.iter().map(|l| l.id).collect::<Vec<_>>(), vec![older]);
}

#[tokio::test]
async fn test_search_matches_substring_case_insensitively() {
    let (_pool, service) = setup().await;
    let alice = service.create_borrower("Alice Johnson", None).await.unwrap();
    let bob = service.create_borrower("Bob Marley", None).await.unwrap();

    let alice_loan = service
        .create_loan(monthly_loan(alice, 10_000, 1, 10_000))
        .await
        .unwrap();
    service
        .create_loan(monthly_loan(bob, 20_000, 2, 10_000))
        .await
        .unwrap();

    let hits = service.search_loans_by_name("ALICE").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, alice_loan);

    let hits = service.search_loans_by_name("john").await.unwrap();
    assert_eq!(hits.len(), 1);

    let hits = service.search_loans_by_name("zzz").await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_search_includes_completed_loans() {
    let (_pool, service) = setup().await;
    let alice = service.create_borrower("Alice", None).await.unwrap();
    let loan_id = service
        .create_loan(monthly_loan(alice, 10_000, 1, 10_000))
        .await
        .unwrap();

    assert!(service.set_payment_count(loan_id, 0).await.unwrap());

    let hits = service.search_loans_by_name("alice").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].status, LoanStatus::Completed);
}

#[tokio::test]
async fn test_search_treats_wildcards_literally() {
    let (_pool, service) = setup().await;
    let alice = service.create_borrower("Alice", None).await.unwrap();
    service
        .create_loan(monthly_loan(alice, 10_000, 1, 10_000))
        .await
        .unwrap();

    // "%" is not a match-everything wildcard from the caller's side.
    assert!(service.search_loans_by_name("%").await.unwrap().is_empty());
    assert!(service.search_loans_by_name("_").await.unwrap().is_empty());
}
