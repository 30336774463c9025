//! Loan service layer - Business logic for the loan ledger
//!
//! All read-then-write sequences run inside a transaction so concurrent
//! requests cannot create duplicate borrowers or lose count updates.

use sqlx::SqlitePool;
use sqlx::types::chrono::Utc;
use thiserror::Error;

use crate::error::ApiError;
use crate::models::{AdjustDirection, Loan, LoanStatus, LoanView, NewLoan};

/// Loan engine errors
#[derive(Error, Debug)]
pub enum LoanError {
    #[error("Borrower {0} not found")]
    BorrowerNotFound(i64),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("Loan {0} is completed and can no longer be adjusted")]
    LoanCompleted(i64),

    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),
}

impl From<LoanError> for ApiError {
    fn from(e: LoanError) -> Self {
        match e {
            LoanError::BorrowerNotFound(_) => ApiError::NotFound(e.to_string()),
            LoanError::InvalidArgument(msg) => ApiError::InvalidArgument(msg),
            LoanError::LoanCompleted(_) => ApiError::InvalidArgument(e.to_string()),
            LoanError::Store(err) => err.into(),
        }
    }
}

const LOAN_VIEW_COLUMNS: &str = r#"
    l.id, b.name AS borrower_name, l.total_amount, l.remaining_amount,
    l.payment_amount, l.payment_frequency, l.number_of_payments, l.status,
    l.created_at
"#;

/// Loan service for managing borrowers and the loan lifecycle
#[derive(Clone)]
pub struct LoanService {
    pool: SqlitePool,
}

impl LoanService {
    /// Create a new loan service instance
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find a borrower by case-insensitive exact name or create one.
    ///
    /// Names differing only by case resolve to the same borrower; the unique
    /// index on LOWER(name) backs this up under concurrent callers.
    pub async fn create_borrower(
        &self,
        name: &str,
        phone: Option<&str>,
    ) -> Result<i64, LoanError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LoanError::InvalidArgument(
                "borrower name must not be empty".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM borrowers WHERE LOWER(name) = LOWER(?)")
                .bind(name)
                .fetch_optional(&mut *tx)
                .await?;

        if let Some((id,)) = existing {
            tx.commit().await?;
            return Ok(id);
        }

        let inserted = sqlx::query_as::<_, (i64,)>(
            "INSERT INTO borrowers (name, phone, created_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(name)
        .bind(phone)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await;

        match inserted {
            Ok((id,)) => {
                tx.commit().await?;
                tracing::info!(borrower_id = id, "Created borrower");
                Ok(id)
            }
            // A concurrent request created the same name first; return theirs.
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                drop(tx);
                let (id,): (i64,) =
                    sqlx::query_as("SELECT id FROM borrowers WHERE LOWER(name) = LOWER(?)")
                        .bind(name)
                        .fetch_one(&self.pool)
                        .await?;
                Ok(id)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create a new loan for an existing borrower.
    ///
    /// `payment_amount` is stored as given; the caller owns the installment
    /// rounding, which fixes the contract for the life of the loan.
    pub async fn create_loan(&self, new: NewLoan) -> Result<i64, LoanError> {
        if new.total_amount <= 0 {
            return Err(LoanError::InvalidArgument(
                "total_amount must be positive".to_string(),
            ));
        }
        if new.number_of_payments <= 0 {
            return Err(LoanError::InvalidArgument(
                "number_of_payments must be positive".to_string(),
            ));
        }
        if new.payment_amount <= 0 {
            return Err(LoanError::InvalidArgument(
                "payment_amount must be positive".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let borrower: Option<(i64,)> = sqlx::query_as("SELECT id FROM borrowers WHERE id = ?")
            .bind(new.borrower_id)
            .fetch_optional(&mut *tx)
            .await?;

        if borrower.is_none() {
            return Err(LoanError::BorrowerNotFound(new.borrower_id));
        }

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO loans (
                borrower_id, total_amount, remaining_amount, payment_frequency,
                number_of_payments, payment_amount, status, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(new.borrower_id)
        .bind(new.total_amount)
        .bind(new.total_amount) // Initial remaining balance is the total
        .bind(new.payment_frequency)
        .bind(new.number_of_payments)
        .bind(new.payment_amount)
        .bind(LoanStatus::Active)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(loan_id = id, borrower_id = new.borrower_id, "Created loan");
        Ok(id)
    }

    /// List active loans, newest first, joined with the borrower name
    pub async fn list_active_loans(&self) -> Result<Vec<LoanView>, LoanError> {
        let loans = sqlx::query_as::<_, LoanView>(&format!(
            r#"
            SELECT {LOAN_VIEW_COLUMNS}
            FROM loans l
            JOIN borrowers b ON b.id = l.borrower_id
            WHERE l.status = ?
            ORDER BY l.created_at DESC, l.id DESC
            "#,
        ))
        .bind(LoanStatus::Active)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    /// Get a single loan regardless of status
    pub async fn get_loan_details(&self, loan_id: i64) -> Result<Option<LoanView>, LoanError> {
        let loan = sqlx::query_as::<_, LoanView>(&format!(
            r#"
            SELECT {LOAN_VIEW_COLUMNS}
            FROM loans l
            JOIN borrowers b ON b.id = l.borrower_id
            WHERE l.id = ?
            "#,
        ))
        .bind(loan_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(loan)
    }

    /// Case-insensitive substring search on borrower name, all statuses,
    /// newest first
    pub async fn search_loans_by_name(
        &self,
        fragment: &str,
    ) -> Result<Vec<LoanView>, LoanError> {
        let pattern = format!("%{}%", escape_like(&fragment.to_lowercase()));

        let loans = sqlx::query_as::<_, LoanView>(&format!(
            r#"
            SELECT {LOAN_VIEW_COLUMNS}
            FROM loans l
            JOIN borrowers b ON b.id = l.borrower_id
            WHERE LOWER(b.name) LIKE ? ESCAPE '\'
            ORDER BY l.created_at DESC, l.id DESC
            "#,
        ))
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    /// Step the remaining payment count up or down by one.
    ///
    /// Decreasing clamps at zero; increasing is unbounded. Returns None when
    /// the loan does not exist.
    pub async fn adjust_payment_count(
        &self,
        loan_id: i64,
        direction: AdjustDirection,
    ) -> Result<Option<LoanView>, LoanError> {
        let mut tx = self.pool.begin().await?;

        let loan: Option<Loan> = sqlx::query_as("SELECT * FROM loans WHERE id = ?")
            .bind(loan_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(loan) = loan else {
            return Ok(None);
        };

        let new_count = match direction {
            AdjustDirection::Increase => loan.number_of_payments + 1,
            AdjustDirection::Decrease => (loan.number_of_payments - 1).max(0),
        };

        Self::apply_payment_count(&mut tx, &loan, new_count).await?;
        tx.commit().await?;

        self.get_loan_details(loan_id).await
    }

    /// Set the remaining payment count outright.
    ///
    /// Returns false when the loan does not exist or the count is negative.
    /// Reaching zero is the terminal transition to `completed`.
    pub async fn set_payment_count(
        &self,
        loan_id: i64,
        new_count: i64,
    ) -> Result<bool, LoanError> {
        if new_count < 0 {
            return Ok(false);
        }

        let mut tx = self.pool.begin().await?;

        let loan: Option<Loan> = sqlx::query_as("SELECT * FROM loans WHERE id = ?")
            .bind(loan_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(loan) = loan else {
            return Ok(false);
        };

        Self::apply_payment_count(&mut tx, &loan, new_count).await?;
        tx.commit().await?;

        Ok(true)
    }

    /// Recompute the balance from the fixed installment and write the new
    /// count, forcing the completed state at zero.
    ///
    /// Completed loans are terminal: there is no path back to active, so any
    /// further mutation is rejected.
    async fn apply_payment_count(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        loan: &Loan,
        new_count: i64,
    ) -> Result<(), LoanError> {
        if loan.status == LoanStatus::Completed {
            return Err(LoanError::LoanCompleted(loan.id));
        }

        let (status, remaining) = if new_count == 0 {
            (LoanStatus::Completed, 0)
        } else {
            (loan.status, loan.payment_amount * new_count)
        };

        sqlx::query(
            r#"
            UPDATE loans
            SET number_of_payments = ?, remaining_amount = ?, status = ?
            WHERE id = ?
            "#,
        )
        .bind(new_count)
        .bind(remaining)
        .bind(status)
        .bind(loan.id)
        .execute(&mut **tx)
        .await?;

        if status == LoanStatus::Completed {
            tracing::info!(loan_id = loan.id, "Loan completed");
        }

        Ok(())
    }
}

/// Escape LIKE wildcards in a user-supplied fragment
fn escape_like(fragment: &str) -> String {
    fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
