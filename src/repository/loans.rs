//! Loans repository for database operations

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::{
        id::RecordId,
        inventory::{StockDirection, StockMovement},
        loan::{Loan, LoanChange, LoanFilter, LoanRow, LoanState, NewLoan},
    },
};

/// Loan persistence. Every write that touches a book's quantity goes
/// through `apply` or `delete` so the two records change together.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoansStore: Send + Sync {
    async fn get(&self, id: RecordId) -> AppResult<Option<Loan>>;
    async fn insert(&self, loan: &NewLoan) -> AppResult<Loan>;
    /// Matching loans in collection order (creation time, then id)
    async fn find(&self, filter: LoanFilter) -> AppResult<Vec<Loan>>;
    /// Persist a lifecycle change and its stock movement atomically.
    ///
    /// Fails with `InvalidTransition` when the loan is no longer in
    /// `change.expected`, `InsufficientInventory` when a debit would take the
    /// book below zero and `NotFound` when the loan or book is gone. Nothing
    /// is written on failure.
    async fn apply(&self, change: &LoanChange) -> AppResult<Loan>;
    /// Remove a loan still in `expected`, optionally applying a stock movement
    /// in the same unit. Returns false when the loan did not exist.
    async fn delete(
        &self,
        id: RecordId,
        expected: LoanState,
        movement: Option<StockMovement>,
    ) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgLoansStore {
    pool: Pool<Postgres>,
}

impl PgLoansStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Guarded quantity update. Debits only apply while enough copies remain.
    async fn move_stock(
        tx: &mut Transaction<'_, Postgres>,
        movement: &StockMovement,
    ) -> AppResult<()> {
        let sql = match movement.direction {
            StockDirection::Debit => {
                r#"
                UPDATE books SET quantity = quantity - $1, updated_at = $3
                WHERE id = $2 AND quantity >= $1
                RETURNING quantity
                "#
            }
            StockDirection::Credit => {
                r#"
                UPDATE books SET quantity = quantity + $1, updated_at = $3
                WHERE id = $2
                RETURNING quantity
                "#
            }
        };

        let updated: Option<i32> = sqlx::query_scalar(sql)
            .bind(movement.amount)
            .bind(movement.book_id)
            .bind(Utc::now())
            .fetch_optional(&mut **tx)
            .await?;

        if updated.is_some() {
            return Ok(());
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
            .bind(movement.book_id)
            .fetch_one(&mut **tx)
            .await?;

        if exists {
            Err(AppError::InsufficientInventory(format!(
                "Not enough copies of book {} available",
                movement.book_id
            )))
        } else {
            Err(AppError::NotFound(format!(
                "Book with id {} not found",
                movement.book_id
            )))
        }
    }
}

#[async_trait]
impl LoansStore for PgLoansStore {
    async fn get(&self, id: RecordId) -> AppResult<Option<Loan>> {
        sqlx::query_as::<_, LoanRow>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Loan::try_from)
            .transpose()
    }

    async fn insert(&self, loan: &NewLoan) -> AppResult<Loan> {
        let now = Utc::now();

        let row = sqlx::query_as::<_, LoanRow>(
            r#"
            INSERT INTO loans (id, book_id, student_id, quantity, loan_date,
                               expect_return_date, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *
            "#,
        )
        .bind(RecordId::new())
        .bind(loan.book_id)
        .bind(loan.student_id)
        .bind(loan.quantity)
        .bind(loan.loan_date)
        .bind(loan.expect_return_date)
        .bind(LoanState::Pending.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Loan::try_from(row)
    }

    async fn find(&self, filter: LoanFilter) -> AppResult<Vec<Loan>> {
        let rows = sqlx::query_as::<_, LoanRow>(
            r#"
            SELECT * FROM loans
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR student_id = $2)
            ORDER BY created_at, id
            "#,
        )
        .bind(filter.state.map(|s| s.as_str()))
        .bind(filter.student_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Loan::try_from).collect()
    }

    async fn apply(&self, change: &LoanChange) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, LoanRow>(
            r#"
            UPDATE loans
            SET status = $1, return_date = $2, returned_at = $3,
                rejection_reason = $4, updated_at = $5
            WHERE id = $6 AND status = $7
            RETURNING *
            "#,
        )
        .bind(change.status.state().as_str())
        .bind(change.status.return_date())
        .bind(change.status.returned_at())
        .bind(change.status.rejection_reason())
        .bind(Utc::now())
        .bind(change.loan_id)
        .bind(change.expected.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let row = match row {
            Some(row) => row,
            None => {
                let current: Option<String> =
                    sqlx::query_scalar("SELECT status FROM loans WHERE id = $1")
                        .bind(change.loan_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                return Err(match current {
                    Some(status) => AppError::InvalidTransition(format!(
                        "Loan {} is {}, expected {}",
                        change.loan_id, status, change.expected
                    )),
                    None => AppError::NotFound(format!("Loan with id {} not found", change.loan_id)),
                });
            }
        };

        if let Some(movement) = &change.movement {
            Self::move_stock(&mut tx, movement).await?;
        }

        tx.commit().await?;

        Loan::try_from(row)
    }

    async fn delete(
        &self,
        id: RecordId,
        expected: LoanState,
        movement: Option<StockMovement>,
    ) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM loans WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(expected.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if !deleted {
            let current: Option<String> =
                sqlx::query_scalar("SELECT status FROM loans WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
            return match current {
                Some(status) => Err(AppError::InvalidTransition(format!(
                    "Loan {} is {}, expected {}",
                    id, status, expected
                ))),
                None => Ok(false),
            };
        }

        if let Some(movement) = &movement {
            Self::move_stock(&mut tx, movement).await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}
