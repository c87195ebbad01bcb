use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, PgPool};

use crate::domain::commands::{CheckoutBook, ReturnLoan};
use crate::domain::loan::{self, Loan};
use crate::domain::{LoanId, ReturnPolicyError};
use crate::ports::loan_ledger::{
    LoanBoundary, LoanDetails, LoanFilter, LoanLedger as LoanLedgerTrait, LoanLedgerError, Result,
};

use super::rows::map_loan_details_row;
use super::{inventory, locking};

/// Partial unique index guarding the one-active-loan-per-borrower-per-book
/// invariant. Its violation is the losing side of a checkout race and maps
/// to `AlreadyBorrowed`, never to an internal error.
const ACTIVE_LOAN_UNIQUE_IDX: &str = "ix_loans_active_user_unique";

fn storage(e: sqlx::Error) -> LoanLedgerError {
    LoanLedgerError::Storage(Box::new(e))
}

/// PostgreSQL implementation of the loan ledger
///
/// Each operation runs inside a single transaction; an early error return
/// drops the transaction, which rolls it back and releases every row lock
/// without observable partial effects.
pub struct LoanLedger {
    pool: PgPool,
}

impl LoanLedger {
    /// Create a new LoanLedger with a PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Unlocked read: does the borrower already hold an active loan of this book?
async fn active_loan_exists(
    conn: &mut PgConnection,
    borrower_user_id: &str,
    book_id: uuid::Uuid,
) -> sqlx::Result<bool> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM loans
        WHERE borrower_user_id = $1
          AND book_id = $2
          AND status = 'borrowed'
        "#,
    )
    .bind(borrower_user_id)
    .bind(book_id)
    .fetch_one(conn)
    .await?;

    Ok(count > 0)
}

/// Insert a new loan row, translating a violation of the active-loan unique
/// index into the `AlreadyBorrowed` conflict the pre-check would have raised.
async fn insert_loan(conn: &mut PgConnection, loan: &Loan) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO loans (
            id,
            book_id,
            borrower_user_id,
            borrower_name,
            processed_by,
            status,
            borrowed_at,
            returned_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(loan.id.value())
    .bind(loan.book_id.value())
    .bind(loan.borrower.user_id().map(|u| u.as_str()))
    .bind(loan.borrower.name())
    .bind(loan.processed_by.as_str())
    .bind(loan.status.as_str())
    .bind(loan.borrowed_at)
    .bind(loan.returned_at)
    .execute(conn)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db)
            if db.is_unique_violation() && db.constraint() == Some(ACTIVE_LOAN_UNIQUE_IDX) =>
        {
            LoanLedgerError::AlreadyBorrowed
        }
        _ => storage(e),
    })?;

    Ok(())
}

/// Re-read a loan joined with its book for the denormalized result value.
async fn fetch_details(conn: &mut PgConnection, loan_id: LoanId) -> Result<LoanDetails> {
    let row = sqlx::query(
        r#"
        SELECT
            l.id,
            l.book_id,
            l.borrower_user_id,
            l.borrower_name,
            l.processed_by,
            l.status,
            l.borrowed_at,
            l.returned_at,
            b.title AS book_title,
            b.author AS book_author,
            b.cover_image_url AS book_cover_image_url
        FROM loans l
        JOIN books b ON b.id = l.book_id
        WHERE l.id = $1
        "#,
    )
    .bind(loan_id.value())
    .fetch_one(conn)
    .await
    .map_err(storage)?;

    map_loan_details_row(&row).map_err(LoanLedgerError::Storage)
}

#[async_trait]
impl LoanLedgerTrait for LoanLedger {
    async fn checkout(&self, cmd: CheckoutBook) -> Result<LoanDetails> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        // 1. Lock the book row; concurrent checkouts of the same book
        //    serialize here.
        let book = locking::lock_book(&mut tx, cmd.book_id)
            .await
            .map_err(LoanLedgerError::Storage)?
            .ok_or(LoanLedgerError::BookNotFound)?;

        // 2. Already-borrowed pre-check for registered borrowers. This read
        //    is deliberately unlocked; the partial unique index is the
        //    authoritative guard (see insert_loan). Anonymous borrowers are
        //    exempt from the uniqueness rule.
        if let Some(user_id) = cmd.borrower.user_id() {
            let exists = active_loan_exists(&mut tx, user_id.as_str(), cmd.book_id.value())
                .await
                .map_err(storage)?;
            if exists {
                return Err(LoanLedgerError::AlreadyBorrowed);
            }
        }

        // 3. Availability check under the book lock.
        if book.available_copies <= 0 {
            return Err(LoanLedgerError::NoCopiesAvailable);
        }

        // 4. Move one unit from the shelf to the ledger.
        inventory::adjust(&mut tx, &book, -1)
            .await
            .map_err(LoanLedgerError::Storage)?;

        let loan = loan::checkout(cmd.book_id, cmd.borrower, cmd.actor.id, Utc::now());
        insert_loan(&mut tx, &loan).await?;

        let details = fetch_details(&mut tx, loan.id).await?;
        tx.commit().await.map_err(storage)?;

        Ok(details)
    }

    async fn return_loan(&self, cmd: ReturnLoan) -> Result<LoanDetails> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        // Lock order: the loan's own row first, then its book row
        // (see the locking module).
        let loan = locking::lock_loan(&mut tx, cmd.loan_id)
            .await
            .map_err(LoanLedgerError::Storage)?
            .ok_or(LoanLedgerError::LoanNotFound)?;

        loan::authorize_return(&loan, &cmd.actor).map_err(|e| match e {
            ReturnPolicyError::NotPermitted => LoanLedgerError::NotPermitted,
            ReturnPolicyError::AlreadyReturned => LoanLedgerError::AlreadyReturned,
        })?;

        let book_id = loan.book_id;
        let returned = loan::mark_returned(loan, Utc::now()).map_err(|e| match e {
            ReturnPolicyError::AlreadyReturned => LoanLedgerError::AlreadyReturned,
            ReturnPolicyError::NotPermitted => LoanLedgerError::NotPermitted,
        })?;

        sqlx::query(
            r#"
            UPDATE loans
            SET status = $2, returned_at = $3
            WHERE id = $1
            "#,
        )
        .bind(returned.id.value())
        .bind(returned.status.as_str())
        .bind(returned.returned_at)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        // The RESTRICT foreign key guarantees the book row still exists;
        // a miss here means the store is inconsistent.
        let book = locking::lock_book(&mut tx, book_id)
            .await
            .map_err(LoanLedgerError::Storage)?
            .ok_or_else(|| {
                LoanLedgerError::Storage(Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("loan {} references missing book {}", returned.id.value(), book_id.value()),
                )))
            })?;

        inventory::adjust(&mut tx, &book, 1)
            .await
            .map_err(LoanLedgerError::Storage)?;

        let details = fetch_details(&mut tx, returned.id).await?;
        tx.commit().await.map_err(storage)?;

        Ok(details)
    }

    async fn list(
        &self,
        filter: &LoanFilter,
        boundary: Option<LoanBoundary>,
        fetch_limit: i64,
    ) -> Result<Vec<LoanDetails>> {
        let (ts, id) = match boundary {
            Some(b) => (Some(b.ts), Some(b.id)),
            None => (None, None),
        };

        let rows = sqlx::query(
            r#"
            SELECT
                l.id,
                l.book_id,
                l.borrower_user_id,
                l.borrower_name,
                l.processed_by,
                l.status,
                l.borrowed_at,
                l.returned_at,
                b.title AS book_title,
                b.author AS book_author,
                b.cover_image_url AS book_cover_image_url
            FROM loans l
            JOIN books b ON b.id = l.book_id
            WHERE ($1::text IS NULL OR l.borrower_user_id = $1)
              AND ($2::uuid IS NULL OR l.book_id = $2)
              AND ($3::text IS NULL OR l.status = $3)
              AND ($4::timestamptz IS NULL
                   OR (l.borrowed_at, l.id) < ($4::timestamptz, $5::uuid))
            ORDER BY l.borrowed_at DESC, l.id DESC
            LIMIT $6
            "#,
        )
        .bind(filter.borrower_user_id.as_ref().map(|u| u.as_str()))
        .bind(filter.book_id.map(|b| b.value()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(ts)
        .bind(id)
        .bind(fetch_limit)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter()
            .map(map_loan_details_row)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(LoanLedgerError::Storage)
    }
}
