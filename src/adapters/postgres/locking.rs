//! Row-locking discipline shared by the transactional operations.
//!
//! Locks are plain `SELECT ... FOR UPDATE` row locks, held until the caller's
//! transaction commits or rolls back. There is no in-process mutual exclusion
//! on top of them.
//!
//! Global acquisition order, to keep checkout and return deadlock-free:
//!
//! 1. Within one operation, a loan row (if any) is locked before the book
//!    row, and only the loan's own book row may be locked after it.
//! 2. Checkout locks no loan row at all; it only ever holds one book lock.
//! 3. Return locks its own loan row, then that loan's book row.
//!
//! A transaction therefore never waits for a book lock while holding a lock
//! on an unrelated entity, so no cycle between concurrent checkouts and
//! returns can form.

use sqlx::PgConnection;

use crate::domain::book::Book;
use crate::domain::loan::Loan;
use crate::domain::{BookId, LoanId};

use super::rows::{BoxError, map_book_row, map_loan_row};

/// Lock a book row for the remainder of the caller's transaction.
///
/// Every read of `available_copies` that feeds a mutation decision must go
/// through this lock.
pub(super) async fn lock_book(
    conn: &mut PgConnection,
    id: BookId,
) -> Result<Option<Book>, BoxError> {
    let row = sqlx::query(
        r#"
        SELECT
            id,
            title,
            author,
            description,
            isbn,
            published_year,
            available_copies,
            cover_image_url,
            created_at,
            updated_at
        FROM books
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id.value())
    .fetch_optional(conn)
    .await?;

    row.as_ref().map(map_book_row).transpose()
}

/// Lock a loan row for the remainder of the caller's transaction.
pub(super) async fn lock_loan(
    conn: &mut PgConnection,
    id: LoanId,
) -> Result<Option<Loan>, BoxError> {
    let row = sqlx::query(
        r#"
        SELECT
            id,
            book_id,
            borrower_user_id,
            borrower_name,
            processed_by,
            status,
            borrowed_at,
            returned_at
        FROM loans
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id.value())
    .fetch_optional(conn)
    .await?;

    row.as_ref().map(map_loan_row).transpose()
}
