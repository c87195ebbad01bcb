use std::str::FromStr;

use sqlx::{Row, postgres::PgRow};

use crate::domain::book::Book;
use crate::domain::loan::Loan;
use crate::domain::{BookId, Borrower, LoanId, LoanStatus, UserId};
use crate::ports::loan_ledger::LoanDetails;

pub(super) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Turn an inconsistent row into a mapping error instead of a panic.
fn invalid_data(message: String) -> BoxError {
    Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message))
}

/// Reassemble the borrower union from its two storage columns.
///
/// The columns are written from an already-validated `Borrower`, so a row
/// violating the exactly-one rule means corrupted data, not user input.
fn map_borrower(
    user_id: Option<String>,
    name: Option<String>,
    loan_id: LoanId,
) -> Result<Borrower, BoxError> {
    Borrower::from_parts(user_id, name)
        .map_err(|e| invalid_data(format!("loan {} has invalid borrower columns: {:?}", loan_id.value(), e)))
}

fn map_status(status: &str, loan_id: LoanId) -> Result<LoanStatus, BoxError> {
    LoanStatus::from_str(status)
        .map_err(|e| invalid_data(format!("loan {}: {}", loan_id.value(), e)))
}

pub(super) fn map_book_row(row: &PgRow) -> Result<Book, BoxError> {
    Ok(Book {
        id: BookId::from_uuid(row.try_get("id")?),
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        description: row.try_get("description")?,
        isbn: row.try_get("isbn")?,
        published_year: row.try_get("published_year")?,
        available_copies: row.try_get("available_copies")?,
        cover_image_url: row.try_get("cover_image_url")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub(super) fn map_loan_row(row: &PgRow) -> Result<Loan, BoxError> {
    let id = LoanId::from_uuid(row.try_get("id")?);
    let status: String = row.try_get("status")?;

    Ok(Loan {
        id,
        book_id: BookId::from_uuid(row.try_get("book_id")?),
        borrower: map_borrower(
            row.try_get("borrower_user_id")?,
            row.try_get("borrower_name")?,
            id,
        )?,
        status: map_status(&status, id)?,
        borrowed_at: row.try_get("borrowed_at")?,
        returned_at: row.try_get("returned_at")?,
        processed_by: UserId::new(row.try_get::<String, _>("processed_by")?),
    })
}

/// Map a loans-joined-with-books row into the denormalized view.
pub(super) fn map_loan_details_row(row: &PgRow) -> Result<LoanDetails, BoxError> {
    let id = LoanId::from_uuid(row.try_get("id")?);
    let status: String = row.try_get("status")?;

    Ok(LoanDetails {
        id,
        book_id: BookId::from_uuid(row.try_get("book_id")?),
        borrower: map_borrower(
            row.try_get("borrower_user_id")?,
            row.try_get("borrower_name")?,
            id,
        )?,
        status: map_status(&status, id)?,
        borrowed_at: row.try_get("borrowed_at")?,
        returned_at: row.try_get("returned_at")?,
        processed_by: UserId::new(row.try_get::<String, _>("processed_by")?),
        book_title: row.try_get("book_title")?,
        book_author: row.try_get("book_author")?,
        book_cover_image_url: row.try_get("book_cover_image_url")?,
    })
}
