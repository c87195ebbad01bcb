mod errors;
mod lending_service;

pub use errors::{LendingError, Result};
pub use lending_service::{
    LoanListQuery, ServiceDependencies, checkout_book, create_book, delete_book, get_book,
    list_books, list_loans, return_loan,
};
