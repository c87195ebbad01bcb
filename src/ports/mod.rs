pub mod book_repository;
pub mod loan_ledger;

pub use book_repository::*;
pub use loan_ledger::*;
