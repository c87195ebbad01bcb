use thiserror::Error;

use crate::domain::{BookValidationError, BorrowerError};
use crate::ports::book_repository::BookRepositoryError;
use crate::ports::loan_ledger::LoanLedgerError;

/// 貸出管理アプリケーション層のエラー
///
/// すべてのドメイン失敗は安定した機械可読コード（`code()`）に対応する。
/// ストレージ層の一意制約違反は台帳で AlreadyBorrowed に変換済みであり、
/// ここに内部エラーとして現れることはない。
#[derive(Debug, Error)]
pub enum LendingError {
    /// 蔵書が存在しない
    #[error("Book not found")]
    BookNotFound,

    /// 貸出が存在しない
    #[error("Loan not found")]
    LoanNotFound,

    /// 同じ蔵書の貸出中の貸出を既に持っている
    #[error("You already have an active loan for this book")]
    AlreadyBorrowed,

    /// 貸出可能な蔵書が残っていない
    #[error("No copies of this book are currently available")]
    BookUnavailable,

    /// 既に返却済み
    #[error("This loan has already been returned")]
    LoanAlreadyReturned,

    /// 貸出履歴（返却済みを含む）があるため削除できない
    #[error("This book has loan history and cannot be deleted")]
    BookHasLoans,

    /// 権限または所有権がない
    #[error("You do not have permission to perform this action")]
    Forbidden,

    /// 借受人の指定が不正（両方指定・両方未指定・空白）
    #[error("Invalid borrower reference")]
    InvalidBorrower(BorrowerError),

    /// 蔵書の登録内容が不正
    #[error("Invalid book payload")]
    InvalidBook(BookValidationError),

    /// ストレージのエラー
    #[error("Storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LendingError {
    /// 安定した機械可読エラーコード
    ///
    /// 境界（HTTP層など）はこのコードをそのままエラー契約に載せる。
    pub fn code(&self) -> &'static str {
        match self {
            LendingError::BookNotFound | LendingError::LoanNotFound => "NOT_FOUND",
            LendingError::AlreadyBorrowed => "ALREADY_BORROWED",
            LendingError::BookUnavailable => "BOOK_UNAVAILABLE",
            LendingError::LoanAlreadyReturned => "LOAN_ALREADY_RETURNED",
            LendingError::BookHasLoans => "BOOK_HAS_LOANS",
            LendingError::Forbidden => "FORBIDDEN",
            LendingError::InvalidBorrower(_) | LendingError::InvalidBook(_) => "VALIDATION_ERROR",
            LendingError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<LoanLedgerError> for LendingError {
    fn from(err: LoanLedgerError) -> Self {
        match err {
            LoanLedgerError::BookNotFound => LendingError::BookNotFound,
            LoanLedgerError::LoanNotFound => LendingError::LoanNotFound,
            LoanLedgerError::NoCopiesAvailable => LendingError::BookUnavailable,
            LoanLedgerError::AlreadyBorrowed => LendingError::AlreadyBorrowed,
            LoanLedgerError::AlreadyReturned => LendingError::LoanAlreadyReturned,
            LoanLedgerError::NotPermitted => LendingError::Forbidden,
            LoanLedgerError::Storage(e) => {
                // 内部エラーの詳細はログに残し、呼び出し側には一般的な形で返す
                tracing::error!("loan ledger storage error: {}", e);
                LendingError::Storage(e)
            }
        }
    }
}

impl From<BookRepositoryError> for LendingError {
    fn from(err: BookRepositoryError) -> Self {
        match err {
            BookRepositoryError::NotFound => LendingError::BookNotFound,
            BookRepositoryError::HasLoanHistory => LendingError::BookHasLoans,
            BookRepositoryError::Storage(e) => {
                tracing::error!("book repository storage error: {}", e);
                LendingError::Storage(e)
            }
        }
    }
}

impl From<BorrowerError> for LendingError {
    fn from(err: BorrowerError) -> Self {
        LendingError::InvalidBorrower(err)
    }
}

impl From<BookValidationError> for LendingError {
    fn from(err: BookValidationError) -> Self {
        LendingError::InvalidBook(err)
    }
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, LendingError>;
