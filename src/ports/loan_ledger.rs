use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::commands::{CheckoutBook, ReturnLoan};
use crate::domain::{BookId, Borrower, LoanId, LoanStatus, UserId};

pub type Result<T> = std::result::Result<T, LoanLedgerError>;

/// 貸出台帳のエラー
///
/// ストレージ層の一意制約違反（二重貸出の敗者側）は `AlreadyBorrowed`
/// に変換されてここに現れる。内部エラーとして漏れることはない。
#[derive(Debug, Error)]
pub enum LoanLedgerError {
    /// 対象の蔵書が存在しない
    #[error("Book not found")]
    BookNotFound,

    /// 対象の貸出が存在しない
    #[error("Loan not found")]
    LoanNotFound,

    /// 貸出可能な蔵書が残っていない
    #[error("No copies of this book are currently available")]
    NoCopiesAvailable,

    /// 同じ蔵書の貸出中の貸出を既に持っている
    #[error("Borrower already has an active loan for this book")]
    AlreadyBorrowed,

    /// 既に返却済み
    #[error("Loan has already been returned")]
    AlreadyReturned,

    /// 職員権限がなく、自分の貸出でもない
    #[error("Actor is not permitted to return this loan")]
    NotPermitted,

    /// ストレージのエラー
    #[error("Storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// 表示用に蔵書情報を非正規化した貸出
///
/// チェックアウト・返却・一覧はすべてこの形で貸出を返す。
#[derive(Debug, Clone, PartialEq)]
pub struct LoanDetails {
    pub id: LoanId,
    pub book_id: BookId,
    pub borrower: Borrower,
    pub status: LoanStatus,
    pub borrowed_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub processed_by: UserId,
    pub book_title: String,
    pub book_author: String,
    pub book_cover_image_url: Option<String>,
}

/// 貸出一覧のフィルタ
#[derive(Debug, Clone, Default)]
pub struct LoanFilter {
    /// 登録利用者IDで絞り込む
    pub borrower_user_id: Option<UserId>,
    /// 蔵書IDで絞り込む
    pub book_id: Option<BookId>,
    /// ステータスで絞り込む
    pub status: Option<LoanStatus>,
}

/// 貸出一覧の再開境界：(borrowed_at, id)、ソートは常に降順
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoanBoundary {
    pub ts: DateTime<Utc>,
    pub id: Uuid,
}

/// 貸出台帳ポート
///
/// チェックアウトと返却はそれぞれ1つのストレージトランザクションとして
/// 実行される。2つのコミットにまたがる操作は存在しない。
#[async_trait]
pub trait LoanLedger: Send + Sync {
    /// 蔵書を貸し出す
    ///
    /// 蔵書行をロックした上で在庫を検証・減算し、貸出行を挿入する。
    /// 登録利用者の二重貸出は事前チェックと部分ユニーク索引の両方で
    /// 防がれる。
    async fn checkout(&self, cmd: CheckoutBook) -> Result<LoanDetails>;

    /// 貸出を返却する
    ///
    /// 貸出行→蔵書行の順にロックし、終端遷移と在庫の加算を
    /// 同一トランザクションで行う。
    async fn return_loan(&self, cmd: ReturnLoan) -> Result<LoanDetails>;

    /// フィルタ・境界付きで貸出を列挙する（borrowed_at 降順、id 降順）
    ///
    /// 呼び出し側は次ページ有無の判定のために limit + 1 行を要求する。
    async fn list(
        &self,
        filter: &LoanFilter,
        boundary: Option<LoanBoundary>,
        fetch_limit: i64,
    ) -> Result<Vec<LoanDetails>>;
}
