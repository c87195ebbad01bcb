use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::BookId;
use crate::domain::book::{Book, NewBook};

pub type Result<T> = std::result::Result<T, BookRepositoryError>;

/// 蔵書リポジトリのエラー
#[derive(Debug, Error)]
pub enum BookRepositoryError {
    /// 蔵書が存在しない
    #[error("Book not found")]
    NotFound,

    /// 貸出履歴（返却済みを含む）が参照しているため削除できない
    #[error("Book is referenced by loan history and cannot be deleted")]
    HasLoanHistory,

    /// ストレージのエラー
    #[error("Storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// 蔵書一覧のフィルタ
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    /// タイトルまたは著者に対する部分一致検索
    pub search: Option<String>,
    /// 著者に対する部分一致検索
    pub author: Option<String>,
    /// 貸出可能（available_copies > 0）な蔵書のみ
    pub available_only: bool,
}

/// 蔵書一覧のソート順
///
/// それぞれに固有の境界述語とタイブレークを持つ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookSort {
    /// 登録日時の降順（既定）。タイブレークは id 降順。
    #[default]
    CreatedAtDesc,
    /// 登録日時の昇順。タイブレークは id 昇順。
    CreatedAtAsc,
    /// タイトル（小文字化）の昇順。タイブレークは id 昇順。
    TitleAsc,
}

/// キーセットページングの再開境界
///
/// 前のページの最終行のソートキーから構築される。境界は再開位置で
/// あって認可境界ではない。
#[derive(Debug, Clone, PartialEq)]
pub enum BookBoundary {
    /// createdAt 系ソートの境界：(created_at, id)
    CreatedAt { ts: DateTime<Utc>, id: Uuid },
    /// title:asc ソートの境界：(lower(title), id)
    Title { title: String, id: Uuid },
}

/// 蔵書リポジトリポート
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// 蔵書を登録する
    async fn create(&self, book: NewBook) -> Result<Book>;

    /// IDで蔵書を取得する
    async fn get(&self, id: BookId) -> Result<Option<Book>>;

    /// 蔵書を削除する
    ///
    /// 貸出行（ステータス不問）が1件でも参照していれば
    /// `HasLoanHistory` で拒否する。
    async fn delete(&self, id: BookId) -> Result<()>;

    /// フィルタ・ソート・境界付きで蔵書を列挙する
    ///
    /// 呼び出し側は次ページ有無の判定のために limit + 1 行を要求する。
    async fn list(
        &self,
        filter: &BookFilter,
        sort: BookSort,
        boundary: Option<&BookBoundary>,
        fetch_limit: i64,
    ) -> Result<Vec<Book>>;
}
