use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use crate::domain::BookId;
use crate::domain::book::{Book, NewBook};
use crate::ports::book_repository::{
    BookBoundary, BookFilter, BookRepository as BookRepositoryTrait, BookRepositoryError, BookSort,
    Result,
};

use super::rows::map_book_row;

fn storage(e: sqlx::Error) -> BookRepositoryError {
    BookRepositoryError::Storage(Box::new(e))
}

/// BookRepositoryのPostgreSQL実装
pub struct BookRepository {
    pool: PgPool,
}

impl BookRepository {
    /// PostgreSQLコネクションプールから新しいBookRepositoryを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookRepositoryTrait for BookRepository {
    /// 蔵書を登録する
    ///
    /// IDとタイムスタンプはここで採番・打刻し、登録済みの蔵書を返す。
    async fn create(&self, book: NewBook) -> Result<Book> {
        let id = BookId::new();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO books (
                id,
                title,
                author,
                description,
                isbn,
                published_year,
                available_copies,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(id.value())
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.description)
        .bind(&book.isbn)
        .bind(book.published_year)
        .bind(book.available_copies)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(Book {
            id,
            title: book.title,
            author: book.author,
            description: book.description,
            isbn: book.isbn,
            published_year: book.published_year,
            available_copies: book.available_copies,
            cover_image_url: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// IDで蔵書を取得する
    async fn get(&self, id: BookId) -> Result<Option<Book>> {
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
            "#,
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.as_ref()
            .map(map_book_row)
            .transpose()
            .map_err(BookRepositoryError::Storage)
    }

    /// 蔵書を削除する
    ///
    /// loans.book_id は ON DELETE RESTRICT なので、貸出履歴のある蔵書の
    /// 削除は外部キー違反になる。それを HasLoanHistory に変換する。
    async fn delete(&self, id: BookId) -> Result<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id.value())
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(BookRepositoryError::NotFound),
            Ok(_) => Ok(()),
            Err(e) => match &e {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    Err(BookRepositoryError::HasLoanHistory)
                }
                _ => Err(storage(e)),
            },
        }
    }

    /// フィルタ・ソート・境界付きで蔵書を列挙する
    ///
    /// 境界述語は行値比較で表現する：
    /// - createdAt:desc → (created_at, id) < (境界.ts, 境界.id)
    /// - createdAt:asc  → (created_at, id) > (境界.ts, 境界.id)
    /// - title:asc      → (lower(title), id) > (境界.title, 境界.id)
    ///
    /// ソートと異なる形の境界は無視して先頭ページとして扱う。
    async fn list(
        &self,
        filter: &BookFilter,
        sort: BookSort,
        boundary: Option<&BookBoundary>,
        fetch_limit: i64,
    ) -> Result<Vec<Book>> {
        let search = filter.search.as_ref().map(|q| format!("%{}%", q));
        let author = filter.author.as_ref().map(|a| format!("%{}%", a));

        let rows = match sort {
            BookSort::CreatedAtDesc => {
                let (ts, id) = match boundary {
                    Some(BookBoundary::CreatedAt { ts, id }) => (Some(*ts), Some(*id)),
                    _ => (None, None),
                };
                sqlx::query(
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
                    WHERE ($1::text IS NULL OR title ILIKE $1 OR author ILIKE $1)
                      AND ($2::text IS NULL OR author ILIKE $2)
                      AND (NOT $3 OR available_copies > 0)
                      AND ($4::timestamptz IS NULL
                           OR (created_at, id) < ($4::timestamptz, $5::uuid))
                    ORDER BY created_at DESC, id DESC
                    LIMIT $6
                    "#,
                )
                .bind(&search)
                .bind(&author)
                .bind(filter.available_only)
                .bind(ts)
                .bind(id)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
            BookSort::CreatedAtAsc => {
                let (ts, id) = match boundary {
                    Some(BookBoundary::CreatedAt { ts, id }) => (Some(*ts), Some(*id)),
                    _ => (None, None),
                };
                sqlx::query(
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
                    WHERE ($1::text IS NULL OR title ILIKE $1 OR author ILIKE $1)
                      AND ($2::text IS NULL OR author ILIKE $2)
                      AND (NOT $3 OR available_copies > 0)
                      AND ($4::timestamptz IS NULL
                           OR (created_at, id) > ($4::timestamptz, $5::uuid))
                    ORDER BY created_at ASC, id ASC
                    LIMIT $6
                    "#,
                )
                .bind(&search)
                .bind(&author)
                .bind(filter.available_only)
                .bind(ts)
                .bind(id)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
            BookSort::TitleAsc => {
                let (title, id) = match boundary {
                    Some(BookBoundary::Title { title, id }) => (Some(title.clone()), Some(*id)),
                    _ => (None, None),
                };
                sqlx::query(
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
                    WHERE ($1::text IS NULL OR title ILIKE $1 OR author ILIKE $1)
                      AND ($2::text IS NULL OR author ILIKE $2)
                      AND (NOT $3 OR available_copies > 0)
                      AND ($4::text IS NULL
                           OR (lower(title), id) > ($4::text, $5::uuid))
                    ORDER BY lower(title) ASC, id ASC
                    LIMIT $6
                    "#,
                )
                .bind(&search)
                .bind(&author)
                .bind(filter.available_only)
                .bind(title)
                .bind(id)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(storage)?;

        rows.iter()
            .map(map_book_row)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(BookRepositoryError::Storage)
    }
}
