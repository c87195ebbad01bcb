use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, BookValidationError, InventoryError};

/// 蔵書
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub isbn: Option<String>,
    pub published_year: Option<i32>,
    /// 貸出可能冊数。外部から観測されるどの時点でも 0 以上。
    pub available_copies: i32,
    pub cover_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 蔵書の登録内容
///
/// `new` で一度だけ検証して構築する。検証済みの値以外は存在しない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub isbn: Option<String>,
    pub published_year: Option<i32>,
    pub available_copies: i32,
}

impl NewBook {
    /// バリデーション付きで登録内容を構築する
    ///
    /// ビジネスルール：
    /// - タイトル・著者は前後の空白を除去し、空は拒否
    /// - 蔵書数は 0 以上（0 冊での登録は許す：入荷前の目録登録）
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        available_copies: i32,
    ) -> Result<Self, BookValidationError> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(BookValidationError::EmptyTitle);
        }

        let author = author.into().trim().to_string();
        if author.is_empty() {
            return Err(BookValidationError::EmptyAuthor);
        }

        if available_copies < 0 {
            return Err(BookValidationError::NegativeCopies);
        }

        Ok(Self {
            title,
            author,
            description: None,
            isbn: None,
            published_year: None,
            available_copies,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = Some(isbn.into());
        self
    }

    pub fn with_published_year(mut self, year: i32) -> Self {
        self.published_year = Some(year);
        self
    }
}

/// 純粋関数：貸出可能冊数に増減を適用する
///
/// 不変条件：適用結果が負になる調整は拒否する。
/// 呼び出し側は対象の蔵書行のロックを保持していること。
pub fn adjust_copies(available: i32, delta: i32) -> Result<i32, InventoryError> {
    let next = available + delta;
    if next < 0 {
        return Err(InventoryError::WouldGoNegative);
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    // TDD: NewBook::new のテスト
    #[test]
    fn test_new_book_trims_title_and_author() {
        let book = NewBook::new("  吾輩は猫である ", " 夏目漱石 ", 3).unwrap();
        assert_eq!(book.title, "吾輩は猫である");
        assert_eq!(book.author, "夏目漱石");
        assert_eq!(book.available_copies, 3);
    }

    #[test]
    fn test_new_book_rejects_empty_title() {
        let result = NewBook::new("   ", "Author", 1);
        assert_eq!(result.unwrap_err(), BookValidationError::EmptyTitle);
    }

    #[test]
    fn test_new_book_rejects_empty_author() {
        let result = NewBook::new("Title", "", 1);
        assert_eq!(result.unwrap_err(), BookValidationError::EmptyAuthor);
    }

    #[test]
    fn test_new_book_rejects_negative_copies() {
        let result = NewBook::new("Title", "Author", -1);
        assert_eq!(result.unwrap_err(), BookValidationError::NegativeCopies);
    }

    #[test]
    fn test_new_book_allows_zero_copies() {
        let book = NewBook::new("Title", "Author", 0).unwrap();
        assert_eq!(book.available_copies, 0);
    }

    // TDD: adjust_copies のテスト
    #[test]
    fn test_adjust_copies_decrement() {
        assert_eq!(adjust_copies(1, -1).unwrap(), 0);
        assert_eq!(adjust_copies(5, -1).unwrap(), 4);
    }

    #[test]
    fn test_adjust_copies_increment() {
        assert_eq!(adjust_copies(0, 1).unwrap(), 1);
    }

    #[test]
    fn test_adjust_copies_refuses_negative_result() {
        assert_eq!(
            adjust_copies(0, -1).unwrap_err(),
            InventoryError::WouldGoNegative
        );
    }
}
