//! カーソル（キーセット）ページング
//!
//! カーソルは「最後に返した行のソートキー」をURLセーフなbase64で包んだ
//! 不透明トークン。オフセットではなく境界述語で再開するため、ページ取得の
//! 合間にテーブルが変化しても重複・欠落が生じない。
//!
//! カーソルは署名されない。認可境界ではなく再開位置にすぎず、リクエスト側の
//! フィルタ・権限を超えるアクセスは与えない。

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::domain::book::Book;
use crate::ports::book_repository::{BookBoundary, BookSort};
use crate::ports::loan_ledger::{LoanBoundary, LoanDetails};

/// createdAt 系ソートのカーソル内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeCursor {
    pub ts: DateTime<Utc>,
    pub id: Uuid,
}

/// title:asc ソートのカーソル内容（タイトルは小文字化して保持）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleCursor {
    pub title: String,
    pub id: Uuid,
}

/// ページングされた結果
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 次ページがあるときに限り存在する
    pub next_cursor: Option<String>,
}

/// カーソル内容をURLセーフなbase64文字列に符号化する
pub fn encode_cursor<T: Serialize>(payload: &T) -> String {
    let json = serde_json::to_vec(payload).expect("cursor payload serialization cannot fail");
    URL_SAFE_NO_PAD.encode(json)
}

/// カーソル文字列を復号する
///
/// 不正・解読不能なカーソルは None（= カーソルなし、先頭ページ）として
/// 扱う。エラーにはしない。
pub fn decode_cursor<T: DeserializeOwned>(cursor: &str) -> Option<T> {
    // パディング付きで符号化された過去のカーソルも受け付ける
    let trimmed = cursor.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(trimmed).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// ソート指定文字列を解釈する
///
/// 未知の値は既定（createdAt:desc）に倒す。エラーにはしない。
pub fn parse_book_sort(sort: Option<&str>) -> BookSort {
    match sort {
        Some("createdAt:asc") => BookSort::CreatedAtAsc,
        Some("title:asc") => BookSort::TitleAsc,
        _ => BookSort::CreatedAtDesc,
    }
}

/// 蔵書一覧のカーソルをソート順に応じた境界に復号する
pub fn decode_book_boundary(sort: BookSort, cursor: Option<&str>) -> Option<BookBoundary> {
    let cursor = cursor?;
    match sort {
        BookSort::CreatedAtDesc | BookSort::CreatedAtAsc => {
            let c: TimeCursor = decode_cursor(cursor)?;
            Some(BookBoundary::CreatedAt { ts: c.ts, id: c.id })
        }
        BookSort::TitleAsc => {
            let c: TitleCursor = decode_cursor(cursor)?;
            Some(BookBoundary::Title {
                title: c.title,
                id: c.id,
            })
        }
    }
}

/// 貸出一覧のカーソルを境界に復号する（ソートは borrowed_at 降順固定）
pub fn decode_loan_boundary(cursor: Option<&str>) -> Option<LoanBoundary> {
    let c: TimeCursor = decode_cursor(cursor?)?;
    Some(LoanBoundary { ts: c.ts, id: c.id })
}

/// 蔵書行から次ページ再開用のカーソルを符号化する
pub fn book_cursor(sort: BookSort, book: &Book) -> String {
    match sort {
        BookSort::CreatedAtDesc | BookSort::CreatedAtAsc => encode_cursor(&TimeCursor {
            ts: book.created_at,
            id: book.id.value(),
        }),
        BookSort::TitleAsc => encode_cursor(&TitleCursor {
            title: book.title.to_lowercase(),
            id: book.id.value(),
        }),
    }
}

/// 貸出行から次ページ再開用のカーソルを符号化する
pub fn loan_cursor(loan: &LoanDetails) -> String {
    encode_cursor(&TimeCursor {
        ts: loan.borrowed_at,
        id: loan.id.value(),
    })
}

/// limit + 1 行の取得結果をページに組み立てる
///
/// limit を超える行が返っていれば次ページが存在する：limit 件に切り詰め、
/// 残した最終行のソートキーから新しいカーソルを符号化する。そうでなければ
/// next_cursor は存在しない。
pub fn paginate<T>(mut rows: Vec<T>, limit: usize, cursor_of: impl Fn(&T) -> String) -> Page<T> {
    let has_next = rows.len() > limit;
    if has_next {
        rows.truncate(limit);
    }

    let next_cursor = if has_next {
        rows.last().map(&cursor_of)
    } else {
        None
    };

    Page {
        items: rows,
        next_cursor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // TDD: encode_cursor / decode_cursor のテスト
    #[test]
    fn test_cursor_round_trip() {
        let cursor = TimeCursor {
            ts: Utc::now(),
            id: Uuid::new_v4(),
        };

        let encoded = encode_cursor(&cursor);
        let decoded: TimeCursor = decode_cursor(&encoded).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn test_cursor_is_url_safe() {
        let cursor = TitleCursor {
            // 非ASCIIを含むタイトルでもトークンはURLセーフに収まる
            title: "吾輩は猫である?&=".to_lowercase(),
            id: Uuid::new_v4(),
        };

        let encoded = encode_cursor(&cursor);
        assert!(
            encoded
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_decode_accepts_padded_input() {
        let cursor = TimeCursor {
            ts: Utc::now(),
            id: Uuid::new_v4(),
        };

        let padded = format!("{}==", encode_cursor(&cursor));
        let decoded: Option<TimeCursor> = decode_cursor(&padded);
        assert_eq!(decoded, Some(cursor));
    }

    #[test]
    fn test_malformed_cursor_decodes_to_none() {
        assert_eq!(decode_cursor::<TimeCursor>("not-base64-at-all!!!"), None);
        // 正しく符号化されているがカーソルの形をしていない
        let garbage = encode_cursor(&serde_json::json!({ "nope": true }));
        assert_eq!(decode_cursor::<TimeCursor>(&garbage), None);
    }

    #[test]
    fn test_malformed_cursor_means_first_page() {
        assert_eq!(
            decode_book_boundary(BookSort::CreatedAtDesc, Some("@@@")),
            None
        );
        assert_eq!(decode_loan_boundary(Some("@@@")), None);
        assert_eq!(decode_book_boundary(BookSort::TitleAsc, None), None);
    }

    // TDD: parse_book_sort のテスト
    #[test]
    fn test_parse_book_sort() {
        assert_eq!(parse_book_sort(None), BookSort::CreatedAtDesc);
        assert_eq!(
            parse_book_sort(Some("createdAt:desc")),
            BookSort::CreatedAtDesc
        );
        assert_eq!(
            parse_book_sort(Some("createdAt:asc")),
            BookSort::CreatedAtAsc
        );
        assert_eq!(parse_book_sort(Some("title:asc")), BookSort::TitleAsc);
        // 未知のソートは既定に倒す
        assert_eq!(parse_book_sort(Some("title:desc")), BookSort::CreatedAtDesc);
    }

    // TDD: paginate のテスト
    #[test]
    fn test_paginate_with_next_page() {
        let rows = vec![1, 2, 3];
        let page = paginate(rows, 2, |n| format!("cursor-{}", n));

        assert_eq!(page.items, vec![1, 2]);
        // カーソルは切り詰め後の最終行から作られる
        assert_eq!(page.next_cursor.as_deref(), Some("cursor-2"));
    }

    #[test]
    fn test_paginate_last_page() {
        let page = paginate(vec![1, 2], 2, |n| format!("cursor-{}", n));
        assert_eq!(page.items, vec![1, 2]);
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn test_paginate_empty() {
        let page = paginate(Vec::<i32>::new(), 2, |_| unreachable!());
        assert!(page.items.is_empty());
        assert_eq!(page.next_cursor, None);
    }
}
