//! 蔵書在庫の更新
//!
//! 貸出可能冊数の増減はここを通る。呼び出し側は必ず
//! `locking::lock_book` で取得した行ロックを保持していること。

use chrono::Utc;
use sqlx::PgConnection;

use crate::domain::book::{Book, adjust_copies};

use super::rows::BoxError;

/// 貸出可能冊数に ±1 の増減を適用する
///
/// 不変条件：結果が負になる調整は拒否する。チェックアウト側は
/// ロック下で在庫を確認してから呼ぶため、ここでの違反は論理バグの
/// 兆候でありストレージエラーとして扱う。
pub(super) async fn adjust(
    conn: &mut PgConnection,
    book: &Book,
    delta: i32,
) -> Result<i32, BoxError> {
    let next = adjust_copies(book.available_copies, delta).map_err(|_| {
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "adjust would make available_copies negative for book {} ({} {:+})",
                book.id.value(),
                book.available_copies,
                delta
            ),
        )) as BoxError
    })?;

    sqlx::query(
        r#"
        UPDATE books
        SET available_copies = $2, updated_at = $3
        WHERE id = $1
        "#,
    )
    .bind(book.id.value())
    .bind(next)
    .bind(Utc::now())
    .execute(conn)
    .await?;

    Ok(next)
}
