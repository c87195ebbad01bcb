use std::sync::Arc;

use crate::application::pagination::{self, Page};
use crate::domain::book::{Book, NewBook};
use crate::domain::commands::{CheckoutBook, ReturnLoan};
use crate::domain::{Actor, BookId, Borrower, LoanStatus, Permission, UserId};
use crate::ports::book_repository::{BookFilter, BookRepository};
use crate::ports::loan_ledger::{LoanDetails, LoanFilter, LoanLedger};

use super::errors::{LendingError, Result};

/// 一覧の既定ページサイズ
const DEFAULT_PAGE_SIZE: usize = 50;

/// 一覧の最大ページサイズ
const MAX_PAGE_SIZE: usize = 200;

/// サービスの依存関係
///
/// 振る舞いは持たず、純粋な関数に依存関係を渡すデータ構造として定義。
/// すべての依存が明示的になり、テストではインメモリ実装に差し替えられる。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub books: Arc<dyn BookRepository>,
    pub loans: Arc<dyn LoanLedger>,
}

/// 貸出一覧のクエリ
#[derive(Debug, Clone, Default)]
pub struct LoanListQuery {
    /// 自分以外の貸出も含める（ViewAllLoans 権限があるときのみ有効）
    pub show_all: bool,
    /// 登録利用者IDで絞り込む（show_all のときのみ意味を持つ）
    pub borrower_user_id: Option<UserId>,
    /// 蔵書IDで絞り込む
    pub book_id: Option<BookId>,
    /// ステータスで絞り込む
    pub status: Option<LoanStatus>,
}

fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

/// 蔵書を貸し出す
///
/// ビジネスルール：
/// - 自分自身への貸出（セルフサービス）は誰でも可能
/// - 他の利用者・氏名のみの借受人への代行貸出は ManageLoans 権限が必要
/// - 在庫・二重貸出の検証は台帳が1つのトランザクション内で行う
pub async fn checkout_book(deps: &ServiceDependencies, cmd: CheckoutBook) -> Result<LoanDetails> {
    // 1. 権限確認：台帳に触る前に拒否する
    let self_service = matches!(&cmd.borrower, Borrower::Registered(id) if *id == cmd.actor.id);
    if !self_service && !cmd.actor.can(Permission::ManageLoans) {
        return Err(LendingError::Forbidden);
    }

    // 2. 台帳で貸出（蔵書ロック・在庫減算・貸出行の挿入を原子的に）
    let details = deps.loans.checkout(cmd).await?;

    tracing::info!(
        loan_id = %details.id.value(),
        book_id = %details.book_id.value(),
        "book checked out"
    );

    Ok(details)
}

/// 貸出を返却する
///
/// ビジネスルール：
/// - ManageLoans 権限を持つ職員は任意の貸出を返却できる
/// - 登録利用者は自分の貸出のみ返却できる
/// - 既に返却済みの貸出は変更されず LoanAlreadyReturned になる
///
/// 所有権の判定は貸出行をロックした後にしか行えないため、
/// 権限チェックも含めて台帳のトランザクション内で実行される。
pub async fn return_loan(deps: &ServiceDependencies, cmd: ReturnLoan) -> Result<LoanDetails> {
    let details = deps.loans.return_loan(cmd).await?;

    tracing::info!(
        loan_id = %details.id.value(),
        book_id = %details.book_id.value(),
        "loan returned"
    );

    Ok(details)
}

/// 蔵書の一覧を取得する
///
/// カーソルはソート順に応じた境界に復号され、不正なカーソルは
/// 先頭ページとして扱う。limit + 1 行を取得して次ページ有無を判定する。
pub async fn list_books(
    deps: &ServiceDependencies,
    filter: BookFilter,
    sort: Option<&str>,
    limit: Option<usize>,
    cursor: Option<&str>,
) -> Result<Page<Book>> {
    let sort = pagination::parse_book_sort(sort);
    let limit = clamp_limit(limit);
    let boundary = pagination::decode_book_boundary(sort, cursor);

    let rows = deps
        .books
        .list(&filter, sort, boundary.as_ref(), (limit + 1) as i64)
        .await?;

    Ok(pagination::paginate(rows, limit, |book| {
        pagination::book_cursor(sort, book)
    }))
}

/// 貸出の一覧を取得する
///
/// ビジネスルール：
/// - ViewAllLoans 権限がない場合、結果は常に自分の貸出に限定される
///   （show_all の指定は黙って無視する）
/// - ソートは borrowed_at 降順・id 降順に固定
pub async fn list_loans(
    deps: &ServiceDependencies,
    query: LoanListQuery,
    actor: &Actor,
    limit: Option<usize>,
    cursor: Option<&str>,
) -> Result<Page<LoanDetails>> {
    // 1. 閲覧範囲の決定
    let borrower_user_id = if query.show_all && actor.can(Permission::ViewAllLoans) {
        query.borrower_user_id
    } else {
        Some(actor.id.clone())
    };

    let filter = LoanFilter {
        borrower_user_id,
        book_id: query.book_id,
        status: query.status,
    };

    // 2. limit + 1 行を取得してページに組み立てる
    let limit = clamp_limit(limit);
    let boundary = pagination::decode_loan_boundary(cursor);

    let rows = deps
        .loans
        .list(&filter, boundary, (limit + 1) as i64)
        .await?;

    Ok(pagination::paginate(rows, limit, pagination::loan_cursor))
}

/// 蔵書を登録する
///
/// ビジネスルール：ManageBooks 権限が必要。
/// 内容の検証は NewBook の構築時に済んでいる。
pub async fn create_book(
    deps: &ServiceDependencies,
    book: NewBook,
    actor: &Actor,
) -> Result<Book> {
    if !actor.can(Permission::ManageBooks) {
        return Err(LendingError::Forbidden);
    }

    let book = deps.books.create(book).await?;

    tracing::info!(book_id = %book.id.value(), title = %book.title, "book created");

    Ok(book)
}

/// IDで蔵書を取得する
pub async fn get_book(deps: &ServiceDependencies, id: BookId) -> Result<Book> {
    deps.books.get(id).await?.ok_or(LendingError::BookNotFound)
}

/// 蔵書を削除する
///
/// ビジネスルール：
/// - ManageBooks 権限が必要
/// - 貸出履歴（返却済みを含む）が1件でもあれば削除できない
pub async fn delete_book(deps: &ServiceDependencies, id: BookId, actor: &Actor) -> Result<()> {
    if !actor.can(Permission::ManageBooks) {
        return Err(LendingError::Forbidden);
    }

    deps.books.delete(id).await?;

    tracing::info!(book_id = %id.value(), "book deleted");

    Ok(())
}
