use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Actor, BookId, Borrower, LoanId, LoanStatus, Permission, ReturnPolicyError, UserId};

/// 貸出 - 1冊の蔵書の1回の貸出
///
/// 状態機械：Borrowed → Returned（終端）。他の遷移は存在せず、
/// Returned から戻ることはない。行は削除されない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub book_id: BookId,
    pub borrower: Borrower,
    pub status: LoanStatus,
    pub borrowed_at: DateTime<Utc>,
    /// status = Returned のときに限り存在する
    pub returned_at: Option<DateTime<Utc>>,
    /// 貸出を処理した操作主体（セルフサービスでも監査のために保持）
    pub processed_by: UserId,
}

/// 純粋関数：貸出を開始する
///
/// 貸出可否（在庫・二重貸出）の判定は台帳側の責務。ここでは
/// Borrowed 状態の新しい貸出を構築するだけで、副作用はない。
pub fn checkout(
    book_id: BookId,
    borrower: Borrower,
    processed_by: UserId,
    borrowed_at: DateTime<Utc>,
) -> Loan {
    Loan {
        id: LoanId::new(),
        book_id,
        borrower,
        status: LoanStatus::Borrowed,
        borrowed_at,
        returned_at: None,
        processed_by,
    }
}

/// 純粋関数：返却の権限を判定する
///
/// ビジネスルール：
/// - ManageLoans 権限を持つ職員は任意の貸出を返却できる
/// - 登録利用者は自分の貸出のみ返却できる
/// - 氏名のみの貸出は職員のみが返却できる
pub fn authorize_return(loan: &Loan, actor: &Actor) -> Result<(), ReturnPolicyError> {
    if actor.can(Permission::ManageLoans) {
        return Ok(());
    }

    match &loan.borrower {
        Borrower::Registered(user_id) if *user_id == actor.id => Ok(()),
        _ => Err(ReturnPolicyError::NotPermitted),
    }
}

/// 純粋関数：貸出を返却済みへ遷移させる
///
/// ビジネスルール：
/// - Returned は終端状態。二重返却は拒否し、状態は変更しない。
///
/// 副作用なし。遷移後の新しい Loan を返す。
pub fn mark_returned(loan: Loan, returned_at: DateTime<Utc>) -> Result<Loan, ReturnPolicyError> {
    if loan.status == LoanStatus::Returned {
        return Err(ReturnPolicyError::AlreadyReturned);
    }

    Ok(Loan {
        status: LoanStatus::Returned,
        returned_at: Some(returned_at),
        ..loan
    })
}
