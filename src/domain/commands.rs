use super::{Actor, BookId, Borrower, LoanId};

/// コマンド：蔵書を貸し出す
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutBook {
    pub book_id: BookId,
    pub borrower: Borrower,
    /// 操作を行う検証済みの主体。貸出行の processed_by に記録される。
    pub actor: Actor,
}

/// コマンド：貸出を返却する
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnLoan {
    pub loan_id: LoanId,
    pub actor: Actor,
}
