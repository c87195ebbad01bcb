/// 借受人構築のエラー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowerError {
    /// 利用者IDと氏名の両方が指定された
    BothArmsPopulated,
    /// 利用者IDも氏名も指定されていない
    NeitherArmPopulated,
    /// 空白のみの値が指定された
    BlankValue,
}

/// 蔵書登録のバリデーションエラー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookValidationError {
    /// タイトルが空
    EmptyTitle,
    /// 著者が空
    EmptyAuthor,
    /// 蔵書数が負
    NegativeCopies,
}

/// 在庫調整のエラー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryError {
    /// 調整後の貸出可能冊数が負になる
    WouldGoNegative,
}

/// 返却のエラー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnPolicyError {
    /// 既に返却済み（終端状態からの再遷移は存在しない）
    AlreadyReturned,
    /// 職員権限がなく、自分の貸出でもない
    NotPermitted,
}
