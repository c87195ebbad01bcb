use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::BorrowerError;

/// 蔵書ID - 蔵書管理コンテキストの集約ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookId(Uuid);

impl BookId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for BookId {
    fn default() -> Self {
        Self::new()
    }
}

/// 貸出ID - 貸出台帳の集約ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoanId(Uuid);

impl LoanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for LoanId {
    fn default() -> Self {
        Self::new()
    }
}

/// 利用者ID - 認証基盤が発行する外部ID（不透明な文字列）
///
/// UUIDではなく認証プロバイダのsubject文字列をそのまま保持する。
/// このコンテキストでは検証済みの値としてのみ受け取り、再検証しない。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 借受人 - 登録利用者または氏名のみの利用者
///
/// 不変条件：必ずどちらか一方の腕のみが値を持つ。
/// `from_parts` で構築時に一度だけ検証し、以降は不正な状態が存在しない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Borrower {
    /// 登録利用者（認証基盤上のID）
    Registered(UserId),
    /// 氏名のみ（窓口で職員が代行貸出する来館者など）
    Anonymous(String),
}

impl Borrower {
    /// 2つの排他的なオプション文字列から借受人を構築する
    ///
    /// ビジネスルール：
    /// - 両方指定、両方未指定はバリデーションエラー
    /// - 値は前後の空白を除去し、空文字は拒否する
    pub fn from_parts(
        user_id: Option<String>,
        name: Option<String>,
    ) -> Result<Self, BorrowerError> {
        match (user_id, name) {
            (Some(_), Some(_)) => Err(BorrowerError::BothArmsPopulated),
            (None, None) => Err(BorrowerError::NeitherArmPopulated),
            (Some(id), None) => {
                let id = id.trim().to_string();
                if id.is_empty() {
                    return Err(BorrowerError::BlankValue);
                }
                Ok(Borrower::Registered(UserId::new(id)))
            }
            (None, Some(name)) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(BorrowerError::BlankValue);
                }
                Ok(Borrower::Anonymous(name))
            }
        }
    }

    /// 登録利用者であればそのIDを返す
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Borrower::Registered(id) => Some(id),
            Borrower::Anonymous(_) => None,
        }
    }

    /// 氏名のみの借受人であればその氏名を返す
    pub fn name(&self) -> Option<&str> {
        match self {
            Borrower::Registered(_) => None,
            Borrower::Anonymous(name) => Some(name),
        }
    }
}

/// 操作権限
///
/// ロール→権限の展開は外部（認証境界）の責務。コアは展開済みの
/// 権限集合だけを見る。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// 蔵書の登録・削除
    ManageBooks,
    /// 任意の貸出の処理（代行貸出・他人の貸出の返却）
    ManageLoans,
    /// 全利用者の貸出の閲覧
    ViewAllLoans,
}

/// 操作主体 - 検証済みの識別子と権限集合
///
/// トークン検証・クレーム抽出は外部コラボレーターが済ませており、
/// コアはこの値を信頼して扱う。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub permissions: HashSet<Permission>,
}

impl Actor {
    pub fn new(id: UserId, permissions: HashSet<Permission>) -> Self {
        Self { id, permissions }
    }

    pub fn can(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// 貸出ステータス
///
/// Borrowed → Returned の一方向のみ。Returned は終端状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    /// 貸出中
    Borrowed,
    /// 返却済み（終端）
    Returned,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Borrowed => "borrowed",
            LoanStatus::Returned => "returned",
        }
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "borrowed" => Ok(LoanStatus::Borrowed),
            "returned" => Ok(LoanStatus::Returned),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}
