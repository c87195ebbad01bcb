//! 図書貸出のコアエンジン
//!
//! 有限の蔵書在庫に対する貸出・返却のトランザクショナルな状態管理と、
//! フィルタ・複数ソート対応のカーソルページングを提供する。
//!
//! HTTPルーティング、トークン検証、ロール→権限の展開、ワイヤ形式への
//! 変換は外部コラボレーターの責務。コアは検証済みの操作主体
//! （[`domain::Actor`]）を受け取り、型付きの結果・エラーを返す。

pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;
