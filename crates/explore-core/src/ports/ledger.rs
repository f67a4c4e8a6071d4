//! DecisionLedger port - decisions テーブルの正本（source of truth）
//!
//! DecisionLedger は以下を管理します：
//! - (recipient, actor) ごとに 1 行の decision（upsert、id は不変）
//! - mutual 成立時の 2 行同時更新（同一トランザクション）
//! - id DESC の cursor pagination と件数
//!
//! # 実装
//! - `SqliteLedger`: 本番用（rusqlite）
//! - `InMemoryLedger`: 開発・テスト用

use async_trait::async_trait;

use crate::domain::{Decision, LedgerError, Liker, PageRequest, Resolution, UserId};

/// Storage seam used by the orchestrator.
///
/// # 設計原則
/// - "not found" は `Ok(None)`。エラー値の同一性比較で分岐しない
/// - `put_mutual_decisions` の 2 文は必ず 1 トランザクション
/// - リトライはしない（呼び出し側の責務）
#[async_trait]
pub trait DecisionLedger: Send + Sync {
    /// Upsert `(recipient, actor)`: insert if absent, otherwise overwrite
    /// `liked` and `updated_at` in place. `id` and `mutually_liked` are kept.
    async fn put_decision(
        &self,
        recipient: &UserId,
        actor: &UserId,
        liked: bool,
    ) -> Result<(), LedgerError>;

    /// Atomically:
    /// 1. upsert `(recipient, actor)` with `liked = actor_liked` and
    ///    `mutually_liked = recipient_liked`;
    /// 2. set `mutually_liked = recipient_liked` on the mirror row
    ///    `(actor, recipient)`, leaving its `liked` untouched.
    ///
    /// Either both writes commit or neither does.
    async fn put_mutual_decisions(
        &self,
        recipient: &UserId,
        actor: &UserId,
        actor_liked: bool,
        recipient_liked: bool,
    ) -> Result<(), LedgerError>;

    /// Rows with `recipient_id = recipient AND liked = liked`, `id DESC`,
    /// bounded by `page`.
    async fn get_liked_decisions(
        &self,
        recipient: &UserId,
        liked: bool,
        page: PageRequest,
    ) -> Result<Vec<Liker>, LedgerError>;

    /// Same as [`get_liked_decisions`](Self::get_liked_decisions), restricted
    /// to rows whose mutuality is still unresolved.
    async fn get_new_liked_decisions(
        &self,
        recipient: &UserId,
        liked: bool,
        page: PageRequest,
    ) -> Result<Vec<Liker>, LedgerError>;

    /// Number of rows with `recipient_id = recipient AND liked = liked`.
    /// Zero when the recipient has no decisions at all.
    async fn get_liked_decisions_count(
        &self,
        recipient: &UserId,
        liked: bool,
    ) -> Result<u64, LedgerError>;

    /// Full row for the ordered pair, if any.
    async fn get_decision(
        &self,
        recipient: &UserId,
        actor: &UserId,
    ) -> Result<Option<Decision>, LedgerError>;

    /// `liked` for the ordered pair; `None` means nobody decided yet.
    async fn get_liked_decision(
        &self,
        recipient: &UserId,
        actor: &UserId,
    ) -> Result<Option<bool>, LedgerError> {
        Ok(self
            .get_decision(recipient, actor)
            .await?
            .map(|decision| decision.liked))
    }

    /// Probe the reverse direction and write the matching branch.
    ///
    /// The provided body is the plain two-step: a read, then a separate
    /// write. Two concurrent calls for the same pair can both see "not found".
    /// Implementations that can hold a transaction across both steps override
    /// this.
    async fn record_decision(
        &self,
        recipient: &UserId,
        actor: &UserId,
        liked: bool,
    ) -> Result<Resolution, LedgerError> {
        match self.get_liked_decision(actor, recipient).await? {
            None => {
                self.put_decision(recipient, actor, liked).await?;
                Ok(Resolution::FirstToLike)
            }
            Some(counterpart_liked) => {
                self.put_mutual_decisions(recipient, actor, liked, counterpart_liked)
                    .await?;
                Ok(Resolution::Reciprocal { counterpart_liked })
            }
        }
    }

    /// Release the underlying store handle.
    async fn close(&self) -> Result<(), LedgerError> {
        Ok(())
    }
}
