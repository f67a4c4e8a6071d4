//! ExploreService - request orchestration over a DecisionLedger
//!
//! # フロー
//! 1. リクエストの形を検証（失敗は InvalidArgument、store には触れない）
//! 2. DecisionLedger を呼ぶ
//! 3. LedgerError を Internal に変換（ログは tracing::error!）
//! 4. レスポンスを整形（next token の導出）
//!
//! 状態は持たない。正本は ledger だけ。

use std::sync::Arc;

use tracing::{debug, error, instrument};

use super::config::PutStrategy;
use super::requests::{
    CountLikedYouRequest, CountLikedYouResponse, ListLikedYouRequest, ListLikedYouResponse,
    PutDecisionRequest, PutDecisionResponse,
};
use crate::domain::{ApiError, LedgerError, Resolution, UserId};
use crate::ports::DecisionLedger;

/// Log a ledger failure and fold it into an `Internal` error.
fn internal(call: &'static str, context: &'static str) -> impl FnOnce(LedgerError) -> ApiError {
    move |e| {
        error!(call, error = %e, "Internal error on ledger call");
        ApiError::internal(context, &e)
    }
}

/// The Request Orchestrator.
///
/// Owns a shared handle to the ledger; many requests may run concurrently
/// against one service. Cross-request consistency is the ledger's job.
pub struct ExploreService<L> {
    ledger: Arc<L>,
    put_strategy: PutStrategy,
}

impl<L> Clone for ExploreService<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            put_strategy: self.put_strategy,
        }
    }
}

impl<L: DecisionLedger> ExploreService<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self {
            ledger,
            put_strategy: PutStrategy::default(),
        }
    }

    pub fn with_put_strategy(mut self, put_strategy: PutStrategy) -> Self {
        self.put_strategy = put_strategy;
        self
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    /// Everyone who liked the recipient, newest first.
    #[instrument(skip_all, fields(recipient = %req.recipient_user_id))]
    pub async fn list_liked_you(
        &self,
        req: &ListLikedYouRequest,
    ) -> Result<ListLikedYouResponse, ApiError> {
        let (recipient, page) = req.validate()?;
        let likers = self
            .ledger
            .get_liked_decisions(&recipient, true, page)
            .await
            .map_err(internal("GetLikedDecisions", "failed to get recipient likes"))?;
        debug!(rows = likers.len(), "Listed likers");
        Ok(ListLikedYouResponse::from_page(&page, likers))
    }

    /// Likers whose mutuality has not been resolved yet, newest first.
    #[instrument(skip_all, fields(recipient = %req.recipient_user_id))]
    pub async fn list_new_liked_you(
        &self,
        req: &ListLikedYouRequest,
    ) -> Result<ListLikedYouResponse, ApiError> {
        let (recipient, page) = req.validate()?;
        let likers = self
            .ledger
            .get_new_liked_decisions(&recipient, true, page)
            .await
            .map_err(internal(
                "GetNewLikedDecisions",
                "failed to get new recipient likes",
            ))?;
        debug!(rows = likers.len(), "Listed new likers");
        Ok(ListLikedYouResponse::from_page(&page, likers))
    }

    #[instrument(skip_all, fields(recipient = %req.recipient_user_id))]
    pub async fn count_liked_you(
        &self,
        req: &CountLikedYouRequest,
    ) -> Result<CountLikedYouResponse, ApiError> {
        let recipient = req.validate()?;
        let count = self
            .ledger
            .get_liked_decisions_count(&recipient, true)
            .await
            .map_err(internal(
                "GetLikedDecisionsCount",
                "failed to get recipient liked count",
            ))?;
        Ok(CountLikedYouResponse { count })
    }

    /// Record `actor`'s decision about `recipient` and report mutuality.
    #[instrument(
        skip_all,
        fields(
            recipient = %req.recipient_user_id,
            actor = %req.actor_user_id,
            liked = req.liked_recipient,
        )
    )]
    pub async fn put_decision(
        &self,
        req: &PutDecisionRequest,
    ) -> Result<PutDecisionResponse, ApiError> {
        let recipient = UserId::from(req.recipient_user_id.as_str());
        let actor = UserId::from(req.actor_user_id.as_str());
        let liked = req.liked_recipient;

        let resolution = match self.put_strategy {
            PutStrategy::ProbeThenWrite => self.probe_then_write(&recipient, &actor, liked).await?,
            PutStrategy::Atomic => self
                .ledger
                .record_decision(&recipient, &actor, liked)
                .await
                .map_err(internal("RecordDecision", "failed to update decision"))?,
        };
        debug!(?resolution, "Decision recorded");

        Ok(PutDecisionResponse {
            mutual_likes: resolution.is_mutual(liked),
        })
    }

    /// Has `actor`, as a recipient, already got a decision from `recipient`?
    /// Not found means first-to-like; found means the reciprocal write.
    async fn probe_then_write(
        &self,
        recipient: &UserId,
        actor: &UserId,
        liked: bool,
    ) -> Result<Resolution, ApiError> {
        let counterpart = self
            .ledger
            .get_liked_decision(actor, recipient)
            .await
            .map_err(internal(
                "GetLikedDecision",
                "failed to determine mutual decision",
            ))?;

        match counterpart {
            None => {
                self.ledger
                    .put_decision(recipient, actor, liked)
                    .await
                    .map_err(internal("PutDecision", "failed to update decision"))?;
                Ok(Resolution::FirstToLike)
            }
            Some(counterpart_liked) => {
                self.ledger
                    .put_mutual_decisions(recipient, actor, liked, counterpart_liked)
                    .await
                    .map_err(internal(
                        "PutMutualDecisions",
                        "failed to update mutual decision",
                    ))?;
                Ok(Resolution::Reciprocal { counterpart_liked })
            }
        }
    }
}
