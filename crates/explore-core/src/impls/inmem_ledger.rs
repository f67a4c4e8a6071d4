//! InMemoryLedger - 開発・テスト用の DecisionLedger
//!
//! # 実装詳細
//! - `BTreeMap<id, Decision>` が正本。id 順に並ぶので id DESC の走査は `range(..).rev()`
//! - `(recipient, actor) → id` の索引で一意性（1 ペア 1 行）を保証
//! - 1 つの `tokio::sync::Mutex` の中で全書き込みを行うため、
//!   mutual 更新の 2 行は常に一緒に見える

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{Decision, LedgerError, Liker, PageRequest, Resolution, UserId};
use crate::ports::{Clock, DecisionLedger, SystemClock};

struct InMemoryLedgerState {
    /// All decision rows keyed by id.
    rows: BTreeMap<u64, Decision>,

    /// Unique index on the ordered pair.
    by_pair: HashMap<(UserId, UserId), u64>,

    /// Next id to assign. Never reused.
    next_id: u64,
}

impl InMemoryLedgerState {
    fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            by_pair: HashMap::new(),
            next_id: 1,
        }
    }

    fn find(&self, recipient: &UserId, actor: &UserId) -> Option<&Decision> {
        self.by_pair
            .get(&(recipient.clone(), actor.clone()))
            .and_then(|id| self.rows.get(id))
    }

    /// Insert or overwrite `liked` on the pair's row, returning it for further
    /// changes. The id is assigned only on first insertion.
    fn upsert(
        &mut self,
        recipient: &UserId,
        actor: &UserId,
        liked: bool,
        now: DateTime<Utc>,
    ) -> &mut Decision {
        let next_id = &mut self.next_id;
        let id = *self
            .by_pair
            .entry((recipient.clone(), actor.clone()))
            .or_insert_with(|| {
                let id = *next_id;
                *next_id += 1;
                id
            });
        let row = self.rows.entry(id).or_insert_with(|| Decision {
            id,
            recipient_id: recipient.clone(),
            actor_id: actor.clone(),
            liked,
            mutually_liked: None,
            updated_at: now,
        });
        row.liked = liked;
        row.updated_at = now;
        row
    }

    fn put_mutual(
        &mut self,
        recipient: &UserId,
        actor: &UserId,
        actor_liked: bool,
        recipient_liked: bool,
        now: DateTime<Utc>,
    ) {
        self.upsert(recipient, actor, actor_liked, now).mutually_liked = Some(recipient_liked);

        if let Some(id) = self.by_pair.get(&(actor.clone(), recipient.clone()))
            && let Some(mirror) = self.rows.get_mut(id)
        {
            mirror.mutually_liked = Some(recipient_liked);
            mirror.updated_at = now;
        }
    }

    fn scan(
        &self,
        recipient: &UserId,
        liked: bool,
        only_new: bool,
        page: PageRequest,
    ) -> Vec<Liker> {
        let limit = page.limit.map_or(usize::MAX, |limit| limit as usize);
        self.rows
            .values()
            .rev()
            .skip_while(|row| !page.admits(row.id))
            .filter(|row| row.recipient_id == *recipient && row.liked == liked)
            .filter(|row| !only_new || row.is_new())
            .take(limit)
            .map(Liker::from)
            .collect()
    }
}

/// In-memory DecisionLedger.
///
/// Cheap to clone; clones share the same rows.
#[derive(Clone)]
pub struct InMemoryLedger {
    state: Arc<Mutex<InMemoryLedgerState>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryLedgerState::new())),
            clock,
        }
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.state.lock().await.rows.len()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionLedger for InMemoryLedger {
    async fn put_decision(
        &self,
        recipient: &UserId,
        actor: &UserId,
        liked: bool,
    ) -> Result<(), LedgerError> {
        debug!(%recipient, %actor, liked, "put_decision");
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state.upsert(recipient, actor, liked, now);
        Ok(())
    }

    async fn put_mutual_decisions(
        &self,
        recipient: &UserId,
        actor: &UserId,
        actor_liked: bool,
        recipient_liked: bool,
    ) -> Result<(), LedgerError> {
        debug!(%recipient, %actor, actor_liked, recipient_liked, "put_mutual_decisions");
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state.put_mutual(recipient, actor, actor_liked, recipient_liked, now);
        Ok(())
    }

    async fn get_liked_decisions(
        &self,
        recipient: &UserId,
        liked: bool,
        page: PageRequest,
    ) -> Result<Vec<Liker>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.scan(recipient, liked, false, page))
    }

    async fn get_new_liked_decisions(
        &self,
        recipient: &UserId,
        liked: bool,
        page: PageRequest,
    ) -> Result<Vec<Liker>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.scan(recipient, liked, true, page))
    }

    async fn get_liked_decisions_count(
        &self,
        recipient: &UserId,
        liked: bool,
    ) -> Result<u64, LedgerError> {
        let state = self.state.lock().await;
        let count = state
            .rows
            .values()
            .filter(|row| row.recipient_id == *recipient && row.liked == liked)
            .count();
        Ok(count as u64)
    }

    async fn get_decision(
        &self,
        recipient: &UserId,
        actor: &UserId,
    ) -> Result<Option<Decision>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.find(recipient, actor).cloned())
    }

    async fn record_decision(
        &self,
        recipient: &UserId,
        actor: &UserId,
        liked: bool,
    ) -> Result<Resolution, LedgerError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let resolution = match state.find(actor, recipient).map(|row| row.liked) {
            None => {
                state.upsert(recipient, actor, liked, now);
                Resolution::FirstToLike
            }
            Some(counterpart_liked) => {
                state.put_mutual(recipient, actor, liked, counterpart_liked, now);
                Resolution::Reciprocal { counterpart_liked }
            }
        };
        debug!(%recipient, %actor, liked, ?resolution, "record_decision");
        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PageToken;
    use crate::ports::FixedClock;
    use chrono::{Duration, TimeZone};

    fn user(id: &str) -> UserId {
        UserId::from(id)
    }

    fn ledger_at_fixed_time() -> (InMemoryLedger, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        (InMemoryLedger::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn upsert_keeps_id_and_refreshes_updated_at() {
        let (ledger, clock) = ledger_at_fixed_time();
        ledger.put_decision(&user("b"), &user("a"), true).await.unwrap();
        let first = ledger.get_decision(&user("b"), &user("a")).await.unwrap().unwrap();

        clock.advance(Duration::seconds(5));
        ledger.put_decision(&user("b"), &user("a"), false).await.unwrap();
        let second = ledger.get_decision(&user("b"), &user("a")).await.unwrap().unwrap();

        assert_eq!(ledger.len().await, 1);
        assert_eq!(first.id, second.id);
        assert!(!second.liked);
        assert_eq!(second.updated_at, first.updated_at + Duration::seconds(5));
    }

    #[tokio::test]
    async fn missing_pair_is_none() {
        let ledger = InMemoryLedger::new();
        assert_eq!(
            ledger.get_liked_decision(&user("x"), &user("y")).await.unwrap(),
            None
        );
        assert_eq!(
            ledger.get_liked_decisions_count(&user("x"), true).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn mutual_update_sets_both_rows() {
        let ledger = InMemoryLedger::new();
        ledger.put_decision(&user("b"), &user("a"), true).await.unwrap();
        ledger
            .put_mutual_decisions(&user("a"), &user("b"), false, true)
            .await
            .unwrap();

        let primary = ledger.get_decision(&user("a"), &user("b")).await.unwrap().unwrap();
        let mirror = ledger.get_decision(&user("b"), &user("a")).await.unwrap().unwrap();
        assert!(!primary.liked);
        assert_eq!(primary.mutually_liked, Some(true));
        assert!(mirror.liked);
        assert_eq!(mirror.mutually_liked, Some(true));
    }

    #[tokio::test]
    async fn plain_put_does_not_clear_mutuality() {
        let ledger = InMemoryLedger::new();
        ledger.put_decision(&user("b"), &user("a"), true).await.unwrap();
        ledger
            .put_mutual_decisions(&user("a"), &user("b"), true, true)
            .await
            .unwrap();
        ledger.put_decision(&user("a"), &user("b"), false).await.unwrap();

        let row = ledger.get_decision(&user("a"), &user("b")).await.unwrap().unwrap();
        assert_eq!(row.mutually_liked, Some(true));
    }

    #[tokio::test]
    async fn pages_walk_ids_descending() {
        let ledger = InMemoryLedger::new();
        for actor in ["u1", "u2", "u3", "u4", "u5"] {
            ledger.put_decision(&user("r"), &user(actor), true).await.unwrap();
        }
        ledger.put_decision(&user("r"), &user("u6"), false).await.unwrap();
        ledger.put_decision(&user("other"), &user("u7"), true).await.unwrap();

        let first = ledger
            .get_liked_decisions(&user("r"), true, PageRequest::first(2))
            .await
            .unwrap();
        let ids: Vec<u64> = first.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![5, 4]);

        let rest = ledger
            .get_liked_decisions(&user("r"), true, PageRequest::new(Some(PageToken::new(4)), None))
            .await
            .unwrap();
        let ids: Vec<u64> = rest.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn new_likes_cursor_skips_resolved_rows() {
        let ledger = InMemoryLedger::new();
        for actor in ["u1", "u2", "u3", "u4", "u5"] {
            ledger.put_decision(&user("r"), &user(actor), true).await.unwrap();
        }
        // Resolve u4 and u2 (ids 4 and 2); their mirror rows get ids 6 and 7.
        for actor in ["u4", "u2"] {
            ledger
                .put_mutual_decisions(&user(actor), &user("r"), true, true)
                .await
                .unwrap();
        }

        let first = ledger
            .get_new_liked_decisions(&user("r"), true, PageRequest::first(1))
            .await
            .unwrap();
        let ids: Vec<u64> = first.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![5]);

        let rest = ledger
            .get_new_liked_decisions(&user("r"), true, PageRequest::new(Some(PageToken::new(5)), Some(5)))
            .await
            .unwrap();
        let ids: Vec<u64> = rest.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn record_decision_resolves_branch_under_one_lock() {
        let ledger = InMemoryLedger::new();
        let first = ledger.record_decision(&user("b"), &user("a"), true).await.unwrap();
        assert_eq!(first, Resolution::FirstToLike);

        let second = ledger.record_decision(&user("a"), &user("b"), true).await.unwrap();
        assert_eq!(second, Resolution::Reciprocal { counterpart_liked: true });
        assert!(second.is_mutual(true));
    }
}
