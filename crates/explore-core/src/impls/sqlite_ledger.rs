//! SqliteLedger - 本番用の DecisionLedger
//!
//! # 実装詳細
//! - rusqlite（bundled SQLite）の `Connection` を 1 本、`Mutex` で保持
//! - 各呼び出しは `spawn_blocking` 上で実行（async context で同期 I/O をしない）
//! - mutual 更新と record_decision は `BEGIN IMMEDIATE` のトランザクション。
//!   途中の文が失敗すると `Transaction` の drop で rollback される

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use tracing::{debug, info};

use crate::domain::{Decision, LedgerError, Liker, PageRequest, Resolution, UserId};
use crate::impls::migrations::run_migrations;
use crate::ports::{Clock, DecisionLedger, SystemClock};

const PUT_DECISION: &str = "
    INSERT INTO decisions (recipient_id, actor_id, liked, updated_at)
    VALUES (?1, ?2, ?3, ?4)
    ON CONFLICT (recipient_id, actor_id)
    DO UPDATE SET liked = excluded.liked, updated_at = excluded.updated_at";

const PUT_MUTUAL_DECISION: &str = "
    INSERT INTO decisions (recipient_id, actor_id, liked, mutually_liked, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT (recipient_id, actor_id)
    DO UPDATE SET liked = excluded.liked,
                  mutually_liked = excluded.mutually_liked,
                  updated_at = excluded.updated_at";

const UPDATE_MIRROR: &str = "
    UPDATE decisions
    SET mutually_liked = ?3, updated_at = ?4
    WHERE recipient_id = ?1 AND actor_id = ?2";

const GET_DECISION: &str = "
    SELECT id, recipient_id, actor_id, liked, mutually_liked, updated_at
    FROM decisions
    WHERE recipient_id = ?1 AND actor_id = ?2";

const GET_LIKED: &str = "
    SELECT liked FROM decisions WHERE recipient_id = ?1 AND actor_id = ?2";

const COUNT_LIKED: &str = "
    SELECT count(*) FROM decisions WHERE recipient_id = ?1 AND liked = ?2";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// DecisionLedger backed by SQLite.
///
/// The connection is an owned resource: it is released by [`close`](DecisionLedger::close)
/// or when the last clone is dropped.
#[derive(Clone)]
pub struct SqliteLedger {
    conn: Arc<Mutex<Option<Connection>>>,
    clock: Arc<dyn Clock>,
}

impl SqliteLedger {
    /// Open or create a database file.
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        let conn = Connection::open(path)?;
        // WAL lets readers proceed while a writer holds the lock.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        info!(path = %path.display(), "Opened decision ledger");
        Ok(Self::from_connection(conn))
    }

    /// Private in-memory database (tests, demos).
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Apply pending schema migrations. Returns how many ran.
    pub async fn migrate(&self) -> Result<usize, LedgerError> {
        let now = self.clock.now();
        self.with_conn(move |conn| run_migrations(conn, now)).await
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, LedgerError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, LedgerError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| LedgerError::Poisoned)?;
            let conn = guard
                .as_mut()
                .ok_or_else(|| LedgerError::Storage("ledger is closed".to_string()))?;
            f(conn)
        })
        .await?
    }

    async fn list(
        &self,
        recipient: &UserId,
        liked: bool,
        only_new: bool,
        page: PageRequest,
    ) -> Result<Vec<Liker>, LedgerError> {
        let (sql, args) = build_list_query(recipient, liked, only_new, page);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(args), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?;

            let mut likers = Vec::new();
            for row in rows {
                let (id, actor_id, updated_at) = row?;
                likers.push(Liker {
                    id: decode_id(id)?,
                    actor_id: UserId::from(actor_id),
                    updated_at: decode_timestamp(updated_at)?,
                });
            }
            Ok(likers)
        })
        .await
    }
}

/// Build the page query the way a query builder would: fixed filters, then
/// the optional cursor bound and limit.
fn build_list_query(
    recipient: &UserId,
    liked: bool,
    only_new: bool,
    page: PageRequest,
) -> (String, Vec<Value>) {
    let mut sql = String::from(
        "SELECT id, actor_id, updated_at FROM decisions WHERE recipient_id = ? AND liked = ?",
    );
    let mut args = vec![
        Value::Text(recipient.as_str().to_string()),
        Value::Integer(i64::from(liked)),
    ];

    if only_new {
        sql.push_str(" AND mutually_liked IS NULL");
    }
    // ids never exceed i64::MAX, so a larger cursor bounds nothing.
    if let Some(cursor) = page.cursor
        && let Ok(cursor) = i64::try_from(cursor.id())
    {
        sql.push_str(" AND id < ?");
        args.push(Value::Integer(cursor));
    }
    sql.push_str(" ORDER BY id DESC");
    if let Some(limit) = page.limit {
        sql.push_str(" LIMIT ?");
        args.push(Value::Integer(i64::from(limit)));
    }
    (sql, args)
}

fn decode_id(id: i64) -> Result<u64, LedgerError> {
    u64::try_from(id).map_err(|_| LedgerError::Corrupt(format!("negative id {id}")))
}

fn decode_timestamp(millis: i64) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| LedgerError::Corrupt(format!("updated_at out of range: {millis}")))
}

fn transaction_error(e: rusqlite::Error) -> LedgerError {
    LedgerError::Transaction(e.to_string())
}

/// Both halves of the mutual write. Must run inside a transaction.
fn write_mutual(
    conn: &Connection,
    recipient: &str,
    actor: &str,
    actor_liked: bool,
    recipient_liked: bool,
    now: i64,
) -> Result<(), LedgerError> {
    conn.execute(
        PUT_MUTUAL_DECISION,
        params![recipient, actor, actor_liked, recipient_liked, now],
    )
    .map_err(transaction_error)?;
    conn.execute(UPDATE_MIRROR, params![actor, recipient, recipient_liked, now])
        .map_err(transaction_error)?;
    Ok(())
}

#[async_trait]
impl DecisionLedger for SqliteLedger {
    async fn put_decision(
        &self,
        recipient: &UserId,
        actor: &UserId,
        liked: bool,
    ) -> Result<(), LedgerError> {
        debug!(%recipient, %actor, liked, "put_decision");
        let (recipient, actor) = (recipient.clone(), actor.clone());
        let now = self.clock.now().timestamp_millis();
        self.with_conn(move |conn| {
            conn.execute(
                PUT_DECISION,
                params![recipient.as_str(), actor.as_str(), liked, now],
            )?;
            Ok(())
        })
        .await
    }

    async fn put_mutual_decisions(
        &self,
        recipient: &UserId,
        actor: &UserId,
        actor_liked: bool,
        recipient_liked: bool,
    ) -> Result<(), LedgerError> {
        debug!(%recipient, %actor, actor_liked, recipient_liked, "put_mutual_decisions");
        let (recipient, actor) = (recipient.clone(), actor.clone());
        let now = self.clock.now().timestamp_millis();
        self.with_conn(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(transaction_error)?;
            write_mutual(
                &tx,
                recipient.as_str(),
                actor.as_str(),
                actor_liked,
                recipient_liked,
                now,
            )?;
            tx.commit().map_err(transaction_error)
        })
        .await
    }

    async fn get_liked_decisions(
        &self,
        recipient: &UserId,
        liked: bool,
        page: PageRequest,
    ) -> Result<Vec<Liker>, LedgerError> {
        self.list(recipient, liked, false, page).await
    }

    async fn get_new_liked_decisions(
        &self,
        recipient: &UserId,
        liked: bool,
        page: PageRequest,
    ) -> Result<Vec<Liker>, LedgerError> {
        self.list(recipient, liked, true, page).await
    }

    async fn get_liked_decisions_count(
        &self,
        recipient: &UserId,
        liked: bool,
    ) -> Result<u64, LedgerError> {
        let recipient = recipient.clone();
        self.with_conn(move |conn| {
            let count: i64 =
                conn.query_row(COUNT_LIKED, params![recipient.as_str(), liked], |row| {
                    row.get(0)
                })?;
            u64::try_from(count).map_err(|_| LedgerError::Corrupt(format!("count {count}")))
        })
        .await
    }

    async fn get_decision(
        &self,
        recipient: &UserId,
        actor: &UserId,
    ) -> Result<Option<Decision>, LedgerError> {
        let (recipient, actor) = (recipient.clone(), actor.clone());
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    GET_DECISION,
                    params![recipient.as_str(), actor.as_str()],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, bool>(3)?,
                            row.get::<_, Option<bool>>(4)?,
                            row.get::<_, i64>(5)?,
                        ))
                    },
                )
                .optional()?;

            row.map(
                |(id, recipient_id, actor_id, liked, mutually_liked, updated_at)| {
                    Ok(Decision {
                        id: decode_id(id)?,
                        recipient_id: UserId::from(recipient_id),
                        actor_id: UserId::from(actor_id),
                        liked,
                        mutually_liked,
                        updated_at: decode_timestamp(updated_at)?,
                    })
                },
            )
            .transpose()
        })
        .await
    }

    async fn get_liked_decision(
        &self,
        recipient: &UserId,
        actor: &UserId,
    ) -> Result<Option<bool>, LedgerError> {
        let (recipient, actor) = (recipient.clone(), actor.clone());
        self.with_conn(move |conn| {
            let liked = conn
                .query_row(GET_LIKED, params![recipient.as_str(), actor.as_str()], |row| {
                    row.get::<_, bool>(0)
                })
                .optional()?;
            Ok(liked)
        })
        .await
    }

    async fn record_decision(
        &self,
        recipient: &UserId,
        actor: &UserId,
        liked: bool,
    ) -> Result<Resolution, LedgerError> {
        let (recipient, actor) = (recipient.clone(), actor.clone());
        let now = self.clock.now().timestamp_millis();
        let resolution = self
            .with_conn(move |conn| {
                // IMMEDIATE takes the write lock up front, so no other writer
                // can slip in between the probe and the write.
                let tx = conn
                    .transaction_with_behavior(TransactionBehavior::Immediate)
                    .map_err(transaction_error)?;
                let counterpart: Option<bool> = tx
                    .query_row(GET_LIKED, params![actor.as_str(), recipient.as_str()], |row| {
                        row.get(0)
                    })
                    .optional()
                    .map_err(transaction_error)?;

                let resolution = match counterpart {
                    None => {
                        tx.execute(
                            PUT_DECISION,
                            params![recipient.as_str(), actor.as_str(), liked, now],
                        )
                        .map_err(transaction_error)?;
                        Resolution::FirstToLike
                    }
                    Some(counterpart_liked) => {
                        write_mutual(
                            &tx,
                            recipient.as_str(),
                            actor.as_str(),
                            liked,
                            counterpart_liked,
                            now,
                        )?;
                        Resolution::Reciprocal { counterpart_liked }
                    }
                };
                tx.commit().map_err(transaction_error)?;
                Ok(resolution)
            })
            .await?;
        debug!(?resolution, "record_decision");
        Ok(resolution)
    }

    async fn close(&self) -> Result<(), LedgerError> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| LedgerError::Poisoned)?;
            match guard.take() {
                Some(conn) => conn.close().map_err(|(_, e)| LedgerError::from(e)),
                None => Ok(()),
            }
        })
        .await??;
        info!("Closed decision ledger");
        Ok(())
    }
}
