//! Migrations - decisions スキーマの埋め込み SQL
//!
//! SQL はバイナリに `include_str!` で埋め込む。適用済みのものは
//! `migrations` テーブルに記録し、再実行しても二重適用しない。

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use crate::domain::LedgerError;

/// Bookkeeping table for applied migrations.
pub const MIGRATIONS_TABLE: &str = "migrations";

/// One embedded schema step.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

/// All migrations, in application order.
pub const MIGRATIONS: &[Migration] = &[Migration {
    name: "0001_create_decisions",
    sql: include_str!("../../migrations/0001_create_decisions.sql"),
}];

/// Apply every pending migration in one transaction.
///
/// Returns how many were applied by this call.
pub fn run_migrations(conn: &mut Connection, now: DateTime<Utc>) -> Result<usize, LedgerError> {
    let tx = conn.transaction().map_err(migration_error)?;
    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
            id         TEXT    PRIMARY KEY,
            applied_at INTEGER NOT NULL
        );"
    ))
    .map_err(migration_error)?;

    let mut applied = 0;
    for migration in MIGRATIONS {
        let done: Option<String> = tx
            .query_row(
                &format!("SELECT id FROM {MIGRATIONS_TABLE} WHERE id = ?1"),
                params![migration.name],
                |row| row.get(0),
            )
            .optional()
            .map_err(migration_error)?;
        if done.is_some() {
            continue;
        }

        tx.execute_batch(migration.sql).map_err(|e| {
            LedgerError::Migration(format!("{}: {}", migration.name, e))
        })?;
        tx.execute(
            &format!("INSERT INTO {MIGRATIONS_TABLE} (id, applied_at) VALUES (?1, ?2)"),
            params![migration.name, now.timestamp_millis()],
        )
        .map_err(migration_error)?;
        info!(migration = migration.name, "Applied migration");
        applied += 1;
    }

    tx.commit().map_err(migration_error)?;
    Ok(applied)
}

fn migration_error(e: rusqlite::Error) -> LedgerError {
    LedgerError::Migration(e.to_string())
}
