//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **SqliteLedger**: 本番用の DecisionLedger（rusqlite, bundled SQLite）
//! - **InMemoryLedger**: 開発・テスト用の DecisionLedger
//! - **migrations**: decisions スキーマの埋め込み SQL と適用処理

pub mod inmem_ledger;
pub mod migrations;
pub mod sqlite_ledger;

pub use self::inmem_ledger::InMemoryLedger;
pub use self::migrations::{Migration, MIGRATIONS, run_migrations};
pub use self::sqlite_ledger::SqliteLedger;
