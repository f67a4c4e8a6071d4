//! AppBuilder - 設定からアプリケーションを組み立てる
//!
//! # 起動手順（Fail-fast）
//! 1. SqliteLedger を開く（`:memory:` ならプライベートな in-memory DB）
//! 2. マイグレーションを適用
//! 3. ExploreService に PutStrategy を渡して構築
//!
//! どこかで失敗したら BuildError を返し、サービスは作らない。

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use super::config::Config;
use super::explore::ExploreService;
use crate::domain::LedgerError;
use crate::impls::SqliteLedger;
use crate::ports::{Clock, DecisionLedger};

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to open ledger at {path}: {source}")]
    Open { path: String, source: LedgerError },

    #[error("failed to migrate ledger: {0}")]
    Migrate(#[source] LedgerError),
}

/// Wires a [`Config`] into a running [`App`].
///
/// ```ignore
/// let app = AppBuilder::new(Config::from_env()?).build().await?;
/// let res = app.service.count_liked_you(&CountLikedYouRequest::new("1")).await?;
/// app.shutdown().await?;
/// ```
pub struct AppBuilder {
    config: Config,
    clock: Option<Arc<dyn Clock>>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            clock: None,
        }
    }

    /// Override the wall clock used for `updated_at`.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub async fn build(self) -> Result<App, BuildError> {
        let path = self.config.database_path.clone();
        let opened = if self.config.is_in_memory() {
            SqliteLedger::open_in_memory()
        } else {
            SqliteLedger::open(Path::new(&path))
        };
        let mut ledger = opened.map_err(|source| BuildError::Open {
            path: path.clone(),
            source,
        })?;
        if let Some(clock) = self.clock {
            ledger = ledger.with_clock(clock);
        }

        let applied = ledger.migrate().await.map_err(BuildError::Migrate)?;
        info!(
            path = %path,
            applied,
            put_strategy = %self.config.put_strategy,
            "Explore service ready"
        );

        let ledger = Arc::new(ledger);
        let service =
            ExploreService::new(Arc::clone(&ledger)).with_put_strategy(self.config.put_strategy);
        Ok(App {
            service,
            ledger,
            migrations_applied: applied,
        })
    }
}

/// The built application: the orchestrator plus the ledger it owns.
pub struct App {
    pub service: ExploreService<SqliteLedger>,
    pub ledger: Arc<SqliteLedger>,
    /// Migrations applied while building; zero for an up-to-date database.
    pub migrations_applied: usize,
}

impl App {
    /// Release the ledger connection. Calls made afterwards fail with a storage error.
    pub async fn shutdown(self) -> Result<(), LedgerError> {
        self.ledger.close().await?;
        info!("Explore service stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::config::PutStrategy;
    use crate::app::requests::{CountLikedYouRequest, PutDecisionRequest};
    use crate::domain::StatusCode;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    fn in_memory() -> Config {
        Config {
            database_path: crate::app::config::IN_MEMORY.to_string(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_build_in_memory() {
        let app = AppBuilder::new(in_memory()).build().await.unwrap();
        let res = app
            .service
            .count_liked_you(&CountLikedYouRequest::new("1"))
            .await
            .unwrap();
        assert_eq!(res.count, 0);
        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_build_on_disk_is_reopenable() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: dir.path().join("explore.db").display().to_string(),
            put_strategy: PutStrategy::Atomic,
            ..Config::default()
        };

        let app = AppBuilder::new(config.clone()).build().await.unwrap();
        assert_eq!(app.migrations_applied, crate::impls::MIGRATIONS.len());
        app.service
            .put_decision(&PutDecisionRequest::new("1", "2", true))
            .await
            .unwrap();
        app.shutdown().await.unwrap();

        let app = AppBuilder::new(config).build().await.unwrap();
        assert_eq!(app.migrations_applied, 0);
        let res = app
            .service
            .count_liked_you(&CountLikedYouRequest::new("1"))
            .await
            .unwrap();
        assert_eq!(res.count, 1);
        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_build_unopenable_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: dir.path().join("missing").join("explore.db").display().to_string(),
            ..Config::default()
        };
        let err = AppBuilder::new(config).build().await.err().unwrap();
        assert!(matches!(err, BuildError::Open { .. }));
    }

    #[tokio::test]
    async fn test_injected_clock_stamps_rows() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let app = AppBuilder::new(in_memory())
            .clock(Arc::new(FixedClock::new(at)))
            .build()
            .await
            .unwrap();
        app.service
            .put_decision(&PutDecisionRequest::new("1", "2", true))
            .await
            .unwrap();
        let decision = app
            .ledger
            .get_decision(&"1".into(), &"2".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decision.updated_at, at);
    }

    #[tokio::test]
    async fn test_calls_after_shutdown_are_internal() {
        let app = AppBuilder::new(in_memory()).build().await.unwrap();
        let service = app.service.clone();
        app.shutdown().await.unwrap();

        let err = service
            .count_liked_you(&CountLikedYouRequest::new("1"))
            .await
            .unwrap_err();
        assert_eq!(err.code, StatusCode::Internal);
    }
}
