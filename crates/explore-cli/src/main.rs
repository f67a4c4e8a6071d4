//! explore - Explore service の CLI
//!
//! 1 コマンド = 1 リクエスト。レスポンスは JSON で stdout に出す。
//!
//! ```bash
//! explore put-decision --recipient B --actor A --liked
//! explore list-liked-you --recipient B --limit 20
//! explore --put-strategy atomic put-decision --recipient A --actor B --liked
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use explore_core::app::{
    App, AppBuilder, Config, CountLikedYouRequest, ListLikedYouRequest, PutDecisionRequest,
    PutStrategy,
};
use explore_core::observability::setup_tracing;

#[derive(Parser)]
#[command(name = "explore", version, about = "Like-decision ledger for the Explore service")]
struct Cli {
    /// JSON config file. Without it, settings come from the environment.
    #[arg(long, value_name = "PATH", env = "EXPLORE_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file, or `:memory:`.
    #[arg(long, value_name = "PATH")]
    database: Option<String>,

    /// Default tracing filter when RUST_LOG is unset.
    #[arg(long, value_name = "FILTER")]
    log_filter: Option<String>,

    #[arg(long, value_name = "STRATEGY")]
    put_strategy: Option<PutStrategy>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending migrations and report how many ran.
    Migrate,
    /// Everyone who liked the recipient, newest first.
    ListLikedYou(ListArgs),
    /// Likers whose mutuality is still unresolved.
    ListNewLikedYou(ListArgs),
    /// Number of users who liked the recipient.
    CountLikedYou {
        #[arg(long)]
        recipient: String,
    },
    /// Record the actor's decision about the recipient.
    PutDecision {
        #[arg(long)]
        recipient: String,
        #[arg(long)]
        actor: String,
        /// Pass to like; omit to decline.
        #[arg(long)]
        liked: bool,
    },
}

#[derive(Args)]
struct ListArgs {
    #[arg(long)]
    recipient: String,
    /// Continue after this pagination token.
    #[arg(long)]
    token: Option<String>,
    #[arg(long)]
    limit: Option<u32>,
}

impl ListArgs {
    fn into_request(self) -> ListLikedYouRequest {
        ListLikedYouRequest {
            recipient_user_id: self.recipient,
            pagination_token: self.token,
            pagination_limit: self.limit,
        }
    }
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)?,
            None => Config::from_env()?,
        };
        if let Some(database) = &self.database {
            config.database_path = database.clone();
        }
        if let Some(filter) = &self.log_filter {
            config.log_filter = filter.clone();
        }
        if let Some(strategy) = self.put_strategy {
            config.put_strategy = strategy;
        }
        Ok(config)
    }
}

/// Output of `explore migrate`.
#[derive(Serialize)]
struct MigrateReport {
    applied: usize,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(app: &App, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Migrate => {
            info!(applied = app.migrations_applied, "Migrations applied");
            print_json(&MigrateReport {
                applied: app.migrations_applied,
            })
        }
        Command::ListLikedYou(args) => {
            print_json(&app.service.list_liked_you(&args.into_request()).await?)
        }
        Command::ListNewLikedYou(args) => {
            print_json(&app.service.list_new_liked_you(&args.into_request()).await?)
        }
        Command::CountLikedYou { recipient } => {
            let req = CountLikedYouRequest::new(recipient);
            print_json(&app.service.count_liked_you(&req).await?)
        }
        Command::PutDecision {
            recipient,
            actor,
            liked,
        } => {
            let req = PutDecisionRequest::new(recipient, actor, liked);
            print_json(&app.service.put_decision(&req).await?)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config().context("loading configuration")?;
    setup_tracing(&config.log_filter);

    let app = AppBuilder::new(config)
        .build()
        .await
        .context("starting explore service")?;

    let outcome = run(&app, cli.command).await;

    // Close the ledger even when the request failed.
    app.shutdown().await.context("closing ledger")?;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("explore.json");
        std::fs::write(&path, r#"{"database_path": "from-file.db"}"#).unwrap();

        let cli = Cli::try_parse_from([
            "explore",
            "--config",
            path.to_str().unwrap(),
            "--put-strategy",
            "atomic",
            "count-liked-you",
            "--recipient",
            "1",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.database_path, "from-file.db");
        assert_eq!(config.put_strategy, PutStrategy::Atomic);
    }

    #[test]
    fn list_args_map_to_request() {
        let cli = Cli::try_parse_from([
            "explore",
            "list-new-liked-you",
            "--recipient",
            "1",
            "--token",
            "42",
            "--limit",
            "10",
        ])
        .unwrap();
        let Command::ListNewLikedYou(args) = cli.command else {
            panic!("wrong subcommand");
        };
        let req = args.into_request();
        assert_eq!(req.pagination_token.as_deref(), Some("42"));
        assert_eq!(req.pagination_limit, Some(10));
    }

    #[tokio::test]
    async fn migrate_reports_applied_count() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: dir.path().join("explore.db").display().to_string(),
            ..Config::default()
        };

        let app = AppBuilder::new(config.clone()).build().await.unwrap();
        assert!(app.migrations_applied > 0);
        run(&app, Command::Migrate).await.unwrap();
        app.shutdown().await.unwrap();

        let app = AppBuilder::new(config).build().await.unwrap();
        assert_eq!(app.migrations_applied, 0);
        app.shutdown().await.unwrap();
    }

    #[test]
    fn unknown_put_strategy_is_rejected() {
        let parsed = Cli::try_parse_from(["explore", "--put-strategy", "eager", "migrate"]);
        assert!(parsed.is_err());
    }
}
