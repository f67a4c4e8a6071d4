//! explore-core
//!
//! Core building blocks for the Explore service: a ledger of "like" decisions
//! between two users and the request orchestration that sits on top of it.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, decision, pagination, errors）
//! - **ports**: 抽象化レイヤー（DecisionLedger, Clock）
//! - **impls**: 実装（SqliteLedger, InMemoryLedger, migrations）
//! - **app**: アプリケーションロジック（ExploreService, config, builder）
//! - **observability**: tracing の初期化

pub mod domain;
pub mod ports;
pub mod impls;
pub mod app;
pub mod observability;
