//! App - アプリケーション層
//!
//! ports を組み合わせて公開 API を実装する。
//!
//! # 主要コンポーネント
//! - **ExploreService**: リクエストの検証・ledger 呼び出し・レスポンス整形
//! - **requests**: ワイヤ形式（camelCase JSON）のリクエスト/レスポンス
//! - **Config**: 環境変数 / JSON ファイルからの設定
//! - **AppBuilder**: 設定 → ledger → service の組み立て

pub mod builder;
pub mod config;
pub mod explore;
pub mod requests;

pub use self::builder::{App, AppBuilder, BuildError};
pub use self::config::{Config, ConfigError, PutStrategy};
pub use self::explore::ExploreService;
pub use self::requests::{
    CountLikedYouRequest, CountLikedYouResponse, ListLikedYouRequest, ListLikedYouResponse,
    LikerView, PutDecisionRequest, PutDecisionResponse,
};
