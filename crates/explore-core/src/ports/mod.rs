//! Ports - 抽象化レイヤー
//!
//! 外部システム（SQLite などの store、時計）へのインターフェース。
//! app 層はこの trait だけに依存し、実装は impls に置く。

pub mod ledger;
pub mod clock;

pub use self::ledger::DecisionLedger;
pub use self::clock::{Clock, FixedClock, SystemClock};
