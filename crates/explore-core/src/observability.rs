//! Observability - tracing の初期化
//!
//! 全レイヤーが `tracing` のマクロでログを出す。subscriber はバイナリ側で一度だけ入れる。
//!
//! ```bash
//! RUST_LOG=debug explore list-liked-you --recipient 1
//! RUST_LOG=explore_core::impls=trace explore count-liked-you --recipient 1
//! ```

use tracing_subscriber::EnvFilter;

/// Install a compact fmt subscriber.
///
/// `RUST_LOG` wins over `default_filter` when it is set. Returns `false` if a
/// global subscriber was already installed (tests, embedding hosts).
pub fn setup_tracing(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_refused() {
        setup_tracing("info");
        assert!(!setup_tracing("debug"));
    }
}
