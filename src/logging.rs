// ==========================================
// ログ初期化
// ==========================================
// tracing + tracing-subscriber
// RUST_LOG で出力レベルを指定（既定: info）
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// ログを初期化
///
/// # 環境変数
/// - RUST_LOG: 例 `RUST_LOG=debug`、`RUST_LOG=casefile_import=trace`
///
/// # 例
/// ```no_run
/// use casefile_import::logging;
/// logging::init();
/// ```
pub fn init() {
    fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();
}

/// JSON 形式で初期化（取込結果を標準出力へ流す場合）
pub fn init_json() {
    fmt()
        .json()
        .with_env_filter(env_filter())
        .with_current_span(true)
        .with_writer(std::io::stderr)
        .init();
}

/// テスト用（debug レベル、テスト出力へ）
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
