// ==========================================
// 症例記録インポート - アプリケーション層
// ==========================================
// 職責: 共有接続と API インスタンスの組み立て
// ==========================================

pub mod state;

pub use state::{get_default_db_path, AppState, DB_PATH_ENV};
