// ==========================================
// 症例記録インポート - アプリケーション状態
// ==========================================
// 職責: DB 接続を 1 本開き、各 API で共有する
// ==========================================

use crate::api::{ApiError, ApiResult, ConfigApi, ImportApi};
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// DB パスを明示する環境変数
pub const DB_PATH_ENV: &str = "CASEFILE_IMPORT_DB_PATH";

const DB_FILE_NAME: &str = "casefile.db";

/// アプリケーション状態
pub struct AppState {
    pub db_path: String,
    pub import_api: Arc<ImportApi>,
    pub config_api: Arc<ConfigApi>,
}

impl AppState {
    pub fn new(db_path: String) -> ApiResult<Self> {
        tracing::info!(db_path = %db_path, "AppState を初期化");

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        init_schema(&conn).map_err(|e| ApiError::DatabaseError(e.to_string()))?;
        let conn = Arc::new(Mutex::new(conn));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| ApiError::ConfigError(e.to_string()))?,
        );

        Ok(Self {
            db_path,
            import_api: Arc::new(ImportApi::new(conn, config_manager.clone())),
            config_api: Arc::new(ConfigApi::new(config_manager)),
        })
    }
}

/// 既定の DB パス
///
/// 優先順:
/// 1. 環境変数 CASEFILE_IMPORT_DB_PATH
/// 2. ユーザーデータディレクトリ（開発ビルドは casefile-import-dev）
/// 3. カレントディレクトリの casefile.db
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from(".").join(DB_FILE_NAME);

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        let dir = data_dir.join("casefile-import-dev");
        #[cfg(not(debug_assertions))]
        let dir = data_dir.join("casefile-import");

        // 作成できなければカレントディレクトリを使う
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join(DB_FILE_NAME);
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(path.ends_with(DB_FILE_NAME) || std::env::var(DB_PATH_ENV).is_ok());
    }

    #[test]
    fn test_app_state_opens_database() {
        let file = NamedTempFile::new().unwrap();
        let db_path = file.path().to_string_lossy().to_string();
        let state = AppState::new(db_path.clone()).unwrap();
        assert_eq!(state.db_path, db_path);
        assert!(state.config_api.list_configs().unwrap().is_empty());
    }
}
