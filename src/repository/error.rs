// ==========================================
// 症例記録インポート - 記録ストア層エラー型
// ==========================================
// 工具: thiserror 派生マクロ
// ==========================================

use thiserror::Error;

/// 記録ストア層エラー
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 参照 =====
    #[error("レコードが見つかりません: {entity} id={id}")]
    NotFound { entity: String, id: String },

    // ===== 接続 / ロック =====
    #[error("データベース接続に失敗しました: {0}")]
    DatabaseConnectionError(String),

    #[error("データベースロックの取得に失敗しました: {0}")]
    LockError(String),

    // ===== トランザクション =====
    #[error("トランザクションが開始されていません")]
    NoActiveTransaction,

    #[error("トランザクション処理に失敗しました: {0}")]
    DatabaseTransactionError(String),

    // ===== クエリ / 制約 =====
    #[error("クエリに失敗しました: {0}")]
    DatabaseQueryError(String),

    #[error("一意制約違反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外部キー制約違反: {0}")]
    ForeignKeyViolation(String),

    // ===== ペイロード =====
    #[error("レコードの直列化に失敗しました: {0}")]
    SerializationError(String),

    #[error("フィールド値が不正です (field={field}): {message}")]
    FieldValueError { field: String, message: String },
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains("UNIQUE") {
                    RepositoryError::UniqueConstraintViolation(msg)
                } else if msg.contains("FOREIGN KEY") {
                    RepositoryError::ForeignKeyViolation(msg)
                } else {
                    RepositoryError::DatabaseQueryError(msg)
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Unknown".to_string(),
                id: "Unknown".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::SerializationError(err.to_string())
    }
}

/// Result 型エイリアス
pub type RepositoryResult<T> = Result<T, RepositoryError>;
