// ==========================================
// 症例記録インポート - API 層エラー型
// ==========================================
// 職責: 取込・記録ストア・設定のエラーを利用者向けメッセージへ変換
// ==========================================

use crate::importer::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API 層エラー
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 入力
    // ==========================================
    #[error("入力が不正です: {0}")]
    InvalidInput(String),

    #[error("見つかりません: {0}")]
    NotFound(String),

    #[error("業務ルール違反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // データアクセス
    // ==========================================
    #[error("データベースエラー: {0}")]
    DatabaseError(String),

    #[error("データベース接続に失敗しました: {0}")]
    DatabaseConnectionError(String),

    #[error("トランザクションに失敗しました: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 取込
    // ==========================================
    #[error("取込に失敗しました: {0}")]
    ImportError(String),

    /// コミット失敗。ストアのメッセージをそのまま保持
    #[error("取込を確定できませんでした: {0}")]
    CommitFailed(String),

    #[error("設定の読み書きに失敗しました: {0}")]
    ConfigError(String),

    // ==========================================
    // 汎用
    // ==========================================
    #[error("内部エラー: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// RepositoryError からの変換
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("ロック取得失敗: {}", msg))
            }
            RepositoryError::NoActiveTransaction => {
                ApiError::DatabaseTransactionError(err.to_string())
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("一意制約違反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外部キー制約違反: {}", msg))
            }
            RepositoryError::SerializationError(msg) => ApiError::InternalError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("項目 {}: {}", field, message))
            }
        }
    }
}

// ==========================================
// ImportError からの変換
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::FileNotFound(path) => ApiError::NotFound(format!("ファイル {}", path)),
            ImportError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            ImportError::Commit(msg) => ApiError::CommitFailed(msg),
            ImportError::UnsupportedFormat(_) | ImportError::Document(_) | ImportError::Store(_) => {
                ApiError::ImportError(err.to_string())
            }
        }
    }
}

/// Result 型エイリアス
pub type ApiResult<T> = Result<T, ApiError>;
