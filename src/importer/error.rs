// ==========================================
// 症例記録インポート - 取込エラー型
// ==========================================
// 致命的エラーのみ。行・値単位の問題は Diagnostic として報告する
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 取込を中断するエラー
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== ファイル =====
    #[error("ファイルが存在しません: {0}")]
    FileNotFound(String),

    #[error("未対応のファイル形式です: {0}（.xlsx/.xlsm/.xls/.ods/.csv/.tsv のみ）")]
    UnsupportedFormat(String),

    // ===== 文書解析（書き込み前に中断）=====
    #[error("文書の解析に失敗しました: {0}")]
    Document(String),

    // ===== 記録ストア =====
    #[error("記録ストアの操作に失敗しました: {0}")]
    Store(String),

    /// コミット失敗。ストアのメッセージをそのまま保持
    #[error("{0}")]
    Commit(String),

    // ===== 入力 =====
    #[error("入力が不正です: {0}")]
    InvalidInput(String),
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::Document(err.to_string())
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::Document(format!("CSV: {}", err))
    }
}

impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::Document(err.to_string())
    }
}

impl From<RepositoryError> for ImportError {
    fn from(err: RepositoryError) -> Self {
        ImportError::Store(err.to_string())
    }
}

/// Result 型エイリアス
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_error_keeps_store_message() {
        let err = ImportError::Commit("disk I/O error".to_string());
        assert_eq!(err.to_string(), "disk I/O error");
    }

    #[test]
    fn test_repository_error_maps_to_store() {
        let err: ImportError = RepositoryError::NotFound {
            entity: "Patient".to_string(),
            id: "P001".to_string(),
        }
        .into();
        assert!(matches!(err, ImportError::Store(_)));
    }
}
