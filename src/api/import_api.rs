// ==========================================
// 症例記録インポート - 取込 API
// ==========================================
// 職責: ファイル取込 / 検査結果貼り付け / 定着率評価
// 接続: SqliteRecordStore と ConfigManager は同一接続を共有
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportConfigReader, ImportSettings};
use crate::domain::ImportReport;
use crate::engine::{days_after_surgery, follow_up_retention, surgery_bmi, FollowUpRetention};
use crate::importer::{CaseImporter, CaseImporterImpl, LabPasteRequest};
use crate::repository::{RecordStore, RepositoryError, SqliteRecordStore};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;
use uuid::Uuid;

/// 取込 API の応答
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportApiResponse {
    pub report: ImportReport,
    /// 利用者向けメッセージ（件数行 + 診断行）
    pub messages: Vec<String>,
}

impl From<ImportReport> for ImportApiResponse {
    fn from(report: ImportReport) -> Self {
        let messages = report.messages();
        Self { report, messages }
    }
}

/// 経過記録 1 件の定着率評価
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionEvaluation {
    pub follow_up_id: Uuid,
    pub surgery_id: Uuid,
    pub timing: Option<String>,
    pub days_after_surgery: Option<i64>,
    pub bmi: Option<f64>,
    pub retention: FollowUpRetention,
}

// ==========================================
// ImportApi
// ==========================================
pub struct ImportApi {
    conn: Arc<Mutex<Connection>>,
    config_manager: Arc<ConfigManager>,
}

impl ImportApi {
    pub fn new(conn: Arc<Mutex<Connection>>, config_manager: Arc<ConfigManager>) -> Self {
        Self {
            conn,
            config_manager,
        }
    }

    fn store(&self) -> ApiResult<SqliteRecordStore> {
        Ok(SqliteRecordStore::from_connection(self.conn.clone())?)
    }

    async fn settings(&self) -> ApiResult<ImportSettings> {
        self.config_manager
            .load_settings()
            .await
            .map_err(|e| ApiError::ConfigError(e.to_string()))
    }

    async fn importer(&self, dry_run: bool) -> ApiResult<CaseImporterImpl<SqliteRecordStore>> {
        let settings = self.settings().await?;
        Ok(CaseImporterImpl::new(self.store()?, settings).with_dry_run(dry_run))
    }

    /// ファイルを取り込む
    ///
    /// # 引数
    /// - file_path: 取込ファイル（.xlsx / .xls / .ods / .csv / .tsv など）
    /// - dry_run: true なら検証のみで確定しない
    pub async fn import_file(&self, file_path: &str, dry_run: bool) -> ApiResult<ImportApiResponse> {
        if file_path.trim().is_empty() {
            return Err(ApiError::InvalidInput("ファイルパスが空です".to_string()));
        }
        let importer = self.importer(dry_run).await?;
        let report = importer.import_file(Path::new(file_path)).await?;
        Ok(report.into())
    }

    /// 検査結果の貼り付けテキストを取り込む
    pub async fn import_lab_paste(&self, request: &LabPasteRequest) -> ApiResult<ImportApiResponse> {
        if request.patient_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("患者IDが空です".to_string()));
        }
        let importer = self.importer(false).await?;
        let report = importer.import_lab_paste(request).await?;
        Ok(report.into())
    }

    /// 経過記録の左右別定着率（保存しない算出値）
    pub async fn evaluate_follow_up(&self, follow_up_id: &str) -> ApiResult<RetentionEvaluation> {
        let id = Uuid::parse_str(follow_up_id.trim())
            .map_err(|e| ApiError::InvalidInput(format!("経過ID {}: {}", follow_up_id, e)))?;
        let store = self.store()?;

        let follow_up = store.get_follow_up(id).await?.ok_or(RepositoryError::NotFound {
            entity: "FollowUp".to_string(),
            id: id.to_string(),
        })?;
        let surgery = store
            .get_surgery(follow_up.surgery_id)
            .await?
            .ok_or(RepositoryError::NotFound {
                entity: "Surgery".to_string(),
                id: follow_up.surgery_id.to_string(),
            })?;
        let settings = self.settings().await?;

        let retention = follow_up_retention(&surgery, &follow_up, &settings.retention);
        info!(
            follow_up_id = %id,
            right = ?retention.right.map(|side| side.rate),
            left = ?retention.left.map(|side| side.rate),
            "定着率を算出"
        );

        Ok(RetentionEvaluation {
            follow_up_id: id,
            surgery_id: surgery.id,
            timing: follow_up.timing.clone(),
            days_after_surgery: follow_up
                .reference_date()
                .map(|date| days_after_surgery(surgery.surgery_date, date)),
            bmi: surgery_bmi(&surgery),
            retention,
        })
    }
}
