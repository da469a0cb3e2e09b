// ==========================================
// 症例記録インポート - 取込 Trait
// ==========================================
// 職責: 取込インターフェースの定義（実装は含まない）
// ==========================================

use crate::domain::ImportReport;
use crate::importer::error::ImportResult;
use crate::importer::workbook::Workbook;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 検査結果貼り付けの取込要求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabPasteRequest {
    pub patient_id: String,
    pub test_date: NaiveDate,
    pub surgery_date: Option<NaiveDate>, // 指定時はその日の手術に紐付け
    pub text: String,
}

// ==========================================
// CaseImporter Trait
// ==========================================
// 実装: CaseImporterImpl
#[async_trait]
pub trait CaseImporter: Send + Sync {
    /// ファイルから取り込む
    ///
    /// # 対応形式
    /// - .xlsx / .xlsm / .xls / .xlsb / .ods（複数シート）
    /// - .csv / .tsv（単一シート、ファイル名がシート名）
    ///
    /// # 戻り値
    /// - Ok(ImportReport): 件数・診断
    /// - Err: ファイル解析失敗（書き込み前）、記録ストア失敗、コミット失敗
    async fn import_file(&self, file_path: &Path) -> ImportResult<ImportReport>;

    /// 解析済みの文書を取り込む
    ///
    /// # 取込順
    /// 1. 患者基本情報
    /// 2. 手術情報
    /// 3. 血液検査
    /// 4. 経過情報
    ///
    /// 全シートを 1 トランザクションで確定する
    async fn import_workbook(
        &self,
        workbook: &Workbook,
        file_name: Option<&str>,
    ) -> ImportResult<ImportReport>;

    /// 検査結果貼り付けから LabData を 1 件作成
    async fn import_lab_paste(&self, request: &LabPasteRequest) -> ImportResult<ImportReport>;
}
