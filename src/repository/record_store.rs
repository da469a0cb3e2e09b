// ==========================================
// 症例記録インポート - 記録ストア Trait
// ==========================================
// 職責: 取込パイプラインが必要とする永続化契約
// 制約: ストアは業務ルールを持たない（照合・上書き規則は importer 側）
// ==========================================

use crate::domain::{FollowUp, LabData, Patient, Surgery};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

/// upsert の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

// ==========================================
// RecordStore Trait
// ==========================================
// 実装: SqliteRecordStore（rusqlite）/ MemoryRecordStore（テスト・dry-run）
//
// begin 〜 commit / rollback の間の書き込みは 1 単位として確定・破棄される
#[async_trait]
pub trait RecordStore: Send + Sync {
    // ===== トランザクション =====

    async fn begin(&self) -> RepositoryResult<()>;

    async fn commit(&self) -> RepositoryResult<()>;

    async fn rollback(&self) -> RepositoryResult<()>;

    // ===== 参照 =====

    /// 自然キーで患者を検索
    async fn find_patient_by_key(&self, patient_id: &str) -> RepositoryResult<Option<Patient>>;

    /// 患者・手術日で手術を検索（作成順）
    async fn find_surgeries_by_patient_and_date(
        &self,
        patient_id: &str,
        surgery_date: NaiveDate,
    ) -> RepositoryResult<Vec<Surgery>>;

    /// 患者・手術日で最初の手術を返す
    async fn find_surgery_by_patient_and_date(
        &self,
        patient_id: &str,
        surgery_date: NaiveDate,
    ) -> RepositoryResult<Option<Surgery>> {
        Ok(self
            .find_surgeries_by_patient_and_date(patient_id, surgery_date)
            .await?
            .into_iter()
            .next())
    }

    async fn get_surgery(&self, id: Uuid) -> RepositoryResult<Option<Surgery>>;

    async fn get_follow_up(&self, id: Uuid) -> RepositoryResult<Option<FollowUp>>;

    // ===== 書き込み =====

    /// patient_id をキーに作成または全項目上書き
    async fn upsert_patient(&self, patient: &Patient) -> RepositoryResult<UpsertOutcome>;

    async fn create_surgery(&self, surgery: &Surgery) -> RepositoryResult<()>;

    async fn create_lab_data(&self, lab_data: &LabData) -> RepositoryResult<()>;

    async fn create_follow_up(&self, follow_up: &FollowUp) -> RepositoryResult<()>;
}
