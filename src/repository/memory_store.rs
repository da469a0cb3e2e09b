// ==========================================
// 症例記録インポート - インメモリ記録ストア
// ==========================================
// 用途: dry-run（検証のみの取込）とテスト
// begin 時点のスナップショットに書き込み、commit で確定する
// ==========================================

use crate::domain::{FollowUp, LabData, Patient, RecordKind, Surgery};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_store::{RecordStore, UpsertOutcome};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct Snapshot {
    patients: BTreeMap<String, Patient>,
    surgeries: Vec<Surgery>,
    lab_data: Vec<LabData>,
    follow_ups: Vec<FollowUp>,
}

impl Snapshot {
    fn has_surgery(&self, id: Uuid) -> bool {
        self.surgeries.iter().any(|s| s.id == id)
    }
}

#[derive(Debug, Default)]
struct Inner {
    committed: Snapshot,
    staged: Option<Snapshot>,
    commit_failure: Option<String>,
    write_failure: Option<(RecordKind, String)>,
}

impl Inner {
    /// 書き込み先（トランザクション中は staged）
    fn active(&mut self) -> &mut Snapshot {
        match self.staged {
            Some(ref mut staged) => staged,
            None => &mut self.committed,
        }
    }

    fn view(&self) -> &Snapshot {
        self.staged.as_ref().unwrap_or(&self.committed)
    }

    fn check_write(&self, kind: RecordKind) -> RepositoryResult<()> {
        match &self.write_failure {
            Some((failing, message)) if *failing == kind => {
                Err(RepositoryError::DatabaseQueryError(message.clone()))
            }
            _ => Ok(()),
        }
    }
}

// ==========================================
// MemoryRecordStore
// ==========================================
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    inner: Mutex<Inner>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// commit を指定メッセージで失敗させる
    pub fn with_commit_failure(message: impl Into<String>) -> Self {
        let store = Self::default();
        if let Ok(mut inner) = store.inner.lock() {
            inner.commit_failure = Some(message.into());
        }
        store
    }

    /// 指定種別の作成・upsert を失敗させる
    pub fn with_write_failure(kind: RecordKind, message: impl Into<String>) -> Self {
        let store = Self::default();
        if let Ok(mut inner) = store.inner.lock() {
            inner.write_failure = Some((kind, message.into()));
        }
        store
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ===== 確定済みデータの参照 =====

    pub fn patients(&self) -> Vec<Patient> {
        self.lock()
            .map(|inner| inner.committed.patients.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn surgeries(&self) -> Vec<Surgery> {
        self.lock()
            .map(|inner| inner.committed.surgeries.clone())
            .unwrap_or_default()
    }

    pub fn lab_data(&self) -> Vec<LabData> {
        self.lock()
            .map(|inner| inner.committed.lab_data.clone())
            .unwrap_or_default()
    }

    pub fn follow_ups(&self) -> Vec<FollowUp> {
        self.lock()
            .map(|inner| inner.committed.follow_ups.clone())
            .unwrap_or_default()
    }

    pub fn in_transaction(&self) -> bool {
        self.lock().map(|inner| inner.staged.is_some()).unwrap_or(false)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn begin(&self) -> RepositoryResult<()> {
        let mut inner = self.lock()?;
        if inner.staged.is_some() {
            return Err(RepositoryError::DatabaseTransactionError(
                "トランザクションは既に開始されています".to_string(),
            ));
        }
        inner.staged = Some(inner.committed.clone());
        Ok(())
    }

    async fn commit(&self) -> RepositoryResult<()> {
        let mut inner = self.lock()?;
        if let Some(message) = inner.commit_failure.clone() {
            inner.staged = None;
            return Err(RepositoryError::DatabaseTransactionError(message));
        }
        let staged = inner.staged.take().ok_or(RepositoryError::NoActiveTransaction)?;
        inner.committed = staged;
        Ok(())
    }

    async fn rollback(&self) -> RepositoryResult<()> {
        self.lock()?.staged = None;
        Ok(())
    }

    async fn find_patient_by_key(&self, patient_id: &str) -> RepositoryResult<Option<Patient>> {
        Ok(self.lock()?.view().patients.get(patient_id).cloned())
    }

    async fn find_surgeries_by_patient_and_date(
        &self,
        patient_id: &str,
        surgery_date: NaiveDate,
    ) -> RepositoryResult<Vec<Surgery>> {
        let inner = self.lock()?;
        Ok(inner
            .view()
            .surgeries
            .iter()
            .filter(|s| s.patient_id == patient_id && s.surgery_date == surgery_date)
            .cloned()
            .collect())
    }

    async fn get_surgery(&self, id: Uuid) -> RepositoryResult<Option<Surgery>> {
        let inner = self.lock()?;
        Ok(inner.view().surgeries.iter().find(|s| s.id == id).cloned())
    }

    async fn get_follow_up(&self, id: Uuid) -> RepositoryResult<Option<FollowUp>> {
        let inner = self.lock()?;
        Ok(inner.view().follow_ups.iter().find(|f| f.id == id).cloned())
    }

    async fn upsert_patient(&self, patient: &Patient) -> RepositoryResult<UpsertOutcome> {
        let mut inner = self.lock()?;
        inner.check_write(RecordKind::Patient)?;
        let previous = inner
            .active()
            .patients
            .insert(patient.patient_id.clone(), patient.clone());

        Ok(match previous {
            Some(existing) => {
                // 作成日時は最初の登録を維持
                if let Some(stored) = inner.active().patients.get_mut(&patient.patient_id) {
                    stored.created_at = existing.created_at;
                }
                UpsertOutcome::Updated
            }
            None => UpsertOutcome::Created,
        })
    }

    async fn create_surgery(&self, surgery: &Surgery) -> RepositoryResult<()> {
        let mut inner = self.lock()?;
        inner.check_write(RecordKind::Surgery)?;
        let snapshot = inner.active();
        if !snapshot.patients.contains_key(&surgery.patient_id) {
            return Err(RepositoryError::ForeignKeyViolation(format!(
                "surgery.patient_id={}",
                surgery.patient_id
            )));
        }
        snapshot.surgeries.push(surgery.clone());
        Ok(())
    }

    async fn create_lab_data(&self, lab_data: &LabData) -> RepositoryResult<()> {
        let mut inner = self.lock()?;
        inner.check_write(RecordKind::LabData)?;
        let snapshot = inner.active();
        if !snapshot.patients.contains_key(&lab_data.patient_id) {
            return Err(RepositoryError::ForeignKeyViolation(format!(
                "lab_data.patient_id={}",
                lab_data.patient_id
            )));
        }
        if let Some(surgery_id) = lab_data.surgery_id {
            if !snapshot.has_surgery(surgery_id) {
                return Err(RepositoryError::ForeignKeyViolation(format!(
                    "lab_data.surgery_id={}",
                    surgery_id
                )));
            }
        }
        snapshot.lab_data.push(lab_data.clone());
        Ok(())
    }

    async fn create_follow_up(&self, follow_up: &FollowUp) -> RepositoryResult<()> {
        let mut inner = self.lock()?;
        inner.check_write(RecordKind::FollowUp)?;
        let snapshot = inner.active();
        if !snapshot.has_surgery(follow_up.surgery_id) {
            return Err(RepositoryError::ForeignKeyViolation(format!(
                "follow_up.surgery_id={}",
                follow_up.surgery_id
            )));
        }
        snapshot.follow_ups.push(follow_up.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_staged_writes_visible_before_commit() {
        let store = MemoryRecordStore::new();
        store.begin().await.unwrap();
        store.upsert_patient(&Patient::new("P001")).await.unwrap();

        assert!(store.find_patient_by_key("P001").await.unwrap().is_some());
        assert!(store.patients().is_empty());

        store.commit().await.unwrap();
        assert_eq!(store.patients().len(), 1);
        assert!(!store.in_transaction());
    }

    #[tokio::test]
    async fn test_rollback_restores_committed_state() {
        let store = MemoryRecordStore::new();
        store.begin().await.unwrap();
        store.upsert_patient(&Patient::new("P001")).await.unwrap();
        store.rollback().await.unwrap();

        assert!(store.find_patient_by_key("P001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_failure_discards_staged() {
        let store = MemoryRecordStore::with_commit_failure("disk full");
        store.begin().await.unwrap();
        store.upsert_patient(&Patient::new("P001")).await.unwrap();

        let err = store.commit().await.unwrap_err();
        assert_eq!(err.to_string(), "トランザクション処理に失敗しました: disk full");
        assert!(store.patients().is_empty());
    }

    #[tokio::test]
    async fn test_surgery_requires_patient() {
        let store = MemoryRecordStore::new();
        let surgery = Surgery::new("P404", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let err = store.create_surgery(&surgery).await.unwrap_err();
        assert!(matches!(err, RepositoryError::ForeignKeyViolation(_)));
    }
}
