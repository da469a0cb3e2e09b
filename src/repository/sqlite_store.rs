// ==========================================
// 症例記録インポート - SQLite 記録ストア
// ==========================================
// 職責: RecordStore 契約の rusqlite 実装
// 制約: 業務ルールは持たない。CRUD とトランザクション境界のみ
// 保存形式: 患者・経過は列展開、手術・血液検査は record_json + 検索列
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::{FollowUp, LabData, Patient, Surgery};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_store::{RecordStore, UpsertOutcome};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";

// ==========================================
// SqliteRecordStore
// ==========================================
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// DB ファイルを開き、スキーマを用意する
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 既存接続から作成（ConfigManager と接続を共有する場合）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            init_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 登録済み患者数
    pub fn count_patients(&self) -> RepositoryResult<usize> {
        self.count_rows("patient")
    }

    /// 登録済み手術数
    pub fn count_surgeries(&self) -> RepositoryResult<usize> {
        self.count_rows("surgery")
    }

    pub fn count_lab_data(&self) -> RepositoryResult<usize> {
        self.count_rows("lab_data")
    }

    pub fn count_follow_ups(&self) -> RepositoryResult<usize> {
        self.count_rows("follow_up")
    }

    /// 患者の全血液検査（作成順）
    pub fn list_lab_data_by_patient(&self, patient_id: &str) -> RepositoryResult<Vec<LabData>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT record_json FROM lab_data WHERE patient_id = ?1 ORDER BY rowid")?;
        let payloads = stmt
            .query_map(params![patient_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        payloads
            .iter()
            .map(|json| serde_json::from_str(json).map_err(RepositoryError::from))
            .collect()
    }

    /// 手術に紐づく全経過（作成順）
    pub fn list_follow_ups_by_surgery(&self, surgery_id: Uuid) -> RepositoryResult<Vec<FollowUp>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM follow_up WHERE surgery_id = ?1 ORDER BY rowid",
            FOLLOW_UP_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![surgery_id.to_string()], FollowUpRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(FollowUpRow::into_domain).collect()
    }

    fn count_rows(&self, table: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

// ==========================================
// 行 ⇔ ドメイン変換
// ==========================================

const PATIENT_COLUMNS: &str = "patient_id, name, age, gender, contact_info, notes, \
     registered_date, created_at, updated_at";

const FOLLOW_UP_COLUMNS: &str = "id, surgery_id, follow_up_date, measurement_date, timing, \
     vectra_volume_right, vectra_volume_left, body_weight, notes, created_at";

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

fn parse_date(field: &str, raw: Option<String>) -> RepositoryResult<Option<NaiveDate>> {
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| RepositoryError::FieldValueError {
            field: field.to_string(),
            message: format!("{} ({})", e, s),
        })
    })
    .transpose()
}

fn parse_timestamp(field: &str, raw: &str) -> RepositoryResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::FieldValueError {
            field: field.to_string(),
            message: format!("{} ({})", e, raw),
        })
}

fn parse_uuid(field: &str, raw: &str) -> RepositoryResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| RepositoryError::FieldValueError {
        field: field.to_string(),
        message: format!("{} ({})", e, raw),
    })
}

struct PatientRow {
    patient_id: String,
    name: Option<String>,
    age: Option<u8>,
    gender: Option<String>,
    contact_info: Option<String>,
    notes: Option<String>,
    registered_date: Option<String>,
    created_at: String,
    updated_at: String,
}

impl PatientRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            patient_id: row.get(0)?,
            name: row.get(1)?,
            age: row.get(2)?,
            gender: row.get(3)?,
            contact_info: row.get(4)?,
            notes: row.get(5)?,
            registered_date: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_domain(self) -> RepositoryResult<Patient> {
        Ok(Patient {
            patient_id: self.patient_id,
            name: self.name,
            age: self.age,
            gender: self.gender,
            contact_info: self.contact_info,
            notes: self.notes,
            registered_date: parse_date("registered_date", self.registered_date)?,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
        })
    }
}

struct FollowUpRow {
    id: String,
    surgery_id: String,
    follow_up_date: Option<String>,
    measurement_date: Option<String>,
    timing: Option<String>,
    vectra_volume_right: Option<f64>,
    vectra_volume_left: Option<f64>,
    body_weight: Option<f64>,
    notes: Option<String>,
    created_at: String,
}

impl FollowUpRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            surgery_id: row.get(1)?,
            follow_up_date: row.get(2)?,
            measurement_date: row.get(3)?,
            timing: row.get(4)?,
            vectra_volume_right: row.get(5)?,
            vectra_volume_left: row.get(6)?,
            body_weight: row.get(7)?,
            notes: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    fn into_domain(self) -> RepositoryResult<FollowUp> {
        Ok(FollowUp {
            id: parse_uuid("id", &self.id)?,
            surgery_id: parse_uuid("surgery_id", &self.surgery_id)?,
            follow_up_date: parse_date("follow_up_date", self.follow_up_date)?,
            measurement_date: parse_date("measurement_date", self.measurement_date)?,
            timing: self.timing,
            vectra_volume_right: self.vectra_volume_right,
            vectra_volume_left: self.vectra_volume_left,
            body_weight: self.body_weight,
            notes: self.notes,
            created_at: parse_timestamp("created_at", &self.created_at)?,
        })
    }
}

fn map_transaction_error(err: rusqlite::Error) -> RepositoryError {
    RepositoryError::DatabaseTransactionError(err.to_string())
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    // ===== トランザクション =====

    async fn begin(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(map_transaction_error)?;
        debug!("SQLite トランザクション開始");
        Ok(())
    }

    async fn commit(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch("COMMIT").map_err(map_transaction_error)?;
        debug!("SQLite トランザクション確定");
        Ok(())
    }

    async fn rollback(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        if conn.is_autocommit() {
            return Ok(());
        }
        conn.execute_batch("ROLLBACK").map_err(map_transaction_error)?;
        debug!("SQLite トランザクション破棄");
        Ok(())
    }

    // ===== 参照 =====

    async fn find_patient_by_key(&self, patient_id: &str) -> RepositoryResult<Option<Patient>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM patient WHERE patient_id = ?1", PATIENT_COLUMNS),
                params![patient_id],
                PatientRow::from_row,
            )
            .optional()?;

        row.map(PatientRow::into_domain).transpose()
    }

    async fn find_surgeries_by_patient_and_date(
        &self,
        patient_id: &str,
        surgery_date: NaiveDate,
    ) -> RepositoryResult<Vec<Surgery>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT record_json FROM surgery
            WHERE patient_id = ?1 AND surgery_date = ?2
            ORDER BY rowid
            "#,
        )?;
        let payloads = stmt
            .query_map(
                params![patient_id, surgery_date.format(DATE_FORMAT).to_string()],
                |row| row.get::<_, String>(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        payloads
            .iter()
            .map(|json| serde_json::from_str(json).map_err(RepositoryError::from))
            .collect()
    }

    async fn get_surgery(&self, id: Uuid) -> RepositoryResult<Option<Surgery>> {
        let conn = self.get_conn()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT record_json FROM surgery WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        payload
            .map(|json| serde_json::from_str(&json).map_err(RepositoryError::from))
            .transpose()
    }

    async fn get_follow_up(&self, id: Uuid) -> RepositoryResult<Option<FollowUp>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM follow_up WHERE id = ?1", FOLLOW_UP_COLUMNS),
                params![id.to_string()],
                FollowUpRow::from_row,
            )
            .optional()?;

        row.map(FollowUpRow::into_domain).transpose()
    }

    // ===== 書き込み =====

    async fn upsert_patient(&self, patient: &Patient) -> RepositoryResult<UpsertOutcome> {
        let conn = self.get_conn()?;
        let exists: bool = conn
            .query_row(
                "SELECT 1 FROM patient WHERE patient_id = ?1",
                params![patient.patient_id],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);

        conn.execute(
            r#"
            INSERT INTO patient (
                patient_id, name, age, gender, contact_info, notes,
                registered_date, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(patient_id) DO UPDATE SET
                name = excluded.name,
                age = excluded.age,
                gender = excluded.gender,
                contact_info = excluded.contact_info,
                notes = excluded.notes,
                registered_date = excluded.registered_date,
                updated_at = excluded.updated_at
            "#,
            params![
                patient.patient_id,
                patient.name,
                patient.age,
                patient.gender,
                patient.contact_info,
                patient.notes,
                format_date(patient.registered_date),
                patient.created_at.to_rfc3339(),
                patient.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(if exists {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        })
    }

    async fn create_surgery(&self, surgery: &Surgery) -> RepositoryResult<()> {
        let record_json = serde_json::to_string(surgery)?;
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO surgery (id, patient_id, surgery_date, category, record_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                surgery.id.to_string(),
                surgery.patient_id,
                surgery.surgery_date.format(DATE_FORMAT).to_string(),
                surgery.category.as_ref().map(|c| c.label().to_string()),
                record_json,
                surgery.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn create_lab_data(&self, lab_data: &LabData) -> RepositoryResult<()> {
        let record_json = serde_json::to_string(lab_data)?;
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO lab_data (id, patient_id, surgery_id, test_date, record_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                lab_data.id.to_string(),
                lab_data.patient_id,
                lab_data.surgery_id.map(|id| id.to_string()),
                format_date(lab_data.test_date),
                record_json,
                lab_data.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn create_follow_up(&self, follow_up: &FollowUp) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            &format!(
                "INSERT INTO follow_up ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                FOLLOW_UP_COLUMNS
            ),
            params![
                follow_up.id.to_string(),
                follow_up.surgery_id.to_string(),
                format_date(follow_up.follow_up_date),
                format_date(follow_up.measurement_date),
                follow_up.timing,
                follow_up.vectra_volume_right,
                follow_up.vectra_volume_left,
                follow_up.body_weight,
                follow_up.notes,
                follow_up.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn store() -> (NamedTempFile, SqliteRecordStore) {
        let file = NamedTempFile::new().unwrap();
        let store = SqliteRecordStore::new(file.path().to_str().unwrap()).unwrap();
        (file, store)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_patient_reports_created_then_updated() {
        let (_file, store) = store();
        let mut patient = Patient::new("P001");
        patient.age = Some(30);

        assert_eq!(store.upsert_patient(&patient).await.unwrap(), UpsertOutcome::Created);

        patient.age = Some(31);
        assert_eq!(store.upsert_patient(&patient).await.unwrap(), UpsertOutcome::Updated);

        let loaded = store.find_patient_by_key("P001").await.unwrap().unwrap();
        assert_eq!(loaded.age, Some(31));
        assert_eq!(store.count_patients().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_surgery_round_trips_through_record_json() {
        let (_file, store) = store();
        store.upsert_patient(&Patient::new("P001")).await.unwrap();

        let mut surgery = Surgery::new("P001", date(2024, 3, 15));
        surgery.measurements.injection_volume_right = Some(250.0);
        store.create_surgery(&surgery).await.unwrap();

        let found = store
            .find_surgery_by_patient_and_date("P001", date(2024, 3, 15))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, surgery);
        assert_eq!(store.get_surgery(surgery.id).await.unwrap(), Some(surgery));
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let (_file, store) = store();
        store.begin().await.unwrap();
        store.upsert_patient(&Patient::new("P001")).await.unwrap();
        store.rollback().await.unwrap();

        assert!(store.find_patient_by_key("P001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_without_begin_fails() {
        let (_file, store) = store();
        let err = store.commit().await.unwrap_err();
        assert!(matches!(err, RepositoryError::DatabaseTransactionError(_)));
    }

    #[tokio::test]
    async fn test_follow_up_requires_existing_surgery() {
        let (_file, store) = store();
        let follow_up = FollowUp::new(Uuid::new_v4());
        let err = store.create_follow_up(&follow_up).await.unwrap_err();
        assert!(matches!(err, RepositoryError::ForeignKeyViolation(_)));
    }
}
