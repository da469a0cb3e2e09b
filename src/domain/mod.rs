// ==========================================
// 症例記録インポート - ドメインモデル層
// ==========================================
// 職責: エンティティ・型・取込結果の定義
// 制約: データアクセスと算出ロジックは含まない
// ==========================================

pub mod follow_up;
pub mod import;
pub mod lab_data;
pub mod patient;
pub mod surgery;
pub mod types;

// 主要型の再エクスポート
pub use follow_up::FollowUp;
pub use import::{Diagnostic, DiagnosticKind, ImportReport, ImportSummary, SheetOutcome};
pub use lab_data::{LabData, LabField};
pub use patient::{Patient, MAX_PATIENT_AGE};
pub use surgery::{Surgery, SurgeryField, SurgeryMeasurements};
pub use types::{FieldValue, RecordKind, RetentionGrade, SurgeryCategory, ValueKind};
