// ==========================================
// 症例記録インポート - 行マッパー
// ==========================================
// 職責: シート 1 行 → ドメインレコード（純粋関数、ストア非依存）
// 規則:
//   - 自然キー（A 列: 患者ID）が空の行はスキップ
//   - 変換できない値はフィールド未設定のまま ValueUnparsable を記録
//   - 親レコードの解決は case_importer 側で行う
// ==========================================

use crate::domain::{
    DiagnosticKind, FieldValue, FollowUp, LabData, Patient, Surgery, SurgeryField, ValueKind,
};
use crate::engine::metrics::{days_after_surgery, estimate_timing};
use crate::importer::field_mapper::{FieldMapper, FieldMapping, LabelSource};
use crate::importer::value_normalizer::{
    clean_text, parse_date_cell, parse_decimal_cell, parse_integer,
};
use crate::importer::workbook::{column, CellValue, SheetRow};
use chrono::{NaiveDate, Utc};
use std::fmt;
use uuid::Uuid;

/// 自然キー列（全シート共通）
pub const KEY_COLUMN: usize = column("A");

// ==========================================
// 行単位の結果
// ==========================================

/// 値単位の問題（行は取り込む）
#[derive(Debug, Clone, PartialEq)]
pub struct FieldIssue {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl FieldIssue {
    fn unparsable(label: &str, raw: &CellValue) -> Self {
        Self {
            kind: DiagnosticKind::ValueUnparsable,
            message: format!(
                "{}: 値を変換できません ({})",
                label,
                raw.as_text().unwrap_or_default()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappedRow<T> {
    pub record: T,
    pub issues: Vec<FieldIssue>,
}

/// 行スキップの理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingKey,
    MissingSurgeryDate,
    PatientNotFound,
    SurgeryNotFound(NaiveDate),
    SurgeryIdNotFound(Uuid),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingKey => write!(f, "患者IDが空です"),
            SkipReason::MissingSurgeryDate => write!(f, "手術日がないか、日付として解釈できません"),
            SkipReason::PatientNotFound => write!(f, "患者が見つかりません"),
            SkipReason::SurgeryNotFound(date) => {
                write!(f, "手術日 {} の手術が見つかりません", date.format("%Y-%m-%d"))
            }
            SkipReason::SurgeryIdNotFound(id) => write!(f, "手術ID {} が見つかりません", id),
        }
    }
}

/// A 列の患者ID
pub fn row_key(row: &SheetRow<'_>) -> Result<String, SkipReason> {
    row.text(KEY_COLUMN)
        .and_then(|raw| clean_text(&raw))
        .ok_or(SkipReason::MissingKey)
}

// ===== セル読み取り =====

fn text_at(row: &SheetRow<'_>, col: usize) -> Option<String> {
    row.text(col).and_then(|raw| clean_text(&raw))
}

fn number_at(row: &SheetRow<'_>, col: usize, label: &str, issues: &mut Vec<FieldIssue>) -> Option<f64> {
    let cell = row.cell(col);
    if cell.is_blank() {
        return None;
    }
    let value = parse_decimal_cell(cell);
    if value.is_none() {
        issues.push(FieldIssue::unparsable(label, cell));
    }
    value
}

/// 空欄は Some(None)、変換失敗は None（既存値を維持）
fn date_at(
    row: &SheetRow<'_>,
    col: usize,
    label: &str,
    issues: &mut Vec<FieldIssue>,
) -> Option<Option<NaiveDate>> {
    let cell = row.cell(col);
    if cell.is_blank() {
        return Some(None);
    }
    match parse_date_cell(cell) {
        Some(date) => Some(Some(date)),
        None => {
            issues.push(FieldIssue::unparsable(label, cell));
            None
        }
    }
}

// ==========================================
// 患者シート
// ==========================================
// A 患者ID / B 年齢 / C 性別 / D 連絡先 / E 登録日 / F 備考
pub mod patient_columns {
    use super::column;
    pub const AGE: usize = column("B");
    pub const GENDER: usize = column("C");
    pub const CONTACT: usize = column("D");
    pub const REGISTERED_DATE: usize = column("E");
    pub const NOTES: usize = column("F");
}

/// 患者行の値。None のフィールドは既存値を維持する
#[derive(Debug, Clone, PartialEq)]
pub struct PatientFields {
    pub patient_id: String,
    pub age: Option<Option<u8>>,
    pub gender: Option<String>,
    pub contact_info: Option<String>,
    pub registered_date: Option<Option<NaiveDate>>,
    pub notes: Option<String>,
}

impl PatientFields {
    /// 新規作成時の患者
    pub fn to_new_patient(&self) -> Patient {
        let mut patient = Patient::new(self.patient_id.clone());
        self.apply_to(&mut patient);
        patient.ensure_name();
        patient
    }

    /// 既存患者へ上書き（後勝ち）
    pub fn apply_to(&self, patient: &mut Patient) {
        if let Some(age) = self.age {
            patient.age = age;
        }
        patient.gender = self.gender.clone();
        patient.contact_info = self.contact_info.clone();
        if let Some(date) = self.registered_date {
            patient.registered_date = date;
        }
        patient.notes = self.notes.clone();
        patient.updated_at = Utc::now();
    }
}

pub fn map_patient_row(row: &SheetRow<'_>, max_age: u8) -> Result<MappedRow<PatientFields>, SkipReason> {
    use patient_columns::*;

    let patient_id = row_key(row)?;
    let mut issues = Vec::new();

    // 空欄の年齢は 0
    let age_cell = row.cell(AGE);
    let age = if age_cell.is_blank() {
        Some(Some(0))
    } else {
        let parsed = age_cell
            .as_text()
            .and_then(|raw| parse_integer(&raw))
            .filter(|age| (0..=max_age as i64).contains(age))
            .map(|age| age as u8);
        if parsed.is_none() {
            issues.push(FieldIssue::unparsable("年齢", age_cell));
        }
        parsed.map(Some)
    };

    let fields = PatientFields {
        patient_id,
        age,
        gender: text_at(row, GENDER),
        contact_info: text_at(row, CONTACT),
        registered_date: date_at(row, REGISTERED_DATE, "登録日", &mut issues),
        notes: text_at(row, NOTES),
    };
    Ok(MappedRow { record: fields, issues })
}

// ==========================================
// 手術シート
// ==========================================
pub mod surgery_columns {
    use super::{column, SurgeryField};

    pub const FAT_INJECTION_SUBTYPE: usize = column("D");
    pub const SURGERY_DATE: usize = column("J");

    /// 術式の既定値（脂肪注入種別のみ記入された行）
    pub const DEFAULT_PROCEDURE_TYPE: &str = "脂肪注入";

    /// 列 → フィールド（D・J は個別処理、K は未使用）
    pub const LAYOUT: &[(usize, SurgeryField)] = &[
        (column("B"), SurgeryField::Category),
        (column("C"), SurgeryField::SurgeryType),
        (column("E"), SurgeryField::ReportedBmi),
        (column("F"), SurgeryField::AnesthesiaMethod),
        (column("G"), SurgeryField::ImplantManufacturer),
        (column("H"), SurgeryField::PreOpVectraRight),
        (column("I"), SurgeryField::PreOpVectraLeft),
        (column("L"), SurgeryField::SmokingHistory),
        (column("M"), SurgeryField::BreastfeedingHistory),
        (column("N"), SurgeryField::NumberOfProcedures),
        (column("O"), SurgeryField::HeightCm),
        (column("P"), SurgeryField::BodyWeightKg),
        (column("Q"), SurgeryField::NacImfRight),
        (column("R"), SurgeryField::NacImfStretchRight),
        (column("S"), SurgeryField::NacImfLeft),
        (column("T"), SurgeryField::NacImfStretchLeft),
        (column("U"), SurgeryField::SkinThicknessRight),
        (column("V"), SurgeryField::SkinThicknessLeft),
        (column("W"), SurgeryField::DonorSite),
        (column("X"), SurgeryField::InjectionVolumeRight),
        (column("Y"), SurgeryField::InjectionVolumeLeft),
        (column("Z"), SurgeryField::SubcutaneousRight),
        (column("AA"), SurgeryField::SubglandularRight),
        (column("AB"), SurgeryField::SubmuscularRight),
        (column("AC"), SurgeryField::SubcutaneousLeft),
        (column("AD"), SurgeryField::SubglandularLeft),
        (column("AE"), SurgeryField::SubmuscularLeft),
        (column("AF"), SurgeryField::DecolleteRight),
        (column("AG"), SurgeryField::DecolleteLeft),
        (column("AH"), SurgeryField::Notes),
        (column("AI"), SurgeryField::ImplantSizeRight),
        (column("AJ"), SurgeryField::ImplantSizeLeft),
        (column("AK"), SurgeryField::ImplantShape),
        (column("AL"), SurgeryField::InsertionPlane),
        (column("AM"), SurgeryField::IncisionSite),
        (column("AN"), SurgeryField::LiposuctionVolume),
        (column("AO"), SurgeryField::LiposuctionDevice),
    ];
}

pub fn map_surgery_row(row: &SheetRow<'_>) -> Result<MappedRow<Surgery>, SkipReason> {
    use surgery_columns::*;

    let patient_id = row_key(row)?;
    let surgery_date =
        parse_date_cell(row.cell(SURGERY_DATE)).ok_or(SkipReason::MissingSurgeryDate)?;

    let mut surgery = Surgery::new(patient_id, surgery_date);
    let mut issues = Vec::new();

    for (col, field) in LAYOUT {
        let value = match field.kind() {
            ValueKind::Text => text_at(row, *col).map(FieldValue::Text),
            ValueKind::Numeric => {
                number_at(row, *col, field.label(), &mut issues).map(FieldValue::Number)
            }
        };
        if let Some(value) = value {
            if !field.apply(&mut surgery, value) {
                issues.push(FieldIssue::unparsable(field.label(), row.cell(*col)));
            }
        }
    }

    // D 列: "術式 (脂肪注入種別)"
    if let Some(subtype) = text_at(row, FAT_INJECTION_SUBTYPE) {
        let surgery_type = surgery
            .surgery_type
            .as_deref()
            .unwrap_or(DEFAULT_PROCEDURE_TYPE);
        surgery.procedure = Some(format!("{} ({})", surgery_type, subtype));
    }

    // 身長・体重が揃えば BMI は算出値を使う
    let m = &mut surgery.measurements;
    if m.height_cm.is_some() && m.body_weight_kg.is_some() {
        m.reported_bmi = None;
    }

    Ok(MappedRow { record: surgery, issues })
}

// ==========================================
// 血液検査シート
// ==========================================
// A 患者ID / B 検査日 / C 以降は見出しで項目を照合
// 見出しで照合できない列は C..AU の既定配置で読む
pub mod lab_columns {
    use super::column;
    use crate::domain::LabField::{self, *};

    pub const TEST_DATE: usize = column("B");
    pub const FIRST_RESULT: usize = column("C");

    pub const LAYOUT: &[(usize, LabField)] = &[
        // 血球系
        (column("C"), Wbc),
        (column("D"), Rbc),
        (column("E"), Hb),
        (column("F"), Hematocrit),
        (column("G"), Mcv),
        (column("H"), Mch),
        (column("I"), Mchc),
        (column("J"), Platelet),
        // 凝固系
        (column("K"), PtTime),
        (column("L"), PtControl),
        (column("M"), PtActivity),
        (column("N"), PtInr),
        (column("O"), Aptt),
        // 生化学
        (column("P"), TotalProtein),
        (column("Q"), UricAcid),
        (column("R"), Un),
        (column("S"), IndirectBilirubin),
        (column("T"), Creatinine),
        (column("U"), Sodium),
        (column("V"), Potassium),
        (column("W"), Chloride),
        (column("X"), Iron),
        (column("Y"), TotalCholesterol),
        (column("Z"), Triglyceride),
        (column("AA"), TotalBilirubin),
        (column("AB"), DirectBilirubin),
        (column("AC"), Ast),
        (column("AD"), Alt),
        (column("AE"), GammaGtp),
        (column("AF"), Glucose),
        // 感染症・血液型
        (column("AG"), HbsAntigenResult),
        (column("AH"), HbsAntigenValue),
        (column("AI"), HbsAntibodyResult),
        (column("AJ"), HbsAntibodyValue),
        (column("AK"), BloodTypeAbo),
        (column("AL"), BloodTypeRh),
        (column("AM"), RprResult),
        (column("AN"), SyphilisTpResult),
        (column("AO"), Hba1c),
        (column("AP"), HcvAntibodyResult),
        (column("AQ"), HcvAntibodyIndex),
        (column("AR"), HcvAntibodyUnit),
        (column("AS"), HivResult),
        (column("AT"), Alp),
        (column("AU"), Ldh),
    ];
}

/// 見出しから解決した列対応
#[derive(Debug, Clone, Default)]
pub struct LabColumns {
    pub mapped: Vec<(usize, FieldMapping)>,
    pub unmapped: Vec<String>,
}

/// 見出し照合を優先し、残りの列は既定配置で補う。
/// 見出しで照合済みの項目は既定配置から重ねて割り当てない
pub fn resolve_lab_columns(headers: &[String], mapper: &FieldMapper) -> LabColumns {
    let mut columns = LabColumns::default();
    let mut pending = Vec::new();
    for (col, header) in headers.iter().enumerate().skip(lab_columns::FIRST_RESULT) {
        if header.trim().is_empty() {
            continue;
        }
        match mapper.map_field(header, LabelSource::SheetHeader) {
            Some(mapping) => columns.mapped.push((col, mapping)),
            None => pending.push(col),
        }
    }

    for &(col, field) in lab_columns::LAYOUT.iter() {
        let taken = columns
            .mapped
            .iter()
            .any(|(mapped_col, mapping)| *mapped_col == col || mapping.field == field);
        if taken {
            continue;
        }
        let header = headers.get(col).map(|h| h.trim()).unwrap_or_default();
        let key = if header.is_empty() {
            format!("{:?}", field)
        } else {
            header.to_string()
        };
        columns.mapped.push((
            col,
            FieldMapping {
                field,
                kind: field.kind(),
                key,
            },
        ));
        pending.retain(|pending_col| *pending_col != col);
    }

    columns.mapped.sort_by_key(|(col, _)| *col);
    columns.unmapped = pending.into_iter().map(|col| headers[col].clone()).collect();
    columns
}

pub fn map_lab_row(row: &SheetRow<'_>, columns: &LabColumns) -> Result<MappedRow<LabData>, SkipReason> {
    let patient_id = row_key(row)?;
    let mut lab = LabData::new(patient_id);
    let mut issues = Vec::new();

    lab.test_date = date_at(row, lab_columns::TEST_DATE, "検査日", &mut issues).flatten();

    for (col, mapping) in &columns.mapped {
        let value = match mapping.kind {
            ValueKind::Text => text_at(row, *col).map(FieldValue::Text),
            ValueKind::Numeric => {
                number_at(row, *col, &mapping.key, &mut issues).map(FieldValue::Number)
            }
        };
        if let Some(value) = value {
            if !mapping.field.apply(&mut lab, value) {
                issues.push(FieldIssue::unparsable(&mapping.key, row.cell(*col)));
            }
        }
    }

    Ok(MappedRow { record: lab, issues })
}

// ==========================================
// 経過シート
// ==========================================
// A 患者ID / B 手術日 / C フォローアップ日 / D 計測日 / E 時期
// F・G VECTRA(R/L) / H・I 定着率（算出値のため読まない）
// J 体重 / K 備考 / L 手術ID（任意）
pub mod follow_up_columns {
    use super::column;
    pub const SURGERY_DATE: usize = column("B");
    pub const FOLLOW_UP_DATE: usize = column("C");
    pub const MEASUREMENT_DATE: usize = column("D");
    pub const TIMING: usize = column("E");
    pub const VECTRA_RIGHT: usize = column("F");
    pub const VECTRA_LEFT: usize = column("G");
    pub const BODY_WEIGHT: usize = column("J");
    pub const NOTES: usize = column("K");
    pub const SURGERY_ID: usize = column("L");
}

/// 親手術の特定方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurgeryLocator {
    ById(Uuid),
    ByDate(NaiveDate),
}

/// 手術未確定の経過行
#[derive(Debug, Clone, PartialEq)]
pub struct FollowUpDraft {
    pub patient_id: String,
    pub locator: SurgeryLocator,
    pub follow_up_date: Option<NaiveDate>,
    pub measurement_date: Option<NaiveDate>,
    pub timing: Option<String>,
    pub vectra_volume_right: Option<f64>,
    pub vectra_volume_left: Option<f64>,
    pub body_weight: Option<f64>,
    pub notes: Option<String>,
}

impl FollowUpDraft {
    /// 親手術を確定して FollowUp を作る。時期が空なら経過日数から推定
    pub fn into_follow_up(self, surgery: &Surgery) -> FollowUp {
        let mut follow_up = FollowUp::new(surgery.id);
        follow_up.follow_up_date = self.follow_up_date;
        follow_up.measurement_date = self.measurement_date;
        follow_up.vectra_volume_right = self.vectra_volume_right;
        follow_up.vectra_volume_left = self.vectra_volume_left;
        follow_up.body_weight = self.body_weight;
        follow_up.notes = self.notes;

        let reference_date = follow_up.reference_date();
        follow_up.timing = self.timing.or_else(|| {
            reference_date.map(|date| estimate_timing(days_after_surgery(surgery.surgery_date, date)))
        });
        follow_up
    }
}

pub fn map_follow_up_row(row: &SheetRow<'_>) -> Result<MappedRow<FollowUpDraft>, SkipReason> {
    use follow_up_columns::*;

    let patient_id = row_key(row)?;
    let mut issues = Vec::new();

    let explicit_id = text_at(row, SURGERY_ID).and_then(|raw| match Uuid::parse_str(&raw) {
        Ok(id) => Some(id),
        Err(_) => {
            issues.push(FieldIssue::unparsable("手術ID", row.cell(SURGERY_ID)));
            None
        }
    });
    let locator = match explicit_id {
        Some(id) => SurgeryLocator::ById(id),
        None => SurgeryLocator::ByDate(
            parse_date_cell(row.cell(SURGERY_DATE)).ok_or(SkipReason::MissingSurgeryDate)?,
        ),
    };

    let draft = FollowUpDraft {
        patient_id,
        locator,
        follow_up_date: date_at(row, FOLLOW_UP_DATE, "フォローアップ日", &mut issues).flatten(),
        measurement_date: date_at(row, MEASUREMENT_DATE, "計測日", &mut issues).flatten(),
        timing: text_at(row, TIMING),
        vectra_volume_right: number_at(row, VECTRA_RIGHT, "VECTRA体積(R)", &mut issues),
        vectra_volume_left: number_at(row, VECTRA_LEFT, "VECTRA体積(L)", &mut issues),
        body_weight: number_at(row, BODY_WEIGHT, "体重", &mut issues),
        notes: text_at(row, NOTES),
    };
    Ok(MappedRow { record: draft, issues })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LabField, SurgeryCategory};
    use crate::importer::workbook::Worksheet;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn sheet_with_row(cells: &[(&str, CellValue)]) -> Worksheet {
        let mut sheet = Worksheet::new("test");
        sheet.insert_reference("A1", text("患者ID"));
        for (reference, value) in cells {
            assert!(sheet.insert_reference(&format!("{}2", reference), value.clone()));
        }
        sheet
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_patient_row_blank_age_defaults_to_zero() {
        let sheet = sheet_with_row(&[("A", text("P001")), ("C", text("女性"))]);
        let row = sheet.data_rows().next().unwrap();
        let mapped = map_patient_row(&row, 150).unwrap();

        assert_eq!(mapped.record.age, Some(Some(0)));
        assert_eq!(mapped.record.gender.as_deref(), Some("女性"));
        assert!(mapped.issues.is_empty());
    }

    #[test]
    fn test_patient_row_age_out_of_range_is_reported() {
        let sheet = sheet_with_row(&[("A", text("P001")), ("B", CellValue::Number(151.0))]);
        let row = sheet.data_rows().next().unwrap();
        let mapped = map_patient_row(&row, 150).unwrap();

        assert_eq!(mapped.record.age, None);
        assert_eq!(mapped.issues.len(), 1);
        assert_eq!(mapped.issues[0].kind, DiagnosticKind::ValueUnparsable);
    }

    #[test]
    fn test_patient_fields_keep_existing_age_on_bad_value() {
        let sheet = sheet_with_row(&[("A", text("P001")), ("B", text("不明"))]);
        let row = sheet.data_rows().next().unwrap();
        let mapped = map_patient_row(&row, 150).unwrap();

        let mut existing = Patient::new("P001");
        existing.age = Some(42);
        mapped.record.apply_to(&mut existing);
        assert_eq!(existing.age, Some(42));
    }

    #[test]
    fn test_missing_key_skips_row() {
        let sheet = sheet_with_row(&[("A", text("  ")), ("B", CellValue::Number(30.0))]);
        let row = sheet.data_rows().next().unwrap();
        assert_eq!(map_patient_row(&row, 150).unwrap_err(), SkipReason::MissingKey);
    }

    #[test]
    fn test_surgery_row_layout() {
        let sheet = sheet_with_row(&[
            ("A", text("P001")),
            ("B", text("豊胸")),
            ("C", text("脂肪注入")),
            ("D", text("Condense")),
            ("E", CellValue::Number(25.0)),
            ("J", CellValue::Date(date(2024, 3, 15))),
            ("O", CellValue::Number(160.0)),
            ("P", CellValue::Number(50.0)),
            ("X", CellValue::Number(250.0)),
            ("AA", text("12.5")),
            ("AH", text("経過良好")),
            ("AO", text("VASER")),
        ]);
        let row = sheet.data_rows().next().unwrap();
        let mapped = map_surgery_row(&row).unwrap();
        let surgery = mapped.record;

        assert_eq!(surgery.surgery_date, date(2024, 3, 15));
        assert_eq!(surgery.category, Some(SurgeryCategory::BreastAugmentation));
        assert_eq!(surgery.procedure.as_deref(), Some("脂肪注入 (Condense)"));
        assert_eq!(surgery.measurements.injection_volume_right, Some(250.0));
        assert_eq!(surgery.measurements.subglandular_right, Some(12.5));
        assert_eq!(surgery.notes.as_deref(), Some("経過良好"));
        assert_eq!(surgery.liposuction_device.as_deref(), Some("VASER"));
        // 身長・体重が揃うので取込元 BMI は保持しない
        assert_eq!(surgery.measurements.reported_bmi, None);
        assert!(mapped.issues.is_empty());
    }

    #[test]
    fn test_surgery_row_subtype_without_type_uses_default() {
        let sheet = sheet_with_row(&[
            ("A", text("P001")),
            ("D", text("Puregraft")),
            ("E", text("21.5")),
            ("J", text("2024/03/15")),
        ]);
        let row = sheet.data_rows().next().unwrap();
        let surgery = map_surgery_row(&row).unwrap().record;

        assert_eq!(surgery.procedure.as_deref(), Some("脂肪注入 (Puregraft)"));
        assert_eq!(surgery.measurements.reported_bmi, Some(21.5));
    }

    #[test]
    fn test_surgery_row_requires_date() {
        let sheet = sheet_with_row(&[("A", text("P001")), ("J", text("未定"))]);
        let row = sheet.data_rows().next().unwrap();
        assert_eq!(map_surgery_row(&row).unwrap_err(), SkipReason::MissingSurgeryDate);
    }

    #[test]
    fn test_surgery_row_unparsable_number_left_unset() {
        let sheet = sheet_with_row(&[
            ("A", text("P001")),
            ("J", text("2024-03-15")),
            ("X", text("約250")),
            ("N", text("1.5")),
        ]);
        let row = sheet.data_rows().next().unwrap();
        let mapped = map_surgery_row(&row).unwrap();

        assert_eq!(mapped.record.measurements.injection_volume_right, None);
        assert_eq!(mapped.record.number_of_procedures, None);
        assert_eq!(mapped.issues.len(), 2);
    }

    #[test]
    fn test_lab_columns_and_row() {
        let mapper = FieldMapper::new();
        let headers: Vec<String> = ["患者ID", "検査日", "白血球数(WBC)", "HBs抗原", "謎の項目", ""]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let columns = resolve_lab_columns(&headers, &mapper);
        let field_at = |col: usize| {
            columns
                .mapped
                .iter()
                .find(|(mapped_col, _)| *mapped_col == col)
                .map(|(_, mapping)| mapping.field)
        };
        assert_eq!(field_at(column("C")), Some(LabField::Wbc));
        assert_eq!(field_at(column("D")), Some(LabField::HbsAntigenResult));
        // 見出し未照合・空見出しは既定配置
        assert_eq!(field_at(column("E")), Some(LabField::Hb));
        assert_eq!(field_at(column("F")), Some(LabField::Hematocrit));
        // 見出しで割り当て済みの項目は既定配置から外す
        assert_eq!(field_at(column("AG")), None);
        assert!(columns.unmapped.is_empty());

        let sheet = sheet_with_row(&[
            ("A", text("P001")),
            ("B", CellValue::Number(45000.0)),
            ("C", text("6.5")),
            ("D", text("陰性")),
        ]);
        let row = sheet.data_rows().next().unwrap();
        let lab = map_lab_row(&row, &columns).unwrap().record;

        assert_eq!(lab.test_date, Some(date(2023, 3, 15)));
        assert_eq!(lab.wbc, Some(6.5));
        assert_eq!(lab.hbs_antigen_result.as_deref(), Some("陰性"));
        assert_eq!(lab.filled_count(), 2);
        assert_eq!(lab.value(LabField::Wbc), Some(FieldValue::Number(6.5)));
    }

    #[test]
    fn test_lab_columns_fall_back_to_layout() {
        let mapper = FieldMapper::new();
        let mut headers: Vec<String> = vec!["患者ID".to_string(), "検査日".to_string()];
        headers.resize(column("AV"), String::new());
        headers[column("M")] = "PT活性".to_string();
        headers[column("AA")] = "T-Bil".to_string();
        headers[column("AB")] = "D-Bil".to_string();
        headers[column("AH")] = "HBs抗原定量値".to_string();
        headers[column("AM")] = "RPR".to_string();
        headers[column("AQ")] = "HCV抗体INDEX".to_string();
        headers.push("院内独自項目".to_string());

        let columns = resolve_lab_columns(&headers, &mapper);
        assert_eq!(columns.unmapped, vec!["院内独自項目".to_string()]);

        let sheet = sheet_with_row(&[
            ("A", text("P001")),
            ("M", CellValue::Number(95.0)),
            ("AA", text("0.8")),
            ("AB", CellValue::Number(0.2)),
            ("AH", CellValue::Number(0.01)),
            ("AM", text("陰性")),
            ("AQ", CellValue::Number(0.1)),
            ("AU", CellValue::Number(180.0)),
            ("AV", CellValue::Number(1.0)),
        ]);
        let row = sheet.data_rows().next().unwrap();
        let mapped = map_lab_row(&row, &columns).unwrap();
        let lab = mapped.record;

        assert!(mapped.issues.is_empty());
        assert_eq!(lab.pt_activity, Some(95.0));
        assert_eq!(lab.total_bilirubin, Some(0.8));
        assert_eq!(lab.direct_bilirubin, Some(0.2));
        assert_eq!(lab.hbs_antigen_value, Some(0.01));
        assert_eq!(lab.rpr_result.as_deref(), Some("陰性"));
        assert_eq!(lab.hcv_antibody_index, Some(0.1));
        assert_eq!(lab.ldh, Some(180.0));
        assert_eq!(lab.filled_count(), 7);
    }

    #[test]
    fn test_lab_value_rejected_by_field_is_reported() {
        let columns = LabColumns {
            mapped: vec![(
                column("C"),
                FieldMapping {
                    field: LabField::Wbc,
                    kind: ValueKind::Text,
                    key: "白血球数".to_string(),
                },
            )],
            unmapped: Vec::new(),
        };
        let sheet = sheet_with_row(&[("A", text("P001")), ("C", text("多数"))]);
        let row = sheet.data_rows().next().unwrap();
        let mapped = map_lab_row(&row, &columns).unwrap();

        assert_eq!(mapped.record.wbc, None);
        assert_eq!(mapped.issues.len(), 1);
        assert_eq!(mapped.issues[0].kind, DiagnosticKind::ValueUnparsable);
        assert!(mapped.issues[0].message.starts_with("白血球数"));
    }

    #[test]
    fn test_follow_up_timing_derived_when_blank() {
        let sheet = sheet_with_row(&[
            ("A", text("P001")),
            ("B", text("2024/03/15")),
            ("C", text("2024/06/15")),
            ("F", CellValue::Number(340.0)),
            ("H", CellValue::Number(99.0)),
        ]);
        let row = sheet.data_rows().next().unwrap();
        let draft = map_follow_up_row(&row).unwrap().record;
        assert_eq!(draft.locator, SurgeryLocator::ByDate(date(2024, 3, 15)));

        let surgery = Surgery::new("P001", date(2024, 3, 15));
        let follow_up = draft.into_follow_up(&surgery);
        assert_eq!(follow_up.surgery_id, surgery.id);
        assert_eq!(follow_up.timing.as_deref(), Some("3M"));
        assert_eq!(follow_up.vectra_volume_right, Some(340.0));
    }

    #[test]
    fn test_follow_up_explicit_surgery_id() {
        let id = Uuid::new_v4();
        let sheet = sheet_with_row(&[
            ("A", text("P001")),
            ("E", text("1M")),
            ("L", text(&id.to_string())),
        ]);
        let row = sheet.data_rows().next().unwrap();
        let draft = map_follow_up_row(&row).unwrap().record;
        assert_eq!(draft.locator, SurgeryLocator::ById(id));
        assert_eq!(draft.timing.as_deref(), Some("1M"));
    }
}
