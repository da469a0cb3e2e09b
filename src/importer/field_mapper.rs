// ==========================================
// 症例記録インポート - 検査項目マッパー
// ==========================================
// 職責: 検査項目名（貼り付けラベル / 列見出し）→ LabField
// 照合順:
//   1. 列見出し表（SheetHeader のみ、完全一致）
//   2. 文字列項目表（完全一致 → 部分一致）
//   3. 数値項目表（完全一致 → 部分一致）
// 部分一致は最長キー（文字数）を採用、同長なら表の先頭側
// ==========================================

use crate::domain::{LabField, ValueKind};

/// 照合元
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSource {
    LabPaste,    // 検査結果の貼り付けテキスト
    SheetHeader, // 血液検査シートの列見出し
}

/// 照合結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub field: LabField,
    pub kind: ValueKind,
    pub key: String, // 一致した表のキー
}

// ===== 数値項目表 =====
const NUMERIC_TABLE: &[(&str, LabField)] = &[
    // 血球系
    ("白血球数", LabField::Wbc),
    ("WBC", LabField::Wbc),
    ("赤血球数", LabField::Rbc),
    ("RBC", LabField::Rbc),
    ("血色素量", LabField::Hb),
    ("Hb", LabField::Hb),
    ("ヘマトクリット", LabField::Hematocrit),
    ("Ht", LabField::Hematocrit),
    ("MCV", LabField::Mcv),
    ("MCH", LabField::Mch),
    ("MCHC", LabField::Mchc),
    ("血小板数", LabField::Platelet),
    // 凝固系
    ("APTT", LabField::Aptt),
    ("プロトロンビン時間", LabField::ProthrombinTime),
    ("PT時間", LabField::PtTime),
    ("対照", LabField::PtControl),
    ("PT活性値", LabField::PtActivity),
    ("PT-INR", LabField::PtInr),
    // 生化学
    ("総蛋白", LabField::TotalProtein),
    ("TP", LabField::TotalProtein),
    ("AST", LabField::Ast),
    ("GOT", LabField::Ast),
    ("ALT", LabField::Alt),
    ("GPT", LabField::Alt),
    ("LD", LabField::Ldh),
    ("LD/IFCC", LabField::Ldh),
    ("LDH", LabField::Ldh),
    ("ALP", LabField::Alp),
    ("ALP/IFCC", LabField::Alp),
    ("γ-GT", LabField::GammaGtp),
    ("γ-GTP", LabField::GammaGtp),
    // ビリルビン
    ("総ビリルビン", LabField::TotalBilirubin),
    ("直接ビリルビン", LabField::DirectBilirubin),
    ("I-BIL", LabField::IndirectBilirubin),
    ("間接ビリルビン", LabField::IndirectBilirubin),
    // 腎機能
    ("クレアチニン", LabField::Creatinine),
    ("CREA", LabField::Creatinine),
    ("尿素窒素", LabField::Un),
    ("UN", LabField::Un),
    ("尿酸", LabField::UricAcid),
    ("UA", LabField::UricAcid),
    // 脂質
    ("総コレステロール", LabField::TotalCholesterol),
    ("総コレステロ-ル", LabField::TotalCholesterol),
    ("中性脂肪", LabField::Triglyceride),
    ("TG", LabField::Triglyceride),
    // 電解質
    ("ナトリウム", LabField::Sodium),
    ("Na", LabField::Sodium),
    ("カリウム", LabField::Potassium),
    ("K", LabField::Potassium),
    ("クロール", LabField::Chloride),
    ("Cl", LabField::Chloride),
    ("鉄", LabField::Iron),
    ("Fe", LabField::Iron),
    // 糖代謝
    ("血糖", LabField::Glucose),
    ("血糖(空腹時)", LabField::Glucose),
    ("空腹時血糖", LabField::FastingBloodSugar),
    ("HbA1c(NGSP)", LabField::Hba1c),
    ("HbA1c", LabField::Hba1c),
    // 感染症（定量値）
    ("HBs抗原/CLIA 定量値", LabField::HbsAntigenValue),
    ("HCV抗体 3rd インデックス", LabField::HcvAntibodyIndex),
];

// ===== 文字列項目表 =====
const TEXT_TABLE: &[(&str, LabField)] = &[
    ("RPR法 定性", LabField::RprResult),
    ("梅毒TP抗体定性", LabField::SyphilisTpResult),
    ("血液型 ABO式", LabField::BloodTypeAbo),
    ("血液型 Rh(D)式", LabField::BloodTypeRh),
    ("HBs抗原/CLIA 判定", LabField::HbsAntigenResult),
    ("HBs抗体/CLIA 判定", LabField::HbsAntibodyResult),
    ("HBs抗体/CLIA 定量値", LabField::HbsAntibodyValue),
    ("HCV抗体 3rd 判定", LabField::HcvAntibodyResult),
    ("HCV抗体 3rd ユニット", LabField::HcvAntibodyUnit),
    ("HIV抗原・抗体同時定性", LabField::HivResult),
];

// ===== 血液検査シートの列見出し =====
const HEADER_TABLE: &[(&str, LabField)] = &[
    ("白血球数(WBC)", LabField::Wbc),
    ("赤血球数(RBC)", LabField::Rbc),
    ("血色素量(Hb)", LabField::Hb),
    ("ヘマトクリット(Ht)", LabField::Hematocrit),
    ("血小板数", LabField::Platelet),
    ("総蛋白(TP)", LabField::TotalProtein),
    ("尿酸(UA)", LabField::UricAcid),
    ("尿素窒素(UN)", LabField::Un),
    ("クレアチニン(CREA)", LabField::Creatinine),
    ("総コレステロール", LabField::TotalCholesterol),
    ("中性脂肪(TG)", LabField::Triglyceride),
    ("総ビリルビン", LabField::TotalBilirubin),
    ("AST(GOT)", LabField::Ast),
    ("ALT(GPT)", LabField::Alt),
    ("ALP", LabField::Alp),
    ("γ-GTP", LabField::GammaGtp),
    ("空腹時血糖", LabField::FastingBloodSugar),
    ("HbA1c", LabField::Hba1c),
    ("血液型(ABO)", LabField::BloodTypeAbo),
    ("血液型(Rh)", LabField::BloodTypeRh),
    ("HBs抗原", LabField::HbsAntigenResult),
    ("HCV抗体", LabField::HcvAntibodyResult),
    ("梅毒TP抗体", LabField::SyphilisTpResult),
    ("HIV抗体", LabField::HivResult),
];

type Table = Vec<(String, LabField)>;

fn to_table(entries: &[(&str, LabField)]) -> Table {
    entries
        .iter()
        .map(|(key, field)| (key.to_string(), *field))
        .collect()
}

// ==========================================
// FieldMapper
// ==========================================
#[derive(Debug, Clone)]
pub struct FieldMapper {
    numeric: Table,
    text: Table,
    headers: Table,
}

impl Default for FieldMapper {
    fn default() -> Self {
        Self {
            numeric: to_table(NUMERIC_TABLE),
            text: to_table(TEXT_TABLE),
            headers: to_table(HEADER_TABLE),
        }
    }
}

impl FieldMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// 任意の照合表で作成（列見出し表は空）
    pub fn with_tables(numeric: &[(&str, LabField)], text: &[(&str, LabField)]) -> Self {
        Self {
            numeric: to_table(numeric),
            text: to_table(text),
            headers: Vec::new(),
        }
    }

    /// 項目名 → 正規フィールド。未対応なら None
    pub fn map_field(&self, raw_label: &str, source: LabelSource) -> Option<FieldMapping> {
        let label = raw_label.trim();
        if label.is_empty() {
            return None;
        }

        if source == LabelSource::SheetHeader {
            if let Some(hit) = exact(&self.headers, label) {
                return Some(hit);
            }
        }

        exact(&self.text, label)
            .or_else(|| longest_contained(&self.text, label))
            .or_else(|| exact(&self.numeric, label))
            .or_else(|| longest_contained(&self.numeric, label))
    }
}

fn mapping(key: &str, field: LabField) -> FieldMapping {
    FieldMapping {
        field,
        kind: field.kind(),
        key: key.to_string(),
    }
}

fn exact(table: &Table, label: &str) -> Option<FieldMapping> {
    table
        .iter()
        .find(|(key, _)| key == label)
        .map(|(key, field)| mapping(key, *field))
}

fn longest_contained(table: &Table, label: &str) -> Option<FieldMapping> {
    let mut best: Option<(&String, LabField, usize)> = None;
    for (key, field) in table {
        if !label.contains(key.as_str()) {
            continue;
        }
        let len = key.chars().count();
        // 同長は先に現れたキーを維持
        if best.map_or(true, |(_, _, best_len)| len > best_len) {
            best = Some((key, *field, len));
        }
    }
    best.map(|(key, field, _)| mapping(key, field))
}
