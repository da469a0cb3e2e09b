// ==========================================
// 症例記録インポート - シート種別判定
// ==========================================
// 職責: 見出し行から RecordKind を判定し、取込順の計画を立てる
// 取込順: 患者 → 手術 → 血液検査 → 経過（文書内の並びに依存しない）
// ==========================================

use crate::domain::RecordKind;
use crate::importer::workbook::{Workbook, Worksheet};

/// 判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    Recognized(RecordKind),
    Unrecognized,
}

/// 見出しの必須集合（すべて含めば該当）。上から順に判定
const RULES: [(RecordKind, &[&str]); 4] = [
    (RecordKind::Patient, &["患者ID", "年齢", "登録日"]),
    (RecordKind::Surgery, &["術式", "手術日", "手術カテゴリ"]),
    (RecordKind::LabData, &["検査日", "白血球数(WBC)"]),
    (RecordKind::FollowUp, &["フォローアップ日", "VECTRA体積(R)"]),
];

/// 見出し行から種別を判定
pub fn classify_headers(headers: &[String]) -> SheetKind {
    let has = |name: &str| headers.iter().any(|h| h.trim() == name);
    for (kind, required) in RULES.iter() {
        if required.iter().all(|name| has(name)) {
            return SheetKind::Recognized(*kind);
        }
    }
    SheetKind::Unrecognized
}

/// 取込計画
#[derive(Debug, Clone, Default)]
pub struct SheetPlan<'a> {
    /// 取込順に並んだシート（同種別内は文書順）
    pub ordered: Vec<(RecordKind, &'a Worksheet)>,
    /// 判定できなかったシート名
    pub unrecognized: Vec<String>,
}

pub fn plan_sheets(workbook: &Workbook) -> SheetPlan<'_> {
    let mut plan = SheetPlan::default();
    for sheet in &workbook.sheets {
        match classify_headers(&sheet.headers()) {
            SheetKind::Recognized(kind) => plan.ordered.push((kind, sheet)),
            SheetKind::Unrecognized => plan.unrecognized.push(sheet.name.clone()),
        }
    }
    // 安定ソートなので同種別内の文書順は保たれる
    plan.ordered.sort_by_key(|(kind, _)| *kind);
    plan
}
