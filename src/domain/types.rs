// ==========================================
// 症例記録インポート - ドメイン型定義
// ==========================================
// 責務: 手術カテゴリ / レコード種別 / 値種別 / 定着率評価
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 手術カテゴリ (Surgery Category)
// ==========================================
// 上眼瞼・下眼瞼は Eyelid に集約。未知のラベルは原文のまま Other に保持する
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurgeryCategory {
    BreastAugmentation, // 豊胸
    Liposuction,        // 脂肪吸引
    Eyelid,             // 眼瞼
    Other(String),      // その他（原文ラベル）
}

impl SurgeryCategory {
    /// 表記ゆれを含むラベルからカテゴリを判定
    ///
    /// 空文字列は None（カテゴリ未設定）
    pub fn from_label(label: &str) -> Option<Self> {
        let trimmed = label.trim();
        if trimmed.is_empty() {
            return None;
        }

        let category = if trimmed.contains("豊胸") {
            SurgeryCategory::BreastAugmentation
        } else if trimmed.contains("脂肪吸引") {
            SurgeryCategory::Liposuction
        } else if trimmed.contains("眼瞼") {
            SurgeryCategory::Eyelid
        } else {
            match trimmed.to_ascii_lowercase().as_str() {
                "breast-augmentation" | "breast_augmentation" => {
                    SurgeryCategory::BreastAugmentation
                }
                "liposuction" => SurgeryCategory::Liposuction,
                "eyelid" => SurgeryCategory::Eyelid,
                _ => SurgeryCategory::Other(trimmed.to_string()),
            }
        };
        Some(category)
    }

    /// 表示・保存用ラベル
    pub fn label(&self) -> &str {
        match self {
            SurgeryCategory::BreastAugmentation => "豊胸",
            SurgeryCategory::Liposuction => "脂肪吸引",
            SurgeryCategory::Eyelid => "眼瞼",
            SurgeryCategory::Other(label) => label,
        }
    }
}

impl fmt::Display for SurgeryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ==========================================
// レコード種別 (Record Kind)
// ==========================================
// 並び順 = 取込順（所有関係の依存順）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordKind {
    Patient,  // 患者
    Surgery,  // 手術
    LabData,  // 血液検査
    FollowUp, // 経過
}

impl RecordKind {
    /// 依存順に並べた全種別
    pub const IMPORT_ORDER: [RecordKind; 4] = [
        RecordKind::Patient,
        RecordKind::Surgery,
        RecordKind::LabData,
        RecordKind::FollowUp,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::Patient => "患者基本情報",
            RecordKind::Surgery => "手術情報",
            RecordKind::LabData => "血液検査",
            RecordKind::FollowUp => "経過情報",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Patient => write!(f, "PATIENT"),
            RecordKind::Surgery => write!(f, "SURGERY"),
            RecordKind::LabData => write!(f, "LAB_DATA"),
            RecordKind::FollowUp => write!(f, "FOLLOW_UP"),
        }
    }
}

// ==========================================
// 値種別 (Value Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueKind {
    Numeric, // 数値
    Text,    // 文字列（判定結果など）
}

/// 正規化済みフィールド値
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            FieldValue::Number(_) => ValueKind::Numeric,
            FieldValue::Text(_) => ValueKind::Text,
        }
    }
}

// ==========================================
// 定着率評価 (Retention Grade)
// ==========================================
// 各帯の下限は含む: rate >= good → Good, rate >= standard → Standard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetentionGrade {
    Good,             // 良好
    Standard,         // 標準
    NeedsObservation, // 要観察
}

impl RetentionGrade {
    pub fn label(&self) -> &'static str {
        match self {
            RetentionGrade::Good => "良好",
            RetentionGrade::Standard => "標準",
            RetentionGrade::NeedsObservation => "要観察",
        }
    }
}

impl fmt::Display for RetentionGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surgery_category_from_label() {
        assert_eq!(
            SurgeryCategory::from_label("豊胸系"),
            Some(SurgeryCategory::BreastAugmentation)
        );
        assert_eq!(
            SurgeryCategory::from_label("脂肪吸引"),
            Some(SurgeryCategory::Liposuction)
        );
        assert_eq!(
            SurgeryCategory::from_label("上眼瞼"),
            Some(SurgeryCategory::Eyelid)
        );
        assert_eq!(
            SurgeryCategory::from_label("下眼瞼"),
            Some(SurgeryCategory::Eyelid)
        );
        assert_eq!(
            SurgeryCategory::from_label(" 鼻 "),
            Some(SurgeryCategory::Other("鼻".to_string()))
        );
        assert_eq!(SurgeryCategory::from_label("  "), None);
    }

    #[test]
    fn test_record_kind_order() {
        let mut kinds = vec![
            RecordKind::FollowUp,
            RecordKind::Patient,
            RecordKind::LabData,
            RecordKind::Surgery,
        ];
        kinds.sort();
        assert_eq!(kinds, RecordKind::IMPORT_ORDER.to_vec());
    }
}
