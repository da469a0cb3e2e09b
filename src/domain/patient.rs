// ==========================================
// 症例記録インポート - 患者ドメインモデル
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 年齢の上限（含む）
pub const MAX_PATIENT_AGE: u8 = 150;

// ==========================================
// Patient - 患者
// ==========================================
// 自然キー: patient_id（一意・必須）
// インポートでは upsert のみ。削除はしない
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    // ===== 主キー =====
    pub patient_id: String, // 患者ID

    // ===== 基本情報 =====
    pub name: Option<String>,           // 氏名
    pub age: Option<u8>,                // 年齢（0〜150、空欄は 0）
    pub gender: Option<String>,         // 性別
    pub contact_info: Option<String>,   // 連絡先
    pub notes: Option<String>,          // 備考
    pub registered_date: Option<NaiveDate>, // 登録日

    // ===== 監査 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn new(patient_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            patient_id: patient_id.into(),
            name: None,
            age: None,
            gender: None,
            contact_info: None,
            notes: None,
            registered_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 氏名列を持たない取込元向けの表示名
    pub fn placeholder_name(patient_id: &str) -> String {
        format!("患者{}", patient_id)
    }

    /// 氏名未設定なら仮名を付与
    pub fn ensure_name(&mut self) {
        let missing = self.name.as_deref().map_or(true, |n| n.trim().is_empty());
        if missing {
            self.name = Some(Self::placeholder_name(&self.patient_id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_name_keeps_existing() {
        let mut patient = Patient::new("P001");
        patient.name = Some("山田花子".to_string());
        patient.ensure_name();
        assert_eq!(patient.name.as_deref(), Some("山田花子"));
    }

    #[test]
    fn test_ensure_name_fills_placeholder() {
        let mut patient = Patient::new("P002");
        patient.name = Some("  ".to_string());
        patient.ensure_name();
        assert_eq!(patient.name.as_deref(), Some("患者P002"));
    }
}
