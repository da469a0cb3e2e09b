// ==========================================
// 症例記録インポート - 経過観察ドメインモデル
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// FollowUp - 術後経過記録
// ==========================================
// 定着率は保存しない（engine::metrics で都度算出）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUp {
    pub id: Uuid,
    pub surgery_id: Uuid, // 所属手術

    // ===== 日付 =====
    pub follow_up_date: Option<NaiveDate>,  // フォローアップ日
    pub measurement_date: Option<NaiveDate>, // 計測日
    pub timing: Option<String>,             // 時期ラベル（1M, 3M, ...）

    // ===== 計測 =====
    pub vectra_volume_right: Option<f64>, // VECTRA 術後体積 (R)
    pub vectra_volume_left: Option<f64>,  // VECTRA 術後体積 (L)
    pub body_weight: Option<f64>,         // 体重（kg）

    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FollowUp {
    pub fn new(surgery_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            surgery_id,
            follow_up_date: None,
            measurement_date: None,
            timing: None,
            vectra_volume_right: None,
            vectra_volume_left: None,
            body_weight: None,
            notes: None,
            created_at: Utc::now(),
        }
    }

    /// 経過日数の基準日（計測日優先）
    pub fn reference_date(&self) -> Option<NaiveDate> {
        self.measurement_date.or(self.follow_up_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_date_prefers_measurement() {
        let mut follow_up = FollowUp::new(Uuid::new_v4());
        follow_up.follow_up_date = NaiveDate::from_ymd_opt(2024, 4, 15);
        assert_eq!(follow_up.reference_date(), NaiveDate::from_ymd_opt(2024, 4, 15));

        follow_up.measurement_date = NaiveDate::from_ymd_opt(2024, 4, 20);
        assert_eq!(follow_up.reference_date(), NaiveDate::from_ymd_opt(2024, 4, 20));
    }
}
