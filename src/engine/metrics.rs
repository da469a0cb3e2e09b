// ==========================================
// 症例記録インポート - 派生指標エンジン
// ==========================================
// 職責: BMI / 脂肪定着率 / 定着率評価 / 経過時期ラベル
// 規則: 派生値は保存せず、都度算出する
//       左右は常に別々に評価し、合算しない
// ==========================================

use crate::domain::{FollowUp, RetentionGrade, Surgery};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// BMI
// ==========================================

/// BMI = 体重(kg) / 身長(m)^2
///
/// 身長・体重のどちらかが欠けるか、身長が正でなければ None
pub fn compute_bmi(height_cm: Option<f64>, weight_kg: Option<f64>) -> Option<f64> {
    let height_m = height_cm.filter(|h| *h > 0.0)? / 100.0;
    let bmi = weight_kg? / (height_m * height_m);
    bmi.is_finite().then_some(bmi)
}

/// 手術記録の BMI。身長・体重から算出できなければ取込元の値
pub fn surgery_bmi(surgery: &Surgery) -> Option<f64> {
    let m = &surgery.measurements;
    compute_bmi(m.height_cm, m.body_weight_kg).or(m.reported_bmi)
}

// ==========================================
// 脂肪定着率
// ==========================================

/// 定着率(%) = (術後体積 - 術前体積) / 注入量 × 100
///
/// 注入量が正でない・いずれかが欠けていれば None
pub fn compute_retention_rate(
    post_op_volume: Option<f64>,
    pre_op_volume: Option<f64>,
    injected_volume: Option<f64>,
) -> Option<f64> {
    let injected = injected_volume.filter(|v| *v > 0.0)?;
    let rate = (post_op_volume? - pre_op_volume?) * 100.0 / injected;
    rate.is_finite().then_some(rate)
}

/// 定着率評価の閾値（下限を含む）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetentionThresholds {
    pub good: f64,     // 良好の下限（%）
    pub standard: f64, // 標準の下限（%）
}

impl Default for RetentionThresholds {
    fn default() -> Self {
        Self {
            good: 70.0,
            standard: 50.0,
        }
    }
}

impl RetentionThresholds {
    pub fn classify(&self, rate: f64) -> RetentionGrade {
        if rate >= self.good {
            RetentionGrade::Good
        } else if rate >= self.standard {
            RetentionGrade::Standard
        } else {
            RetentionGrade::NeedsObservation
        }
    }
}

impl RetentionGrade {
    pub fn classify(rate: f64, thresholds: &RetentionThresholds) -> Self {
        thresholds.classify(rate)
    }
}

/// 片側の評価結果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SideRetention {
    pub rate: f64,
    pub grade: RetentionGrade,
}

/// 経過 1 件の左右別評価
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FollowUpRetention {
    pub right: Option<SideRetention>,
    pub left: Option<SideRetention>,
}

/// 経過記録の左右別定着率
pub fn follow_up_retention(
    surgery: &Surgery,
    follow_up: &FollowUp,
    thresholds: &RetentionThresholds,
) -> FollowUpRetention {
    let m = &surgery.measurements;
    let side = |post, pre, injected| {
        compute_retention_rate(post, pre, injected).map(|rate| SideRetention {
            rate,
            grade: thresholds.classify(rate),
        })
    };

    FollowUpRetention {
        right: side(
            follow_up.vectra_volume_right,
            m.pre_op_vectra_right,
            m.injection_volume_right,
        ),
        left: side(
            follow_up.vectra_volume_left,
            m.pre_op_vectra_left,
            m.injection_volume_left,
        ),
    }
}

// ==========================================
// 経過時期
// ==========================================

/// 手術日からの経過日数（手術前は負）
pub fn days_after_surgery(surgery_date: NaiveDate, date: NaiveDate) -> i64 {
    (date - surgery_date).num_days()
}

/// 経過日数 → 時期ラベル
///
/// 術前 / 1W / 1M / 3M / 6M / 12M、いずれの帯にも入らなければ "Day N"
pub fn estimate_timing(days: i64) -> String {
    let label = match days {
        d if d < 0 => "術前",
        0..=10 => "1W",
        25..=35 => "1M",
        80..=100 => "3M",
        170..=190 => "6M",
        350..=380 => "12M",
        _ => return format!("Day {}", days),
    };
    label.to_string()
}
