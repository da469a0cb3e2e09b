// ==========================================
// 症例記録インポート - 算出エンジン層
// ==========================================
// 職責: 保存しない派生値の算出（BMI・定着率・時期ラベル）
// 制約: 純粋関数のみ。ストア・文書 I/O を持たない
// ==========================================

pub mod metrics;

pub use metrics::{
    compute_bmi, compute_retention_rate, days_after_surgery, estimate_timing,
    follow_up_retention, surgery_bmi, FollowUpRetention, RetentionThresholds, SideRetention,
};
