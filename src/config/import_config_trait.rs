// ==========================================
// 症例記録インポート - 取込設定読み取り Trait
// ==========================================
// 職責: 取込パイプラインが必要とする設定値の読み取り契約
// 制約: 書き込み・業務ロジックは含まない
// ==========================================

use crate::domain::MAX_PATIENT_AGE;
use crate::engine::RetentionThresholds;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;

/// 設定層の Result
pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// ImportSettings - 1 回の取込に適用する設定
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImportSettings {
    pub lab_zero_as_absent: bool, // 検査値 "0" を未報告とみなす
    pub patient_max_age: u8,      // 年齢の上限（含む）
    pub retention: RetentionThresholds,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            lab_zero_as_absent: true,
            patient_max_age: MAX_PATIENT_AGE,
            retention: RetentionThresholds::default(),
        }
    }
}

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 実装: ConfigManager（config_kv テーブル）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 検査値 "0" を未報告扱いにするか
    ///
    /// # 既定値
    /// - true
    async fn get_lab_zero_as_absent(&self) -> ConfigResult<bool>;

    /// 患者年齢の上限
    ///
    /// # 既定値
    /// - 150
    async fn get_patient_max_age(&self) -> ConfigResult<u8>;

    /// 定着率「良好」の下限（%）
    ///
    /// # 既定値
    /// - 70
    async fn get_retention_good_threshold(&self) -> ConfigResult<f64>;

    /// 定着率「標準」の下限（%）
    ///
    /// # 既定値
    /// - 50
    async fn get_retention_standard_threshold(&self) -> ConfigResult<f64>;

    /// 全設定をまとめて読む
    async fn load_settings(&self) -> ConfigResult<ImportSettings> {
        let good = self.get_retention_good_threshold().await?;
        let standard = self.get_retention_standard_threshold().await?;
        let retention = if standard <= good {
            RetentionThresholds { good, standard }
        } else {
            tracing::warn!(good, standard, "定着率閾値の大小が逆転しているため既定値を使用");
            RetentionThresholds::default()
        };

        Ok(ImportSettings {
            lab_zero_as_absent: self.get_lab_zero_as_absent().await?,
            patient_max_age: self.get_patient_max_age().await?,
            retention,
        })
    }
}
