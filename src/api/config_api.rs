// ==========================================
// 症例記録インポート - 設定 API
// ==========================================
// 職責: 取込設定の一覧・更新
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{config_keys, ConfigManager, ImportConfigReader, ImportSettings};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// 設定項目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigItem {
    pub key: String,
    pub value: String,
}

/// 更新を受け付けるキー
const KNOWN_KEYS: [&str; 4] = [
    config_keys::LAB_ZERO_AS_ABSENT,
    config_keys::PATIENT_MAX_AGE,
    config_keys::RETENTION_GOOD_THRESHOLD,
    config_keys::RETENTION_STANDARD_THRESHOLD,
];

pub struct ConfigApi {
    config_manager: Arc<ConfigManager>,
}

impl ConfigApi {
    pub fn new(config_manager: Arc<ConfigManager>) -> Self {
        Self { config_manager }
    }

    /// 保存済みの設定（キー順）
    pub fn list_configs(&self) -> ApiResult<Vec<ConfigItem>> {
        let snapshot = self
            .config_manager
            .get_config_snapshot()
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        Ok(snapshot
            .into_iter()
            .map(|(key, value)| ConfigItem { key, value })
            .collect())
    }

    /// 設定を更新。未知のキーと型の合わない値は拒否
    pub fn update_config(&self, key: &str, value: &str) -> ApiResult<()> {
        let key = key.trim();
        let value = value.trim();
        if !KNOWN_KEYS.contains(&key) {
            return Err(ApiError::InvalidInput(format!("未知の設定キー: {}", key)));
        }

        let valid = match key {
            config_keys::LAB_ZERO_AS_ABSENT => {
                matches!(value.to_lowercase().as_str(), "true" | "false" | "1" | "0" | "yes" | "no")
            }
            config_keys::PATIENT_MAX_AGE => value.parse::<u8>().is_ok(),
            _ => value.parse::<f64>().map(f64::is_finite).unwrap_or(false),
        };
        if !valid {
            return Err(ApiError::InvalidInput(format!("{} の値が不正です: {}", key, value)));
        }

        self.config_manager
            .set_global_config_value(key, value)
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        info!(config_key = key, value, "設定を更新");
        Ok(())
    }

    /// 取込に適用される設定
    pub async fn effective_settings(&self) -> ApiResult<ImportSettings> {
        self.config_manager
            .load_settings()
            .await
            .map_err(|e| ApiError::ConfigError(e.to_string()))
    }
}
