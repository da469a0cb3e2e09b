// ==========================================
// 症例記録インポート - 設定層
// ==========================================
// 職責: 取込設定の管理（既定値 + config_kv による上書き）
// 保存先: config_kv テーブル
// ==========================================

pub mod config_manager;
pub mod import_config_trait;

pub use config_manager::{config_keys, ConfigManager};
pub use import_config_trait::{ConfigResult, ImportConfigReader, ImportSettings};
