// ==========================================
// 症例記録インポート - API 層
// ==========================================
// 職責: CLI などの呼び出し元に向けた業務 API
// ==========================================

pub mod config_api;
pub mod error;
pub mod import_api;

pub use config_api::{ConfigApi, ConfigItem};
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, ImportApiResponse, RetentionEvaluation};
