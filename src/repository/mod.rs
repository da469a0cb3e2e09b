// ==========================================
// 症例記録インポート - 記録ストア層
// ==========================================
// 職責: 永続化の契約と実装。DB の詳細を隠す
// 制約: クエリはすべてパラメータ化する
// ==========================================

pub mod error;
pub mod memory_store;
pub mod record_store;
pub mod sqlite_store;

pub use error::{RepositoryError, RepositoryResult};
pub use memory_store::MemoryRecordStore;
pub use record_store::{RecordStore, UpsertOutcome};
pub use sqlite_store::SqliteRecordStore;
