// ==========================================
// 症例記録インポート - コアライブラリ
// ==========================================
// 技術スタック: Rust + SQLite（rusqlite）+ calamine / csv
// 位置付け: 表計算・CSV・検査結果貼り付けを症例記録へ取り込む
// ==========================================

// ==========================================
// モジュール宣言
// ==========================================

// ドメイン層 - エンティティと型
pub mod domain;

// 記録ストア層 - 永続化
pub mod repository;

// 算出エンジン層 - BMI・定着率・時期
pub mod engine;

// 取込層 - 外部文書
pub mod importer;

// 設定層
pub mod config;

// DB 基盤（接続初期化 / PRAGMA / スキーマ）
pub mod db;

// ログ
pub mod logging;

// API 層
pub mod api;

// アプリケーション層 - 共有状態
pub mod app;

// ==========================================
// 主要な型の再エクスポート
// ==========================================

pub use domain::{
    Diagnostic, DiagnosticKind, FollowUp, ImportReport, LabData, Patient, RecordKind, Surgery,
    SurgeryCategory,
};
pub use importer::{CaseImporter, CaseImporterImpl, ImportError, LabPasteRequest};
pub use repository::{MemoryRecordStore, RecordStore, SqliteRecordStore};

// ==========================================
// 定数
// ==========================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const APP_NAME: &str = "症例記録インポート";
