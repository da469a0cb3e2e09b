// ==========================================
// 症例記録インポート - 設定マネージャ
// ==========================================
// 職責: 設定の読込・上書き
// 保存先: config_kv テーブル（key-value + scope）
// ==========================================

use crate::config::import_config_trait::{ConfigResult, ImportConfigReader};
use crate::db::{init_schema, open_sqlite_connection};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// 全体設定のスコープ ID
const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// DB パスから作成
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 既存接続から作成（記録ストアと接続を共有）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let guard = conn.lock().map_err(|e| format!("ロック取得失敗: {}", e))?;
            crate::db::configure_sqlite_connection(&guard)?;
            init_schema(&guard)?;
        }

        Ok(Self { conn })
    }

    /// config_kv から読む（scope_id='global'）
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("ロック取得失敗: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// config_kv へ書く（既存値は上書き）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("ロック取得失敗: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![GLOBAL_SCOPE, key, value],
        )?;
        Ok(())
    }

    /// 全体設定の一覧（キー順）
    pub fn get_config_snapshot(&self) -> ConfigResult<BTreeMap<String, String>> {
        let conn = self.conn.lock().map_err(|e| format!("ロック取得失敗: {}", e))?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut snapshot = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            snapshot.insert(key, value);
        }
        Ok(snapshot)
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 値を解釈。失敗時は警告して既定値
    fn parse_or_default<T: std::str::FromStr + Copy>(
        &self,
        key: &str,
        default: T,
        raw_default: &str,
    ) -> ConfigResult<T> {
        let value = self.get_config_or_default(key, raw_default)?;
        Ok(value.trim().parse::<T>().unwrap_or_else(|_| {
            warn!(config_key = key, raw_value = %value, "設定値の形式が不正なため既定値を使用");
            default
        }))
    }
}

#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_lab_zero_as_absent(&self) -> ConfigResult<bool> {
        let value = self.get_config_or_default(config_keys::LAB_ZERO_AS_ABSENT, "true")?;
        match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => {
                warn!(config_key = config_keys::LAB_ZERO_AS_ABSENT, raw_value = %value, "既定値 true を使用");
                Ok(true)
            }
        }
    }

    async fn get_patient_max_age(&self) -> ConfigResult<u8> {
        self.parse_or_default(config_keys::PATIENT_MAX_AGE, 150u8, "150")
    }

    async fn get_retention_good_threshold(&self) -> ConfigResult<f64> {
        self.parse_or_default(config_keys::RETENTION_GOOD_THRESHOLD, 70.0, "70")
    }

    async fn get_retention_standard_threshold(&self) -> ConfigResult<f64> {
        self.parse_or_default(config_keys::RETENTION_STANDARD_THRESHOLD, 50.0, "50")
    }
}

// ==========================================
// 設定キー
// ==========================================
pub mod config_keys {
    pub const LAB_ZERO_AS_ABSENT: &str = "lab_zero_as_absent";
    pub const PATIENT_MAX_AGE: &str = "patient_max_age";
    pub const RETENTION_GOOD_THRESHOLD: &str = "retention_good_threshold";
    pub const RETENTION_STANDARD_THRESHOLD: &str = "retention_standard_threshold";
}
