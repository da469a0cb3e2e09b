// ==========================================
// 症例記録インポート - SQLite 接続初期化
// ==========================================
// 目標:
// - すべての Connection::open に同じ PRAGMA を適用する
// - busy_timeout を統一し、同時書き込み時の busy エラーを減らす
// - 取込先テーブルを冪等に作成する
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 既定 busy_timeout（ミリ秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// init_schema が作成するスキーマのバージョン
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 接続単位の PRAGMA を適用
///
/// foreign_keys と busy_timeout は接続ごとに設定が必要
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// SQLite 接続を開き、統一設定を適用
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 取込先テーブルを作成（既存なら何もしない）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS patient (
            patient_id      TEXT PRIMARY KEY NOT NULL,
            name            TEXT,
            age             INTEGER,
            gender          TEXT,
            contact_info    TEXT,
            notes           TEXT,
            registered_date TEXT,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS surgery (
            id           TEXT PRIMARY KEY NOT NULL,
            patient_id   TEXT NOT NULL REFERENCES patient(patient_id),
            surgery_date TEXT NOT NULL,
            category     TEXT,
            record_json  TEXT NOT NULL,
            created_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_surgery_patient_date
            ON surgery(patient_id, surgery_date);

        CREATE TABLE IF NOT EXISTS lab_data (
            id          TEXT PRIMARY KEY NOT NULL,
            patient_id  TEXT NOT NULL REFERENCES patient(patient_id),
            surgery_id  TEXT REFERENCES surgery(id),
            test_date   TEXT,
            record_json TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_lab_data_patient ON lab_data(patient_id);

        CREATE TABLE IF NOT EXISTS follow_up (
            id                  TEXT PRIMARY KEY NOT NULL,
            surgery_id          TEXT NOT NULL REFERENCES surgery(id),
            follow_up_date      TEXT,
            measurement_date    TEXT,
            timing              TEXT,
            vectra_volume_right REAL,
            vectra_volume_left  REAL,
            body_weight         REAL,
            notes               TEXT,
            created_at          TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_follow_up_surgery ON follow_up(surgery_id);

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id   TEXT NOT NULL DEFAULT 'global',
            key        TEXT NOT NULL,
            value      TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// schema_version を読む（テーブルがなければ None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
