// ==========================================
// 症例記録インポート - 取込結果モデル
// ==========================================
// 用途: 1 回の取込の件数・シート別結果・診断一覧
// 診断は致命的ではない。実行を中断するのは ImportError のみ
// ==========================================

use crate::domain::types::RecordKind;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// DiagnosticKind - 診断種別
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticKind {
    RowSkipped,        // 行スキップ（キー欠落・親未解決・手術日欠落）
    FieldUnmapped,     // 列見出し / 検査項目名が未対応
    ValueUnparsable,   // 値の変換失敗（フィールドは未設定）
    AmbiguousSurgery,  // 同日手術が複数（最初の 1 件を採用）
    SheetUnrecognized, // 種別を判定できないシート
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiagnosticKind::RowSkipped => "行スキップ",
            DiagnosticKind::FieldUnmapped => "未対応項目",
            DiagnosticKind::ValueUnparsable => "値変換失敗",
            DiagnosticKind::AmbiguousSurgery => "手術特定不能",
            DiagnosticKind::SheetUnrecognized => "未判定シート",
        };
        write!(f, "{}", label)
    }
}

// ==========================================
// Diagnostic - 診断 1 件
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub sheet: String,          // シート名（貼り付け取込は "検査結果貼り付け"）
    pub row: Option<usize>,     // データ行番号（1 始まり、見出し行を除く）
    pub key: Option<String>,    // 原文の自然キー（患者ID）
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, sheet: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            sheet: sheet.into(),
            row: None,
            key: None,
            message: message.into(),
        }
    }

    pub fn at_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.sheet)?;
        if let Some(row) = self.row {
            write!(f, " {}行目", row)?;
        }
        if let Some(key) = &self.key {
            write!(f, " (患者ID: {})", key)?;
        }
        write!(f, ": {}", self.message)
    }
}

// ==========================================
// SheetOutcome - シート別結果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetOutcome {
    pub name: String,
    pub kind: RecordKind,
    pub imported: usize, // 作成 / 更新したレコード数
}

// ==========================================
// ImportSummary - 種別ごとの件数
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub patients_created: usize,
    pub patients_updated: usize,
    pub surgeries: usize,
    pub lab_data: usize,
    pub follow_ups: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.patients_created + self.patients_updated + self.surgeries + self.lab_data + self.follow_ups
    }
}

// ==========================================
// ImportReport - 取込結果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub batch_id: String,              // 取込バッチ ID（UUID）
    pub file_name: Option<String>,     // 取込元ファイル名
    pub summary: ImportSummary,
    pub sheets: Vec<SheetOutcome>,     // 処理順
    pub diagnostics: Vec<Diagnostic>,
    pub elapsed_ms: u64,
    pub committed: bool,               // false = 検証のみ（dry-run）
}

impl ImportReport {
    pub fn new(batch_id: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            ..Default::default()
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    /// 種別ごとの作成・更新件数
    pub fn count(&self, kind: RecordKind) -> usize {
        match kind {
            RecordKind::Patient => self.summary.patients_created + self.summary.patients_updated,
            RecordKind::Surgery => self.summary.surgeries,
            RecordKind::LabData => self.summary.lab_data,
            RecordKind::FollowUp => self.summary.follow_ups,
        }
    }

    /// 利用者向けメッセージ（件数行 + 診断行）
    pub fn messages(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.sheets.len() + self.diagnostics.len() + 1);
        lines.push(format!(
            "患者 {} 件（新規 {} / 更新 {}）、手術 {} 件、血液検査 {} 件、経過 {} 件",
            self.summary.patients_created + self.summary.patients_updated,
            self.summary.patients_created,
            self.summary.patients_updated,
            self.summary.surgeries,
            self.summary.lab_data,
            self.summary.follow_ups,
        ));
        for sheet in &self.sheets {
            lines.push(format!("{}（{}）: {} 件", sheet.name, sheet.kind.label(), sheet.imported));
        }
        lines.extend(self.diagnostics.iter().map(|d| d.to_string()));
        lines
    }
}
