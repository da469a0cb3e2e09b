// ==========================================
// 症例記録インポート - 値の正規化
// ==========================================
// 職責: セル文字列 → 日付 / 数値 / テキスト
// 規則: すべて全域関数。失敗は None で返し、診断は呼び出し側が記録する
// ==========================================

use crate::importer::workbook::CellValue;
use chrono::{Days, NaiveDate};

/// 日付文字列の書式（優先順）
pub const DATE_FORMATS: [&str; 4] = ["%Y/%m/%d", "%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y"];

/// 検査値から取り除く注記（判定記号・上下限・矢印）
const LAB_ANNOTATIONS: [&str; 9] = ["(+)", "(-)", "<", ">", "LT", "H", "L", "↑", "↓"];

/// 取込元の真偽値列が文字列化された残骸
const BOOL_ARTIFACT: &str = ", true";

// ==========================================
// 日付
// ==========================================

/// 表計算シリアル値 → 日付（1899-12-31 起点、serial - 1 日）
///
/// 0 以下・非有限は None
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial <= 0.0 {
        return None;
    }
    let offset = serial.floor() as u64;
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 31)?;
    epoch.checked_add_days(Days::new(offset.checked_sub(1)?))
}

/// 日付文字列を解釈。書式が一致しなければシリアル値として最終判定
pub fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .or_else(|| trimmed.parse::<f64>().ok().and_then(serial_to_date))
}

pub fn parse_date_cell(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Date(date) => Some(*date),
        CellValue::Number(serial) => serial_to_date(*serial),
        CellValue::Text(text) => parse_date_text(text),
        CellValue::Empty | CellValue::Bool(_) => None,
    }
}

// ==========================================
// 数値
// ==========================================

/// 通常の小数（桁区切りカンマ可）
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parse_decimal_cell(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Number(number) if number.is_finite() => Some(*number),
        CellValue::Text(text) => parse_decimal(text),
        _ => None,
    }
}

/// 整数（"35" / "35.0" を許容、小数部ありは None）
pub fn parse_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }
    parse_decimal(trimmed)
        .filter(|v| v.fract() == 0.0 && v.abs() < i64::MAX as f64)
        .map(|v| v as i64)
}

// ==========================================
// 検査値
// ==========================================

/// 検査値の判定結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LabValue {
    Value(f64),
    /// 空欄、または "0"（未報告扱い）
    NotReported,
    Unparsable,
}

/// 注記を除いた検査値を判定
pub fn classify_lab_value(raw: &str, zero_as_absent: bool) -> LabValue {
    if raw.trim().is_empty() {
        return LabValue::NotReported;
    }
    let mut cleaned = raw.to_string();
    for annotation in LAB_ANNOTATIONS {
        cleaned = cleaned.replace(annotation, "");
    }
    let cleaned = cleaned.trim();

    if zero_as_absent && cleaned == "0" {
        return LabValue::NotReported;
    }
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => LabValue::Value(value),
        _ => LabValue::Unparsable,
    }
}

/// 検査値 → 数値。未報告・変換不能はどちらも None
pub fn parse_lab_value(raw: &str, zero_as_absent: bool) -> Option<f64> {
    match classify_lab_value(raw, zero_as_absent) {
        LabValue::Value(value) => Some(value),
        LabValue::NotReported | LabValue::Unparsable => None,
    }
}

// ==========================================
// テキスト
// ==========================================

/// 前後空白と ", true" 残骸を除去。空なら None
pub fn clean_text(raw: &str) -> Option<String> {
    let cleaned = raw.replace(BOOL_ARTIFACT, "");
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
