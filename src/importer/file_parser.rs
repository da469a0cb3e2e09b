// ==========================================
// 症例記録インポート - 文書パーサー
// ==========================================
// 対応: 区切りテキスト (.csv/.tsv) / 表計算 (.xlsx/.xlsm/.xls/.xlsb/.ods)
// 出力: Workbook（形式非依存のセル格子）
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::value_normalizer::serial_to_date;
use crate::importer::workbook::{CellValue, Workbook, Worksheet};
use calamine::{open_workbook_auto, Data, Reader};
use csv::{ReaderBuilder, Trim};
use std::path::Path;
use tracing::{debug, info};

/// UTF-8 BOM
const BOM: char = '\u{feff}';

/// 文書 → Workbook
pub trait DocumentParser {
    fn parse(&self, path: &Path) -> ImportResult<Workbook>;
}

fn ensure_exists(path: &Path) -> ImportResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(ImportError::FileNotFound(path.display().to_string()))
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

// ==========================================
// 区切りテキスト
// ==========================================
// 引用符内の区切り文字は分割しない。各フィールドは前後空白を除去
// シート名はファイル名（拡張子なし）
pub struct CsvParser {
    delimiter: u8,
}

impl CsvParser {
    pub fn comma() -> Self {
        Self { delimiter: b',' }
    }

    pub fn tab() -> Self {
        Self { delimiter: b'\t' }
    }

    /// 文字列から直接読む（シート名を指定）
    pub fn parse_str(&self, sheet_name: &str, content: &str) -> ImportResult<Workbook> {
        let reader = self.builder().from_reader(content.as_bytes());
        Ok(Workbook::new(vec![read_records(sheet_name, reader)?]))
    }

    fn builder(&self) -> ReaderBuilder {
        let mut builder = ReaderBuilder::new();
        builder
            .has_headers(false)
            .flexible(true) // 行ごとの列数が異なってもよい
            .trim(Trim::All)
            .delimiter(self.delimiter);
        builder
    }
}

fn read_records<R: std::io::Read>(
    sheet_name: &str,
    mut reader: csv::Reader<R>,
) -> ImportResult<Worksheet> {
    let mut sheet = Worksheet::new(sheet_name);
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        for (col, field) in record.iter().enumerate() {
            let text = if row == 0 && col == 0 {
                field.trim_start_matches(BOM).trim()
            } else {
                field
            };
            sheet.insert(row, col, CellValue::Text(text.to_string()));
        }
    }
    Ok(sheet)
}

impl DocumentParser for CsvParser {
    fn parse(&self, path: &Path) -> ImportResult<Workbook> {
        ensure_exists(path)?;
        let sheet_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("sheet1")
            .to_string();

        let reader = self.builder().from_path(path)?;
        let sheet = read_records(&sheet_name, reader)?;
        debug!(sheet = %sheet_name, rows = sheet.row_count(), "CSV 読込完了");
        Ok(Workbook::new(vec![sheet]))
    }
}

// ==========================================
// 表計算（calamine）
// ==========================================
pub struct ExcelParser;

/// calamine のセル → CellValue
pub fn convert_cell(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(text) => CellValue::Text(text.clone()),
        Data::Int(value) => CellValue::Number(*value as f64),
        Data::Float(value) => CellValue::Number(*value),
        Data::Bool(flag) => CellValue::Bool(*flag),
        Data::DateTime(datetime) => serial_to_date(datetime.as_f64())
            .map(CellValue::Date)
            .unwrap_or(CellValue::Number(datetime.as_f64())),
        Data::DateTimeIso(text) => {
            // "2024-03-15T00:00:00" → 日付部分のみ
            let date_part = text.split('T').next().unwrap_or(text);
            chrono::NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
                .map(CellValue::Date)
                .unwrap_or_else(|_| CellValue::Text(text.clone()))
        }
        Data::DurationIso(text) => CellValue::Text(text.clone()),
        Data::Error(_) => CellValue::Empty,
    }
}

impl DocumentParser for ExcelParser {
    fn parse(&self, path: &Path) -> ImportResult<Workbook> {
        ensure_exists(path)?;
        let mut workbook = open_workbook_auto(path)?;

        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook.worksheet_range(&name)?;
            let mut sheet = Worksheet::new(name.clone());

            // used_cells の座標は range 起点からの相対値
            let (row_offset, col_offset) = range
                .start()
                .map(|(r, c)| (r as usize, c as usize))
                .unwrap_or((0, 0));
            for (row, col, data) in range.used_cells() {
                sheet.insert(row + row_offset, col + col_offset, convert_cell(data));
            }

            debug!(sheet = %name, rows = sheet.row_count(), "シート読込完了");
            sheets.push(sheet);
        }

        if sheets.is_empty() {
            return Err(ImportError::Document("ワークシートがありません".to_string()));
        }
        Ok(Workbook::new(sheets))
    }
}

// ==========================================
// 拡張子で振り分け
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    pub fn parse<P: AsRef<Path>>(&self, file_path: P) -> ImportResult<Workbook> {
        let path = file_path.as_ref();
        ensure_exists(path)?;

        let ext = extension_of(path);
        info!(path = %path.display(), format = %ext, "文書読込開始");
        match ext.as_str() {
            "csv" => CsvParser::comma().parse(path),
            "tsv" => CsvParser::tab().parse(path),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => ExcelParser.parse(path),
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn csv_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_csv_quoted_commas_and_trim() {
        let file = csv_file("患者ID,備考\n P001 ,\"左, 右\"\n");
        let workbook = UniversalFileParser.parse(file.path()).unwrap();
        let sheet = &workbook.sheets[0];

        assert_eq!(sheet.headers(), vec!["患者ID", "備考"]);
        assert_eq!(sheet.cell(1, 0), &CellValue::Text("P001".to_string()));
        assert_eq!(sheet.cell(1, 1), &CellValue::Text("左, 右".to_string()));
    }

    #[test]
    fn test_csv_strips_bom_and_names_sheet_after_file() {
        let file = csv_file("\u{feff}患者ID,年齢\nP001,30\n");
        let workbook = UniversalFileParser.parse(file.path()).unwrap();
        let sheet = &workbook.sheets[0];

        assert_eq!(sheet.headers()[0], "患者ID");
        let stem = file.path().file_stem().unwrap().to_str().unwrap();
        assert_eq!(sheet.name, stem);
    }

    #[test]
    fn test_csv_flexible_row_length() {
        let workbook = CsvParser::comma()
            .parse_str("患者", "患者ID,年齢,登録日\nP001\nP002,40,2024/01/01,余分\n")
            .unwrap();
        let sheet = &workbook.sheets[0];
        assert_eq!(sheet.row_count(), 3);
        assert_eq!(sheet.cell(2, 3), &CellValue::Text("余分".to_string()));
    }

    #[test]
    fn test_missing_file() {
        let err = UniversalFileParser.parse("no_such_file.xlsx").unwrap_err();
        assert!(matches!(err, ImportError::FileNotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = Builder::new().suffix(".pdf").tempfile().unwrap();
        let err = UniversalFileParser.parse(file.path()).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(ext) if ext == "pdf"));
    }

    #[test]
    fn test_convert_cell_types() {
        assert_eq!(convert_cell(&Data::Int(3)), CellValue::Number(3.0));
        assert_eq!(
            convert_cell(&Data::String("陰性".to_string())),
            CellValue::Text("陰性".to_string())
        );
        assert_eq!(
            convert_cell(&Data::DateTimeIso("2024-03-15T00:00:00".to_string())),
            CellValue::Date(chrono::NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
        );
        assert_eq!(convert_cell(&Data::Empty), CellValue::Empty);
    }
}
