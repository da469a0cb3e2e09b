// ==========================================
// テスト補助関数
// ==========================================
// 職責: 一時 DB の作成、シート / CSV テストデータの組み立て
// ==========================================
#![allow(dead_code)]

use casefile_import::db::{init_schema, open_sqlite_connection};
use casefile_import::importer::workbook::{column_letter_to_index, CellValue, Worksheet};
use std::error::Error;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

// ===== 見出し行 =====

pub const PATIENT_HEADERS: &[&str] = &["患者ID", "年齢", "性別", "連絡先", "登録日", "備考"];

pub const SURGERY_HEADERS: &[&str] = &[
    "患者ID",
    "手術カテゴリ",
    "術式",
    "脂肪注入種別",
    "BMI",
    "麻酔",
    "インプラント",
    "術前VECTRA(R)",
    "術前VECTRA(L)",
    "手術日",
    "手術日(旧)",
    "喫煙歴",
    "授乳歴",
    "施術回数",
    "身長",
    "体重",
    "NAC-IMF(R)",
    "NAC-IMF伸展(R)",
    "NAC-IMF(L)",
    "NAC-IMF伸展(L)",
    "皮膚厚(R)",
    "皮膚厚(L)",
    "採取部位",
    "注入量(R)",
    "注入量(L)",
];

pub const LAB_HEADERS: &[&str] = &["患者ID", "検査日", "白血球数(WBC)", "AST(GOT)", "HBs抗原"];

pub const FOLLOW_UP_HEADERS: &[&str] = &[
    "患者ID",
    "手術日",
    "フォローアップ日",
    "計測日",
    "時期",
    "VECTRA体積(R)",
    "VECTRA体積(L)",
    "定着率(R)",
    "定着率(L)",
    "体重",
    "備考",
    "手術ID",
];

/// 一時 DB を作成してスキーマを用意
///
/// # 戻り値
/// - NamedTempFile: 一時ファイル（テスト中は保持すること）
/// - String: DB パス
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_string_lossy().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

pub fn text(value: &str) -> CellValue {
    CellValue::Text(value.to_string())
}

pub fn number(value: f64) -> CellValue {
    CellValue::Number(value)
}

/// 見出し行 + データ行（列は "A" 形式で指定）からシートを作る
pub fn sheet(name: &str, headers: &[&str], rows: &[Vec<(&str, CellValue)>]) -> Worksheet {
    let mut sheet = Worksheet::new(name);
    for (col, header) in headers.iter().enumerate() {
        sheet.insert(0, col, text(header));
    }
    for (index, cells) in rows.iter().enumerate() {
        for (letter, value) in cells {
            let col = column_letter_to_index(letter).expect("列記号が不正");
            sheet.insert(index + 1, col, value.clone());
        }
    }
    sheet
}

/// 同じ内容を CSV テキストにする（引用符はすべてに付ける）
pub fn csv_text(headers: &[&str], rows: &[Vec<(&str, &str)>]) -> String {
    let quote = |value: &str| format!("\"{}\"", value.replace('"', "\"\""));
    let mut lines = vec![headers.iter().map(|h| quote(h)).collect::<Vec<_>>().join(",")];
    for cells in rows {
        let width = cells
            .iter()
            .filter_map(|(letter, _)| column_letter_to_index(letter))
            .max()
            .map_or(0, |max| max + 1)
            .max(headers.len());
        let mut fields = vec![String::new(); width];
        for (letter, value) in cells {
            let col = column_letter_to_index(letter).expect("列記号が不正");
            fields[col] = value.to_string();
        }
        lines.push(fields.iter().map(|f| quote(f)).collect::<Vec<_>>().join(","));
    }
    lines.join("\n") + "\n"
}

/// ディレクトリに CSV を書き出してパスを返す
pub fn write_file(dir: &Path, file_name: &str, content: &str) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, content).expect("テストファイルの書き込みに失敗");
    path
}
