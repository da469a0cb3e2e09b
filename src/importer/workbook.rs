// ==========================================
// 症例記録インポート - ワークブックモデル
// ==========================================
// 職責: 取込元文書（CSV / 表計算）の形式非依存な表現
// 座標: 行・列とも 0 始まり。行 0 が見出し行
// ==========================================

use chrono::NaiveDate;
use std::collections::BTreeMap;

// ==========================================
// CellValue - セル値
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Bool(bool),
}

impl CellValue {
    /// 空白（空セル・空白のみの文字列）か
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// 表示用テキスト（整数値の数値は小数点なし）
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            CellValue::Number(number) => Some(format_number(*number)),
            CellValue::Date(date) => Some(date.format("%Y/%m/%d").to_string()),
            CellValue::Bool(flag) => Some(flag.to_string()),
        }
    }
}

/// 45000.0 → "45000"、12.5 → "12.5"
pub fn format_number(number: f64) -> String {
    if number.is_finite() && number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

// ==========================================
// 列記号
// ==========================================

/// 列記号 → 0 始まりの列番号（"A"→0, "Z"→25, "AA"→26）
///
/// 英字以外を含む・空文字列は None
pub fn column_letter_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut index: usize = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = (ch.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
    }
    Some(index - 1)
}

/// 列レイアウト定義用（不正な記号はコンパイル時に失敗）
pub const fn column(letters: &str) -> usize {
    let bytes = letters.as_bytes();
    assert!(!bytes.is_empty(), "列記号が空です");
    let mut index = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        assert!(b >= b'A' && b <= b'Z', "列記号は大文字 A-Z のみ");
        index = index * 26 + (b - b'A') as usize + 1;
        i += 1;
    }
    index - 1
}

/// "B3" 形式のセル参照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    pub fn parse(reference: &str) -> Option<Self> {
        let split = reference.find(|c: char| c.is_ascii_digit())?;
        let (letters, digits) = reference.split_at(split);
        let col = column_letter_to_index(letters)?;
        let row: usize = digits.parse().ok()?;
        if row == 0 {
            return None;
        }
        Some(Self { row: row - 1, col })
    }
}

// ==========================================
// Worksheet / Workbook
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Worksheet {
    pub name: String,
    cells: BTreeMap<(usize, usize), CellValue>,
}

impl Worksheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    /// 行データからシートを作る（テスト・CSV 用）
    pub fn from_rows<R, C>(name: impl Into<String>, rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator<Item = CellValue>,
    {
        let mut sheet = Self::new(name);
        for (row, cells) in rows.into_iter().enumerate() {
            for (col, value) in cells.into_iter().enumerate() {
                sheet.insert(row, col, value);
            }
        }
        sheet
    }

    /// 空セルは保持しない
    pub fn insert(&mut self, row: usize, col: usize, value: CellValue) {
        if value.is_blank() {
            self.cells.remove(&(row, col));
        } else {
            self.cells.insert((row, col), value);
        }
    }

    /// "B3" 形式で設定。参照が不正なら false
    pub fn insert_reference(&mut self, reference: &str, value: CellValue) -> bool {
        match CellRef::parse(reference) {
            Some(cell) => {
                self.insert(cell.row, cell.col, value);
                true
            }
            None => false,
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.cells.get(&(row, col)).unwrap_or(&CellValue::Empty)
    }

    /// 最終行 + 1（空シートは 0）
    pub fn row_count(&self) -> usize {
        self.cells.keys().map(|(row, _)| row + 1).max().unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.cells.keys().map(|(_, col)| col + 1).max().unwrap_or(0)
    }

    /// 見出し行（行 0）のテキスト。空セルは空文字列
    pub fn headers(&self) -> Vec<String> {
        (0..self.column_count())
            .map(|col| self.cell(0, col).as_text().unwrap_or_default())
            .collect()
    }

    /// データ行（見出し行の次から）。行番号は 1 始まりのデータ行序数
    pub fn data_rows(&self) -> impl Iterator<Item = SheetRow<'_>> + '_ {
        (1..self.row_count()).map(move |row| SheetRow {
            sheet: self,
            row,
            number: row,
        })
    }
}

/// データ行 1 行へのビュー
#[derive(Debug, Clone, Copy)]
pub struct SheetRow<'a> {
    sheet: &'a Worksheet,
    row: usize,
    pub number: usize,
}

impl<'a> SheetRow<'a> {
    pub fn cell(&self, col: usize) -> &'a CellValue {
        self.sheet.cell(self.row, col)
    }

    pub fn text(&self, col: usize) -> Option<String> {
        self.cell(col).as_text()
    }

    pub fn is_blank(&self) -> bool {
        (0..self.sheet.column_count()).all(|col| self.cell(col).is_blank())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Worksheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Worksheet>) -> Self {
        Self { sheets }
    }

    pub fn sheet(&self, name: &str) -> Option<&Worksheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}
