// ==========================================
// 症例記録インポート - 取込層
// ==========================================
// 職責: 外部文書（表計算 / 区切りテキスト / 検査結果貼り付け）→ 症例記録
// 対応: .xlsx .xlsm .xls .xlsb .ods .csv .tsv
// ==========================================

pub mod case_importer;
pub mod case_importer_trait;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod lab_paste;
pub mod row_mapper;
pub mod sheet_classifier;
pub mod value_normalizer;
pub mod workbook;

pub use case_importer::{CaseImporterImpl, LAB_PASTE_SOURCE};
pub use case_importer_trait::{CaseImporter, LabPasteRequest};
pub use error::{ImportError, ImportResult};
pub use field_mapper::{FieldMapper, FieldMapping, LabelSource};
pub use file_parser::{CsvParser, DocumentParser, ExcelParser, UniversalFileParser};
pub use lab_paste::{LabPaste, LabPasteParser, ParsedLabItem};
pub use sheet_classifier::{classify_headers, plan_sheets, SheetKind, SheetPlan};
pub use workbook::{column_letter_to_index, CellValue, SheetRow, Workbook, Worksheet};
