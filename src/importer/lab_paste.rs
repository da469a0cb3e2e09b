// ==========================================
// 症例記録インポート - 検査結果貼り付け解析
// ==========================================
// 職責: 検査会社の結果票（"項目<TAB>値" 行）→ LabField 値
// 階層: 行頭が空白 / タブ / 全角空白の行は直前の親項目の子
//       （照合ラベルは "<親> <子>"）
// ==========================================

use crate::domain::{FieldValue, LabData, ValueKind};
use crate::importer::field_mapper::{FieldMapper, FieldMapping, LabelSource};
use crate::importer::value_normalizer::{classify_lab_value, clean_text, LabValue};
use tracing::debug;

const INDENT_CHARS: [char; 3] = [' ', '\t', '\u{3000}'];

/// 照合できた 1 項目
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLabItem {
    pub label: String, // 照合に使ったラベル（子項目は親付き）
    pub mapping: FieldMapping,
    pub value: FieldValue,
    pub line: String,
}

/// 解析結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabPaste {
    pub items: Vec<ParsedLabItem>,
    pub unmatched: Vec<String>, // 値列なし / 未対応項目 / 数値化できない値
}

impl LabPaste {
    /// 照合済みの値を検査記録へ反映。反映件数を返す
    pub fn apply_to(&self, lab: &mut LabData) -> usize {
        self.items
            .iter()
            .filter(|item| item.mapping.field.apply(lab, item.value.clone()))
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct LabPasteParser {
    mapper: FieldMapper,
    zero_as_absent: bool,
}

impl LabPasteParser {
    pub fn new(mapper: FieldMapper, zero_as_absent: bool) -> Self {
        Self {
            mapper,
            zero_as_absent,
        }
    }

    pub fn parse(&self, text: &str) -> LabPaste {
        let mut result = LabPaste::default();
        let mut parent: Option<String> = None;

        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }

            let is_sub_item = line.starts_with(INDENT_CHARS);
            let body = line.trim_start_matches(INDENT_CHARS);
            let columns: Vec<&str> = body.split('\t').map(str::trim).collect();
            if columns.len() < 2 {
                result.unmatched.push(line.to_string());
                continue;
            }

            let name = columns[0];
            if !is_sub_item {
                parent = Some(name.to_string());
            }
            let label = match (&parent, is_sub_item) {
                (Some(parent), true) => format!("{} {}", parent, name),
                _ => name.to_string(),
            };

            let raw_value = columns[1];
            if raw_value.is_empty() || raw_value == ", true" {
                continue;
            }

            let Some(mapping) = self.mapper.map_field(&label, LabelSource::LabPaste) else {
                debug!(label = %label, raw_value, "未対応の検査項目");
                result.unmatched.push(line.to_string());
                continue;
            };

            let value = match mapping.kind {
                ValueKind::Text => match clean_text(raw_value) {
                    Some(text) => FieldValue::Text(text),
                    None => continue,
                },
                ValueKind::Numeric => match classify_lab_value(raw_value, self.zero_as_absent) {
                    LabValue::Value(number) => FieldValue::Number(number),
                    LabValue::NotReported => {
                        debug!(label = %label, "未報告の検査値");
                        continue;
                    }
                    LabValue::Unparsable => {
                        result.unmatched.push(line.to_string());
                        continue;
                    }
                },
            };

            result.items.push(ParsedLabItem {
                label,
                mapping,
                value,
                line: line.to_string(),
            });
        }

        debug!(
            matched = result.items.len(),
            unmatched = result.unmatched.len(),
            "検査結果貼り付けの解析完了"
        );
        result
    }
}

impl Default for LabPasteParser {
    fn default() -> Self {
        Self::new(FieldMapper::new(), true)
    }
}
