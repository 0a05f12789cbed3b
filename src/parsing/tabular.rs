//! Parser for the tab-separated statement exports bundled in `type=5` packages.
//!
//! Each file is a flattened view of the XBRL instance, one fact per row:
//!
//! ```text
//! "要素ID"  "項目名"  "コンテキストID"  "相対年度"  "連結・個別"  "期間・時点"  "ユニットID"  "単位"  "値"
//! "jpcrp_cor:NetSalesSummaryOfBusinessResults"  "売上高"  "CurrentYearDuration"  "当期"  "連結"  "期間"  "JPY"  "円"  "1000000"
//! ```

use crate::{EdinetError, Result};

const COL_ELEMENT_ID: &str = "要素ID";
const COL_ITEM_NAME: &str = "項目名";
const COL_CONTEXT_ID: &str = "コンテキストID";
const COL_RELATIVE_YEAR: &str = "相対年度";
const COL_CONSOLIDATION: &str = "連結・個別";
const COL_PERIOD_KIND: &str = "期間・時点";
const COL_UNIT_ID: &str = "ユニットID";
const COL_UNIT_LABEL: &str = "単位";
const COL_VALUE: &str = "値";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularRow {
    pub element_id: String,
    pub item_name: String,
    pub context_id: String,
    pub relative_year: String,
    pub consolidation: String,
    pub period_kind: String,
    pub unit_id: String,
    pub unit_label: String,
    pub value: String,
}

impl TabularRow {
    pub fn is_current_period(&self) -> bool {
        self.context_id.starts_with("CurrentYear") || self.relative_year.starts_with("当期")
    }

    pub fn is_consolidated(&self) -> bool {
        self.consolidation != "個別" && !self.context_id.contains("NonConsolidatedMember")
    }

    /// True for segment or other breakdown rows, whose context id carries a
    /// member other than `NonConsolidatedMember`.
    pub fn has_other_dimensions(&self) -> bool {
        self.context_id
            .split('_')
            .skip(1)
            .any(|part| part.ends_with("Member") && part != "NonConsolidatedMember")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularStatement {
    /// File name inside the package, for logs
    pub source: String,
    pub rows: Vec<TabularRow>,
}

struct Columns {
    element_id: Option<usize>,
    item_name: Option<usize>,
    context_id: Option<usize>,
    relative_year: Option<usize>,
    consolidation: Option<usize>,
    period_kind: Option<usize>,
    unit_id: Option<usize>,
    unit_label: Option<usize>,
    value: usize,
}

impl Columns {
    fn from_header(header: &csv::StringRecord) -> Option<Self> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h.trim().trim_start_matches('\u{feff}') == name)
        };
        let columns = Columns {
            element_id: find(COL_ELEMENT_ID),
            item_name: find(COL_ITEM_NAME),
            context_id: find(COL_CONTEXT_ID),
            relative_year: find(COL_RELATIVE_YEAR),
            consolidation: find(COL_CONSOLIDATION),
            period_kind: find(COL_PERIOD_KIND),
            unit_id: find(COL_UNIT_ID),
            unit_label: find(COL_UNIT_LABEL),
            value: find(COL_VALUE)?,
        };
        if columns.element_id.is_none() && columns.item_name.is_none() {
            return None;
        }
        Some(columns)
    }
}

fn field(record: &csv::StringRecord, index: Option<usize>) -> String {
    index
        .and_then(|i| record.get(i))
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

impl TabularStatement {
    /// Parses decoded statement text. Tab is the expected delimiter; comma is
    /// accepted when the header line has no tab.
    pub fn parse(text: &str, source: &str) -> Result<Self> {
        let text = text.trim_start_matches('\u{feff}');
        let header_line = text.lines().next().unwrap_or_default();
        let delimiter = if header_line.contains('\t') { b'\t' } else { b',' };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let columns = Columns::from_header(reader.headers()?).ok_or_else(|| {
            EdinetError::ParseError(format!(
                "{}: header lacks the element, item name or value column",
                source
            ))
        })?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(TabularRow {
                element_id: field(&record, columns.element_id),
                item_name: field(&record, columns.item_name),
                context_id: field(&record, columns.context_id),
                relative_year: field(&record, columns.relative_year),
                consolidation: field(&record, columns.consolidation),
                period_kind: field(&record, columns.period_kind),
                unit_id: field(&record, columns.unit_id),
                unit_label: field(&record, columns.unit_label),
                value: field(&record, Some(columns.value)),
            });
        }

        Ok(TabularStatement {
            source: source.to_string(),
            rows,
        })
    }

    /// Value of the first row with the given element id.
    pub fn value_of(&self, element_id: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|row| row.element_id == element_id && !row.value.is_empty())
            .map(|row| row.value.as_str())
    }
}
