//! Company reference table built from the EDINET code list.
//!
//! The FSA publishes the list of all filers as a CSV file (Shift_JIS) in a Japanese
//! and an English edition. Both are accepted, with or without the download-date
//! title line that precedes the header.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use super::error::{EdinetError, Result};
use super::parsing::text::decode_text;

const CODE_HEADERS: &[&str] = &["EDINET Code", "ＥＤＩＮＥＴコード"];
const LISTED_HEADERS: &[&str] = &["Listed company / Unlisted company", "上場区分"];
const CONSOLIDATED_HEADERS: &[&str] = &["Consolidated / NonConsolidated", "連結の有無"];
const NAME_HEADERS: &[&str] = &["Submitter Name", "提出者名"];
const NAME_EN_HEADERS: &[&str] = &["Submitter Name（alphabetic）", "提出者名（英字）"];
const INDUSTRY_HEADERS: &[&str] = &["Submitter's industry", "提出者業種"];
const SEC_CODE_HEADERS: &[&str] = &["Securities Identification Code", "証券コード"];

/// One row of the code list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyInfo {
    pub edinet_code: String,
    pub name: Option<String>,
    pub name_en: Option<String>,
    pub industry: Option<String>,
    pub sec_code: Option<String>,
    pub listed: bool,
    pub consolidated: bool,
}

impl CompanyInfo {
    /// English name when available, else the Japanese one.
    pub fn display_name(&self) -> Option<&str> {
        self.name_en.as_deref().or(self.name.as_deref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompanyTable {
    companies: HashMap<String, CompanyInfo>,
}

impl CompanyTable {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let table = Self::from_bytes(&bytes)?;
        tracing::info!(
            path = %path.as_ref().display(),
            companies = table.len(),
            "loaded company reference table"
        );
        Ok(table)
    }

    /// Parses the code list from raw bytes in any supported encoding.
    ///
    /// # Errors
    ///
    /// Returns `EdinetError::ParseError` when no line carries the EDINET code header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = decode_text(bytes);
        let header_offset = header_offset(&text).ok_or_else(|| {
            EdinetError::ParseError("code list has no EDINET code header".to_string())
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text[header_offset..].as_bytes());
        let headers = reader.headers()?.clone();
        let column = |candidates: &[&str]| {
            headers
                .iter()
                .position(|h| candidates.contains(&h.trim().trim_start_matches('\u{feff}')))
        };

        let code_col = column(CODE_HEADERS).ok_or_else(|| {
            EdinetError::ParseError("code list header lacks the EDINET code column".to_string())
        })?;
        let listed_col = column(LISTED_HEADERS);
        let consolidated_col = column(CONSOLIDATED_HEADERS);
        let name_col = column(NAME_HEADERS);
        let name_en_col = column(NAME_EN_HEADERS);
        let industry_col = column(INDUSTRY_HEADERS);
        let sec_code_col = column(SEC_CODE_HEADERS);

        let mut companies = HashMap::new();
        for record in reader.records() {
            let record = record?;
            let get = |index: Option<usize>| {
                index
                    .and_then(|i| record.get(i))
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            };
            let Some(edinet_code) = get(Some(code_col)) else {
                continue;
            };
            let listed = get(listed_col)
                .is_some_and(|v| v.eq_ignore_ascii_case("Listed company") || v == "上場");
            let consolidated = get(consolidated_col)
                .is_some_and(|v| v.eq_ignore_ascii_case("Consolidated") || v == "有");

            companies.insert(
                edinet_code.clone(),
                CompanyInfo {
                    edinet_code,
                    name: get(name_col),
                    name_en: get(name_en_col),
                    industry: get(industry_col),
                    sec_code: get(sec_code_col),
                    listed,
                    consolidated,
                },
            );
        }

        Ok(CompanyTable { companies })
    }

    pub fn get(&self, edinet_code: &str) -> Option<&CompanyInfo> {
        self.companies.get(edinet_code)
    }

    pub fn len(&self) -> usize {
        self.companies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }

    /// Listed, consolidated filers with an English name.
    pub fn listed_consolidated_ids(&self) -> BTreeSet<String> {
        self.companies
            .values()
            .filter(|c| c.listed && c.consolidated && c.name_en.is_some())
            .map(|c| c.edinet_code.clone())
            .collect()
    }
}

impl FromIterator<CompanyInfo> for CompanyTable {
    fn from_iter<T: IntoIterator<Item = CompanyInfo>>(iter: T) -> Self {
        CompanyTable {
            companies: iter
                .into_iter()
                .map(|c| (c.edinet_code.clone(), c))
                .collect(),
        }
    }
}

/// Byte offset of the header line, skipping any title line above it.
fn header_offset(text: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let start = line.trim_start_matches('\u{feff}').trim_start_matches('"');
        if CODE_HEADERS.iter().any(|h| start.starts_with(h)) {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}
