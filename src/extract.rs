//! Revenue extraction from parsed statements.
//!
//! Both encodings are reduced to the same shape: a list of revenue *candidates*,
//! each with a rank and a raw value. Tabular rows are read first; tagged facts
//! only count when no tabular row matched a label. Candidates are ranked by
//!
//! 1. current period before prior periods
//! 2. position of the matching label or concept tag in the configured list
//! 3. exact match before prefix match (tabular labels only)
//! 4. consolidated before non-consolidated
//!
//! and the first candidate whose value parses supplies the revenue. Segment
//! breakdowns (contexts with dimensions other than consolidation) are ignored.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use super::config::EdinetConfig;
use super::download::PayloadKind;
use super::parsing::number::{apply_scale, parse_amount, unit_label_scale};
use super::parsing::{Statement, TabularStatement, TaggedReport, parse_payload};

const FISCAL_YEAR_END_DEI: &str = "jpdei_cor:CurrentFiscalYearEndDateDEI";
const FILER_NAME_EN_DEI: &str = "jpdei_cor:FilerNameInEnglishDEI";
const FILER_NAME_JA_DEI: &str = "jpdei_cor:FilerNameInJapaneseDEI";
const DEFAULT_UNIT: &str = "JPY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Tabular,
    TaggedReport,
}

impl From<PayloadKind> for SourceFormat {
    fn from(kind: PayloadKind) -> Self {
        match kind {
            PayloadKind::Csv => SourceFormat::Tabular,
            PayloadKind::Xbrl => SourceFormat::TaggedReport,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    /// Revenue found and parsed
    Ok,
    /// A revenue field exists but no value could be parsed
    Partial,
    /// No revenue field, or the payload could not be read
    Failed,
}

impl fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionStatus::Ok => write!(f, "ok"),
            ExtractionStatus::Partial => write!(f, "partial"),
            ExtractionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Result of reading one payload. `revenue` is `Some` only when `status` is `Ok`.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub revenue: Option<Decimal>,
    pub revenue_unit: String,
    pub fiscal_year: Option<i32>,
    pub filer_name_en: Option<String>,
    pub filer_name_ja: Option<String>,
    pub source_format: SourceFormat,
    pub status: ExtractionStatus,
    /// Why the status is not `Ok`, for logs
    pub detail: Option<String>,
}

impl Extraction {
    pub fn failed(source_format: SourceFormat, detail: impl Into<String>) -> Self {
        Self {
            revenue: None,
            revenue_unit: DEFAULT_UNIT.to_string(),
            fiscal_year: None,
            filer_name_en: None,
            filer_name_ja: None,
            source_format,
            status: ExtractionStatus::Failed,
            detail: Some(detail.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Rank {
    prior_period: bool,
    field: usize,
    prefix_match: bool,
    non_consolidated: bool,
}

#[derive(Debug, Clone)]
struct Candidate {
    rank: Rank,
    raw: String,
    scale: i32,
    unit: String,
    format: SourceFormat,
}

/// Extracts revenue and supporting fields with configured label and tag lists.
#[derive(Debug, Clone)]
pub struct MetricExtractor {
    labels: Vec<String>,
    tags: Vec<String>,
}

impl MetricExtractor {
    pub fn new(labels: Vec<String>, tags: Vec<String>) -> Self {
        Self { labels, tags }
    }

    pub fn from_config(config: &EdinetConfig) -> Self {
        Self::new(
            config.revenue_field_labels.clone(),
            config.revenue_concept_tags.clone(),
        )
    }

    /// Reads a downloaded payload. Never fails; problems are reported through the
    /// returned status and `detail`.
    pub fn extract(&self, payload: &[u8], kind: PayloadKind) -> Extraction {
        match parse_payload(payload, kind) {
            Ok(statements) => self.extract_statements(&statements, kind.into()),
            Err(e) => Extraction::failed(kind.into(), format!("unreadable {} payload: {}", kind, e)),
        }
    }

    /// Same as [`extract`](Self::extract) for already parsed statements.
    pub fn extract_statements(&self, statements: &[Statement], format: SourceFormat) -> Extraction {
        let fiscal_year_end = first_value(statements, FISCAL_YEAR_END_DEI)
            .and_then(|v| NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d").ok());

        let mut candidates = Vec::new();
        for statement in statements {
            if let Statement::Tabular(table) = statement {
                self.tabular_candidates(table, &mut candidates);
            }
        }
        if candidates.is_empty() {
            for statement in statements {
                if let Statement::Tagged(report) = statement {
                    self.tagged_candidates(report, fiscal_year_end, &mut candidates);
                }
            }
        }
        candidates.sort_by(|a, b| a.rank.cmp(&b.rank));

        let mut extraction = Extraction {
            revenue: None,
            revenue_unit: DEFAULT_UNIT.to_string(),
            fiscal_year: fiscal_year_end.map(|d| d.year()),
            filer_name_en: first_value(statements, FILER_NAME_EN_DEI).map(str::to_string),
            filer_name_ja: first_value(statements, FILER_NAME_JA_DEI).map(str::to_string),
            source_format: statements
                .first()
                .map(|s| match s {
                    Statement::Tabular(_) => SourceFormat::Tabular,
                    Statement::Tagged(_) => SourceFormat::TaggedReport,
                })
                .unwrap_or(format),
            status: ExtractionStatus::Failed,
            detail: None,
        };

        if candidates.is_empty() {
            extraction.detail = Some("no revenue field matched".to_string());
            return extraction;
        }

        let parsed = candidates.iter().find_map(|candidate| {
            parse_amount(&candidate.raw)
                .and_then(|value| apply_scale(value, candidate.scale))
                .map(|value| (candidate, value))
        });

        match parsed {
            Some((candidate, value)) => {
                extraction.revenue = Some(value);
                extraction.revenue_unit = candidate.unit.clone();
                extraction.source_format = candidate.format;
                extraction.status = ExtractionStatus::Ok;
            }
            None => {
                extraction.status = ExtractionStatus::Partial;
                extraction.detail = Some(format!(
                    "{} revenue field(s) matched but none had a numeric value",
                    candidates.len()
                ));
            }
        }
        extraction
    }

    fn label_match(&self, row_keys: [&str; 2]) -> Option<(usize, bool)> {
        self.labels.iter().enumerate().find_map(|(index, label)| {
            if row_keys.iter().any(|key| !key.is_empty() && key == label) {
                Some((index, false))
            } else if row_keys.iter().any(|key| !key.is_empty() && key.starts_with(label.as_str())) {
                Some((index, true))
            } else {
                None
            }
        })
    }

    fn tabular_candidates(&self, table: &TabularStatement, out: &mut Vec<Candidate>) {
        for row in table.rows.iter().filter(|row| !row.has_other_dimensions()) {
            let Some((field, prefix_match)) =
                self.label_match([row.element_id.as_str(), row.item_name.as_str()])
            else {
                continue;
            };
            let scale = unit_label_scale(&row.unit_label).unwrap_or(0);
            let unit = if row.unit_id.is_empty() || row.unit_id == "－" || row.unit_label.contains('円') {
                DEFAULT_UNIT.to_string()
            } else {
                row.unit_id.clone()
            };
            out.push(Candidate {
                rank: Rank {
                    prior_period: !row.is_current_period(),
                    field,
                    prefix_match,
                    non_consolidated: !row.is_consolidated(),
                },
                raw: row.value.clone(),
                scale,
                unit,
                format: SourceFormat::Tabular,
            });
        }
    }

    fn tagged_candidates(
        &self,
        report: &TaggedReport,
        fiscal_year_end: Option<NaiveDate>,
        out: &mut Vec<Candidate>,
    ) {
        for fact in &report.facts {
            if fact.is_nil {
                continue;
            }
            let Some(field) = self.tags.iter().position(|tag| fact.matches(tag)) else {
                continue;
            };
            let context = report.context(&fact.context_ref);
            if context.is_some_and(|c| c.other_dimensions) {
                continue;
            }
            let current = context.is_some_and(|c| {
                c.is_current_period() || (fiscal_year_end.is_some() && c.period_end == fiscal_year_end)
            }) || fact.context_ref.starts_with("CurrentYear");
            let non_consolidated = context.is_some_and(|c| c.non_consolidated)
                || fact.context_ref.contains("NonConsolidatedMember");
            let unit = fact
                .unit_ref
                .as_ref()
                .map(|id| report.units.get(id).cloned().unwrap_or_else(|| id.clone()))
                .unwrap_or_else(|| DEFAULT_UNIT.to_string());

            out.push(Candidate {
                rank: Rank {
                    prior_period: !current,
                    field,
                    prefix_match: false,
                    non_consolidated,
                },
                raw: fact.value.clone(),
                scale: fact.scale.unwrap_or(0),
                unit,
                format: SourceFormat::TaggedReport,
            });
        }
    }
}

fn first_value<'a>(statements: &'a [Statement], element: &str) -> Option<&'a str> {
    statements.iter().find_map(|statement| match statement {
        Statement::Tabular(table) => table.value_of(element),
        Statement::Tagged(report) => report.value_of(element),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::{Context, Fact, TabularRow};
    use std::str::FromStr;

    fn extractor() -> MetricExtractor {
        MetricExtractor::new(
            vec!["jpcrp_cor:NetSalesSummaryOfBusinessResults".to_string(), "売上高".to_string()],
            vec!["jppfs_cor:NetSales".to_string(), "RevenueIFRS".to_string()],
        )
    }

    fn row(element: &str, name: &str, context: &str, value: &str) -> TabularRow {
        TabularRow {
            element_id: element.to_string(),
            item_name: name.to_string(),
            context_id: context.to_string(),
            relative_year: if context.starts_with("Current") { "当期" } else { "前期" }.to_string(),
            consolidation: if context.contains("NonConsolidated") { "個別" } else { "連結" }.to_string(),
            unit_id: "JPY".to_string(),
            unit_label: "円".to_string(),
            value: value.to_string(),
            ..Default::default()
        }
    }

    fn table(rows: Vec<TabularRow>) -> Statement {
        Statement::Tabular(TabularStatement {
            source: "test.csv".to_string(),
            rows,
        })
    }

    #[test]
    fn test_tabular_prefers_current_then_label_order_then_consolidated() {
        let statement = table(vec![
            row("jppfs_cor:NetSales", "売上高", "CurrentYearDuration", "900"),
            row("jpcrp_cor:NetSalesSummaryOfBusinessResults", "売上高", "Prior1YearDuration", "800"),
            row(
                "jpcrp_cor:NetSalesSummaryOfBusinessResults",
                "売上高",
                "CurrentYearDuration_NonConsolidatedMember",
                "700",
            ),
            row("jpcrp_cor:NetSalesSummaryOfBusinessResults", "売上高", "CurrentYearDuration", "1,000"),
            row("jpdei_cor:CurrentFiscalYearEndDateDEI", "", "FilingDateInstant", "2024-03-31"),
        ]);
        let extraction = extractor().extract_statements(&[statement], SourceFormat::Tabular);

        assert_eq!(extraction.status, ExtractionStatus::Ok);
        assert_eq!(extraction.revenue, Some(Decimal::from(1000)));
        assert_eq!(extraction.fiscal_year, Some(2024));
        assert_eq!(extraction.revenue_unit, "JPY");
        assert_eq!(extraction.source_format, SourceFormat::Tabular);
    }

    #[test]
    fn test_current_period_beats_higher_priority_label() {
        let statement = table(vec![
            row("jpcrp_cor:NetSalesSummaryOfBusinessResults", "売上高", "Prior1YearDuration", "800"),
            row(
                "jpcrp_cor:RevenueIFRSSummaryOfBusinessResults",
                "売上収益（IFRS）",
                "CurrentYearDuration",
                "1000",
            ),
            row("jpdei_cor:CurrentFiscalYearEndDateDEI", "", "FilingDateInstant", "2024-03-31"),
        ]);
        let extractor = MetricExtractor::from_config(&EdinetConfig::new(
            "key",
            NaiveDate::from_ymd_opt(2024, 6, 25).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 25).unwrap(),
        ));
        let extraction = extractor.extract_statements(&[statement], SourceFormat::Tabular);

        assert_eq!(extraction.fiscal_year, Some(2024));
        assert_eq!(extraction.revenue, Some(Decimal::from(1000)));
    }

    #[test]
    fn test_tabular_segment_rows_are_skipped() {
        let statement = table(vec![
            row(
                "jpcrp_cor:NetSalesSummaryOfBusinessResults",
                "売上高",
                "CurrentYearDuration_jpcrp030000-asr_E00001-000MachineryReportableSegmentMember",
                "50",
            ),
            row("jpcrp_cor:NetSalesSummaryOfBusinessResults", "売上高", "CurrentYearDuration", "500"),
        ]);
        let extraction = extractor().extract_statements(&[statement], SourceFormat::Tabular);
        assert_eq!(extraction.revenue, Some(Decimal::from(500)));
    }

    #[test]
    fn test_tabular_row_beats_tagged_fact() {
        let tabular = table(vec![row("jppfs_cor:NetSales", "売上高", "CurrentYearDuration", "111")]);
        let tagged = Statement::Tagged(TaggedReport {
            contexts: [context("CurrentYearDuration", false, false)].into_iter().collect(),
            facts: vec![fact("jppfs_cor:NetSales", "CurrentYearDuration", "222")],
            ..Default::default()
        });
        let extraction =
            extractor().extract_statements(&[tagged, tabular], SourceFormat::Tabular);
        assert_eq!(extraction.revenue, Some(Decimal::from(111)));
        assert_eq!(extraction.source_format, SourceFormat::Tabular);
    }

    #[test]
    fn test_tabular_unit_label_scaling() {
        let mut scaled = row("jpcrp_cor:NetSalesSummaryOfBusinessResults", "売上高", "CurrentYearDuration", "1,234");
        scaled.unit_label = "百万円".to_string();
        let extraction = extractor().extract_statements(&[table(vec![scaled])], SourceFormat::Tabular);
        assert_eq!(extraction.revenue, Decimal::from_str("1234000000").ok());
    }

    #[test]
    fn test_unparseable_candidates_give_partial() {
        let statement = table(vec![row(
            "jpcrp_cor:NetSalesSummaryOfBusinessResults",
            "売上高",
            "CurrentYearDuration",
            "－",
        )]);
        let extraction = extractor().extract_statements(&[statement], SourceFormat::Tabular);
        assert_eq!(extraction.status, ExtractionStatus::Partial);
        assert_eq!(extraction.revenue, None);
    }

    #[test]
    fn test_no_candidate_gives_failed() {
        let statement = table(vec![row("jppfs_cor:OrdinaryIncome", "経常利益", "CurrentYearDuration", "10")]);
        let extraction = extractor().extract_statements(&[statement], SourceFormat::Tabular);
        assert_eq!(extraction.status, ExtractionStatus::Failed);
        assert_eq!(extraction.revenue, None);
        assert!(extraction.detail.is_some());
    }

    #[test]
    fn test_unreadable_payload_is_failed() {
        let extraction = extractor().extract(b"PK\x03\x04 broken", PayloadKind::Csv);
        assert_eq!(extraction.status, ExtractionStatus::Failed);
        assert_eq!(extraction.source_format, SourceFormat::Tabular);
    }

    fn context(id: &str, non_consolidated: bool, other: bool) -> (String, Context) {
        (
            id.to_string(),
            Context {
                id: id.to_string(),
                period_end: NaiveDate::from_ymd_opt(2024, 3, 31),
                non_consolidated,
                other_dimensions: other,
            },
        )
    }

    fn fact(name: &str, context_ref: &str, value: &str) -> Fact {
        Fact {
            name: name.to_string(),
            context_ref: context_ref.to_string(),
            unit_ref: Some("JPY".to_string()),
            value: value.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_tagged_skips_segments_and_prefers_consolidated() {
        let report = TaggedReport {
            source: "test.xbrl".to_string(),
            contexts: [
                context("CurrentYearDuration", false, false),
                context("CurrentYearDuration_NonConsolidatedMember", true, false),
                context("CurrentYearDuration_ReportableSegmentMember", false, true),
            ]
            .into_iter()
            .collect(),
            units: [("JPY".to_string(), "JPY".to_string())].into_iter().collect(),
            facts: vec![
                fact("jppfs_cor:NetSales", "CurrentYearDuration_ReportableSegmentMember", "50"),
                fact("jppfs_cor:NetSales", "CurrentYearDuration_NonConsolidatedMember", "300"),
                fact("jppfs_cor:NetSales", "CurrentYearDuration", "500"),
            ],
        };
        let extraction =
            extractor().extract_statements(&[Statement::Tagged(report)], SourceFormat::TaggedReport);
        assert_eq!(extraction.status, ExtractionStatus::Ok);
        assert_eq!(extraction.revenue, Some(Decimal::from(500)));
        assert_eq!(extraction.source_format, SourceFormat::TaggedReport);
    }

    #[test]
    fn test_tagged_scale_and_unprefixed_tag() {
        let mut scaled = fact("jpigp_cor:RevenueIFRS", "CurrentYearDuration", "42");
        scaled.scale = Some(6);
        let report = TaggedReport {
            contexts: [context("CurrentYearDuration", false, false)].into_iter().collect(),
            facts: vec![scaled],
            ..Default::default()
        };
        let extraction =
            extractor().extract_statements(&[Statement::Tagged(report)], SourceFormat::TaggedReport);
        assert_eq!(extraction.revenue, Some(Decimal::from(42_000_000)));
        assert_eq!(extraction.revenue_unit, "JPY");
    }
}
