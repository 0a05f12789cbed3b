use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use super::catalog::DocumentMetadata;
use super::extract::{Extraction, ExtractionStatus, SourceFormat};
use super::reference::CompanyTable;
use super::selector::PrecedenceKey;

/// One normalized output row per company and fiscal year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialRecord {
    pub company_id: String,
    pub company_name: String,
    pub industry: Option<String>,
    pub fiscal_year: i32,
    pub period_end: NaiveDate,
    /// Revenue in base currency units; `None` unless `extraction_status` is `Ok`
    pub revenue: Option<Decimal>,
    pub revenue_unit: String,
    pub source_doc_id: String,
    pub source_format: SourceFormat,
    pub extraction_status: ExtractionStatus,
}

/// Builds records and keeps at most one per `(company_id, fiscal_year)`.
///
/// Records are kept in first-insertion order. When a second record arrives for an
/// occupied key, the one whose source document has the higher [`PrecedenceKey`]
/// takes the slot and the other is dropped.
#[derive(Debug, Default)]
pub struct RecordAssembler {
    records: Vec<(FinancialRecord, PrecedenceKey)>,
    index: HashMap<(String, i32), usize>,
    duplicates_dropped: usize,
}

impl RecordAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the record for one selected document.
    ///
    /// Company name order: English name in the payload, reference table, Japanese
    /// name in the payload, filer name from the catalog, then the EDINET code.
    pub fn assemble(
        doc: &DocumentMetadata,
        extraction: Extraction,
        companies: Option<&CompanyTable>,
    ) -> FinancialRecord {
        let reference = companies.and_then(|table| table.get(&doc.company_id));
        let company_name = extraction
            .filer_name_en
            .clone()
            .or_else(|| reference.and_then(|c| c.display_name()).map(str::to_string))
            .or_else(|| extraction.filer_name_ja.clone())
            .or_else(|| doc.filer_name.clone())
            .unwrap_or_else(|| doc.company_id.clone());

        let (revenue, status) = match (extraction.status, extraction.revenue) {
            (ExtractionStatus::Ok, Some(revenue)) => (Some(revenue), ExtractionStatus::Ok),
            (ExtractionStatus::Ok, None) => {
                tracing::warn!(
                    doc_id = %doc.doc_id,
                    "extraction reported success without a value; recording as failed"
                );
                (None, ExtractionStatus::Failed)
            }
            (status, _) => (None, status),
        };

        FinancialRecord {
            company_id: doc.company_id.clone(),
            company_name,
            industry: reference.and_then(|c| c.industry.clone()),
            fiscal_year: extraction
                .fiscal_year
                .unwrap_or_else(|| doc.period_end.year()),
            period_end: doc.period_end,
            revenue,
            revenue_unit: extraction.revenue_unit,
            source_doc_id: doc.doc_id.clone(),
            source_format: extraction.source_format,
            extraction_status: status,
        }
    }

    /// Assembles and inserts in one step. Returns `false` if the record was dropped
    /// in favor of one already held.
    pub fn add(
        &mut self,
        doc: &DocumentMetadata,
        extraction: Extraction,
        companies: Option<&CompanyTable>,
    ) -> bool {
        let record = Self::assemble(doc, extraction, companies);
        self.insert(record, doc.precedence_key())
    }

    pub fn insert(&mut self, record: FinancialRecord, precedence: PrecedenceKey) -> bool {
        let key = (record.company_id.clone(), record.fiscal_year);
        let Some(&slot) = self.index.get(&key) else {
            self.index.insert(key, self.records.len());
            self.records.push((record, precedence));
            return true;
        };

        self.duplicates_dropped += 1;
        let (held, held_precedence) = &mut self.records[slot];
        if precedence > *held_precedence {
            tracing::info!(
                company_id = %record.company_id,
                fiscal_year = record.fiscal_year,
                kept = %record.source_doc_id,
                dropped = %held.source_doc_id,
                "duplicate company-year; replacing earlier record"
            );
            *held = record;
            *held_precedence = precedence;
            true
        } else {
            tracing::info!(
                company_id = %record.company_id,
                fiscal_year = record.fiscal_year,
                kept = %held.source_doc_id,
                dropped = %record.source_doc_id,
                "duplicate company-year; keeping earlier record"
            );
            false
        }
    }

    pub fn duplicates_dropped(&self) -> usize {
        self.duplicates_dropped
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn finish(self) -> Vec<FinancialRecord> {
        self.records.into_iter().map(|(record, _)| record).collect()
    }
}
