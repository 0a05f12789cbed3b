//! End-to-end retrieval run.
//!
//! For every date in the configured range, in ascending order:
//!
//! ```text
//! catalog ──▶ filter ──▶ select ──▶ download ──▶ extract ──▶ assemble
//! ```
//!
//! Failures are scoped as narrowly as possible. A date whose catalog cannot be
//! fetched is recorded in [`RunSummary::failed_dates`] and skipped; a document whose
//! payload cannot be fetched or read becomes a `Failed` record. Only fatal errors
//! (authentication, configuration) and sink errors end the run early.

use chrono::NaiveDate;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::assembler::RecordAssembler;
use super::catalog::{DocumentMetadata, dates_between};
use super::config::EdinetConfig;
use super::download::PayloadKind;
use super::error::Result;
use super::extract::{Extraction, ExtractionStatus, MetricExtractor, SourceFormat};
use super::filter::filter_documents;
use super::options::FilterOptions;
use super::reference::CompanyTable;
use super::selector::select_documents;
use super::sink::RecordSink;
use super::traits::{CatalogOperations, DocumentOperations};

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub dates_processed: usize,
    pub failed_dates: Vec<NaiveDate>,
    pub documents_selected: usize,
    pub ok: usize,
    pub partial: usize,
    pub failed: usize,
    pub duplicates_dropped: usize,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn records(&self) -> usize {
        self.ok + self.partial + self.failed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dates processed: {}, dates failed: {}, documents selected: {}, records: {} (ok {}, partial {}, failed {}), duplicates dropped: {}",
            self.dates_processed,
            self.failed_dates.len(),
            self.documents_selected,
            self.records(),
            self.ok,
            self.partial,
            self.failed,
            self.duplicates_dropped
        )?;
        if self.cancelled {
            write!(f, " [cancelled]")?;
        }
        Ok(())
    }
}

/// Sequential retrieval pipeline over any catalog and document source.
pub struct Pipeline<S> {
    source: S,
    config: EdinetConfig,
    filter: FilterOptions,
    extractor: MetricExtractor,
    companies: Option<CompanyTable>,
    cancel: Arc<AtomicBool>,
}

impl<S> Pipeline<S>
where
    S: CatalogOperations + DocumentOperations,
{
    /// # Errors
    ///
    /// Returns `EdinetError::ConfigError` if the configuration does not validate.
    pub fn new(source: S, config: EdinetConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            filter: FilterOptions::from_config(&config),
            extractor: MetricExtractor::from_config(&config),
            config,
            companies: None,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Attaches the company reference table used for names and industries.
    pub fn with_company_table(mut self, companies: CompanyTable) -> Self {
        self.companies = Some(companies);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Flag that stops the run before the next download when set.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Runs the whole date range and writes the surviving records to `sink`.
    ///
    /// Records assembled before a fatal error or a cancellation are still written.
    pub async fn run(&self, sink: &mut dyn RecordSink) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let mut assembler = RecordAssembler::new();

        let outcome = self.collect(&mut assembler, &mut summary).await;

        summary.duplicates_dropped = assembler.duplicates_dropped();
        for record in assembler.finish() {
            match record.extraction_status {
                ExtractionStatus::Ok => summary.ok += 1,
                ExtractionStatus::Partial => summary.partial += 1,
                ExtractionStatus::Failed => summary.failed += 1,
            }
            sink.write(&record)?;
        }
        sink.finish()?;

        outcome?;
        tracing::info!(%summary, "run finished");
        Ok(summary)
    }

    async fn collect(&self, assembler: &mut RecordAssembler, summary: &mut RunSummary) -> Result<()> {
        for date in dates_between(self.config.start_date, self.config.end_date)? {
            if self.is_cancelled() {
                summary.cancelled = true;
                return Ok(());
            }

            let catalog = match self.source.list_documents(date).await {
                Ok(catalog) => catalog,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::error!(%date, error = %e, "catalog fetch failed; skipping date");
                    summary.failed_dates.push(date);
                    continue;
                }
            };
            summary.dates_processed += 1;

            let selected = select_documents(&filter_documents(&catalog, &self.filter));
            summary.documents_selected += selected.len();
            tracing::info!(
                %date,
                catalog = catalog.len(),
                selected = selected.len(),
                "processing date"
            );

            for doc in &selected {
                if self.is_cancelled() {
                    tracing::warn!(%date, doc_id = %doc.doc_id, "run cancelled");
                    summary.cancelled = true;
                    return Ok(());
                }
                let extraction = self.process(doc).await?;
                if extraction.status != ExtractionStatus::Ok {
                    tracing::warn!(
                        doc_id = %doc.doc_id,
                        company_id = %doc.company_id,
                        status = %extraction.status,
                        detail = extraction.detail.as_deref().unwrap_or_default(),
                        "revenue not extracted"
                    );
                }
                assembler.add(doc, extraction, self.companies.as_ref());
            }
        }
        Ok(())
    }

    /// Downloads and reads one document. Errors only when they are fatal.
    async fn process(&self, doc: &DocumentMetadata) -> Result<Extraction> {
        let Some(kind) = PayloadKind::preferred_for(doc) else {
            return Ok(Extraction::failed(
                SourceFormat::Tabular,
                "document offers neither CSV nor XBRL",
            ));
        };

        let extraction = self.fetch_and_extract(doc, kind).await?;
        if kind == PayloadKind::Csv && extraction.status == ExtractionStatus::Failed && doc.has_xbrl {
            tracing::debug!(doc_id = %doc.doc_id, "no revenue in CSV; trying XBRL package");
            let tagged = self.fetch_and_extract(doc, PayloadKind::Xbrl).await?;
            if tagged.status != ExtractionStatus::Failed {
                return Ok(tagged);
            }
        }
        Ok(extraction)
    }

    async fn fetch_and_extract(&self, doc: &DocumentMetadata, kind: PayloadKind) -> Result<Extraction> {
        match self.source.download(&doc.doc_id, kind).await {
            Ok(payload) => Ok(self.extractor.extract(&payload, kind)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                tracing::warn!(doc_id = %doc.doc_id, kind = %kind, error = %e, "download failed");
                Ok(Extraction::failed(kind.into(), format!("download failed: {}", e)))
            }
        }
    }
}
