//! Document catalog: the per-day listing of submitted documents.
//!
//! EDINET publishes, for every calendar day, the list of documents submitted that day
//! (`documents.json?type=2`). Each entry carries the filer's EDINET code, the document
//! type code, the covered period and flags telling which encodings can be downloaded.
//!
//! This module implements [`CatalogOperations`] for [`Edinet`]. It:
//! - Requests the listing for one date and follows `resultset.next` tokens until the
//!   service reports no further pages.
//! - Maps error envelopes returned with HTTP 200 onto the client's error kinds.
//! - Converts raw [`CatalogEntry`] records into validated [`DocumentMetadata`], skipping
//!   withdrawn or incomplete entries with a log event.
//!
//! # Examples
//!
//! ```ignore
//! use chrono::NaiveDate;
//! use edinetkit::{CatalogOperations, Edinet};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let edinet = Edinet::new("my-subscription-key")?;
//!     let day = NaiveDate::from_ymd_opt(2024, 6, 25).unwrap();
//!     for doc in edinet.list_documents(day).await? {
//!         println!("{} {} {}", doc.doc_id, doc.company_id, doc.doc_type_code);
//!     }
//!     Ok(())
//! }
//! ```

use super::Edinet;
use super::error::{EdinetError, Result};
use super::traits::CatalogOperations;
use super::transport::ApiRequest;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

const DOCUMENTS_LIST_PATH: &str = "documents.json";

/// Listing type returning metadata together with the document list.
const LIST_TYPE_WITH_RESULTS: &str = "2";

/// Document type codes of amended reports (annual, quarterly, semi-annual).
pub const AMENDMENT_DOC_TYPES: &[&str] = &["130", "150", "170"];

/// Response body of the listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogResponse {
    #[serde(default)]
    pub metadata: Option<CatalogMetadata>,
    #[serde(default)]
    pub results: Vec<CatalogEntry>,
    /// Present on gateway-level errors (e.g. invalid subscription key).
    #[serde(rename = "StatusCode", default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub resultset: Option<ResultSet>,
    #[serde(rename = "processDateTime", default)]
    pub process_date_time: Option<String>,
    pub status: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultSet {
    pub count: u64,
    /// Token for the following page; absent on the last page.
    #[serde(default)]
    pub next: Option<String>,
}

/// One entry of the listing as served, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub seq_number: Option<u64>,
    #[serde(rename = "docID")]
    pub doc_id: Option<String>,
    pub edinet_code: Option<String>,
    pub sec_code: Option<String>,
    pub filer_name: Option<String>,
    pub doc_type_code: Option<String>,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    pub submit_date_time: Option<String>,
    pub doc_description: Option<String>,
    #[serde(rename = "parentDocID")]
    pub parent_doc_id: Option<String>,
    pub withdrawal_status: Option<String>,
    pub xbrl_flag: Option<String>,
    pub csv_flag: Option<String>,
}

/// A validated catalog entry. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DocumentMetadata {
    pub doc_id: String,
    /// EDINET code of the filer, e.g. `E00001`
    pub company_id: String,
    pub doc_type_code: String,
    pub period_end: NaiveDate,
    pub submitted_at: NaiveDateTime,
    pub is_amendment: bool,
    pub has_csv: bool,
    pub has_xbrl: bool,
    pub filer_name: Option<String>,
    pub parent_doc_id: Option<String>,
    pub sec_code: Option<String>,
    pub description: Option<String>,
}

/// Why a listing entry did not become a [`DocumentMetadata`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub doc_id: Option<String>,
    pub reason: &'static str,
}

impl fmt::Display for SkippedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            self.doc_id.as_deref().unwrap_or("<no docID>"),
            self.reason
        )
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn flag(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim) == Some("1")
}

/// Parses `submitDateTime` (`YYYY-MM-DD HH:MM`, seconds optional).
pub fn parse_submitted_at(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

impl TryFrom<CatalogEntry> for DocumentMetadata {
    type Error = SkippedEntry;

    fn try_from(entry: CatalogEntry) -> std::result::Result<Self, SkippedEntry> {
        let doc_id = non_empty(entry.doc_id);
        let skip = |reason| SkippedEntry {
            doc_id: doc_id.clone(),
            reason,
        };

        if entry
            .withdrawal_status
            .as_deref()
            .is_some_and(|s| s.trim() != "0")
        {
            return Err(skip("withdrawn"));
        }
        let Some(id) = doc_id.clone() else {
            return Err(skip("missing docID"));
        };
        let company_id = non_empty(entry.edinet_code).ok_or_else(|| skip("missing edinetCode"))?;
        let doc_type_code =
            non_empty(entry.doc_type_code).ok_or_else(|| skip("missing docTypeCode"))?;
        let period_end = entry
            .period_end
            .as_deref()
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
            .ok_or_else(|| skip("missing or invalid periodEnd"))?;
        let submitted_at = entry
            .submit_date_time
            .as_deref()
            .and_then(parse_submitted_at)
            .ok_or_else(|| skip("missing or invalid submitDateTime"))?;
        let parent_doc_id = non_empty(entry.parent_doc_id);
        let is_amendment =
            parent_doc_id.is_some() || AMENDMENT_DOC_TYPES.contains(&doc_type_code.as_str());

        Ok(DocumentMetadata {
            doc_id: id,
            company_id,
            doc_type_code,
            period_end,
            submitted_at,
            is_amendment,
            has_csv: flag(&entry.csv_flag),
            has_xbrl: flag(&entry.xbrl_flag),
            filer_name: non_empty(entry.filer_name),
            parent_doc_id,
            sec_code: non_empty(entry.sec_code),
            description: non_empty(entry.doc_description),
        })
    }
}

/// Maps an API status code carried inside a response body to an error.
///
/// Returns `None` for success codes.
pub(crate) fn envelope_error(status: u16, message: &str, path: &str) -> Option<EdinetError> {
    match status {
        200..=299 => None,
        401 | 403 => Some(EdinetError::AuthError {
            status,
            message: message.to_string(),
        }),
        404 => Some(EdinetError::NotFound(path.to_string())),
        429 | 500..=599 => Some(EdinetError::TransientNetworkError {
            attempts: 1,
            message: format!("status {status}: {message}"),
        }),
        other => Some(EdinetError::InvalidResponse(format!(
            "API status {other} for {path}: {message}"
        ))),
    }
}

impl CatalogResponse {
    /// Fails if the body is an error envelope rather than a listing.
    pub fn ensure_ok(&self, path: &str) -> Result<()> {
        if let Some(code) = self.status_code {
            let message = self.message.as_deref().unwrap_or_default();
            if let Some(err) = envelope_error(code, message, path) {
                return Err(err);
            }
        }
        match &self.metadata {
            Some(metadata) => {
                let status = metadata.status.trim().parse::<u16>().map_err(|_| {
                    EdinetError::InvalidResponse(format!(
                        "Unreadable status '{}' for {}",
                        metadata.status, path
                    ))
                })?;
                match envelope_error(status, &metadata.message, path) {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            }
            None if self.status_code.is_some() => Ok(()),
            None => Err(EdinetError::InvalidResponse(format!(
                "Listing for {} has no metadata",
                path
            ))),
        }
    }

    fn next_page(&self) -> Option<String> {
        self.metadata
            .as_ref()
            .and_then(|m| m.resultset.as_ref())
            .and_then(|r| r.next.clone())
            .filter(|next| !next.trim().is_empty())
    }
}

/// Returns every date in `start..=end`.
///
/// # Errors
///
/// Returns `EdinetError::ConfigError` when `start` is after `end`.
pub fn dates_between(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
    if start > end {
        return Err(EdinetError::ConfigError(format!(
            "Start date {} is after end date {}",
            start, end
        )));
    }
    Ok(start.iter_days().take_while(|d| *d <= end).collect())
}

/// Converts raw entries, logging each one that is dropped.
pub fn collect_documents(entries: Vec<CatalogEntry>, date: NaiveDate) -> Vec<DocumentMetadata> {
    let total = entries.len();
    let documents: Vec<DocumentMetadata> = entries
        .into_iter()
        .filter_map(|entry| match DocumentMetadata::try_from(entry) {
            Ok(doc) => Some(doc),
            Err(skipped) => {
                tracing::debug!(%date, "skipping catalog entry {}", skipped);
                None
            }
        })
        .collect();

    if documents.len() < total {
        tracing::info!(
            %date,
            kept = documents.len(),
            skipped = total - documents.len(),
            "catalog entries without a usable period, type or timestamp were skipped"
        );
    }
    documents
}

/// Implementation of the catalog fetcher for the EDINET client.
///
/// # Errors
///
/// * `EdinetError::AuthError` - invalid subscription key (HTTP or envelope status)
/// * `EdinetError::JsonError` - the body is not a listing
/// * `EdinetError::InvalidResponse` - a page token repeats
/// * any error surfaced by [`Edinet::call`]
#[async_trait]
impl CatalogOperations for Edinet {
    async fn list_documents(&self, date: NaiveDate) -> Result<Vec<DocumentMetadata>> {
        let date_param = date.format("%Y-%m-%d").to_string();
        let mut documents = Vec::new();
        let mut page: Option<String> = None;
        let mut seen_pages = HashSet::new();

        loop {
            let mut request = ApiRequest::get(DOCUMENTS_LIST_PATH)
                .with_query("date", date_param.clone())
                .with_query("type", LIST_TYPE_WITH_RESULTS);
            if let Some(token) = &page {
                request = request.with_query("page", token.clone());
            }

            let response = self.call(&request).await?;
            let listing: CatalogResponse = serde_json::from_slice(&response.body)?;
            listing.ensure_ok(&request.path)?;

            let next = listing.next_page();
            documents.extend(collect_documents(listing.results, date));

            match next {
                Some(token) => {
                    if !seen_pages.insert(token.clone()) {
                        return Err(EdinetError::InvalidResponse(format!(
                            "Listing for {} repeated page token {}",
                            date_param, token
                        )));
                    }
                    page = Some(token);
                }
                None => break,
            }
        }

        tracing::info!(%date, documents = documents.len(), "catalog fetched");
        Ok(documents)
    }
}
