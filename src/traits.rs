//! Trait definitions for the two remote operations the pipeline depends on.
//!
//! [`Edinet`](crate::Edinet) implements both. The [`Pipeline`](crate::Pipeline) is
//! generic over them, so a run can be driven by an in-memory source in tests or by a
//! cached mirror of the API.

use super::catalog::DocumentMetadata;
use super::download::PayloadKind;
use super::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Listing of submitted documents.
#[async_trait]
pub trait CatalogOperations {
    /// Retrieves every document submitted on `date`, in service order, across all pages.
    async fn list_documents(&self, date: NaiveDate) -> Result<Vec<DocumentMetadata>>;
}

/// Retrieval of document payloads.
#[async_trait]
pub trait DocumentOperations {
    /// Downloads the raw payload (usually a zip archive) of one document.
    async fn download(&self, doc_id: &str, kind: PayloadKind) -> Result<Vec<u8>>;
}
