//! Document payload retrieval.
//!
//! `GET documents/{docID}?type=N` returns a zip archive. The service answers with a
//! JSON status document instead when the request cannot be served, sometimes with
//! HTTP 200, so every body is checked before it is handed to the extractor.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use super::Edinet;
use super::catalog::{CatalogResponse, DocumentMetadata};
use super::error::{EdinetError, Result};
use super::traits::DocumentOperations;
use super::transport::ApiRequest;

/// Encoding of a document payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PayloadKind {
    /// Zip of UTF-16 tab-separated statements (`type=5`)
    Csv,
    /// Zip of the XBRL submission package (`type=1`)
    Xbrl,
}

impl PayloadKind {
    /// Value of the `type` query parameter.
    pub fn api_type(self) -> &'static str {
        match self {
            PayloadKind::Csv => "5",
            PayloadKind::Xbrl => "1",
        }
    }

    /// CSV when the document offers it, else XBRL, else nothing to download.
    pub fn preferred_for(doc: &DocumentMetadata) -> Option<Self> {
        if doc.has_csv {
            Some(PayloadKind::Csv)
        } else if doc.has_xbrl {
            Some(PayloadKind::Xbrl)
        } else {
            None
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadKind::Csv => write!(f, "csv"),
            PayloadKind::Xbrl => write!(f, "xbrl"),
        }
    }
}

fn document_path(doc_id: &str) -> String {
    format!("documents/{}", doc_id)
}

#[async_trait]
impl DocumentOperations for Edinet {
    async fn download(&self, doc_id: &str, kind: PayloadKind) -> Result<Vec<u8>> {
        let request = ApiRequest::get(document_path(doc_id)).with_query("type", kind.api_type());
        let response = self.call(&request).await?;

        if response.is_json() {
            let envelope: CatalogResponse = serde_json::from_slice(&response.body)?;
            envelope.ensure_ok(&request.path)?;
            return Err(EdinetError::InvalidResponse(format!(
                "Expected a {} archive for {}, got a status document: {}",
                kind,
                doc_id,
                response.preview()
            )));
        }
        if response.body.is_empty() {
            return Err(EdinetError::InvalidResponse(format!(
                "Empty {} payload for {}",
                kind, doc_id
            )));
        }

        tracing::debug!(doc_id, kind = %kind, bytes = response.body.len(), "document downloaded");
        Ok(response.body)
    }
}
