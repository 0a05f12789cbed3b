//! # EdinetKit - revenue retrieval from the EDINET disclosure system
//!
//! EdinetKit fetches annual securities reports from the document API of EDINET,
//! the electronic disclosure system run by Japan's Financial Services Agency, and
//! turns them into one normalized revenue record per company and fiscal year.
//!
//! ## Features
//!
//! - **Rate-limited HTTP client** - paced with a token bucket, bounded retries with
//!   exponential backoff, honoring `Retry-After`
//! - **Catalog operations** - per-day document listings with pagination
//! - **Selection** - one authoritative document per company and period, amendments
//!   and re-submissions resolved by a single precedence rule
//! - **Extraction** - revenue from the tab-separated statement exports or the XBRL
//!   instance, with label priority and consolidated figures preferred
//! - **Reference data** - the EDINET code list for English names and industries
//!
//! ## Requirements
//!
//! EdinetKit is async and expects a [tokio](https://tokio.rs) runtime. A subscription
//! key for the EDINET API v2 is required.
//!
//! ## Basic Usage
//!
//! ```ignore
//! use chrono::NaiveDate;
//! use edinetkit::{Edinet, EdinetConfig, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let day = NaiveDate::from_ymd_opt(2024, 6, 25).unwrap();
//!     let config = EdinetConfig::new("my-subscription-key", day, day).with_max_companies(5);
//!
//!     let edinet = Edinet::with_config(&config)?;
//!     let pipeline = Pipeline::new(edinet, config)?;
//!
//!     let mut records = Vec::new();
//!     let summary = pipeline.run(&mut records).await?;
//!     println!("{summary}");
//!     for record in records {
//!         println!("{} {} {:?}", record.company_name, record.fiscal_year, record.revenue);
//!     }
//!     Ok(())
//! }
//! ```

mod assembler;
mod catalog;
mod config;
mod core;
mod download;
mod error;
mod extract;
mod filter;
mod options;
pub mod parsing;
mod pipeline;
mod reference;
mod selector;
mod sink;
mod traits;
mod transport;

pub use assembler::{FinancialRecord, RecordAssembler};
pub use catalog::{
    AMENDMENT_DOC_TYPES, CatalogEntry, CatalogMetadata, CatalogResponse, DocumentMetadata,
    ResultSet, SkippedEntry, dates_between,
};
pub use config::{
    DEFAULT_BASE_URL, DEFAULT_DOC_TYPES, DEFAULT_REVENUE_LABELS, DEFAULT_REVENUE_TAGS,
    EdinetConfig, RetryPolicy,
};
pub use core::Edinet;
pub use download::PayloadKind;
pub use error::{EdinetError, Result};
pub use extract::{Extraction, ExtractionStatus, MetricExtractor, SourceFormat};
pub use filter::filter_documents;
pub use options::FilterOptions;
pub use parsing::{Statement, parse_payload};
pub use pipeline::{Pipeline, RunSummary};
pub use reference::{CompanyInfo, CompanyTable};
pub use selector::{CandidateGroup, PrecedenceKey, group_candidates, select_documents};
pub use sink::{CsvSink, RecordSink};
pub use traits::{CatalogOperations, DocumentOperations};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Sleeper, TokioSleeper, Transport};

/// Current crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
