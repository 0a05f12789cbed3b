//! Retrieve revenue figures from EDINET annual reports into a CSV file.
//!
//! Configuration comes from `EDINET_*` environment variables (a `.env` file is
//! loaded first); command-line flags override them.
//!
//! Run with: `edinet-revenue --start 2024-06-01 --end 2024-06-30 --output out/revenue.csv`

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use edinetkit::{CompanyTable, CsvSink, Edinet, EdinetConfig, Pipeline};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

#[derive(Debug, Parser)]
#[command(name = "edinet-revenue", version, about)]
struct Args {
    /// First submission date to scan (YYYY-MM-DD). Overrides EDINET_START_DATE.
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last submission date to scan (YYYY-MM-DD). Overrides EDINET_END_DATE.
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Document type codes to keep, comma separated (default: 120,130).
    #[arg(long, value_delimiter = ',')]
    doc_types: Vec<String>,

    /// EDINET codes to keep, comma separated.
    #[arg(long, value_delimiter = ',')]
    companies: Vec<String>,

    /// Keep at most this many companies per day.
    #[arg(long)]
    max_companies: Option<usize>,

    /// EDINET code list CSV used for names and industries.
    #[arg(long, env = "EDINET_CODE_LIST")]
    company_list: Option<PathBuf>,

    /// Restrict to listed, consolidated companies from the code list.
    #[arg(long, requires = "company_list")]
    listed_only: bool,

    /// Output CSV path.
    #[arg(long, default_value = "output/revenue.csv")]
    output: PathBuf,
}

impl Args {
    fn overrides(&self) -> HashMap<&'static str, String> {
        let mut overrides = HashMap::new();
        if let Some(start) = self.start {
            overrides.insert("EDINET_START_DATE", start.to_string());
        }
        if let Some(end) = self.end {
            overrides.insert("EDINET_END_DATE", end.to_string());
        }
        if !self.doc_types.is_empty() {
            overrides.insert("EDINET_DOC_TYPES", self.doc_types.join(","));
        }
        if !self.companies.is_empty() {
            overrides.insert("EDINET_COMPANIES", self.companies.join(","));
        }
        if let Some(max) = self.max_companies {
            overrides.insert("EDINET_MAX_COMPANIES", max.to_string());
        }
        overrides
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let overrides = args.overrides();
    let mut config = EdinetConfig::from_lookup(|key| {
        overrides
            .get(key)
            .cloned()
            .or_else(|| std::env::var(key).ok())
    })
    .context("invalid configuration")?;

    let companies = match &args.company_list {
        Some(path) => Some(
            CompanyTable::from_path(path)
                .with_context(|| format!("failed to read code list {}", path.display()))?,
        ),
        None => None,
    };

    if args.listed_only {
        if let Some(table) = &companies {
            let universe = table.listed_consolidated_ids();
            config.company_allow_list = Some(match config.company_allow_list.take() {
                Some(allowed) => allowed.intersection(&universe).cloned().collect(),
                None => universe,
            });
        }
    }

    let edinet = Edinet::with_config(&config).context("failed to build client")?;
    let mut pipeline = Pipeline::new(edinet, config)?;
    if let Some(table) = companies {
        pipeline = pipeline.with_company_table(table);
    }

    let cancel = pipeline.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; finishing after the current document");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let mut sink = CsvSink::create(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;
    let summary = pipeline.run(&mut sink).await?;

    println!("{}", summary);
    println!("Wrote {} records to {}", sink.written(), args.output.display());
    Ok(())
}
