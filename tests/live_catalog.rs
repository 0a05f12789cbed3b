//! Requires `EDINET_API_KEY`. Run with `cargo test -- --ignored`.

use chrono::NaiveDate;
use edinetkit::{
    CatalogOperations, DocumentOperations, Edinet, EdinetConfig, EdinetError, FilterOptions,
    MetricExtractor, PayloadKind, filter_documents, select_documents,
};

fn api_key() -> String {
    std::env::var("EDINET_API_KEY").expect("EDINET_API_KEY must be set for live tests")
}

fn annual_report_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 27).unwrap()
}

#[tokio::test]
#[ignore]
async fn lists_a_busy_filing_day() {
    let edinet = Edinet::new(&api_key()).unwrap();

    let documents = edinet.list_documents(annual_report_day()).await.unwrap();

    assert!(!documents.is_empty());
    assert!(documents.iter().all(|d| !d.doc_id.is_empty() && !d.company_id.is_empty()));
    let annual = filter_documents(&documents, &FilterOptions::default());
    assert!(annual.iter().any(|d| d.doc_type_code == "120"));
}

#[tokio::test]
#[ignore]
async fn invalid_key_is_rejected() {
    let edinet = Edinet::new("not-a-real-key").unwrap();

    let result = edinet.list_documents(annual_report_day()).await;
    assert!(matches!(result, Err(EdinetError::AuthError { .. })));
}

#[tokio::test]
#[ignore]
async fn downloads_and_reads_one_annual_report() {
    let day = annual_report_day();
    let config = EdinetConfig::new(api_key(), day, day).with_max_companies(1);
    let edinet = Edinet::with_config(&config).unwrap();

    let documents = edinet.list_documents(day).await.unwrap();
    let options = FilterOptions::from_config(&config);
    let selected = select_documents(&filter_documents(&documents, &options));
    let doc = selected
        .iter()
        .find(|d| d.has_csv)
        .expect("at least one annual report with a CSV rendition");

    let payload = edinet.download(&doc.doc_id, PayloadKind::Csv).await.unwrap();
    let extraction = MetricExtractor::from_config(&config).extract(&payload, PayloadKind::Csv);

    assert!(extraction.fiscal_year.is_some());
    assert!(extraction.revenue.is_some() || extraction.detail.is_some());
}
