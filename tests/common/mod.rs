#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use edinetkit::{
    ApiRequest, ApiResponse, CatalogOperations, DocumentMetadata, DocumentOperations, Edinet,
    EdinetConfig, EdinetError, PayloadKind, Result, RetryPolicy, Sleeper, Transport,
};
use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub fn fixture_path(relative: impl AsRef<Path>) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn read_fixture(relative: impl AsRef<Path>) -> String {
    fs::read_to_string(fixture_path(relative)).expect("fixture file should be readable")
}

pub fn read_fixture_bytes(relative: impl AsRef<Path>) -> Vec<u8> {
    fs::read(fixture_path(relative)).expect("fixture file should be readable")
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, minute, 0).unwrap()
}

/// Encodes text the way statement exports are shipped: UTF-16LE with a BOM.
pub fn utf16le_with_bom(text: &str) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}

pub fn build_zip(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in files {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A `type=5` package holding one statement export built from a UTF-8 fixture.
pub fn csv_package(fixture: &str) -> Vec<u8> {
    let text = read_fixture(Path::new("statements").join(fixture));
    build_zip(&[(
        "XBRL_TO_CSV/jpcrp030000-asr-001_E00001-000_2024-03-31_01_2024-06-25.csv",
        utf16le_with_bom(&text),
    )])
}

/// A `type=1` package holding one XBRL instance fixture.
pub fn xbrl_package(fixture: &str) -> Vec<u8> {
    build_zip(&[
        (
            "XBRL/PublicDoc/0101010_honbun_jpcrp030000-asr-001.htm",
            b"<html></html>".to_vec(),
        ),
        (
            "XBRL/PublicDoc/jpcrp030000-asr-001_E00002-000_2024-03-31_01_2024-06-25.xbrl",
            read_fixture_bytes(Path::new("statements").join(fixture)),
        ),
    ])
}

pub fn test_config(start: NaiveDate, end: NaiveDate) -> EdinetConfig {
    EdinetConfig::new("test-key", start, end)
        .with_base_url("http://edinet.test/api/v2")
        .with_requests_per_second(1000.0)
        .with_retry(RetryPolicy {
            max_retry_attempts: 3,
            backoff_base: Duration::from_millis(100),
            backoff_max: Duration::from_secs(2),
            jitter: 0.0,
        })
}

/// Replays canned responses in order; an empty script answers 500.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<ApiResponse>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<ApiResponse>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, _base_url: &str, request: &ApiRequest) -> Result<ApiResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ApiResponse::new(500, "script exhausted")))
    }
}

/// Records requested waits instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

pub fn scripted_edinet(
    responses: Vec<Result<ApiResponse>>,
) -> (Edinet, Arc<ScriptedTransport>, Arc<RecordingSleeper>) {
    let transport = ScriptedTransport::new(responses);
    let sleeper = Arc::new(RecordingSleeper::default());
    let config = test_config(day(2024, 6, 25), day(2024, 6, 25));
    let edinet = Edinet::with_transport(&config, transport.clone(), sleeper.clone()).unwrap();
    (edinet, transport, sleeper)
}

pub fn json_response(body: String) -> Result<ApiResponse> {
    Ok(ApiResponse::new(200, body).with_content_type("application/json; charset=utf-8"))
}

pub fn zip_response(body: Vec<u8>) -> Result<ApiResponse> {
    Ok(ApiResponse::new(200, body).with_content_type("application/octet-stream"))
}

pub fn document(doc_id: &str, company_id: &str, submitted_at: NaiveDateTime) -> DocumentMetadata {
    DocumentMetadata {
        doc_id: doc_id.to_string(),
        company_id: company_id.to_string(),
        doc_type_code: "120".to_string(),
        period_end: day(2024, 3, 31),
        submitted_at,
        is_amendment: false,
        has_csv: true,
        has_xbrl: true,
        filer_name: None,
        parent_doc_id: None,
        sec_code: None,
        description: None,
    }
}

pub fn amendment(mut doc: DocumentMetadata, parent: &str) -> DocumentMetadata {
    doc.doc_type_code = "130".to_string();
    doc.is_amendment = true;
    doc.parent_doc_id = Some(parent.to_string());
    doc
}

/// Catalog and payloads served from memory.
#[derive(Debug, Default)]
pub struct InMemorySource {
    pub catalogs: HashMap<NaiveDate, std::result::Result<Vec<DocumentMetadata>, String>>,
    pub payloads: HashMap<(String, PayloadKind), Vec<u8>>,
    pub auth_failure: bool,
    pub downloads: Mutex<Vec<(String, PayloadKind)>>,
}

impl InMemorySource {
    pub fn with_catalog(mut self, date: NaiveDate, documents: Vec<DocumentMetadata>) -> Self {
        self.catalogs.insert(date, Ok(documents));
        self
    }

    pub fn with_failing_catalog(mut self, date: NaiveDate, message: &str) -> Self {
        self.catalogs.insert(date, Err(message.to_string()));
        self
    }

    pub fn with_payload(mut self, doc_id: &str, kind: PayloadKind, payload: Vec<u8>) -> Self {
        self.payloads.insert((doc_id.to_string(), kind), payload);
        self
    }

    pub fn downloads(&self) -> Vec<(String, PayloadKind)> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogOperations for InMemorySource {
    async fn list_documents(&self, date: NaiveDate) -> Result<Vec<DocumentMetadata>> {
        if self.auth_failure {
            return Err(EdinetError::AuthError {
                status: 401,
                message: "invalid subscription key".to_string(),
            });
        }
        match self.catalogs.get(&date) {
            Some(Ok(documents)) => Ok(documents.clone()),
            Some(Err(message)) => Err(EdinetError::TransientNetworkError {
                attempts: 4,
                message: message.clone(),
            }),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl DocumentOperations for InMemorySource {
    async fn download(&self, doc_id: &str, kind: PayloadKind) -> Result<Vec<u8>> {
        self.downloads
            .lock()
            .unwrap()
            .push((doc_id.to_string(), kind));
        self.payloads
            .get(&(doc_id.to_string(), kind))
            .cloned()
            .ok_or_else(|| EdinetError::NotFound(format!("documents/{}", doc_id)))
    }
}
