use std::string::FromUtf8Error;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EdinetError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Credential problem (HTTP 401/403). Never retried and fatal for a run.
    #[error("Authentication failed ({status}): {message}")]
    AuthError { status: u16, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    #[error("Transient network error after {attempts} attempts: {message}")]
    TransientNetworkError { attempts: u32, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("XML parsing error: {0}")]
    XmlError(String),

    #[error("Archive error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] FromUtf8Error),
}

impl EdinetError {
    /// Errors that abort a whole run instead of a single document or date.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EdinetError::AuthError { .. } | EdinetError::ConfigError(_)
        )
    }

    /// Errors left over after the client exhausted its retries.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EdinetError::RateLimitExceeded { .. } | EdinetError::TransientNetworkError { .. }
        )
    }
}

impl From<quick_xml::Error> for EdinetError {
    fn from(error: quick_xml::Error) -> Self {
        EdinetError::XmlError(error.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for EdinetError {
    fn from(error: quick_xml::events::attributes::AttrError) -> Self {
        EdinetError::XmlError(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EdinetError>;
