use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::time::Duration;

use super::error::{EdinetError, Result};

/// Base URL of the EDINET v2 API.
pub const DEFAULT_BASE_URL: &str = "https://api.edinet-fsa.go.jp/api/v2";

/// Annual securities report and its amended form.
pub const DEFAULT_DOC_TYPES: &[&str] = &["120", "130"];

/// Tabular labels tried in order. Element ids and Japanese item names are both accepted.
pub const DEFAULT_REVENUE_LABELS: &[&str] = &[
    "jpcrp_cor:NetSalesSummaryOfBusinessResults",
    "jpcrp_cor:RevenueIFRSSummaryOfBusinessResults",
    "jpcrp_cor:OperatingRevenue1SummaryOfBusinessResults",
    "jpcrp_cor:NetSales",
    "jpcrp_cor:Revenue",
    "jpcrp_cor:OperatingRevenue",
    "jppfs_cor:NetSales",
    "jppfs_cor:OperatingRevenue1",
    "jpigp_cor:RevenueIFRS",
    "売上高",
    "売上収益",
    "営業収益",
];

/// Concept tags tried in order when walking a tagged report.
pub const DEFAULT_REVENUE_TAGS: &[&str] = &[
    "jpcrp_cor:NetSalesSummaryOfBusinessResults",
    "jpcrp_cor:RevenueIFRSSummaryOfBusinessResults",
    "jpcrp_cor:OperatingRevenue1SummaryOfBusinessResults",
    "jppfs_cor:NetSales",
    "jppfs_cor:OperatingRevenue1",
    "jppfs_cor:Revenue",
    "jpigp_cor:RevenueIFRS",
    "jpigp_cor:NetSalesIFRS",
];

/// Retry and backoff settings for the rate-limited client.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Total attempts = `max_retry_attempts + 1`.
    pub max_retry_attempts: u32,
    /// Delay before the first retry; doubled for every further retry.
    pub backoff_base: Duration,
    /// Upper bound for a single wait, including server-provided `Retry-After`.
    pub backoff_max: Duration,
    /// Relative jitter applied to computed delays (0.2 = ±10%).
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_attempts: 5,
            backoff_base: Duration::from_millis(1000),
            backoff_max: Duration::from_secs(60),
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Computes the wait before retry `retry` (0-based): `base × 2^retry`, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry);
        let backoff = self
            .backoff_base
            .checked_mul(factor)
            .unwrap_or(self.backoff_max)
            .min(self.backoff_max);
        if self.jitter <= 0.0 {
            return backoff;
        }
        let jitter = backoff.as_secs_f64() * self.jitter * (fastrand::f64() - 0.5);
        Duration::from_secs_f64((backoff.as_secs_f64() + jitter).max(0.0)).min(self.backoff_max)
    }
}

/// Validated, immutable configuration for a retrieval run.
///
/// Built once at startup and handed to [`Edinet`](crate::Edinet) and
/// [`Pipeline`](crate::Pipeline). Nothing in the crate reads the environment
/// after construction.
#[derive(Debug, Clone)]
pub struct EdinetConfig {
    /// Subscription key sent as the `Subscription-Key` query parameter
    pub api_key: String,
    /// Base URL of the document API
    pub base_url: String,
    /// HTTP request timeout
    pub timeout: Duration,
    /// Document type codes to keep (e.g. "120" annual report)
    pub target_doc_types: BTreeSet<String>,
    /// First submission date to list (inclusive)
    pub start_date: NaiveDate,
    /// Last submission date to list (inclusive)
    pub end_date: NaiveDate,
    /// Optional company (EDINET code) allow-list
    pub company_allow_list: Option<BTreeSet<String>>,
    /// Optional cap on distinct companies per catalog
    pub max_companies: Option<usize>,
    /// Pacing ceiling in requests per second; fractional values are allowed
    pub requests_per_second: f64,
    /// Retry and backoff settings
    pub retry: RetryPolicy,
    /// Tabular labels matched to revenue, highest priority first
    pub revenue_field_labels: Vec<String>,
    /// Tagged-report concept tags matched to revenue, highest priority first
    pub revenue_concept_tags: Vec<String>,
}

impl EdinetConfig {
    /// Creates a configuration with defaults for everything except the key and date range.
    ///
    /// ```rust
    /// use chrono::NaiveDate;
    /// use edinetkit::EdinetConfig;
    ///
    /// let day = NaiveDate::from_ymd_opt(2024, 6, 25).unwrap();
    /// let config = EdinetConfig::new("my-key", day, day).with_max_companies(10);
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn new(api_key: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
            target_doc_types: DEFAULT_DOC_TYPES.iter().map(|s| s.to_string()).collect(),
            start_date,
            end_date,
            company_allow_list: None,
            max_companies: None,
            requests_per_second: 1.0,
            retry: RetryPolicy::default(),
            revenue_field_labels: DEFAULT_REVENUE_LABELS.iter().map(|s| s.to_string()).collect(),
            revenue_concept_tags: DEFAULT_REVENUE_TAGS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_doc_types<I, S>(mut self, doc_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_doc_types = doc_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_companies<I, S>(mut self, companies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.company_allow_list = Some(companies.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_max_companies(mut self, max_companies: usize) -> Self {
        self.max_companies = Some(max_companies);
        self
    }

    pub fn with_requests_per_second(mut self, requests_per_second: f64) -> Self {
        self.requests_per_second = requests_per_second;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_revenue_labels(mut self, labels: Vec<String>) -> Self {
        self.revenue_field_labels = labels;
        self
    }

    pub fn with_revenue_tags(mut self, tags: Vec<String>) -> Self {
        self.revenue_concept_tags = tags;
        self
    }

    /// Checks the invariants every component relies on.
    ///
    /// # Errors
    ///
    /// Returns `EdinetError::ConfigError` for an empty API key or base URL, a
    /// non-positive request rate, an inverted date range, an empty doc type
    /// set, or empty label and tag sets.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(EdinetError::ConfigError("API key must not be empty".to_string()));
        }
        if self.base_url.trim().is_empty() {
            return Err(EdinetError::ConfigError("Base URL must not be empty".to_string()));
        }
        if !self.requests_per_second.is_finite() || self.requests_per_second <= 0.0 {
            return Err(EdinetError::ConfigError(format!(
                "Request rate must be a positive number, got {}",
                self.requests_per_second
            )));
        }
        if self.start_date > self.end_date {
            return Err(EdinetError::ConfigError(format!(
                "Start date {} is after end date {}",
                self.start_date, self.end_date
            )));
        }
        if self.target_doc_types.is_empty() {
            return Err(EdinetError::ConfigError(
                "At least one target document type is required".to_string(),
            ));
        }
        if self.revenue_field_labels.is_empty() && self.revenue_concept_tags.is_empty() {
            return Err(EdinetError::ConfigError(
                "Revenue labels and concept tags cannot both be empty".to_string(),
            ));
        }
        if self.retry.backoff_base > self.retry.backoff_max {
            return Err(EdinetError::ConfigError(
                "Backoff base delay exceeds the maximum delay".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(EdinetError::ConfigError(
                "Backoff jitter must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds a validated configuration from `EDINET_*` environment variables.
    ///
    /// Required: `EDINET_API_KEY`, `EDINET_START_DATE`, `EDINET_END_DATE`
    /// (`YYYY-MM-DD`). Optional: `EDINET_BASE_URL`, `EDINET_DOC_TYPES`,
    /// `EDINET_COMPANIES`, `EDINET_MAX_COMPANIES`, `EDINET_REQUESTS_PER_SECOND`,
    /// `EDINET_MAX_RETRIES`, `EDINET_BACKOFF_BASE_MS`, `EDINET_BACKOFF_MAX_MS`,
    /// `EDINET_TIMEOUT_SECS`, `EDINET_REVENUE_LABELS`, `EDINET_REVENUE_TAGS`.
    /// Lists are comma separated.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| EdinetError::ConfigError(format!("{key} is not set")))
        };
        let date = |key: &str| -> Result<NaiveDate> {
            let raw = required(key)?;
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|e| EdinetError::ConfigError(format!("{key}: {e}")))
        };

        let mut config = Self::new(
            required("EDINET_API_KEY")?,
            date("EDINET_START_DATE")?,
            date("EDINET_END_DATE")?,
        );

        if let Some(url) = lookup("EDINET_BASE_URL") {
            config.base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(types) = lookup("EDINET_DOC_TYPES") {
            config.target_doc_types = split_list(&types).collect();
        }
        if let Some(companies) = lookup("EDINET_COMPANIES") {
            let companies: BTreeSet<String> = split_list(&companies).collect();
            if !companies.is_empty() {
                config.company_allow_list = Some(companies);
            }
        }
        if let Some(max) = lookup("EDINET_MAX_COMPANIES") {
            config.max_companies = Some(parse_var("EDINET_MAX_COMPANIES", &max)?);
        }
        if let Some(rps) = lookup("EDINET_REQUESTS_PER_SECOND") {
            config.requests_per_second = parse_var("EDINET_REQUESTS_PER_SECOND", &rps)?;
        }
        if let Some(retries) = lookup("EDINET_MAX_RETRIES") {
            config.retry.max_retry_attempts = parse_var("EDINET_MAX_RETRIES", &retries)?;
        }
        if let Some(ms) = lookup("EDINET_BACKOFF_BASE_MS") {
            config.retry.backoff_base =
                Duration::from_millis(parse_var("EDINET_BACKOFF_BASE_MS", &ms)?);
        }
        if let Some(ms) = lookup("EDINET_BACKOFF_MAX_MS") {
            config.retry.backoff_max = Duration::from_millis(parse_var("EDINET_BACKOFF_MAX_MS", &ms)?);
        }
        if let Some(secs) = lookup("EDINET_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(parse_var("EDINET_TIMEOUT_SECS", &secs)?);
        }
        if let Some(labels) = lookup("EDINET_REVENUE_LABELS") {
            config.revenue_field_labels = split_list(&labels).collect();
        }
        if let Some(tags) = lookup("EDINET_REVENUE_TAGS") {
            config.revenue_concept_tags = split_list(&tags).collect();
        }

        config.validate()?;
        Ok(config)
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| EdinetError::ConfigError(format!("{key}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retry_attempts: 10,
            backoff_base: Duration::from_millis(100),
            backoff_max: Duration::from_millis(500),
            jitter: 0.0,
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(3), Duration::from_millis(500));
        assert_eq!(policy.backoff(40), Duration::from_millis(500));
    }

    #[test]
    fn test_backoff_jitter_range() {
        let policy = RetryPolicy::default();
        let backoff0 = policy.backoff(0);
        let backoff2 = policy.backoff(2);

        assert!(backoff0.as_millis() >= 900 && backoff0.as_millis() <= 1100);
        assert!(backoff2.as_millis() >= 3600 && backoff2.as_millis() <= 4400);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let base = EdinetConfig::new("key", day(2024, 6, 1), day(2024, 6, 30));
        assert!(base.validate().is_ok());

        let empty_key = EdinetConfig::new(" ", day(2024, 6, 1), day(2024, 6, 30));
        assert!(matches!(empty_key.validate(), Err(EdinetError::ConfigError(_))));

        let inverted = EdinetConfig::new("key", day(2024, 7, 1), day(2024, 6, 30));
        assert!(matches!(inverted.validate(), Err(EdinetError::ConfigError(_))));

        let zero_rate = base.clone().with_requests_per_second(0.0);
        assert!(matches!(zero_rate.validate(), Err(EdinetError::ConfigError(_))));

        let no_types = base.clone().with_doc_types(Vec::<String>::new());
        assert!(matches!(no_types.validate(), Err(EdinetError::ConfigError(_))));

        let no_fields = base.with_revenue_labels(vec![]).with_revenue_tags(vec![]);
        assert!(matches!(no_fields.validate(), Err(EdinetError::ConfigError(_))));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("EDINET_API_KEY", "secret"),
            ("EDINET_START_DATE", "2024-06-20"),
            ("EDINET_END_DATE", "2024-06-28"),
            ("EDINET_DOC_TYPES", "120, 130 ,"),
            ("EDINET_COMPANIES", "E00001,E00002"),
            ("EDINET_MAX_COMPANIES", "5"),
            ("EDINET_REQUESTS_PER_SECOND", "0.5"),
            ("EDINET_MAX_RETRIES", "3"),
            ("EDINET_BACKOFF_BASE_MS", "250"),
            ("EDINET_BASE_URL", "http://localhost:8080/api/v2/"),
        ]);
        let config = EdinetConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.api_key, "secret");
        assert_eq!(config.start_date, day(2024, 6, 20));
        assert_eq!(config.end_date, day(2024, 6, 28));
        assert_eq!(
            config.target_doc_types,
            BTreeSet::from(["120".to_string(), "130".to_string()])
        );
        assert_eq!(config.company_allow_list.as_ref().map(|c| c.len()), Some(2));
        assert_eq!(config.max_companies, Some(5));
        assert_eq!(config.requests_per_second, 0.5);
        assert_eq!(config.retry.max_retry_attempts, 3);
        assert_eq!(config.retry.backoff_base, Duration::from_millis(250));
        assert_eq!(config.base_url, "http://localhost:8080/api/v2");
    }

    #[test]
    fn test_from_lookup_missing_key() {
        let result = EdinetConfig::from_lookup(|_| None);
        assert!(matches!(result, Err(EdinetError::ConfigError(msg)) if msg.contains("EDINET_API_KEY")));
    }

    #[test]
    fn test_from_lookup_bad_number() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("EDINET_API_KEY", "secret"),
            ("EDINET_START_DATE", "2024-06-20"),
            ("EDINET_END_DATE", "2024-06-28"),
            ("EDINET_MAX_RETRIES", "many"),
        ]);
        let result = EdinetConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert!(matches!(result, Err(EdinetError::ConfigError(msg)) if msg.contains("EDINET_MAX_RETRIES")));
    }
}
