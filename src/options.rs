use std::collections::BTreeSet;

use super::config::{DEFAULT_DOC_TYPES, EdinetConfig};

/// Options for narrowing a catalog down to relevant documents
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOptions {
    pub doc_types: BTreeSet<String>,
    /// When set, only these EDINET codes are kept.
    pub companies: Option<BTreeSet<String>>,
    /// Caps the number of distinct companies kept, by first appearance.
    pub max_companies: Option<usize>,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            doc_types: DEFAULT_DOC_TYPES.iter().map(|s| s.to_string()).collect(),
            companies: None,
            max_companies: None,
        }
    }
}

impl FilterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &EdinetConfig) -> Self {
        Self {
            doc_types: config.target_doc_types.clone(),
            companies: config.company_allow_list.clone(),
            max_companies: config.max_companies,
        }
    }

    pub fn with_doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_types = BTreeSet::from([doc_type.into()]);
        self
    }

    pub fn with_doc_types<I, S>(mut self, doc_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.doc_types = doc_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_company(mut self, company_id: impl Into<String>) -> Self {
        self.companies
            .get_or_insert_with(BTreeSet::new)
            .insert(company_id.into());
        self
    }

    pub fn with_companies<I, S>(mut self, companies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.companies = Some(companies.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_max_companies(mut self, max_companies: usize) -> Self {
        self.max_companies = Some(max_companies);
        self
    }
}
