//! Choosing the authoritative document per company and reporting period.
//!
//! A company may submit several documents for one period: the original annual
//! report, one or more amendments, sometimes a re-submission. After filtering, the
//! documents are grouped by `(company_id, period_end)` and one winner per group is
//! picked by [`PrecedenceKey`]:
//!
//! 1. latest `submitted_at`
//! 2. amendment over original
//! 3. CSV available over not
//! 4. lexicographically lowest `doc_id`
//!
//! The same key settles collisions in the record assembler.

use chrono::{NaiveDate, NaiveDateTime};
use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;

use super::catalog::DocumentMetadata;

/// Ordering of documents competing for the same slot; greater wins.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PrecedenceKey {
    submitted_at: NaiveDateTime,
    is_amendment: bool,
    has_csv: bool,
    doc_id: Reverse<String>,
}

impl PrecedenceKey {
    pub fn of(doc: &DocumentMetadata) -> Self {
        Self {
            submitted_at: doc.submitted_at,
            is_amendment: doc.is_amendment,
            has_csv: doc.has_csv,
            doc_id: Reverse(doc.doc_id.clone()),
        }
    }
}

impl DocumentMetadata {
    pub fn precedence_key(&self) -> PrecedenceKey {
        PrecedenceKey::of(self)
    }

    /// Compares two documents by precedence. `Greater` means `self` wins.
    pub fn precedence_cmp(&self, other: &Self) -> Ordering {
        self.precedence_key().cmp(&other.precedence_key())
    }
}

/// All filtered documents of one company for one period end. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateGroup {
    pub company_id: String,
    pub period_end: NaiveDate,
    pub documents: Vec<DocumentMetadata>,
}

impl CandidateGroup {
    /// The highest-precedence document of the group.
    pub fn winner(&self) -> Option<&DocumentMetadata> {
        self.documents.iter().max_by(|a, b| a.precedence_cmp(b))
    }
}

/// Groups documents by `(company_id, period_end)`, in order of first appearance.
pub fn group_candidates(documents: &[DocumentMetadata]) -> Vec<CandidateGroup> {
    let mut index: HashMap<(&str, NaiveDate), usize> = HashMap::new();
    let mut groups: Vec<CandidateGroup> = Vec::new();

    for doc in documents {
        let key = (doc.company_id.as_str(), doc.period_end);
        match index.get(&key) {
            Some(&slot) => groups[slot].documents.push(doc.clone()),
            None => {
                index.insert(key, groups.len());
                groups.push(CandidateGroup {
                    company_id: doc.company_id.clone(),
                    period_end: doc.period_end,
                    documents: vec![doc.clone()],
                });
            }
        }
    }
    groups
}

/// Picks exactly one document per `(company_id, period_end)` group.
///
/// Deterministic for a given input: groups come out in order of first appearance,
/// and the precedence rule has no ties because `doc_id` is unique.
pub fn select_documents(documents: &[DocumentMetadata]) -> Vec<DocumentMetadata> {
    group_candidates(documents)
        .iter()
        .filter_map(|group| {
            let winner = group.winner()?;
            if group.documents.len() > 1 {
                tracing::debug!(
                    company_id = %group.company_id,
                    period_end = %group.period_end,
                    candidates = group.documents.len(),
                    selected = %winner.doc_id,
                    "selected one of several candidates"
                );
            }
            Some(winner.clone())
        })
        .collect()
}
