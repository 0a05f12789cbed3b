//! Narrowing a catalog to the documents a run cares about.

use std::collections::HashSet;

use super::catalog::DocumentMetadata;
use super::options::FilterOptions;

/// Keeps documents of a target type from allowed companies.
///
/// The result preserves catalog order and is always a subset of the input. With
/// `max_companies = N`, only the first `N` distinct companies (by first appearance
/// after type and allow-list filtering) survive, together with all of their
/// matching documents.
pub fn filter_documents(
    catalog: &[DocumentMetadata],
    options: &FilterOptions,
) -> Vec<DocumentMetadata> {
    let mut admitted: HashSet<&str> = HashSet::new();
    let mut kept = Vec::new();

    for doc in catalog {
        if !options.doc_types.contains(&doc.doc_type_code) {
            continue;
        }
        if let Some(companies) = &options.companies {
            if !companies.contains(&doc.company_id) {
                continue;
            }
        }
        if !admitted.contains(doc.company_id.as_str()) {
            if options
                .max_companies
                .is_some_and(|max| admitted.len() >= max)
            {
                continue;
            }
            admitted.insert(doc.company_id.as_str());
        }
        kept.push(doc.clone());
    }

    tracing::debug!(
        catalog = catalog.len(),
        kept = kept.len(),
        companies = admitted.len(),
        "filtered catalog"
    );
    kept
}
