mod common;

use common::{amendment, at, day, document};
use edinetkit::{DocumentMetadata, FilterOptions, filter_documents, group_candidates, select_documents};
use std::collections::HashSet;

fn catalog() -> Vec<DocumentMetadata> {
    let d = day(2024, 6, 25);
    let mut quarterly = document("S100Q001", "E003", at(d, 11, 0));
    quarterly.doc_type_code = "140".to_string();
    let mut no_csv = document("S100N001", "E004", at(d, 12, 0));
    no_csv.has_csv = false;

    vec![
        document("S100A001", "E001", at(d, 9, 0)),
        document("S100B001", "E002", at(d, 9, 30)),
        amendment(document("S100A002", "E001", at(d, 15, 0)), "S100A001"),
        quarterly,
        no_csv,
        document("S100B002", "E002", at(d, 9, 30)),
        amendment(document("S100C001", "E005", at(d, 10, 0)), "S100X999"),
        document("S100C002", "E005", at(d, 10, 0)),
    ]
}

fn ids(documents: &[DocumentMetadata]) -> Vec<&str> {
    documents.iter().map(|d| d.doc_id.as_str()).collect()
}

#[test]
fn filter_output_is_an_ordered_subset_matching_the_predicate() {
    let catalog = catalog();
    let options = FilterOptions::default().with_companies(["E001", "E002", "E003", "E005"]);

    let kept = filter_documents(&catalog, &options);

    assert!(kept.iter().all(|doc| catalog.contains(doc)));
    assert!(kept.iter().all(|doc| options.doc_types.contains(&doc.doc_type_code)));
    assert!(kept.iter().all(|doc| doc.company_id != "E004"));
    assert_eq!(
        ids(&kept),
        vec!["S100A001", "S100B001", "S100A002", "S100B002", "S100C001", "S100C002"]
    );
}

#[test]
fn company_cap_keeps_all_documents_of_admitted_companies() {
    let kept = filter_documents(&catalog(), &FilterOptions::default().with_max_companies(2));

    let companies: HashSet<&str> = kept.iter().map(|d| d.company_id.as_str()).collect();
    assert_eq!(companies, HashSet::from(["E001", "E002"]));
    assert_eq!(kept.len(), 4);
}

#[test]
fn one_winner_per_company_and_period() {
    let selected = select_documents(&filter_documents(&catalog(), &FilterOptions::default()));

    assert_eq!(ids(&selected), vec!["S100A002", "S100B001", "S100N001", "S100C001"]);

    let slots: HashSet<(&str, _)> = selected
        .iter()
        .map(|d| (d.company_id.as_str(), d.period_end))
        .collect();
    assert_eq!(slots.len(), selected.len());
}

#[test]
fn winner_has_the_latest_submission_in_its_group() {
    let filtered = filter_documents(&catalog(), &FilterOptions::default());

    for group in group_candidates(&filtered) {
        let winner = group.winner().unwrap();
        let latest = group.documents.iter().map(|d| d.submitted_at).max().unwrap();
        assert_eq!(winner.submitted_at, latest);
        assert!(
            group
                .documents
                .iter()
                .all(|d| d.precedence_cmp(winner) != std::cmp::Ordering::Greater)
        );
    }
}

#[test]
fn same_time_amendment_beats_original() {
    let d = day(2024, 6, 25);
    let original = document("S100A001", "E001", at(d, 9, 0));
    let corrected = amendment(document("S100A009", "E001", at(d, 9, 0)), "S100A001");

    let selected = select_documents(&[original, corrected]);
    assert_eq!(ids(&selected), vec!["S100A009"]);
}

#[test]
fn later_original_beats_earlier_amendment() {
    let d = day(2024, 6, 25);
    let corrected = amendment(document("S100A002", "E001", at(d, 9, 0)), "S100A000");
    let resubmitted = document("S100A003", "E001", at(d, 16, 0));

    let selected = select_documents(&[corrected, resubmitted]);
    assert_eq!(ids(&selected), vec!["S100A003"]);
}

#[test]
fn csv_availability_breaks_ties() {
    let d = day(2024, 6, 25);
    let mut xbrl_only = document("S100A001", "E001", at(d, 9, 0));
    xbrl_only.has_csv = false;
    let with_csv = document("S100A002", "E001", at(d, 9, 0));

    let selected = select_documents(&[xbrl_only, with_csv]);
    assert_eq!(ids(&selected), vec!["S100A002"]);
}

#[test]
fn different_periods_are_kept_apart() {
    let d = day(2024, 6, 25);
    let current = document("S100A001", "E001", at(d, 9, 0));
    let mut late_prior = document("S100A002", "E001", at(d, 10, 0));
    late_prior.period_end = day(2023, 3, 31);

    let selected = select_documents(&[current, late_prior]);
    assert_eq!(selected.len(), 2);
}

#[test]
fn selection_does_not_depend_on_catalog_order() {
    let filtered = filter_documents(&catalog(), &FilterOptions::default());
    let expected: HashSet<String> = select_documents(&filtered)
        .into_iter()
        .map(|d| d.doc_id)
        .collect();

    let mut rng = fastrand::Rng::with_seed(0x5eed);
    for _ in 0..50 {
        let mut shuffled = filtered.clone();
        rng.shuffle(&mut shuffled);
        let winners: HashSet<String> = select_documents(&shuffled)
            .into_iter()
            .map(|d| d.doc_id)
            .collect();
        assert_eq!(winners, expected);
    }
}

#[test]
fn selecting_twice_changes_nothing() {
    let once = select_documents(&catalog());
    let twice = select_documents(&once);
    assert_eq!(once, twice);
}
