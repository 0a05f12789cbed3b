use std::io::{Cursor, Read};

use crate::Result;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Kind of statement file found inside a document package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Tab-separated statement export (`XBRL_TO_CSV/*.csv`)
    Tabular,
    /// XBRL instance document (`XBRL/PublicDoc/*.xbrl`)
    Instance,
}

#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub kind: EntryKind,
    pub data: Vec<u8>,
}

impl ArchiveEntry {
    /// Audit reports are packaged next to the statements but never carry them.
    pub fn is_audit(&self) -> bool {
        let name = self.name.to_ascii_lowercase();
        name.contains("auditdoc") || file_name(&name).starts_with("jpaud")
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub fn is_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_MAGIC)
}

/// Extracts statement files from a document package.
///
/// Every `.csv` file is returned; only the largest non-audit `.xbrl` instance is.
/// Within a kind, non-audit files come first, larger files before smaller ones.
pub fn read_statement_entries(bytes: &[u8]) -> Result<Vec<ArchiveEntry>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut tabular = Vec::new();
    let mut instances = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let lower = name.to_ascii_lowercase();
        let kind = if lower.ends_with(".csv") {
            EntryKind::Tabular
        } else if lower.ends_with(".xbrl") {
            EntryKind::Instance
        } else {
            continue;
        };

        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        let entry = ArchiveEntry { name, kind, data };
        match kind {
            EntryKind::Tabular => tabular.push(entry),
            EntryKind::Instance if !entry.is_audit() => instances.push(entry),
            EntryKind::Instance => {}
        }
    }

    let by_relevance = |a: &ArchiveEntry, b: &ArchiveEntry| {
        a.is_audit()
            .cmp(&b.is_audit())
            .then(b.data.len().cmp(&a.data.len()))
            .then(a.name.cmp(&b.name))
    };
    tabular.sort_by(by_relevance);
    instances.sort_by(by_relevance);
    instances.truncate(1);

    tracing::debug!(
        tabular = tabular.len(),
        instances = instances.len(),
        "unpacked document archive"
    );
    tabular.extend(instances);
    Ok(tabular)
}
