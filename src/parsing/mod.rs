pub mod archive;
pub mod number;
pub mod tabular;
pub mod tagged;
pub mod text;

use crate::download::PayloadKind;
use crate::{EdinetError, Result};

pub use tabular::{TabularRow, TabularStatement};
pub use tagged::{Context, Fact, TaggedReport};

/// One parsed statement file from a document payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Tabular(TabularStatement),
    Tagged(TaggedReport),
}

/// Parses a downloaded payload into statements.
///
/// Zip packages are unpacked and every statement file inside is parsed; a file that
/// fails to parse is logged and skipped as long as another one succeeds. Bare
/// payloads are sniffed: text starting with `<` is a tagged report, anything else
/// tabular, with `hint` deciding when the text is empty.
///
/// # Errors
///
/// * `EdinetError::ZipError` - the package cannot be opened
/// * `EdinetError::ParseError` - nothing in the payload could be parsed
pub fn parse_payload(bytes: &[u8], hint: PayloadKind) -> Result<Vec<Statement>> {
    if !archive::is_zip(bytes) {
        return parse_bare(bytes, hint, "payload").map(|statement| vec![statement]);
    }

    let entries = archive::read_statement_entries(bytes)?;
    if entries.is_empty() {
        return Err(EdinetError::ParseError(
            "archive contains no statement files".to_string(),
        ));
    }

    let mut statements = Vec::with_capacity(entries.len());
    let mut last_error = None;
    for entry in &entries {
        let text = text::decode_text(&entry.data);
        let parsed = match entry.kind {
            archive::EntryKind::Tabular => {
                TabularStatement::parse(&text, &entry.name).map(Statement::Tabular)
            }
            archive::EntryKind::Instance => {
                TaggedReport::parse(&text, &entry.name).map(Statement::Tagged)
            }
        };
        match parsed {
            Ok(statement) => statements.push(statement),
            Err(e) => {
                tracing::warn!("skipping unreadable statement {}: {}", entry.name, e);
                last_error = Some(e);
            }
        }
    }

    match (statements.is_empty(), last_error) {
        (true, Some(e)) => Err(e),
        _ => Ok(statements),
    }
}

fn parse_bare(bytes: &[u8], hint: PayloadKind, source: &str) -> Result<Statement> {
    let text = text::decode_text(bytes);
    let first = text.trim_start_matches('\u{feff}').trim_start().chars().next();
    match (first, hint) {
        (Some('<'), _) | (None, PayloadKind::Xbrl) => {
            TaggedReport::parse(&text, source).map(Statement::Tagged)
        }
        _ => TabularStatement::parse(&text, source).map(Statement::Tabular),
    }
}
