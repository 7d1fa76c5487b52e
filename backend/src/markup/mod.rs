//! Markup family classification and parsing
//!
//! Entry point of the first pipeline stage: decide whether an input file is
//! USX, USFM, or an already-parsed JSON tree, and produce a [`BookTree`]
//! either way.

pub(crate) mod content;
pub mod usfm;
pub mod usx;

pub use usfm::parse_usfm;
pub use usx::parse_usx;

use crate::types::{BookTree, PipelineError};

/// Markup family of an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupKind {
    Usx,
    Usfm,
    /// A JSON-serialized parse tree, passed through unchanged
    JsonTree,
}

/// Classify an input file.
///
/// A recognized `file_type` hint wins; otherwise the content is sniffed: a
/// leading `<` means USX, a leading `{` means a pre-parsed JSON tree, and a
/// leading `\id` marker means USFM.
pub fn classify_markup(
    file_type: Option<&str>,
    content: &str,
) -> Result<MarkupKind, PipelineError> {
    match file_type.map(|t| t.trim().to_lowercase()).as_deref() {
        Some("usx") => return Ok(MarkupKind::Usx),
        Some("usfm") => return Ok(MarkupKind::Usfm),
        Some("json") => return Ok(MarkupKind::JsonTree),
        _ => {}
    }

    let head = content.trim_start();
    if head.starts_with('<') {
        Ok(MarkupKind::Usx)
    } else if head.starts_with('{') {
        Ok(MarkupKind::JsonTree)
    } else if head.starts_with("\\id ") {
        Ok(MarkupKind::Usfm)
    } else {
        Err(PipelineError::UnrecognizedMarkup)
    }
}

/// Parse content of a known markup family into a book parse tree.
pub fn parse_book(kind: MarkupKind, content: &str) -> Result<BookTree, PipelineError> {
    match kind {
        MarkupKind::Usx => parse_usx(content),
        MarkupKind::Usfm => parse_usfm(content),
        MarkupKind::JsonTree => {
            let tree: BookTree =
                serde_json::from_str(content).map_err(|e| PipelineError::Parse {
                    detail: e.to_string(),
                    location: format!("json line {} column {}", e.line(), e.column()),
                })?;
            if tree.id.trim().is_empty() {
                return Err(PipelineError::MissingBook);
            }
            Ok(tree)
        }
    }
}
