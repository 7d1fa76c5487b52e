//! Core data structures for the markup parsers and the API generator
//!
//! This module defines the parse tree produced by the USX and USFM parsers,
//! the input envelope consumed from the CLI, and the error kinds raised by
//! the pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while classifying, parsing, or assembling a dataset.
///
/// All of these are fatal to the book they occur in. Whether they abort the
/// whole run or only skip the book is decided by the dataset builder's
/// strict flag.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PipelineError {
    #[error("could not classify input as USX, USFM or pre-parsed JSON")]
    UnrecognizedMarkup,
    #[error("markup parse error at {location}: {detail}")]
    Parse { detail: String, location: String },
    #[error("document does not declare a book code")]
    MissingBook,
    #[error("book code '{code}' is not in the 66-book canon")]
    UnknownBook { code: String },
    #[error("book '{code}' appears more than once in translation '{translation}'")]
    DuplicateBook { translation: String, code: String },
    #[error("required translation metadata field '{field}' is missing or empty")]
    MissingMetadata { field: String },
}

/// Text direction of a translation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextDirection {
    #[serde(rename = "ltr")]
    Ltr,
    #[serde(rename = "rtl")]
    Rtl,
}

/// Validated translation metadata.
///
/// Built from [`RawTranslationMetadata`] by the dataset builder; required
/// fields are guaranteed non-empty and the direction is resolved to a
/// concrete value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationMetadata {
    /// Unique short code, ASCII and URL-safe (e.g. "bsb")
    pub id: String,
    /// Display name in the translation's own language
    pub name: String,
    /// English display name
    pub english_name: String,
    /// Short display name (e.g. "BSB")
    pub short_name: String,
    /// BCP-47 language tag
    pub language: String,
    /// Text direction, defaults to left-to-right
    pub direction: TextDirection,
    /// License URL, if supplied
    pub license_url: Option<String>,
    /// Website URL, if supplied
    pub website: Option<String>,
}

/// Translation metadata exactly as it arrives in an input envelope.
///
/// Everything is optional here so that a missing field surfaces as a
/// [`PipelineError::MissingMetadata`] instead of a serde error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTranslationMetadata {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "englishName", default)]
    pub english_name: Option<String>,
    #[serde(rename = "shortName", default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(rename = "licenseUrl", default)]
    pub license_url: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

/// One input file handed over by the CLI
#[derive(Debug, Clone, Deserialize)]
pub struct InputFile {
    /// Markup family hint: "usfm", "usx" or "json"
    #[serde(rename = "fileType", default)]
    pub file_type: Option<String>,
    pub metadata: InputMetadata,
    /// Raw markup (or pre-parsed JSON) content
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputMetadata {
    pub translation: RawTranslationMetadata,
}

/// Parse tree of a single book
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookTree {
    /// 3-letter book code (e.g. "GEN", "1CH")
    pub id: String,
    /// Running header, from the `h` paragraph
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    /// Display title, composed from the major-title paragraphs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: Vec<RootContent>,
}

/// Root items of a book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RootContent {
    Chapter(Chapter),
    /// Section heading occurring before the first chapter
    Heading { content: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub number: u32,
    pub content: Vec<ChapterContent>,
    pub footnotes: Vec<Footnote>,
}

/// Content items within a chapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChapterContent {
    Heading { content: Vec<String> },
    LineBreak,
    HebrewSubtitle { content: Vec<InlineItem> },
    Verse { number: u32, content: Vec<InlineItem> },
}

/// Inline content of a verse or Hebrew subtitle.
///
/// Plain runs are bare strings; runs carrying poetry indentation or
/// words-of-Jesus emphasis become [`FormattedText`] objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InlineItem {
    Text(String),
    Formatted(FormattedText),
    Note(FootnoteReference),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedText {
    pub text: String,
    /// Poetry indentation level 1-4
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poem: Option<u8>,
    /// Present (and true) only for words-of-Jesus spans
    #[serde(rename = "wordsOfJesus", default, skip_serializing_if = "Option::is_none")]
    pub words_of_jesus: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootnoteReference {
    #[serde(rename = "noteId")]
    pub note_id: u32,
}

/// Translator footnote attached to a chapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footnote {
    /// Unique within the chapter, allocated from a per-chapter counter
    #[serde(rename = "noteId")]
    pub note_id: u32,
    /// Caller mark from the source (e.g. "+"), or null
    pub caller: Option<String>,
    pub text: String,
    pub reference: VerseReference,
}

/// Chapter and verse a footnote belongs to.
///
/// Verse 0 marks a footnote inside a Hebrew subtitle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerseReference {
    pub chapter: u32,
    pub verse: u32,
}
