//! Dataset assembly from parsed books
//!
//! Groups parsed books per translation, validates metadata, assigns the
//! canonical book order, and rejects duplicates. The resulting dataset owns
//! everything the API generator reads.

use std::collections::HashMap;

use crate::canon;
use crate::markup::{classify_markup, parse_book};
use crate::types::{
    Chapter, InputFile, PipelineError, RawTranslationMetadata, RootContent, TextDirection,
    TranslationMetadata,
};

/// A book with its canonical placement and display names resolved
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetBook {
    /// 3-letter book code
    pub id: String,
    /// Canonical rank, Genesis = 1 through Revelation = 66
    pub order: u32,
    pub name: String,
    pub common_name: String,
    /// Display title from the parse tree, falling back to the common name
    pub title: String,
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetTranslation {
    pub metadata: TranslationMetadata,
    /// Sorted by canonical order once the dataset is built
    pub books: Vec<DatasetBook>,
}

/// All translations of one generator run, in the order they were supplied
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub translations: Vec<DatasetTranslation>,
}

/// Counters reported after a build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingStats {
    /// Number of input files handed to the builder
    pub files_processed: usize,
    /// Number of books that parsed and validated
    pub books_parsed: usize,
    /// Number of files rejected (only in non-strict mode)
    pub errors: usize,
}

/// Incrementally groups input files into a [`Dataset`].
///
/// With `strict` set, the first failing file aborts the build; otherwise
/// failures are logged, counted, and the file is skipped so a partial
/// corpus can still be generated.
#[derive(Debug, Default)]
pub struct DatasetBuilder {
    strict: bool,
    translations: Vec<DatasetTranslation>,
    index: HashMap<String, usize>,
    stats: ProcessingStats,
}

impl DatasetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Classify, parse, and file one input envelope.
    ///
    /// Returns an error only in strict mode; in lenient mode the failure is
    /// recorded in the stats and `Ok` is returned.
    pub fn add_file(&mut self, input: &InputFile) -> Result<(), PipelineError> {
        self.stats.files_processed += 1;
        match self.ingest(input) {
            Ok(()) => {
                self.stats.books_parsed += 1;
                Ok(())
            }
            Err(e) if self.strict => Err(e),
            Err(e) => {
                tracing::error!("skipping input file: {}", e);
                self.stats.errors += 1;
                Ok(())
            }
        }
    }

    fn ingest(&mut self, input: &InputFile) -> Result<(), PipelineError> {
        let metadata = validate_metadata(&input.metadata.translation)?;
        let kind = classify_markup(input.file_type.as_deref(), &input.content)?;
        let tree = parse_book(kind, &input.content)?;

        let canon_book = canon::find_book(&tree.id).ok_or_else(|| PipelineError::UnknownBook {
            code: tree.id.clone(),
        })?;

        let chapters: Vec<Chapter> = tree
            .content
            .into_iter()
            .filter_map(|item| match item {
                RootContent::Chapter(chapter) => Some(chapter),
                RootContent::Heading { .. } => None,
            })
            .collect();
        if chapters.is_empty() {
            tracing::warn!(
                "book '{}' in translation '{}' has no chapters, skipping",
                canon_book.code,
                metadata.id
            );
            return Ok(());
        }

        let book = DatasetBook {
            id: canon_book.code.to_string(),
            order: canon_book.order,
            name: canon_book.name.to_string(),
            common_name: canon_book.common_name.to_string(),
            title: tree
                .title
                .unwrap_or_else(|| canon_book.common_name.to_string()),
            chapters,
        };

        let translation = self.translation_entry(metadata);
        if translation.books.iter().any(|b| b.id == book.id) {
            return Err(PipelineError::DuplicateBook {
                translation: translation.metadata.id.clone(),
                code: book.id,
            });
        }
        translation.books.push(book);
        Ok(())
    }

    // The first file of a translation fixes its metadata and its position
    // in the output order.
    fn translation_entry(&mut self, metadata: TranslationMetadata) -> &mut DatasetTranslation {
        let idx = match self.index.get(&metadata.id) {
            Some(&idx) => idx,
            None => {
                self.translations.push(DatasetTranslation {
                    metadata: metadata.clone(),
                    books: Vec::new(),
                });
                let idx = self.translations.len() - 1;
                self.index.insert(metadata.id, idx);
                idx
            }
        };
        &mut self.translations[idx]
    }

    pub fn stats(&self) -> ProcessingStats {
        self.stats
    }

    /// Finish the dataset: books within each translation are sorted into
    /// canonical order.
    pub fn build(mut self) -> (Dataset, ProcessingStats) {
        for translation in &mut self.translations {
            translation.books.sort_by_key(|b| b.order);
        }
        (
            Dataset {
                translations: self.translations,
            },
            self.stats,
        )
    }
}

/// Validate raw envelope metadata into [`TranslationMetadata`].
pub fn validate_metadata(
    raw: &RawTranslationMetadata,
) -> Result<TranslationMetadata, PipelineError> {
    fn required(value: &Option<String>, field: &str) -> Result<String, PipelineError> {
        match value {
            Some(v) if !v.trim().is_empty() => Ok(v.clone()),
            _ => Err(PipelineError::MissingMetadata {
                field: field.to_string(),
            }),
        }
    }

    let direction = match raw.direction.as_deref() {
        None => TextDirection::Ltr,
        Some("ltr") => TextDirection::Ltr,
        Some("rtl") => TextDirection::Rtl,
        Some(other) => {
            tracing::warn!("unknown text direction '{}', defaulting to ltr", other);
            TextDirection::Ltr
        }
    };

    Ok(TranslationMetadata {
        id: required(&raw.id, "id")?,
        name: required(&raw.name, "name")?,
        english_name: required(&raw.english_name, "englishName")?,
        short_name: required(&raw.short_name, "shortName")?,
        language: required(&raw.language, "language")?,
        direction,
        license_url: raw.license_url.clone(),
        website: raw.website.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InputMetadata;

    fn raw_metadata(id: &str) -> RawTranslationMetadata {
        RawTranslationMetadata {
            id: Some(id.to_string()),
            name: Some("Berean Standard Bible".to_string()),
            english_name: Some("Berean Standard Bible".to_string()),
            short_name: Some("BSB".to_string()),
            language: Some("en".to_string()),
            direction: None,
            license_url: None,
            website: None,
        }
    }

    fn usfm_input(translation: &str, code: &str, chapter_text: &str) -> InputFile {
        InputFile {
            file_type: Some("usfm".to_string()),
            metadata: InputMetadata {
                translation: raw_metadata(translation),
            },
            content: format!("\\id {}\n\\c 1\n\\p\n\\v 1 {}\n", code, chapter_text),
        }
    }

    #[test]
    fn test_books_sorted_into_canon_order() {
        let mut builder = DatasetBuilder::new().with_strict(true);
        builder.add_file(&usfm_input("bsb", "EXO", "Exodus text")).unwrap();
        builder.add_file(&usfm_input("bsb", "GEN", "Genesis text")).unwrap();
        let (dataset, stats) = builder.build();

        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.books_parsed, 2);
        assert_eq!(stats.errors, 0);

        let books = &dataset.translations[0].books;
        assert_eq!(books[0].id, "GEN");
        assert_eq!(books[0].order, 1);
        assert_eq!(books[0].name, "Genesis");
        assert_eq!(books[1].id, "EXO");
        assert_eq!(books[1].order, 2);
    }

    #[test]
    fn test_title_falls_back_to_common_name() {
        let mut builder = DatasetBuilder::new().with_strict(true);
        builder.add_file(&usfm_input("bsb", "GEN", "text")).unwrap();
        let (dataset, _) = builder.build();
        assert_eq!(dataset.translations[0].books[0].title, "Genesis");
    }

    #[test]
    fn test_unknown_book_code() {
        let mut builder = DatasetBuilder::new().with_strict(true);
        let err = builder
            .add_file(&usfm_input("bsb", "ZZZ", "text"))
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::UnknownBook {
                code: "ZZZ".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_book() {
        let mut builder = DatasetBuilder::new().with_strict(true);
        builder.add_file(&usfm_input("bsb", "GEN", "text")).unwrap();
        let err = builder
            .add_file(&usfm_input("bsb", "GEN", "other text"))
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::DuplicateBook {
                translation: "bsb".to_string(),
                code: "GEN".to_string()
            }
        );
    }

    #[test]
    fn test_lenient_mode_skips_failures() {
        let mut builder = DatasetBuilder::new();
        builder.add_file(&usfm_input("bsb", "GEN", "text")).unwrap();
        builder.add_file(&usfm_input("bsb", "ZZZ", "bad")).unwrap();
        let (dataset, stats) = builder.build();

        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.books_parsed, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(dataset.translations[0].books.len(), 1);
    }

    #[test]
    fn test_translations_keep_supplied_order() {
        let mut builder = DatasetBuilder::new().with_strict(true);
        builder.add_file(&usfm_input("web", "GEN", "text")).unwrap();
        builder.add_file(&usfm_input("bsb", "GEN", "text")).unwrap();
        let (dataset, _) = builder.build();
        assert_eq!(dataset.translations[0].metadata.id, "web");
        assert_eq!(dataset.translations[1].metadata.id, "bsb");
    }

    #[test]
    fn test_missing_metadata_field() {
        let mut raw = raw_metadata("bsb");
        raw.language = None;
        let err = validate_metadata(&raw).unwrap_err();
        assert_eq!(
            err,
            PipelineError::MissingMetadata {
                field: "language".to_string()
            }
        );

        let mut raw = raw_metadata("bsb");
        raw.short_name = Some("  ".to_string());
        let err = validate_metadata(&raw).unwrap_err();
        assert_eq!(
            err,
            PipelineError::MissingMetadata {
                field: "shortName".to_string()
            }
        );
    }

    #[test]
    fn test_direction_defaults_to_ltr() {
        let metadata = validate_metadata(&raw_metadata("bsb")).unwrap();
        assert_eq!(metadata.direction, TextDirection::Ltr);

        let mut raw = raw_metadata("heb");
        raw.direction = Some("rtl".to_string());
        let metadata = validate_metadata(&raw).unwrap();
        assert_eq!(metadata.direction, TextDirection::Rtl);
    }
}
