//! File materialization
//!
//! Walks the logical API object graph in a fixed order and serializes each
//! object to a `(path, JSON value)` pair. Emission order is the translation
//! index, then per translation the book list followed by its chapters in
//! canonical order, so runs over the same inputs are byte-identical.

use anyhow::{Context, Result};
use serde_json::Value;

use crate::api::{
    api_book, api_translation, api_translation_index, available_translations_path, books_api_path,
    chapter_pages, ApiBookList, GeneratorOptions,
};
use crate::dataset::Dataset;

/// One generated file
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFile {
    /// Absolute path below the site root, e.g. "/api/bsb/GEN/1.json"
    pub path: String,
    pub content: Value,
}

/// Generate every API file for a dataset.
pub fn generate_api_files(dataset: &Dataset, options: &GeneratorOptions) -> Result<Vec<OutputFile>> {
    let mut files = Vec::new();

    let index = api_translation_index(dataset);
    files.push(OutputFile {
        path: available_translations_path(),
        content: serde_json::to_value(&index).context("serializing translation index")?,
    });

    for translation in &dataset.translations {
        let translation_id = &translation.metadata.id;
        let book_list = ApiBookList {
            translation: api_translation(&translation.metadata),
            books: translation
                .books
                .iter()
                .map(|b| api_book(translation_id, b, options))
                .collect(),
        };
        files.push(OutputFile {
            path: books_api_path(translation_id),
            content: serde_json::to_value(&book_list)
                .with_context(|| format!("serializing book list for '{}'", translation_id))?,
        });

        for (path, page) in chapter_pages(translation, options) {
            files.push(OutputFile {
                path,
                content: serde_json::to_value(&page)
                    .with_context(|| format!("serializing chapter page for '{}'", translation_id))?,
            });
        }
    }

    tracing::info!(
        "generated {} API files for {} translations",
        files.len(),
        dataset.translations.len()
    );
    Ok(files)
}
