//! Logical API object graph
//!
//! Derives the objects served at each endpoint from a [`Dataset`]:
//! the translation index, per-translation book lists, and chapter pages
//! with next/previous links over the translation's global chapter
//! linearization.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::dataset::{Dataset, DatasetBook, DatasetTranslation};
use crate::helpers::replace_spaces_with_underscores;
use crate::types::{Chapter, TextDirection, TranslationMetadata};
use crate::API_PREFIX;

/// Options controlling path generation
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneratorOptions {
    /// Build book path segments from the common name (spaces replaced with
    /// underscores) instead of the book code.
    pub use_common_name: bool,
}

/// Audio links keyed by reader identifier. Always empty for now; the field
/// shape is part of the public contract.
pub type AudioLinks = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiTranslation {
    pub id: String,
    pub name: String,
    #[serde(rename = "englishName")]
    pub english_name: String,
    #[serde(rename = "shortName")]
    pub short_name: String,
    pub language: String,
    #[serde(rename = "textDirection")]
    pub text_direction: TextDirection,
    #[serde(rename = "availableFormats")]
    pub available_formats: Vec<String>,
    #[serde(rename = "listOfBooksApiLink")]
    pub list_of_books_api_link: String,
    #[serde(rename = "licenseUrl", skip_serializing_if = "Option::is_none")]
    pub license_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiBook {
    pub id: String,
    pub order: u32,
    pub name: String,
    #[serde(rename = "commonName")]
    pub common_name: String,
    pub title: String,
    #[serde(rename = "numberOfChapters")]
    pub number_of_chapters: usize,
    #[serde(rename = "firstChapterApiLink")]
    pub first_chapter_api_link: String,
    #[serde(rename = "lastChapterApiLink")]
    pub last_chapter_api_link: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiTranslationIndex {
    pub translations: Vec<ApiTranslation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiBookList {
    pub translation: ApiTranslation,
    pub books: Vec<ApiBook>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiChapterPage {
    pub translation: ApiTranslation,
    pub book: ApiBook,
    pub chapter: Chapter,
    #[serde(rename = "thisChapterLink")]
    pub this_chapter_link: String,
    #[serde(rename = "thisChapterAudioLinks")]
    pub this_chapter_audio_links: AudioLinks,
    /// Null at the end of the translation's last book
    #[serde(rename = "nextChapterApiLink")]
    pub next_chapter_api_link: Option<String>,
    #[serde(rename = "nextChapterAudioLinks")]
    pub next_chapter_audio_links: Option<AudioLinks>,
    /// Null at the start of the translation's first book
    #[serde(rename = "previousChapterApiLink")]
    pub previous_chapter_api_link: Option<String>,
    #[serde(rename = "previousChapterAudioLinks")]
    pub previous_chapter_audio_links: Option<AudioLinks>,
}

pub fn available_translations_path() -> String {
    format!("{}/available_translations.json", API_PREFIX)
}

pub fn books_api_path(translation_id: &str) -> String {
    format!("{}/{}/books.json", API_PREFIX, translation_id)
}

pub fn chapter_api_path(translation_id: &str, book_segment: &str, chapter_number: u32) -> String {
    format!(
        "{}/{}/{}/{}.json",
        API_PREFIX, translation_id, book_segment, chapter_number
    )
}

/// URL path segment of a book
pub fn book_segment(book: &DatasetBook, options: &GeneratorOptions) -> String {
    if options.use_common_name {
        replace_spaces_with_underscores(&book.common_name)
    } else {
        book.id.clone()
    }
}

pub fn api_translation(metadata: &TranslationMetadata) -> ApiTranslation {
    ApiTranslation {
        id: metadata.id.clone(),
        name: metadata.name.clone(),
        english_name: metadata.english_name.clone(),
        short_name: metadata.short_name.clone(),
        language: metadata.language.clone(),
        text_direction: metadata.direction,
        available_formats: vec!["json".to_string()],
        list_of_books_api_link: books_api_path(&metadata.id),
        license_url: metadata.license_url.clone(),
        website: metadata.website.clone(),
    }
}

pub fn api_book(
    translation_id: &str,
    book: &DatasetBook,
    options: &GeneratorOptions,
) -> ApiBook {
    let segment = book_segment(book, options);
    let first = book.chapters.first().map(|c| c.number).unwrap_or(1);
    let last = book.chapters.last().map(|c| c.number).unwrap_or(1);
    ApiBook {
        id: book.id.clone(),
        order: book.order,
        name: book.name.clone(),
        common_name: book.common_name.clone(),
        title: book.title.clone(),
        number_of_chapters: book.chapters.len(),
        first_chapter_api_link: chapter_api_path(translation_id, &segment, first),
        last_chapter_api_link: chapter_api_path(translation_id, &segment, last),
    }
}

pub fn api_translation_index(dataset: &Dataset) -> ApiTranslationIndex {
    ApiTranslationIndex {
        translations: dataset
            .translations
            .iter()
            .map(|t| api_translation(&t.metadata))
            .collect(),
    }
}

/// Chapter pages for one translation, in canonical order.
///
/// Each page is returned with its own path. The linearization runs through
/// every chapter of every book of the translation: the chapter after the
/// last chapter of one book is the first chapter of the next book.
pub fn chapter_pages(
    translation: &DatasetTranslation,
    options: &GeneratorOptions,
) -> Vec<(String, ApiChapterPage)> {
    let translation_id = &translation.metadata.id;
    let books: Vec<ApiBook> = translation
        .books
        .iter()
        .map(|b| api_book(translation_id, b, options))
        .collect();

    // Flatten all chapters into the translation-wide ordering.
    let mut slots: Vec<(usize, &Chapter, String)> = Vec::new();
    for (book_idx, book) in translation.books.iter().enumerate() {
        let segment = book_segment(book, options);
        for chapter in &book.chapters {
            let path = chapter_api_path(translation_id, &segment, chapter.number);
            slots.push((book_idx, chapter, path));
        }
    }

    let mut pages = Vec::with_capacity(slots.len());
    for (i, (book_idx, chapter, path)) in slots.iter().enumerate() {
        let previous = (i > 0).then(|| slots[i - 1].2.clone());
        let next = slots.get(i + 1).map(|s| s.2.clone());
        let page = ApiChapterPage {
            translation: api_translation(&translation.metadata),
            book: books[*book_idx].clone(),
            chapter: (*chapter).clone(),
            this_chapter_link: path.clone(),
            this_chapter_audio_links: AudioLinks::new(),
            next_chapter_audio_links: next.as_ref().map(|_| AudioLinks::new()),
            next_chapter_api_link: next,
            previous_chapter_audio_links: previous.as_ref().map(|_| AudioLinks::new()),
            previous_chapter_api_link: previous,
        };
        pages.push((path.clone(), page));
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(id: &str) -> TranslationMetadata {
        TranslationMetadata {
            id: id.to_string(),
            name: "Berean Standard Bible".to_string(),
            english_name: "Berean Standard Bible".to_string(),
            short_name: "BSB".to_string(),
            language: "en".to_string(),
            direction: TextDirection::Ltr,
            license_url: None,
            website: None,
        }
    }

    fn book(id: &str, order: u32, common_name: &str, chapters: u32) -> DatasetBook {
        DatasetBook {
            id: id.to_string(),
            order,
            name: common_name.to_string(),
            common_name: common_name.to_string(),
            title: common_name.to_string(),
            chapters: (1..=chapters)
                .map(|number| Chapter {
                    number,
                    content: vec![],
                    footnotes: vec![],
                })
                .collect(),
        }
    }

    fn translation(id: &str, books: Vec<DatasetBook>) -> DatasetTranslation {
        DatasetTranslation {
            metadata: metadata(id),
            books,
        }
    }

    #[test]
    fn test_paths() {
        assert_eq!(
            available_translations_path(),
            "/api/available_translations.json"
        );
        assert_eq!(books_api_path("bsb"), "/api/bsb/books.json");
        assert_eq!(
            chapter_api_path("bsb", "1_Chronicles", 1),
            "/api/bsb/1_Chronicles/1.json"
        );
    }

    #[test]
    fn test_book_segment_options() {
        let b = book("1CH", 13, "1 Chronicles", 1);
        let by_id = GeneratorOptions::default();
        assert_eq!(book_segment(&b, &by_id), "1CH");
        let by_name = GeneratorOptions {
            use_common_name: true,
        };
        assert_eq!(book_segment(&b, &by_name), "1_Chronicles");
    }

    #[test]
    fn test_links_cross_book_boundaries() {
        let t = translation("bsb", vec![book("GEN", 1, "Genesis", 2), book("EXO", 2, "Exodus", 1)]);
        let pages = chapter_pages(&t, &GeneratorOptions::default());
        assert_eq!(pages.len(), 3);

        let (_, gen1) = &pages[0];
        assert_eq!(gen1.previous_chapter_api_link, None);
        assert_eq!(gen1.previous_chapter_audio_links, None);
        assert_eq!(
            gen1.next_chapter_api_link.as_deref(),
            Some("/api/bsb/GEN/2.json")
        );
        assert_eq!(gen1.next_chapter_audio_links, Some(AudioLinks::new()));

        let (_, gen2) = &pages[1];
        assert_eq!(
            gen2.next_chapter_api_link.as_deref(),
            Some("/api/bsb/EXO/1.json")
        );

        let (_, exo1) = &pages[2];
        assert_eq!(
            exo1.previous_chapter_api_link.as_deref(),
            Some("/api/bsb/GEN/2.json")
        );
        assert_eq!(exo1.next_chapter_api_link, None);
        assert_eq!(exo1.next_chapter_audio_links, None);
    }

    #[test]
    fn test_next_previous_symmetry() {
        let t = translation(
            "bsb",
            vec![book("GEN", 1, "Genesis", 3), book("EXO", 2, "Exodus", 2)],
        );
        let pages = chapter_pages(&t, &GeneratorOptions::default());
        for i in 0..pages.len() {
            if let Some(next) = &pages[i].1.next_chapter_api_link {
                let (next_path, next_page) = &pages[i + 1];
                assert_eq!(next, next_path);
                assert_eq!(
                    next_page.previous_chapter_api_link.as_deref(),
                    Some(pages[i].0.as_str())
                );
            }
        }
    }

    #[test]
    fn test_book_links() {
        let t = translation("bsb", vec![book("1CH", 13, "1 Chronicles", 29)]);
        let options = GeneratorOptions {
            use_common_name: true,
        };
        let b = api_book("bsb", &t.books[0], &options);
        assert_eq!(b.number_of_chapters, 29);
        assert_eq!(b.first_chapter_api_link, "/api/bsb/1_Chronicles/1.json");
        assert_eq!(b.last_chapter_api_link, "/api/bsb/1_Chronicles/29.json");
    }

    #[test]
    fn test_translation_object() {
        let api = api_translation(&metadata("bsb"));
        assert_eq!(api.available_formats, vec!["json".to_string()]);
        assert_eq!(api.list_of_books_api_link, "/api/bsb/books.json");
        assert_eq!(api.text_direction, TextDirection::Ltr);
    }
}
