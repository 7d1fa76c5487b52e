//! Shared parse-tree assembly for the USX and USFM parsers
//!
//! Both parsers feed milestone transitions and inline text into a
//! [`BookBuilder`]. The builder owns the open-chapter and open-verse state,
//! the per-chapter footnote counter, and the inline normalization rules:
//! whitespace collapsing, promotion of plain runs to formatted text, and
//! coalescing of adjacent same-format runs.

use crate::helpers::{collapse_whitespace, normalize_footnote_text};
use crate::types::{
    BookTree, Chapter, ChapterContent, Footnote, FootnoteReference, FormattedText, InlineItem,
    PipelineError, RootContent, VerseReference,
};

/// Formatting context of an inline run at the moment it is emitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct InlineFormat {
    /// Poetry indentation of the nearest enclosing paragraph (q1-q4)
    pub poem: Option<u8>,
    /// Inside a words-of-Jesus span
    pub words_of_jesus: bool,
}

/// Accumulates one inline-content sequence (a verse or a Hebrew subtitle).
///
/// Appending goes through the normalization rules, so a finished sequence
/// never contains adjacent plain strings, adjacent same-format runs, or
/// empty payloads.
#[derive(Debug, Default)]
pub(crate) struct InlineAccumulator {
    items: Vec<InlineItem>,
    // A paragraph boundary was crossed while this sequence is open; the
    // next text run gets a single separating space.
    pending_space: bool,
}

impl InlineAccumulator {
    fn new() -> Self {
        Self::default()
    }

    fn mark_paragraph_boundary(&mut self) {
        if !self.items.is_empty() {
            self.pending_space = true;
        }
    }

    fn push_text(&mut self, raw: &str, format: InlineFormat) {
        let mut text = collapse_whitespace(raw);
        if text.is_empty() {
            return;
        }
        if self.pending_space {
            self.pending_space = false;
            if !text.starts_with(' ') {
                text.insert(0, ' ');
            }
        }

        // Promotion happens before coalescing, so two consecutive runs at
        // the same poetry level merge into one formatted entry.
        let item = if format.poem.is_some() || format.words_of_jesus {
            InlineItem::Formatted(FormattedText {
                text,
                poem: format.poem,
                words_of_jesus: if format.words_of_jesus { Some(true) } else { None },
            })
        } else {
            InlineItem::Text(text)
        };
        self.push_item(item);
    }

    fn push_item(&mut self, item: InlineItem) {
        match (self.items.last_mut(), item) {
            (Some(InlineItem::Text(tail)), InlineItem::Text(new)) => {
                append_collapsed(tail, &new);
            }
            (Some(InlineItem::Formatted(tail)), InlineItem::Formatted(new))
                if tail.poem == new.poem && tail.words_of_jesus == new.words_of_jesus =>
            {
                append_collapsed(&mut tail.text, &new.text);
            }
            (_, item) => self.items.push(item),
        }
    }

    fn push_note_ref(&mut self, note_id: u32) {
        self.items
            .push(InlineItem::Note(FootnoteReference { note_id }));
    }

    /// Strip whitespace from the ends of the sequence and drop entries that
    /// became empty.
    fn finish(mut self) -> Vec<InlineItem> {
        while let Some(first) = self.items.first_mut() {
            if trim_item(first, true) {
                self.items.remove(0);
            } else {
                break;
            }
        }
        while let Some(last) = self.items.last_mut() {
            if trim_item(last, false) {
                self.items.pop();
            } else {
                break;
            }
        }
        self.items
    }
}

// Concatenate without producing a double space at the seam.
fn append_collapsed(tail: &mut String, new: &str) {
    if tail.ends_with(' ') && new.starts_with(' ') {
        tail.push_str(new.trim_start_matches(' '));
    } else {
        tail.push_str(new);
    }
}

// Trim one end of an inline item; returns true if the item is now empty
// and should be removed. Footnote references stop the trimming.
fn trim_item(item: &mut InlineItem, leading: bool) -> bool {
    let text = match item {
        InlineItem::Text(t) => t,
        InlineItem::Formatted(f) => &mut f.text,
        InlineItem::Note(_) => return false,
    };
    let trimmed = if leading {
        text.trim_start()
    } else {
        text.trim_end()
    };
    if trimmed.len() != text.len() {
        *text = trimmed.to_string();
    }
    text.is_empty()
}

/// The inline sequence content is currently flowing into
#[derive(Debug)]
enum OpenInline {
    None,
    /// An open verse; `index` is its reserved slot in the chapter content,
    /// so items emitted while the verse is open (line breaks, headings)
    /// land after it in source order.
    Verse {
        index: usize,
        number: u32,
        acc: InlineAccumulator,
    },
    Subtitle {
        index: usize,
        acc: InlineAccumulator,
    },
    /// A rejected verse milestone; content is dropped until the next one.
    Suppressed,
}

/// Mutable state of the chapter currently being parsed
#[derive(Debug)]
pub(crate) struct ChapterState {
    number: u32,
    content: Vec<ChapterContent>,
    footnotes: Vec<Footnote>,
    note_counter: u32,
    last_verse: u32,
    open: OpenInline,
}

impl ChapterState {
    fn new(number: u32) -> Self {
        Self {
            number,
            content: Vec::new(),
            footnotes: Vec::new(),
            note_counter: 0,
            last_verse: 0,
            open: OpenInline::None,
        }
    }

    fn close_open_inline(&mut self) {
        match std::mem::replace(&mut self.open, OpenInline::None) {
            OpenInline::Verse { index, number, acc } => {
                self.content[index] = ChapterContent::Verse {
                    number,
                    content: acc.finish(),
                };
            }
            OpenInline::Subtitle { index, acc } => {
                self.content[index] = ChapterContent::HebrewSubtitle {
                    content: acc.finish(),
                };
            }
            OpenInline::None | OpenInline::Suppressed => {}
        }
    }

    fn start_verse(&mut self, number: u32) {
        self.close_open_inline();
        if number == 0 || number <= self.last_verse {
            tracing::warn!(
                "chapter {}: verse {} does not advance past verse {}, dropping",
                self.number,
                number,
                self.last_verse
            );
            self.open = OpenInline::Suppressed;
            return;
        }
        self.last_verse = number;
        self.content.push(ChapterContent::Verse {
            number,
            content: Vec::new(),
        });
        self.open = OpenInline::Verse {
            index: self.content.len() - 1,
            number,
            acc: InlineAccumulator::new(),
        };
    }

    fn end_verse(&mut self) {
        self.close_open_inline();
    }

    fn start_subtitle(&mut self) {
        self.close_open_inline();
        self.content.push(ChapterContent::HebrewSubtitle {
            content: Vec::new(),
        });
        self.open = OpenInline::Subtitle {
            index: self.content.len() - 1,
            acc: InlineAccumulator::new(),
        };
    }

    fn end_subtitle(&mut self) {
        self.close_open_inline();
    }

    fn finish(mut self) -> Chapter {
        self.close_open_inline();
        Chapter {
            number: self.number,
            content: self.content,
            footnotes: self.footnotes,
        }
    }
}

/// Assembles one [`BookTree`] from parser events.
///
/// The two markup parsers translate their syntax into calls on this type;
/// everything that must behave identically between USX and USFM (milestone
/// bookkeeping, footnote numbering, normalization) lives here.
#[derive(Debug)]
pub(crate) struct BookBuilder {
    id: Option<String>,
    header: Option<String>,
    title_parts: Vec<String>,
    root: Vec<RootContent>,
    current: Option<ChapterState>,
}

impl BookBuilder {
    pub fn new() -> Self {
        Self {
            id: None,
            header: None,
            title_parts: Vec::new(),
            root: Vec::new(),
            current: None,
        }
    }

    pub fn set_id(&mut self, code: &str) {
        let code = code.trim();
        if !code.is_empty() {
            self.id = Some(code.to_uppercase());
        }
    }

    pub fn has_id(&self) -> bool {
        self.id.is_some()
    }

    pub fn set_header(&mut self, header: &str) {
        let header = collapse_whitespace(header).trim().to_string();
        if !header.is_empty() {
            self.header = Some(header);
        }
    }

    pub fn add_title_part(&mut self, part: &str) {
        let part = collapse_whitespace(part).trim().to_string();
        if !part.is_empty() {
            self.title_parts.push(part);
        }
    }

    pub fn start_chapter(&mut self, number: u32) {
        self.close_chapter();
        self.current = Some(ChapterState::new(number));
    }

    fn close_chapter(&mut self) {
        if let Some(chapter) = self.current.take() {
            self.root.push(RootContent::Chapter(chapter.finish()));
        }
    }

    pub fn start_verse(&mut self, number: u32) {
        match self.current.as_mut() {
            Some(chapter) => chapter.start_verse(number),
            None => tracing::warn!("verse {} milestone before any chapter, dropping", number),
        }
    }

    pub fn end_verse(&mut self) {
        if let Some(chapter) = self.current.as_mut() {
            chapter.end_verse();
        }
    }

    /// Drop inline content until the next verse or subtitle milestone.
    pub fn suppress_verse(&mut self) {
        if let Some(chapter) = self.current.as_mut() {
            chapter.close_open_inline();
            chapter.open = OpenInline::Suppressed;
        }
    }

    pub fn start_subtitle(&mut self) {
        match self.current.as_mut() {
            Some(chapter) => chapter.start_subtitle(),
            None => tracing::warn!("Hebrew subtitle before any chapter, dropping"),
        }
    }

    pub fn end_subtitle(&mut self) {
        if let Some(chapter) = self.current.as_mut() {
            chapter.end_subtitle();
        }
    }

    /// Headings before the first chapter become root items; afterwards they
    /// belong to the open chapter.
    pub fn push_heading(&mut self, text: &str) {
        let text = collapse_whitespace(text).trim().to_string();
        if text.is_empty() {
            return;
        }
        match self.current.as_mut() {
            Some(chapter) => chapter.content.push(ChapterContent::Heading {
                content: vec![text],
            }),
            None => self.root.push(RootContent::Heading {
                content: vec![text],
            }),
        }
    }

    pub fn push_line_break(&mut self) {
        if let Some(chapter) = self.current.as_mut() {
            chapter.content.push(ChapterContent::LineBreak);
        }
    }

    pub fn mark_paragraph_boundary(&mut self) {
        if let Some(chapter) = self.current.as_mut() {
            match &mut chapter.open {
                OpenInline::Verse { acc, .. } | OpenInline::Subtitle { acc, .. } => {
                    acc.mark_paragraph_boundary()
                }
                OpenInline::None | OpenInline::Suppressed => {}
            }
        }
    }

    pub fn push_text(&mut self, raw: &str, format: InlineFormat) {
        if let Some(chapter) = self.current.as_mut() {
            match &mut chapter.open {
                OpenInline::Verse { acc, .. } | OpenInline::Subtitle { acc, .. } => {
                    acc.push_text(raw, format)
                }
                OpenInline::None | OpenInline::Suppressed => {}
            }
        }
    }

    /// Register a translator footnote at the current position.
    ///
    /// Allocates the next note id of the chapter, appends the footnote to
    /// the chapter's footnote list, and pushes a reference into the open
    /// verse or subtitle. Footnotes with nowhere to attach are dropped.
    pub fn add_footnote(&mut self, caller: Option<String>, raw_text: &str) {
        let Some(chapter) = self.current.as_mut() else {
            tracing::warn!("footnote before any chapter, dropping");
            return;
        };
        let verse = match &mut chapter.open {
            OpenInline::Verse { number, .. } => *number,
            OpenInline::Subtitle { .. } => 0,
            OpenInline::None | OpenInline::Suppressed => {
                tracing::warn!(
                    "chapter {}: footnote outside any verse, dropping",
                    chapter.number
                );
                return;
            }
        };

        let note_id = chapter.note_counter;
        chapter.note_counter += 1;
        chapter.footnotes.push(Footnote {
            note_id,
            caller,
            text: normalize_footnote_text(raw_text),
            reference: VerseReference {
                chapter: chapter.number,
                verse,
            },
        });
        match &mut chapter.open {
            OpenInline::Verse { acc, .. } | OpenInline::Subtitle { acc, .. } => {
                acc.push_note_ref(note_id)
            }
            _ => unreachable!(),
        }
    }

    pub fn finish(mut self) -> Result<BookTree, PipelineError> {
        self.close_chapter();
        let id = self.id.ok_or(PipelineError::MissingBook)?;
        let title = if self.title_parts.is_empty() {
            None
        } else {
            Some(self.title_parts.join(" "))
        };
        Ok(BookTree {
            id,
            header: self.header,
            title,
            content: self.root,
        })
    }
}
