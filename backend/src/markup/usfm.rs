//! USFM scripture parser
//!
//! Tokenizes line-oriented USFM with backslash-initiated markers and feeds
//! the same [`BookBuilder`] the USX parser uses, so both markup families
//! yield identical parse trees. Verses open at `\v N` and stay open until
//! the next `\v` or `\c`; character-level spans (`\wj`, `\f`) may cross
//! line boundaries, so their state lives in the parser, not the line loop.

use std::collections::HashSet;

use crate::markup::content::{BookBuilder, InlineFormat};
use crate::markup::usx::IGNORED_PARA_STYLES;
use crate::types::{BookTree, PipelineError};

/// Character-level markers. When one of these opens a line it belongs to
/// the inline scanner, not the paragraph dispatch.
const CHAR_MARKERS: &[&str] = &[
    "wj", "f", "fe", "x", "w", "nd", "add", "it", "bd", "bdit", "em", "sc", "no", "sup", "k",
    "ord", "pn", "png", "qs", "qac", "sls", "tl", "rb", "fr", "ft", "fq", "fqa", "fk", "fl", "fw",
    "fp", "fv", "xo", "xt", "xta", "xk", "xq",
];

/// Ordinary paragraph markers whose content flows into the open verse
const INLINE_PARA_MARKERS: &[&str] = &[
    "p", "m", "po", "pr", "cls", "pmo", "pm", "pmc", "pmr", "pi", "pi1", "pi2", "pi3", "mi", "nb",
    "pc", "ph", "ph1", "ph2", "ph3", "lit", "li", "li1", "li2", "li3", "li4",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineMode {
    None,
    Header,
    Title,
    Heading,
    Subtitle,
    Ignored,
    Inline { poem: Option<u8> },
}

struct NoteCapture {
    caller: Option<String>,
    text: String,
    // The first token after \f is the caller mark
    expect_caller: bool,
}

struct UsfmParser {
    builder: BookBuilder,
    mode: LineMode,
    buf: String,
    wj: bool,
    note: Option<NoteCapture>,
    // Inside \x ... \x* or \fe ... \fe*, which produce no output
    skip_note: bool,
    in_word: bool,
    // Past the | separator of a \w ... \w* span
    in_word_attrs: bool,
    warned_markers: HashSet<String>,
    line: usize,
}

/// Parse a USFM document into a book parse tree.
pub fn parse_usfm(content: &str) -> Result<BookTree, PipelineError> {
    let mut parser = UsfmParser {
        builder: BookBuilder::new(),
        mode: LineMode::None,
        buf: String::new(),
        wj: false,
        note: None,
        skip_note: false,
        in_word: false,
        in_word_attrs: false,
        warned_markers: HashSet::new(),
        line: 0,
    };

    for (idx, raw_line) in content.lines().enumerate() {
        parser.line = idx + 1;
        parser.handle_line(raw_line)?;
    }
    parser.finalize_para();
    parser.builder.finish()
}

impl UsfmParser {
    fn handle_line(&mut self, raw: &str) -> Result<(), PipelineError> {
        let line = raw.trim_end();
        let stripped = line.trim_start();
        if stripped.is_empty() {
            return Ok(());
        }

        if let Some(rest) = stripped.strip_prefix('\\') {
            let body = rest.strip_prefix('+').unwrap_or(rest);
            let marker_len = body
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .count();
            if marker_len > 0 {
                let marker = &body[..marker_len];
                let closing = body[marker_len..].starts_with('*');
                if !closing && !CHAR_MARKERS.contains(&marker) {
                    let tail = &body[marker_len..];
                    let tail = tail.strip_prefix(' ').unwrap_or(tail);
                    let marker = marker.to_string();
                    return self.handle_paragraph_marker(&marker, tail);
                }
            }
        }

        self.handle_continuation(line);
        Ok(())
    }

    fn handle_paragraph_marker(&mut self, marker: &str, tail: &str) -> Result<(), PipelineError> {
        match marker {
            "id" => {
                self.finalize_para();
                if let Some(code) = tail.split_whitespace().next() {
                    self.builder.set_id(code);
                }
            }
            "usfm" => self.finalize_para(),
            "h" => {
                self.finalize_para();
                self.mode = LineMode::Header;
                self.buf = tail.to_string();
            }
            "mt1" | "mt2" | "mt3" => {
                self.finalize_para();
                self.mode = LineMode::Title;
                self.buf = tail.to_string();
            }
            "c" => {
                self.finalize_para();
                let number = tail
                    .split_whitespace()
                    .next()
                    .and_then(|t| t.parse::<u32>().ok())
                    .ok_or_else(|| PipelineError::Parse {
                        detail: format!("invalid chapter marker '\\c {}'", tail),
                        location: format!("line {}", self.line),
                    })?;
                self.builder.start_chapter(number);
            }
            "v" => {
                self.ensure_inline_mode();
                let mut parts = tail.splitn(2, ' ');
                let number_token = parts.next().unwrap_or("");
                let rest = parts.next().unwrap_or("");
                match parse_verse_number(number_token) {
                    Some(number) => self.builder.start_verse(number),
                    None => {
                        tracing::warn!(
                            "line {}: verse marker without a usable number, dropping",
                            self.line
                        );
                        self.builder.suppress_verse();
                    }
                }
                self.scan_inline(rest);
            }
            "s" | "s1" | "s2" | "s3" | "s4" => {
                self.finalize_para();
                self.mode = LineMode::Heading;
                self.buf = tail.to_string();
            }
            "b" => {
                self.finalize_para();
                self.builder.push_line_break();
            }
            "d" => {
                self.finalize_para();
                self.builder.start_subtitle();
                self.mode = LineMode::Subtitle;
                self.scan_inline(tail);
            }
            "q" | "q1" => self.poetry_para(1, tail),
            "q2" => self.poetry_para(2, tail),
            "q3" => self.poetry_para(3, tail),
            "q4" => self.poetry_para(4, tail),
            m if IGNORED_PARA_STYLES.contains(&m) => {
                self.finalize_para();
                self.mode = LineMode::Ignored;
            }
            m if INLINE_PARA_MARKERS.contains(&m) => self.inline_para(None, tail),
            m => {
                if self.warned_markers.insert(m.to_string()) {
                    tracing::warn!(
                        "unhandled marker '\\{}', treating as inline paragraph",
                        m
                    );
                }
                self.inline_para(None, tail);
            }
        }
        Ok(())
    }

    fn poetry_para(&mut self, level: u8, tail: &str) {
        self.inline_para(Some(level), tail);
    }

    fn inline_para(&mut self, poem: Option<u8>, tail: &str) {
        self.finalize_para();
        self.mode = LineMode::Inline { poem };
        self.builder.mark_paragraph_boundary();
        self.scan_inline(tail);
    }

    /// `\v` keeps the enclosing paragraph's poetry level; everything else
    /// switches to a fresh inline paragraph first.
    fn ensure_inline_mode(&mut self) {
        match self.mode {
            LineMode::Inline { .. } => {}
            _ => {
                self.finalize_para();
                self.mode = LineMode::Inline { poem: None };
            }
        }
    }

    fn finalize_para(&mut self) {
        match self.mode {
            LineMode::Header => {
                let buf = std::mem::take(&mut self.buf);
                self.builder.set_header(&buf);
            }
            LineMode::Title => {
                let buf = std::mem::take(&mut self.buf);
                self.builder.add_title_part(&buf);
            }
            LineMode::Heading => {
                let buf = std::mem::take(&mut self.buf);
                self.builder.push_heading(&buf);
            }
            LineMode::Subtitle => self.builder.end_subtitle(),
            _ => {}
        }
        self.mode = LineMode::None;
        self.buf.clear();
    }

    // A line without a paragraph marker continues the current mode.
    fn handle_continuation(&mut self, line: &str) {
        match self.mode {
            LineMode::Header | LineMode::Title | LineMode::Heading => {
                self.buf.push(' ');
                self.buf.push_str(line.trim_start());
            }
            LineMode::Subtitle | LineMode::Inline { .. } => {
                // The line break itself separates words.
                self.scan_inline(&format!(" {}", line.trim_start()));
            }
            LineMode::Ignored | LineMode::None => {}
        }
    }

    /// Walk inline text, dispatching backslash markers as they appear.
    fn scan_inline(&mut self, text: &str) {
        let mut rest = text;
        while !rest.is_empty() {
            match rest.find('\\') {
                None => {
                    self.emit_text(rest);
                    break;
                }
                Some(pos) => {
                    let (before, after) = rest.split_at(pos);
                    if !before.is_empty() {
                        self.emit_text(before);
                    }
                    let after = &after[1..];
                    // Nested markers carry a + prefix (e.g. \+wj)
                    let after = after.strip_prefix('+').unwrap_or(after);
                    let marker_len = after
                        .chars()
                        .take_while(|c| c.is_ascii_alphanumeric())
                        .count();
                    if marker_len == 0 {
                        // Stray backslash; keep it as text
                        self.emit_text("\\");
                        rest = after;
                        continue;
                    }
                    let marker = &after[..marker_len];
                    let mut next = &after[marker_len..];
                    let closing = next.starts_with('*');
                    if closing {
                        next = &next[1..];
                    } else if next.starts_with(' ') {
                        // One space after an opening marker is syntax
                        next = &next[1..];
                    }
                    self.handle_inline_marker(marker, closing);
                    rest = next;
                }
            }
        }
    }

    fn handle_inline_marker(&mut self, marker: &str, closing: bool) {
        if self.skip_note {
            if closing && (marker == "x" || marker == "fe") {
                self.skip_note = false;
            }
            return;
        }
        if self.note.is_some() {
            if closing && marker == "f" {
                if let Some(note) = self.note.take() {
                    self.builder.add_footnote(note.caller, &note.text);
                }
            }
            // Footnote-internal markers (fr, ft, fq, ...) drop out; their
            // text stays in the capture.
            return;
        }
        match (marker, closing) {
            ("wj", false) => self.wj = true,
            ("wj", true) => self.wj = false,
            ("f", false) => {
                self.note = Some(NoteCapture {
                    caller: None,
                    text: String::new(),
                    expect_caller: true,
                });
            }
            ("x", false) | ("fe", false) => {
                tracing::warn!("dropping note with unsupported marker '\\{}'", marker);
                self.skip_note = true;
            }
            ("w", false) => self.in_word = true,
            ("w", true) => {
                self.in_word = false;
                self.in_word_attrs = false;
            }
            // Every other character style contributes plain text
            _ => {}
        }
    }

    fn emit_text(&mut self, segment: &str) {
        if self.skip_note {
            return;
        }
        if let Some(note) = self.note.as_mut() {
            let mut text = segment;
            if note.expect_caller {
                let trimmed = text.trim_start();
                if trimmed.is_empty() {
                    return;
                }
                let end = trimmed.find(' ').unwrap_or(trimmed.len());
                note.caller = Some(trimmed[..end].to_string());
                note.expect_caller = false;
                text = &trimmed[end..];
            }
            note.text.push_str(text);
            return;
        }
        if self.in_word_attrs {
            return;
        }
        let mut text = segment;
        if self.in_word {
            // Only the display text before the | attribute separator is
            // content.
            if let Some(pipe) = segment.find('|') {
                self.in_word_attrs = true;
                text = &segment[..pipe];
            }
        }
        match self.mode {
            LineMode::Subtitle => self.builder.push_text(
                text,
                InlineFormat {
                    poem: None,
                    words_of_jesus: self.wj,
                },
            ),
            LineMode::Inline { poem } => self.builder.push_text(
                text,
                InlineFormat {
                    poem,
                    words_of_jesus: self.wj,
                },
            ),
            _ => {}
        }
    }
}

fn parse_verse_number(token: &str) -> Option<u32> {
    // Accept range and segment suffixes ("1-2", "1a") by taking the
    // leading digits.
    let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        ChapterContent, FootnoteReference, FormattedText, InlineItem, RootContent, VerseReference,
    };

    fn first_chapter(tree: &BookTree) -> &crate::types::Chapter {
        tree.content
            .iter()
            .find_map(|c| match c {
                RootContent::Chapter(ch) => Some(ch),
                _ => None,
            })
            .expect("no chapter parsed")
    }

    #[test]
    fn test_basic_book_structure() {
        let usfm = "\\id GEN - Test Translation\n\
                    \\h Genesis\n\
                    \\toc1 Genesis\n\
                    \\mt1 Genesis\n\
                    \\c 1\n\
                    \\s1 The Creation\n\
                    \\b\n\
                    \\m\n\
                    \\v 1 In the beginning God created the heavens and the earth.\n\
                    \\b\n\
                    \\m\n\
                    \\v 2 Now the earth was formless and void.\n";
        let tree = parse_usfm(usfm).unwrap();
        assert_eq!(tree.id, "GEN");
        assert_eq!(tree.header.as_deref(), Some("Genesis"));
        assert_eq!(tree.title.as_deref(), Some("Genesis"));

        let chapter = first_chapter(&tree);
        assert_eq!(chapter.number, 1);
        assert_eq!(
            chapter.content[0],
            ChapterContent::Heading {
                content: vec!["The Creation".to_string()]
            }
        );
        assert_eq!(chapter.content[1], ChapterContent::LineBreak);
        assert_eq!(
            chapter.content[2],
            ChapterContent::Verse {
                number: 1,
                content: vec![InlineItem::Text(
                    "In the beginning God created the heavens and the earth.".to_string()
                )],
            }
        );
        assert_eq!(chapter.content[3], ChapterContent::LineBreak);
        assert!(matches!(
            chapter.content[4],
            ChapterContent::Verse { number: 2, .. }
        ));
    }

    #[test]
    fn test_verse_continues_across_lines() {
        let usfm = "\\id GEN\n\\c 1\n\\p\n\\v 1 First line\nand a wrapped line.\n";
        let tree = parse_usfm(usfm).unwrap();
        let chapter = first_chapter(&tree);
        assert_eq!(
            chapter.content[0],
            ChapterContent::Verse {
                number: 1,
                content: vec![InlineItem::Text("First line and a wrapped line.".to_string())],
            }
        );
    }

    #[test]
    fn test_poetry_paragraphs_merge_within_verse() {
        let usfm = "\\id PSA\n\\c 1\n\\q1\n\\v 1 Blessed is the man\n\\q1 who walks not in counsel\n\\q2 nor stands in the way\n";
        let tree = parse_usfm(usfm).unwrap();
        let chapter = first_chapter(&tree);
        let ChapterContent::Verse { content, .. } = &chapter.content[0] else {
            panic!("expected verse");
        };
        assert_eq!(
            content[0],
            InlineItem::Formatted(FormattedText {
                text: "Blessed is the man who walks not in counsel".to_string(),
                poem: Some(1),
                words_of_jesus: None,
            })
        );
        assert_eq!(
            content[1],
            InlineItem::Formatted(FormattedText {
                text: " nor stands in the way".to_string(),
                poem: Some(2),
                words_of_jesus: None,
            })
        );
    }

    #[test]
    fn test_words_of_jesus_span() {
        let usfm = "\\id MAT\n\\c 5\n\\p\n\\v 3 And he said, \\wj Blessed are the poor in spirit\\wj* to them.\n";
        let tree = parse_usfm(usfm).unwrap();
        let chapter = first_chapter(&tree);
        let ChapterContent::Verse { content, .. } = &chapter.content[0] else {
            panic!("expected verse");
        };
        assert_eq!(content.len(), 3);
        assert_eq!(content[0], InlineItem::Text("And he said, ".to_string()));
        assert_eq!(
            content[1],
            InlineItem::Formatted(FormattedText {
                text: "Blessed are the poor in spirit".to_string(),
                poem: None,
                words_of_jesus: Some(true),
            })
        );
        assert_eq!(content[2], InlineItem::Text(" to them.".to_string()));
    }

    #[test]
    fn test_words_of_jesus_crosses_lines() {
        let usfm = "\\id MAT\n\\c 5\n\\p\n\\v 3 \\wj Blessed are\n\\p the poor\\wj* indeed.\n";
        let tree = parse_usfm(usfm).unwrap();
        let chapter = first_chapter(&tree);
        let ChapterContent::Verse { content, .. } = &chapter.content[0] else {
            panic!("expected verse");
        };
        assert_eq!(
            content[0],
            InlineItem::Formatted(FormattedText {
                text: "Blessed are the poor".to_string(),
                poem: None,
                words_of_jesus: Some(true),
            })
        );
        assert_eq!(content[1], InlineItem::Text(" indeed.".to_string()));
    }

    #[test]
    fn test_footnote_with_internal_markers() {
        let usfm = "\\id GEN\n\\c 1\n\\p\n\\v 1 In the beginning\\f + \\fr 1:1 \\ft Or In a beginning\\f* God created.\n";
        let tree = parse_usfm(usfm).unwrap();
        let chapter = first_chapter(&tree);

        assert_eq!(chapter.footnotes.len(), 1);
        let note = &chapter.footnotes[0];
        assert_eq!(note.caller.as_deref(), Some("+"));
        assert_eq!(note.text, "Or In a beginning");
        assert_eq!(note.reference, VerseReference { chapter: 1, verse: 1 });

        let ChapterContent::Verse { content, .. } = &chapter.content[0] else {
            panic!("expected verse");
        };
        assert_eq!(content[0], InlineItem::Text("In the beginning".to_string()));
        assert_eq!(content[1], InlineItem::Note(FootnoteReference { note_id: 0 }));
        assert_eq!(content[2], InlineItem::Text(" God created.".to_string()));
    }

    #[test]
    fn test_cross_references_are_dropped() {
        let usfm = "\\id GEN\n\\c 1\n\\p\n\\v 1 text\\x - \\xo 1:1 \\xt Jn 1:1\\x* more\n";
        let tree = parse_usfm(usfm).unwrap();
        let chapter = first_chapter(&tree);
        assert!(chapter.footnotes.is_empty());
        let ChapterContent::Verse { content, .. } = &chapter.content[0] else {
            panic!("expected verse");
        };
        assert_eq!(content, &vec![InlineItem::Text("text more".to_string())]);
    }

    #[test]
    fn test_hebrew_subtitle() {
        let usfm = "\\id PSA\n\\c 3\n\\d A Psalm of David, when he fled from Absalom.\n\\q1\n\\v 1 O LORD, how many are my foes!\n";
        let tree = parse_usfm(usfm).unwrap();
        let chapter = first_chapter(&tree);
        assert_eq!(
            chapter.content[0],
            ChapterContent::HebrewSubtitle {
                content: vec![InlineItem::Text(
                    "A Psalm of David, when he fled from Absalom.".to_string()
                )],
            }
        );
        assert!(matches!(
            chapter.content[1],
            ChapterContent::Verse { number: 1, .. }
        ));
    }

    #[test]
    fn test_ignored_markers_produce_nothing() {
        let usfm = "\\id GEN\n\\ide UTF-8\n\\rem Checked 2019\n\\toc1 Genesis\n\\ip Intro paragraph.\n\\c 1\n\\r (Luke 3)\n\\p\n\\v 1 text\n";
        let tree = parse_usfm(usfm).unwrap();
        assert_eq!(tree.content.len(), 1);
        let chapter = first_chapter(&tree);
        assert_eq!(chapter.content.len(), 1);
    }

    #[test]
    fn test_word_attributes_are_stripped() {
        let usfm = "\\id GEN\n\\c 1\n\\p\n\\v 1 In the \\w beginning|strong=\"H7225\"\\w* God created.\n";
        let tree = parse_usfm(usfm).unwrap();
        let chapter = first_chapter(&tree);
        let ChapterContent::Verse { content, .. } = &chapter.content[0] else {
            panic!("expected verse");
        };
        assert_eq!(
            content,
            &vec![InlineItem::Text("In the beginning God created.".to_string())]
        );
    }

    #[test]
    fn test_invalid_chapter_marker_fails() {
        let usfm = "\\id GEN\n\\c one\n";
        let err = parse_usfm(usfm).unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
    }

    #[test]
    fn test_missing_id_fails() {
        let usfm = "\\c 1\n\\p\n\\v 1 orphaned text\n";
        assert_eq!(parse_usfm(usfm).unwrap_err(), PipelineError::MissingBook);
    }

    #[test]
    fn test_multi_level_title() {
        let usfm = "\\id GEN\n\\mt2 The First Book of\n\\mt1 Moses\n\\c 1\n";
        let tree = parse_usfm(usfm).unwrap();
        assert_eq!(tree.title.as_deref(), Some("The First Book of Moses"));
    }
}
