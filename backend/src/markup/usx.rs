//! USX (XML) scripture parser
//!
//! Walks a USX document in a single streaming pass and assembles the parse
//! tree through [`BookBuilder`]. Chapters and verses are milestone elements
//! whose boundaries cross `<para>` elements, so the walker keeps the open
//! verse in the builder state instead of relying on element nesting.

use std::collections::HashSet;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::markup::content::{BookBuilder, InlineFormat};
use crate::types::{BookTree, PipelineError};

/// `<para>` styles that produce no output: introductory material, running
/// heads and footers, tables of contents, parallel references. The `h` and
/// `mt1`-`mt3` styles also appear here because they emit nothing into the
/// chapter body; they are read separately for the header and title.
pub const IGNORED_PARA_STYLES: &[&str] = &[
    "ide", "rem", "h", "h1", "h2", "h3", "h4", "toc1", "toc2", "toc3", "toca1", "toca2", "toca3",
    "imt", "imt1", "imt2", "imt3", "imt4", "is", "is1", "is2", "is3", "is4", "ip", "ipi", "im",
    "imi", "ipq", "imq", "ipr", "iq", "iq1", "iq2", "iq3", "iq4", "ib", "ili", "ili1", "ili2",
    "ili3", "ili4", "iot", "io", "io1", "io2", "io3", "io4", "iex", "imte", "ie", "mt", "mt1",
    "mt2", "mt3", "mt4", "mte", "mte1", "mte2", "mte3", "mte4", "cl", "cd", "r",
];

/// Ordinary paragraph styles whose inline content flows into the open verse.
/// Styles outside this list (and every other handled set) are absorbed the
/// same way but logged once per book.
const INLINE_PARA_STYLES: &[&str] = &[
    "p", "m", "po", "pr", "cls", "pmo", "pm", "pmc", "pmr", "pi", "pi1", "pi2", "pi3", "mi", "nb",
    "pc", "ph", "ph1", "ph2", "ph3", "lit", "li", "li1", "li2", "li3", "li4",
];

/// What the text content of the current `<para>` is feeding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParaMode {
    /// Not inside a paragraph
    None,
    /// `h`: running header
    Header,
    /// `mt1`-`mt3`: a major-title part
    Title,
    /// `s1`-`s4`: a section heading
    Heading,
    /// `d`: Hebrew subtitle
    Subtitle,
    /// Ignore-list style; content dropped
    Ignored,
    /// Everything else: inline content of the open verse
    Inline { poem: Option<u8> },
}

enum NoteState {
    None,
    /// A translator footnote (`style="f"`) being captured
    Capture { caller: Option<String>, text: String },
    /// Any other note style; content dropped
    Skip,
}

struct UsxParser {
    builder: BookBuilder,
    para: ParaMode,
    para_buf: String,
    // One entry per open <char>, true when its style is wj
    char_stack: Vec<bool>,
    wj_depth: usize,
    note: NoteState,
    warned_styles: HashSet<String>,
}

/// Parse a USX document into a book parse tree.
pub fn parse_usx(content: &str) -> Result<BookTree, PipelineError> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(false);

    let mut parser = UsxParser {
        builder: BookBuilder::new(),
        para: ParaMode::None,
        para_buf: String::new(),
        char_stack: Vec::new(),
        wj_depth: 0,
        note: NoteState::None,
        warned_styles: HashSet::new(),
    };

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => parser.handle_start(e, false)?,
            Ok(Event::Empty(ref e)) => parser.handle_start(e, true)?,
            Ok(Event::End(ref e)) => {
                let name = e.name();
                parser.handle_end(name.as_ref());
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| parse_error(&reader, err.to_string()))?;
                parser.handle_text(&text);
            }
            Ok(Event::CData(ref e)) => {
                let raw = e.clone().into_inner();
                let text = String::from_utf8_lossy(&raw).into_owned();
                parser.handle_text(&text);
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(parse_error(&reader, err.to_string())),
            _ => {}
        }
        buf.clear();
    }

    parser.builder.finish()
}

fn parse_error(reader: &Reader<&[u8]>, detail: String) -> PipelineError {
    PipelineError::Parse {
        detail,
        location: format!("byte {}", reader.buffer_position()),
    }
}

/// Get an attribute value from a start element
fn get_attribute(element: &BytesStart, attr_name: &[u8]) -> Option<String> {
    element
        .attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref() == attr_name)
        .map(|a| {
            a.unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_default()
        })
}

impl UsxParser {
    fn handle_start(&mut self, e: &BytesStart, empty: bool) -> Result<(), PipelineError> {
        match e.name().as_ref() {
            b"book" => {
                match get_attribute(e, b"code") {
                    Some(code) if !code.trim().is_empty() => self.builder.set_id(&code),
                    _ => return Err(PipelineError::MissingBook),
                }
                // The book element's text content (file description) is not
                // part of any paragraph and falls through untouched.
            }
            b"chapter" => {
                // End-markers carry eid and open nothing.
                if get_attribute(e, b"eid").is_some() {
                    return Ok(());
                }
                match get_attribute(e, b"number").and_then(|n| n.trim().parse::<u32>().ok()) {
                    Some(number) => self.builder.start_chapter(number),
                    None => tracing::warn!("chapter element without a usable number, ignoring"),
                }
            }
            b"verse" => {
                if get_attribute(e, b"eid").is_some() {
                    self.builder.end_verse();
                    return Ok(());
                }
                match get_attribute(e, b"number").and_then(|n| n.trim().parse::<u32>().ok()) {
                    Some(number) => self.builder.start_verse(number),
                    None => {
                        tracing::warn!("verse element without a usable number, dropping");
                        self.builder.suppress_verse();
                    }
                }
            }
            b"para" => {
                let style = get_attribute(e, b"style").unwrap_or_default();
                self.enter_para(&style);
                // A self-closing para has no content events and no end
                // event; only its side effects (line break) matter.
                if empty {
                    self.leave_para();
                }
            }
            b"char" => {
                if empty || !matches!(self.note, NoteState::None) {
                    return Ok(());
                }
                let is_wj = get_attribute(e, b"style").as_deref() == Some("wj");
                self.char_stack.push(is_wj);
                if is_wj {
                    self.wj_depth += 1;
                }
            }
            b"note" => {
                if empty {
                    return Ok(());
                }
                let style = get_attribute(e, b"style").unwrap_or_default();
                if style == "f" {
                    self.note = NoteState::Capture {
                        caller: get_attribute(e, b"caller"),
                        text: String::new(),
                    };
                } else {
                    tracing::warn!("dropping note with unsupported style '{}'", style);
                    self.note = NoteState::Skip;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_end(&mut self, name: &[u8]) {
        match name {
            b"para" => {
                self.leave_para();
            }
            b"char" => {
                if matches!(self.note, NoteState::None) {
                    if let Some(was_wj) = self.char_stack.pop() {
                        if was_wj {
                            self.wj_depth -= 1;
                        }
                    }
                }
            }
            b"note" => match std::mem::replace(&mut self.note, NoteState::None) {
                NoteState::Capture { caller, text } => {
                    self.builder.add_footnote(caller, &text);
                }
                NoteState::Skip | NoteState::None => {}
            },
            _ => {}
        }
    }

    fn handle_text(&mut self, text: &str) {
        match &mut self.note {
            NoteState::Capture { text: buf, .. } => {
                buf.push_str(text);
                return;
            }
            NoteState::Skip => return,
            NoteState::None => {}
        }

        match self.para {
            ParaMode::Header | ParaMode::Title | ParaMode::Heading => {
                self.para_buf.push_str(text);
            }
            ParaMode::Subtitle => self.builder.push_text(
                text,
                InlineFormat {
                    poem: None,
                    words_of_jesus: self.wj_depth > 0,
                },
            ),
            ParaMode::Inline { poem } => self.builder.push_text(
                text,
                InlineFormat {
                    poem,
                    words_of_jesus: self.wj_depth > 0,
                },
            ),
            ParaMode::Ignored | ParaMode::None => {}
        }
    }

    fn enter_para(&mut self, style: &str) {
        self.para_buf.clear();
        self.para = match style {
            "h" => ParaMode::Header,
            "mt1" | "mt2" | "mt3" => ParaMode::Title,
            "s" | "s1" | "s2" | "s3" | "s4" => ParaMode::Heading,
            "b" => {
                self.builder.push_line_break();
                ParaMode::Ignored
            }
            "d" => {
                self.builder.start_subtitle();
                ParaMode::Subtitle
            }
            "q" | "q1" => self.inline_para(Some(1)),
            "q2" => self.inline_para(Some(2)),
            "q3" => self.inline_para(Some(3)),
            "q4" => self.inline_para(Some(4)),
            s if IGNORED_PARA_STYLES.contains(&s) => ParaMode::Ignored,
            s if INLINE_PARA_STYLES.contains(&s) => self.inline_para(None),
            s => {
                if self.warned_styles.insert(s.to_string()) {
                    tracing::warn!("unhandled para style '{}', treating as inline paragraph", s);
                }
                self.inline_para(None)
            }
        };
    }

    fn inline_para(&mut self, poem: Option<u8>) -> ParaMode {
        self.builder.mark_paragraph_boundary();
        ParaMode::Inline { poem }
    }

    fn leave_para(&mut self) {
        match self.para {
            ParaMode::Header => {
                let buf = std::mem::take(&mut self.para_buf);
                self.builder.set_header(&buf);
            }
            ParaMode::Title => {
                let buf = std::mem::take(&mut self.para_buf);
                self.builder.add_title_part(&buf);
            }
            ParaMode::Heading => {
                let buf = std::mem::take(&mut self.para_buf);
                self.builder.push_heading(&buf);
            }
            ParaMode::Subtitle => self.builder.end_subtitle(),
            _ => {}
        }
        self.para = ParaMode::None;
        self.para_buf.clear();
    }
}
