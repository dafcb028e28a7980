//! Page text extraction with glyph provenance.
//!
//! Executes a page's operators with a graphics/text state machine and
//! produces one [`TextChar`] per Unicode character, each remembering which
//! operator, TJ element and glyph drew it. The concatenated text is what
//! pattern matching runs on; provenance is what lets redaction remove the
//! exact glyphs behind a match.
//!
//! Marked content carries text the reading order never shows: the glyphs an
//! `/ActualText` replacement stands in for, and the `/Alt`, `/E` and `/T`
//! strings of property lists. That text is kept in [`PageText::marked`] so
//! it is matched and verified like everything else.

use crate::content::{GraphicsStateStack, Matrix, Operator, TextElement};
use crate::document::{Page, Resources, XObject};
use crate::error::{Error, Result};
use crate::fonts::Font;
use crate::geometry::{Point, Rect};
use crate::object::decode_text_string;
use std::collections::BTreeMap;
use std::ops::Range;

/// Maximum nesting of form XObjects.
pub const MAX_FORM_DEPTH: u32 = 8;

/// Vertical move, as a fraction of the font size, that starts a new line.
const LINE_BREAK_RATIO: f32 = 0.5;
/// Horizontal gap, in em, that separates words.
const WORD_GAP_RATIO: f32 = 0.25;

/// Glyph descent and ascent in text space units, for bounding boxes.
const GLYPH_DESCENT: f32 = -0.2;
const GLYPH_ASCENT: f32 = 0.8;

/// Property list entries that hold text strings.
pub const MARKED_TEXT_KEYS: [&str; 4] = ["ActualText", "Alt", "E", "T"];

/// A glyph drawn by a page-level text-show operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlyphRef {
    /// Index of the show operator in the page's operator list
    pub op_index: usize,
    /// Index in the TJ array (0 for Tj, ' and ")
    pub element: usize,
    /// Index of the character code within the string element
    pub glyph: usize,
}

/// Where an extracted character came from.
#[derive(Debug, Clone, PartialEq)]
pub enum CharSource {
    /// A glyph drawn directly by a page-level show operator
    Glyph(GlyphRef),
    /// Replacement text of a `/ActualText` span covering `glyphs`
    ActualText {
        /// Index of the BDC operator carrying the replacement text
        marker: usize,
        /// Glyphs the replacement text stands for
        glyphs: Vec<GlyphRef>,
    },
    /// Text drawn inside a form XObject
    FormXObject {
        /// Index of the page-level `Do` operator
        op_index: usize,
    },
    /// Separator inserted by the extractor
    Synthetic,
}

/// One extracted Unicode character.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChar {
    /// The character
    pub ch: char,
    /// Glyph origin in user space
    pub origin: Point,
    /// Glyph bounding box in user space
    pub bbox: Rect,
    /// Provenance
    pub source: CharSource,
}

/// What carries a piece of marked-content text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkedSource {
    /// The decoded glyphs covered by an `/ActualText` replacement
    Glyphs,
    /// A string entry of a BDC property list
    Property(String),
}

/// Text attached to marked content rather than drawn in reading order.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkedText {
    /// Index of the BDC operator
    pub marker: usize,
    /// Page-level `Do` operator when the BDC sits inside a form XObject
    pub form_op: Option<usize>,
    /// Carrier of the text
    pub source: MarkedSource,
    /// The text
    pub text: String,
    /// Byte range in `text` of each glyph, for [`MarkedSource::Glyphs`]
    pub glyphs: Vec<(Range<usize>, GlyphRef)>,
    /// Union of the glyph boxes
    pub bbox: Option<Rect>,
}

impl MarkedText {
    /// Glyphs whose text overlaps `start..end`.
    pub fn glyphs_in(&self, start: usize, end: usize) -> impl Iterator<Item = GlyphRef> + '_ {
        self.glyphs
            .iter()
            .filter(move |(range, _)| range.start < end && range.end > start)
            .map(|(_, glyph)| *glyph)
    }
}

/// Text state in effect when a page-level show operator ran.
#[derive(Debug, Clone, PartialEq)]
pub struct ShowState {
    /// Font resource name
    pub font: String,
    /// Font size (Tfs)
    pub size: f32,
    /// Character spacing (Tc)
    pub char_space: f32,
    /// Word spacing (Tw)
    pub word_space: f32,
    /// Horizontal scaling percentage (Tz)
    pub horizontal_scaling: f32,
}

/// Extracted text of one page.
#[derive(Debug, Clone, Default)]
pub struct PageText {
    /// Concatenated text, separators included
    pub text: String,
    /// Characters in text order
    pub chars: Vec<TextChar>,
    /// Byte offset of each char in `text`
    offsets: Vec<usize>,
    /// State of each page-level show operator, by operator index
    pub show_states: BTreeMap<usize, ShowState>,
    /// Marked-content text, in operator order
    pub marked: Vec<MarkedText>,
}

impl PageText {
    fn push(&mut self, c: TextChar) {
        self.offsets.push(self.text.len());
        self.text.push(c.ch);
        self.chars.push(c);
    }

    /// Characters whose bytes lie in `start..end` of [`PageText::text`].
    pub fn chars_in(&self, start: usize, end: usize) -> &[TextChar] {
        let first = self.offsets.partition_point(|&o| o < start);
        let last = self.offsets.partition_point(|&o| o < end);
        &self.chars[first..last.max(first)]
    }

    /// Whether nothing was extracted.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

/// Extract the text of a page, including form XObject and ActualText text.
///
/// Callers outside the crate go through `Document::page_text`, which
/// checks the copy permission.
///
/// # Errors
///
/// - [`Error::Pattern`] if text is shown with a font missing from the resources
/// - [`Error::RecursionLimitExceeded`] if form XObjects nest deeper than [`MAX_FORM_DEPTH`]
pub(crate) fn extract_page_text(page: &Page, page_index: usize) -> Result<PageText> {
    let mut extractor = TextExtractor::new(page_index);
    extractor.run(&page.operators, &page.resources, GraphicsStateStack::default(), None, 0)?;
    log::debug!(
        "Extracted {} chars from page {}",
        extractor.out.chars.len(),
        page_index
    );
    Ok(extractor.out)
}

/// An open `/ActualText` span.
struct ActualTextGroup {
    marker: usize,
    form_op: Option<usize>,
    text: String,
    glyphs: Vec<GlyphRef>,
    /// What the covered glyphs decode to
    decoded: String,
    decoded_glyphs: Vec<(Range<usize>, GlyphRef)>,
    first_origin: Option<Point>,
    bbox: Option<Rect>,
    end: Option<Point>,
    size: f32,
}

struct TextExtractor {
    page_index: usize,
    out: PageText,
    /// End of the last glyph and its effective size, for separator decisions
    last_end: Option<(Point, f32)>,
    groups: Vec<ActualTextGroup>,
}

/// Per-content-stream execution state.
struct Frame<'r> {
    resources: &'r Resources,
    stack: GraphicsStateStack,
    text_matrix: Matrix,
    line_matrix: Matrix,
    /// Page-level `Do` operator when running inside a form
    form_op: Option<usize>,
    /// Marked content nesting: index into `groups` for ActualText spans
    marked: Vec<Option<usize>>,
}

impl TextExtractor {
    fn new(page_index: usize) -> Self {
        Self {
            page_index,
            out: PageText::default(),
            last_end: None,
            groups: Vec::new(),
        }
    }

    fn run(
        &mut self,
        operators: &[Operator],
        resources: &Resources,
        stack: GraphicsStateStack,
        form_op: Option<usize>,
        depth: u32,
    ) -> Result<()> {
        let mut frame = Frame {
            resources,
            stack,
            text_matrix: Matrix::identity(),
            line_matrix: Matrix::identity(),
            form_op,
            marked: Vec::new(),
        };

        for (op_index, op) in operators.iter().enumerate() {
            self.execute(&mut frame, op_index, op, depth)?;
        }

        // Unbalanced BDC at end of stream
        while let Some(entry) = frame.marked.pop() {
            if let Some(group) = entry {
                self.emit_group(group);
            }
        }
        Ok(())
    }

    fn execute(&mut self, frame: &mut Frame<'_>, op_index: usize, op: &Operator, depth: u32) -> Result<()> {
        match op {
            Operator::SaveState => frame.stack.save(),
            Operator::RestoreState => frame.stack.restore(),
            Operator::Cm { a, b, c, d, e, f } => {
                let state = frame.stack.current_mut();
                state.ctm = Matrix::new(*a, *b, *c, *d, *e, *f).multiply(&state.ctm);
            },
            Operator::BeginText => {
                frame.text_matrix = Matrix::identity();
                frame.line_matrix = Matrix::identity();
            },
            Operator::EndText => {},
            Operator::Td { tx, ty } => move_line(frame, *tx, *ty),
            Operator::TD { tx, ty } => {
                frame.stack.current_mut().text.leading = -ty;
                move_line(frame, *tx, *ty);
            },
            Operator::Tm { a, b, c, d, e, f } => {
                frame.line_matrix = Matrix::new(*a, *b, *c, *d, *e, *f);
                frame.text_matrix = frame.line_matrix;
            },
            Operator::TStar => next_line(frame),
            Operator::Tc { char_space } => frame.stack.current_mut().text.char_space = *char_space,
            Operator::Tw { word_space } => frame.stack.current_mut().text.word_space = *word_space,
            Operator::Tz { scale } => frame.stack.current_mut().text.horizontal_scaling = *scale,
            Operator::TL { leading } => frame.stack.current_mut().text.leading = *leading,
            Operator::Ts { rise } => frame.stack.current_mut().text.rise = *rise,
            Operator::Tr { render } => frame.stack.current_mut().text.render_mode = *render,
            Operator::Tf { font, size } => {
                let text = &mut frame.stack.current_mut().text;
                text.font_name = Some(font.clone());
                text.font_size = *size;
            },
            Operator::Tj { text } => self.show(frame, op_index, 0, text)?,
            Operator::Quote { text } => {
                next_line(frame);
                self.show(frame, op_index, 0, text)?;
            },
            Operator::DoubleQuote {
                word_space,
                char_space,
                text,
            } => {
                let state = &mut frame.stack.current_mut().text;
                state.word_space = *word_space;
                state.char_space = *char_space;
                next_line(frame);
                self.show(frame, op_index, 0, text)?;
            },
            Operator::TJ { array } => {
                for (element, item) in array.iter().enumerate() {
                    match item {
                        TextElement::String(bytes) => self.show(frame, op_index, element, bytes)?,
                        TextElement::Offset(n) => {
                            let text = &frame.stack.current().text;
                            let tx = -n / 1000.0 * text.font_size * text.horizontal_scaling / 100.0;
                            frame.text_matrix = Matrix::translation(tx, 0.0).multiply(&frame.text_matrix);
                        },
                    }
                }
            },
            Operator::BeginMarkedContent { .. } => frame.marked.push(None),
            Operator::BeginMarkedContentDict { properties, .. } => {
                // Nested ActualText is covered by the enclosing replacement.
                let active = frame.marked.iter().any(Option::is_some);
                let opens_group = !active && op.actual_text().is_some();
                if let Some(dict) = properties.as_dict() {
                    for key in MARKED_TEXT_KEYS {
                        let Some(bytes) = dict.get(key).and_then(|v| v.as_string()) else {
                            continue;
                        };
                        if key == "ActualText" && opens_group {
                            continue;
                        }
                        self.out.marked.push(MarkedText {
                            marker: op_index,
                            form_op: frame.form_op,
                            source: MarkedSource::Property(key.to_string()),
                            text: decode_text_string(bytes),
                            glyphs: Vec::new(),
                            bbox: None,
                        });
                    }
                }
                let entry = match op.actual_text() {
                    Some(bytes) if opens_group => {
                        self.groups.push(ActualTextGroup {
                            marker: op_index,
                            form_op: frame.form_op,
                            text: decode_text_string(bytes),
                            glyphs: Vec::new(),
                            decoded: String::new(),
                            decoded_glyphs: Vec::new(),
                            first_origin: None,
                            bbox: None,
                            end: None,
                            size: frame.stack.current().text.font_size,
                        });
                        Some(self.groups.len() - 1)
                    },
                    _ => None,
                };
                frame.marked.push(entry);
            },
            Operator::EndMarkedContent => {
                if let Some(Some(group)) = frame.marked.pop() {
                    self.emit_group(group);
                }
            },
            Operator::Do { name } => self.paint_form(frame, op_index, name, depth)?,
            _ => {},
        }
        Ok(())
    }

    fn paint_form(&mut self, frame: &mut Frame<'_>, op_index: usize, name: &str, depth: u32) -> Result<()> {
        let resources: &Resources = frame.resources;
        let Some(XObject::Form(form)) = resources.xobjects.get(name) else {
            return Ok(());
        };
        if depth + 1 > MAX_FORM_DEPTH {
            return Err(Error::RecursionLimitExceeded(MAX_FORM_DEPTH));
        }
        let mut stack = GraphicsStateStack::default();
        *stack.current_mut() = frame.stack.current().clone();
        stack.current_mut().ctm = form.matrix.multiply(&frame.stack.current().ctm);

        let outer = frame.form_op.unwrap_or(op_index);
        self.run(&form.operators, &form.resources, stack, Some(outer), depth + 1)
    }

    fn show(&mut self, frame: &mut Frame<'_>, op_index: usize, element: usize, bytes: &[u8]) -> Result<()> {
        let text = frame.stack.current().text.clone();
        let font_name = text.font_name.clone().ok_or_else(|| Error::Pattern {
            page_index: self.page_index,
            reason: "text shown with no font selected".to_string(),
        })?;
        let resources: &Resources = frame.resources;
        let font: &Font = resources.fonts.get(&font_name).ok_or_else(|| Error::Pattern {
            page_index: self.page_index,
            reason: format!("font /{} is not in the resources", font_name),
        })?;

        if frame.form_op.is_none() {
            self.out.show_states.entry(op_index).or_insert_with(|| ShowState {
                font: font_name.clone(),
                size: text.font_size,
                char_space: text.char_space,
                word_space: text.word_space,
                horizontal_scaling: text.horizontal_scaling,
            });
        }

        let th = text.horizontal_scaling / 100.0;
        let ctm = frame.stack.current().ctm;
        let open_group = frame.marked.iter().rev().flatten().next().copied();

        for (glyph, (code, _, len)) in font.codes(bytes).into_iter().enumerate() {
            let params = Matrix::new(text.font_size * th, 0.0, 0.0, text.font_size, 0.0, text.rise);
            let trm = params.multiply(&frame.text_matrix).multiply(&ctm);
            let width = font.width(code) / 1000.0;

            let origin = trm.transform_point(0.0, 0.0);
            let bbox = Rect::bounding([
                trm.transform_point(0.0, GLYPH_DESCENT),
                trm.transform_point(width, GLYPH_DESCENT),
                trm.transform_point(0.0, GLYPH_ASCENT),
                trm.transform_point(width, GLYPH_ASCENT),
            ])
            .unwrap_or_else(|| Rect::new(origin.x, origin.y, 0.0, 0.0));
            let size = (trm.c * trm.c + trm.d * trm.d).sqrt();

            let mut tx = width * text.font_size + text.char_space;
            if font.is_word_space(code, len) {
                tx += text.word_space;
            }
            frame.text_matrix = Matrix::translation(tx * th, 0.0).multiply(&frame.text_matrix);
            let end = params.multiply(&frame.text_matrix).multiply(&ctm).transform_point(0.0, 0.0);

            let glyph_ref = GlyphRef {
                op_index,
                element,
                glyph,
            };

            if let Some(g) = open_group {
                let group = &mut self.groups[g];
                if let Some(prev) = group.end {
                    if let Some(sep) = gap_separator(prev, group.size, origin, size, group.decoded.chars().last()) {
                        group.decoded.push(sep);
                    }
                }
                let start = group.decoded.len();
                group.decoded.extend(font.decode(code).chars().filter(|&c| is_extractable(c)));
                let stop = group.decoded.len();
                if stop > start {
                    group.decoded_glyphs.push((start..stop, glyph_ref));
                }
                group.glyphs.push(glyph_ref);
                group.first_origin.get_or_insert(origin);
                group.bbox = Some(match group.bbox {
                    Some(b) => b.union(&bbox),
                    None => bbox,
                });
                group.end = Some(end);
                group.size = size;
                continue;
            }

            let source = match frame.form_op {
                Some(op) => CharSource::FormXObject { op_index: op },
                None => CharSource::Glyph(glyph_ref),
            };
            self.separate(origin, size);
            for ch in font.decode(code).chars() {
                if is_extractable(ch) {
                    self.out.push(TextChar {
                        ch,
                        origin,
                        bbox,
                        source: source.clone(),
                    });
                }
            }
            self.last_end = Some((end, size));
        }
        Ok(())
    }

    /// Insert a newline or space when `origin` does not continue the last glyph.
    fn separate(&mut self, origin: Point, size: f32) {
        let Some((prev, prev_size)) = self.last_end else {
            return;
        };
        let Some(separator) = gap_separator(prev, prev_size, origin, size, self.out.text.chars().last()) else {
            return;
        };
        self.out.push(TextChar {
            ch: separator,
            origin,
            bbox: Rect::new(origin.x, origin.y, 0.0, 0.0),
            source: CharSource::Synthetic,
        });
    }

    fn emit_group(&mut self, index: usize) {
        let group = &mut self.groups[index];
        let marker = group.marker;
        let glyphs = std::mem::take(&mut group.glyphs);
        let text = std::mem::take(&mut group.text);
        let form_op = group.form_op;
        let size = group.size;
        let decoded = std::mem::take(&mut group.decoded);
        if !decoded.is_empty() {
            self.out.marked.push(MarkedText {
                marker,
                form_op,
                source: MarkedSource::Glyphs,
                text: decoded,
                glyphs: std::mem::take(&mut group.decoded_glyphs),
                bbox: group.bbox,
            });
        }
        let group = &self.groups[index];
        let (Some(origin), Some(bbox), Some(end)) = (group.first_origin, group.bbox, group.end) else {
            // Replacement text for an empty span is still text.
            if !text.is_empty() {
                let at = self.last_end.map(|(p, _)| p).unwrap_or(Point::new(0.0, 0.0));
                self.push_group_chars(&text, at, Rect::new(at.x, at.y, 0.0, 0.0), marker, glyphs, form_op);
            }
            return;
        };
        self.separate(origin, size);
        self.push_group_chars(&text, origin, bbox, marker, glyphs, form_op);
        self.last_end = Some((end, size));
    }

    fn push_group_chars(
        &mut self,
        text: &str,
        origin: Point,
        bbox: Rect,
        marker: usize,
        glyphs: Vec<GlyphRef>,
        form_op: Option<usize>,
    ) {
        let source = match form_op {
            Some(op_index) => CharSource::FormXObject { op_index },
            None => CharSource::ActualText { marker, glyphs },
        };
        for ch in text.chars().filter(|&c| is_extractable(c)) {
            self.out.push(TextChar {
                ch,
                origin,
                bbox,
                source: source.clone(),
            });
        }
    }
}

/// Separator implied by the gap between `prev` and `origin`, unless `last` already is one.
fn gap_separator(prev: Point, prev_size: f32, origin: Point, size: f32, last: Option<char>) -> Option<char> {
    let size = size.max(prev_size);
    let dy = (origin.y - prev.y).abs();
    let dx = (origin.x - prev.x).abs();

    let separator = if dy > LINE_BREAK_RATIO * size {
        '\n'
    } else if dx > WORD_GAP_RATIO * size {
        ' '
    } else {
        return None;
    };
    if last == Some(separator) || (separator == ' ' && last.is_some_and(char::is_whitespace)) {
        return None;
    }
    Some(separator)
}

fn move_line(frame: &mut Frame<'_>, tx: f32, ty: f32) {
    frame.line_matrix = Matrix::translation(tx, ty).multiply(&frame.line_matrix);
    frame.text_matrix = frame.line_matrix;
}

fn next_line(frame: &mut Frame<'_>) {
    let leading = frame.stack.current().text.leading;
    move_line(frame, 0.0, -leading);
}

/// NUL and control characters other than tab/newline are encoding artifacts.
fn is_extractable(ch: char) -> bool {
    !(ch == '\0' || (ch.is_control() && ch != '\t' && ch != '\n' && ch != '\r'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FormXObject;

    fn resources() -> Resources {
        Resources::new().with_font("F1", Font::simple("Helvetica"))
    }

    fn extract(content: &[u8]) -> PageText {
        let page = Page::from_content(content, resources()).unwrap();
        extract_page_text(&page, 0).unwrap()
    }

    #[test]
    fn test_extract_simple_text() {
        let text = extract(b"BT /F1 12 Tf 72 700 Td (Hello) Tj ET");
        assert_eq!(text.text, "Hello");
        assert_eq!(
            text.chars[1].source,
            CharSource::Glyph(GlyphRef {
                op_index: 3,
                element: 0,
                glyph: 1
            })
        );
        assert_eq!(text.chars[0].origin, Point::new(72.0, 700.0));
        // Default width 500 at 12pt advances 6pt per glyph.
        assert_eq!(text.chars[1].origin, Point::new(78.0, 700.0));
    }

    #[test]
    fn test_consecutive_shows_are_contiguous() {
        let text = extract(b"BT /F1 12 Tf 72 700 Td (AB) Tj (CD) Tj ET");
        assert_eq!(text.text, "ABCD");
    }

    #[test]
    fn test_tj_gap_inserts_space() {
        let text = extract(b"BT /F1 12 Tf 72 700 Td [(Hello) -600 (World)] TJ ET");
        assert_eq!(text.text, "Hello World");
        assert_eq!(text.chars[5].source, CharSource::Synthetic);
        assert_eq!(
            text.chars[6].source,
            CharSource::Glyph(GlyphRef {
                op_index: 3,
                element: 2,
                glyph: 0
            })
        );
    }

    #[test]
    fn test_small_kerning_is_not_a_space() {
        let text = extract(b"BT /F1 12 Tf [(A) -50 (B)] TJ ET");
        assert_eq!(text.text, "AB");
    }

    #[test]
    fn test_line_change_inserts_newline() {
        let text = extract(b"BT /F1 12 Tf 72 700 Td (A) Tj 0 -20 Td (B) Tj ET");
        assert_eq!(text.text, "A\nB");
    }

    #[test]
    fn test_quote_operators_move_to_next_line() {
        let text = extract(b"BT /F1 12 Tf 14 TL 72 700 Td (A) Tj (B) ' 1 2 (C) \" ET");
        assert_eq!(text.text, "A\nB\nC");
        assert_eq!(text.show_states[&6].word_space, 1.0);
        assert_eq!(text.show_states[&6].char_space, 2.0);
    }

    #[test]
    fn test_invisible_text_is_extracted() {
        let text = extract(b"BT 3 Tr /F1 12 Tf (Hidden) Tj ET");
        assert_eq!(text.text, "Hidden");
    }

    #[test]
    fn test_missing_font_is_pattern_error() {
        let page = Page::from_content(b"BT /F9 12 Tf (x) Tj ET", resources()).unwrap();
        assert!(matches!(
            extract_page_text(&page, 4),
            Err(Error::Pattern { page_index: 4, .. })
        ));
    }

    #[test]
    fn test_no_font_selected_is_pattern_error() {
        let page = Page::from_content(b"BT (x) Tj ET", resources()).unwrap();
        assert!(matches!(extract_page_text(&page, 0), Err(Error::Pattern { .. })));
    }

    #[test]
    fn test_show_state_records_spacing() {
        let text = extract(b"BT /F1 10 Tf 0.5 Tc 2 Tw 80 Tz (A) Tj ET");
        let state = &text.show_states[&5];
        assert_eq!(state.font, "F1");
        assert_eq!(state.size, 10.0);
        assert_eq!(state.char_space, 0.5);
        assert_eq!(state.word_space, 2.0);
        assert_eq!(state.horizontal_scaling, 80.0);
    }

    #[test]
    fn test_actual_text_replaces_glyphs() {
        let font = Font::simple("ABCDEF+Lig").with_mapping(1, "\u{FFFD}").with_embedded_glyph(1, "g1", vec![]);
        let resources = Resources::new().with_font("F1", Font::simple("Helvetica")).with_font("F2", font);
        let page = Page::from_content(
            b"BT /F1 12 Tf (A) Tj /F2 12 Tf /Span <</ActualText <FEFF00660069>>> BDC <0101> Tj EMC ET",
            resources,
        )
        .unwrap();
        let text = extract_page_text(&page, 0).unwrap();
        assert_eq!(text.text, "Afi");
        match &text.chars[1].source {
            CharSource::ActualText { marker, glyphs } => {
                assert_eq!(*marker, 4);
                assert_eq!(glyphs.len(), 2);
                assert_eq!(glyphs[1].glyph, 1);
            },
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn test_glyphs_under_actual_text_are_kept_as_marked_text() {
        let text = extract(b"BT /F1 12 Tf /Span <</ActualText (hello)>> BDC (AB) Tj ( C) Tj EMC ET");
        assert_eq!(text.text, "hello");
        assert_eq!(text.marked.len(), 1);
        let marked = &text.marked[0];
        assert_eq!(marked.source, MarkedSource::Glyphs);
        assert_eq!(marked.marker, 2);
        assert_eq!(marked.text, "AB C");
        assert!(marked.bbox.is_some());
        let glyphs: Vec<GlyphRef> = marked.glyphs_in(3, 4).collect();
        assert_eq!(
            glyphs,
            vec![GlyphRef {
                op_index: 4,
                element: 0,
                glyph: 1
            }]
        );
    }

    #[test]
    fn test_property_strings_are_marked_text() {
        let text = extract(
            b"BT /F1 12 Tf /Span <</Alt (Photo) /E (expansion) /Lang (en)>> BDC (x) Tj EMC \
              /P <</ActualText (outer)>> BDC /Span <</ActualText (inner)>> BDC (y) Tj EMC EMC ET",
        );
        assert_eq!(text.text, "xouter");
        let props: Vec<(&MarkedSource, &str)> = text
            .marked
            .iter()
            .filter(|m| m.source != MarkedSource::Glyphs)
            .map(|m| (&m.source, m.text.as_str()))
            .collect();
        assert_eq!(
            props,
            vec![
                (&MarkedSource::Property("Alt".to_string()), "Photo"),
                (&MarkedSource::Property("E".to_string()), "expansion"),
                (&MarkedSource::Property("ActualText".to_string()), "inner"),
            ]
        );
        assert_eq!(text.marked[0].marker, 2);
    }

    #[test]
    fn test_form_xobject_text() {
        let form = FormXObject::from_content(b"BT /F1 12 Tf (Inner) Tj ET", resources()).unwrap();
        let page_resources = resources().with_xobject("Fm1", XObject::Form(form));
        let page = Page::from_content(b"q 1 0 0 1 100 100 cm /Fm1 Do Q", page_resources).unwrap();
        let text = extract_page_text(&page, 0).unwrap();
        assert_eq!(text.text, "Inner");
        assert_eq!(text.chars[0].source, CharSource::FormXObject { op_index: 2 });
        assert_eq!(text.chars[0].origin, Point::new(100.0, 100.0));
        assert!(text.show_states.is_empty());
    }

    #[test]
    fn test_self_referencing_form_hits_recursion_limit() {
        let inner = FormXObject::from_content(b"/Loop Do", Resources::new()).unwrap();
        // Each level references the next through its own resources.
        let mut form = inner;
        for _ in 0..10 {
            let resources = Resources::new().with_xobject("Loop", XObject::Form(form));
            form = FormXObject::from_content(b"/Loop Do", resources).unwrap();
        }
        let page = Page::from_content(b"/Loop Do", Resources::new().with_xobject("Loop", XObject::Form(form))).unwrap();
        assert!(matches!(
            extract_page_text(&page, 0),
            Err(Error::RecursionLimitExceeded(MAX_FORM_DEPTH))
        ));
    }

    #[test]
    fn test_composite_font_glyph_indices() {
        let font = Font::composite("Identity").with_mapping(0x0102, "X").with_mapping(0x0304, "Y");
        let resources = Resources::new().with_font("F0", font);
        let page = Page::from_content(b"BT /F0 12 Tf <01020304> Tj ET", resources).unwrap();
        let text = extract_page_text(&page, 0).unwrap();
        assert_eq!(text.text, "XY");
        assert_eq!(
            text.chars[1].source,
            CharSource::Glyph(GlyphRef {
                op_index: 2,
                element: 0,
                glyph: 1
            })
        );
    }

    #[test]
    fn test_chars_in_byte_range() {
        let text = extract(b"BT /F1 12 Tf [(PAN) -600 (ABC)] TJ ET");
        assert_eq!(text.text, "PAN ABC");
        let chars: String = text.chars_in(4, 7).iter().map(|c| c.ch).collect();
        assert_eq!(chars, "ABC");
        assert!(text.chars_in(7, 7).is_empty());
    }

    #[test]
    fn test_bbox_covers_glyph() {
        let text = extract(b"BT /F1 10 Tf 100 200 Td (A) Tj ET");
        let bbox = text.chars[0].bbox;
        assert!((bbox.left() - 100.0).abs() < 1e-4);
        assert!((bbox.right() - 105.0).abs() < 1e-4);
        assert!((bbox.bottom() - 198.0).abs() < 1e-4);
        assert!((bbox.top() - 208.0).abs() < 1e-4);
    }
}
