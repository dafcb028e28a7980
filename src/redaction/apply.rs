//! Structural removal of located content.
//!
//! Glyph bytes are spliced out of show operators, which are rewritten as
//! `TJ` with a compensating offset in place of every removed glyph, so
//! whatever follows on the line keeps its position. Nothing is painted
//! over: the bytes are gone from the content stream.

use std::collections::{BTreeMap, BTreeSet};

use crate::content::{GraphicsStateStack, Operator, TextElement};
use crate::document::{Page, Resources};
use crate::error::{Error, Result};
use crate::extractors::{PageText, ShowState};
use crate::fonts::Font;
use crate::geometry::Rect;
use crate::patterns::PatternKind;

use super::audit::{Carrier, RedactionRecord};
use super::locator::{OperatorRef, OperatorTarget};

/// A located match ready for removal.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedSpan {
    /// Recognizer that matched; `None` for area removal
    pub pattern_kind: Option<PatternKind>,
    /// Content behind the match
    pub refs: Vec<OperatorRef>,
    /// Union of the glyph boxes
    pub bbox: Option<Rect>,
}

/// Everything to remove from one page, keyed by original operator index.
#[derive(Debug, Default)]
pub(crate) struct EditPlan {
    /// op -> element -> glyph indices
    glyphs: BTreeMap<usize, BTreeMap<usize, BTreeSet<usize>>>,
    /// op -> property list keys to remove
    properties: BTreeMap<usize, BTreeSet<String>>,
    dropped: BTreeSet<usize>,
}

impl EditPlan {
    pub fn add(&mut self, r: &OperatorRef) {
        match &r.target {
            OperatorTarget::Glyphs { element, glyphs } => {
                self.glyphs
                    .entry(r.op_index)
                    .or_default()
                    .entry(*element)
                    .or_default()
                    .extend(glyphs.clone());
            },
            OperatorTarget::ActualText => {
                self.properties.entry(r.op_index).or_default().insert("ActualText".to_string());
            },
            OperatorTarget::Property { key } => {
                self.properties.entry(r.op_index).or_default().insert(key.clone());
            },
        }
    }

    /// Remove a whole operator (image painting).
    pub fn drop_operator(&mut self, op_index: usize) {
        self.dropped.insert(op_index);
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty() && self.properties.is_empty() && self.dropped.is_empty()
    }
}

/// Removes located content from pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralRedactor;

impl StructuralRedactor {
    /// Remove every located span from `page` and return one record per span.
    ///
    /// `page_text` must be the extraction of `page` the spans were located in.
    /// An empty `spans` leaves the page untouched.
    pub fn apply(
        page: &mut Page,
        page_index: usize,
        page_text: &PageText,
        spans: &[LocatedSpan],
    ) -> Result<Vec<RedactionRecord>> {
        if spans.is_empty() {
            return Ok(Vec::new());
        }

        let mut plan = EditPlan::default();
        for span in spans {
            for r in &span.refs {
                plan.add(r);
            }
        }
        execute(page, page_text, &plan)?;

        Ok(spans
            .iter()
            .map(|s| RedactionRecord::removed(Some(page_index), Carrier::Content, s.pattern_kind, s.bbox))
            .collect())
    }
}

/// Apply an edit plan to a page.
pub(crate) fn execute(page: &mut Page, page_text: &PageText, plan: &EditPlan) -> Result<()> {
    if plan.is_empty() {
        return Ok(());
    }

    let mut touched_fonts = BTreeSet::new();
    let mut dropped_names = BTreeSet::new();
    let mut rewritten = Vec::with_capacity(page.operators.len() + plan.glyphs.len());

    for (op_index, op) in std::mem::take(&mut page.operators).into_iter().enumerate() {
        if plan.dropped.contains(&op_index) {
            if let Operator::Do { name } = &op {
                dropped_names.insert(name.clone());
            }
            continue;
        }

        if let Some(removed) = plan.glyphs.get(&op_index) {
            let state = page_text.show_states.get(&op_index).ok_or_else(|| {
                Error::InvalidPdf(format!("operator {} was not executed as a text show", op_index))
            })?;
            let font = page
                .resources
                .fonts
                .get(&state.font)
                .ok_or_else(|| Error::InvalidPdf(format!("font /{} is not in the resources", state.font)))?;
            rewritten.extend(rewrite_show(&op, removed, state, font));
            touched_fonts.insert(state.font.clone());
            continue;
        }

        let mut op = op;
        if let Some(keys) = plan.properties.get(&op_index) {
            strip_properties(&mut op, keys);
        }
        rewritten.push(op);
    }
    page.operators = rewritten;

    if !touched_fonts.is_empty() {
        prune_fonts(page, &touched_fonts);
    }
    if !dropped_names.is_empty() {
        drop_unreferenced_xobjects(page, &dropped_names);
    }
    Ok(())
}

/// TJ offset that stands in for a removed glyph.
fn compensation(font: &Font, state: &ShowState, code: u32, byte_len: usize) -> f32 {
    let width = font.width(code);
    if state.size == 0.0 {
        return -width;
    }
    let mut spacing = state.char_space;
    if font.is_word_space(code, byte_len) {
        spacing += state.word_space;
    }
    -(width + spacing * 1000.0 / state.size)
}

fn push_string(out: &mut Vec<TextElement>, bytes: Vec<u8>) {
    if bytes.is_empty() {
        return;
    }
    match out.last_mut() {
        Some(TextElement::String(prev)) => prev.extend(bytes),
        _ => out.push(TextElement::String(bytes)),
    }
}

fn push_offset(out: &mut Vec<TextElement>, n: f32) {
    match out.last_mut() {
        Some(TextElement::Offset(prev)) => *prev += n,
        _ => out.push(TextElement::Offset(n)),
    }
    if matches!(out.last(), Some(TextElement::Offset(v)) if *v == 0.0) {
        out.pop();
    }
}

/// Rewrite a show operator without the glyphs in `removed`.
///
/// `'` becomes `T* TJ` and `"` becomes `Tw Tc T* TJ`.
fn rewrite_show(
    op: &Operator,
    removed: &BTreeMap<usize, BTreeSet<usize>>,
    state: &ShowState,
    font: &Font,
) -> Vec<Operator> {
    let (prefix, elements): (Vec<Operator>, Vec<TextElement>) = match op {
        Operator::Tj { text } => (Vec::new(), vec![TextElement::String(text.clone())]),
        Operator::TJ { array } => (Vec::new(), array.clone()),
        Operator::Quote { text } => (vec![Operator::TStar], vec![TextElement::String(text.clone())]),
        Operator::DoubleQuote {
            word_space,
            char_space,
            text,
        } => (
            vec![
                Operator::Tw {
                    word_space: *word_space,
                },
                Operator::Tc {
                    char_space: *char_space,
                },
                Operator::TStar,
            ],
            vec![TextElement::String(text.clone())],
        ),
        other => return vec![other.clone()],
    };

    let mut array = Vec::with_capacity(elements.len() + 2);
    for (element, item) in elements.into_iter().enumerate() {
        let bytes = match item {
            TextElement::Offset(n) => {
                push_offset(&mut array, n);
                continue;
            },
            TextElement::String(bytes) => bytes,
        };
        let Some(gone) = removed.get(&element) else {
            push_string(&mut array, bytes);
            continue;
        };

        let mut kept = Vec::with_capacity(bytes.len());
        for (glyph, (code, offset, len)) in font.codes(&bytes).into_iter().enumerate() {
            if gone.contains(&glyph) {
                push_string(&mut array, std::mem::take(&mut kept));
                push_offset(&mut array, compensation(font, state, code, len));
            } else {
                kept.extend_from_slice(&bytes[offset..offset + len]);
            }
        }
        push_string(&mut array, kept);
    }

    let mut ops = prefix;
    ops.push(Operator::TJ { array });
    ops
}

fn strip_properties(op: &mut Operator, keys: &BTreeSet<String>) {
    if let Operator::BeginMarkedContentDict { properties, .. } = op {
        if let Some(dict) = properties.as_dict_mut() {
            dict.retain(|key, _| !keys.contains(key));
        }
    }
}

/// Codes still drawn on the page, by font resource name.
fn used_codes(operators: &[Operator], resources: &Resources) -> BTreeMap<String, BTreeSet<u32>> {
    let mut used: BTreeMap<String, BTreeSet<u32>> = BTreeMap::new();
    let mut stack = GraphicsStateStack::default();

    for op in operators {
        match op {
            Operator::SaveState => stack.save(),
            Operator::RestoreState => stack.restore(),
            Operator::Tf { font, size } => {
                let text = &mut stack.current_mut().text;
                text.font_name = Some(font.clone());
                text.font_size = *size;
            },
            Operator::DoubleQuote { .. } | Operator::Quote { .. } | Operator::Tj { .. } | Operator::TJ { .. } => {
                let Some(name) = stack.current().text.font_name.as_ref() else {
                    continue;
                };
                let Some(font) = resources.fonts.get(name) else {
                    continue;
                };
                let codes = used.entry(name.clone()).or_default();
                for (_, bytes) in op.shown_strings() {
                    codes.extend(font.codes(bytes).into_iter().map(|(code, _, _)| code));
                }
            },
            _ => {},
        }
    }
    used
}

/// Drop subset glyphs and ToUnicode entries no longer drawn with `fonts`.
fn prune_fonts(page: &mut Page, fonts: &BTreeSet<String>) {
    let used = used_codes(&page.operators, &page.resources);
    let none = BTreeSet::new();
    for name in fonts {
        if let Some(font) = page.resources.fonts.get_mut(name) {
            let removed = font.prune_unused(used.get(name).unwrap_or(&none));
            if !removed.is_empty() {
                log::debug!("Pruned {} unused glyphs from font /{}", removed.len(), name);
            }
        }
    }
}

/// Remove XObjects in `names` that no remaining `Do` paints.
pub(crate) fn drop_unreferenced_xobjects(page: &mut Page, names: &BTreeSet<String>) {
    let referenced: BTreeSet<&str> = page
        .operators
        .iter()
        .filter_map(|op| match op {
            Operator::Do { name } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    let orphans: Vec<String> = names
        .iter()
        .filter(|n| !referenced.contains(n.as_str()))
        .cloned()
        .collect();
    for name in orphans {
        page.resources.xobjects.remove(&name);
    }
}
