//! Mapping matches back to the content operators that drew them.

use std::collections::BTreeSet;
use std::ops::Range;

use crate::extractors::{CharSource, GlyphRef, MarkedSource, MarkedText, PageText};
use crate::geometry::Rect;
use crate::patterns::MatchSpan;

/// What to remove from one operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorTarget {
    /// A run of glyphs in one string element of a show operator
    Glyphs {
        /// Index in the TJ array (0 for Tj, ' and ")
        element: usize,
        /// Glyph indices within the element
        glyphs: Range<usize>,
    },
    /// The `/ActualText` entry of a BDC operator
    ActualText,
    /// A text entry of a BDC property list
    Property {
        /// Property list key
        key: String,
    },
}

/// A removable piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorRef {
    /// Index in the page's operator list
    pub op_index: usize,
    /// Part of the operator to remove
    pub target: OperatorTarget,
}

/// Why a match cannot be removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlocatableReason {
    /// Text drawn by a form XObject, which other pages may share
    SharedFormXObject {
        /// Page-level `Do` operator
        op_index: usize,
    },
    /// The match covers no drawn glyph
    NoGlyphs,
}

impl std::fmt::Display for UnlocatableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnlocatableReason::SharedFormXObject { op_index } => {
                write!(f, "text drawn by a shared form XObject (operator {})", op_index)
            },
            UnlocatableReason::NoGlyphs => write!(f, "no drawn glyphs behind the match"),
        }
    }
}

/// Result of locating one match.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    /// Every character of the match maps to removable content
    Located {
        /// One entry per contiguous glyph run and per ActualText marker
        refs: Vec<OperatorRef>,
        /// Union of the glyph boxes
        bbox: Option<Rect>,
    },
    /// Part of the match cannot be removed
    Unlocatable(UnlocatableReason),
}

/// Glyphs and markers selected for removal.
#[derive(Debug, Default)]
pub(crate) struct Selection {
    pub glyphs: BTreeSet<GlyphRef>,
    pub markers: BTreeSet<usize>,
    pub bbox: Option<Rect>,
}

impl Selection {
    /// Add the content behind `chars`; the first form-drawn char stops the walk.
    pub fn add_chars<'a>(
        &mut self,
        chars: impl IntoIterator<Item = &'a crate::extractors::TextChar>,
    ) -> std::result::Result<(), UnlocatableReason> {
        for c in chars {
            match &c.source {
                CharSource::Glyph(g) => {
                    self.glyphs.insert(*g);
                },
                CharSource::ActualText { marker, glyphs } => {
                    // The replacement text and every glyph it stands for go together.
                    self.markers.insert(*marker);
                    self.glyphs.extend(glyphs.iter().copied());
                },
                CharSource::FormXObject { op_index } => {
                    return Err(UnlocatableReason::SharedFormXObject { op_index: *op_index });
                },
                CharSource::Synthetic => continue,
            }
            self.bbox = Some(match self.bbox {
                Some(b) => b.union(&c.bbox),
                None => c.bbox,
            });
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty() && self.markers.is_empty()
    }

    /// Collapse the selection into operator references.
    pub fn into_refs(self) -> Vec<OperatorRef> {
        let mut refs: Vec<OperatorRef> = Vec::new();
        let mut run: Option<(usize, usize, Range<usize>)> = None;

        for g in self.glyphs {
            match &mut run {
                Some((op, el, range)) if *op == g.op_index && *el == g.element && range.end == g.glyph => {
                    range.end += 1;
                },
                _ => {
                    if let Some((op_index, element, glyphs)) = run.take() {
                        refs.push(OperatorRef {
                            op_index,
                            target: OperatorTarget::Glyphs { element, glyphs },
                        });
                    }
                    run = Some((g.op_index, g.element, g.glyph..g.glyph + 1));
                },
            }
        }
        if let Some((op_index, element, glyphs)) = run {
            refs.push(OperatorRef {
                op_index,
                target: OperatorTarget::Glyphs { element, glyphs },
            });
        }

        refs.extend(self.markers.into_iter().map(|op_index| OperatorRef {
            op_index,
            target: OperatorTarget::ActualText,
        }));
        refs.sort_by_key(|r| r.op_index);
        refs
    }
}

/// Find the operators behind a match.
///
/// A ligature or ActualText group that the match only partly covers is
/// selected whole. Separators inserted by the extractor contribute nothing.
pub fn locate(page_text: &PageText, span: &MatchSpan) -> Location {
    let mut selection = Selection::default();
    if let Err(reason) = selection.add_chars(page_text.chars_in(span.start_offset, span.end_offset)) {
        return Location::Unlocatable(reason);
    }
    if selection.is_empty() {
        return Location::Unlocatable(UnlocatableReason::NoGlyphs);
    }
    let bbox = selection.bbox;
    Location::Located {
        refs: selection.into_refs(),
        bbox,
    }
}

/// Find the operators behind a match in marked-content text.
///
/// A match in covered glyphs selects those glyphs and the `/ActualText`
/// entry standing in for them. A match in a property string selects the
/// entry alone.
pub fn locate_marked(marked: &MarkedText, span: &MatchSpan) -> Location {
    if let Some(op_index) = marked.form_op {
        return Location::Unlocatable(UnlocatableReason::SharedFormXObject { op_index });
    }
    match &marked.source {
        MarkedSource::Property(key) => Location::Located {
            refs: vec![OperatorRef {
                op_index: marked.marker,
                target: OperatorTarget::Property { key: key.clone() },
            }],
            bbox: None,
        },
        MarkedSource::Glyphs => {
            let mut selection = Selection::default();
            selection.glyphs.extend(marked.glyphs_in(span.start_offset, span.end_offset));
            if selection.glyphs.is_empty() {
                return Location::Unlocatable(UnlocatableReason::NoGlyphs);
            }
            selection.markers.insert(marked.marker);
            Location::Located {
                refs: selection.into_refs(),
                bbox: marked.bbox,
            }
        },
    }
}
