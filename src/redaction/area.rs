//! Rectangle-based removal: every glyph and image touching an area.

use std::collections::BTreeMap;

use crate::content::{GraphicsStateStack, Matrix, Operator};
use crate::document::{FormXObject, Page, Resources, XObject};
use crate::extractors::{CharSource, PageText, MAX_FORM_DEPTH};
use crate::geometry::Rect;

use super::apply::EditPlan;
use super::audit::Carrier;
use super::locator::Selection;

/// What a page-level painting operator draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PaintKind {
    /// Image XObject or inline image
    Image,
    /// Form XObject
    Form,
}

/// Where a page-level painting operator lands in user space.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Placement {
    pub op_index: usize,
    pub kind: PaintKind,
    pub bbox: Rect,
}

fn transform_rect(m: &Matrix, r: &Rect) -> Rect {
    let corners = [
        m.transform_point(r.left(), r.bottom()),
        m.transform_point(r.right(), r.bottom()),
        m.transform_point(r.left(), r.top()),
        m.transform_point(r.right(), r.top()),
    ];
    Rect::bounding(corners).unwrap_or(Rect::new(r.x, r.y, 0.0, 0.0))
}

const UNIT_SQUARE: Rect = Rect {
    x: 0.0,
    y: 0.0,
    width: 1.0,
    height: 1.0,
};

/// Placement of every image and form painted by the page's own operators.
pub(crate) fn placements(operators: &[Operator], resources: &Resources) -> Vec<Placement> {
    let mut stack = GraphicsStateStack::default();
    let mut out = Vec::new();

    for (op_index, op) in operators.iter().enumerate() {
        match op {
            Operator::SaveState => stack.save(),
            Operator::RestoreState => stack.restore(),
            Operator::Cm { a, b, c, d, e, f } => {
                let state = stack.current_mut();
                state.ctm = Matrix::new(*a, *b, *c, *d, *e, *f).multiply(&state.ctm);
            },
            Operator::InlineImage { .. } => out.push(Placement {
                op_index,
                kind: PaintKind::Image,
                bbox: transform_rect(&stack.current().ctm, &UNIT_SQUARE),
            }),
            Operator::Do { name } => {
                let ctm = stack.current().ctm;
                match resources.xobjects.get(name) {
                    Some(XObject::Image(_)) => out.push(Placement {
                        op_index,
                        kind: PaintKind::Image,
                        bbox: transform_rect(&ctm, &UNIT_SQUARE),
                    }),
                    Some(XObject::Form(form)) => out.push(Placement {
                        op_index,
                        kind: PaintKind::Form,
                        bbox: transform_rect(&form.matrix.multiply(&ctm), &form.bbox),
                    }),
                    None => {},
                }
            },
            _ => {},
        }
    }
    out
}

/// Whether a form paints an image anywhere in its content or nested forms.
pub(crate) fn form_paints_images(form: &FormXObject, depth: u32) -> bool {
    if depth > MAX_FORM_DEPTH {
        return true;
    }
    form.operators.iter().any(|op| match op {
        Operator::InlineImage { .. } => true,
        Operator::Do { name } => match form.resources.xobjects.get(name) {
            Some(XObject::Image(_)) => true,
            Some(XObject::Form(inner)) => form_paints_images(inner, depth + 1),
            None => false,
        },
        _ => false,
    })
}

/// Removal plan for an area of one page.
#[derive(Debug, Default)]
pub(crate) struct AreaPlan {
    pub edits: EditPlan,
    /// Union of the selected glyph boxes
    pub glyph_bbox: Option<Rect>,
    /// Images to drop
    pub images: Vec<Placement>,
    /// Forms whose content inside the area cannot be edited in place, by `Do` index
    pub blocked_forms: BTreeMap<usize, Rect>,
}

fn widen(slot: &mut BTreeMap<usize, Rect>, op_index: usize, bbox: Rect) {
    slot.entry(op_index).and_modify(|b| *b = b.union(&bbox)).or_insert(bbox);
}

/// Select everything drawn inside `area`.
pub(crate) fn plan_area(page: &Page, page_text: &PageText, area: &Rect) -> AreaPlan {
    let mut plan = AreaPlan::default();
    let mut selection = Selection::default();

    for c in page_text.chars.iter().filter(|c| c.bbox.intersects(area)) {
        match &c.source {
            CharSource::Synthetic => {},
            CharSource::FormXObject { op_index } => widen(&mut plan.blocked_forms, *op_index, c.bbox),
            _ => {
                // Glyph and ActualText sources never fail to select.
                let _ = selection.add_chars(std::iter::once(c));
            },
        }
    }

    for placement in placements(&page.operators, &page.resources) {
        if !placement.bbox.intersects(area) {
            continue;
        }
        match placement.kind {
            PaintKind::Image => {
                plan.edits.drop_operator(placement.op_index);
                plan.images.push(placement);
            },
            PaintKind::Form => {
                let paints_images = match &page.operators[placement.op_index] {
                    Operator::Do { name } => match page.resources.xobjects.get(name) {
                        Some(XObject::Form(form)) => form_paints_images(form, 1),
                        _ => false,
                    },
                    _ => false,
                };
                if paints_images {
                    widen(&mut plan.blocked_forms, placement.op_index, placement.bbox);
                }
            },
        }
    }

    plan.glyph_bbox = selection.bbox;
    for r in selection.into_refs() {
        plan.edits.add(&r);
    }
    plan
}

/// Content still drawn inside `area`, by carrier.
pub(crate) fn remnants(page: &Page, page_text: &PageText, area: &Rect) -> Vec<(Carrier, Rect)> {
    let plan = plan_area(page, page_text, area);
    let mut out = Vec::new();
    if let Some(bbox) = plan.glyph_bbox {
        out.push((Carrier::Content, bbox));
    }
    out.extend(plan.images.iter().map(|p| (Carrier::Image, p.bbox)));
    out.extend(plan.blocked_forms.into_values().map(|bbox| (Carrier::Content, bbox)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ImageXObject;
    use crate::extractors::extract_page_text;
    use crate::fonts::Font;

    fn image() -> XObject {
        XObject::Image(ImageXObject {
            width: 1,
            height: 1,
            data: vec![0],
        })
    }

    fn page(content: &[u8]) -> Page {
        let resources = Resources::new()
            .with_font("F1", Font::simple("Helvetica"))
            .with_xobject("Im0", image());
        Page::from_content(content, resources).unwrap()
    }

    #[test]
    fn test_image_placement_follows_ctm() {
        let page = page(b"q 100 0 0 50 10 20 cm /Im0 Do Q");
        let found = placements(&page.operators, &page.resources);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].op_index, 2);
        assert_eq!(found[0].kind, PaintKind::Image);
        assert_eq!(found[0].bbox, Rect::new(10.0, 20.0, 100.0, 50.0));
    }

    #[test]
    fn test_plan_selects_glyphs_and_images_in_area() {
        let page = page(b"BT /F1 10 Tf 100 700 Td (ABC) Tj ET q 50 0 0 50 300 300 cm /Im0 Do Q");
        let text = extract_page_text(&page, 0).unwrap();

        // Covers "B" only (A spans 100..105, B 105..110)
        let plan = plan_area(&page, &text, &Rect::new(106.0, 695.0, 2.0, 10.0));
        assert!(plan.glyph_bbox.is_some());
        assert!(plan.images.is_empty());

        let plan = plan_area(&page, &text, &Rect::new(310.0, 310.0, 5.0, 5.0));
        assert!(plan.glyph_bbox.is_none());
        assert_eq!(plan.images.len(), 1);

        let plan = plan_area(&page, &text, &Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(plan.glyph_bbox.is_none() && plan.images.is_empty() && plan.blocked_forms.is_empty());
    }

    #[test]
    fn test_form_with_image_blocks_area() {
        let inner = Resources::new().with_xobject("Im0", image());
        let form = FormXObject::from_content(b"/Im0 Do", inner).unwrap();
        let resources = Resources::new().with_xobject("Fm0", XObject::Form(form.clone()));
        let page = Page::from_content(b"/Fm0 Do", resources).unwrap();
        let text = extract_page_text(&page, 0).unwrap();
        let plan = plan_area(&page, &text, &Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(plan.blocked_forms.contains_key(&0));
        assert!(form_paints_images(&form, 1));
    }
}
