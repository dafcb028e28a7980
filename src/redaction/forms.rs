//! Inlining of form XObjects into the page content.
//!
//! A form may be painted by several pages, so its text is never edited in
//! place. Inlining gives the page a private copy it is free to redact:
//! `/Fm Do` becomes `q <Matrix> cm <BBox> re W n ... Q`, and the form's
//! resources are merged into the page's (colliding names are renamed).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::content::{Matrix, Operator};
use crate::document::{FormXObject, Page, XObject};
use crate::object::Object;

use super::apply::drop_unreferenced_xobjects;

/// Inline the form invocations at `op_indices`. Returns how many were inlined.
///
/// Indices that do not name a page-level `Do` of a form are ignored. Forms
/// nested inside an inlined form stay as `Do` operators of the page and can
/// be inlined by a later call.
pub fn inline_forms(page: &mut Page, op_indices: &BTreeSet<usize>) -> usize {
    let mut inlined = 0;
    let mut names = BTreeSet::new();
    let mut out = Vec::with_capacity(page.operators.len());

    for (op_index, op) in std::mem::take(&mut page.operators).into_iter().enumerate() {
        let target = match &op {
            Operator::Do { name } if op_indices.contains(&op_index) => match page.resources.xobjects.get(name) {
                Some(XObject::Form(form)) => Some((name.clone(), form.clone())),
                _ => None,
            },
            _ => None,
        };
        let Some((name, form)) = target else {
            out.push(op);
            continue;
        };
        names.insert(name);

        let renames = merge_resources(page, &form);
        out.push(Operator::SaveState);
        if form.matrix != Matrix::identity() {
            let m = form.matrix;
            out.push(Operator::Cm {
                a: m.a,
                b: m.b,
                c: m.c,
                d: m.d,
                e: m.e,
                f: m.f,
            });
        }
        out.extend(clip_to(&form));
        out.extend(form.operators.into_iter().map(|op| renames.apply(op)));
        out.push(Operator::RestoreState);
        inlined += 1;
    }
    page.operators = out;

    if inlined > 0 {
        drop_unreferenced_xobjects(page, &names);
        log::debug!("Inlined {} form XObject invocations", inlined);
    }
    inlined
}

/// `x y w h re W n` for the form's bounding box.
fn clip_to(form: &FormXObject) -> [Operator; 3] {
    let b = form.bbox;
    [
        Operator::Other {
            name: "re".to_string(),
            operands: vec![
                Object::Real(b.x as f64),
                Object::Real(b.y as f64),
                Object::Real(b.width as f64),
                Object::Real(b.height as f64),
            ],
        },
        Operator::Other {
            name: "W".to_string(),
            operands: Vec::new(),
        },
        Operator::Other {
            name: "n".to_string(),
            operands: Vec::new(),
        },
    ]
}

/// Resource names of an inlined form, mapped to their names on the page.
#[derive(Debug, Default)]
struct Renames {
    fonts: HashMap<String, String>,
    xobjects: HashMap<String, String>,
}

impl Renames {
    fn apply(&self, op: Operator) -> Operator {
        match op {
            Operator::Tf { font, size } => Operator::Tf {
                font: self.fonts.get(&font).cloned().unwrap_or(font),
                size,
            },
            Operator::Do { name } => Operator::Do {
                name: self.xobjects.get(&name).cloned().unwrap_or(name),
            },
            other => other,
        }
    }
}

fn merge_resources(page: &mut Page, form: &FormXObject) -> Renames {
    let mut renames = Renames::default();
    for (name, font) in &form.resources.fonts {
        let target = merge_entry(&mut page.resources.fonts, name, font);
        if &target != name {
            renames.fonts.insert(name.clone(), target);
        }
    }
    for (name, xobject) in &form.resources.xobjects {
        let target = merge_entry(&mut page.resources.xobjects, name, xobject);
        if &target != name {
            renames.xobjects.insert(name.clone(), target);
        }
    }
    renames
}

/// Insert `value` under `name`, or under a fresh name if `name` holds something else.
fn merge_entry<T: Clone + PartialEq>(table: &mut BTreeMap<String, T>, name: &str, value: &T) -> String {
    let mut candidate = name.to_string();
    let mut n = 0;
    loop {
        match table.get(&candidate) {
            None => {
                table.insert(candidate.clone(), value.clone());
                return candidate;
            },
            Some(existing) if existing == value => return candidate,
            Some(_) => {
                n += 1;
                candidate = format!("{}_{}", name, n);
            },
        }
    }
}
