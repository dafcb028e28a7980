//! Content stream serialization.
//!
//! Writes operators back to content stream bytes. Dictionary keys are sorted
//! so output is deterministic, and numbers use the shortest representation
//! that parses back to the same value.

use crate::content::operators::{Operator, TextElement};
use crate::object::Object;
use std::io::Write;

/// Serialize a sequence of operators into content stream bytes, one operator per line.
///
/// ```
/// use pdf_sanitizer::content::{parse_content_stream, serialize_content_stream};
///
/// let ops = parse_content_stream(b"BT /F1 12 Tf (Hi) Tj ET").unwrap();
/// let bytes = serialize_content_stream(&ops);
/// assert_eq!(parse_content_stream(&bytes).unwrap(), ops);
/// ```
pub fn serialize_content_stream(operators: &[Operator]) -> Vec<u8> {
    let mut out = Vec::new();
    for op in operators {
        write_operator(&mut out, op);
        out.push(b'\n');
    }
    out
}

/// Append one operator (operands, then keyword) to `out`.
pub fn write_operator(out: &mut Vec<u8>, op: &Operator) {
    match op {
        Operator::Td { tx, ty } | Operator::TD { tx, ty } => {
            write_numbers(out, &[*tx, *ty]);
        },
        Operator::Tm { a, b, c, d, e, f } | Operator::Cm { a, b, c, d, e, f } => {
            write_numbers(out, &[*a, *b, *c, *d, *e, *f]);
        },
        Operator::Tj { text } | Operator::Quote { text } => {
            write_string(out, text);
            out.push(b' ');
        },
        Operator::TJ { array } => {
            out.push(b'[');
            for (i, el) in array.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                match el {
                    TextElement::String(s) => write_string(out, s),
                    TextElement::Offset(n) => write_number(out, *n),
                }
            }
            out.extend_from_slice(b"] ");
        },
        Operator::DoubleQuote {
            word_space,
            char_space,
            text,
        } => {
            write_numbers(out, &[*word_space, *char_space]);
            write_string(out, text);
            out.push(b' ');
        },
        Operator::Tc { char_space: v }
        | Operator::Tw { word_space: v }
        | Operator::Tz { scale: v }
        | Operator::TL { leading: v }
        | Operator::Ts { rise: v } => write_numbers(out, &[*v]),
        Operator::Tf { font, size } => {
            write_name(out, font);
            out.push(b' ');
            write_numbers(out, &[*size]);
        },
        Operator::Tr { render } => {
            let _ = write!(out, "{} ", render);
        },
        Operator::Do { name } => {
            write_name(out, name);
            out.push(b' ');
        },
        Operator::BeginMarkedContent { tag } => {
            write_name(out, tag);
            out.push(b' ');
        },
        Operator::BeginMarkedContentDict { tag, properties } => {
            write_name(out, tag);
            out.push(b' ');
            write_object(out, properties);
            out.push(b' ');
        },
        Operator::InlineImage { dict, data } => {
            out.extend_from_slice(b"BI");
            for (key, value) in sorted(dict) {
                out.push(b' ');
                write_name(out, key);
                out.push(b' ');
                write_object(out, value);
            }
            out.extend_from_slice(b" ID ");
            out.extend_from_slice(data);
            out.extend_from_slice(b"\nEI");
            return;
        },
        Operator::Other { operands, .. } => {
            for operand in operands {
                write_object(out, operand);
                out.push(b' ');
            }
        },
        Operator::TStar
        | Operator::SaveState
        | Operator::RestoreState
        | Operator::BeginText
        | Operator::EndText
        | Operator::EndMarkedContent => {},
    }
    out.extend_from_slice(op.name().as_bytes());
}

fn sorted<'a>(
    dict: &'a std::collections::HashMap<String, Object>,
) -> Vec<(&'a String, &'a Object)> {
    let mut entries: Vec<_> = dict.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

fn write_numbers(out: &mut Vec<u8>, values: &[f32]) {
    for v in values {
        write_number(out, *v);
        out.push(b' ');
    }
}

/// Write a number without exponent notation (PDF has none).
fn write_number(out: &mut Vec<u8>, value: f32) {
    if value.fract() == 0.0 && value.abs() < 1e9 {
        let _ = write!(out, "{}", value as i64);
    } else if value.is_finite() {
        let _ = write!(out, "{}", value);
    } else {
        out.push(b'0');
    }
}

/// Write a direct object.
pub fn write_object(out: &mut Vec<u8>, obj: &Object) {
    match obj {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Object::Integer(i) => {
            let _ = write!(out, "{}", i);
        },
        Object::Real(r) => {
            if r.is_finite() {
                let _ = write!(out, "{}", r);
                if r.fract() == 0.0 {
                    out.extend_from_slice(b".0");
                }
            } else {
                out.push(b'0');
            }
        },
        Object::String(s) => write_string(out, s),
        Object::Name(n) => write_name(out, n),
        Object::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_object(out, item);
            }
            out.push(b']');
        },
        Object::Dictionary(dict) => {
            out.extend_from_slice(b"<<");
            for (key, value) in sorted(dict) {
                write_name(out, key);
                out.push(b' ');
                write_object(out, value);
                out.push(b' ');
            }
            out.extend_from_slice(b">>");
        },
    }
}

/// Write a string as a literal string, or as hex when it is mostly binary.
pub fn write_string(out: &mut Vec<u8>, bytes: &[u8]) {
    let binary = bytes
        .iter()
        .filter(|&&b| !(0x20..0x7f).contains(&b))
        .count();
    if binary * 4 > bytes.len() {
        out.push(b'<');
        for b in bytes {
            let _ = write!(out, "{:02X}", b);
        }
        out.push(b'>');
        return;
    }

    out.push(b'(');
    for &b in bytes {
        match b {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            },
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            0x20..=0x7e => out.push(b),
            _ => {
                let _ = write!(out, "\\{:03o}", b);
            },
        }
    }
    out.push(b')');
}

/// Write a name, escaping delimiters, whitespace and non-printables as `#XX`.
pub fn write_name(out: &mut Vec<u8>, name: &str) {
    out.push(b'/');
    for &b in name.as_bytes() {
        if b <= 0x20 || b >= 0x7f || b == b'#' || crate::lexer::is_delimiter(b) {
            let _ = write!(out, "#{:02X}", b);
        } else {
            out.push(b);
        }
    }
}
