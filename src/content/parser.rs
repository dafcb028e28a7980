//! Content stream parser.
//!
//! Content streams use postfix notation: operands precede the operator.
//!
//! ```text
//! BT
//!   /F1 12 Tf
//!   100 700 Td
//!   (Hello, World!) Tj
//! ET
//! ```

use crate::content::operators::{Operator, TextElement};
use crate::error::Result;
use crate::lexer::{is_delimiter, is_whitespace, operand_keyword, skip_ws};
use crate::object::Object;
use crate::parser::parse_object;
use nom::IResult;
use nom::bytes::complete::take_while1;
use std::collections::HashMap;

/// Parse a content stream into a sequence of operators.
///
/// Parsing is lenient: a byte that cannot start an operand or operator is
/// skipped, and trailing operands without an operator are dropped.
///
/// ```
/// use pdf_sanitizer::content::parse_content_stream;
///
/// let ops = parse_content_stream(b"BT /F1 12 Tf 100 700 Td (Hello) Tj ET").unwrap();
/// assert_eq!(ops.len(), 5);
/// ```
pub fn parse_content_stream(data: &[u8]) -> Result<Vec<Operator>> {
    let mut operators = Vec::new();
    let mut input = data;

    while !input.is_empty() {
        if let Ok((rest, _)) = skip_ws(input) {
            input = rest;
        }
        if input.is_empty() {
            break;
        }

        match parse_operator_with_operands(input) {
            Ok((rest, op)) => {
                operators.push(op);
                input = rest;
            },
            Err(_) => {
                log::debug!(
                    "Skipping unparseable byte at offset {} in content stream",
                    data.len() - input.len()
                );
                input = &input[1..];
            },
        }
    }

    Ok(operators)
}

/// Parse a single operator with its operands.
fn parse_operator_with_operands(input: &[u8]) -> IResult<&[u8], Operator> {
    let mut operands = Vec::new();
    let mut remaining = input;

    loop {
        let (inp, _) = skip_ws(remaining)?;
        remaining = inp;

        if remaining.is_empty() {
            return Err(nom::Err::Error(nom::error::Error::new(
                remaining,
                nom::error::ErrorKind::Eof,
            )));
        }

        if is_operator_start(remaining[0]) && operand_keyword(remaining).is_none() {
            let (rest, op_name) = parse_operator_name(remaining)?;
            if op_name == "BI" {
                return parse_inline_image(rest);
            }
            return Ok((rest, build_operator(op_name, operands)));
        }

        let (inp, obj) = parse_object(remaining)?;
        operands.push(obj);
        remaining = inp;
    }
}

/// Operators start with a letter or one of `'`, `"`.
fn is_operator_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'\'' || byte == b'"'
}

fn parse_operator_name(input: &[u8]) -> IResult<&[u8], &str> {
    let (rest, name_bytes) =
        take_while1(|c: u8| !is_whitespace(c) && !is_delimiter(c))(input)?;

    let name = std::str::from_utf8(name_bytes)
        .map_err(|_| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Char)))?;

    Ok((rest, name))
}

/// Build an operator from its name and operands.
///
/// Operands that do not fit the typed variant keep the operator verbatim as
/// [`Operator::Other`], so malformed input is never silently rewritten.
fn build_operator(name: &str, operands: Vec<Object>) -> Operator {
    match build_typed(name, &operands) {
        Some(op) => op,
        None => Operator::Other {
            name: name.to_string(),
            operands,
        },
    }
}

fn build_typed(name: &str, ops: &[Object]) -> Option<Operator> {
    let expect = |n: usize| if ops.len() == n { Some(()) } else { None };
    let op = match name {
        "Td" => {
            expect(2)?;
            Operator::Td {
                tx: num(ops, 0)?,
                ty: num(ops, 1)?,
            }
        },
        "TD" => {
            expect(2)?;
            Operator::TD {
                tx: num(ops, 0)?,
                ty: num(ops, 1)?,
            }
        },
        "Tm" | "cm" => {
            expect(6)?;
            let (a, b, c, d, e, f) = (
                num(ops, 0)?,
                num(ops, 1)?,
                num(ops, 2)?,
                num(ops, 3)?,
                num(ops, 4)?,
                num(ops, 5)?,
            );
            if name == "Tm" {
                Operator::Tm { a, b, c, d, e, f }
            } else {
                Operator::Cm { a, b, c, d, e, f }
            }
        },
        "T*" => {
            expect(0)?;
            Operator::TStar
        },
        "Tj" => {
            expect(1)?;
            Operator::Tj {
                text: string(ops, 0)?,
            }
        },
        "TJ" => {
            expect(1)?;
            let mut array = Vec::new();
            for obj in ops[0].as_array()? {
                match obj {
                    Object::String(s) => array.push(TextElement::String(s.clone())),
                    other => array.push(TextElement::Offset(other.as_number()?)),
                }
            }
            Operator::TJ { array }
        },
        "'" => {
            expect(1)?;
            Operator::Quote {
                text: string(ops, 0)?,
            }
        },
        "\"" => {
            expect(3)?;
            Operator::DoubleQuote {
                word_space: num(ops, 0)?,
                char_space: num(ops, 1)?,
                text: string(ops, 2)?,
            }
        },
        "Tc" => {
            expect(1)?;
            Operator::Tc {
                char_space: num(ops, 0)?,
            }
        },
        "Tw" => {
            expect(1)?;
            Operator::Tw {
                word_space: num(ops, 0)?,
            }
        },
        "Tz" => {
            expect(1)?;
            Operator::Tz { scale: num(ops, 0)? }
        },
        "TL" => {
            expect(1)?;
            Operator::TL {
                leading: num(ops, 0)?,
            }
        },
        "Tf" => {
            expect(2)?;
            Operator::Tf {
                font: ops[0].as_name()?.to_string(),
                size: num(ops, 1)?,
            }
        },
        "Tr" => {
            expect(1)?;
            let render = ops[0].as_integer()?;
            Operator::Tr {
                render: u8::try_from(render).ok()?,
            }
        },
        "Ts" => {
            expect(1)?;
            Operator::Ts { rise: num(ops, 0)? }
        },
        "q" => {
            expect(0)?;
            Operator::SaveState
        },
        "Q" => {
            expect(0)?;
            Operator::RestoreState
        },
        "BT" => {
            expect(0)?;
            Operator::BeginText
        },
        "ET" => {
            expect(0)?;
            Operator::EndText
        },
        "Do" => {
            expect(1)?;
            Operator::Do {
                name: ops[0].as_name()?.to_string(),
            }
        },
        "BMC" => {
            expect(1)?;
            Operator::BeginMarkedContent {
                tag: ops[0].as_name()?.to_string(),
            }
        },
        "BDC" => {
            expect(2)?;
            let properties = match &ops[1] {
                obj @ (Object::Dictionary(_) | Object::Name(_)) => obj.clone(),
                _ => return None,
            };
            Operator::BeginMarkedContentDict {
                tag: ops[0].as_name()?.to_string(),
                properties,
            }
        },
        "EMC" => {
            expect(0)?;
            Operator::EndMarkedContent
        },
        _ => return None,
    };
    Some(op)
}

fn num(operands: &[Object], index: usize) -> Option<f32> {
    operands.get(index).and_then(|obj| obj.as_number())
}

fn string(operands: &[Object], index: usize) -> Option<Vec<u8>> {
    operands
        .get(index)
        .and_then(|obj| obj.as_string().map(|s| s.to_vec()))
}

/// Parse an inline image sequence after `BI`.
///
/// The image data runs until an `EI` that is preceded by whitespace and
/// followed by whitespace, a delimiter or the end of the stream.
fn parse_inline_image(input: &[u8]) -> IResult<&[u8], Operator> {
    let mut dict = HashMap::new();
    let mut remaining = input;

    loop {
        let (inp, _) = skip_ws(remaining)?;
        remaining = inp;

        if remaining.is_empty() {
            return Err(nom::Err::Error(nom::error::Error::new(
                remaining,
                nom::error::ErrorKind::Eof,
            )));
        }

        if remaining.starts_with(b"ID") && remaining.get(2).is_none_or(|&c| is_whitespace(c)) {
            // Exactly one whitespace byte separates ID from the data.
            remaining = &remaining[(3).min(remaining.len())..];
            break;
        }

        let (inp, key) = parse_object(remaining)?;
        let (inp, value) = parse_object(inp)?;
        remaining = inp;
        if let Some(key) = key.as_name() {
            dict.insert(key.to_string(), value);
        }
    }

    let ei = find_ei_operator(remaining).ok_or_else(|| {
        nom::Err::Error(nom::error::Error::new(remaining, nom::error::ErrorKind::Tag))
    })?;
    let data = remaining[..ei].to_vec();
    Ok((&remaining[ei + 3..], Operator::InlineImage { dict, data }))
}

/// Position of the whitespace byte that precedes a terminating `EI`.
fn find_ei_operator(input: &[u8]) -> Option<usize> {
    (0..input.len().saturating_sub(2)).find(|&i| {
        is_whitespace(input[i])
            && &input[i + 1..i + 3] == b"EI"
            && input
                .get(i + 3)
                .is_none_or(|&c| is_whitespace(c) || is_delimiter(c))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_text() {
        let ops = parse_content_stream(b"BT /F1 12 Tf 100 700 Td (Hello) Tj ET").unwrap();
        assert_eq!(ops[0], Operator::BeginText);
        assert_eq!(
            ops[1],
            Operator::Tf {
                font: "F1".to_string(),
                size: 12.0
            }
        );
        assert_eq!(ops[2], Operator::Td { tx: 100.0, ty: 700.0 });
        assert_eq!(ops[3], Operator::Tj { text: b"Hello".to_vec() });
        assert_eq!(ops[4], Operator::EndText);
    }

    #[test]
    fn test_parse_tj_array() {
        let ops = parse_content_stream(b"[(AB) -250 (C) 10.5] TJ").unwrap();
        assert_eq!(
            ops[0],
            Operator::TJ {
                array: vec![
                    TextElement::String(b"AB".to_vec()),
                    TextElement::Offset(-250.0),
                    TextElement::String(b"C".to_vec()),
                    TextElement::Offset(10.5),
                ]
            }
        );
    }

    #[test]
    fn test_parse_quote_operators() {
        let ops = parse_content_stream(b"(line) ' 1 0.5 (more) \"").unwrap();
        assert_eq!(ops[0], Operator::Quote { text: b"line".to_vec() });
        assert_eq!(
            ops[1],
            Operator::DoubleQuote {
                word_space: 1.0,
                char_space: 0.5,
                text: b"more".to_vec()
            }
        );
    }

    #[test]
    fn test_parse_t_star_and_state() {
        let ops = parse_content_stream(b"q 1 0 0 1 5 5 cm T* 3 Tr Q").unwrap();
        assert_eq!(ops[0], Operator::SaveState);
        assert!(matches!(ops[1], Operator::Cm { e, .. } if e == 5.0));
        assert_eq!(ops[2], Operator::TStar);
        assert_eq!(ops[3], Operator::Tr { render: 3 });
        assert_eq!(ops[4], Operator::RestoreState);
    }

    #[test]
    fn test_boolean_operands_stay_operands() {
        let ops = parse_content_stream(b"/OC true null xx").unwrap();
        assert_eq!(
            ops[0],
            Operator::Other {
                name: "xx".to_string(),
                operands: vec![Object::Name("OC".to_string()), Object::Boolean(true), Object::Null],
            }
        );
    }

    #[test]
    fn test_malformed_operands_kept_verbatim() {
        let ops = parse_content_stream(b"(x) Td").unwrap();
        assert_eq!(
            ops[0],
            Operator::Other {
                name: "Td".to_string(),
                operands: vec![Object::String(b"x".to_vec())],
            }
        );
    }

    #[test]
    fn test_untyped_operators_are_other() {
        let ops = parse_content_stream(b"0 0 10 10 re f*").unwrap();
        assert_eq!(ops[0].name(), "re");
        assert_eq!(ops[1].name(), "f*");
    }

    #[test]
    fn test_parse_marked_content() {
        let ops =
            parse_content_stream(b"/Span << /ActualText (fi) >> BDC (\\001) Tj EMC /P BMC EMC")
                .unwrap();
        assert_eq!(ops[0].actual_text(), Some(&b"fi"[..]));
        assert_eq!(ops[2], Operator::EndMarkedContent);
        assert_eq!(ops[3], Operator::BeginMarkedContent { tag: "P".to_string() });
    }

    #[test]
    fn test_parse_inline_image() {
        let ops = parse_content_stream(b"q BI /W 2 /H 1 /BPC 8 /CS /G ID \x00\xff EI Q").unwrap();
        assert_eq!(ops.len(), 3);
        match &ops[1] {
            Operator::InlineImage { dict, data } => {
                assert_eq!(dict.get("W"), Some(&Object::Integer(2)));
                assert_eq!(data, &vec![0x00, 0xff]);
            },
            other => panic!("expected inline image, got {:?}", other),
        }
        assert_eq!(ops[2], Operator::RestoreState);
    }

    #[test]
    fn test_skips_garbage() {
        let ops = parse_content_stream(b") BT ET").unwrap();
        assert_eq!(ops, vec![Operator::BeginText, Operator::EndText]);
    }

    #[test]
    fn test_empty_stream() {
        assert!(parse_content_stream(b"").unwrap().is_empty());
        assert!(parse_content_stream(b"  % only a comment\n").unwrap().is_empty());
    }
}
