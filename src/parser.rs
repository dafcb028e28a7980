//! Operand object parser.
//!
//! Combines lexer tokens into direct objects (numbers, strings, names, arrays,
//! dictionaries). Content streams never contain indirect references, so the
//! parser does not look ahead for `R`.

use crate::lexer::{Token, token};
use crate::object::Object;
use nom::IResult;
use std::collections::HashMap;

/// Decode escape sequences in PDF literal strings.
///
/// Handles `\n \r \t \b \f \( \) \\`, octal `\ddd` and line continuations.
///
/// ```
/// # use pdf_sanitizer::parser::decode_literal_string_escapes;
/// let decoded = decode_literal_string_escapes(b"Section \\247 71.01");
/// assert_eq!(decoded, b"Section \xa7 71.01");
/// ```
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 >= raw.len() {
            result.push(raw[i]);
            i += 1;
            continue;
        }
        match raw[i + 1] {
            b'n' => result.push(b'\n'),
            b'r' => result.push(b'\r'),
            b't' => result.push(b'\t'),
            b'b' => result.push(8),
            b'f' => result.push(12),
            b'(' => result.push(b'('),
            b')' => result.push(b')'),
            b'\\' => result.push(b'\\'),
            b'\n' => {},
            b'\r' => {
                if raw.get(i + 2) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let mut octal = 0u32;
                let mut len = 0;
                while len < 3 {
                    match raw.get(i + 1 + len) {
                        Some(d @ b'0'..=b'7') => {
                            octal = octal * 8 + (d - b'0') as u32;
                            len += 1;
                        },
                        _ => break,
                    }
                }
                result.push((octal & 0xFF) as u8);
                i += 1 + len;
                continue;
            },
            // Unknown escape: the backslash is dropped, the character kept
            other => result.push(other),
        }
        i += 2;
    }

    result
}

/// Decode the digits of a hex string; an odd trailing digit is padded with 0.
pub fn decode_hex(hex: &[u8]) -> Vec<u8> {
    let digits: Vec<u8> = hex
        .iter()
        .filter_map(|&c| (c as char).to_digit(16).map(|d| d as u8))
        .collect();
    digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

fn tag_error(input: &[u8]) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))
}

/// Parse one direct object from input bytes.
///
/// ```
/// use pdf_sanitizer::parser::parse_object;
///
/// let (_, obj) = parse_object(b"[ 1 2 /Name ]").unwrap();
/// assert_eq!(obj.as_array().map(|a| a.len()), Some(3));
/// ```
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    let (rest, tok) = token(input)?;

    match tok {
        Token::Null => Ok((rest, Object::Null)),
        Token::True => Ok((rest, Object::Boolean(true))),
        Token::False => Ok((rest, Object::Boolean(false))),
        Token::Integer(i) => Ok((rest, Object::Integer(i))),
        Token::Real(r) => Ok((rest, Object::Real(r))),
        Token::LiteralString(bytes) => {
            Ok((rest, Object::String(decode_literal_string_escapes(bytes))))
        },
        Token::HexString(hex) => Ok((rest, Object::String(decode_hex(hex)))),
        Token::Name(name) => Ok((rest, Object::Name(name))),
        Token::ArrayStart => parse_array(rest),
        Token::DictStart => parse_dictionary(rest),
        Token::ArrayEnd | Token::DictEnd => Err(tag_error(input)),
    }
}

/// Parse the remainder of an array after `[`.
fn parse_array(input: &[u8]) -> IResult<&[u8], Object> {
    let mut objects = Vec::new();
    let mut remaining = input;

    loop {
        if let Ok((rest, Token::ArrayEnd)) = token(remaining) {
            return Ok((rest, Object::Array(objects)));
        }
        let (rest, obj) = parse_object(remaining)?;
        objects.push(obj);
        remaining = rest;
    }
}

/// Parse the remainder of a dictionary after `<<`.
fn parse_dictionary(input: &[u8]) -> IResult<&[u8], Object> {
    let mut dict = HashMap::new();
    let mut remaining = input;

    loop {
        let (rest, tok) = token(remaining)?;
        match tok {
            Token::DictEnd => return Ok((rest, Object::Dictionary(dict))),
            Token::Name(key) => {
                let (rest, value) = parse_object(rest)?;
                dict.insert(key, value);
                remaining = rest;
            },
            _ => return Err(tag_error(remaining)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_simple_escapes() {
        assert_eq!(decode_literal_string_escapes(br"a\nb\tc"), b"a\nb\tc");
        assert_eq!(decode_literal_string_escapes(br"\(x\)"), b"(x)");
        assert_eq!(decode_literal_string_escapes(br"\\"), b"\\");
    }

    #[test]
    fn test_decode_octal() {
        assert_eq!(decode_literal_string_escapes(br"\101\0612"), b"A12");
    }

    #[test]
    fn test_decode_line_continuation() {
        assert_eq!(decode_literal_string_escapes(b"ab\\\ncd"), b"abcd");
        assert_eq!(decode_literal_string_escapes(b"ab\\\r\ncd"), b"abcd");
    }

    #[test]
    fn test_decode_hex_odd_length() {
        assert_eq!(decode_hex(b"414"), vec![0x41, 0x40]);
        assert_eq!(decode_hex(b"48 65 6C"), b"Hel");
    }

    #[test]
    fn test_parse_dictionary() {
        let (_, obj) = parse_object(b"<< /ActualText (fi) /MCID 3 >>").unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get("ActualText"), Some(&Object::String(b"fi".to_vec())));
        assert_eq!(dict.get("MCID"), Some(&Object::Integer(3)));
    }

    #[test]
    fn test_parse_nested_array() {
        let (rest, obj) = parse_object(b"[(A) -120 [1 2]] TJ").unwrap();
        let arr = obj.as_array().unwrap();
        assert_eq!(arr.len(), 3);
        assert_eq!(arr[1], Object::Integer(-120));
        assert_eq!(rest, b" TJ");
    }

    #[test]
    fn test_unclosed_array_is_error() {
        assert!(parse_object(b"[1 2").is_err());
    }

    #[test]
    fn test_stray_close_is_error() {
        assert!(parse_object(b"] 1").is_err());
    }
}
