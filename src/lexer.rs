//! Content stream lexer (tokenizer).
//!
//! Tokenizes the operand part of a content stream: numbers, literal and
//! hexadecimal strings, names, the `true`/`false`/`null` keywords and the
//! array/dictionary delimiters. Operator keywords are recognised by the
//! content parser, not here.
//!
//! Whitespace (space, \t, \r, \n, \0, \f) and comments (% to EOL) are skipped.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_till, take_while},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, value},
    sequence::{delimited, preceded},
};

/// Token types recognized by the lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),

    /// Real (floating-point) number (e.g., 3.14, -2.5, .5)
    Real(f64),

    /// Literal string bytes, escapes still encoded
    LiteralString(&'a [u8]),

    /// Hexadecimal string digits, whitespace preserved
    HexString(&'a [u8]),

    /// Name with `#XX` escapes decoded
    Name(String),

    /// Boolean true keyword
    True,

    /// Boolean false keyword
    False,

    /// Null keyword
    Null,

    /// Array start delimiter [
    ArrayStart,

    /// Array end delimiter ]
    ArrayEnd,

    /// Dictionary start delimiter <<
    DictStart,

    /// Dictionary end delimiter >>
    DictEnd,
}

/// Whether `c` is PDF whitespace.
pub fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// Whether `c` is a PDF delimiter character.
pub fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skip all whitespace and comments.
pub fn skip_ws(input: &[u8]) -> IResult<&[u8], ()> {
    let mut remaining = input;
    loop {
        let (rest, _) = take_while(is_whitespace)(remaining)?;
        remaining = rest;
        match comment(remaining) {
            Ok((rest, _)) => remaining = rest,
            Err(_) => break,
        }
    }
    Ok((remaining, ()))
}

fn digit_error(input: &[u8]) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
}

/// Parse an integer or real number.
///
/// PDF allows a leading sign and reals without an integer part (`.5`) or
/// without a fractional part (`5.`).
fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let start = input;
    let (input, sign) = opt(one_of("+-"))(input)?;
    let (input, int_part) = opt(digit1)(input)?;
    let (input, frac_part) = opt(preceded(char('.'), opt(digit1)))(input)?;

    if int_part.is_none() && !matches!(frac_part, Some(Some(_))) {
        return Err(digit_error(start));
    }

    let negative = sign == Some('-');
    if let Some(frac) = frac_part {
        let int_str = int_part
            .map(std::str::from_utf8)
            .transpose()
            .map_err(|_| digit_error(start))?
            .unwrap_or("0");
        let frac_str = frac
            .map(std::str::from_utf8)
            .transpose()
            .map_err(|_| digit_error(start))?
            .unwrap_or("0");
        let num: f64 = format!("{}.{}", int_str, frac_str)
            .parse()
            .map_err(|_| digit_error(start))?;
        Ok((input, Token::Real(if negative { -num } else { num })))
    } else {
        let digits = int_part.ok_or_else(|| digit_error(start))?;
        let text = std::str::from_utf8(digits).map_err(|_| digit_error(start))?;
        // Out-of-range integers degrade to reals rather than failing the stream.
        match text.parse::<i64>() {
            Ok(n) => Ok((input, Token::Integer(if negative { -n } else { n }))),
            Err(_) => {
                let n: f64 = text.parse().map_err(|_| digit_error(start))?;
                Ok((input, Token::Real(if negative { -n } else { n })))
            },
        }
    }
}

/// Parse a literal string enclosed in balanced parentheses.
///
/// Returns the raw bytes between the outer parentheses; escapes are decoded
/// by the parser.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (remaining, _) = char('(')(input)?;
    let mut depth = 1;
    let mut pos = 0;

    while depth > 0 && pos < remaining.len() {
        match remaining[pos] {
            b'\\' => pos += 2,
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    if depth != 0 || pos > remaining.len() {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    Ok((&remaining[pos..], Token::LiteralString(&remaining[..pos - 1])))
}

/// Parse a hexadecimal string enclosed in angle brackets.
fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    delimited(
        char('<'),
        map(
            take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)),
            Token::HexString,
        ),
        char('>'),
    )(input)
}

/// Decode #XX escape sequences in PDF names.
///
/// ```
/// # use pdf_sanitizer::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes("A#20B#23C"), "A B#C");
/// assert_eq!(decode_name_escapes("A#"), "A#");
/// ```
pub fn decode_name_escapes(name: &str) -> String {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'#' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parse a name starting with /.
fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(
            take_while(|c: u8| !is_whitespace(c) && !is_delimiter(c)),
            |bytes| Token::Name(decode_name_escapes(&String::from_utf8_lossy(bytes))),
        ),
    )(input)
}

/// Parse delimiters.
fn parse_delimiter(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
    ))(input)
}

/// Match an operand keyword (`true`, `false`, `null`) at the start of `input`.
///
/// The keyword must be followed by whitespace, a delimiter or the end of input,
/// so operator names that merely start with these letters are not swallowed.
pub fn operand_keyword(input: &[u8]) -> Option<(usize, Token<'static>)> {
    for (word, tok) in [
        (&b"true"[..], Token::True),
        (&b"false"[..], Token::False),
        (&b"null"[..], Token::Null),
    ] {
        if input.starts_with(word) {
            let next = input.get(word.len()).copied();
            if next.is_none_or(|c| is_whitespace(c) || is_delimiter(c)) {
                return Some((word.len(), tok));
            }
        }
    }
    None
}

fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    match operand_keyword(input) {
        Some((len, tok)) => Ok((&input[len..], tok)),
        None => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))),
    }
}

/// Parse a single operand token after skipping whitespace and comments.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, _) = skip_ws(input)?;

    alt((
        parse_delimiter, // << and >> before hex strings
        parse_keyword,
        parse_name,
        parse_number,
        parse_literal_string,
        parse_hex_string,
    ))(input)
}
