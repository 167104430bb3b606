//! PDF object parser.
//!
//! Combines lexer tokens into complete objects using recursive descent.
//! All parsing functions return `IResult` from nom; `parse_indirect_object`
//! wraps the result in the crate error type with the failing byte offset.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Dict, Object, ObjectRef};
use nom::IResult;

/// Decode escape sequences in PDF literal strings.
///
/// ```
/// # use pdf_deferred_signer::parser::decode_literal_string_escapes;
/// assert_eq!(decode_literal_string_escapes(b"a\\(b\\)\\101"), b"a(b)A");
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

        let escaped = raw[i + 1];
        i += 2;
        match escaped {
            b'n' => result.push(b'\n'),
            b'r' => result.push(b'\r'),
            b't' => result.push(b'\t'),
            b'b' => result.push(8),
            b'f' => result.push(12),
            b'(' | b')' | b'\\' => result.push(escaped),
            // Line continuation
            b'\n' => {},
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let mut value = (escaped - b'0') as u32;
                let mut digits = 1;
                while digits < 3 {
                    match raw.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + (d - b'0') as u32;
                            i += 1;
                            digits += 1;
                        },
                        _ => break,
                    }
                }
                result.push((value & 0xFF) as u8);
            },
            // Unknown escape: the backslash is dropped
            other => result.push(other),
        }
    }

    result
}

/// Decode a hex string to bytes. Whitespace is ignored; an odd final digit
/// is padded with 0.
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let digits: Vec<u8> = hex_bytes
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();

    digits
        .chunks(2)
        .map(|pair| {
            let hi = hex_value(pair[0])?;
            let lo = match pair.get(1) {
                Some(&c) => hex_value(c)?,
                None => 0,
            };
            Ok(hi << 4 | lo)
        })
        .collect()
}

fn hex_value(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(Error::Decode(format!("invalid hex digit {:?}", c as char))),
    }
}

fn fail(input: &[u8], kind: nom::error::ErrorKind) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, kind))
}

/// Parse a PDF object from input bytes.
///
/// ```
/// use pdf_deferred_signer::parser::parse_object;
///
/// let (_, obj) = parse_object(b"<< /Type /Sig /ByteRange [0 10 20 30] >>").unwrap();
/// assert!(obj.as_dict().is_some());
/// ```
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    let (input, tok) = token(input)?;

    match tok {
        Token::Null => Ok((input, Object::Null)),
        Token::True => Ok((input, Object::Boolean(true))),
        Token::False => Ok((input, Object::Boolean(false))),
        Token::Integer(i) => {
            // Could be the start of an indirect reference (id gen R)
            if let Ok((after_gen, Token::Integer(gen))) = token(input) {
                if let Ok((after_r, Token::R)) = token(after_gen) {
                    if i >= 0 && (0..=u16::MAX as i64).contains(&gen) {
                        return Ok((after_r, Object::Reference(ObjectRef::new(i as u32, gen as u16))));
                    }
                }
            }
            Ok((input, Object::Integer(i)))
        },
        Token::Real(r) => Ok((input, Object::Real(r))),
        Token::LiteralString(raw) => Ok((input, Object::String(decode_literal_string_escapes(raw)))),
        Token::HexString(raw) => match decode_hex(raw) {
            Ok(bytes) => Ok((input, Object::String(bytes))),
            Err(_) => Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::HexDigit,
            ))),
        },
        Token::Name(name) => Ok((input, Object::Name(name))),
        Token::ArrayStart => parse_array(input),
        Token::DictStart => {
            let (remaining, dict) = parse_dictionary(input)?;
            if let Ok((stream_input, Token::StreamStart)) = token(remaining) {
                let (rest, data) = parse_stream_data(stream_input, &dict)?;
                return Ok((
                    rest,
                    Object::Stream {
                        dict,
                        data: bytes::Bytes::from(data),
                    },
                ));
            }
            Ok((remaining, Object::Dictionary(dict)))
        },
        _ => Err(fail(input, nom::error::ErrorKind::Tag)),
    }
}

/// Parse stream data after the `stream` keyword.
///
/// A direct /Length is trusted when `endstream` follows it; otherwise (an
/// indirect or wrong /Length) the data runs up to the next `endstream`.
fn parse_stream_data<'a>(input: &'a [u8], dict: &Dict) -> IResult<&'a [u8], Vec<u8>> {
    let input = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") || input.starts_with(b"\r") {
        &input[1..]
    } else {
        input
    };

    if let Some(length) = dict.get("Length").and_then(Object::as_integer) {
        let length = length.max(0) as usize;
        if length <= input.len() {
            if let Ok((rest, Token::StreamEnd)) = token(&input[length..]) {
                return Ok((rest, input[..length].to_vec()));
            }
        }
        log::debug!("Stream /Length {} does not reach endstream, scanning", length);
    }

    let pos = find_keyword(input, b"endstream").ok_or_else(|| fail(input, nom::error::ErrorKind::Eof))?;
    let mut data = &input[..pos];
    // EOL before endstream is not part of the data
    if data.ends_with(b"\r\n") {
        data = &data[..data.len() - 2];
    } else if data.ends_with(b"\n") || data.ends_with(b"\r") {
        data = &data[..data.len() - 1];
    }
    Ok((&input[pos + b"endstream".len()..], data.to_vec()))
}

/// Position of the first occurrence of `keyword` in `input`.
pub(crate) fn find_keyword(input: &[u8], keyword: &[u8]) -> Option<usize> {
    input.windows(keyword.len()).position(|w| w == keyword)
}

fn parse_array(mut input: &[u8]) -> IResult<&[u8], Object> {
    let mut objects = Vec::new();
    loop {
        if let Ok((rest, Token::ArrayEnd)) = token(input) {
            return Ok((rest, Object::Array(objects)));
        }
        let (rest, obj) = parse_object(input)?;
        objects.push(obj);
        input = rest;
    }
}

fn parse_dictionary(mut input: &[u8]) -> IResult<&[u8], Dict> {
    let mut dict = Dict::new();
    loop {
        let (rest, tok) = token(input)?;
        match tok {
            Token::DictEnd => return Ok((rest, dict)),
            Token::Name(key) => {
                let (rest, value) = parse_object(rest)?;
                // Null-valued entries are equivalent to absent ones.
                if !value.is_null() {
                    dict.insert(key, value);
                }
                input = rest;
            },
            _ => return Err(fail(input, nom::error::ErrorKind::Tag)),
        }
    }
}

/// Parse an indirect object definition (`id gen obj ... endobj`) starting at
/// `offset` in `data`.
pub fn parse_indirect_object(data: &[u8], offset: usize) -> Result<(ObjectRef, Object)> {
    let err = |reason: &str| Error::ParseError {
        offset,
        reason: reason.to_string(),
    };
    let input = data.get(offset..).ok_or_else(|| err("offset beyond end of file"))?;

    let (input, id) = match token(input) {
        Ok((rest, Token::Integer(id))) if id >= 0 => (rest, id as u32),
        _ => return Err(err("expected object number")),
    };
    let (input, gen) = match token(input) {
        Ok((rest, Token::Integer(gen))) if (0..=u16::MAX as i64).contains(&gen) => (rest, gen as u16),
        _ => return Err(err("expected generation number")),
    };
    let input = match token(input) {
        Ok((rest, Token::ObjStart)) => rest,
        _ => return Err(err("expected 'obj' keyword")),
    };
    let (_, obj) = parse_object(input).map_err(|e| err(&format!("invalid object body: {:?}", e)))?;

    Ok((ObjectRef::new(id, gen), obj))
}
