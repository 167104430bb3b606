//! Object stream parsing (PDF 1.5+).
//!
//! Object streams (/Type /ObjStm) compress several objects into a single
//! stream. Documents saved by modern producers usually keep the catalog,
//! the page tree and the AcroForm here, so a signer has to read them.
//!
//! # Format
//!
//! ```text
//! N 0 obj
//! << /Type /ObjStm /N 2 /First 9 /Filter /FlateDecode >>
//! stream
//! 10 0 11 3           % Pairs: (obj_num, offset relative to /First)
//! 42 /Test            % Object data
//! endstream
//! endobj
//! ```

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::Object;
use crate::parser::parse_object;
use std::collections::HashMap;

/// Parse an object stream and extract all objects it holds.
///
/// Objects that fail to parse are logged and skipped; the rest of the
/// stream is still returned.
pub fn parse_object_stream(stream_obj: &Object) -> Result<HashMap<u32, Object>> {
    let dict = match stream_obj {
        Object::Stream { dict, .. } => dict,
        _ => return Err(Error::InvalidPdf("object stream is not a Stream object".to_string())),
    };

    if let Some(type_name) = dict.get("Type").and_then(Object::as_name) {
        if type_name != "ObjStm" {
            return Err(Error::InvalidPdf(format!(
                "expected /Type /ObjStm, got /Type /{}",
                type_name
            )));
        }
    }

    let n = dict
        .get("N")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::InvalidPdf("object stream missing /N entry".to_string()))?;
    let first = dict
        .get("First")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::InvalidPdf("object stream missing /First entry".to_string()))?;

    if !(0..=1_000_000).contains(&n) {
        return Err(Error::InvalidPdf(format!("invalid object stream /N value: {}", n)));
    }
    if !(0..=10_000_000).contains(&first) {
        return Err(Error::InvalidPdf(format!("invalid object stream /First value: {}", first)));
    }
    let (n, first) = (n as usize, first as usize);

    let decoded = stream_obj.decode_stream_data()?;
    if decoded.len() < first {
        return Err(Error::InvalidPdf(format!(
            "object stream data too short: {} bytes, expected at least {}",
            decoded.len(),
            first
        )));
    }

    let pairs = parse_object_number_pairs(&decoded[..first], n)?;
    let objects_data = &decoded[first..];
    let mut result = HashMap::with_capacity(pairs.len());

    for (obj_num, offset) in pairs {
        let Some(obj_data) = objects_data.get(offset..) else {
            log::warn!(
                "Object {} offset {} is beyond stream data length {}",
                obj_num,
                offset,
                objects_data.len()
            );
            continue;
        };
        match parse_object(obj_data) {
            Ok((_, obj)) => {
                result.insert(obj_num, obj);
            },
            Err(e) => {
                log::warn!("Failed to parse object {} from stream at offset {}: {:?}", obj_num, offset, e);
            },
        }
    }

    Ok(result)
}

/// Read the `(object number, offset)` pairs that precede `/First`.
fn parse_object_number_pairs(data: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut pairs = Vec::with_capacity(count);
    let mut remaining = data;

    for i in 0..count {
        let mut next_int = |what: &str| -> Result<i64> {
            match token(remaining) {
                Ok((rest, Token::Integer(v))) if v >= 0 => {
                    remaining = rest;
                    Ok(v)
                },
                _ => Err(Error::ParseError {
                    offset: data.len() - remaining.len(),
                    reason: format!("failed to parse {} for pair {}", what, i),
                }),
            }
        };
        let obj_num = next_int("object number")?;
        let offset = next_int("offset")?;
        pairs.push((obj_num as u32, offset as usize));
    }

    Ok(pairs)
}
