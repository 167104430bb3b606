//! Cross-reference table parser.
//!
//! The xref maps object numbers to byte offsets, enabling random access to
//! PDF objects. Supports traditional xref tables, cross-reference streams
//! (PDF 1.5+), hybrid files (`/XRefStm`) and incremental updates (`/Prev`).

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Dict, Object};
use crate::parser::{parse_indirect_object, parse_object};
use std::collections::HashMap;

/// Guard against circular /Prev chains.
const MAX_PREV_DEPTH: u32 = 100;

/// Cross-reference table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free object
    Free,
    /// Object stored directly in the file at a byte offset
    Uncompressed {
        /// Byte offset of `id gen obj`
        offset: u64,
        /// Generation number
        generation: u16,
    },
    /// Object stored inside an object stream (PDF 1.5+)
    Compressed {
        /// Object number of the containing object stream
        stream: u32,
        /// Index within the object stream
        index: u32,
    },
}

/// Cross-reference table that maps object numbers to their locations.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    /// Trailer dictionary (for xref streams, the stream dictionary)
    trailer: Option<Dict>,
}

impl CrossRefTable {
    /// Create a new empty cross-reference table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the trailer dictionary if present.
    pub fn trailer(&self) -> Option<&Dict> {
        self.trailer.as_ref()
    }

    /// Add an entry to the cross-reference table.
    pub fn add_entry(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.insert(object_number, entry);
    }

    /// Get an entry by object number.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// Get the number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest object number mentioned by any section.
    pub fn max_object_number(&self) -> u32 {
        self.entries.keys().copied().max().unwrap_or(0)
    }

    /// Merge an older section. Entries already present (newer) win.
    fn merge_from(&mut self, older: CrossRefTable) {
        for (obj_num, entry) in older.entries {
            self.entries.entry(obj_num).or_insert(entry);
        }
        if self.trailer.is_none() {
            self.trailer = older.trailer;
        }
    }
}

/// Find the byte offset recorded after the last `startxref` keyword.
pub fn find_xref_offset(data: &[u8]) -> Result<usize> {
    let tail_start = data.len().saturating_sub(2048);
    let tail = &data[tail_start..];
    let keyword = b"startxref";
    let pos = tail
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or(Error::InvalidXref)?;

    match token(&tail[pos + keyword.len()..]) {
        Ok((_, Token::Integer(offset))) if offset >= 0 && (offset as usize) < data.len() => {
            Ok(offset as usize)
        },
        _ => Err(Error::InvalidXref),
    }
}

/// Parse the cross-reference section at `offset` and every older section
/// reachable through `/Prev`.
pub fn parse_xref(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    parse_xref_recursive(data, offset, 0)
}

fn parse_xref_recursive(data: &[u8], offset: usize, depth: u32) -> Result<CrossRefTable> {
    if depth > MAX_PREV_DEPTH {
        return Err(Error::InvalidPdf(format!(
            "xref /Prev chain depth exceeded {}",
            MAX_PREV_DEPTH
        )));
    }

    let section = data.get(offset..).ok_or(Error::InvalidXref)?;
    let trimmed = crate::lexer::skip_ws(section);

    let mut xref = if trimmed.starts_with(b"xref") {
        log::debug!("Traditional xref at offset {}", offset);
        let mut table = parse_traditional_xref(data, offset)?;
        // Hybrid files keep compressed entries in a side stream.
        let side_stream = table
            .trailer()
            .and_then(|t| t.get("XRefStm"))
            .and_then(Object::as_integer);
        if let Some(stm_offset) = side_stream {
            log::debug!("Hybrid file, reading /XRefStm at {}", stm_offset);
            let mut side = parse_xref_stream(data, stm_offset as usize)?;
            side.trailer = None;
            table.merge_from(side);
        }
        table
    } else {
        log::debug!("Cross-reference stream at offset {}", offset);
        parse_xref_stream(data, offset)?
    };

    let prev = xref
        .trailer()
        .and_then(|t| t.get("Prev"))
        .and_then(Object::as_integer);
    if let Some(prev_offset) = prev {
        log::debug!("Following /Prev {} from xref at {}", prev_offset, offset);
        let older = parse_xref_recursive(data, prev_offset as usize, depth + 1)?;
        xref.merge_from(older);
    }

    Ok(xref)
}

/// Parse a traditional cross-reference table and its trailer.
///
/// ```text
/// xref
/// 0 3
/// 0000000000 65535 f
/// 0000000018 00000 n
/// 0000000077 00000 n
/// trailer
/// << /Size 3 /Root 1 0 R >>
/// ```
fn parse_traditional_xref(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let mut input = crate::lexer::skip_ws(&data[offset..]);
    input = input.strip_prefix(b"xref").ok_or(Error::InvalidXref)?;

    let mut xref = CrossRefTable::new();

    loop {
        input = crate::lexer::skip_ws(input);
        if let Some(rest) = input.strip_prefix(b"trailer") {
            let (_, trailer) = parse_object(rest)
                .map_err(|e| Error::InvalidPdf(format!("unreadable trailer: {:?}", e)))?;
            xref.trailer = Some(trailer.into_dict()?);
            return Ok(xref);
        }

        // Subsection header: "start count"
        let (rest, start) = match token(input) {
            Ok((rest, Token::Integer(v))) if v >= 0 => (rest, v as u32),
            _ => return Err(Error::InvalidXref),
        };
        let (rest, count) = match token(rest) {
            Ok((rest, Token::Integer(v))) if (0..=1_000_000).contains(&v) => (rest, v as u32),
            _ => return Err(Error::InvalidXref),
        };
        input = rest;

        for i in 0..count {
            let (rest, field1) = match token(input) {
                Ok((rest, Token::Integer(v))) => (rest, v),
                _ => return Err(Error::InvalidXref),
            };
            let (rest, field2) = match token(rest) {
                Ok((rest, Token::Integer(v))) => (rest, v),
                _ => return Err(Error::InvalidXref),
            };
            let rest = crate::lexer::skip_ws(rest);
            let kind = rest.first().copied().ok_or(Error::InvalidXref)?;
            input = &rest[1..];

            let entry = match kind {
                b'n' => XRefEntry::Uncompressed {
                    offset: field1.max(0) as u64,
                    generation: field2.clamp(0, u16::MAX as i64) as u16,
                },
                b'f' => XRefEntry::Free,
                other => {
                    log::warn!(
                        "Invalid xref type flag {:?} for object {}, treating as free",
                        other as char,
                        start + i
                    );
                    XRefEntry::Free
                },
            };
            xref.add_entry(start + i, entry);
        }
    }
}

/// Parse a cross-reference stream (`/Type /XRef`).
///
/// Each entry is three big-endian fields with widths from `/W`:
/// type (0 free, 1 uncompressed, 2 compressed), offset or object stream
/// number, generation or index.
fn parse_xref_stream(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let (_, obj) = parse_indirect_object(data, offset)?;
    let decoded = obj.decode_stream_data()?;
    let dict = match obj {
        Object::Stream { dict, .. } => dict,
        _ => return Err(Error::InvalidPdf("xref stream is not a stream object".to_string())),
    };

    if let Some(type_name) = dict.get("Type").and_then(Object::as_name) {
        if type_name != "XRef" {
            return Err(Error::InvalidPdf(format!("expected /Type /XRef, got /{}", type_name)));
        }
    }

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(Object::as_array)
        .ok_or_else(|| Error::InvalidPdf("missing /W array in xref stream".to_string()))?
        .iter()
        .map(|o| o.as_integer().map(|v| v.max(0) as usize))
        .collect::<Option<_>>()
        .ok_or_else(|| Error::InvalidPdf("invalid /W array".to_string()))?;
    if widths.len() != 3 {
        return Err(Error::InvalidPdf("invalid /W array length".to_string()));
    }
    let (w1, w2, w3) = (widths[0], widths[1], widths[2]);
    let entry_size = w1 + w2 + w3;

    let size = dict
        .get("Size")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::InvalidPdf("missing /Size in xref stream".to_string()))?;

    let ranges: Vec<(u32, u32)> = match dict.get("Index").and_then(Object::as_array) {
        Some(index) => index
            .chunks(2)
            .filter_map(|pair| match pair {
                [start, count] => Some((start.as_integer()? as u32, count.as_integer()? as u32)),
                _ => None,
            })
            .collect(),
        None => vec![(0, size.max(0) as u32)],
    };

    let mut xref = CrossRefTable::new();
    let mut records = decoded.chunks_exact(entry_size.max(1));

    for (start, count) in ranges {
        for i in 0..count {
            let record = records
                .next()
                .ok_or_else(|| Error::InvalidPdf("truncated xref stream data".to_string()))?;
            let entry_type = if w1 > 0 { read_int(&record[..w1]) } else { 1 };
            let field2 = read_int(&record[w1..w1 + w2]);
            let field3 = read_int(&record[w1 + w2..w1 + w2 + w3]);

            let entry = match entry_type {
                0 => XRefEntry::Free,
                1 => XRefEntry::Uncompressed {
                    offset: field2,
                    generation: field3 as u16,
                },
                2 => XRefEntry::Compressed {
                    stream: field2 as u32,
                    index: field3 as u32,
                },
                // Reserved types are treated as null references.
                _ => XRefEntry::Free,
            };
            xref.add_entry(start + i, entry);
        }
    }

    xref.trailer = Some(dict);
    Ok(xref)
}

/// Read a big-endian integer of arbitrary width.
fn read_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}
