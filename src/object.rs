//! PDF object types.
//!
//! Dictionaries keep insertion order so that objects written back into an
//! incremental update serialize deterministically.

use crate::error::{Error, Result};
use indexmap::IndexMap;

/// Dictionary type shared by dictionaries and stream dictionaries.
pub type Dict = IndexMap<String, Object>;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String (byte array)
    String(Vec<u8>),
    /// Name (starting with /)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (key-value pairs)
    Dictionary(Dict),
    /// Stream (dictionary + data)
    Stream {
        /// Stream dictionary
        dict: Dict,
        /// Raw (still encoded) stream data
        data: bytes::Bytes,
    },
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

impl Object {
    /// Get the type name of this object (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream { .. } => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// Shorthand for a name object.
    pub fn name(name: &str) -> Self {
        Object::Name(name.to_string())
    }

    /// Text string object. ASCII text is stored as is, anything else as
    /// UTF-16BE with a byte order mark.
    pub fn text(text: &str) -> Self {
        if text.is_ascii() {
            return Object::String(text.as_bytes().to_vec());
        }
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes)
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to string (bytes).
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Take the dictionary out of a Dictionary object.
    pub fn into_dict(self) -> Result<Dict> {
        match self {
            Object::Dictionary(d) => Ok(d),
            other => Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Decode stream data using the filters named in the stream dictionary.
    ///
    /// Only the filters needed to read document structure (cross-reference
    /// and object streams) are supported.
    pub fn decode_stream_data(&self) -> Result<Vec<u8>> {
        match self {
            Object::Stream { dict, data } => {
                let filters = dict.get("Filter").map(extract_filter_names).unwrap_or_default();
                if filters.is_empty() {
                    return Ok(data.to_vec());
                }
                let params = extract_decode_params(dict.get("DecodeParms"));
                crate::decoders::decode_stream_with_params(data, &filters, params.as_ref())
            },
            other => Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }
}

/// Filter names from a /Filter entry (single name or array of names).
fn extract_filter_names(filter_obj: &Object) -> Vec<String> {
    match filter_obj {
        Object::Name(name) => vec![name.clone()],
        Object::Array(arr) => arr
            .iter()
            .filter_map(|o| o.as_name().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Predictor parameters from a /DecodeParms entry.
///
/// When the entry is an array, the first dictionary is used.
pub(crate) fn extract_decode_params(
    params_obj: Option<&Object>,
) -> Option<crate::decoders::DecodeParams> {
    let dict = match params_obj? {
        Object::Dictionary(d) => d,
        Object::Array(arr) => arr.iter().find_map(|o| match o {
            Object::Dictionary(d) => Some(d),
            _ => None,
        })?,
        _ => return None,
    };

    let int = |key: &str, default: i64| dict.get(key).and_then(Object::as_integer).unwrap_or(default);

    Some(crate::decoders::DecodeParams {
        predictor: int("Predictor", 1),
        columns: int("Columns", 1).max(1) as usize,
        colors: int("Colors", 1).max(1) as usize,
        bits_per_component: int("BitsPerComponent", 8).max(1) as usize,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_object_accessors() {
        assert_eq!(Object::Integer(42).as_integer(), Some(42));
        assert_eq!(Object::name("Sig").as_name(), Some("Sig"));
        assert_eq!(Object::text("abc").as_string(), Some(&b"abc"[..]));
        assert!(Object::Null.is_null());
        assert_eq!(Object::Integer(1).as_name(), None);
    }

    #[test]
    fn test_non_ascii_text_is_utf16() {
        assert_eq!(Object::text("é"), Object::String(vec![0xFE, 0xFF, 0x00, 0xE9]));
    }

    #[test]
    fn test_object_ref_display() {
        assert_eq!(ObjectRef::new(12, 0).to_string(), "12 0 R");
    }

    #[test]
    fn test_dictionary_keeps_insertion_order() {
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::name("Sig"));
        dict.insert("Filter".to_string(), Object::name("Adobe.PPKLite"));
        dict.insert("ByteRange".to_string(), Object::Array(vec![]));
        let keys: Vec<_> = dict.keys().cloned().collect();
        assert_eq!(keys, vec!["Type", "Filter", "ByteRange"]);
    }

    #[test]
    fn test_into_dict_wrong_type() {
        let err = Object::Integer(3).into_dict().unwrap_err();
        assert!(err.to_string().contains("expected Dictionary"));
    }

    #[test]
    fn test_decode_stream_no_filter() {
        let obj = Object::Stream {
            dict: Dict::new(),
            data: bytes::Bytes::from_static(b"plain"),
        };
        assert_eq!(obj.decode_stream_data().unwrap(), b"plain");
    }

    #[test]
    fn test_decode_stream_flate() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"compressed payload").unwrap();
        let compressed = encoder.finish().unwrap();

        let mut dict = Dict::new();
        dict.insert("Filter".to_string(), Object::name("FlateDecode"));
        let obj = Object::Stream {
            dict,
            data: bytes::Bytes::from(compressed),
        };
        assert_eq!(obj.decode_stream_data().unwrap(), b"compressed payload");
    }

    #[test]
    fn test_decode_stream_not_a_stream() {
        assert!(Object::Integer(1).decode_stream_data().is_err());
    }

    #[test]
    fn test_extract_decode_params_from_array() {
        let mut params = Dict::new();
        params.insert("Predictor".to_string(), Object::Integer(12));
        params.insert("Columns".to_string(), Object::Integer(5));
        let obj = Object::Array(vec![Object::Null, Object::Dictionary(params)]);
        let parsed = extract_decode_params(Some(&obj)).unwrap();
        assert_eq!(parsed.predictor, 12);
        assert_eq!(parsed.columns, 5);
        assert_eq!(parsed.colors, 1);
    }
}
