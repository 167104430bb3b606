//! Stream decoders needed to read document structure.
//!
//! Cross-reference streams and object streams are FlateDecode-compressed,
//! usually with a PNG predictor. Other filters only appear in page content
//! and images, which signing never needs to decode.

use crate::error::{Error, Result};

mod flate;
mod predictor;

pub use flate::FlateDecoder;
pub use predictor::{decode_predictor, DecodeParams};

/// Upper bound on decompressed stream size (decompression bomb protection).
const MAX_DECOMPRESSED_SIZE: usize = 100 * 1024 * 1024;

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of this decoder (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// Decode stream data through a filter pipeline, then undo any predictor.
pub fn decode_stream_with_params(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
) -> Result<Vec<u8>> {
    let mut current = data.to_vec();

    for filter in filters {
        let decoder: &dyn StreamDecoder = match filter.as_str() {
            "FlateDecode" | "Fl" => &FlateDecoder,
            other => {
                return Err(Error::Unsupported(format!("stream filter /{}", other)));
            },
        };
        current = decoder.decode(&current)?;
        if current.len() > MAX_DECOMPRESSED_SIZE {
            return Err(Error::Decode(format!(
                "{} output exceeds {} bytes",
                decoder.name(),
                MAX_DECOMPRESSED_SIZE
            )));
        }
    }

    match params {
        Some(p) if p.predictor > 1 => decode_predictor(&current, p),
        _ => Ok(current),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_filter() {
        let err = decode_stream_with_params(b"abc", &["LZWDecode".to_string()], None).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn test_no_filters_is_identity() {
        assert_eq!(decode_stream_with_params(b"abc", &[], None).unwrap(), b"abc");
    }
}
