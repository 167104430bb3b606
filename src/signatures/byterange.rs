//! ByteRange calculation for PDF signatures.
//!
//! PDF digital signatures use a ByteRange array to specify which portions
//! of the document are covered by the signature. The signature itself is
//! stored in a placeholder that is excluded from the signed bytes.
//!
//! ## ByteRange Format
//!
//! The ByteRange is an array of four integers:
//! `[offset1, length1, offset2, length2]`
//!
//! Where:
//! - `offset1` = 0 (start of file)
//! - `length1` = byte offset where the signature value begins
//! - `offset2` = byte offset where the signature value ends
//! - `length2` = remaining bytes to end of file
//!
//! The signature value is a hex-encoded string within `<` and `>` delimiters.
//! Offsets are only known once the file is assembled, so the array is first
//! written as a fixed-width placeholder and patched in place afterwards.

use crate::error::{Error, Result};
use crate::object::Object;

/// Value written for the unknown ByteRange entries before patching.
const PLACEHOLDER_VALUE: i64 = 9_999_999_999;

/// Calculator for PDF signature byte ranges.
#[derive(Debug)]
pub struct ByteRangeCalculator {
    /// Size of the placeholder for the signature value (hex digits + 2 for angle brackets)
    placeholder_size: usize,
}

impl ByteRangeCalculator {
    /// Create a calculator for a container of `reserved_size` bytes.
    ///
    /// The placeholder size is `reserved_size * 2 + 2` because the
    /// container is hex-encoded and enclosed in angle brackets.
    pub fn new(reserved_size: usize) -> Self {
        Self {
            placeholder_size: reserved_size * 2 + 2,
        }
    }

    /// Create a ByteRange calculator with a specific placeholder size.
    pub fn with_placeholder_size(placeholder_size: usize) -> Self {
        Self { placeholder_size }
    }

    /// Get the placeholder size (for the /Contents value).
    pub fn placeholder_size(&self) -> usize {
        self.placeholder_size
    }

    /// Number of container bytes the placeholder can hold.
    pub fn capacity(&self) -> usize {
        self.placeholder_size.saturating_sub(2) / 2
    }

    /// ByteRange array written before the file layout is known.
    pub fn placeholder_array() -> Object {
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(PLACEHOLDER_VALUE),
            Object::Integer(PLACEHOLDER_VALUE),
            Object::Integer(PLACEHOLDER_VALUE),
        ])
    }

    /// Calculate the ByteRange array given the position of the /Contents value.
    ///
    /// Returns `[0, before_sig, after_sig_start, after_sig_len]`.
    pub fn calculate_byte_range(&self, file_size: usize, contents_offset: usize) -> [i64; 4] {
        let before_sig = contents_offset as i64;
        let after_sig_start = (contents_offset + self.placeholder_size) as i64;
        let after_sig_len = file_size as i64 - after_sig_start;

        [0, before_sig, after_sig_start, after_sig_len]
    }

    /// Format a ByteRange array as a PDF array string.
    pub fn format_byte_range(byte_range: &[i64; 4]) -> String {
        format!("[{} {} {} {}]", byte_range[0], byte_range[1], byte_range[2], byte_range[3])
    }

    /// Read a ByteRange array from a signature dictionary entry.
    pub fn from_object(obj: &Object) -> Option<[i64; 4]> {
        match obj.as_array()?.as_slice() {
            [a, b, c, d] => Some([a.as_integer()?, b.as_integer()?, c.as_integer()?, d.as_integer()?]),
            _ => None,
        }
    }

    /// Overwrite the placeholder ByteRange of the signature dictionary at
    /// `sig_dict_offset` with the actual values, padding with spaces so the
    /// file length is unchanged.
    pub fn patch_byte_range(pdf_data: &mut [u8], sig_dict_offset: usize, byte_range: &[i64; 4]) -> Result<()> {
        let window_end = (sig_dict_offset + 4096).min(pdf_data.len());
        let window = pdf_data
            .get(sig_dict_offset..window_end)
            .ok_or_else(|| Error::GapReservation("signature dictionary offset out of bounds".to_string()))?;

        let key = crate::parser::find_keyword(window, b"/ByteRange")
            .ok_or_else(|| Error::GapReservation("no /ByteRange in signature dictionary".to_string()))?;
        let open = key
            + window[key..]
                .iter()
                .position(|&b| b == b'[')
                .ok_or_else(|| Error::GapReservation("malformed /ByteRange".to_string()))?;
        let close = open
            + window[open..]
                .iter()
                .position(|&b| b == b']')
                .ok_or_else(|| Error::GapReservation("malformed /ByteRange".to_string()))?;

        let slot_len = close + 1 - open;
        let mut formatted = Self::format_byte_range(byte_range).into_bytes();
        if formatted.len() > slot_len {
            return Err(Error::GapReservation(format!(
                "ByteRange {} does not fit its {}-byte placeholder",
                String::from_utf8_lossy(&formatted),
                slot_len
            )));
        }
        formatted.resize(slot_len, b' ');

        let start = sig_dict_offset + open;
        pdf_data[start..start + slot_len].copy_from_slice(&formatted);
        Ok(())
    }

    /// Extract the bytes to be signed from a PDF file.
    ///
    /// This returns the concatenation of the two ranges specified by ByteRange.
    pub fn extract_signed_bytes(pdf_data: &[u8], byte_range: &[i64; 4]) -> Result<Vec<u8>> {
        if byte_range.iter().any(|&v| v < 0) {
            return Err(Error::InvalidPdf(format!("negative ByteRange value in {:?}", byte_range)));
        }
        let offset1 = byte_range[0] as usize;
        let length1 = byte_range[1] as usize;
        let offset2 = byte_range[2] as usize;
        let length2 = byte_range[3] as usize;

        if offset1 + length1 > pdf_data.len() {
            return Err(Error::InvalidPdf(format!(
                "ByteRange first range exceeds file size: {} + {} > {}",
                offset1,
                length1,
                pdf_data.len()
            )));
        }
        if offset2 + length2 > pdf_data.len() {
            return Err(Error::InvalidPdf(format!(
                "ByteRange second range exceeds file size: {} + {} > {}",
                offset2,
                length2,
                pdf_data.len()
            )));
        }

        let mut signed_bytes = Vec::with_capacity(length1 + length2);
        signed_bytes.extend_from_slice(&pdf_data[offset1..offset1 + length1]);
        signed_bytes.extend_from_slice(&pdf_data[offset2..offset2 + length2]);

        Ok(signed_bytes)
    }

    /// Check if a ByteRange covers the entire document except the signature.
    ///
    /// A valid ByteRange should:
    /// - Start at offset 0
    /// - End at the file size
    /// - Have no gaps except for the signature placeholder
    pub fn validate_byte_range(byte_range: &[i64; 4], file_size: usize) -> Result<()> {
        let [offset1, length1, offset2, length2] = *byte_range;

        if offset1 != 0 {
            return Err(Error::InvalidPdf(format!("ByteRange must start at 0, got {}", offset1)));
        }

        let expected_end = file_size as i64;
        let actual_end = offset2 + length2;
        if actual_end != expected_end {
            return Err(Error::InvalidPdf(format!(
                "ByteRange must end at file size {}, got {}",
                expected_end, actual_end
            )));
        }

        if length1 > offset2 {
            return Err(Error::InvalidPdf(format!(
                "ByteRange first range ({}) overlaps with second range start ({})",
                length1, offset2
            )));
        }

        Ok(())
    }

    /// Find the /Contents value position in a signature dictionary.
    ///
    /// This searches for the pattern `/Contents <` and returns the offset
    /// of the opening angle bracket.
    pub fn find_contents_offset(pdf_data: &[u8], sig_dict_offset: usize) -> Option<usize> {
        let search_end = (sig_dict_offset + 4096).min(pdf_data.len());
        let window = pdf_data.get(sig_dict_offset..search_end)?;

        let pattern = b"/Contents";
        let mut pos = 0;
        while let Some(found) = crate::parser::find_keyword(&window[pos..], pattern) {
            let after = pos + found + pattern.len();
            let value_start = window[after..]
                .iter()
                .position(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
                .map(|skip| after + skip);
            if let Some(start) = value_start {
                if window[start] == b'<' && window.get(start + 1) != Some(&b'<') {
                    return Some(sig_dict_offset + start);
                }
            }
            pos = after;
        }

        None
    }

    /// Replace the placeholder in the PDF with the hex-encoded container.
    ///
    /// Unused placeholder space is padded with `0` digits.
    ///
    /// # Errors
    ///
    /// [`Error::ContainerOverflow`] when the container is larger than the
    /// reserved capacity. Nothing is written in that case.
    pub fn insert_signature(&self, pdf_data: &mut [u8], contents_offset: usize, container: &[u8]) -> Result<()> {
        if container.len() > self.capacity() {
            return Err(Error::ContainerOverflow {
                required: container.len(),
                available: self.capacity(),
            });
        }

        let end = contents_offset + self.placeholder_size;
        let slot = pdf_data
            .get_mut(contents_offset..end)
            .ok_or_else(|| Error::InvalidPdf("Signature insertion would exceed file bounds".to_string()))?;
        if slot.first() != Some(&b'<') || slot.last() != Some(&b'>') {
            return Err(Error::InvalidPdf(format!(
                "no signature placeholder at offset {}",
                contents_offset
            )));
        }

        let hex = bytes_to_hex(container);
        slot[1..1 + hex.len()].copy_from_slice(hex.as_bytes());
        slot[1 + hex.len()..self.placeholder_size - 1].fill(b'0');
        Ok(())
    }
}

/// Convert bytes to uppercase hex string.
pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    const HEX_CHARS: &[u8] = b"0123456789ABCDEF";
    let mut hex = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
        hex.push(HEX_CHARS[(byte & 0x0F) as usize] as char);
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_size() {
        let calc = ByteRangeCalculator::new(1024);
        assert_eq!(calc.placeholder_size(), 2050);
        assert_eq!(calc.capacity(), 1024);
    }

    #[test]
    fn test_calculate_byte_range() {
        let calc = ByteRangeCalculator::with_placeholder_size(100);
        assert_eq!(calc.calculate_byte_range(1000, 400), [0, 400, 500, 500]);
    }

    #[test]
    fn test_format_and_read_byte_range() {
        assert_eq!(ByteRangeCalculator::format_byte_range(&[0, 100, 200, 300]), "[0 100 200 300]");
        let obj = Object::Array((1..=4).map(Object::Integer).collect());
        assert_eq!(ByteRangeCalculator::from_object(&obj), Some([1, 2, 3, 4]));
        assert_eq!(ByteRangeCalculator::from_object(&Object::Array(vec![])), None);
    }

    #[test]
    fn test_patch_byte_range_keeps_length() {
        let mut data = b"<< /ByteRange [0 9999999999 9999999999 9999999999] /Contents <00> >>".to_vec();
        let before = data.len();
        ByteRangeCalculator::patch_byte_range(&mut data, 0, &[0, 12, 40, 7]).unwrap();
        assert_eq!(data.len(), before);
        let text = String::from_utf8(data).unwrap();
        assert!(text.starts_with("<< /ByteRange [0 12 40 7]"));
        assert!(text.contains("7]                           /Contents"));
    }

    #[test]
    fn test_patch_byte_range_too_wide() {
        let mut data = b"/ByteRange [0 1 2 3]".to_vec();
        let err = ByteRangeCalculator::patch_byte_range(&mut data, 0, &[0, 12345, 67890, 12]).unwrap_err();
        assert!(matches!(err, Error::GapReservation(_)));
    }

    #[test]
    fn test_extract_signed_bytes() {
        let signed = ByteRangeCalculator::extract_signed_bytes(b"AAABBBCCC", &[0, 3, 6, 3]).unwrap();
        assert_eq!(signed, b"AAACCC");
        assert!(ByteRangeCalculator::extract_signed_bytes(b"AAA", &[0, 3, 6, 3]).is_err());
    }

    #[test]
    fn test_validate_byte_range() {
        assert!(ByteRangeCalculator::validate_byte_range(&[0, 100, 150, 50], 200).is_ok());
        assert!(ByteRangeCalculator::validate_byte_range(&[10, 100, 150, 50], 200).is_err());
        assert!(ByteRangeCalculator::validate_byte_range(&[0, 100, 150, 100], 200).is_err());
        assert!(ByteRangeCalculator::validate_byte_range(&[0, 160, 150, 50], 200).is_err());
    }

    #[test]
    fn test_find_contents_offset_skips_dictionaries() {
        let data = b"xx<< /Contents << /A 1 >> >> << /Type /Sig /Contents <0000> >>";
        let offset = ByteRangeCalculator::find_contents_offset(data, 0).unwrap();
        assert_eq!(&data[offset..offset + 6], b"<0000>");
    }

    #[test]
    fn test_insert_signature_pads_with_zeros() {
        let calc = ByteRangeCalculator::with_placeholder_size(10);
        let mut pdf_data = b"XX<00000000>YY".to_vec();
        calc.insert_signature(&mut pdf_data, 2, &[0xAB, 0xCD]).unwrap();
        assert_eq!(&pdf_data, b"XX<ABCD0000>YY");
    }

    #[test]
    fn test_insert_signature_overflow() {
        let calc = ByteRangeCalculator::with_placeholder_size(10);
        let mut pdf_data = b"XX<00000000>YY".to_vec();
        let err = calc.insert_signature(&mut pdf_data, 2, &[1, 2, 3, 4, 5]).unwrap_err();
        assert!(matches!(
            err,
            Error::ContainerOverflow {
                required: 5,
                available: 4
            }
        ));
        assert_eq!(&pdf_data, b"XX<00000000>YY");
    }

    #[test]
    fn test_insert_signature_requires_placeholder() {
        let calc = ByteRangeCalculator::with_placeholder_size(4);
        let mut pdf_data = b"XXXXXX".to_vec();
        assert!(calc.insert_signature(&mut pdf_data, 1, &[1]).is_err());
    }
}
