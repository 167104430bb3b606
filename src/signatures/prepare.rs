//! Phase one: reserve the gap and derive the hash to be signed.

use super::attributes::{build_signed_attributes, digest_pair, sha256};
use super::byterange::ByteRangeCalculator;
use super::signer::PdfSigner;
use super::types::DigestPair;
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::session::SigningSession;
use chrono::{DateTime, Utc};
use log::debug;

/// A document ready for the external signer.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    /// Intermediary document with the unfilled gap
    pub data: Vec<u8>,
    /// Content digest and hash to be signed
    pub digests: DigestPair,
    /// Instant recorded in the signature; phase two must reuse it
    pub signing_time: DateTime<Utc>,
    /// Container bytes the gap can hold
    pub reserved_size: usize,
    /// ByteRange of the reserved signature
    pub byte_range: [i64; 4],
}

/// Reserve a signature gap in `source` and compute its digests.
///
/// # Errors
///
/// - [`Error::SourceRead`] when `source` is not a readable PDF
/// - [`Error::GapReservation`] when the signature cannot be placed
pub fn prepare(session: &SigningSession, source: &[u8], signing_time: DateTime<Utc>) -> Result<PreparedDocument> {
    let doc = PdfDocument::from_bytes(source.to_vec()).map_err(|e| Error::SourceRead(e.to_string()))?;
    let identity = session.chain().identity()?;
    let gap = PdfSigner::new(&doc, session.appearance(), session.reserved_size())
        .reserve(&identity, signing_time)
        .map_err(|e| match e {
            Error::GapReservation(_) => e,
            other => Error::GapReservation(other.to_string()),
        })?;

    let signed_bytes = ByteRangeCalculator::extract_signed_bytes(&gap.data, &gap.byte_range)?;
    let raw_digest = sha256(&signed_bytes);
    let attrs = build_signed_attributes(&raw_digest, signing_time, session.evidence())?;
    let digests = digest_pair(raw_digest, &attrs)?;

    debug!(
        "Prepared {}-byte document ({} bytes reserved) for external signing",
        gap.data.len(),
        gap.reserved_size
    );

    Ok(PreparedDocument {
        data: gap.data,
        digests,
        signing_time,
        reserved_size: gap.reserved_size,
        byte_range: gap.byte_range,
    })
}
