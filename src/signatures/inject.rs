//! Phase two: wrap the external signature and fill the reserved gap.

use super::attributes::{build_signed_attributes, digest_pair, sha256};
use super::byterange::ByteRangeCalculator;
use super::container::{build_container, request_timestamp};
use super::signer::locate_signature;
use super::types::DigestPair;
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::session::SigningSession;
use chrono::{DateTime, Utc};
use log::debug;

/// Inject the container for `signature` into an intermediary document.
///
/// `digests` and `signing_time` are the values phase one produced for this
/// document; the signed bytes and the rebuilt attributes must reproduce
/// them exactly, otherwise the signature would not cover this document.
///
/// # Errors
///
/// - [`Error::Digest`] when the document or attributes changed since phase one
/// - [`Error::ContainerOverflow`] when the container exceeds the gap
pub fn inject(
    session: &SigningSession,
    intermediary: Vec<u8>,
    signature: &[u8],
    digests: &DigestPair,
    signing_time: DateTime<Utc>,
) -> Result<Vec<u8>> {
    if signature.is_empty() {
        return Err(Error::Digest("empty signature".to_string()));
    }

    let doc = PdfDocument::from_bytes(intermediary)?;
    let location = locate_signature(&doc, &session.config().field_name)?;

    let signed_bytes = ByteRangeCalculator::extract_signed_bytes(doc.data(), &location.byte_range)?;
    let raw_digest = sha256(&signed_bytes);
    if raw_digest != digests.raw_digest {
        return Err(Error::Digest(
            "document bytes changed since the hash was issued".to_string(),
        ));
    }

    let attrs = build_signed_attributes(&raw_digest, signing_time, session.evidence())?;
    if digest_pair(raw_digest, &attrs)?.signable_hash != digests.signable_hash {
        return Err(Error::Digest(
            "authenticated attributes differ from the ones that were signed".to_string(),
        ));
    }

    let token = request_timestamp(session.tsa(), signature);
    let container = build_container(session.chain(), attrs, signature, token.as_deref())?;

    let mut data = doc.into_data();
    ByteRangeCalculator::with_placeholder_size(location.placeholder_size).insert_signature(
        &mut data,
        location.contents_offset,
        &container,
    )?;

    debug!(
        "Injected {}-byte container into {}-byte gap",
        container.len(),
        location.placeholder_size
    );
    Ok(data)
}
