//! Authenticated (signed) attributes of the CMS signer.
//!
//! The external signer never sees the document: it signs the DER
//! `DigestInfo` of SHA-256 over the encoded attribute set, and the
//! attribute set carries the document digest as `message-digest`.

use super::revocation::RevocationEvidence;
use super::types::DigestPair;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use cms::signed_data::SignedAttributes;
use der::asn1::{Any, ObjectIdentifier, OctetString, SetOfVec, UtcTime};
use der::{Decode, Encode, Sequence};
use sha2::{Digest, Sha256};
use std::time::Duration;
use x509_cert::attr::Attribute;

/// id-data
pub const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
/// id-signedData
pub const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
/// id-contentType
pub const ID_CONTENT_TYPE: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
/// id-messageDigest
pub const ID_MESSAGE_DIGEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
/// id-signingTime
pub const ID_SIGNING_TIME: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");
/// id-aa-timeStampToken
pub const ID_AA_TIMESTAMP_TOKEN: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.2.14");
/// adbe-revocationInfoArchival
pub const ID_ADBE_REVOCATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113583.1.1.8");
/// id-sha256
pub const ID_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
/// rsaEncryption
pub const ID_RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
/// sha256WithRSAEncryption
pub const ID_SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");

/// DER header of a SHA-256 `DigestInfo`: `SEQUENCE { AlgorithmIdentifier
/// { sha256, NULL }, OCTET STRING (32) }`, without the digest itself.
pub const SHA256_DIGEST_INFO_PREFIX: [u8; 19] = [
    0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01, 0x05, 0x00, 0x04,
    0x20,
];

/// Value of the `adbe-revocationInfoArchival` attribute.
///
/// ```text
/// RevocationInfoArchival ::= SEQUENCE {
///     crl   [0] EXPLICIT SEQUENCE OF CRLs OPTIONAL,
///     ocsp  [1] EXPLICIT SEQUENCE OF OCSPResponse OPTIONAL,
///     otherRevInfo [2] EXPLICIT SEQUENCE OF OtherRevInfo OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct RevocationInfoArchival {
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub crl: Option<Vec<Any>>,
    #[asn1(context_specific = "1", tag_mode = "EXPLICIT", optional = "true")]
    pub ocsp: Option<Vec<Any>>,
}

impl RevocationInfoArchival {
    /// Build the archival value, or `None` when there is nothing to embed.
    pub fn from_evidence(evidence: &RevocationEvidence) -> Result<Option<Self>> {
        let crl = embed_all(evidence.crls.as_deref())?;
        let ocsp = embed_all(evidence.ocsp.as_deref())?;
        if crl.is_none() && ocsp.is_none() {
            return Ok(None);
        }
        Ok(Some(Self { crl, ocsp }))
    }
}

fn embed_all(blobs: Option<&[Vec<u8>]>) -> Result<Option<Vec<Any>>> {
    match blobs {
        Some(blobs) if !blobs.is_empty() => {
            let values = blobs
                .iter()
                .map(|blob| Any::from_der(blob))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(Some(values))
        },
        _ => Ok(None),
    }
}

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

fn attribute(oid: ObjectIdentifier, value: Any) -> Result<Attribute> {
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![value])?,
    })
}

/// Encode a signing instant as the `signing-time` UTCTime.
fn utc_time(signing_time: DateTime<Utc>) -> Result<UtcTime> {
    let secs = u64::try_from(signing_time.timestamp())
        .map_err(|_| Error::Digest(format!("signing time {} predates the epoch", signing_time)))?;
    Ok(UtcTime::from_unix_duration(Duration::from_secs(secs))?)
}

/// Assemble the authenticated attributes for a document digest.
///
/// The set is DER-sorted, so rebuilding it from the same inputs in
/// phase two yields byte-identical attributes.
pub fn build_signed_attributes(
    raw_digest: &[u8; 32],
    signing_time: DateTime<Utc>,
    evidence: Option<&RevocationEvidence>,
) -> Result<SignedAttributes> {
    let mut attrs = vec![
        attribute(ID_CONTENT_TYPE, Any::encode_from(&ID_DATA)?)?,
        attribute(ID_MESSAGE_DIGEST, Any::encode_from(&OctetString::new(raw_digest.to_vec())?)?)?,
        attribute(ID_SIGNING_TIME, Any::encode_from(&utc_time(signing_time)?)?)?,
    ];

    if let Some(archival) = evidence
        .map(RevocationInfoArchival::from_evidence)
        .transpose()?
        .flatten()
    {
        attrs.push(attribute(ID_ADBE_REVOCATION, Any::encode_from(&archival)?)?);
    }

    Ok(SetOfVec::try_from(attrs)?)
}

/// Digest pair for a document digest and its authenticated attributes.
pub fn digest_pair(raw_digest: [u8; 32], attrs: &SignedAttributes) -> Result<DigestPair> {
    let encoded = attrs.to_der()?;
    Ok(DigestPair::new(raw_digest, &sha256(&encoded)))
}

/// Read the `message-digest` value back out of an attribute set.
pub fn message_digest(attrs: &SignedAttributes) -> Option<Vec<u8>> {
    attrs
        .iter()
        .find(|attr| attr.oid == ID_MESSAGE_DIGEST)
        .and_then(|attr| attr.values.iter().next())
        .and_then(|value| value.decode_as::<OctetString>().ok())
        .map(|octets| octets.as_bytes().to_vec())
}
