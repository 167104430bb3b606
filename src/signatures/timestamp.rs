//! RFC 3161 timestamp tokens.
//!
//! The codec (request encoding, response decoding and imprint checks)
//! is transport-agnostic; [`HttpTimestampClient`] posts requests over
//! HTTP when the `tsa-http` feature is enabled.

use super::attributes::{ID_SHA256, ID_SIGNED_DATA};
use crate::error::{Error, Result};
use cms::content_info::ContentInfo;
use cms::signed_data::SignedData;
use der::asn1::{Any, BitString, ObjectIdentifier, OctetString, Uint};
use der::{Decode, Encode, Sequence};
use spki::AlgorithmIdentifierOwned;

/// A timestamp authority.
pub trait TimestampClient: Send + Sync {
    /// Obtain a DER `TimeStampToken` for a SHA-256 `imprint`, or `None`
    /// when the authority declined.
    fn timestamp_token(&self, imprint: &[u8]) -> Result<Option<Vec<u8>>>;
}

impl<F> TimestampClient for F
where
    F: Fn(&[u8]) -> Result<Option<Vec<u8>>> + Send + Sync,
{
    fn timestamp_token(&self, imprint: &[u8]) -> Result<Option<Vec<u8>>> {
        self(imprint)
    }
}

/// `MessageImprint ::= SEQUENCE { hashAlgorithm, hashedMessage }`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct MessageImprint {
    pub hash_algorithm: AlgorithmIdentifierOwned,
    pub hashed_message: OctetString,
}

impl MessageImprint {
    /// Imprint of a SHA-256 digest.
    pub fn sha256(digest: &[u8]) -> Result<Self> {
        Ok(Self {
            hash_algorithm: AlgorithmIdentifierOwned {
                oid: ID_SHA256,
                parameters: None,
            },
            hashed_message: OctetString::new(digest.to_vec())?,
        })
    }

    /// Same algorithm and digest; algorithm parameters are ignored
    /// because authorities differ on absent versus NULL.
    pub fn matches(&self, other: &MessageImprint) -> bool {
        self.hash_algorithm.oid == other.hash_algorithm.oid && self.hashed_message == other.hashed_message
    }
}

fn default_false() -> bool {
    false
}

/// `TimeStampReq` without extensions.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TimeStampReq {
    pub version: u8,
    pub message_imprint: MessageImprint,
    #[asn1(optional = "true")]
    pub req_policy: Option<ObjectIdentifier>,
    #[asn1(optional = "true")]
    pub nonce: Option<Uint>,
    #[asn1(default = "default_false")]
    pub cert_req: bool,
}

/// `PKIStatusInfo`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct PkiStatusInfo {
    pub status: u32,
    #[asn1(optional = "true")]
    pub status_string: Option<Vec<String>>,
    #[asn1(optional = "true")]
    pub fail_info: Option<BitString>,
}

impl PkiStatusInfo {
    /// `granted` (0) or `grantedWithMods` (1).
    pub fn is_granted(&self) -> bool {
        self.status <= 1
    }
}

/// `TimeStampResp`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TimeStampResp {
    pub status: PkiStatusInfo,
    #[asn1(optional = "true")]
    pub time_stamp_token: Option<Any>,
}

/// Encode a request for a SHA-256 digest, asking for the TSA certificate.
pub fn build_request(digest: &[u8], nonce: Option<&[u8]>) -> Result<Vec<u8>> {
    let request = TimeStampReq {
        version: 1,
        message_imprint: MessageImprint::sha256(digest)?,
        req_policy: None,
        nonce: nonce.map(Uint::new).transpose()?,
        cert_req: true,
    };
    Ok(request.to_der()?)
}

/// Decode a response and return its token after checking that it
/// timestamps `digest`.
pub fn parse_response(response: &[u8], digest: &[u8]) -> Result<Vec<u8>> {
    let response = TimeStampResp::from_der(response)
        .map_err(|e| Error::Timestamp(format!("malformed TimeStampResp: {}", e)))?;

    if !response.status.is_granted() {
        let text = response
            .status
            .status_string
            .map(|s| s.join("; "))
            .unwrap_or_default();
        return Err(Error::Timestamp(format!(
            "request rejected with status {} {}",
            response.status.status, text
        )));
    }

    let token = response
        .time_stamp_token
        .ok_or_else(|| Error::Timestamp("granted response carries no token".to_string()))?
        .to_der()?;

    let imprint = token_imprint(&token)?;
    if !imprint.matches(&MessageImprint::sha256(digest)?) {
        return Err(Error::Timestamp("token imprint does not match the signature".to_string()));
    }
    Ok(token)
}

/// Read the message imprint out of a `TimeStampToken`.
///
/// The token is a CMS `SignedData` whose encapsulated content is the
/// `TSTInfo`; only its third field (the imprint) is decoded.
pub fn token_imprint(token: &[u8]) -> Result<MessageImprint> {
    let content_info = ContentInfo::from_der(token)?;
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(Error::Timestamp(format!(
            "token content type {} is not signedData",
            content_info.content_type
        )));
    }
    let signed_data = content_info.content.decode_as::<SignedData>()?;
    let econtent = signed_data
        .encap_content_info
        .econtent
        .ok_or_else(|| Error::Timestamp("token has no TSTInfo".to_string()))?;
    let tst_info = econtent.decode_as::<OctetString>()?;

    let fields = Vec::<Any>::from_der(tst_info.as_bytes())?;
    let imprint = fields
        .get(2)
        .ok_or_else(|| Error::Timestamp("TSTInfo is truncated".to_string()))?;
    Ok(imprint.decode_as::<MessageImprint>()?)
}

/// Blocking HTTP client for an RFC 3161 authority.
#[cfg(feature = "tsa-http")]
#[derive(Debug, Clone)]
pub struct HttpTimestampClient {
    url: String,
    client: reqwest::blocking::Client,
}

#[cfg(feature = "tsa-http")]
impl HttpTimestampClient {
    /// Client posting to `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::blocking::Client::new(),
        }
    }

    /// The authority URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(feature = "tsa-http")]
impl TimestampClient for HttpTimestampClient {
    fn timestamp_token(&self, imprint: &[u8]) -> Result<Option<Vec<u8>>> {
        let nonce = uuid::Uuid::new_v4();
        let request = build_request(imprint, Some(nonce.as_bytes()))?;

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/timestamp-query")
            .body(request)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Timestamp(format!("{}: {}", self.url, e)))?;
        let body = response
            .bytes()
            .map_err(|e| Error::Timestamp(format!("{}: {}", self.url, e)))?;

        log::debug!("Timestamp authority {} answered with {} bytes", self.url, body.len());
        parse_response(&body, imprint).map(Some)
    }
}
