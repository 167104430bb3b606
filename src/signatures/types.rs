//! Digital signature types and data structures.

use crate::signatures::appearance::SignatureGraphic;
use crate::signatures::attributes::SHA256_DIGEST_INFO_PREFIX;

/// Signature sub-filter type (signature format).
///
/// Only detached PKCS#7 is written or recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureSubFilter {
    /// adbe.pkcs7.detached - PKCS#7 detached signature
    #[default]
    Pkcs7Detached,
}

impl SignatureSubFilter {
    /// Get the PDF name for this sub-filter.
    pub fn as_pdf_name(&self) -> &'static str {
        match self {
            SignatureSubFilter::Pkcs7Detached => "adbe.pkcs7.detached",
        }
    }

    /// Parse a PDF name into a sub-filter type.
    pub fn from_pdf_name(name: &str) -> Option<Self> {
        match name {
            "adbe.pkcs7.detached" => Some(SignatureSubFilter::Pkcs7Detached),
            _ => None,
        }
    }
}

/// Digests produced by phase one for a single document.
///
/// `raw_digest` is SHA-256 over the bytes covered by the ByteRange.
/// `signable_hash` is the DER `DigestInfo` of SHA-256 over the
/// authenticated attributes: the value an external signer feeds to a raw
/// RSA PKCS#1 v1.5 operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestPair {
    /// SHA-256 of the signed byte ranges
    pub raw_digest: [u8; 32],
    /// 19-byte algorithm prefix followed by SHA-256 of the attributes
    pub signable_hash: Vec<u8>,
}

impl DigestPair {
    /// Length of a SHA-256 hash to be signed (prefix + digest).
    pub const SIGNABLE_LEN: usize = 51;

    /// Build the pair from the content digest and the attributes digest.
    pub fn new(raw_digest: [u8; 32], attributes_digest: &[u8]) -> Self {
        let mut signable_hash = Vec::with_capacity(Self::SIGNABLE_LEN);
        signable_hash.extend_from_slice(&SHA256_DIGEST_INFO_PREFIX);
        signable_hash.extend_from_slice(attributes_digest);
        Self {
            raw_digest,
            signable_hash,
        }
    }

    /// The trailing SHA-256 of the authenticated attributes.
    pub fn attributes_digest(&self) -> &[u8] {
        &self.signable_hash[SHA256_DIGEST_INFO_PREFIX.len()..]
    }
}

/// Placement and descriptive metadata of the signature field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureAppearance {
    /// Fully qualified name of the signature field
    pub field_name: String,
    /// Reason for signing (omitted when empty)
    pub reason: String,
    /// Signing location (omitted when empty)
    pub location: String,
    /// Page carrying the widget (1-based)
    pub page: u32,
    /// Logo drawn beside the signer description
    pub graphic: Option<SignatureGraphic>,
}

impl Default for SignatureAppearance {
    fn default() -> Self {
        Self {
            field_name: "Signature1".to_string(),
            reason: String::new(),
            location: String::new(),
            page: 1,
            graphic: None,
        }
    }
}

/// Information about an existing signature in a PDF.
#[derive(Debug, Clone, Default)]
pub struct SignatureInfo {
    /// Name of the signer
    pub signer_name: Option<String>,
    /// Signing time
    pub signing_time: Option<String>,
    /// Reason for signing
    pub reason: Option<String>,
    /// Signing location
    pub location: Option<String>,
    /// Signature sub-filter type
    pub sub_filter: Option<SignatureSubFilter>,
    /// Whether the signature covers the whole document
    pub covers_whole_document: bool,
    /// Byte range of the signed data
    pub byte_range: Vec<i64>,
    /// Certificate subject common name
    pub certificate_cn: Option<String>,
    /// Certificate issuer
    pub certificate_issuer: Option<String>,
    /// Certificate validity start
    pub valid_from: Option<String>,
    /// Certificate validity end
    pub valid_to: Option<String>,
}

/// Result of signature verification.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    /// Overall verification status
    pub status: VerificationStatus,
    /// Signature information
    pub signature_info: SignatureInfo,
    /// Verification messages (errors, warnings)
    pub messages: Vec<String>,
    /// Whether the document was modified after signing
    pub document_modified: bool,
    /// Whether the embedded message digest matches the signed bytes
    pub digest_matches: bool,
    /// Whether the RSA signature over the authenticated attributes verifies
    pub signature_valid: bool,
    /// Whether the chain anchor is one of the trusted certificates
    pub certificate_trusted: bool,
    /// Whether the certificate chain is valid
    pub chain_valid: bool,
    /// Whether the certificate has expired
    pub certificate_expired: bool,
    /// Whether the signature timestamp is valid (if present)
    pub timestamp_valid: Option<bool>,
}

impl Default for VerificationResult {
    fn default() -> Self {
        Self {
            status: VerificationStatus::Unknown,
            signature_info: SignatureInfo::default(),
            messages: Vec::new(),
            document_modified: false,
            digest_matches: false,
            signature_valid: false,
            certificate_trusted: false,
            chain_valid: false,
            certificate_expired: false,
            timestamp_valid: None,
        }
    }
}

impl VerificationResult {
    /// Mark the result invalid and record why.
    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.status = VerificationStatus::Invalid;
        self.messages.push(message.into());
    }

    /// One-line summary of the messages, for failed batch results.
    pub fn summary(&self) -> String {
        if self.messages.is_empty() {
            format!("{:?}", self.status)
        } else {
            format!("{:?}: {}", self.status, self.messages.join("; "))
        }
    }
}

/// Verification status of a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    /// Signature is valid
    Valid,
    /// Signature is invalid (cryptographically)
    Invalid,
    /// Signature validity is unknown (e.g., untrusted certificate)
    Unknown,
    /// Signature is valid but carries warnings (e.g., expired certificate)
    ValidWithWarnings,
}

impl VerificationStatus {
    /// Check if the status indicates a valid signature.
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationStatus::Valid)
    }

    /// Check if the status indicates any form of validity (including warnings).
    pub fn is_ok(&self) -> bool {
        matches!(self, VerificationStatus::Valid | VerificationStatus::ValidWithWarnings)
    }
}
