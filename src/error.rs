//! Error types for the deferred signer.
//!
//! This module defines all error types that can occur while reading PDF
//! documents, reserving signature placeholders and assembling containers.

/// Result type alias for signer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during deferred signing.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)] // "Invalid" prefix is intentional for clarity
pub enum Error {
    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// The input document cannot be read or decoded
    #[error("Cannot read source document: {0}")]
    SourceRead(String),

    /// The signature placeholder cannot be reserved in the document
    #[error("Cannot reserve signature placeholder: {0}")]
    GapReservation(String),

    /// Digest computation or comparison failed
    #[error("Digest error: {0}")]
    Digest(String),

    /// The assembled container does not fit the reserved placeholder
    #[error(
        "Signature container needs {required} bytes but only {available} were reserved"
    )]
    ContainerOverflow {
        /// Encoded container size in bytes
        required: usize,
        /// Reserved placeholder capacity in bytes
        available: usize,
    },

    /// Revocation evidence could not be fetched or parsed
    #[error("Revocation fetch failed: {0}")]
    RevocationFetch(String),

    /// Certificate decoding or inspection failed
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// Timestamp authority request or response failed
    #[error("Timestamp authority error: {0}")]
    Timestamp(String),

    /// CMS structure could not be built or decoded
    #[error("CMS error: {0}")]
    Cms(String),

    /// A document lifecycle transition that is not allowed
    #[error("Invalid document state transition: {from} -> {to}")]
    InvalidTransition {
        /// State the document was in
        from: &'static str,
        /// State that was requested
        to: &'static str,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// DER encoding/decoding error
    #[error("DER error: {0}")]
    Der(#[from] der::Error),

    /// Base64 decoding error
    #[error("Base64 decoding error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
