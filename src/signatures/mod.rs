//! PDF Digital Signatures module.
//!
//! Deferred (two-phase) signing with an external RSA key holder:
//!
//! 1. [`prepare`] appends a signature field whose `/Contents` is a
//!    zero-filled gap, hashes the bytes around the gap and returns the
//!    51-byte SHA-256 `DigestInfo` of the authenticated attributes.
//! 2. The caller has that value signed elsewhere (HSM, smart card).
//! 3. [`inject`] wraps the raw signature in a CMS `SignedData` container
//!    (certificate chain, revocation evidence, optional timestamp) and
//!    writes it into the gap without moving a single byte.
//!
//! [`SignatureVerifier`] re-reads the result and checks it independently.
//!
//! ## Example
//!
//! ```no_run
//! use chrono::Utc;
//! use pdf_deferred_signer::config::SignerConfig;
//! use pdf_deferred_signer::session::SigningSession;
//! use pdf_deferred_signer::signatures::{inject, prepare, CertificateChain, SignatureVerifier};
//!
//! # fn external_sign(_hash: &[u8]) -> Vec<u8> { unimplemented!() }
//! let chain = CertificateChain::from_pem(&std::fs::read("chain.pem")?)?;
//! let session = SigningSession::new(chain, SignerConfig::default())?;
//!
//! let prepared = prepare(&session, &std::fs::read("contract.pdf")?, Utc::now())?;
//! let signature = external_sign(&prepared.digests.signable_hash);
//! let signed = inject(&session, prepared.data, &signature, &prepared.digests, prepared.signing_time)?;
//!
//! let result = SignatureVerifier::new().verify_field(&signed, "Signature1")?;
//! assert!(result.status.is_ok());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## PDF Specification Reference
//!
//! - ISO 32000-1:2008 Section 12.8 - Digital Signatures
//! - RFC 5652 - Cryptographic Message Syntax
//! - RFC 3161 - Time-Stamp Protocol

pub mod appearance;
pub mod attributes;
mod byterange;
pub mod chain;
pub mod container;
pub mod estimate;
mod inject;
mod prepare;
pub mod revocation;
mod signer;
pub mod timestamp;
mod types;
mod verifier;

pub use appearance::SignatureGraphic;
pub use byterange::ByteRangeCalculator;
pub use chain::{CertificateChain, SignerIdentity};
pub use inject::inject;
pub use prepare::{prepare, PreparedDocument};
pub use revocation::{CrlClient, OcspClient, RevocationEvidence};
pub use signer::{locate_signature, PdfSigner, ReservedGap, SignatureLocation};
#[cfg(feature = "tsa-http")]
pub use timestamp::HttpTimestampClient;
pub use timestamp::TimestampClient;
pub use types::{
    DigestPair, SignatureAppearance, SignatureInfo, SignatureSubFilter, VerificationResult, VerificationStatus,
};
pub use verifier::SignatureVerifier;
