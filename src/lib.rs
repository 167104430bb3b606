// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::should_implement_trait)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # PDF Deferred Signer
//!
//! Two-phase PDF signing for keys that live somewhere else: an HSM, a
//! smart card, a remote signing service.
//!
//! ## Core Features
//!
//! ### Phase one
//! - **Gap reservation**: appends an incremental revision with a signature
//!   field whose `/Contents` is a zero-filled placeholder (ISO 32000-1 §12.8)
//! - **Size estimation**: the placeholder is sized from the certificate
//!   chain, revocation evidence and timestamp allowance of the session
//! - **Hash to sign**: SHA-256 `DigestInfo` (51 bytes) over the CMS
//!   authenticated attributes, ready for a raw RSA PKCS#1 v1.5 operation
//!
//! ### Phase two
//! - **CMS assembly**: `SignedData` with the chain, the external signature,
//!   Adobe revocation archival (CRL/OCSP) and an RFC 3161 timestamp token
//! - **Injection**: the container is written into the gap in place, so the
//!   byte range computed in phase one stays valid
//! - **Self-verification**: the final file is re-read and its byte range,
//!   message digest, RSA signature and chain links are checked
//!
//! ### Batches
//! - **Correlation**: every document is keyed by a caller-assigned
//!   identifier, never by its position in a list
//! - **Isolation**: a failing document becomes a failed result and the
//!   rest of the batch carries on
//! - **Cleanup**: temporary files are always removed, and files that
//!   could not be removed are reported
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdf_deferred_signer::batch::BatchSigner;
//! use pdf_deferred_signer::config::SignerConfig;
//! use pdf_deferred_signer::session::SigningSession;
//! use pdf_deferred_signer::signatures::CertificateChain;
//! use std::collections::HashMap;
//!
//! # fn documents() -> Vec<pdf_deferred_signer::batch::SigningDocument> { Vec::new() }
//! # fn sign_remotely(_hash: &str) -> String { String::new() }
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SignerConfig::load("Config.json")?;
//! let chain = CertificateChain::from_pem(&std::fs::read("chain.pem")?)?;
//! let session = SigningSession::new(chain, config)?;
//!
//! let mut batch = BatchSigner::new(&session)?;
//! let hashes = batch.prepare_batch(documents());
//!
//! let signatures: HashMap<_, _> = hashes
//!     .iter()
//!     .map(|(id, hash)| (*id, sign_remotely(hash)))
//!     .collect();
//!
//! let outcome = batch.complete_batch(signatures);
//! for result in &outcome.results {
//!     println!("{}: signed={} {:?}", result.correlation_id, result.is_signed, result.error);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! Licensed under either of:
//!
//! * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//! * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.

#![cfg_attr(docsrs, feature(doc_cfg))]

// Error handling
pub mod error;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod xref;

// Stream decoders
pub mod decoders;

// Incremental updates
pub mod writer;

// Deferred signing
pub mod signatures;

// Configuration and session context
pub mod config;
pub mod session;

// Batch orchestration
pub mod batch;

// Re-exports
pub use batch::{BatchOutcome, BatchSigner, CorrelationId, SigningDocument, SigningResult};
pub use config::SignerConfig;
pub use document::PdfDocument;
pub use error::{Error, Result};
pub use session::SigningSession;

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
