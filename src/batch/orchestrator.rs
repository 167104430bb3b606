//! Two-pass batch signing.
//!
//! [`BatchSigner::prepare_batch`] runs phase one for every document and
//! hands back the hashes to sign, keyed by correlation identifier.
//! [`BatchSigner::complete_batch`] takes the signatures back under the
//! same keys, runs phase two, re-opens every final document to verify it,
//! and removes the batch's temporary files. A failing document never
//! stops the others.

use super::documents::{CorrelationId, SigningDocument, SigningResult};
use super::state::{DocumentState, WorkItem};
use super::workspace::{CleanupFailure, CleanupGuard, Workspace};
use crate::error::{Error, Result};
use crate::session::SigningSession;
use crate::signatures::{inject, prepare, SignatureVerifier, VerificationResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, SubsecRound, Utc};
use indexmap::IndexMap;
use log::{error, info, warn};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

const DUPLICATE_ID: &str = "duplicate correlation identifier";

/// Results of [`BatchSigner::complete_batch`].
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// One result per prepared document, in preparation order
    pub results: Vec<SigningResult>,
    /// Temporary files that could not be removed
    pub cleanup_failures: Vec<CleanupFailure>,
}

impl BatchOutcome {
    /// Number of documents signed and verified.
    pub fn signed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_signed).count()
    }

    pub fn result(&self, id: CorrelationId) -> Option<&SigningResult> {
        self.results.iter().find(|r| r.correlation_id == id)
    }
}

/// Drives a batch of documents through both signing phases.
pub struct BatchSigner<'s> {
    session: &'s SigningSession,
    workspace: Workspace,
    items: IndexMap<CorrelationId, WorkItem>,
    preparation_failures: IndexMap<CorrelationId, String>,
}

impl<'s> BatchSigner<'s> {
    /// Batch signer using the session's configured temporary directory.
    pub fn new(session: &'s SigningSession) -> Result<Self> {
        let dir = session.config().temp_dir.clone();
        Self::with_temp_dir(session, dir)
    }

    /// Batch signer keeping its temporary files under `dir`.
    pub fn with_temp_dir(session: &'s SigningSession, dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            session,
            workspace: Workspace::open(dir)?,
            items: IndexMap::new(),
            preparation_failures: IndexMap::new(),
        })
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Run phase one and return the base64 hash to sign per document.
    ///
    /// Documents that fail are left out of the map and recorded in
    /// [`BatchSigner::preparation_failures`]. An identifier is never both
    /// issued and failed: when it repeats, every copy fails.
    pub fn prepare_batch(&mut self, documents: Vec<SigningDocument>) -> IndexMap<CorrelationId, String> {
        info!("Preparing {} document(s) for signing", documents.len());
        let mut hashes = IndexMap::with_capacity(documents.len());

        for document in documents {
            let id = document.correlation_id;
            if self.items.contains_key(&id) || self.preparation_failures.contains_key(&id) {
                self.reject_duplicate(id, &mut hashes);
                continue;
            }

            match self.prepare_one(document) {
                Ok(mut item) => match item.advance(DocumentState::HashIssued) {
                    Ok(()) => {
                        hashes.insert(id, BASE64.encode(&item.digests.signable_hash));
                        self.items.insert(id, item);
                    },
                    Err(e) => self.record_preparation_failure(id, e),
                },
                Err(e) => self.record_preparation_failure(id, e),
            }
        }

        info!(
            "Issued {} hash(es), {} document(s) failed preparation",
            hashes.len(),
            self.preparation_failures.len()
        );
        hashes
    }

    fn prepare_one(&mut self, document: SigningDocument) -> Result<WorkItem> {
        let content = document.decode_content()?;
        let paths = self.workspace.allocate(&document);
        // Claim the final name now so an unusable path fails before a hash
        // is handed out.
        fs::File::create(&paths.signed)?;
        fs::write(&paths.to_be_signed, &content)?;

        let source = fs::read(&paths.to_be_signed).map_err(|e| Error::SourceRead(e.to_string()))?;
        let signing_time = signing_instant();
        let prepared = prepare(self.session, &source, signing_time)?;
        fs::write(&paths.intermediary, &prepared.data)?;

        Ok(WorkItem::new(document, paths, prepared.digests, prepared.signing_time))
    }

    /// Drop every copy of `id`: which document a signature belongs to
    /// would be ambiguous. The prepared copy's files stay tracked by the
    /// workspace and are removed with the rest of the batch.
    fn reject_duplicate(&mut self, id: CorrelationId, hashes: &mut IndexMap<CorrelationId, String>) {
        warn!("Document {}: duplicate correlation identifier, rejecting every copy", id);
        if let Some(mut item) = self.items.shift_remove(&id) {
            item.fail(DUPLICATE_ID);
        }
        hashes.shift_remove(&id);
        self.preparation_failures.insert(id, DUPLICATE_ID.to_string());
    }

    fn record_preparation_failure(&mut self, id: CorrelationId, e: Error) {
        warn!("Document {}: preparation failed: {}", id, e);
        self.preparation_failures.insert(id, e.to_string());
    }

    /// Phase-one failures by correlation identifier.
    pub fn preparation_failures(&self) -> &IndexMap<CorrelationId, String> {
        &self.preparation_failures
    }

    /// Current state of a prepared document.
    pub fn state(&self, id: CorrelationId) -> Option<DocumentState> {
        self.items.get(&id).map(WorkItem::state)
    }

    /// Run phase two with base64 signatures keyed by correlation identifier.
    ///
    /// Every prepared document yields exactly one result. All temporary
    /// files of the batch are removed afterwards, also when a document
    /// panics half-way.
    pub fn complete_batch(&mut self, signatures: HashMap<CorrelationId, String>) -> BatchOutcome {
        for id in signatures.keys().filter(|id| !self.items.contains_key(*id)) {
            warn!("Ignoring signature for unknown document {}", id);
        }

        let items = std::mem::take(&mut self.items);
        let guard = CleanupGuard::new(&mut self.workspace);
        let mut results = Vec::with_capacity(items.len());

        for (id, mut item) in items {
            let result = match signatures.get(&id) {
                None => {
                    warn!("Document {}: no signature supplied", id);
                    item.fail("no signature supplied");
                    SigningResult::failed(&item.document, "", "no signature supplied")
                },
                Some(signature) => match complete_one(self.session, &mut item, signature) {
                    Ok(signed) => {
                        info!("Document {} signed and verified", id);
                        SigningResult::signed(&item.document, signature, &signed)
                    },
                    Err(failure) => {
                        let message = failure.to_string();
                        item.fail(message.clone());
                        SigningResult::failed(&item.document, signature, message)
                    },
                },
            };
            results.push(result);
        }

        let cleanup_failures = guard.finish();
        let outcome = BatchOutcome {
            results,
            cleanup_failures,
        };
        info!(
            "Batch complete: {}/{} signed, {} cleanup failure(s)",
            outcome.signed_count(),
            outcome.results.len(),
            outcome.cleanup_failures.len()
        );
        outcome
    }
}

/// Why phase two did not produce a verified document.
enum Failure {
    Error(Error),
    Verification(VerificationResult),
}

impl From<Error> for Failure {
    fn from(e: Error) -> Self {
        Failure::Error(e)
    }
}

impl From<std::io::Error> for Failure {
    fn from(e: std::io::Error) -> Self {
        Failure::Error(Error::Io(e))
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::Error(e) => write!(f, "{}", e),
            Failure::Verification(result) => write!(f, "verification failed: {}", result.summary()),
        }
    }
}

fn complete_one(
    session: &SigningSession,
    item: &mut WorkItem,
    signature: &str,
) -> std::result::Result<Vec<u8>, Failure> {
    let id = item.document.correlation_id;
    let raw = BASE64.decode(signature.trim()).map_err(Error::from)?;
    item.advance(DocumentState::SignatureReceived)?;

    let intermediary = fs::read(&item.paths.intermediary)?;
    let signed = match inject(session, intermediary, &raw, &item.digests, item.signing_time) {
        Ok(signed) => signed,
        Err(e @ Error::ContainerOverflow { .. }) => {
            error!("Document {}: {}; the size estimate is too small for this session", id, e);
            return Err(e.into());
        },
        Err(e) => {
            warn!("Document {}: injection failed: {}", id, e);
            return Err(e.into());
        },
    };
    fs::write(&item.paths.signed, &signed)?;
    item.advance(DocumentState::Injected)?;

    let written = fs::read(&item.paths.signed)?;
    let verification = self_verify(session, &written)?;
    if !verification.status.is_ok() {
        warn!("Document {}: self-verification failed: {}", id, verification.summary());
        return Err(Failure::Verification(verification));
    }
    item.advance(DocumentState::Verified)?;
    Ok(written)
}

/// Verify against the session's own chain as trust anchors.
fn self_verify(session: &SigningSession, pdf: &[u8]) -> Result<VerificationResult> {
    let mut verifier = SignatureVerifier::new();
    verifier.add_trusted_roots(session.chain().der().to_vec());
    verifier.verify_field(pdf, &session.config().field_name)
}

/// Signing instants carry whole seconds, as UTCTime and `/M` do.
fn signing_instant() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignerConfig;
    use crate::signatures::CertificateChain;
    use chrono::NaiveDate;

    fn session() -> SigningSession {
        let chain = CertificateChain::from_pem(include_str!("../../tests/fixtures/leaf.pem").as_bytes()).unwrap();
        SigningSession::new(chain, SignerConfig::default()).unwrap()
    }

    fn document(id: i64, content: &str) -> SigningDocument {
        SigningDocument {
            correlation_id: id.into(),
            application_code: "APP".to_string(),
            company_code: "01".to_string(),
            document_type: "INV".to_string(),
            document_number: id.to_string(),
            emission_date: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            document_year: 2024,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_undecodable_documents_are_recorded() {
        let session = session();
        let dir = tempfile::tempdir().unwrap();
        let mut signer = BatchSigner::with_temp_dir(&session, dir.path()).unwrap();

        let hashes = signer.prepare_batch(vec![document(1, "not base64!"), document(2, "JVBERi0xLjQ=")]);
        assert!(hashes.is_empty());
        assert_eq!(signer.preparation_failures().len(), 2);
        assert!(signer.preparation_failures()[&CorrelationId(1)].contains("base64"));
        assert!(signer.state(CorrelationId(2)).is_none());

        let outcome = signer.complete_batch(HashMap::new());
        assert!(outcome.results.is_empty());
        assert!(outcome.cleanup_failures.is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let session = session();
        let dir = tempfile::tempdir().unwrap();
        let mut signer = BatchSigner::with_temp_dir(&session, dir.path()).unwrap();

        signer.prepare_batch(vec![document(5, "***"), document(5, "***")]);
        assert_eq!(signer.preparation_failures()[&CorrelationId(5)], DUPLICATE_ID);
    }

    #[test]
    fn test_signing_instant_has_whole_seconds() {
        assert_eq!(signing_instant().timestamp_subsec_nanos(), 0);
    }
}
