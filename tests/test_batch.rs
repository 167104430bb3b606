//! Batch signing: correlation, failure isolation and cleanup.

mod common;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use common::*;
use pdf_deferred_signer::batch::{BatchSigner, CorrelationId, DocumentState};
use pdf_deferred_signer::config::SignerConfig;
use pdf_deferred_signer::session::SigningSession;
use pdf_deferred_signer::signatures::{DigestPair, SignatureVerifier};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

fn session(temp_dir: &Path) -> SigningSession {
    let config = SignerConfig::new().with_temp_dir(temp_dir);
    SigningSession::new(full_chain(), config).unwrap()
}

fn sign_all(hashes: &indexmap::IndexMap<CorrelationId, String>) -> HashMap<CorrelationId, String> {
    hashes
        .iter()
        .map(|(id, hash)| (*id, external_sign_base64(hash)))
        .collect()
}

fn remaining_files(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[test]
fn test_full_batch_signs_and_cleans_up() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let temp = dir.path().join("PdfTemporaryCreationRepository");
    let session = session(&temp);
    let mut batch = BatchSigner::new(&session).unwrap();

    let documents = (1..=3)
        .map(|id| signing_document(id, &classic_pdf(&format!("Invoice {}", id))))
        .collect();
    let hashes = batch.prepare_batch(documents);
    assert_eq!(hashes.len(), 3);
    for hash in hashes.values() {
        assert_eq!(BASE64.decode(hash).unwrap().len(), DigestPair::SIGNABLE_LEN);
    }
    assert_eq!(batch.state(CorrelationId(2)), Some(DocumentState::HashIssued));
    // Source copy, intermediary and the claimed final file per document
    assert_eq!(remaining_files(&temp), 9);

    let outcome = batch.complete_batch(sign_all(&hashes));
    assert_eq!(outcome.results.len(), 3);
    assert_eq!(outcome.signed_count(), 3);
    assert!(outcome.cleanup_failures.is_empty());
    assert_eq!(remaining_files(&temp), 0);

    let mut verifier = SignatureVerifier::new();
    verifier.add_trusted_roots(session.chain().der().to_vec());
    for result in &outcome.results {
        assert!(result.error.is_none());
        assert_eq!(result.document_number, format!("A/{}", result.correlation_id));
        let pdf = result.decode_pdf().unwrap();
        assert!(verifier.verify_field(&pdf, "Signature1").unwrap().status.is_ok());
    }
}

#[test]
fn test_corrupt_document_is_isolated() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let session = session(dir.path());
    let mut batch = BatchSigner::new(&session).unwrap();

    let mut documents = vec![
        signing_document(10, &classic_pdf("First")),
        signing_document(11, b"%PDF-1.4\ngarbage without objects"),
        signing_document(12, &xref_stream_pdf()),
        signing_document(13, &classic_pdf("Last")),
    ];
    documents.push({
        let mut doc = signing_document(14, b"");
        doc.content = "%%% not base64 %%%".to_string();
        doc
    });

    let hashes = batch.prepare_batch(documents);
    let ids: Vec<i64> = hashes.keys().map(|id| id.0).collect();
    assert_eq!(ids, vec![10, 12, 13]);

    let failures = batch.preparation_failures();
    assert_eq!(failures.len(), 2);
    assert!(failures.contains_key(&CorrelationId(11)));
    assert!(failures.contains_key(&CorrelationId(14)));

    let outcome = batch.complete_batch(sign_all(&hashes));
    let signed: Vec<i64> = outcome
        .results
        .iter()
        .filter(|r| r.is_signed)
        .map(|r| r.correlation_id.0)
        .collect();
    assert_eq!(signed, vec![10, 12, 13]);
    assert_eq!(remaining_files(dir.path()), 0);
}

#[test]
fn test_invalid_signature_fails_only_its_document() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let session = session(dir.path());
    let mut batch = BatchSigner::new(&session).unwrap();

    let documents = (1..=3)
        .map(|id| signing_document(id, &classic_pdf(&format!("Order {}", id))))
        .collect();
    let hashes = batch.prepare_batch(documents);
    let mut signatures = sign_all(&hashes);
    signatures.insert(CorrelationId(2), "this is !! not base64".to_string());

    let outcome = batch.complete_batch(signatures);
    assert_eq!(outcome.results.len(), 3);

    let failed = outcome.result(CorrelationId(2)).unwrap();
    assert!(!failed.is_signed);
    assert!(failed.pdf_content.is_empty());
    assert!(!failed.error.as_deref().unwrap_or_default().is_empty());

    assert!(outcome.result(CorrelationId(1)).unwrap().is_signed);
    assert!(outcome.result(CorrelationId(3)).unwrap().is_signed);
    assert_eq!(remaining_files(dir.path()), 0);
}

#[test]
fn test_signatures_are_matched_by_identifier() {
    let dir = tempfile::tempdir().unwrap();
    let session = session(dir.path());
    let mut batch = BatchSigner::new(&session).unwrap();

    let documents = vec![
        signing_document(7, &classic_pdf("Seven")),
        signing_document(8, &classic_pdf("Eight")),
    ];
    let hashes = batch.prepare_batch(documents);

    // Swap the signatures: each document receives the other's
    let mut signatures = HashMap::new();
    signatures.insert(CorrelationId(7), external_sign_base64(&hashes[&CorrelationId(8)]));
    signatures.insert(CorrelationId(8), external_sign_base64(&hashes[&CorrelationId(7)]));

    let outcome = batch.complete_batch(signatures);
    assert_eq!(outcome.signed_count(), 0);
    for result in &outcome.results {
        let error = result.error.as_deref().unwrap();
        assert!(error.contains("verification failed"), "{}", error);
    }
}

#[test]
fn test_missing_and_unknown_signatures() {
    let dir = tempfile::tempdir().unwrap();
    let session = session(dir.path());
    let mut batch = BatchSigner::new(&session).unwrap();

    let hashes = batch.prepare_batch(vec![
        signing_document(1, &classic_pdf("One")),
        signing_document(2, &classic_pdf("Two")),
    ]);

    let mut signatures = HashMap::new();
    signatures.insert(CorrelationId(1), external_sign_base64(&hashes[&CorrelationId(1)]));
    signatures.insert(CorrelationId(99), "AAAA".to_string());

    let outcome = batch.complete_batch(signatures);
    assert_eq!(outcome.results.len(), 2);
    assert!(outcome.result(CorrelationId(1)).unwrap().is_signed);

    let missing = outcome.result(CorrelationId(2)).unwrap();
    assert!(!missing.is_signed);
    assert_eq!(missing.error.as_deref(), Some("no signature supplied"));
    assert!(outcome.result(CorrelationId(99)).is_none());
    assert_eq!(remaining_files(dir.path()), 0);
}

#[test]
fn test_results_serialize_with_wire_names() {
    let dir = tempfile::tempdir().unwrap();
    let session = session(dir.path());
    let mut batch = BatchSigner::new(&session).unwrap();

    let hashes = batch.prepare_batch(vec![signing_document(5, &classic_pdf("Five"))]);
    let outcome = batch.complete_batch(sign_all(&hashes));

    let json = serde_json::to_value(&outcome.results).unwrap();
    assert_eq!(json[0]["CorrelationID"], 5);
    assert_eq!(json[0]["IsSigned"], true);
    assert_eq!(json[0]["DocumentNumber"], "A/5");
    assert!(json[0]["PdfContent"].as_str().unwrap().len() > 100);
}

#[test]
fn test_duplicate_identifiers_are_never_both_issued_and_failed() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let session = session(dir.path());
    let mut batch = BatchSigner::new(&session).unwrap();

    let hashes = batch.prepare_batch(vec![
        signing_document(5, &classic_pdf("First copy")),
        signing_document(6, &classic_pdf("Unique")),
        signing_document(5, &classic_pdf("Second copy")),
        signing_document(5, &classic_pdf("Third copy")),
    ]);

    let failures = batch.preparation_failures();
    assert!(hashes.keys().all(|id| !failures.contains_key(id)));
    assert_eq!(hashes.keys().map(|id| id.0).collect::<Vec<_>>(), vec![6]);
    assert_eq!(failures[&CorrelationId(5)], "duplicate correlation identifier");
    assert_eq!(batch.state(CorrelationId(5)), None);

    let outcome = batch.complete_batch(sign_all(&hashes));
    assert_eq!(outcome.results.len(), 1);
    assert!(outcome.result(CorrelationId(6)).unwrap().is_signed);
    assert!(outcome.result(CorrelationId(5)).is_none());
    assert_eq!(remaining_files(dir.path()), 0);
}

#[test]
fn test_separators_in_any_name_part_stay_in_workspace() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let session = session(dir.path());
    let mut batch = BatchSigner::new(&session).unwrap();

    let mut document = signing_document(21, &classic_pdf("Regional"));
    document.application_code = "APP/EU".to_string();
    document.document_type = "..\\INV".to_string();
    let hashes = batch.prepare_batch(vec![document]);
    assert_eq!(hashes.len(), 1);

    for entry in fs::read_dir(dir.path()).unwrap() {
        assert!(entry.unwrap().file_type().unwrap().is_file());
    }

    let outcome = batch.complete_batch(sign_all(&hashes));
    let result = outcome.result(CorrelationId(21)).unwrap();
    assert!(result.is_signed, "{:?}", result.error);
    assert_eq!(result.application_code, "APP/EU");
    assert_eq!(remaining_files(dir.path()), 0);
}
