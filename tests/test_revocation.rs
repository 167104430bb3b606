//! Revocation evidence in the signing session and the signed result.

mod common;

use chrono::{DateTime, TimeZone, Utc};
use common::*;
use pdf_deferred_signer::config::SignerConfig;
use pdf_deferred_signer::document::PdfDocument;
use pdf_deferred_signer::error::{Error, Result};
use pdf_deferred_signer::object::Object;
use pdf_deferred_signer::session::SigningSession;
use pdf_deferred_signer::signatures::attributes::ID_ADBE_REVOCATION;
use pdf_deferred_signer::signatures::container::decode_container;
use pdf_deferred_signer::signatures::{inject, locate_signature, prepare, SignatureVerifier};
use x509_cert::Certificate;

fn signing_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap()
}

fn crl_source(_: &Certificate) -> Result<Option<Vec<u8>>> {
    Ok(Some(INTERMEDIATE_CRL.to_vec()))
}

fn ocsp_source(_: &Certificate, _: &Certificate) -> Result<Option<Vec<u8>>> {
    // Any well-formed DER value is carried as-is
    Ok(Some(vec![0x04, 0x03, 0x01, 0x02, 0x03]))
}

fn failing_crl(_: &Certificate) -> Result<Option<Vec<u8>>> {
    Err(Error::RevocationFetch("distribution point unreachable".to_string()))
}

fn garbage_ocsp(_: &Certificate, _: &Certificate) -> Result<Option<Vec<u8>>> {
    Ok(Some(b"<html>503</html>".to_vec()))
}

fn sign(session: &SigningSession, source: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let prepared = prepare(session, source, signing_time()).unwrap();
    let hash = prepared.digests.signable_hash.clone();
    let signature = external_sign(&hash);
    let signed = inject(session, prepared.data, &signature, &prepared.digests, signing_time()).unwrap();
    (hash, signed)
}

fn signed_attribute_oids(signed: &[u8]) -> Vec<String> {
    let doc = PdfDocument::from_bytes(signed.to_vec()).unwrap();
    let location = locate_signature(&doc, "Signature1").unwrap();
    let contents = location.sig_dict.get("Contents").and_then(Object::as_string).unwrap();
    let signed_data = decode_container(contents).unwrap();
    let signer = signed_data.signer_infos.0.iter().next().unwrap();
    signer
        .signed_attrs
        .as_ref()
        .unwrap()
        .iter()
        .map(|attr| attr.oid.to_string())
        .collect()
}

#[test]
fn test_disabled_revocation_ignores_configured_sources() {
    init_logging();
    let source = classic_pdf("Idempotent");

    let plain = SigningSession::new(full_chain(), SignerConfig::default()).unwrap();
    let with_sources = SigningSession::builder(full_chain())
        .config(SignerConfig::default())
        .crl_client(crl_source)
        .ocsp_client(ocsp_source)
        .build()
        .unwrap();
    assert_eq!(plain.reserved_size(), with_sources.reserved_size());

    let (hash_a, signed_a) = sign(&plain, &source);
    let (hash_b, signed_b) = sign(&with_sources, &source);
    assert_eq!(hash_a, hash_b);
    assert_eq!(signed_a, signed_b);
    assert!(!signed_attribute_oids(&signed_a).contains(&ID_ADBE_REVOCATION.to_string()));
}

#[test]
fn test_gathered_evidence_is_archived_and_verifies() {
    init_logging();
    let session = SigningSession::builder(full_chain())
        .config(SignerConfig::new().with_ignore_revocation(false))
        .crl_client(crl_source)
        .ocsp_client(ocsp_source)
        .build()
        .unwrap();

    let evidence = session.evidence().unwrap();
    assert_eq!(evidence.crl_sizes().len(), 3);
    assert_eq!(evidence.ocsp_sizes(), vec![5, 5]);

    let (_, signed) = sign(&session, &classic_pdf("With evidence"));
    let oids = signed_attribute_oids(&signed);
    assert_eq!(oids.len(), 4);
    assert!(oids.contains(&ID_ADBE_REVOCATION.to_string()));

    let mut verifier = SignatureVerifier::new();
    verifier.add_trusted_roots(session.chain().der().to_vec());
    let result = verifier.verify_field(&signed, "Signature1").unwrap();
    assert!(result.status.is_ok(), "{}", result.summary());
}

#[test]
fn test_failing_sources_do_not_interrupt_signing() {
    init_logging();
    let session = SigningSession::builder(full_chain())
        .config(SignerConfig::new().with_ignore_revocation(false))
        .crl_client(failing_crl)
        .ocsp_client(garbage_ocsp)
        .build()
        .unwrap();

    let evidence = session.evidence().unwrap();
    assert!(evidence.is_empty());

    let (_, signed) = sign(&session, &classic_pdf("Offline"));
    assert_eq!(signed_attribute_oids(&signed).len(), 3);
}
