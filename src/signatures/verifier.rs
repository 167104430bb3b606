//! PDF signature verification.
//!
//! This module re-reads a signed document and checks its signature the way
//! a relying party would: ByteRange coverage, the message digest, the RSA
//! signature over the authenticated attributes, the certificate chain and
//! any embedded timestamp.

use super::attributes::{message_digest, sha256, ID_AA_TIMESTAMP_TOKEN, ID_SHA256_WITH_RSA};
use super::byterange::ByteRangeCalculator;
use super::chain::{rsa_public_key, SignerIdentity};
use super::container::decode_container;
use super::signer::locate_signature;
use super::timestamp::{token_imprint, MessageImprint};
use super::types::{SignatureInfo, SignatureSubFilter, VerificationResult, VerificationStatus};
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::Object;
use cms::cert::CertificateChoices;
use cms::signed_data::{SignedData, SignerIdentifier, SignerInfo};
use der::Encode;
use log::debug;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::Pkcs1v15Sign;
use sha2::Sha256;
use signature::Verifier;
use x509_cert::Certificate;

/// Verifier for PDF digital signatures.
pub struct SignatureVerifier {
    /// Trusted root certificates (DER-encoded)
    trusted_roots: Vec<Vec<u8>>,
}

impl SignatureVerifier {
    /// Create a new signature verifier.
    pub fn new() -> Self {
        Self {
            trusted_roots: Vec::new(),
        }
    }

    /// Add a trusted root certificate.
    pub fn add_trusted_root(&mut self, cert_der: Vec<u8>) {
        self.trusted_roots.push(cert_der);
    }

    /// Add multiple trusted root certificates.
    pub fn add_trusted_roots(&mut self, certs: Vec<Vec<u8>>) {
        self.trusted_roots.extend(certs);
    }

    /// Extract signature information from a signature dictionary.
    pub fn extract_signature_info(&self, sig_dict: &Object) -> Result<SignatureInfo> {
        let dict = sig_dict
            .as_dict()
            .ok_or_else(|| Error::InvalidPdf("Signature must be a dictionary".to_string()))?;

        let text = |key: &str| {
            dict.get(key)
                .and_then(Object::as_string)
                .map(|s| String::from_utf8_lossy(s).to_string())
        };

        Ok(SignatureInfo {
            signer_name: text("Name"),
            signing_time: text("M"),
            reason: text("Reason"),
            location: text("Location"),
            sub_filter: dict
                .get("SubFilter")
                .and_then(Object::as_name)
                .and_then(SignatureSubFilter::from_pdf_name),
            byte_range: dict
                .get("ByteRange")
                .and_then(Object::as_array)
                .map(|items| items.iter().filter_map(Object::as_integer).collect())
                .unwrap_or_default(),
            ..SignatureInfo::default()
        })
    }

    /// Verify the signature held by `field_name` in a complete document.
    pub fn verify_field(&self, pdf_data: &[u8], field_name: &str) -> Result<VerificationResult> {
        let doc = PdfDocument::from_bytes(pdf_data.to_vec())?;
        let location = locate_signature(&doc, field_name)?;
        let contents = location
            .sig_dict
            .get("Contents")
            .and_then(Object::as_string)
            .ok_or_else(|| Error::InvalidPdf("signature /Contents is not a string".to_string()))?
            .to_vec();
        self.verify(pdf_data, &Object::Dictionary(location.sig_dict), &contents)
    }

    /// Verify a signature.
    ///
    /// A cryptographic failure is reported through the result's status and
    /// messages; `Err` is reserved for a signature dictionary that cannot be
    /// read at all.
    pub fn verify(&self, pdf_data: &[u8], sig_dict: &Object, contents: &[u8]) -> Result<VerificationResult> {
        let mut result = VerificationResult {
            status: VerificationStatus::Valid,
            signature_info: self.extract_signature_info(sig_dict)?,
            ..VerificationResult::default()
        };

        let byte_range: [i64; 4] = match result.signature_info.byte_range.as_slice() {
            [a, b, c, d] => [*a, *b, *c, *d],
            _ => {
                result.fail("Invalid ByteRange: expected 4 elements");
                return Ok(result);
            },
        };

        if let Err(e) = ByteRangeCalculator::validate_byte_range(&byte_range, pdf_data.len()) {
            result.document_modified = true;
            result.fail(format!("ByteRange validation failed: {}", e));
            return Ok(result);
        }
        result.signature_info.covers_whole_document = true;

        let signed_bytes = match ByteRangeCalculator::extract_signed_bytes(pdf_data, &byte_range) {
            Ok(bytes) => bytes,
            Err(e) => {
                result.fail(e.to_string());
                return Ok(result);
            },
        };
        let computed_digest = sha256(&signed_bytes);

        if let Err(e) = self.verify_pkcs7(contents, &computed_digest, &mut result) {
            result.fail(format!("Signature verification failed: {}", e));
        }

        if result.status != VerificationStatus::Invalid {
            if result.certificate_expired {
                result.status = VerificationStatus::ValidWithWarnings;
                result.messages.push("Certificate has expired".to_string());
            }
            if result.timestamp_valid == Some(false) {
                result.status = VerificationStatus::ValidWithWarnings;
                result
                    .messages
                    .push("Timestamp does not cover the signature".to_string());
            }
            if !self.trusted_roots.is_empty() && !result.certificate_trusted {
                result.status = VerificationStatus::Unknown;
                result
                    .messages
                    .push("Certificate is not trusted".to_string());
            }
        }

        debug!("Signature verification finished: {}", result.summary());
        Ok(result)
    }

    /// Verify a PKCS#7 signature structure, recording each check in `result`.
    fn verify_pkcs7(&self, contents: &[u8], expected_digest: &[u8], result: &mut VerificationResult) -> Result<()> {
        let signed_data = decode_container(contents)?;
        let certificates = embedded_certificates(&signed_data);
        let signer = signed_data
            .signer_infos
            .0
            .iter()
            .next()
            .ok_or_else(|| Error::Cms("no signer info".to_string()))?;
        let signer_cert = find_signer_certificate(signer, &certificates)
            .ok_or_else(|| Error::Cms("signer certificate is not embedded".to_string()))?;

        let identity = SignerIdentity::from_der(&signer_cert.to_der()?)?;
        result.signature_info.certificate_cn = identity.common_name.clone();
        result.signature_info.certificate_issuer = Some(identity.issuer.clone());
        result.signature_info.valid_from = Some(identity.not_before.clone());
        result.signature_info.valid_to = Some(identity.not_after.clone());
        result.certificate_expired = identity.expired;

        let attrs = signer
            .signed_attrs
            .as_ref()
            .ok_or_else(|| Error::Cms("signer has no authenticated attributes".to_string()))?;
        result.digest_matches = message_digest(attrs).as_deref() == Some(expected_digest);
        if !result.digest_matches {
            result.document_modified = true;
            result.fail("Message digest does not match the signed bytes");
        }

        let attrs_digest = sha256(&attrs.to_der()?);
        let public_key = rsa_public_key(signer_cert)?;
        result.signature_valid = public_key
            .verify(Pkcs1v15Sign::new::<Sha256>(), &attrs_digest, signer.signature.as_bytes())
            .is_ok();
        if !result.signature_valid {
            result.fail("RSA signature over the authenticated attributes does not verify");
        }

        let anchor = self.verify_chain(signer_cert, &certificates, result);
        result.certificate_trusted = self.is_certificate_trusted(&anchor.to_der()?);

        result.timestamp_valid = timestamp_token(signer).map(|token| {
            let expected = MessageImprint::sha256(&sha256(signer.signature.as_bytes()));
            match (token_imprint(&token), expected) {
                (Ok(imprint), Ok(expected)) => imprint.matches(&expected),
                _ => false,
            }
        });

        Ok(())
    }

    /// Walk from `leaf` to the last certificate whose issuer is embedded,
    /// checking each link. Returns the chain anchor.
    fn verify_chain<'c>(
        &self,
        leaf: &'c Certificate,
        certificates: &[&'c Certificate],
        result: &mut VerificationResult,
    ) -> &'c Certificate {
        let mut current = leaf;
        let mut valid = true;
        for _ in 0..certificates.len() {
            let tbs = &current.tbs_certificate;
            if tbs.issuer == tbs.subject {
                break;
            }
            let Some(issuer) = certificates
                .iter()
                .copied()
                .find(|c| c.tbs_certificate.subject == tbs.issuer)
            else {
                break;
            };
            if let Err(e) = verify_link(current, issuer) {
                valid = false;
                result.fail(format!("Certificate chain link is broken: {}", e));
                break;
            }
            current = issuer;
        }
        result.chain_valid = valid;
        current
    }

    /// Check if a certificate is in the trusted roots.
    fn is_certificate_trusted(&self, cert_der: &[u8]) -> bool {
        self.trusted_roots.iter().any(|root| root == cert_der)
    }
}

impl Default for SignatureVerifier {
    fn default() -> Self {
        Self::new()
    }
}

fn embedded_certificates(signed_data: &SignedData) -> Vec<&Certificate> {
    signed_data
        .certificates
        .iter()
        .flat_map(|set| set.0.iter())
        .filter_map(|choice| match choice {
            CertificateChoices::Certificate(cert) => Some(cert),
            _ => None,
        })
        .collect()
}

fn find_signer_certificate<'c>(signer: &SignerInfo, certificates: &[&'c Certificate]) -> Option<&'c Certificate> {
    match &signer.sid {
        SignerIdentifier::IssuerAndSerialNumber(sid) => certificates.iter().copied().find(|c| {
            c.tbs_certificate.issuer == sid.issuer && c.tbs_certificate.serial_number == sid.serial_number
        }),
        SignerIdentifier::SubjectKeyIdentifier(_) => None,
    }
}

/// Check that `issuer` signed `cert` with sha256WithRSAEncryption.
fn verify_link(cert: &Certificate, issuer: &Certificate) -> Result<()> {
    if cert.signature_algorithm.oid != ID_SHA256_WITH_RSA {
        return Err(Error::Certificate(format!(
            "unsupported certificate signature algorithm {}",
            cert.signature_algorithm.oid
        )));
    }
    let key = VerifyingKey::<Sha256>::new(rsa_public_key(issuer)?);
    let signature = Signature::try_from(cert.signature.raw_bytes())
        .map_err(|e| Error::Certificate(format!("malformed certificate signature: {}", e)))?;
    key.verify(&cert.tbs_certificate.to_der()?, &signature)
        .map_err(|e| Error::Certificate(format!("issuer signature does not verify: {}", e)))
}

fn timestamp_token(signer: &SignerInfo) -> Option<Vec<u8>> {
    signer
        .unsigned_attrs
        .as_ref()?
        .iter()
        .find(|attr| attr.oid == ID_AA_TIMESTAMP_TOKEN)?
        .values
        .iter()
        .next()?
        .to_der()
        .ok()
}
