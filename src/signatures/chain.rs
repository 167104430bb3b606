//! Signer certificate chain.

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use der::{Decode, Encode};
use log::warn;
use pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use x509_cert::Certificate;
use x509_parser::prelude::{FromDer, X509Certificate};

/// OID of the X.520 `serialNumber` name attribute.
const SUBJECT_SERIAL_NUMBER: &str = "2.5.4.5";

/// Descriptive fields of a certificate, for signature metadata and the
/// visible signer block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignerIdentity {
    /// Subject common name
    pub common_name: Option<String>,
    /// Subject e-mail address
    pub email: Option<String>,
    /// Subject `serialNumber` attribute (not the certificate serial)
    pub serial_number: Option<String>,
    /// Issuer distinguished name
    pub issuer: String,
    /// Start of validity
    pub not_before: String,
    /// End of validity
    pub not_after: String,
    /// Whether the current time is outside the validity window
    pub expired: bool,
}

impl SignerIdentity {
    /// Inspect a DER certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::Certificate(format!("cannot inspect certificate: {}", e)))?;

        let subject = cert.subject();
        let common_name = subject
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(str::to_string);
        let email = subject
            .iter_email()
            .next()
            .and_then(|e| e.as_str().ok())
            .map(str::to_string);
        let serial_number = subject
            .iter_attributes()
            .find(|attr| attr.attr_type().to_id_string() == SUBJECT_SERIAL_NUMBER)
            .and_then(|attr| attr.as_str().ok())
            .map(str::to_string);

        let validity = cert.validity();
        Ok(Self {
            common_name,
            email,
            serial_number,
            issuer: cert.issuer().to_string(),
            not_before: validity.not_before.to_string(),
            not_after: validity.not_after.to_string(),
            expired: !validity.is_valid(),
        })
    }

    /// Name shown for the signer: common name, else e-mail.
    pub fn display_name(&self) -> &str {
        self.common_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("Unknown signer")
    }
}

/// Ordered certificate chain, leaf first.
///
/// Immutable once built; one chain is shared by every document of a
/// signing session.
#[derive(Debug, Clone)]
pub struct CertificateChain {
    certificates: Vec<Certificate>,
    der: Vec<Vec<u8>>,
}

impl CertificateChain {
    /// Build a chain from DER certificates, leaf first.
    pub fn from_der(der: Vec<Vec<u8>>) -> Result<Self> {
        if der.is_empty() {
            return Err(Error::Certificate("certificate chain is empty".to_string()));
        }
        let certificates = der
            .iter()
            .enumerate()
            .map(|(i, bytes)| {
                Certificate::from_der(bytes)
                    .map_err(|e| Error::Certificate(format!("chain element {}: {}", i, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        let chain = Self { certificates, der };
        if let Some(i) = chain.broken_link() {
            warn!(
                "Certificate chain element {} is not issued by element {}; self-verification will not anchor it",
                i,
                i + 1
            );
        }
        Ok(chain)
    }

    /// Index of the first certificate whose issuer is not the subject of
    /// the next one.
    ///
    /// Names only; signatures along the chain are checked on verification.
    pub fn broken_link(&self) -> Option<usize> {
        self.certificates
            .windows(2)
            .position(|pair| pair[0].tbs_certificate.issuer != pair[1].tbs_certificate.subject)
    }

    /// Build a chain from base64 DER strings, leaf first.
    pub fn from_base64<S: AsRef<str>>(encoded: &[S]) -> Result<Self> {
        let der = encoded
            .iter()
            .map(|s| BASE64.decode(s.as_ref().trim()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::from_der(der)
    }

    /// Build a chain from concatenated PEM certificates, leaf first.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let certificates = Certificate::load_pem_chain(pem)
            .map_err(|e| Error::Certificate(format!("cannot read PEM chain: {}", e)))?;
        let der = certificates
            .iter()
            .map(|cert| cert.to_der())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::from_der(der)
    }

    /// The signing certificate.
    pub fn leaf(&self) -> &Certificate {
        &self.certificates[0]
    }

    /// DER of the signing certificate.
    pub fn leaf_der(&self) -> &[u8] {
        &self.der[0]
    }

    /// All certificates, leaf first.
    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    /// DER encodings, leaf first.
    pub fn der(&self) -> &[Vec<u8>] {
        &self.der
    }

    /// Number of certificates.
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    /// Always false; an empty chain cannot be built.
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// Descriptive fields of the signing certificate.
    pub fn identity(&self) -> Result<SignerIdentity> {
        SignerIdentity::from_der(self.leaf_der())
    }

    /// RSA public key of the signing certificate.
    pub fn public_key(&self) -> Result<RsaPublicKey> {
        rsa_public_key(self.leaf())
    }
}

/// RSA public key of a certificate.
pub(crate) fn rsa_public_key(cert: &Certificate) -> Result<RsaPublicKey> {
    let spki = cert.tbs_certificate.subject_public_key_info.to_der()?;
    RsaPublicKey::from_public_key_der(&spki)
        .map_err(|e| Error::Certificate(format!("certificate key is not RSA: {}", e)))
}
