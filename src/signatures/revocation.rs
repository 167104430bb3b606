//! Revocation evidence gathering (CRL and OCSP).
//!
//! Evidence is best-effort: a source that fails or returns garbage is
//! logged and skipped, never fatal to signing. Transport is left to the
//! caller through the [`CrlClient`] and [`OcspClient`] traits.

use super::chain::CertificateChain;
use crate::error::{Error, Result};
use der::asn1::Any;
use der::Decode;
use log::{debug, warn};
use x509_cert::crl::CertificateList;
use x509_cert::Certificate;

/// A source of CRLs.
pub trait CrlClient: Send + Sync {
    /// Fetch the DER CRL covering `cert`, or `None` when the source has none.
    fn fetch_crl(&self, cert: &Certificate) -> Result<Option<Vec<u8>>>;
}

impl<F> CrlClient for F
where
    F: Fn(&Certificate) -> Result<Option<Vec<u8>>> + Send + Sync,
{
    fn fetch_crl(&self, cert: &Certificate) -> Result<Option<Vec<u8>>> {
        self(cert)
    }
}

/// A source of OCSP responses.
pub trait OcspClient: Send + Sync {
    /// Fetch a DER `OCSPResponse` for `subject` as issued by `issuer`.
    fn fetch_ocsp(&self, subject: &Certificate, issuer: &Certificate) -> Result<Option<Vec<u8>>>;
}

impl<F> OcspClient for F
where
    F: Fn(&Certificate, &Certificate) -> Result<Option<Vec<u8>>> + Send + Sync,
{
    fn fetch_ocsp(&self, subject: &Certificate, issuer: &Certificate) -> Result<Option<Vec<u8>>> {
        self(subject, issuer)
    }
}

/// CRLs and OCSP responses gathered for a chain.
///
/// A field is `None` when no client of that kind was configured, and
/// `Some(vec![])` when clients were asked but returned nothing usable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevocationEvidence {
    /// DER CRLs, in chain order
    pub crls: Option<Vec<Vec<u8>>>,
    /// DER OCSP responses, one per leaf-to-issuer pair
    pub ocsp: Option<Vec<Vec<u8>>>,
}

impl RevocationEvidence {
    /// Whether there is nothing to embed.
    pub fn is_empty(&self) -> bool {
        self.crls.as_ref().map_or(true, Vec::is_empty) && self.ocsp.as_ref().map_or(true, Vec::is_empty)
    }

    /// Sizes of the gathered CRLs.
    pub fn crl_sizes(&self) -> Vec<usize> {
        self.crls.iter().flatten().map(Vec::len).collect()
    }

    /// Sizes of the gathered OCSP responses.
    pub fn ocsp_sizes(&self) -> Vec<usize> {
        self.ocsp.iter().flatten().map(Vec::len).collect()
    }
}

/// Collect revocation evidence for every certificate of `chain`.
///
/// Every CRL source is asked for every certificate. One OCSP request is
/// made per adjacent `(chain[i], chain[i + 1])` pair, so a single
/// certificate chain gets none and its OCSP evidence stays absent.
pub fn gather(
    chain: &CertificateChain,
    crl_sources: &[Box<dyn CrlClient>],
    ocsp_sources: &[Box<dyn OcspClient>],
) -> RevocationEvidence {
    let crls = (!crl_sources.is_empty()).then(|| gather_crls(chain, crl_sources));
    let ocsp = (!ocsp_sources.is_empty() && chain.len() > 1).then(|| gather_ocsp(chain, ocsp_sources));

    debug!(
        "Gathered {} CRL(s) and {} OCSP response(s) for a chain of {}",
        crls.as_ref().map_or(0, Vec::len),
        ocsp.as_ref().map_or(0, Vec::len),
        chain.len()
    );

    RevocationEvidence { crls, ocsp }
}

fn gather_crls(chain: &CertificateChain, sources: &[Box<dyn CrlClient>]) -> Vec<Vec<u8>> {
    let mut crls = Vec::new();
    for (index, cert) in chain.certificates().iter().enumerate() {
        for source in sources {
            match source.fetch_crl(cert).and_then(check_crl) {
                Ok(Some(crl)) => crls.push(crl),
                Ok(None) => debug!("No CRL for chain element {}", index),
                Err(e) => warn!("Skipping CRL for chain element {}: {}", index, e),
            }
        }
    }
    crls
}

fn gather_ocsp(chain: &CertificateChain, sources: &[Box<dyn OcspClient>]) -> Vec<Vec<u8>> {
    let mut responses = Vec::new();
    for (index, pair) in chain.certificates().windows(2).enumerate() {
        for source in sources {
            match source.fetch_ocsp(&pair[0], &pair[1]).and_then(check_ocsp) {
                Ok(Some(response)) => responses.push(response),
                Ok(None) => debug!("No OCSP response for chain element {}", index),
                Err(e) => warn!("Skipping OCSP response for chain element {}: {}", index, e),
            }
        }
    }
    responses
}

fn check_crl(crl: Option<Vec<u8>>) -> Result<Option<Vec<u8>>> {
    match crl {
        Some(bytes) => {
            CertificateList::from_der(&bytes)
                .map_err(|e| Error::RevocationFetch(format!("malformed CRL: {}", e)))?;
            Ok(Some(bytes))
        },
        None => Ok(None),
    }
}

fn check_ocsp(response: Option<Vec<u8>>) -> Result<Option<Vec<u8>>> {
    match response {
        Some(bytes) => {
            Any::from_der(&bytes)
                .map_err(|e| Error::RevocationFetch(format!("malformed OCSP response: {}", e)))?;
            Ok(Some(bytes))
        },
        None => Ok(None),
    }
}
