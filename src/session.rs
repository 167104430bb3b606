//! Signing session context.
//!
//! A [`SigningSession`] is built once per batch and only read afterwards:
//! the certificate chain, the revocation evidence gathered for it, the
//! optional timestamp authority and the placeholder size all stay fixed
//! for every document signed with it.

use crate::config::SignerConfig;
use crate::error::Result;
use crate::signatures::estimate::reserved_size;
use crate::signatures::revocation::{gather, CrlClient, OcspClient, RevocationEvidence};
use crate::signatures::timestamp::TimestampClient;
use crate::signatures::{CertificateChain, SignatureAppearance};
use log::{debug, info};

/// Immutable context shared by both signing phases.
pub struct SigningSession {
    chain: CertificateChain,
    evidence: Option<RevocationEvidence>,
    tsa: Option<Box<dyn TimestampClient>>,
    config: SignerConfig,
    appearance: SignatureAppearance,
    reserved_size: usize,
}

impl std::fmt::Debug for SigningSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningSession")
            .field("chain_len", &self.chain.len())
            .field("evidence", &self.evidence.as_ref().map(|e| (e.crl_sizes(), e.ocsp_sizes())))
            .field("tsa", &self.tsa.is_some())
            .field("reserved_size", &self.reserved_size)
            .finish()
    }
}

impl SigningSession {
    /// Start building a session for `chain`.
    pub fn builder(chain: CertificateChain) -> SigningSessionBuilder {
        SigningSessionBuilder {
            chain,
            config: SignerConfig::default(),
            crl_clients: Vec::new(),
            ocsp_clients: Vec::new(),
            tsa: None,
        }
    }

    /// Session with a configuration and no revocation clients.
    pub fn new(chain: CertificateChain, config: SignerConfig) -> Result<Self> {
        Self::builder(chain).config(config).build()
    }

    /// The signer chain, leaf first.
    pub fn chain(&self) -> &CertificateChain {
        &self.chain
    }

    /// Revocation evidence; `None` when revocation is ignored.
    pub fn evidence(&self) -> Option<&RevocationEvidence> {
        self.evidence.as_ref()
    }

    /// The timestamp authority, if any.
    pub fn tsa(&self) -> Option<&dyn TimestampClient> {
        self.tsa.as_deref()
    }

    /// The configuration the session was built from.
    pub fn config(&self) -> &SignerConfig {
        &self.config
    }

    /// Placement and metadata of the signature field, logo included.
    pub fn appearance(&self) -> &SignatureAppearance {
        &self.appearance
    }

    /// Container bytes reserved in every document.
    pub fn reserved_size(&self) -> usize {
        self.reserved_size
    }
}

/// Builder for [`SigningSession`].
pub struct SigningSessionBuilder {
    chain: CertificateChain,
    config: SignerConfig,
    crl_clients: Vec<Box<dyn CrlClient>>,
    ocsp_clients: Vec<Box<dyn OcspClient>>,
    tsa: Option<Box<dyn TimestampClient>>,
}

impl SigningSessionBuilder {
    /// Use `config`.
    pub fn config(mut self, config: SignerConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a CRL source; every source is asked for every certificate.
    pub fn crl_client(mut self, client: impl CrlClient + 'static) -> Self {
        self.crl_clients.push(Box::new(client));
        self
    }

    /// Add an OCSP source.
    pub fn ocsp_client(mut self, client: impl OcspClient + 'static) -> Self {
        self.ocsp_clients.push(Box::new(client));
        self
    }

    /// Use `client` as timestamp authority, overriding the configured URL.
    pub fn timestamp_client(mut self, client: impl TimestampClient + 'static) -> Self {
        self.tsa = Some(Box::new(client));
        self
    }

    /// Load the appearance, gather revocation evidence and fix the
    /// placeholder size.
    ///
    /// # Errors
    ///
    /// [`Error::Config`](crate::error::Error::Config) when the configured
    /// logo cannot be loaded.
    pub fn build(self) -> Result<SigningSession> {
        let Self {
            chain,
            config,
            crl_clients,
            ocsp_clients,
            tsa,
        } = self;

        let appearance = config.appearance()?;
        let evidence = if config.ignore_revocation {
            debug!("Revocation checking disabled; no CRL/OCSP gathered");
            None
        } else {
            Some(gather(&chain, &crl_clients, &ocsp_clients))
        };

        let tsa = tsa.or_else(|| configured_tsa(&config));

        let has_ocsp = evidence.as_ref().map_or(false, |e| e.ocsp.is_some());
        let crl_sizes = evidence.as_ref().map(RevocationEvidence::crl_sizes).unwrap_or_default();
        let ocsp_sizes = evidence.as_ref().map(RevocationEvidence::ocsp_sizes).unwrap_or_default();
        let cert_sizes: Vec<usize> = chain.der().iter().map(Vec::len).collect();
        let reserved_size = reserved_size(has_ocsp, tsa.is_some(), &crl_sizes, &cert_sizes, &ocsp_sizes);

        info!(
            "Signing session ready: {} certificate(s), {} CRL(s), {} OCSP response(s), timestamp: {}, reserving {} bytes",
            chain.len(),
            crl_sizes.len(),
            ocsp_sizes.len(),
            tsa.is_some(),
            reserved_size
        );

        Ok(SigningSession {
            chain,
            evidence,
            tsa,
            config,
            appearance,
            reserved_size,
        })
    }
}

#[cfg(feature = "tsa-http")]
fn configured_tsa(config: &SignerConfig) -> Option<Box<dyn TimestampClient>> {
    config
        .tsa_url
        .as_deref()
        .filter(|url| !url.is_empty())
        .map(|url| Box::new(crate::signatures::timestamp::HttpTimestampClient::new(url)) as Box<dyn TimestampClient>)
}

#[cfg(not(feature = "tsa-http"))]
fn configured_tsa(config: &SignerConfig) -> Option<Box<dyn TimestampClient>> {
    if let Some(url) = config.tsa_url.as_deref().filter(|url| !url.is_empty()) {
        log::warn!("TSA {} configured but HTTP timestamping is not compiled in (feature tsa-http)", url);
    }
    None
}
