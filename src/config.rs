//! Configuration for deferred signing.

use crate::error::{Error, Result};
use crate::signatures::{SignatureAppearance, SignatureGraphic};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default directory for per-document temporary files.
pub const DEFAULT_TEMP_DIR: &str = "PdfTemporaryCreationRepository";

/// Signer configuration.
///
/// Every key is optional in JSON; the timestamp authority uses the key
/// `TSAClient`.
///
/// ```
/// use pdf_deferred_signer::config::SignerConfig;
///
/// let config = SignerConfig::from_json_str(r#"{ "TSAClient": "https://tsa.example/tsr" }"#)?;
/// assert_eq!(config.tsa_url.as_deref(), Some("https://tsa.example/tsr"));
/// assert!(config.ignore_revocation);
/// # Ok::<(), pdf_deferred_signer::error::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SignerConfig {
    /// RFC 3161 timestamp authority URL.
    #[serde(rename = "TSAClient")]
    pub tsa_url: Option<String>,

    /// Name of the signature field.
    pub field_name: String,

    /// Reason for signing.
    pub reason: String,

    /// Signing location.
    pub location: String,

    /// Page carrying the signature widget (1-based).
    pub page: u32,

    /// Skip CRL/OCSP gathering entirely.
    pub ignore_revocation: bool,

    /// Directory for temporary files.
    pub temp_dir: PathBuf,

    /// JPEG drawn beside the signer description.
    pub logo: Option<PathBuf>,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SignerConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            tsa_url: None,
            field_name: "Signature1".to_string(),
            reason: String::new(),
            location: String::new(),
            page: 1,
            ignore_revocation: true,
            temp_dir: PathBuf::from(DEFAULT_TEMP_DIR),
            logo: None,
        }
    }

    /// Parse configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file; a missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(json) => Self::from_json_str(&json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No configuration at {}, using defaults", path.display());
                Ok(Self::new())
            },
            Err(e) => Err(e.into()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.field_name.is_empty() {
            return Err(Error::Config("FieldName must not be empty".to_string()));
        }
        if self.page == 0 {
            return Err(Error::Config("Page numbers start at 1".to_string()));
        }
        Ok(())
    }

    /// Placement and metadata of the signature field.
    ///
    /// The logo file is read here; a missing or non-JPEG file is a
    /// configuration error.
    pub fn appearance(&self) -> Result<SignatureAppearance> {
        let graphic = match &self.logo {
            Some(path) => {
                let data = std::fs::read(path)
                    .map_err(|e| Error::Config(format!("cannot read logo {}: {}", path.display(), e)))?;
                Some(SignatureGraphic::from_jpeg(data)?)
            },
            None => None,
        };
        Ok(SignatureAppearance {
            field_name: self.field_name.clone(),
            reason: self.reason.clone(),
            location: self.location.clone(),
            page: self.page,
            graphic,
        })
    }

    /// Set the timestamp authority URL.
    pub fn with_tsa_url(mut self, url: impl Into<String>) -> Self {
        self.tsa_url = Some(url.into());
        self
    }

    /// Set the signature field name.
    pub fn with_field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    /// Set the reason for signing.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Set the signing location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Set the page carrying the widget.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Enable or disable revocation gathering.
    pub fn with_ignore_revocation(mut self, ignore: bool) -> Self {
        self.ignore_revocation = ignore;
        self
    }

    /// Set the JPEG logo drawn in the signature appearance.
    pub fn with_logo(mut self, path: impl Into<PathBuf>) -> Self {
        self.logo = Some(path.into());
        self
    }

    /// Set the temporary directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }
}
