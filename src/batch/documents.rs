//! Batch input and output records.
//!
//! Field names serialize in PascalCase with `CorrelationID`, so records
//! exchanged as JSON keep the wire shape callers already produce.

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller-assigned key tying an input document to its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub i64);

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CorrelationId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A document submitted for signing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SigningDocument {
    #[serde(rename = "CorrelationID")]
    pub correlation_id: CorrelationId,
    pub application_code: String,
    pub company_code: String,
    pub document_type: String,
    pub document_number: String,
    pub emission_date: NaiveDateTime,
    pub document_year: i32,
    /// Base64-encoded PDF bytes
    pub content: String,
}

impl SigningDocument {
    /// Decode the base64 content.
    pub fn decode_content(&self) -> Result<Vec<u8>> {
        let bytes = BASE64
            .decode(self.content.trim())
            .map_err(|e| Error::SourceRead(format!("content is not valid base64: {}", e)))?;
        if bytes.is_empty() {
            return Err(Error::SourceRead("content is empty".to_string()));
        }
        Ok(bytes)
    }

    /// Stem of the signed file name: `{app}_{type}_{number}_{year}`.
    ///
    /// Path separators and control characters in any part become dots,
    /// and a part made only of dots is replaced by `_`, so the stem is
    /// always a single file name component.
    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            path_safe(&self.application_code),
            path_safe(&self.document_type),
            path_safe(&self.document_number),
            self.document_year
        )
    }
}

fn path_safe(part: &str) -> String {
    let cleaned: String = part
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_control() { '.' } else { c })
        .collect();
    if !cleaned.is_empty() && cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Outcome for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SigningResult {
    #[serde(rename = "CorrelationID")]
    pub correlation_id: CorrelationId,
    pub application_code: String,
    pub document_type: String,
    pub document_number: String,
    pub document_year: i32,
    pub emission_date: NaiveDateTime,
    /// The base64 signature the caller supplied (empty when none)
    pub signature: String,
    /// Base64 signed document; empty on failure
    pub pdf_content: String,
    pub is_signed: bool,
    pub error: Option<String>,
}

impl SigningResult {
    /// A successfully signed and verified document.
    pub fn signed(document: &SigningDocument, signature: &str, pdf: &[u8]) -> Self {
        Self::from_document(document, signature, BASE64.encode(pdf), true, None)
    }

    /// A document that could not be signed.
    pub fn failed(document: &SigningDocument, signature: &str, error: impl Into<String>) -> Self {
        Self::from_document(document, signature, String::new(), false, Some(error.into()))
    }

    fn from_document(
        document: &SigningDocument,
        signature: &str,
        pdf_content: String,
        is_signed: bool,
        error: Option<String>,
    ) -> Self {
        Self {
            correlation_id: document.correlation_id,
            application_code: document.application_code.clone(),
            document_type: document.document_type.clone(),
            document_number: document.document_number.clone(),
            document_year: document.document_year,
            emission_date: document.emission_date,
            signature: signature.to_string(),
            pdf_content,
            is_signed,
            error,
        }
    }

    /// Decode the signed document.
    pub fn decode_pdf(&self) -> Result<Vec<u8>> {
        Ok(BASE64.decode(&self.pdf_content)?)
    }
}
