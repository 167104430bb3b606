//! Per-document lifecycle.

use super::documents::SigningDocument;
use super::workspace::WorkPaths;
use crate::error::{Error, Result};
use crate::signatures::DigestPair;
use chrono::{DateTime, Utc};

/// Where a document stands between the two signing phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentState {
    /// Gap reserved, digests computed
    Prepared,
    /// Hash handed to the caller
    HashIssued,
    /// External signature accepted back
    SignatureReceived,
    /// Container written into the gap
    Injected,
    /// Final document passed self-verification
    Verified,
    Failed,
}

impl DocumentState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Prepared => "Prepared",
            Self::HashIssued => "HashIssued",
            Self::SignatureReceived => "SignatureReceived",
            Self::Injected => "Injected",
            Self::Verified => "Verified",
            Self::Failed => "Failed",
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Verified | Self::Failed)
    }

    fn can_advance(&self, to: DocumentState) -> bool {
        use DocumentState::*;
        match (self, to) {
            (Prepared, HashIssued)
            | (HashIssued, SignatureReceived)
            | (SignatureReceived, Injected)
            | (Injected, Verified) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// State kept for one document across both phases.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub document: SigningDocument,
    pub paths: WorkPaths,
    pub digests: DigestPair,
    /// Instant fixed in phase one and reused in phase two
    pub signing_time: DateTime<Utc>,
    state: DocumentState,
    error: Option<String>,
}

impl WorkItem {
    /// A freshly prepared document.
    pub fn new(document: SigningDocument, paths: WorkPaths, digests: DigestPair, signing_time: DateTime<Utc>) -> Self {
        Self {
            document,
            paths,
            digests,
            signing_time,
            state: DocumentState::Prepared,
            error: None,
        }
    }

    pub fn state(&self) -> DocumentState {
        self.state
    }

    /// Reason recorded by [`WorkItem::fail`].
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Move to `to`, rejecting edges outside the lifecycle.
    pub fn advance(&mut self, to: DocumentState) -> Result<()> {
        if !self.state.can_advance(to) {
            return Err(Error::InvalidTransition {
                from: self.state.name(),
                to: to.name(),
            });
        }
        self.state = to;
        Ok(())
    }

    /// Mark the document failed; a terminal state is left untouched.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if !self.state.is_terminal() {
            self.state = DocumentState::Failed;
            self.error = Some(reason.into());
        }
    }
}
