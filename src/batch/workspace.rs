//! Temporary files for a batch.
//!
//! Every document gets three paths derived from a fresh UUID, so no two
//! documents or batches ever share a file. Deletion is best effort: a
//! failure is logged and returned as a [`CleanupFailure`], never raised.

use super::documents::SigningDocument;
use crate::error::Result;
use log::{debug, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// The three temporary files of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkPaths {
    /// Decoded source document
    pub to_be_signed: PathBuf,
    /// Document with the reserved gap
    pub intermediary: PathBuf,
    /// Final signed document
    pub signed: PathBuf,
}

impl WorkPaths {
    fn new(dir: &Path, document: &SigningDocument) -> Self {
        let id = Uuid::new_v4();
        Self {
            to_be_signed: dir.join(format!("ToBeSigned_{}.pdf", id)),
            intermediary: dir.join(format!("ToBeSigned_TEMP_{}.pdf", id)),
            signed: dir.join(format!("{}_{}.pdf", document.file_stem(), id)),
        }
    }

    /// All three paths.
    pub fn all(&self) -> [&Path; 3] {
        [&self.to_be_signed, &self.intermediary, &self.signed]
    }
}

/// A temporary file that could not be removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Directory holding the temporary files of a batch.
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    tracked: Vec<PathBuf>,
}

impl Workspace {
    /// Use `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            tracked: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Allocate and track the paths for `document`.
    pub fn allocate(&mut self, document: &SigningDocument) -> WorkPaths {
        let paths = WorkPaths::new(&self.dir, document);
        self.tracked.extend(paths.all().iter().map(|p| p.to_path_buf()));
        paths
    }

    /// Paths that will be removed by the next cleanup.
    pub fn tracked(&self) -> &[PathBuf] {
        &self.tracked
    }

    /// Remove every tracked file.
    ///
    /// Files that were never written are not failures.
    pub fn cleanup(&mut self) -> Vec<CleanupFailure> {
        let mut failures = Vec::new();
        for path in self.tracked.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {},
                Err(e) => {
                    warn!("Could not remove temporary file {}: {}", path.display(), e);
                    failures.push(CleanupFailure {
                        path,
                        reason: e.to_string(),
                    });
                },
            }
        }
        failures
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.tracked.is_empty() {
            self.cleanup();
        }
    }
}

/// Runs [`Workspace::cleanup`] when dropped, including during unwinding.
pub struct CleanupGuard<'a> {
    workspace: &'a mut Workspace,
    finished: bool,
}

impl<'a> CleanupGuard<'a> {
    pub fn new(workspace: &'a mut Workspace) -> Self {
        Self {
            workspace,
            finished: false,
        }
    }

    /// Clean up now and return the failures.
    pub fn finish(mut self) -> Vec<CleanupFailure> {
        self.finished = true;
        self.workspace.cleanup()
    }
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.workspace.cleanup();
        }
    }
}
