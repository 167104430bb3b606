//! Batch signing.
//!
//! Documents arrive as [`SigningDocument`] records and leave as
//! [`SigningResult`] records, correlated by [`CorrelationId`]. Between the
//! two phases each document is a [`WorkItem`] moving through
//! [`DocumentState`]; its temporary files live in a [`Workspace`].

mod documents;
mod orchestrator;
mod state;
mod workspace;

pub use documents::{CorrelationId, SigningDocument, SigningResult};
pub use orchestrator::{BatchOutcome, BatchSigner};
pub use state::{DocumentState, WorkItem};
pub use workspace::{CleanupFailure, CleanupGuard, WorkPaths, Workspace};
