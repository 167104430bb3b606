//! PDF writing for incremental updates.
//!
//! ```text
//! PdfDocument (original bytes)
//!     ↓
//! [IncrementalUpdate] (new and replaced objects)
//!     ↓
//! [ObjectSerializer] (serializes PDF objects)
//!     ↓
//! original bytes + appended revision
//! ```

mod incremental;
mod object_serializer;

pub use incremental::{IncrementalUpdate, WrittenUpdate};
pub use object_serializer::ObjectSerializer;
