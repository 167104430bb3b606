//! Incremental updates.
//!
//! A signature must not disturb the bytes it covers in earlier revisions, so
//! every change is appended after the original `%%EOF`: new and replaced
//! objects, a cross-reference section listing them, and a trailer whose
//! `/Prev` points at the previous section.

use super::ObjectSerializer;
use crate::document::PdfDocument;
use crate::object::{Dict, Object, ObjectRef};
use std::collections::{BTreeMap, HashMap};

/// Result of writing an incremental update.
#[derive(Debug, Clone)]
pub struct WrittenUpdate {
    /// Original bytes followed by the appended revision
    pub data: Vec<u8>,
    /// Offset of each written object's `id gen obj` header
    pub offsets: HashMap<ObjectRef, usize>,
    /// Offset of the appended cross-reference section
    pub startxref: usize,
}

/// Collects objects for one appended revision of a document.
///
/// ```
/// # use pdf_deferred_signer::document::PdfDocument;
/// # use pdf_deferred_signer::object::Object;
/// # use pdf_deferred_signer::writer::IncrementalUpdate;
/// # fn demo(doc: &PdfDocument) -> pdf_deferred_signer::error::Result<()> {
/// let mut update = IncrementalUpdate::new(doc);
/// let id = update.allocate();
/// update.put(id, Object::Integer(42));
/// let written = update.write();
/// assert!(written.data.len() > doc.data().len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct IncrementalUpdate<'a> {
    doc: &'a PdfDocument,
    next_id: u32,
    objects: BTreeMap<ObjectRef, Object>,
    serializer: ObjectSerializer,
}

impl<'a> IncrementalUpdate<'a> {
    /// Start a new revision on top of `doc`.
    pub fn new(doc: &'a PdfDocument) -> Self {
        Self {
            doc,
            next_id: doc.next_object_number(),
            objects: BTreeMap::new(),
            serializer: ObjectSerializer::new(),
        }
    }

    /// The document this revision is appended to.
    pub fn base(&self) -> &'a PdfDocument {
        self.doc
    }

    /// Reserve a fresh object number.
    pub fn allocate(&mut self) -> ObjectRef {
        let obj_ref = ObjectRef::new(self.next_id, 0);
        self.next_id += 1;
        obj_ref
    }

    /// Add a new object or replace an existing one in this revision.
    pub fn put(&mut self, obj_ref: ObjectRef, obj: Object) {
        self.objects.insert(obj_ref, obj);
    }

    /// Serialize the revision after the original bytes.
    pub fn write(self) -> WrittenUpdate {
        let mut data = self.doc.data().to_vec();
        if !data.ends_with(b"\n") {
            data.push(b'\n');
        }

        let mut offsets = HashMap::with_capacity(self.objects.len());
        for (obj_ref, obj) in &self.objects {
            offsets.insert(*obj_ref, data.len());
            data.extend_from_slice(&self.serializer.serialize_indirect(*obj_ref, obj));
        }

        let startxref = data.len();
        data.extend_from_slice(b"xref\n");
        for run in contiguous_runs(self.objects.keys().copied()) {
            data.extend_from_slice(format!("{} {}\n", run[0].id, run.len()).as_bytes());
            for obj_ref in run {
                let offset = offsets.get(&obj_ref).copied().unwrap_or(0);
                data.extend_from_slice(format!("{:010} {:05} n \n", offset, obj_ref.gen).as_bytes());
            }
        }

        let trailer = self.trailer();
        data.extend_from_slice(b"trailer\n");
        data.extend_from_slice(&ObjectSerializer::compact().serialize(&Object::Dictionary(trailer)));
        data.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", startxref).as_bytes());

        log::debug!(
            "Appended revision with {} objects ({} -> {} bytes)",
            self.objects.len(),
            self.doc.data().len(),
            data.len()
        );

        WrittenUpdate {
            data,
            offsets,
            startxref,
        }
    }

    fn trailer(&self) -> Dict {
        let base = self.doc.trailer();
        let size = self.next_id.max(self.doc.next_object_number());

        let mut trailer = Dict::new();
        trailer.insert("Size".to_string(), Object::Integer(size as i64));
        for key in ["Root", "Info", "ID"] {
            if let Some(value) = base.get(key) {
                trailer.insert(key.to_string(), value.clone());
            }
        }
        trailer.insert("Prev".to_string(), Object::Integer(self.doc.startxref() as i64));
        trailer
    }
}

/// Group sorted references into runs of consecutive object numbers.
fn contiguous_runs(refs: impl Iterator<Item = ObjectRef>) -> Vec<Vec<ObjectRef>> {
    let mut runs: Vec<Vec<ObjectRef>> = Vec::new();
    for obj_ref in refs {
        match runs.last_mut() {
            Some(run) if run.last().map(|r| r.id + 1) == Some(obj_ref.id) => run.push(obj_ref),
            _ => runs.push(vec![obj_ref]),
        }
    }
    runs
}
