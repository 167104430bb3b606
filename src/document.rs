//! PDF document model.
//!
//! A read-only view over the bytes of an existing document: header, merged
//! cross-reference sections, trailer and object loading. The signer never
//! rewrites existing bytes, so the document keeps the original buffer and
//! every modification goes through an incremental update appended to it
//! (see [`crate::writer::IncrementalUpdate`]).

use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::objstm::parse_object_stream;
use crate::parser::parse_indirect_object;
use crate::xref::{find_xref_offset, parse_xref, CrossRefTable, XRefEntry};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;

/// Maximum depth when following reference chains and the page tree.
const MAX_RECURSION_DEPTH: u32 = 100;

/// A field found in the interactive form.
#[derive(Debug, Clone)]
pub struct FormField {
    /// Reference to the field dictionary
    pub field_ref: ObjectRef,
    /// The field dictionary
    pub dict: Dict,
}

impl FormField {
    /// Reference held in the field's /V entry, if any.
    pub fn value_ref(&self) -> Option<ObjectRef> {
        self.dict.get("V").and_then(Object::as_reference)
    }
}

/// PDF document.
///
/// # Example
///
/// ```no_run
/// use pdf_deferred_signer::document::PdfDocument;
///
/// let doc = PdfDocument::open("contract.pdf")?;
/// println!("PDF version: {}.{}", doc.version().0, doc.version().1);
/// println!("Page count: {}", doc.page_count()?);
/// # Ok::<(), pdf_deferred_signer::error::Error>(())
/// ```
pub struct PdfDocument {
    /// Complete file contents
    data: Vec<u8>,
    /// PDF version (major, minor)
    version: (u8, u8),
    /// Cross-reference table merged over all sections
    xref: CrossRefTable,
    /// Trailer dictionary of the newest section
    trailer: Dict,
    /// Offset of the newest cross-reference section
    startxref: usize,
    /// Parsed object streams, keyed by stream object number
    object_streams: RefCell<HashMap<u32, Rc<HashMap<u32, Object>>>>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.version)
            .field("len", &self.data.len())
            .field("xref_entries", &self.xref.len())
            .field("startxref", &self.startxref)
            .finish_non_exhaustive()
    }
}

impl PdfDocument {
    /// Open a PDF document from a file path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(data)
    }

    /// Load a document from its bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The PDF header is invalid or unsupported
    /// - The cross-reference table cannot be found or parsed
    /// - The trailer has no /Root
    /// - The document is encrypted
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let version = parse_header(&data)?;
        let startxref = find_xref_offset(&data)?;
        let xref = parse_xref(&data, startxref)?;
        let trailer = xref
            .trailer()
            .cloned()
            .ok_or_else(|| Error::InvalidPdf("missing trailer dictionary".to_string()))?;

        if trailer.contains_key("Encrypt") {
            return Err(Error::Unsupported("encrypted documents cannot be signed".to_string()));
        }
        if trailer.get("Root").and_then(Object::as_reference).is_none() {
            return Err(Error::InvalidPdf("trailer missing /Root reference".to_string()));
        }

        log::debug!(
            "Loaded PDF {}.{} ({} bytes, {} xref entries, startxref {})",
            version.0,
            version.1,
            data.len(),
            xref.len(),
            startxref
        );

        Ok(Self {
            data,
            version,
            xref,
            trailer,
            startxref,
            object_streams: RefCell::new(HashMap::new()),
        })
    }

    /// The document bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the document and return its bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// PDF version (major, minor).
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Trailer dictionary of the newest cross-reference section.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Offset of the newest cross-reference section.
    pub fn startxref(&self) -> usize {
        self.startxref
    }

    /// First object number not used by any section.
    pub fn next_object_number(&self) -> u32 {
        let size = self
            .trailer
            .get("Size")
            .and_then(Object::as_integer)
            .unwrap_or(0)
            .max(0) as u32;
        size.max(self.xref.max_object_number() + 1)
    }

    /// Byte offset of an object stored directly in the file.
    pub fn object_offset(&self, obj_ref: ObjectRef) -> Option<usize> {
        match self.xref.get(obj_ref.id)? {
            XRefEntry::Uncompressed { offset, generation } if *generation == obj_ref.gen => {
                Some(*offset as usize)
            },
            _ => None,
        }
    }

    /// Load an indirect object.
    pub fn load_object(&self, obj_ref: ObjectRef) -> Result<Object> {
        match self.xref.get(obj_ref.id) {
            Some(XRefEntry::Uncompressed { offset, .. }) => {
                let (found, obj) = parse_indirect_object(&self.data, *offset as usize)?;
                if found.id != obj_ref.id {
                    return Err(Error::InvalidPdf(format!(
                        "xref entry for {} points at object {}",
                        obj_ref, found
                    )));
                }
                Ok(obj)
            },
            Some(XRefEntry::Compressed { stream, .. }) => {
                let objects = self.object_stream(*stream)?;
                objects
                    .get(&obj_ref.id)
                    .cloned()
                    .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))
            },
            Some(XRefEntry::Free) | None => Err(Error::ObjectNotFound(obj_ref.id, obj_ref.gen)),
        }
    }

    fn object_stream(&self, stream_num: u32) -> Result<Rc<HashMap<u32, Object>>> {
        if let Some(cached) = self.object_streams.borrow().get(&stream_num) {
            return Ok(Rc::clone(cached));
        }

        let offset = match self.xref.get(stream_num) {
            Some(XRefEntry::Uncompressed { offset, .. }) => *offset as usize,
            _ => {
                return Err(Error::InvalidPdf(format!(
                    "object stream {} is not an uncompressed object",
                    stream_num
                )))
            },
        };
        let (_, stream_obj) = parse_indirect_object(&self.data, offset)?;
        let objects = Rc::new(parse_object_stream(&stream_obj)?);
        log::debug!("Parsed object stream {} ({} objects)", stream_num, objects.len());

        self.object_streams
            .borrow_mut()
            .insert(stream_num, Rc::clone(&objects));
        Ok(objects)
    }

    /// Follow references until a direct object is reached.
    pub fn resolve(&self, obj: &Object) -> Result<Object> {
        let mut current = obj.clone();
        for _ in 0..MAX_RECURSION_DEPTH {
            match current {
                Object::Reference(r) => current = self.load_object(r)?,
                direct => return Ok(direct),
            }
        }
        Err(Error::InvalidPdf("reference chain too deep".to_string()))
    }

    /// Resolve an object expected to be a dictionary (or stream dictionary).
    pub fn resolve_dict(&self, obj: &Object) -> Result<Dict> {
        match self.resolve(obj)? {
            Object::Dictionary(d) => Ok(d),
            Object::Stream { dict, .. } => Ok(dict),
            other => Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Reference to the document catalog.
    pub fn catalog_ref(&self) -> Result<ObjectRef> {
        self.trailer
            .get("Root")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::InvalidPdf("trailer missing /Root reference".to_string()))
    }

    /// The document catalog dictionary.
    pub fn catalog(&self) -> Result<Dict> {
        let catalog = self.resolve_dict(&Object::Reference(self.catalog_ref()?))?;
        match catalog.get("Type").and_then(Object::as_name) {
            Some("Catalog") | None => Ok(catalog),
            Some(other) => Err(Error::InvalidPdf(format!("/Root has /Type /{}", other))),
        }
    }

    /// Number of pages in the page tree.
    pub fn page_count(&self) -> Result<usize> {
        Ok(self.page_refs()?.len())
    }

    /// Reference to the page at `page_index` (zero-based).
    pub fn page_ref(&self, page_index: usize) -> Result<ObjectRef> {
        let pages = self.page_refs()?;
        pages.get(page_index).copied().ok_or_else(|| {
            Error::InvalidPdf(format!(
                "page {} not found (document has {} pages)",
                page_index + 1,
                pages.len()
            ))
        })
    }

    /// All page references in document order.
    pub fn page_refs(&self) -> Result<Vec<ObjectRef>> {
        let root = self
            .catalog()?
            .get("Pages")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::InvalidPdf("Catalog missing /Pages reference".to_string()))?;

        let mut pages = Vec::new();
        let mut visited = HashSet::new();
        self.collect_pages(root, 0, &mut visited, &mut pages)?;
        Ok(pages)
    }

    fn collect_pages(
        &self,
        node_ref: ObjectRef,
        depth: u32,
        visited: &mut HashSet<ObjectRef>,
        pages: &mut Vec<ObjectRef>,
    ) -> Result<()> {
        if depth > MAX_RECURSION_DEPTH || !visited.insert(node_ref) {
            return Err(Error::InvalidPdf(format!("cyclic page tree at {}", node_ref)));
        }

        let node = self.resolve_dict(&Object::Reference(node_ref))?;
        match node.get("Type").and_then(Object::as_name) {
            Some("Page") => pages.push(node_ref),
            // Some producers omit /Type on intermediate nodes
            Some("Pages") | None => {
                let kids = node
                    .get("Kids")
                    .map(|k| self.resolve(k))
                    .transpose()?
                    .and_then(|k| k.as_array().cloned());
                match kids {
                    Some(kids) => {
                        for kid in kids.iter().filter_map(Object::as_reference) {
                            self.collect_pages(kid, depth + 1, visited, pages)?;
                        }
                    },
                    None if node.contains_key("Contents") || node.contains_key("MediaBox") => {
                        pages.push(node_ref)
                    },
                    None => log::warn!("Page tree node {} has no /Kids", node_ref),
                }
            },
            Some(other) => log::warn!("Skipping page tree node {} of type /{}", node_ref, other),
        }
        Ok(())
    }

    /// The interactive form dictionary, if the catalog has one.
    pub fn acroform(&self) -> Result<Option<Dict>> {
        match self.catalog()?.get("AcroForm") {
            Some(form) => Ok(Some(self.resolve_dict(form)?)),
            None => Ok(None),
        }
    }

    /// All fields of the interactive form, including descendants, with
    /// their fully qualified names.
    pub fn form_fields(&self) -> Result<Vec<(String, FormField)>> {
        let Some(form) = self.acroform()? else {
            return Ok(Vec::new());
        };
        let roots = match form.get("Fields") {
            Some(fields) => self.resolve(fields)?.as_array().cloned().unwrap_or_default(),
            None => Vec::new(),
        };

        let mut found = Vec::new();
        let mut visited = HashSet::new();
        for field in roots.iter().filter_map(Object::as_reference) {
            self.collect_fields(field, None, 0, &mut visited, &mut found)?;
        }
        Ok(found)
    }

    fn collect_fields(
        &self,
        field_ref: ObjectRef,
        parent_name: Option<&str>,
        depth: u32,
        visited: &mut HashSet<ObjectRef>,
        found: &mut Vec<(String, FormField)>,
    ) -> Result<()> {
        if depth > MAX_RECURSION_DEPTH || !visited.insert(field_ref) {
            log::warn!("Cyclic form field hierarchy at {}", field_ref);
            return Ok(());
        }
        let dict = self.resolve_dict(&Object::Reference(field_ref))?;
        let partial = dict
            .get("T")
            .and_then(Object::as_string)
            .map(|t| String::from_utf8_lossy(t).into_owned());
        let full_name = match (parent_name, partial) {
            (Some(parent), Some(own)) => Some(format!("{}.{}", parent, own)),
            (None, Some(own)) => Some(own),
            (parent, None) => parent.map(str::to_string),
        };

        if let Some(kids) = dict.get("Kids").and_then(Object::as_array) {
            for kid in kids.iter().filter_map(Object::as_reference) {
                self.collect_fields(kid, full_name.as_deref(), depth + 1, visited, found)?;
            }
        }

        if let Some(name) = full_name {
            if dict.contains_key("T") {
                found.push((name, FormField { field_ref, dict }));
            }
        }
        Ok(())
    }

    /// Find a form field by its fully qualified name.
    pub fn find_field(&self, name: &str) -> Result<Option<FormField>> {
        Ok(self
            .form_fields()?
            .into_iter()
            .find(|(field_name, _)| field_name == name)
            .map(|(_, field)| field))
    }
}

/// Parse the `%PDF-M.m` header at the start of the file.
///
/// ```
/// use pdf_deferred_signer::document::parse_header;
///
/// assert_eq!(parse_header(b"%PDF-1.7\n").unwrap(), (1, 7));
/// assert!(parse_header(b"GIF89a").is_err());
/// ```
pub fn parse_header(data: &[u8]) -> Result<(u8, u8)> {
    let header = data
        .get(..8)
        .ok_or_else(|| Error::InvalidHeader("file too short to contain PDF header".to_string()))?;

    if &header[0..5] != b"%PDF-" {
        return Err(Error::InvalidHeader(String::from_utf8_lossy(&header[0..5]).into_owned()));
    }

    let (major, dot, minor) = (header[5], header[6], header[7]);
    if dot != b'.' || !major.is_ascii_digit() || !minor.is_ascii_digit() {
        return Err(Error::InvalidHeader(String::from_utf8_lossy(header).into_owned()));
    }

    let (major, minor) = (major - b'0', minor - b'0');
    if major > 2 || (major == 0 && minor == 0) {
        return Err(Error::Unsupported(format!("PDF version {}.{}", major, minor)));
    }

    Ok((major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a classic-xref document from object bodies numbered 1..=n.
    fn build_pdf(objects: &[&str], trailer_extra: &str) -> Vec<u8> {
        let mut data = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(data.len());
            data.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref = data.len();
        data.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for offset in offsets {
            data.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        data.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R {} >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                trailer_extra,
                xref
            )
            .as_bytes(),
        );
        data
    }

    fn two_page_pdf() -> Vec<u8> {
        build_pdf(
            &[
                "<< /Type /Catalog /Pages 2 0 R /AcroForm << /Fields [5 0 R] >> >>",
                "<< /Type /Pages /Kids [3 0 R 6 0 R] /Count 2 >>",
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>",
                "<< /Producer (test) >>",
                "<< /FT /Tx /T (Name) >>",
                "<< /Type /Pages /Parent 2 0 R /Kids [7 0 R] /Count 1 >>",
                "<< /Type /Page /Parent 6 0 R /MediaBox [0 0 612 792] >>",
            ],
            "/Info 4 0 R",
        )
    }

    #[test]
    fn test_parse_valid_headers() {
        assert_eq!(parse_header(b"%PDF-1.4\n").unwrap(), (1, 4));
        assert_eq!(parse_header(b"%PDF-2.0\n").unwrap(), (2, 0));
    }

    #[test]
    fn test_parse_invalid_headers() {
        assert!(matches!(parse_header(b"%PDF"), Err(Error::InvalidHeader(_))));
        assert!(matches!(parse_header(b"%PDF-1x4\n"), Err(Error::InvalidHeader(_))));
        assert!(matches!(parse_header(b"%PDF-0.0\n"), Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_open_and_walk_nested_page_tree() {
        let doc = PdfDocument::from_bytes(two_page_pdf()).unwrap();
        assert_eq!(doc.version(), (1, 4));
        assert_eq!(doc.page_count().unwrap(), 2);
        assert_eq!(doc.page_ref(0).unwrap(), ObjectRef::new(3, 0));
        assert_eq!(doc.page_ref(1).unwrap(), ObjectRef::new(7, 0));
        assert!(doc.page_ref(2).is_err());
        assert_eq!(doc.next_object_number(), 8);
    }

    #[test]
    fn test_find_field_by_name() {
        let doc = PdfDocument::from_bytes(two_page_pdf()).unwrap();
        let field = doc.find_field("Name").unwrap().unwrap();
        assert_eq!(field.field_ref, ObjectRef::new(5, 0));
        assert!(field.value_ref().is_none());
        assert!(doc.find_field("Signature1").unwrap().is_none());
    }

    #[test]
    fn test_encrypted_document_is_rejected() {
        let data = build_pdf(&["<< /Type /Catalog /Pages 2 0 R >>", "<< /Filter /Standard >>"], "/Encrypt 2 0 R");
        assert!(matches!(PdfDocument::from_bytes(data), Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_missing_object_is_not_found() {
        let doc = PdfDocument::from_bytes(two_page_pdf()).unwrap();
        assert!(matches!(
            doc.load_object(ObjectRef::new(42, 0)),
            Err(Error::ObjectNotFound(42, 0))
        ));
    }

    #[test]
    fn test_object_offset_points_at_header() {
        let data = two_page_pdf();
        let doc = PdfDocument::from_bytes(data.clone()).unwrap();
        let offset = doc.object_offset(ObjectRef::new(3, 0)).unwrap();
        assert!(data[offset..].starts_with(b"3 0 obj"));
    }
}
