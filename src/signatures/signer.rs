//! Signature placeholder reservation.
//!
//! This module appends the signature field, its widget and the signature
//! dictionary to a document as an incremental update, leaving a
//! zero-filled `/Contents` gap of a fixed size and a patched `/ByteRange`
//! that covers everything except that gap.

use super::appearance::{description_lines, signer_block};
use super::byterange::ByteRangeCalculator;
use super::chain::SignerIdentity;
use super::types::{SignatureAppearance, SignatureSubFilter};
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::writer::{IncrementalUpdate, ObjectSerializer};
use chrono::{DateTime, Utc};
use log::debug;

/// Annotation flags of the signature widget: Print | Locked.
const WIDGET_FLAGS: i64 = 132;
/// AcroForm /SigFlags: SignaturesExist | AppendOnly.
const SIG_FLAGS: i64 = 3;

/// A document with a reserved, unfilled signature gap.
#[derive(Debug, Clone)]
pub struct ReservedGap {
    /// Document bytes including the appended revision
    pub data: Vec<u8>,
    /// Final ByteRange written into the signature dictionary
    pub byte_range: [i64; 4],
    /// Offset of the `<` opening the `/Contents` gap
    pub contents_offset: usize,
    /// Container bytes the gap can hold
    pub reserved_size: usize,
}

/// Where an existing signature sits in a document.
#[derive(Debug, Clone)]
pub struct SignatureLocation {
    /// Reference to the signature dictionary
    pub sig_ref: ObjectRef,
    /// The signature dictionary as parsed
    pub sig_dict: Dict,
    /// ByteRange read from the dictionary
    pub byte_range: [i64; 4],
    /// Offset of the `<` opening the `/Contents` value
    pub contents_offset: usize,
    /// Length of the `/Contents` value including delimiters
    pub placeholder_size: usize,
}

/// Reserves a signature gap in one document.
pub struct PdfSigner<'a> {
    doc: &'a PdfDocument,
    appearance: &'a SignatureAppearance,
    byte_range_calc: ByteRangeCalculator,
}

impl<'a> PdfSigner<'a> {
    /// Create a signer reserving `reserved_size` container bytes.
    pub fn new(doc: &'a PdfDocument, appearance: &'a SignatureAppearance, reserved_size: usize) -> Self {
        Self {
            doc,
            appearance,
            byte_range_calc: ByteRangeCalculator::new(reserved_size),
        }
    }

    /// Get the placeholder size for the signature.
    pub fn placeholder_size(&self) -> usize {
        self.byte_range_calc.placeholder_size()
    }

    /// Build the signature dictionary with placeholder /ByteRange and /Contents.
    pub fn build_signature_dictionary(&self, identity: &SignerIdentity, signing_time: DateTime<Utc>) -> Dict {
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::name("Sig"));
        dict.insert("Filter".to_string(), Object::name("Adobe.PPKLite"));
        dict.insert(
            "SubFilter".to_string(),
            Object::name(SignatureSubFilter::Pkcs7Detached.as_pdf_name()),
        );
        dict.insert("ByteRange".to_string(), ByteRangeCalculator::placeholder_array());
        dict.insert(
            "Contents".to_string(),
            Object::String(vec![0; self.byte_range_calc.capacity()]),
        );
        dict.insert("M".to_string(), Object::text(&format_pdf_date(signing_time)));
        dict.insert("Name".to_string(), Object::text(identity.display_name()));
        if !self.appearance.reason.is_empty() {
            dict.insert("Reason".to_string(), Object::text(&self.appearance.reason));
        }
        if !self.appearance.location.is_empty() {
            dict.insert("Location".to_string(), Object::text(&self.appearance.location));
        }
        dict
    }

    /// Append the signature revision and patch its ByteRange.
    ///
    /// # Errors
    ///
    /// [`Error::GapReservation`] when the field already exists, the page
    /// does not exist, or the form structure cannot take a new field.
    pub fn reserve(&self, identity: &SignerIdentity, signing_time: DateTime<Utc>) -> Result<ReservedGap> {
        let field_name = &self.appearance.field_name;
        if self.doc.find_field(field_name)?.is_some() {
            return Err(Error::GapReservation(format!("field '{}' already exists", field_name)));
        }
        let page_index = (self.appearance.page as usize)
            .checked_sub(1)
            .ok_or_else(|| Error::GapReservation("page numbers start at 1".to_string()))?;
        let page_ref = self
            .doc
            .page_ref(page_index)
            .map_err(|e| Error::GapReservation(e.to_string()))?;

        let mut update = IncrementalUpdate::new(self.doc);
        let sig_ref = update.allocate();
        let field_ref = update.allocate();
        let ap_ref = update.allocate();

        update.put(sig_ref, Object::Dictionary(self.build_signature_dictionary(identity, signing_time)));
        let image = self.appearance.graphic.as_ref().map(|graphic| {
            let image_ref = update.allocate();
            update.put(image_ref, graphic.to_xobject());
            (image_ref, graphic)
        });
        update.put(
            ap_ref,
            signer_block(&description_lines(identity, self.appearance, signing_time), image),
        );
        update.put(
            field_ref,
            ObjectSerializer::dict(vec![
                ("Type", Object::name("Annot")),
                ("Subtype", Object::name("Widget")),
                ("FT", Object::name("Sig")),
                ("T", Object::text(field_name)),
                ("V", Object::Reference(sig_ref)),
                ("Rect", Object::Array(vec![Object::Integer(0); 4])),
                ("F", Object::Integer(WIDGET_FLAGS)),
                ("P", Object::Reference(page_ref)),
                ("AP", ObjectSerializer::dict(vec![("N", Object::Reference(ap_ref))])),
            ]),
        );

        let mut page = self.doc.resolve_dict(&Object::Reference(page_ref))?;
        if append_reference(&mut update, &mut page, "Annots", field_ref)? {
            update.put(page_ref, Object::Dictionary(page));
        }
        register_field(&mut update, field_ref)?;

        let mut written = update.write();
        let sig_offset = written
            .offsets
            .get(&sig_ref)
            .copied()
            .ok_or_else(|| Error::GapReservation("signature dictionary was not written".to_string()))?;
        let contents_offset = ByteRangeCalculator::find_contents_offset(&written.data, sig_offset)
            .ok_or_else(|| Error::GapReservation("no /Contents placeholder after writing".to_string()))?;

        let byte_range = self
            .byte_range_calc
            .calculate_byte_range(written.data.len(), contents_offset);
        ByteRangeCalculator::patch_byte_range(&mut written.data, sig_offset, &byte_range)?;

        debug!(
            "Reserved {} container bytes for field '{}' at offset {} (ByteRange {})",
            self.byte_range_calc.capacity(),
            field_name,
            contents_offset,
            ByteRangeCalculator::format_byte_range(&byte_range)
        );

        Ok(ReservedGap {
            data: written.data,
            byte_range,
            contents_offset,
            reserved_size: self.byte_range_calc.capacity(),
        })
    }
}

/// Add `item` to the array stored under `key` in `container`.
///
/// An indirect array is rewritten in place and `false` is returned;
/// otherwise `container` itself changed and the caller must write it.
fn append_reference(
    update: &mut IncrementalUpdate<'_>,
    container: &mut Dict,
    key: &str,
    item: ObjectRef,
) -> Result<bool> {
    match container.get_mut(key) {
        Some(Object::Reference(array_ref)) => {
            let array_ref = *array_ref;
            let mut items = match update.base().resolve(&Object::Reference(array_ref))? {
                Object::Array(items) => items,
                other => {
                    return Err(Error::GapReservation(format!(
                        "/{} is a {}, not an array",
                        key,
                        other.type_name()
                    )))
                },
            };
            items.push(Object::Reference(item));
            update.put(array_ref, Object::Array(items));
            Ok(false)
        },
        Some(Object::Array(items)) => {
            items.push(Object::Reference(item));
            Ok(true)
        },
        Some(other) => Err(Error::GapReservation(format!(
            "/{} is a {}, not an array",
            key,
            other.type_name()
        ))),
        None => {
            container.insert(key.to_string(), Object::Array(vec![Object::Reference(item)]));
            Ok(true)
        },
    }
}

/// Add the field to the document's AcroForm, creating the form if needed.
fn register_field(update: &mut IncrementalUpdate<'_>, field_ref: ObjectRef) -> Result<()> {
    let doc = update.base();
    let catalog_ref = doc.catalog_ref()?;
    let mut catalog = doc.catalog()?;

    match catalog.get("AcroForm").cloned() {
        Some(Object::Reference(form_ref)) => {
            let mut form = doc.resolve_dict(&Object::Reference(form_ref))?;
            append_reference(update, &mut form, "Fields", field_ref)?;
            form.insert("SigFlags".to_string(), Object::Integer(SIG_FLAGS));
            update.put(form_ref, Object::Dictionary(form));
        },
        Some(Object::Dictionary(mut form)) => {
            append_reference(update, &mut form, "Fields", field_ref)?;
            form.insert("SigFlags".to_string(), Object::Integer(SIG_FLAGS));
            catalog.insert("AcroForm".to_string(), Object::Dictionary(form));
            update.put(catalog_ref, Object::Dictionary(catalog));
        },
        None => {
            let form_ref = update.allocate();
            update.put(
                form_ref,
                ObjectSerializer::dict(vec![
                    ("Fields", Object::Array(vec![Object::Reference(field_ref)])),
                    ("SigFlags", Object::Integer(SIG_FLAGS)),
                ]),
            );
            catalog.insert("AcroForm".to_string(), Object::Reference(form_ref));
            update.put(catalog_ref, Object::Dictionary(catalog));
        },
        Some(other) => {
            return Err(Error::GapReservation(format!("/AcroForm is a {}", other.type_name())));
        },
    }
    Ok(())
}

/// Find the signature held by `field_name` and its `/Contents` gap.
pub fn locate_signature(doc: &PdfDocument, field_name: &str) -> Result<SignatureLocation> {
    let field = doc
        .find_field(field_name)?
        .ok_or_else(|| Error::InvalidPdf(format!("no signature field '{}'", field_name)))?;
    let sig_ref = field
        .value_ref()
        .ok_or_else(|| Error::InvalidPdf(format!("field '{}' has no signature value", field_name)))?;
    let sig_dict = doc.resolve_dict(&Object::Reference(sig_ref))?;

    let byte_range = sig_dict
        .get("ByteRange")
        .and_then(ByteRangeCalculator::from_object)
        .ok_or_else(|| Error::InvalidPdf("signature has no usable /ByteRange".to_string()))?;
    let sig_offset = doc.object_offset(sig_ref).ok_or_else(|| {
        Error::Unsupported(format!("signature dictionary {} is not stored directly in the file", sig_ref))
    })?;
    let contents_offset = ByteRangeCalculator::find_contents_offset(doc.data(), sig_offset)
        .ok_or_else(|| Error::InvalidPdf("signature has no /Contents string".to_string()))?;

    if contents_offset as i64 != byte_range[1] || byte_range[2] <= byte_range[1] {
        return Err(Error::InvalidPdf(format!(
            "ByteRange {} does not exclude /Contents at offset {}",
            ByteRangeCalculator::format_byte_range(&byte_range),
            contents_offset
        )));
    }

    Ok(SignatureLocation {
        sig_ref,
        sig_dict,
        byte_range,
        contents_offset,
        placeholder_size: (byte_range[2] - byte_range[1]) as usize,
    })
}

/// Format a time as a PDF date string (`D:YYYYMMDDHHmmSS+00'00'`).
fn format_pdf_date(time: DateTime<Utc>) -> String {
    time.format("D:%Y%m%d%H%M%S+00'00'").to_string()
}
