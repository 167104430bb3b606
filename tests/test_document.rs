//! Reading documents and appending incremental revisions.

mod common;

use bytes::Bytes;
use common::*;
use pdf_deferred_signer::document::PdfDocument;
use pdf_deferred_signer::error::Error;
use pdf_deferred_signer::object::{Dict, Object, ObjectRef};
use pdf_deferred_signer::objstm::parse_object_stream;
use pdf_deferred_signer::writer::{IncrementalUpdate, ObjectSerializer};

fn object_stream(n: i64, first: i64, data: &[u8]) -> Object {
    let mut dict = Dict::new();
    dict.insert("Type".to_string(), Object::name("ObjStm"));
    dict.insert("N".to_string(), Object::Integer(n));
    dict.insert("First".to_string(), Object::Integer(first));
    Object::Stream {
        dict,
        data: Bytes::from(data.to_vec()),
    }
}

#[test]
fn test_open_classic_document() {
    let doc = PdfDocument::from_bytes(classic_pdf("Hello")).unwrap();
    assert_eq!(doc.version(), (1, 4));
    assert_eq!(doc.page_count().unwrap(), 1);
    assert_eq!(doc.catalog_ref().unwrap(), ObjectRef::new(1, 0));
    assert_eq!(doc.next_object_number(), 5);
    assert!(doc.acroform().unwrap().is_none());
}

#[test]
fn test_open_xref_stream_document() {
    init_logging();
    let doc = PdfDocument::from_bytes(xref_stream_pdf()).unwrap();
    assert_eq!(doc.version(), (1, 5));
    assert_eq!(doc.page_refs().unwrap(), vec![ObjectRef::new(3, 0)]);

    // Object 3 lives in object stream 4
    let page = doc.load_object(ObjectRef::new(3, 0)).unwrap();
    assert_eq!(page.as_dict().unwrap().get("Type").and_then(Object::as_name), Some("Page"));
    assert!(doc.object_offset(ObjectRef::new(3, 0)).is_none());
    assert!(doc.object_offset(ObjectRef::new(4, 0)).is_some());
}

#[test]
fn test_missing_object() {
    let doc = PdfDocument::from_bytes(classic_pdf("Hello")).unwrap();
    let err = doc.load_object(ObjectRef::new(42, 0)).unwrap_err();
    assert!(matches!(err, Error::ObjectNotFound(42, 0)));
}

#[test]
fn test_not_a_pdf() {
    assert!(PdfDocument::from_bytes(b"GIF89a".to_vec()).is_err());
}

#[test]
fn test_incremental_update_over_xref_stream() {
    let base = xref_stream_pdf();
    let doc = PdfDocument::from_bytes(base.clone()).unwrap();

    let mut update = IncrementalUpdate::new(&doc);
    let info = update.allocate();
    assert_eq!(info, ObjectRef::new(6, 0));
    update.put(info, ObjectSerializer::dict(vec![("Producer", Object::text("deferred"))]));

    let mut page = doc.resolve_dict(&Object::Reference(ObjectRef::new(3, 0))).unwrap();
    page.insert("Rotate".to_string(), Object::Integer(90));
    update.put(ObjectRef::new(3, 0), Object::Dictionary(page));

    let written = update.write();
    assert_eq!(&written.data[..base.len()], &base[..]);

    let reread = PdfDocument::from_bytes(written.data).unwrap();
    let page = reread.load_object(ObjectRef::new(3, 0)).unwrap();
    assert_eq!(page.as_dict().unwrap().get("Rotate").and_then(Object::as_integer), Some(90));
    let info = reread.load_object(info).unwrap();
    assert_eq!(
        info.as_dict().unwrap().get("Producer").and_then(Object::as_string),
        Some(&b"deferred"[..])
    );
    // Untouched objects still come from the object stream
    assert!(reread.load_object(ObjectRef::new(2, 0)).is_ok());
}

#[test]
fn test_parse_object_stream_strings() {
    let pairs = b"30 0 31 13 ";
    let data = [&pairs[..], &b"(Hello World) <48656C6C6F>"[..]].concat();
    let result = parse_object_stream(&object_stream(2, pairs.len() as i64, &data)).unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result[&30].as_string(), Some(&b"Hello World"[..]));
    assert_eq!(result[&31].as_string(), Some(&b"Hello"[..]));
}

#[test]
fn test_parse_object_stream_nested_and_references() {
    let pairs = b"40 0 41 49 ";
    let data = [&pairs[..], &b"<< /Array [ 1 [ 2 3 ] ] /Dict << /Nested 7 >> >> [ 10 0 R 20 0 R ]"[..]].concat();
    let result = parse_object_stream(&object_stream(2, pairs.len() as i64, &data)).unwrap();

    let dict = result[&40].as_dict().unwrap();
    assert_eq!(dict["Array"].as_array().unwrap().len(), 2);
    assert_eq!(dict["Dict"].as_dict().unwrap()["Nested"].as_integer(), Some(7));

    let refs = result[&41].as_array().unwrap();
    assert_eq!(refs[0].as_reference(), Some(ObjectRef::new(10, 0)));
    assert_eq!(refs[1].as_reference(), Some(ObjectRef::new(20, 0)));
}

#[test]
fn test_parse_object_stream_rejects_bad_headers() {
    assert!(parse_object_stream(&Object::Integer(42)).is_err());
    assert!(parse_object_stream(&object_stream(-1, 5, b"1 0 42")).is_err());
    assert!(parse_object_stream(&object_stream(2_000_000, 5, b"1 0 42")).is_err());
    assert!(parse_object_stream(&object_stream(1, 1000, b"1 0 42")).is_err());
    assert!(parse_object_stream(&object_stream(0, 0, b"")).unwrap().is_empty());
}
