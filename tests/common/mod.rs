//! Shared helpers for the integration tests.
#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::NaiveDate;
use pdf_deferred_signer::batch::SigningDocument;
use pdf_deferred_signer::signatures::CertificateChain;
use pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};

pub const LEAF_PEM: &str = include_str!("../fixtures/leaf.pem");
pub const INTERMEDIATE_PEM: &str = include_str!("../fixtures/intermediate.pem");
pub const ROOT_PEM: &str = include_str!("../fixtures/root.pem");
pub const LEAF_KEY_PEM: &str = include_str!("../fixtures/leaf_key.pem");
pub const INTERMEDIATE_CRL: &[u8] = include_bytes!("../fixtures/intermediate.crl");

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Leaf, intermediate and root.
pub fn full_chain() -> CertificateChain {
    chain_of(3)
}

/// The first `len` certificates of leaf → intermediate → root.
pub fn chain_of(len: usize) -> CertificateChain {
    let pem: String = [LEAF_PEM, INTERMEDIATE_PEM, ROOT_PEM][..len].concat();
    CertificateChain::from_pem(pem.as_bytes()).expect("fixture chain")
}

/// Plays the external key holder: raw RSA over the 51-byte DigestInfo.
pub fn external_sign(signable_hash: &[u8]) -> Vec<u8> {
    let key = RsaPrivateKey::from_pkcs8_pem(LEAF_KEY_PEM).expect("fixture key");
    key.sign(Pkcs1v15Sign::new_unprefixed(), signable_hash)
        .expect("raw RSA signature")
}

/// Base64 in, base64 out, as a remote signing service answers.
pub fn external_sign_base64(signable_hash: &str) -> String {
    let hash = BASE64.decode(signable_hash).expect("hash is base64");
    BASE64.encode(external_sign(&hash))
}

/// Single-page PDF with a classic cross-reference table.
pub fn classic_pdf(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
    let bodies = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>".to_string(),
        format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content),
    ];

    let mut data = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in bodies.iter().enumerate() {
        offsets.push(data.len());
        data.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref = data.len();
    data.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", bodies.len() + 1).as_bytes());
    for offset in offsets {
        data.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    data.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            bodies.len() + 1,
            xref
        )
        .as_bytes(),
    );
    data
}

/// Single-page PDF 1.5 whose catalog, page tree and page sit in an
/// object stream indexed by a cross-reference stream.
pub fn xref_stream_pdf() -> Vec<u8> {
    let members = [
        "<< /Type /Catalog /Pages 2 0 R >>",
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>",
    ];
    let mut header = String::new();
    let mut body = String::new();
    for (i, member) in members.iter().enumerate() {
        header.push_str(&format!("{} {} ", i + 1, body.len()));
        body.push_str(member);
        body.push(' ');
    }
    let objstm_data = format!("{}{}", header, body);

    let mut data = b"%PDF-1.5\n".to_vec();
    let objstm_offset = data.len();
    data.extend_from_slice(
        format!(
            "4 0 obj\n<< /Type /ObjStm /N {} /First {} /Length {} >>\nstream\n{}\nendstream\nendobj\n",
            members.len(),
            header.len(),
            objstm_data.len(),
            objstm_data
        )
        .as_bytes(),
    );

    let xref_offset = data.len();
    // W [1 2 1]: type, offset or stream number, generation or index
    let mut rows: Vec<[u8; 4]> = vec![[0, 0, 0, 255]];
    for index in 0..members.len() as u8 {
        rows.push([2, 0, 4, index]);
    }
    rows.push([1, (objstm_offset >> 8) as u8, objstm_offset as u8, 0]);
    rows.push([1, (xref_offset >> 8) as u8, xref_offset as u8, 0]);
    let stream: Vec<u8> = rows.concat();

    data.extend_from_slice(
        format!(
            "5 0 obj\n<< /Type /XRef /Size 6 /W [1 2 1] /Root 1 0 R /Length {} >>\nstream\n",
            stream.len()
        )
        .as_bytes(),
    );
    data.extend_from_slice(&stream);
    data.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());
    data
}

/// A batch record carrying `pdf`.
pub fn signing_document(id: i64, pdf: &[u8]) -> SigningDocument {
    SigningDocument {
        correlation_id: id.into(),
        application_code: "BILL".to_string(),
        company_code: "001".to_string(),
        document_type: "INV".to_string(),
        document_number: format!("A/{}", id),
        emission_date: NaiveDate::from_ymd_opt(2024, 5, 17)
            .expect("date")
            .and_hms_opt(9, 30, 0)
            .expect("time"),
        document_year: 2024,
        content: BASE64.encode(pdf),
    }
}

/// JPEG start with an APP0 segment and an SOF0 frame header; enough for
/// PDF embedding, which never decodes the scan data.
pub fn jpeg_header(width: u16, height: u16) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x04, b'J', b'F'];
    data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&[0x03, 0x01, 0x22, 0x00, 0x02, 0x11, 0x01, 0x03, 0x11, 0x01, 0xFF, 0xD9]);
    data
}

/// Leaf, `len - 2` copies of the intermediate, then the root: a chain
/// of any length whose certificates have realistic sizes.
pub fn long_chain(len: usize) -> CertificateChain {
    let fixtures = full_chain();
    let der = fixtures.der();
    let mut certs = vec![der[0].clone()];
    if len > 1 {
        certs.extend(std::iter::repeat(der[1].clone()).take(len - 2));
        certs.push(der[2].clone());
    }
    CertificateChain::from_der(certs).expect("repeated fixture chain")
}
