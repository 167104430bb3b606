//! Benchmarks for the two signing phases.
//!
//! - `prepare`: gap reservation plus digests, by document size
//! - `inject`: container assembly and gap filling
//! - `verify`: self-verification of a signed document

#![allow(missing_docs)]

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pdf_deferred_signer::config::SignerConfig;
use pdf_deferred_signer::session::SigningSession;
use pdf_deferred_signer::signatures::{inject, prepare, CertificateChain, SignatureVerifier};
use pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};

const CHAIN_PEM: [&str; 3] = [
    include_str!("../tests/fixtures/leaf.pem"),
    include_str!("../tests/fixtures/intermediate.pem"),
    include_str!("../tests/fixtures/root.pem"),
];
const LEAF_KEY_PEM: &str = include_str!("../tests/fixtures/leaf_key.pem");

fn session() -> SigningSession {
    let chain = CertificateChain::from_pem(CHAIN_PEM.concat().as_bytes()).expect("fixture chain");
    SigningSession::new(chain, SignerConfig::default()).expect("session")
}

/// Single-page PDF padded with a content stream of `padding` bytes.
fn document(padding: usize) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", "x".repeat(padding));
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
    data.extend_from_slice(b"xref\n0 5\n0000000000 65535 f \n");
    for offset in offsets {
        data.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    data.extend_from_slice(format!("trailer\n<< /Size 5 /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n", xref).as_bytes());
    data
}

fn bench_prepare(c: &mut Criterion) {
    let session = session();
    let time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut group = c.benchmark_group("prepare");

    for size in [1_000usize, 100_000, 1_000_000] {
        let pdf = document(size);
        group.throughput(Throughput::Bytes(pdf.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &pdf, |b, pdf| {
            b.iter(|| prepare(&session, black_box(pdf), time).expect("prepare"));
        });
    }
    group.finish();
}

fn bench_inject_and_verify(c: &mut Criterion) {
    let session = session();
    let time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let key = RsaPrivateKey::from_pkcs8_pem(LEAF_KEY_PEM).expect("fixture key");

    let prepared = prepare(&session, &document(10_000), time).expect("prepare");
    let signature = key
        .sign(Pkcs1v15Sign::new_unprefixed(), &prepared.digests.signable_hash)
        .expect("sign");

    c.bench_function("inject", |b| {
        b.iter(|| {
            inject(
                &session,
                black_box(prepared.data.clone()),
                &signature,
                &prepared.digests,
                time,
            )
            .expect("inject")
        });
    });

    let signed = inject(&session, prepared.data.clone(), &signature, &prepared.digests, time).expect("inject");
    let mut verifier = SignatureVerifier::new();
    verifier.add_trusted_roots(session.chain().der().to_vec());
    c.bench_function("verify", |b| {
        b.iter(|| verifier.verify_field(black_box(&signed), "Signature1").expect("verify"));
    });
}

criterion_group!(benches, bench_prepare, bench_inject_and_verify);
criterion_main!(benches);
