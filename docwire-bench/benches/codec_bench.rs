//! Document decoding/encoding benchmarks.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use docwire_bson::{
    encode_document, AllocationStrategy, Array, DateTime, Document, DocumentDecoder, ObjectId,
    PoolPolicyKind, StringPool, Value,
};
use std::sync::Arc;

fn create_test_document(items: usize) -> Document {
    let tags: Array = (0..8).map(|i| Value::from(format!("tag-{}", i % 3))).collect();
    let lines: Array = (0..items)
        .map(|i| {
            Value::from(
                Document::builder()
                    .append("sku", format!("SKU-{:06}", i))
                    .append("status", "pending")
                    .append("qty", i as i32)
                    .append("price", i as f64 * 1.25)
                    .build(),
            )
        })
        .collect();

    Document::builder()
        .append("_id", ObjectId([7; 12]))
        .append("customer", "customer-12345")
        .append("created", DateTime::from_millis(1_700_000_000_000))
        .append("tags", tags)
        .append("lines", lines)
        .build()
}

const STRATEGIES: [(&str, AllocationStrategy); 3] = [
    ("copy", AllocationStrategy::Copy),
    ("borrow", AllocationStrategy::Borrow),
    ("borrow_values", AllocationStrategy::BorrowValues),
];

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("document_decode");

    for items in [1, 10, 100] {
        let encoded = Bytes::from(encode_document(&create_test_document(items)).unwrap().freeze());
        group.throughput(Throughput::Bytes(encoded.len() as u64));

        for (name, strategy) in STRATEGIES {
            let decoder = DocumentDecoder::default();
            group.bench_with_input(BenchmarkId::new(name, items), &encoded, |b, encoded| {
                b.iter(|| black_box(decoder.decode(encoded, strategy).unwrap()));
            });
        }
    }

    group.finish();
}

fn bench_decode_pool_policy(c: &mut Criterion) {
    let mut group = c.benchmark_group("document_decode_pool");
    let encoded = Bytes::from(encode_document(&create_test_document(50)).unwrap().freeze());

    for (name, kind) in [
        ("never", PoolPolicyKind::Never),
        ("only_likely", PoolPolicyKind::OnlyLikely),
        ("always", PoolPolicyKind::Always),
    ] {
        let decoder = DocumentDecoder::new(Arc::new(StringPool::with_kind(kind)));
        group.bench_function(name, |b| {
            b.iter(|| black_box(decoder.decode(&encoded, AllocationStrategy::Copy).unwrap()));
        });
    }

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("document_encode");

    for items in [1, 10, 100] {
        let doc = create_test_document(items);
        let size = encode_document(&doc).unwrap().len();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(items), &doc, |b, doc| {
            b.iter(|| black_box(encode_document(doc).unwrap()));
        });
    }

    group.finish();
}

fn bench_into_owned(c: &mut Criterion) {
    let encoded = Bytes::from(encode_document(&create_test_document(10)).unwrap().freeze());
    let decoder = DocumentDecoder::default();
    let borrowed = decoder.decode(&encoded, AllocationStrategy::Borrow).unwrap();

    c.bench_function("document_into_owned", |b| {
        b.iter(|| black_box(borrowed.clone().into_owned()));
    });
}

criterion_group!(
    benches,
    bench_decode,
    bench_decode_pool_policy,
    bench_encode,
    bench_into_owned
);
criterion_main!(benches);
