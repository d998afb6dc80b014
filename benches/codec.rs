//! Benchmarks for the schema codec.
//!
//! Measures the three hot paths of the rewrite: integer packing, stream decoding and
//! model re-encoding, over a synthetic schema shaped like a large generated message.

#![allow(unused)]
extern crate protoshrink;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use protoshrink::prelude::*;
use protoshrink::schema::decoder::decode_schema;
use protoshrink::schema::encoder::encode_schema;
use protoshrink::schema::packed::{pack, PackedIntReader};

/// A message with 64 fields mixing the common kinds.
fn large_schema() -> ProtoMessageInfo {
    let kinds = [
        ProtoFieldKind::Int32,
        ProtoFieldKind::Int64,
        ProtoFieldKind::String,
        ProtoFieldKind::Message,
        ProtoFieldKind::Bool,
        ProtoFieldKind::MessageList,
        ProtoFieldKind::Int32List,
        ProtoFieldKind::Bytes,
    ];
    let fields = (0..64)
        .map(|i| {
            let kind = kinds[i % kinds.len()];
            let field_type = ProtoFieldType::new(kind, FieldTypeExtras::empty());
            let mut objects = vec![SchemaObject::field_name(&format!("field{i}_"))];
            if kind == ProtoFieldKind::MessageList {
                objects.push(SchemaObject::TypeLiteral(TypeRef::new(&format!(
                    "Lcom/example/Nested{i};"
                ))));
            }
            ProtoFieldInfo::new((i + 1) as i32, field_type, None, objects)
        })
        .collect();
    ProtoMessageInfo::new(0, vec![], vec![], fields)
}

fn bench_integer_packing(c: &mut Criterion) {
    let values: Vec<i32> = (0..1024)
        .map(|i| (i * 2654435761u64 as i64) as i32)
        .collect();
    let packed = pack(&values);

    let mut group = c.benchmark_group("packed_integers");
    group.throughput(Throughput::Elements(values.len() as u64));
    group.bench_function("pack", |b| {
        b.iter(|| black_box(pack(black_box(&values))));
    });
    group.bench_function("unpack", |b| {
        b.iter(|| {
            let mut reader = PackedIntReader::new(black_box(&packed));
            let mut sum = 0i64;
            while !reader.is_exhausted() {
                sum += i64::from(reader.next().unwrap());
            }
            black_box(sum)
        });
    });
    group.finish();
}

fn bench_schema_codec(c: &mut Criterion) {
    let schema = large_schema();
    let encoded = encode_schema(&schema);

    let mut group = c.benchmark_group("schema_codec");
    group.throughput(Throughput::Elements(schema.fields().len() as u64));
    group.bench_function("encode", |b| {
        b.iter(|| black_box(encode_schema(black_box(&schema))));
    });
    group.bench_function("decode", |b| {
        b.iter(|| {
            black_box(
                decode_schema(
                    black_box(encoded.info.as_slice()),
                    black_box(encoded.objects.clone()),
                )
                .unwrap(),
            )
        });
    });
    group.finish();
}

criterion_group!(benches, bench_integer_packing, bench_schema_codec);
criterion_main!(benches);
