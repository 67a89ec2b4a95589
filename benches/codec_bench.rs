use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::{sync::Arc, thread};
use valuepack::{
    FieldSchema, HeapBytes, PackedRecord, RecordSchema, RecordValue, SchemaDef, Supports, Value,
};

fn sample_schema() -> Arc<RecordSchema> {
    let def = SchemaDef::new("Tick")
        .field(FieldSchema::int("seq", 64).with_supports(Supports::ATOMIC_ADD | Supports::CAS))
        .field(FieldSchema::ranged("level", -500, 500))
        .field(FieldSchema::float64("price").with_supports(Supports::VOLATILE))
        .field(FieldSchema::boolean("live").with_offset_alignment(0))
        .field(FieldSchema::enumeration("side", ["bid", "ask"], false))
        .field(FieldSchema::text("venue", 8, true));
    RecordSchema::plan(&def).unwrap()
}

fn benchmark_field_access(c: &mut Criterion) {
    let schema = sample_schema();
    let store = HeapBytes::new(schema.size_in_bytes() as usize);
    let rec = PackedRecord::new(&store, 0, schema).unwrap();
    let level = rec.field("level").unwrap();
    let price = rec.field("price").unwrap();
    let seq = rec.field("seq").unwrap();

    let mut group = c.benchmark_group("FieldAccess");
    group.throughput(Throughput::Elements(1));

    group.bench_function("ranged_set_get", |b| {
        let mut v = 0i64;
        b.iter(|| {
            v = (v + 1) % 500;
            level.set(v).unwrap();
            level.get().unwrap()
        });
    });

    group.bench_function("float_volatile", |b| {
        b.iter(|| {
            price.set_volatile(1.25f64).unwrap();
            price.get_volatile().unwrap()
        });
    });

    group.bench_function("atomic_add", |b| {
        b.iter(|| seq.atomic_add(1i64).unwrap());
    });

    group.bench_function("compare_and_swap", |b| {
        b.iter(|| {
            let current = seq.get().unwrap();
            seq.compare_and_swap(current, Value::Int(0)).unwrap()
        });
    });

    group.finish();
}

fn benchmark_contended_add(c: &mut Criterion) {
    let schema = sample_schema();
    let store = Arc::new(HeapBytes::new(schema.size_in_bytes() as usize));

    c.bench_function("FieldAccess/contended_atomic_add_4x1000", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let store = store.clone();
                    let schema = schema.clone();
                    thread::spawn(move || {
                        let rec = PackedRecord::new(&*store, 0, schema).unwrap();
                        let seq = rec.field("seq").unwrap();
                        for _ in 0..1000 {
                            seq.atomic_add(1i64).unwrap();
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
        });
    });
}

fn benchmark_marshalling(c: &mut Criterion) {
    let schema = sample_schema();
    let mut value = RecordValue::new(schema.clone());
    value.set("seq", 123_456_789i64).unwrap();
    value.set("level", -42i64).unwrap();
    value.set("price", 101.5f64).unwrap();
    value.set("live", true).unwrap();
    value.set("venue", "XNAS").unwrap();

    let mut encoded = Vec::new();
    value.write_to(&mut encoded).unwrap();

    let mut group = c.benchmark_group("Marshalling");
    group.throughput(Throughput::Bytes(encoded.len() as u64));

    group.bench_function("write", |b| {
        let mut buf = Vec::with_capacity(64);
        b.iter(|| {
            buf.clear();
            value.write_to(&mut buf).unwrap();
        });
    });

    group.bench_function("read", |b| {
        b.iter(|| RecordValue::read_from(&schema, &mut encoded.as_slice()).unwrap());
    });

    let store = HeapBytes::new(schema.size_in_bytes() as usize);
    let packed = PackedRecord::new(&store, 0, schema.clone()).unwrap();
    group.bench_function("read_into_packed", |b| {
        b.iter(|| packed.read_from(&mut encoded.as_slice()).unwrap());
    });

    group.bench_function("hash", |b| {
        b.iter(|| value.hash_code());
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_field_access,
    benchmark_contended_add,
    benchmark_marshalling
);
criterion_main!(benches);
