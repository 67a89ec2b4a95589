//! Concurrent stress tests for atomic field access
//! Tests focused on lost updates, bit-packed neighbours and publication ordering

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier,
    },
    thread,
};

use valuepack::{
    FieldSchema, HeapBytes, PackedRecord, RecordSchema, SchemaDef, Supports, Value,
};

fn plan(def: SchemaDef) -> Arc<RecordSchema> {
    RecordSchema::plan(&def).unwrap()
}

#[cfg(test)]
mod concurrent_stress_tests {
    use super::*;

    /// Test: CAS toggles on four booleans sharing one byte lose no updates
    #[test]
    fn stress_bit_packed_boolean_cas() {
        let names = ["a", "b", "c", "d"];
        let def = names.iter().fold(SchemaDef::new("Flags"), |def, &name| {
            def.field(
                FieldSchema::boolean(name)
                    .with_offset_alignment(0)
                    .with_supports(Supports::CAS),
            )
        });
        let schema = plan(def);
        assert_eq!(schema.size_in_bytes(), 1);

        let store = Arc::new(HeapBytes::new(schema.size_in_bytes() as usize));
        let threads_per_field = 2;
        let toggles_per_thread = 10_000;
        let barrier = Arc::new(Barrier::new(names.len() * threads_per_field));
        let successes: Arc<Vec<AtomicUsize>> =
            Arc::new(names.iter().map(|_| AtomicUsize::new(0)).collect());

        let mut handles = Vec::new();
        for (field_index, &name) in names.iter().enumerate() {
            for _ in 0..threads_per_field {
                let store = store.clone();
                let schema = schema.clone();
                let barrier = barrier.clone();
                let successes = successes.clone();

                handles.push(thread::spawn(move || {
                    let rec = PackedRecord::new(&*store, 0, schema).unwrap();
                    let field = rec.field(name).unwrap();
                    barrier.wait();

                    for _ in 0..toggles_per_thread {
                        let current = field.get_volatile().unwrap().as_bool().unwrap();
                        if field.compare_and_swap(current, !current).unwrap() {
                            successes[field_index].fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }));
            }
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let rec = PackedRecord::new(&*store, 0, schema).unwrap();
        for (i, &name) in names.iter().enumerate() {
            let count = successes[i].load(Ordering::Relaxed);
            assert!(count > 0, "field {} never toggled", name);
            assert_eq!(
                rec.get(name).unwrap(),
                Value::Bool(count % 2 == 1),
                "field {} after {} successful toggles",
                name,
                count
            );
        }
    }

    /// Test: atomic adds from many threads sum exactly
    #[test]
    fn stress_atomic_add_counters() {
        let schema = plan(
            SchemaDef::new("Counters")
                .field(FieldSchema::int("hits", 64).with_supports(Supports::ATOMIC_ADD))
                .field(FieldSchema::ranged("budget", 0, 1000).with_supports(Supports::ATOMIC_ADD))
                .field(FieldSchema::float64("total").with_supports(Supports::ATOMIC_ADD)),
        );
        let store = Arc::new(HeapBytes::new(schema.size_in_bytes() as usize));

        let thread_count = 4;
        let adds_per_thread = 200;
        let barrier = Arc::new(Barrier::new(thread_count));
        let mut handles = Vec::new();

        for _ in 0..thread_count {
            let store = store.clone();
            let schema = schema.clone();
            let barrier = barrier.clone();

            handles.push(thread::spawn(move || {
                let rec = PackedRecord::new(&*store, 0, schema).unwrap();
                let hits = rec.field("hits").unwrap();
                let budget = rec.field("budget").unwrap();
                let total = rec.field("total").unwrap();
                barrier.wait();

                for _ in 0..adds_per_thread {
                    hits.atomic_add(3i64).unwrap();
                    budget.atomic_add(1i64).unwrap();
                    total.atomic_add(0.5f64).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let rec = PackedRecord::new(&*store, 0, schema).unwrap();
        let n = (thread_count * adds_per_thread) as i64;
        assert_eq!(rec.get("hits").unwrap(), Value::Int(3 * n));
        assert_eq!(rec.get("budget").unwrap(), Value::Int(n));
        assert_eq!(rec.get("total").unwrap(), Value::Float64(n as f64 * 0.5));

        // The ranged field refuses to overshoot its maximum
        let budget = rec.field("budget").unwrap();
        assert!(budget.atomic_add(1000i64).is_err());
        assert_eq!(budget.get().unwrap(), Value::Int(n));
    }

    /// Test: an ordered flag publishes a plain payload written before it
    #[test]
    fn stress_ordered_publication() {
        let schema = plan(
            SchemaDef::new("Mailbox")
                .field(FieldSchema::int("payload", 64))
                .field(
                    FieldSchema::int("sequence", 32)
                        .with_supports(Supports::ORDERED | Supports::VOLATILE),
                ),
        );
        let store = Arc::new(HeapBytes::new(schema.size_in_bytes() as usize));
        let rounds = 2_000i64;

        let writer = {
            let store = store.clone();
            let schema = schema.clone();
            thread::spawn(move || {
                let rec = PackedRecord::new(&*store, 0, schema).unwrap();
                let payload = rec.field("payload").unwrap();
                let sequence = rec.field("sequence").unwrap();
                for round in 1..=rounds {
                    // Wait for the reader to acknowledge the previous round
                    while sequence.get_volatile().unwrap() != Value::Int(2 * (round - 1)) {
                        thread::yield_now();
                    }
                    payload.set(round * 7).unwrap();
                    sequence.set_ordered(2 * round - 1).unwrap();
                }
            })
        };

        let rec = PackedRecord::new(&*store, 0, schema).unwrap();
        let payload = rec.field("payload").unwrap();
        let sequence = rec.field("sequence").unwrap();
        for round in 1..=rounds {
            while sequence.get_volatile().unwrap() != Value::Int(2 * round - 1) {
                thread::yield_now();
            }
            assert_eq!(payload.get().unwrap(), Value::Int(round * 7));
            sequence.set_volatile(2 * round).unwrap();
        }
        writer.join().unwrap();
    }
}
