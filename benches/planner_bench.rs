use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use valuepack::{
    FieldKind, FieldSchema, HoleOrder, LayoutItem, LayoutPlanner, PlannerConfig, SchemaCache,
    SchemaDef, Supports,
};

fn wide_schema(fields: usize) -> SchemaDef {
    (0..fields).fold(SchemaDef::new("Wide"), |def, i| {
        let name = format!("f{}", i);
        let field = match i % 6 {
            0 => FieldSchema::int(name, 64).with_supports(Supports::ATOMIC_ADD),
            1 => FieldSchema::boolean(name).with_offset_alignment(0),
            2 => FieldSchema::uint(name, 1 + (i as u32 % 31)),
            3 => FieldSchema::text(name, 7, true),
            4 => FieldSchema::enumeration(name, ["a", "b", "c"], true),
            _ => FieldSchema::array(name, FieldKind::SignedInt, 3).with_bit_width(5),
        };
        def.field(field)
    })
}

fn benchmark_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("LayoutPlanner");

    for fields in [8, 32, 128].iter() {
        let def = wide_schema(*fields);
        group.bench_with_input(BenchmarkId::new("plan", fields), &def, |b, def| {
            let planner = LayoutPlanner::default();
            b.iter(|| planner.plan(def).unwrap());
        });
    }

    group.finish();
}

fn benchmark_hole_orders(c: &mut Criterion) {
    let mut group = c.benchmark_group("HoleOrder");

    // Odd widths leave plenty of holes to fill
    let items: Vec<LayoutItem> = (0..256u32)
        .map(|i| LayoutItem::new(format!("i{}", i), 1 + (i * 7) % 40, 0, 0))
        .collect();

    for order in [
        HoleOrder::SmallestFirst,
        HoleOrder::LargestFirst,
        HoleOrder::LowestOffset,
    ]
    .iter()
    {
        let planner =
            LayoutPlanner::new(PlannerConfig::default().with_hole_order(*order)).unwrap();
        group.bench_with_input(
            BenchmarkId::new("place", format!("{:?}", order)),
            &items,
            |b, items| {
                b.iter(|| planner.place("Items", items).unwrap());
            },
        );
    }

    group.finish();
}

fn benchmark_schema_cache(c: &mut Criterion) {
    let def = wide_schema(64);
    let cache = SchemaCache::new(LayoutPlanner::default());
    cache.get_or_plan(&def).unwrap();

    c.bench_function("SchemaCache/hit", |b| {
        b.iter(|| cache.get_or_plan(&def).unwrap());
    });
}

criterion_group!(
    benches,
    benchmark_plan,
    benchmark_hole_orders,
    benchmark_schema_cache
);
criterion_main!(benches);
