//! Basic valuepack usage: plan a schema, work on packed records, marshal one

use std::io::Cursor;

use valuepack::{
    FieldSchema, HeapBytes, PackedRecord, RecordSchema, RecordValue, Result, SchemaDef, Supports,
    Value,
};

fn main() -> Result<()> {
    env_logger::init();

    println!("Valuepack basic usage");
    println!("=====================");

    let def = SchemaDef::new("Sensor")
        .field(FieldSchema::ranged("channel", 0, 15))
        .field(FieldSchema::boolean("online").with_offset_alignment(0))
        .field(FieldSchema::enumeration("unit", ["celsius", "kelvin"], false))
        .field(FieldSchema::float32("reading"))
        .field(FieldSchema::int("samples", 64).with_supports(Supports::ATOMIC_ADD))
        .field(FieldSchema::text("label", 11, true));
    let schema = RecordSchema::plan(&def)?;

    println!("\n{}", schema);
    println!(
        "size {} bytes, alignment {}, stride {}",
        schema.size_in_bytes(),
        schema.recommended_alignment(),
        schema.stride()
    );

    // Three records back to back, each starting on the schema's alignment
    let store = HeapBytes::for_records(&schema, 3);
    for index in 0..3 {
        let sensor = PackedRecord::at_index(&store, index, schema.clone())?;
        sensor.set("channel", index as i64)?;
        sensor.set("online", index != 1)?;
        sensor.field("unit")?.set_enum_name("kelvin")?;
        sensor.set("reading", 273.5f32 + index as f32)?;
        sensor.set("label", format!("sensor-{}", index))?;
        sensor.field("samples")?.atomic_add(10 * (index as i64 + 1))?;
    }

    let second = PackedRecord::at_index(&store, 1, schema.clone())?;
    let samples = second.field("samples")?.atomic_add(5i64)?;
    println!("\nrecord 1 after adding 5 samples: {}", samples);
    println!("record 1: {}", second);

    let mut wire = Vec::new();
    second.write_to(&mut wire)?;
    println!("\nmarshalled record 1 into {} bytes", wire.len());

    let copy = RecordValue::read_from(&schema, &mut Cursor::new(&wire))?;
    assert_eq!(copy.get("samples")?, &Value::Int(25));
    println!("unmarshalled: {}", copy);

    Ok(())
}
