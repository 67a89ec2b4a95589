//! Field codec tests through packed records
//! Covers range checks, bounded text, arrays, nullable enums, nested records and pointers

use std::sync::Arc;

use valuepack::{
    FieldKind, FieldSchema, HeapBytes, PackError, PackedRecord, RecordSchema, RecordValue,
    SchemaDef, Supports, Value,
};

fn plan(def: SchemaDef) -> Arc<RecordSchema> {
    RecordSchema::plan(&def).unwrap()
}

#[cfg(test)]
mod field_codec_tests {
    use super::*;

    /// Test: ranged integer round trip and range rejection
    #[test]
    fn test_ranged_int_round_trip() {
        let schema = plan(SchemaDef::new("Ranged").field(FieldSchema::ranged("v", -5, 10)));
        let store = HeapBytes::new(schema.size_in_bytes() as usize);
        let rec = PackedRecord::new(&store, 0, schema).unwrap();

        rec.set("v", 7).unwrap();
        assert_eq!(rec.get("v").unwrap(), Value::Int(7));

        let err = rec.set("v", 11).unwrap_err();
        assert!(matches!(err, PackError::Range { value: 11, min: -5, max: 10, .. }));
        // The failed write left the old value
        assert_eq!(rec.get("v").unwrap(), Value::Int(7));

        rec.set("v", -5).unwrap();
        assert_eq!(rec.get("v").unwrap(), Value::Int(-5));
        assert!(rec.set("v", -6).is_err());
    }

    /// Test: bounded text limits and null handling
    #[test]
    fn test_bounded_text() {
        let schema = plan(
            SchemaDef::new("Texts")
                .field(FieldSchema::text("name", 5, false))
                .field(FieldSchema::text("nick", 5, true)),
        );
        let store = HeapBytes::new(schema.size_in_bytes() as usize);
        let rec = PackedRecord::new(&store, 0, schema).unwrap();

        rec.set("name", "hello").unwrap();
        assert_eq!(rec.get("name").unwrap().as_str(), Some("hello"));
        assert!(matches!(
            rec.set("name", "hello!"),
            Err(PackError::Length { actual: 6, max: 5, .. })
        ));
        assert!(matches!(
            rec.set("name", Value::null_text()),
            Err(PackError::Nullability { .. })
        ));

        rec.set("nick", Value::null_text()).unwrap();
        assert_eq!(rec.get("nick").unwrap(), Value::Text(None));
        rec.set("nick", "").unwrap();
        assert_eq!(rec.get("nick").unwrap(), Value::Text(Some(String::new())));
        assert_ne!(Value::Text(None), Value::Text(Some(String::new())));

        // Multi-byte characters count by bytes
        assert!(rec.set("nick", "ééé").is_err());
        rec.set("nick", "éé").unwrap();
        assert_eq!(rec.get("nick").unwrap().as_str(), Some("éé"));
    }

    /// Test: array indices and element placement
    #[test]
    fn test_array_indexing() {
        let schema = plan(
            SchemaDef::new("Arrays")
                .field(FieldSchema::array("nums", FieldKind::SignedInt, 4).with_bit_width(12))
                .field(FieldSchema::boolean("flag").with_offset_alignment(0)),
        );
        let store = HeapBytes::new(schema.size_in_bytes() as usize);
        let rec = PackedRecord::new(&store, 0, schema.clone()).unwrap();
        let nums = rec.field("nums").unwrap();

        assert!(matches!(nums.at(4), Err(PackError::Index { index: 4, length: 4, .. })));
        assert!(matches!(nums.at(-1), Err(PackError::Index { index: -1, .. })));

        let width = 12;
        for i in 0..3 {
            let a = nums.at(i).unwrap().bit_position();
            let b = nums.at(i + 1).unwrap().bit_position();
            assert!(a + width <= b, "element {} overlaps element {}", i, i + 1);
        }

        for (i, v) in [-2048i64, -1, 0, 2047].iter().enumerate() {
            nums.at(i as i64).unwrap().set(*v).unwrap();
        }
        rec.set("flag", true).unwrap();
        assert_eq!(
            rec.get("nums").unwrap(),
            Value::Array(vec![Value::Int(-2048), Value::Int(-1), Value::Int(0), Value::Int(2047)])
        );
        assert!(nums.at(0).unwrap().set(2048).is_err());

        // Whole-array writes must have the declared length
        let short = Value::Array(vec![Value::Int(1); 3]);
        assert!(matches!(rec.set("nums", short), Err(PackError::Type { .. })));
        rec.set("nums", Value::Array(vec![Value::Int(5); 4])).unwrap();
        assert_eq!(nums.at(3).unwrap().get().unwrap(), Value::Int(5));
        assert_eq!(rec.get("flag").unwrap(), Value::Bool(true));
    }

    /// Test: nullable enum ordinals
    #[test]
    fn test_nullable_enum() {
        let schema = plan(
            SchemaDef::new("Enums")
                .field(FieldSchema::enumeration("color", ["red", "green", "blue"], true))
                .field(FieldSchema::enumeration("size", ["s", "m"], false)),
        );
        let store = HeapBytes::new(schema.size_in_bytes() as usize);
        let rec = PackedRecord::new(&store, 0, schema.clone()).unwrap();

        let (min, max) = match &schema.require("color").unwrap().codec {
            valuepack::FieldCodec::Enum(c) => (c.int().range().min, c.int().range().max),
            other => panic!("unexpected codec {:?}", other),
        };
        assert_eq!((min, max), (-1, 2));

        rec.set("color", Value::Enum(None)).unwrap();
        assert_eq!(rec.get("color").unwrap(), Value::Enum(None));
        assert_eq!(rec.field("color").unwrap().enum_name().unwrap(), None);

        rec.set("color", Value::Enum(Some(2))).unwrap();
        assert_eq!(rec.field("color").unwrap().enum_name().unwrap(), Some("blue"));
        assert!(matches!(
            rec.set("color", Value::Enum(Some(3))),
            Err(PackError::Range { .. })
        ));

        // A zeroed non-nullable enum reads its first constant
        assert_eq!(rec.get("size").unwrap(), Value::Enum(Some(0)));
        assert!(matches!(
            rec.set("size", Value::Enum(None)),
            Err(PackError::Nullability { .. })
        ));
    }

    /// Test: nested record values and packed views
    #[test]
    fn test_nested_records() {
        let point = SchemaDef::new("Point")
            .field(FieldSchema::int("x", 32))
            .field(FieldSchema::int("y", 32))
            .shared();
        let schema = plan(
            SchemaDef::new("Line")
                .field(FieldSchema::nested("from", point.clone()))
                .field(FieldSchema::nested("to", point.clone()))
                .field(FieldSchema::boolean("dashed").with_offset_alignment(0)),
        );
        let point_schema = plan((*point).clone());
        let store = HeapBytes::new(schema.size_in_bytes() as usize);
        let line = PackedRecord::new(&store, 0, schema).unwrap();

        let mut to = RecordValue::new(point_schema.clone());
        to.set("x", 3).unwrap();
        to.set("y", -4).unwrap();
        line.set("to", to.clone()).unwrap();
        assert_eq!(line.get("to").unwrap(), Value::Record(Box::new(to)));

        let from = line.field("from").unwrap().record().unwrap();
        from.set("x", 1).unwrap();
        assert_eq!(line.to_value().unwrap().to_string(), "Line { from: Point { x: 1, y: 0 }, to: Point { x: 3, y: -4 }, dashed: false }");

        // A record of another schema is rejected
        let other = plan(SchemaDef::new("Other").field(FieldSchema::int("x", 32)));
        let err = line.set("to", RecordValue::new(other)).unwrap_err();
        assert!(matches!(err, PackError::Type { .. }));

        // Copying a packed record into a nested field is a byte copy
        let scratch = HeapBytes::new(point_schema.size_in_bytes() as usize);
        let p = PackedRecord::new(&scratch, 0, point_schema).unwrap();
        p.set("y", 99).unwrap();
        line.field("from").unwrap().set_record(&p).unwrap();
        assert_eq!(from.get("x").unwrap(), Value::Int(0));
        assert_eq!(from.get("y").unwrap(), Value::Int(99));
    }

    /// Test: pointers between records of one store
    #[test]
    fn test_linked_records() {
        let node = SchemaDef::new("Node")
            .field(FieldSchema::int("value", 32))
            .shared();
        let list = plan(
            SchemaDef::new("List")
                .field(FieldSchema::pointer("head", node.clone()).with_supports(Supports::CAS)),
        );
        let node_schema = plan((*node).clone());
        let list_size = list.size_in_bytes() as usize;
        let node_size = node_schema.size_in_bytes() as usize;
        let store = HeapBytes::new(list_size + 2 * node_size);

        let head = PackedRecord::new(&store, 0, list).unwrap();
        let a = PackedRecord::new(&store, list_size, node_schema.clone()).unwrap();
        let b = PackedRecord::new(&store, list_size + node_size, node_schema).unwrap();
        a.set("value", 10).unwrap();
        b.set("value", 20).unwrap();

        let field = head.field("head").unwrap();
        assert_eq!(field.get().unwrap(), Value::Pointer(None));
        assert!(field
            .compare_and_swap(Value::Pointer(None), Value::Pointer(Some(a.address())))
            .unwrap());
        assert!(!field
            .compare_and_swap(Value::Pointer(None), Value::Pointer(Some(b.address())))
            .unwrap());
        assert_eq!(field.target().unwrap().unwrap().get("value").unwrap(), Value::Int(10));

        field.set_target(Some(&b)).unwrap();
        assert_eq!(field.target().unwrap().unwrap().get("value").unwrap(), Value::Int(20));
        field.set_target(None).unwrap();
        assert!(field.target().unwrap().is_none());

        // Addresses outside the store cannot be followed
        let elsewhere = HeapBytes::new(node_size);
        let c = PackedRecord::new(&elsewhere, 0, b.schema().clone()).unwrap();
        field.set_target(Some(&c)).unwrap();
        assert!(matches!(field.target(), Err(PackError::InvalidParameter { .. })));
    }

    /// Test: access modes the field did not declare are refused
    #[test]
    fn test_undeclared_access_modes() {
        let schema = plan(
            SchemaDef::new("Modes")
                .field(FieldSchema::int("plain", 32))
                .field(FieldSchema::text("label", 8, false))
                .field(FieldSchema::int("counter", 32).with_supports(Supports::ADD)),
        );
        let store = HeapBytes::new(schema.size_in_bytes() as usize);
        let rec = PackedRecord::new(&store, 0, schema).unwrap();

        let plain = rec.field("plain").unwrap();
        assert!(matches!(plain.set_volatile(1), Err(PackError::UnsupportedAccess { .. })));
        assert!(matches!(plain.get_volatile(), Err(PackError::UnsupportedAccess { .. })));
        assert!(matches!(plain.compare_and_swap(0, 1), Err(PackError::UnsupportedAccess { .. })));
        assert!(matches!(plain.add(1), Err(PackError::UnsupportedAccess { .. })));

        let label = rec.field("label").unwrap();
        assert!(matches!(
            label.compare_and_swap("a", "b"),
            Err(PackError::UnsupportedAccess { .. })
        ));

        let counter = rec.field("counter").unwrap();
        assert_eq!(counter.add(5).unwrap(), Value::Int(5));
        assert_eq!(counter.add(-7).unwrap(), Value::Int(-2));
        assert!(matches!(counter.atomic_add(1), Err(PackError::UnsupportedAccess { .. })));
    }

    /// Test: schemas round trip through JSON and plan identically
    #[test]
    fn test_schema_json_round_trip() {
        let def = SchemaDef::new("Sensor")
            .field(FieldSchema::int("id", 16))
            .field(FieldSchema::float32("reading").with_supports(Supports::VOLATILE))
            .field(FieldSchema::enumeration("status", ["ok", "warn", "fail"], false))
            .field(FieldSchema::array("history", FieldKind::Float32, 4));
        let json = def.to_json().unwrap();
        let back = SchemaDef::from_json(&json).unwrap();
        assert_eq!(back, def);

        let a = RecordSchema::plan(&def).unwrap();
        let b = RecordSchema::plan(&back).unwrap();
        assert_eq!(*a, *b);
        assert_eq!(a.layout_report().fields.len(), 4);
    }
}
