//! Compact stream encoding of records
//!
//! Fields are written in schema order with no framing:
//!
//! | Kind     | Encoding                                     |
//! |----------|----------------------------------------------|
//! | integer  | zig-zag stop-bit                             |
//! | bool     | one byte, 0 or 1                             |
//! | float    | raw IEEE bits, little-endian                 |
//! | enum     | stop-bit `ordinal + 1`, 0 for absent         |
//! | text     | stop-bit `len + 1`, 0 for absent, then bytes |
//! | pointer  | 8 bytes little-endian, 0 for null            |
//! | nested   | the sub-record's fields                      |
//! | array    | each element                                 |
//!
//! Everything read back goes through the same checks as a field write.

use std::{
    io::{Read, Write},
    sync::Arc,
};

use super::RecordValue;
use crate::{
    codec::{
        stop_bit::{read_stop_bit, unzigzag, write_stop_bit, zigzag},
        FieldCodec, Value,
    },
    error::{PackError, Result},
    schema::RecordSchema,
};

/// Marshal every field of `record`
pub fn write_record<W: Write + ?Sized>(record: &RecordValue, w: &mut W) -> Result<()> {
    for (field, value) in record.schema().fields().iter().zip(record.values()) {
        write_value(&field.codec, value, w)?;
    }
    Ok(())
}

/// Unmarshal a record of `schema`
pub fn read_record<R: Read + ?Sized>(schema: &Arc<RecordSchema>, r: &mut R) -> Result<RecordValue> {
    let values = schema
        .fields()
        .iter()
        .map(|field| read_value(&field.codec, r))
        .collect::<Result<Vec<_>>>()?;
    Ok(RecordValue::from_values(schema.clone(), values))
}

fn write_value<W: Write + ?Sized>(codec: &FieldCodec, value: &Value, w: &mut W) -> Result<()> {
    match (codec, value) {
        (FieldCodec::Int(_), Value::Int(v)) => write_stop_bit(w, zigzag(*v)),
        (FieldCodec::Bool(_), Value::Bool(v)) => Ok(w.write_all(&[*v as u8])?),
        (FieldCodec::Float(_), Value::Float32(v)) => Ok(w.write_all(&v.to_bits().to_le_bytes())?),
        (FieldCodec::Float(_), Value::Float64(v)) => Ok(w.write_all(&v.to_bits().to_le_bytes())?),
        (FieldCodec::Enum(_), Value::Enum(ordinal)) => {
            write_stop_bit(w, ordinal.map_or(0, |o| o as u64 + 1))
        }
        (FieldCodec::Text(_), Value::Text(None)) => write_stop_bit(w, 0),
        (FieldCodec::Text(_), Value::Text(Some(text))) => {
            write_stop_bit(w, text.len() as u64 + 1)?;
            Ok(w.write_all(text.as_bytes())?)
        }
        (FieldCodec::Pointer(_), Value::Pointer(address)) => {
            Ok(w.write_all(&address.unwrap_or(0).to_le_bytes())?)
        }
        (FieldCodec::Nested(_), Value::Record(record)) => write_record(record, w),
        (FieldCodec::Array(c), Value::Array(items)) => items
            .iter()
            .try_for_each(|item| write_value(c.element(), item, w)),
        _ => Err(PackError::type_error(
            codec.field(),
            format!("cannot marshal {} value as {}", value.kind_name(), codec.kind_name()),
        )),
    }
}

fn read_array<const N: usize, R: Read + ?Sized>(r: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_value<R: Read + ?Sized>(codec: &FieldCodec, r: &mut R) -> Result<Value> {
    let value = match codec {
        FieldCodec::Int(c) => Value::Int(c.check(unzigzag(read_stop_bit(r)?) as i128)?),
        FieldCodec::Bool(c) => match read_array::<1, _>(r)?[0] {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            other => {
                return Err(PackError::corrupted(
                    c.field(),
                    format!("boolean byte {:#04x}", other),
                ))
            }
        },
        FieldCodec::Float(c) if c.width() == 32 => {
            Value::Float32(f32::from_bits(u32::from_le_bytes(read_array(r)?)))
        }
        FieldCodec::Float(_) => Value::Float64(f64::from_bits(u64::from_le_bytes(read_array(r)?))),
        FieldCodec::Enum(c) => {
            let raw = read_stop_bit(r)?;
            let ordinal = match raw {
                0 => None,
                n => Some(u32::try_from(n - 1).map_err(|_| {
                    PackError::corrupted(c.field(), format!("ordinal {} out of range", n - 1))
                })?),
            };
            c.to_ordinal(ordinal)?;
            Value::Enum(ordinal)
        }
        FieldCodec::Text(c) => match read_stop_bit(r)? {
            0 => {
                c.check(None)?;
                Value::Text(None)
            }
            n => {
                let len = n - 1;
                // Checked before allocating so a bad prefix cannot ask for gigabytes
                if len > c.max_bytes() as u64 {
                    return Err(PackError::length(c.field(), len as usize, c.max_bytes()));
                }
                let mut bytes = vec![0u8; len as usize];
                r.read_exact(&mut bytes)?;
                let text = String::from_utf8(bytes)
                    .map_err(|e| PackError::corrupted(c.field(), e.to_string()))?;
                Value::Text(Some(text))
            }
        },
        FieldCodec::Pointer(_) => {
            let address = u64::from_le_bytes(read_array(r)?);
            Value::Pointer((address != 0).then_some(address))
        }
        FieldCodec::Nested(c) => Value::Record(Box::new(read_record(c.schema(), r)?)),
        FieldCodec::Array(c) => Value::Array(
            (0..c.len())
                .map(|_| read_value(c.element(), r))
                .collect::<Result<Vec<_>>>()?,
        ),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSchema, SchemaDef};

    fn schema() -> Arc<RecordSchema> {
        let def = SchemaDef::new("Sample")
            .field(FieldSchema::ranged("delta", -5, 10))
            .field(FieldSchema::boolean("flag").with_offset_alignment(0))
            .field(FieldSchema::enumeration("state", ["A", "B", "C"], true))
            .field(FieldSchema::text("label", 5, true));
        RecordSchema::plan(&def).unwrap()
    }

    #[test]
    fn test_encoding_is_compact() {
        let mut record = RecordValue::new(schema());
        record.set("delta", -1i64).unwrap();
        record.set("flag", true).unwrap();
        record.set("state", Value::Enum(Some(2))).unwrap();
        record.set("label", "hi").unwrap();

        let mut buf = Vec::new();
        write_record(&record, &mut buf).unwrap();
        assert_eq!(buf, vec![0x01, 0x01, 0x03, 0x03, b'h', b'i']);

        let back = read_record(record.schema(), &mut buf.as_slice()).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_bad_input_is_rejected() {
        let schema = schema();
        // delta = 11 is outside [-5, 10]
        let err = read_record(&schema, &mut [22u8, 0, 0, 0].as_slice()).unwrap_err();
        assert!(matches!(err, PackError::Range { .. }));

        let err = read_record(&schema, &mut [0u8, 2, 0, 0].as_slice()).unwrap_err();
        assert!(matches!(err, PackError::Corrupted { .. }));

        // label claims 6 bytes
        let err = read_record(&schema, &mut [0u8, 0, 0, 7].as_slice()).unwrap_err();
        assert!(matches!(err, PackError::Length { .. }));

        let err = read_record(&schema, &mut [0u8, 0].as_slice()).unwrap_err();
        assert!(matches!(err, PackError::Io { .. }));
    }
}
