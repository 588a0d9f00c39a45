//! Gob encoder.

use std::collections::HashMap;

use super::{ids, GobError, GobRecord, StructType, Type, TypeId, Value};

// Field numbers inside the bootstrap `wireType` struct.
const WIRE_SLICE: i64 = 1;
const WIRE_STRUCT: i64 = 2;
const WIRE_MAP: i64 = 3;

/// Encodes records onto one gob stream.
///
/// Remembers which types were already defined so each definition is sent once.
#[derive(Debug)]
pub struct Encoder {
    ids: HashMap<Type, TypeId>,
    next_id: TypeId,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            ids: HashMap::new(),
            next_id: ids::FIRST_USER,
        }
    }

    /// Append `record` to `out`, preceded by any type definitions not yet sent.
    pub fn encode<T: GobRecord>(&mut self, record: &T, out: &mut Vec<u8>) -> Result<(), GobError> {
        self.encode_value(&T::gob_type(), &record.to_gob(), out)
    }

    /// Append a dynamic value of type `ty` to `out`.
    pub fn encode_value(&mut self, ty: &Type, value: &Value, out: &mut Vec<u8>) -> Result<(), GobError> {
        let id = self.register(ty, out);

        let mut body = Vec::new();
        write_int(&mut body, id);
        match ty {
            Type::Struct(st) => write_struct(&mut body, st, value)?,
            _ => {
                // singleton delta
                write_uint(&mut body, 0);
                write_value(&mut body, ty, value)?;
            }
        }
        write_message(out, &body);
        Ok(())
    }

    fn lookup(&self, ty: &Type) -> Option<TypeId> {
        ty.builtin_id().or_else(|| self.ids.get(ty).copied())
    }

    /// Assign ids to `ty` and every component type, then send the new
    /// definitions outer type first.
    fn register(&mut self, ty: &Type, out: &mut Vec<u8>) -> TypeId {
        if let Some(id) = self.lookup(ty) {
            return id;
        }
        let mut pending = Vec::new();
        let id = self.assign(ty, &mut pending);
        for (def_id, def) in pending {
            self.write_definition(def_id, &def, out);
        }
        id
    }

    fn assign(&mut self, ty: &Type, pending: &mut Vec<(TypeId, Type)>) -> TypeId {
        if let Some(id) = self.lookup(ty) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(ty.clone(), id);
        pending.push((id, ty.clone()));

        match ty {
            Type::Struct(st) => {
                for (_, field) in &st.fields {
                    self.assign(field, pending);
                }
            }
            Type::Slice(elem) => {
                self.assign(elem, pending);
            }
            Type::Map(key, elem) => {
                self.assign(key, pending);
                self.assign(elem, pending);
            }
            _ => {}
        }
        id
    }

    fn write_definition(&self, id: TypeId, ty: &Type, out: &mut Vec<u8>) {
        let mut body = Vec::new();
        write_int(&mut body, -id);

        let mut wire = FieldCursor::new();
        match ty {
            Type::Struct(st) => {
                wire.at(&mut body, WIRE_STRUCT);
                let mut fields = FieldCursor::new();
                fields.at(&mut body, 0);
                write_common(&mut body, &st.name, id);
                if !st.fields.is_empty() {
                    fields.at(&mut body, 1);
                    write_uint(&mut body, st.fields.len() as u64);
                    for (name, field_ty) in &st.fields {
                        let mut field = FieldCursor::new();
                        if !name.is_empty() {
                            field.at(&mut body, 0);
                            write_bytes(&mut body, name.as_bytes());
                        }
                        field.at(&mut body, 1);
                        write_int(&mut body, self.lookup(field_ty).unwrap_or_default());
                        field.end(&mut body);
                    }
                }
                fields.end(&mut body);
            }
            Type::Slice(elem) => {
                wire.at(&mut body, WIRE_SLICE);
                let mut fields = FieldCursor::new();
                fields.at(&mut body, 0);
                write_common(&mut body, &ty.name(), id);
                fields.at(&mut body, 1);
                write_int(&mut body, self.lookup(elem).unwrap_or_default());
                fields.end(&mut body);
            }
            Type::Map(key, elem) => {
                wire.at(&mut body, WIRE_MAP);
                let mut fields = FieldCursor::new();
                fields.at(&mut body, 0);
                write_common(&mut body, &ty.name(), id);
                fields.at(&mut body, 1);
                write_int(&mut body, self.lookup(key).unwrap_or_default());
                fields.at(&mut body, 2);
                write_int(&mut body, self.lookup(elem).unwrap_or_default());
                fields.end(&mut body);
            }
            // builtins never reach here
            _ => return,
        }
        wire.end(&mut body);
        write_message(out, &body);
    }
}

/// Tracks the last field number written inside a struct.
struct FieldCursor {
    last: i64,
}

impl FieldCursor {
    fn new() -> Self {
        Self { last: -1 }
    }

    fn at(&mut self, buf: &mut Vec<u8>, field: i64) {
        write_uint(buf, (field - self.last) as u64);
        self.last = field;
    }

    fn end(self, buf: &mut Vec<u8>) {
        write_uint(buf, 0);
    }
}

fn write_common(buf: &mut Vec<u8>, name: &str, id: TypeId) {
    let mut common = FieldCursor::new();
    if !name.is_empty() {
        common.at(buf, 0);
        write_bytes(buf, name.as_bytes());
    }
    common.at(buf, 1);
    write_int(buf, id);
    common.end(buf);
}

fn write_struct(buf: &mut Vec<u8>, st: &StructType, value: &Value) -> Result<(), GobError> {
    let Value::Struct(values) = value else {
        return Err(GobError::Mismatch {
            field: st.name.clone(),
            expected: "struct",
        });
    };

    let mut cursor = FieldCursor::new();
    for (index, (name, field_ty)) in st.fields.iter().enumerate() {
        let Some((_, field)) = values.iter().find(|(n, _)| n == name) else {
            continue;
        };
        if field.is_zero() {
            continue;
        }
        cursor.at(buf, index as i64);
        write_value(buf, field_ty, field).map_err(|err| match err {
            GobError::Mismatch { expected, .. } => GobError::Mismatch {
                field: format!("{}.{}", st.name, name),
                expected,
            },
            other => other,
        })?;
    }
    cursor.end(buf);
    Ok(())
}

fn write_value(buf: &mut Vec<u8>, ty: &Type, value: &Value) -> Result<(), GobError> {
    match (ty, value) {
        (Type::Bool, Value::Bool(b)) => write_uint(buf, u64::from(*b)),
        (Type::Int, Value::Int(i)) => write_int(buf, *i),
        (Type::Uint, Value::Uint(u)) => write_uint(buf, *u),
        (Type::Float, Value::Float(f)) => write_uint(buf, f.to_bits().swap_bytes()),
        (Type::Bytes, Value::Bytes(b)) => write_bytes(buf, b),
        (Type::String, Value::String(s)) => write_bytes(buf, s.as_bytes()),
        (Type::Slice(elem), Value::List(items)) => {
            write_uint(buf, items.len() as u64);
            for item in items {
                write_value(buf, elem, item)?;
            }
        }
        (Type::Map(key_ty, elem_ty), Value::Map(entries)) => {
            write_uint(buf, entries.len() as u64);
            for (key, elem) in entries {
                write_value(buf, key_ty, key)?;
                write_value(buf, elem_ty, elem)?;
            }
        }
        (Type::Struct(st), value) => write_struct(buf, st, value)?,
        (ty, value) => {
            return Err(GobError::Mismatch {
                field: format!("{} value", value.kind()),
                expected: static_name(ty),
            })
        }
    }
    Ok(())
}

fn static_name(ty: &Type) -> &'static str {
    match ty {
        Type::Bool => "bool",
        Type::Int => "int",
        Type::Uint => "uint",
        Type::Float => "float",
        Type::Bytes => "bytes",
        Type::String => "string",
        Type::Slice(_) => "list",
        Type::Map(_, _) => "map",
        Type::Struct(_) => "struct",
    }
}

fn write_message(out: &mut Vec<u8>, body: &[u8]) {
    write_uint(out, body.len() as u64);
    out.extend_from_slice(body);
}

/// Values below 128 take one byte; larger values are the negated byte count
/// followed by the big-endian bytes without leading zeros.
pub(crate) fn write_uint(buf: &mut Vec<u8>, x: u64) {
    if x < 0x80 {
        buf.push(x as u8);
        return;
    }
    let bytes = x.to_be_bytes();
    let skip = (x.leading_zeros() / 8) as usize;
    let len = bytes.len() - skip;
    buf.push((len as u8).wrapping_neg());
    buf.extend_from_slice(&bytes[skip..]);
}

/// Sign is carried in the low bit; negative values are complemented.
pub(crate) fn write_int(buf: &mut Vec<u8>, i: i64) {
    let u = if i < 0 {
        ((!i as u64) << 1) | 1
    } else {
        (i as u64) << 1
    };
    write_uint(buf, u);
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_uint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_type() -> Type {
        Type::structure("Point", vec![("X", Type::Int), ("Y", Type::Int)])
    }

    fn point(x: i64, y: i64) -> Value {
        Value::Struct(vec![
            ("X".to_string(), Value::Int(x)),
            ("Y".to_string(), Value::Int(y)),
        ])
    }

    #[test]
    fn test_uint_encoding() {
        let mut buf = Vec::new();
        write_uint(&mut buf, 7);
        write_uint(&mut buf, 256);
        assert_eq!(buf, vec![0x07, 0xFE, 0x01, 0x00]);
    }

    #[test]
    fn test_int_encoding() {
        let mut buf = Vec::new();
        write_int(&mut buf, -129);
        write_int(&mut buf, 22);
        assert_eq!(buf, vec![0xFE, 0x01, 0x01, 0x2C]);
    }

    #[test]
    fn test_struct_definition_and_value_match_go() {
        // Byte dump from the encoding/gob package documentation.
        let mut out = Vec::new();
        Encoder::new()
            .encode_value(&point_type(), &point(22, 33), &mut out)
            .unwrap();

        let definition: Vec<u8> = vec![
            0x1f, 0xff, 0x81, 0x03, 0x01, 0x01, 0x05, b'P', b'o', b'i', b'n', b't', 0x01, 0xff,
            0x82, 0x00, 0x01, 0x02, 0x01, 0x01, b'X', 0x01, 0x04, 0x00, 0x01, 0x01, b'Y', 0x01,
            0x04, 0x00, 0x00, 0x00,
        ];
        let value: Vec<u8> = vec![0x07, 0xff, 0x82, 0x01, 0x2c, 0x01, 0x42, 0x00];

        assert_eq!(out, [definition, value].concat());
    }

    #[test]
    fn test_definition_sent_once_per_stream() {
        let mut encoder = Encoder::new();
        let mut first = Vec::new();
        encoder.encode_value(&point_type(), &point(1, 2), &mut first).unwrap();
        let mut second = Vec::new();
        encoder.encode_value(&point_type(), &point(1, 2), &mut second).unwrap();

        assert!(first.len() > second.len());
        assert_eq!(second, vec![0x07, 0xff, 0x82, 0x01, 0x02, 0x01, 0x04, 0x00]);
    }

    #[test]
    fn test_zero_fields_are_omitted() {
        let mut encoder = Encoder::new();
        let mut warmup = Vec::new();
        encoder.encode_value(&point_type(), &point(0, 0), &mut warmup).unwrap();

        let mut out = Vec::new();
        encoder.encode_value(&point_type(), &point(0, 5), &mut out).unwrap();
        // delta 2 skips the zero X field
        assert_eq!(out, vec![0x05, 0xff, 0x82, 0x02, 0x0a, 0x00]);
    }

    #[test]
    fn test_mismatched_value_is_rejected() {
        let value = Value::Struct(vec![("X".to_string(), Value::String("1".into()))]);
        let err = Encoder::new()
            .encode_value(&point_type(), &value, &mut Vec::new())
            .unwrap_err();
        assert!(err.to_string().contains("Point.X"));
    }
}
