//! Dynamic gob values and their mapping onto typed records.

use super::{GobError, Type};

/// A decoded (or to-be-encoded) gob value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Nil pointer or empty interface; encoded by omission.
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Complex(f64, f64),
    Bytes(Vec<u8>),
    String(String),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Struct(Vec<(String, Value)>),
}

impl Value {
    /// Zero values are left out of struct encodings.
    ///
    /// Nested structs are always sent, matching the Go encoder.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Nil => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Uint(u) => *u == 0,
            Value::Float(f) => *f == 0.0,
            Value::Complex(re, im) => *re == 0.0 && *im == 0.0,
            Value::Bytes(b) => b.is_empty(),
            Value::String(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Map(entries) => entries.is_empty(),
            Value::Struct(_) => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Float(_) => "float",
            Value::Complex(_, _) => "complex",
            Value::Bytes(_) => "bytes",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Struct(_) => "struct",
        }
    }

    /// Look up a struct field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

/// A Rust type that travels over a gob stream as a Go struct.
pub trait GobRecord: Sized {
    /// Wire description of the record.
    fn gob_type() -> Type;

    /// Convert the record into a struct value whose fields follow `gob_type`.
    fn to_gob(&self) -> Value;

    /// Rebuild the record from a decoded value. Fields are matched by name;
    /// missing fields take their zero value and unknown fields are ignored.
    fn from_gob(value: Value) -> Result<Self, GobError>;
}

/// Field accessor used by [`GobRecord::from_gob`] implementations.
#[derive(Debug)]
pub struct Fields {
    record: &'static str,
    fields: Vec<(String, Value)>,
}

impl Fields {
    /// Unwrap a struct value. `Nil` reads as a struct with no fields set.
    pub fn new(record: &'static str, value: Value) -> Result<Self, GobError> {
        match value {
            Value::Struct(fields) => Ok(Self { record, fields }),
            Value::Nil => Ok(Self {
                record,
                fields: Vec::new(),
            }),
            _ => Err(GobError::Mismatch {
                field: record.to_string(),
                expected: "struct",
            }),
        }
    }

    /// Remove a field, if it was sent.
    pub fn take(&mut self, name: &str) -> Option<Value> {
        let index = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.swap_remove(index).1)
    }

    pub fn string(&mut self, name: &str) -> Result<String, GobError> {
        match self.take(name) {
            None | Some(Value::Nil) => Ok(String::new()),
            Some(Value::String(s)) => Ok(s),
            Some(Value::Bytes(b)) => Ok(String::from_utf8_lossy(&b).into_owned()),
            Some(_) => Err(self.mismatch(name, "string")),
        }
    }

    pub fn bytes(&mut self, name: &str) -> Result<Vec<u8>, GobError> {
        match self.take(name) {
            None | Some(Value::Nil) => Ok(Vec::new()),
            Some(Value::Bytes(b)) => Ok(b),
            Some(Value::String(s)) => Ok(s.into_bytes()),
            Some(_) => Err(self.mismatch(name, "bytes")),
        }
    }

    pub fn int(&mut self, name: &str) -> Result<i64, GobError> {
        match self.take(name) {
            None | Some(Value::Nil) => Ok(0),
            Some(Value::Int(i)) => Ok(i),
            Some(Value::Uint(u)) => i64::try_from(u).map_err(|_| self.mismatch(name, "int")),
            Some(_) => Err(self.mismatch(name, "int")),
        }
    }

    pub fn uint(&mut self, name: &str) -> Result<u64, GobError> {
        match self.take(name) {
            None | Some(Value::Nil) => Ok(0),
            Some(Value::Uint(u)) => Ok(u),
            Some(Value::Int(i)) => u64::try_from(i).map_err(|_| self.mismatch(name, "uint")),
            Some(_) => Err(self.mismatch(name, "uint")),
        }
    }

    pub fn bool(&mut self, name: &str) -> Result<bool, GobError> {
        match self.take(name) {
            None | Some(Value::Nil) => Ok(false),
            Some(Value::Bool(b)) => Ok(b),
            Some(_) => Err(self.mismatch(name, "bool")),
        }
    }

    /// A list field; missing reads as empty.
    pub fn list(&mut self, name: &str) -> Result<Vec<Value>, GobError> {
        match self.take(name) {
            None | Some(Value::Nil) => Ok(Vec::new()),
            Some(Value::List(items)) => Ok(items),
            Some(_) => Err(self.mismatch(name, "list")),
        }
    }

    /// A map field; missing reads as empty.
    pub fn map(&mut self, name: &str) -> Result<Vec<(Value, Value)>, GobError> {
        match self.take(name) {
            None | Some(Value::Nil) => Ok(Vec::new()),
            Some(Value::Map(entries)) => Ok(entries),
            Some(_) => Err(self.mismatch(name, "map")),
        }
    }

    /// A nested record reached through a pointer; missing reads as `None`.
    pub fn record<T: GobRecord>(&mut self, name: &str) -> Result<Option<T>, GobError> {
        match self.take(name) {
            None | Some(Value::Nil) => Ok(None),
            Some(value) => T::from_gob(value).map(Some),
        }
    }

    fn mismatch(&self, name: &str, expected: &'static str) -> GobError {
        GobError::Mismatch {
            field: format!("{}.{}", self.record, name),
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_values() {
        assert!(Value::Int(0).is_zero());
        assert!(Value::String(String::new()).is_zero());
        assert!(Value::Nil.is_zero());
        assert!(!Value::Struct(Vec::new()).is_zero());
        assert!(!Value::Bool(true).is_zero());
    }

    #[test]
    fn test_fields_defaults_for_missing() {
        let mut fields = Fields::new(
            "Point",
            Value::Struct(vec![("X".to_string(), Value::Int(7))]),
        )
        .unwrap();

        assert_eq!(fields.int("X").unwrap(), 7);
        assert_eq!(fields.int("Y").unwrap(), 0);
        assert_eq!(fields.string("Name").unwrap(), "");
    }

    #[test]
    fn test_fields_type_mismatch() {
        let mut fields = Fields::new(
            "Point",
            Value::Struct(vec![("X".to_string(), Value::String("seven".into()))]),
        )
        .unwrap();

        let err = fields.int("X").unwrap_err();
        assert!(err.to_string().contains("Point.X"));
    }

    #[test]
    fn test_fields_rejects_non_struct() {
        assert!(Fields::new("Point", Value::Int(1)).is_err());
    }
}
