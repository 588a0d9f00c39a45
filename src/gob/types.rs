//! Type descriptions for both directions of a gob stream.

use super::ids;

/// Identifier of a type on a gob stream.
pub type TypeId = i64;

/// Local description of a type the encoder can send.
///
/// Go pointers are flattened by gob, so a `*T` field is described as `T` and a
/// nil pointer is encoded by omitting the field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Bool,
    Int,
    Uint,
    Float,
    Bytes,
    String,
    Slice(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Struct(StructType),
}

/// A named struct with ordered fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<(String, Type)>,
}

impl Type {
    /// Describe a struct type.
    pub fn structure(name: &str, fields: Vec<(&str, Type)>) -> Self {
        Type::Struct(StructType {
            name: name.to_string(),
            fields: fields
                .into_iter()
                .map(|(name, ty)| (name.to_string(), ty))
                .collect(),
        })
    }

    /// Describe a slice of `elem`.
    pub fn slice(elem: Type) -> Self {
        Type::Slice(Box::new(elem))
    }

    /// Describe a map from `key` to `elem`.
    pub fn map(key: Type, elem: Type) -> Self {
        Type::Map(Box::new(key), Box::new(elem))
    }

    /// Id of a builtin type, `None` for types that need a definition.
    pub fn builtin_id(&self) -> Option<TypeId> {
        match self {
            Type::Bool => Some(ids::BOOL),
            Type::Int => Some(ids::INT),
            Type::Uint => Some(ids::UINT),
            Type::Float => Some(ids::FLOAT),
            Type::Bytes => Some(ids::BYTES),
            Type::String => Some(ids::STRING),
            Type::Slice(_) | Type::Map(_, _) | Type::Struct(_) => None,
        }
    }

    /// Name sent in the type definition.
    pub fn name(&self) -> String {
        match self {
            Type::Bool => "bool".to_string(),
            Type::Int => "int".to_string(),
            Type::Uint => "uint".to_string(),
            Type::Float => "float".to_string(),
            Type::Bytes => "[]byte".to_string(),
            Type::String => "string".to_string(),
            Type::Slice(elem) => format!("[]{}", elem.name()),
            Type::Map(key, elem) => format!("map[{}]{}", key.name(), elem.name()),
            Type::Struct(st) => st.name.clone(),
        }
    }
}

/// A field of a struct definition received from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldType {
    pub name: String,
    pub id: TypeId,
}

/// Type definition received from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireType {
    Array { name: String, elem: TypeId, len: usize },
    Slice { name: String, elem: TypeId },
    Struct { name: String, fields: Vec<FieldType> },
    Map { name: String, key: TypeId, elem: TypeId },
    /// Types with custom marshalers (`GobEncoder`, `BinaryMarshaler`, `TextMarshaler`).
    External { name: String },
}

impl WireType {
    pub fn name(&self) -> &str {
        match self {
            WireType::Array { name, .. }
            | WireType::Slice { name, .. }
            | WireType::Struct { name, .. }
            | WireType::Map { name, .. }
            | WireType::External { name } => name,
        }
    }
}
