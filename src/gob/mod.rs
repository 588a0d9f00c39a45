//! Go `encoding/gob` codec.
//!
//! A running Lambda function process serves `net/rpc`, whose default codec is
//! gob. A gob stream is a sequence of length-prefixed messages: a message whose
//! type id is negative defines a type, a positive id carries a value of a type
//! the sender defined earlier on the same stream.
//!
//! ```text
//! message  := uint(len) int(type_id) payload
//! payload  := wire_type            (type_id < 0)
//!           | struct_fields        (type_id > 0, struct type)
//!           | uint(0) value        (type_id > 0, any other type)
//! struct   := (uint(field_delta) value)* uint(0)
//! ```
//!
//! Type definitions are sent once per stream, so an [`Encoder`] and a
//! [`Decoder`] must live exactly as long as the connection they serve.

mod decode;
mod encode;
mod types;
mod value;

pub use decode::{read_message, Decoder};
pub use encode::Encoder;
pub use types::{FieldType, StructType, Type, TypeId, WireType};
pub use value::{Fields, GobRecord, Value};

use thiserror::Error;

/// Largest message accepted from a peer.
pub const MAX_MESSAGE_SIZE: u64 = 1 << 30;

/// Builtin type ids shared by every gob stream.
pub mod ids {
    use super::TypeId;

    pub const BOOL: TypeId = 1;
    pub const INT: TypeId = 2;
    pub const UINT: TypeId = 3;
    pub const FLOAT: TypeId = 4;
    pub const BYTES: TypeId = 5;
    pub const STRING: TypeId = 6;
    pub const COMPLEX: TypeId = 7;
    pub const INTERFACE: TypeId = 8;

    /// First id an encoder may hand out for its own types.
    pub const FIRST_USER: TypeId = 65;
}

/// Errors raised while encoding or decoding a gob stream.
#[derive(Debug, Error)]
pub enum GobError {
    #[error("gob: i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("gob: unexpected end of message")]
    Truncated,

    #[error("gob: invalid integer length {0}")]
    InvalidLength(usize),

    #[error("gob: message of {0} bytes exceeds the size limit")]
    MessageTooLarge(u64),

    #[error("gob: unknown type id {0}")]
    UnknownType(TypeId),

    #[error("gob: duplicate definition of type id {0}")]
    DuplicateType(TypeId),

    #[error("gob: unsupported {0}")]
    Unsupported(String),

    #[error("gob: corrupted data: {0}")]
    Corrupt(&'static str),

    #[error("gob: type mismatch for {field}: expected {expected}")]
    Mismatch {
        field: String,
        expected: &'static str,
    },

    #[error("gob: value nested too deeply")]
    TooDeep,
}
