//! Gob decoder.

use std::collections::HashMap;

use tokio::io::{AsyncRead, AsyncReadExt};

use super::{ids, FieldType, GobError, GobRecord, TypeId, Value, WireType, MAX_MESSAGE_SIZE};

const MAX_DEPTH: usize = 64;

/// Decodes values from one gob stream, keeping the peer's type table.
#[derive(Debug, Default)]
pub struct Decoder {
    types: HashMap<TypeId, WireType>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Definition the peer sent for `id`, if any.
    pub fn wire_type(&self, id: TypeId) -> Option<&WireType> {
        self.types.get(&id)
    }

    /// Read messages until one carries a value, then map it onto `T`.
    pub async fn decode<T, R>(&mut self, reader: &mut R) -> Result<T, GobError>
    where
        T: GobRecord,
        R: AsyncRead + Unpin,
    {
        let value = self.read_value(reader).await?;
        T::from_gob(value)
    }

    /// Read messages until one carries a value. Type definitions on the way
    /// are recorded.
    pub async fn read_value<R>(&mut self, reader: &mut R) -> Result<Value, GobError>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            let message = read_message(reader).await?;
            if let Some(value) = self.decode_message(&message)? {
                return Ok(value);
            }
        }
    }

    /// Decode one message without its length prefix. Returns `None` when the
    /// message was a type definition.
    pub fn decode_message(&mut self, message: &[u8]) -> Result<Option<Value>, GobError> {
        let mut r = Reader::new(message);
        let id = r.int()?;

        if id < 0 {
            let id = -id;
            let wire = parse_wire_type(&mut r)?;
            if !r.is_empty() {
                return Err(GobError::Corrupt("extra data after type definition"));
            }
            if self.types.insert(id, wire).is_some() {
                return Err(GobError::DuplicateType(id));
            }
            return Ok(None);
        }

        let value = match self.types.get(&id) {
            Some(WireType::Struct { fields, .. }) => self.decode_struct(&mut r, fields, 0)?,
            _ => {
                if r.uint()? != 0 {
                    return Err(GobError::Corrupt("non-zero delta for singleton"));
                }
                self.decode_value(&mut r, id, 0)?
            }
        };
        Ok(Some(value))
    }

    fn decode_value(&self, r: &mut Reader<'_>, id: TypeId, depth: usize) -> Result<Value, GobError> {
        if depth > MAX_DEPTH {
            return Err(GobError::TooDeep);
        }
        match id {
            ids::BOOL => Ok(Value::Bool(r.uint()? != 0)),
            ids::INT => Ok(Value::Int(r.int()?)),
            ids::UINT => Ok(Value::Uint(r.uint()?)),
            ids::FLOAT => Ok(Value::Float(r.float()?)),
            ids::BYTES => Ok(Value::Bytes(r.bytes()?.to_vec())),
            ids::STRING => Ok(Value::String(String::from_utf8_lossy(r.bytes()?).into_owned())),
            ids::COMPLEX => {
                let re = r.float()?;
                let im = r.float()?;
                Ok(Value::Complex(re, im))
            }
            ids::INTERFACE => {
                let name = r.bytes()?;
                if name.is_empty() {
                    Ok(Value::Nil)
                } else {
                    Err(GobError::Unsupported(format!(
                        "interface value of concrete type {}",
                        String::from_utf8_lossy(name)
                    )))
                }
            }
            _ => match self.types.get(&id) {
                Some(WireType::Struct { fields, .. }) => self.decode_struct(r, fields, depth + 1),
                Some(WireType::Slice { elem, .. }) => {
                    let len = r.len()?;
                    self.decode_list(r, *elem, len, depth)
                }
                Some(WireType::Array { elem, len, .. }) => {
                    let sent = r.len()?;
                    if sent != *len {
                        return Err(GobError::Corrupt("array length mismatch"));
                    }
                    self.decode_list(r, *elem, sent, depth)
                }
                Some(WireType::Map { key, elem, .. }) => {
                    let len = r.len()?;
                    let mut entries = Vec::with_capacity(len.min(r.remaining()));
                    for _ in 0..len {
                        let k = self.decode_value(r, *key, depth + 1)?;
                        let v = self.decode_value(r, *elem, depth + 1)?;
                        entries.push((k, v));
                    }
                    Ok(Value::Map(entries))
                }
                Some(WireType::External { name }) => Err(GobError::Unsupported(format!(
                    "custom-marshaled type {}",
                    name
                ))),
                None => Err(GobError::UnknownType(id)),
            },
        }
    }

    fn decode_list(
        &self,
        r: &mut Reader<'_>,
        elem: TypeId,
        len: usize,
        depth: usize,
    ) -> Result<Value, GobError> {
        let mut items = Vec::with_capacity(len.min(r.remaining()));
        for _ in 0..len {
            items.push(self.decode_value(r, elem, depth + 1)?);
        }
        Ok(Value::List(items))
    }

    fn decode_struct(
        &self,
        r: &mut Reader<'_>,
        fields: &[FieldType],
        depth: usize,
    ) -> Result<Value, GobError> {
        let mut out = Vec::new();
        let mut index: i64 = -1;
        loop {
            let delta = r.uint()?;
            if delta == 0 {
                break;
            }
            index = i64::try_from(delta)
                .ok()
                .and_then(|d| index.checked_add(d))
                .ok_or(GobError::Corrupt("field number overflow"))?;
            let field = usize::try_from(index)
                .ok()
                .and_then(|i| fields.get(i))
                .ok_or(GobError::Corrupt("field number out of range"))?;
            let value = self.decode_value(r, field.id, depth)?;
            out.push((field.name.clone(), value));
        }
        Ok(Value::Struct(out))
    }
}

/// Read one length-prefixed message from `reader`.
pub async fn read_message<R>(reader: &mut R) -> Result<Vec<u8>, GobError>
where
    R: AsyncRead + Unpin,
{
    let first = reader.read_u8().await?;
    let len = if first < 0x80 {
        u64::from(first)
    } else {
        let n = usize::from(first.wrapping_neg());
        if n > 8 {
            return Err(GobError::InvalidLength(n));
        }
        let mut bytes = [0u8; 8];
        reader.read_exact(&mut bytes[8 - n..]).await?;
        u64::from_be_bytes(bytes)
    };
    if len > MAX_MESSAGE_SIZE {
        return Err(GobError::MessageTooLarge(len));
    }
    if len == 0 {
        return Err(GobError::Corrupt("empty message"));
    }

    let mut message = vec![0u8; len as usize];
    reader.read_exact(&mut message).await?;
    Ok(message)
}

fn parse_wire_type(r: &mut Reader<'_>) -> Result<WireType, GobError> {
    let mut wire = None;
    each_field(r, |r, field| {
        wire = Some(match field {
            0 => parse_array(r)?,
            1 => parse_slice(r)?,
            2 => parse_struct(r)?,
            3 => parse_map(r)?,
            4..=6 => parse_external(r)?,
            _ => return Err(GobError::Corrupt("unknown wire type field")),
        });
        Ok(())
    })?;
    wire.ok_or(GobError::Corrupt("empty type definition"))
}

fn parse_common(r: &mut Reader<'_>) -> Result<String, GobError> {
    let mut name = String::new();
    each_field(r, |r, field| {
        match field {
            0 => name = String::from_utf8_lossy(r.bytes()?).into_owned(),
            // id repeats the message's own id
            1 => {
                r.int()?;
            }
            _ => return Err(GobError::Corrupt("unknown common type field")),
        }
        Ok(())
    })?;
    Ok(name)
}

fn parse_array(r: &mut Reader<'_>) -> Result<WireType, GobError> {
    let (mut name, mut elem, mut len) = (String::new(), 0, 0);
    each_field(r, |r, field| {
        match field {
            0 => name = parse_common(r)?,
            1 => elem = r.int()?,
            2 => len = usize::try_from(r.int()?).map_err(|_| GobError::Corrupt("negative array length"))?,
            _ => return Err(GobError::Corrupt("unknown array type field")),
        }
        Ok(())
    })?;
    Ok(WireType::Array { name, elem, len })
}

fn parse_slice(r: &mut Reader<'_>) -> Result<WireType, GobError> {
    let (mut name, mut elem) = (String::new(), 0);
    each_field(r, |r, field| {
        match field {
            0 => name = parse_common(r)?,
            1 => elem = r.int()?,
            _ => return Err(GobError::Corrupt("unknown slice type field")),
        }
        Ok(())
    })?;
    Ok(WireType::Slice { name, elem })
}

fn parse_struct(r: &mut Reader<'_>) -> Result<WireType, GobError> {
    let mut name = String::new();
    let mut fields = Vec::new();
    each_field(r, |r, field| {
        match field {
            0 => name = parse_common(r)?,
            1 => {
                let count = r.len()?;
                for _ in 0..count {
                    let mut field = FieldType {
                        name: String::new(),
                        id: 0,
                    };
                    each_field(r, |r, index| {
                        match index {
                            0 => field.name = String::from_utf8_lossy(r.bytes()?).into_owned(),
                            1 => field.id = r.int()?,
                            _ => return Err(GobError::Corrupt("unknown field type field")),
                        }
                        Ok(())
                    })?;
                    fields.push(field);
                }
            }
            _ => return Err(GobError::Corrupt("unknown struct type field")),
        }
        Ok(())
    })?;
    Ok(WireType::Struct { name, fields })
}

fn parse_map(r: &mut Reader<'_>) -> Result<WireType, GobError> {
    let (mut name, mut key, mut elem) = (String::new(), 0, 0);
    each_field(r, |r, field| {
        match field {
            0 => name = parse_common(r)?,
            1 => key = r.int()?,
            2 => elem = r.int()?,
            _ => return Err(GobError::Corrupt("unknown map type field")),
        }
        Ok(())
    })?;
    Ok(WireType::Map { name, key, elem })
}

fn parse_external(r: &mut Reader<'_>) -> Result<WireType, GobError> {
    let mut name = String::new();
    each_field(r, |r, field| {
        match field {
            0 => name = parse_common(r)?,
            _ => return Err(GobError::Corrupt("unknown marshaler type field")),
        }
        Ok(())
    })?;
    Ok(WireType::External { name })
}

/// Walk the field deltas of a struct encoding, calling `f` with each field number.
fn each_field<'a, F>(r: &mut Reader<'a>, mut f: F) -> Result<(), GobError>
where
    F: FnMut(&mut Reader<'a>, i64) -> Result<(), GobError>,
{
    let mut field: i64 = -1;
    loop {
        let delta = r.uint()?;
        if delta == 0 {
            return Ok(());
        }
        field = i64::try_from(delta)
            .ok()
            .and_then(|d| field.checked_add(d))
            .ok_or(GobError::Corrupt("field number overflow"))?;
        f(r, field)?;
    }
}

/// Cursor over a single message.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], GobError> {
        if n > self.remaining() {
            return Err(GobError::Truncated);
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn uint(&mut self) -> Result<u64, GobError> {
        let first = self.take(1)?[0];
        if first < 0x80 {
            return Ok(u64::from(first));
        }
        let n = usize::from(first.wrapping_neg());
        if n > 8 {
            return Err(GobError::InvalidLength(n));
        }
        Ok(self
            .take(n)?
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    fn int(&mut self) -> Result<i64, GobError> {
        let u = self.uint()?;
        if u & 1 == 1 {
            Ok(!((u >> 1) as i64))
        } else {
            Ok((u >> 1) as i64)
        }
    }

    fn float(&mut self) -> Result<f64, GobError> {
        Ok(f64::from_bits(self.uint()?.swap_bytes()))
    }

    /// A count that must fit in the rest of the message.
    fn len(&mut self) -> Result<usize, GobError> {
        let n = self.uint()?;
        usize::try_from(n).map_err(|_| GobError::Truncated)
    }

    fn bytes(&mut self) -> Result<&'a [u8], GobError> {
        let n = self.len()?;
        self.take(n)
    }
}
