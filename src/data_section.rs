//! MMDB data section encoding and decoding
//!
//! Geolocation records live in the data section of a MaxMind DB file. Each
//! value starts with a control byte: the top 3 bits carry the type, the low
//! 5 bits carry the payload size. Types above 7 are "extended" and store
//! `type - 7` in the byte after the control byte.
//!
//! # Supported Types
//!
//! - **Pointer** (1): reference to another value, resolved transparently
//! - **String** (2), **Double** (3), **Bytes** (4)
//! - **Uint16** (5), **Uint32** (6), **Map** (7)
//! - **Int32** (8), **Uint64** (9), **Uint128** (10), **Array** (11)
//! - **Bool** (14), **Float** (15)
//!
//! Unsigned integers are stored big-endian using only as many bytes as the
//! size field says, so a `Uint32` holding 7 occupies a single byte.
//!
//! See: https://maxmind.github.io/MaxMind-DB/

use std::collections::HashMap;

/// Nesting bound for maps, arrays and pointer hops
const MAX_DEPTH: usize = 64;

/// Decoded MMDB value
///
/// Pointers never appear here: the decoder follows them and returns the
/// value they reference.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// UTF-8 string
    String(String),
    /// IEEE 754 double precision float
    Double(f64),
    /// Raw byte array
    Bytes(Vec<u8>),
    /// Unsigned 16-bit integer
    Uint16(u16),
    /// Unsigned 32-bit integer
    Uint32(u32),
    /// Key-value map (MMDB maps only have string keys)
    Map(HashMap<String, DataValue>),
    /// Signed 32-bit integer
    Int32(i32),
    /// Unsigned 64-bit integer
    Uint64(u64),
    /// Unsigned 128-bit integer
    Uint128(u128),
    /// Array of values
    Array(Vec<DataValue>),
    /// Boolean value
    Bool(bool),
    /// IEEE 754 single precision float
    Float(f32),
}

impl DataValue {
    /// Look up a key when this value is a map
    pub fn get(&self, key: &str) -> Option<&DataValue> {
        match self {
            DataValue::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Borrow the string payload, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Widen any unsigned integer variant that fits in a `u64`
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            DataValue::Uint16(v) => Some(*v as u64),
            DataValue::Uint32(v) => Some(*v as u64),
            DataValue::Uint64(v) => Some(*v),
            DataValue::Uint128(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Convenience constructor for a map from string pairs
    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, DataValue)>,
        K: Into<String>,
    {
        DataValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Convenience constructor for a string value
    pub fn string(s: impl Into<String>) -> Self {
        DataValue::String(s.into())
    }
}

/// Data section encoder
///
/// Appends values to a buffer and returns their offsets. Identical values
/// are written once and share an offset.
#[derive(Default)]
pub struct DataEncoder {
    buffer: Vec<u8>,
    dedup_map: HashMap<Vec<u8>, u32>,
}

impl DataEncoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a value and return its offset
    pub fn encode(&mut self, value: &DataValue) -> u32 {
        let mut temp = Vec::new();
        write_value(value, &mut temp);

        if let Some(&offset) = self.dedup_map.get(&temp) {
            return offset;
        }

        let offset = self.buffer.len() as u32;
        self.buffer.extend_from_slice(&temp);
        self.dedup_map.insert(temp, offset);
        offset
    }

    /// Get the final encoded data section
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Borrow the encoded data section
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Current encoded size in bytes
    pub fn size(&self) -> usize {
        self.buffer.len()
    }
}

fn write_value(value: &DataValue, out: &mut Vec<u8>) {
    match value {
        DataValue::String(s) => {
            write_control(2, s.len(), out);
            out.extend_from_slice(s.as_bytes());
        }
        DataValue::Double(d) => {
            write_control(3, 8, out);
            out.extend_from_slice(&d.to_be_bytes());
        }
        DataValue::Bytes(b) => {
            write_control(4, b.len(), out);
            out.extend_from_slice(b);
        }
        DataValue::Uint16(n) => write_unsigned(5, *n as u128, out),
        DataValue::Uint32(n) => write_unsigned(6, *n as u128, out),
        DataValue::Map(m) => {
            write_control(7, m.len(), out);
            // Sorted keys keep encoding deterministic, which dedup relies on
            let mut keys: Vec<&String> = m.keys().collect();
            keys.sort();
            for key in keys {
                write_value(&DataValue::String(key.clone()), out);
                write_value(&m[key], out);
            }
        }
        DataValue::Int32(n) => {
            write_control(8, 4, out);
            out.extend_from_slice(&n.to_be_bytes());
        }
        DataValue::Uint64(n) => write_unsigned(9, *n as u128, out),
        DataValue::Uint128(n) => write_unsigned(10, *n, out),
        DataValue::Array(items) => {
            write_control(11, items.len(), out);
            for item in items {
                write_value(item, out);
            }
        }
        DataValue::Bool(b) => write_control(14, *b as usize, out),
        DataValue::Float(f) => {
            write_control(15, 4, out);
            out.extend_from_slice(&f.to_be_bytes());
        }
    }
}

/// Write an unsigned integer using the minimal number of bytes
fn write_unsigned(type_id: u8, value: u128, out: &mut Vec<u8>) {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    write_control(type_id, bytes.len() - skip, out);
    out.extend_from_slice(&bytes[skip..]);
}

fn write_control(type_id: u8, size: usize, out: &mut Vec<u8>) {
    let (size_bits, tail_len, tail) = if size < 29 {
        (size as u8, 0, 0)
    } else if size < 285 {
        (29, 1, size - 29)
    } else if size < 65_821 {
        (30, 2, size - 285)
    } else {
        (31, 3, size - 65_821)
    };

    if type_id <= 7 {
        out.push((type_id << 5) | size_bits);
    } else {
        out.push(size_bits);
        out.push(type_id - 7);
    }
    out.extend_from_slice(&(tail as u32).to_be_bytes()[4 - tail_len..]);
}

/// Data section decoder
///
/// Offsets, including pointer targets, are relative to the start of
/// `buffer`.
pub struct DataDecoder<'a> {
    buffer: &'a [u8],
}

impl<'a> DataDecoder<'a> {
    /// Create a decoder over a data section
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer }
    }

    /// Decode the value at `offset`
    pub fn decode(&self, offset: usize) -> Result<DataValue, &'static str> {
        let mut cursor = offset;
        self.decode_at(&mut cursor, 0)
    }

    fn decode_at(&self, cursor: &mut usize, depth: usize) -> Result<DataValue, &'static str> {
        if depth > MAX_DEPTH {
            return Err("Data nesting too deep");
        }

        let ctrl = self.take(cursor, 1)?[0];
        let mut type_id = ctrl >> 5;
        if type_id == 0 {
            type_id = 7 + self.take(cursor, 1)?[0];
        }

        if type_id == 1 {
            let target = self.pointer_target(cursor, ctrl)?;
            let mut target_cursor = target;
            return self.decode_at(&mut target_cursor, depth + 1);
        }

        let size = self.decode_size(cursor, ctrl & 0x1F)?;

        match type_id {
            2 => {
                let raw = self.take(cursor, size)?;
                let s = std::str::from_utf8(raw).map_err(|_| "Invalid UTF-8")?;
                Ok(DataValue::String(s.to_string()))
            }
            3 => {
                if size != 8 {
                    return Err("Invalid double size");
                }
                let raw = self.take(cursor, 8)?;
                Ok(DataValue::Double(f64::from_be_bytes(fixed(raw))))
            }
            4 => Ok(DataValue::Bytes(self.take(cursor, size)?.to_vec())),
            5 => Ok(DataValue::Uint16(self.read_unsigned(cursor, size, 2)? as u16)),
            6 => Ok(DataValue::Uint32(self.read_unsigned(cursor, size, 4)? as u32)),
            7 => {
                let mut map = HashMap::with_capacity(size.min(64));
                for _ in 0..size {
                    let key = match self.decode_at(cursor, depth + 1)? {
                        DataValue::String(s) => s,
                        _ => return Err("Map key must be string"),
                    };
                    let value = self.decode_at(cursor, depth + 1)?;
                    map.insert(key, value);
                }
                Ok(DataValue::Map(map))
            }
            8 => {
                if size > 4 {
                    return Err("Invalid int32 size");
                }
                let raw = self.take(cursor, size)?;
                let mut bytes = [0u8; 4];
                bytes[4 - size..].copy_from_slice(raw);
                Ok(DataValue::Int32(i32::from_be_bytes(bytes)))
            }
            9 => Ok(DataValue::Uint64(self.read_unsigned(cursor, size, 8)? as u64)),
            10 => Ok(DataValue::Uint128(self.read_unsigned(cursor, size, 16)?)),
            11 => {
                let mut items = Vec::with_capacity(size.min(64));
                for _ in 0..size {
                    items.push(self.decode_at(cursor, depth + 1)?);
                }
                Ok(DataValue::Array(items))
            }
            14 => match size {
                0 => Ok(DataValue::Bool(false)),
                1 => Ok(DataValue::Bool(true)),
                _ => Err("Invalid bool size"),
            },
            15 => {
                if size != 4 {
                    return Err("Invalid float size");
                }
                let raw = self.take(cursor, 4)?;
                Ok(DataValue::Float(f32::from_be_bytes(fixed(raw))))
            }
            _ => Err("Unknown data type"),
        }
    }

    fn pointer_target(&self, cursor: &mut usize, ctrl: u8) -> Result<usize, &'static str> {
        let size = (ctrl >> 3) & 0x3;
        let high = (ctrl & 0x7) as usize;
        let raw = self.take(cursor, size as usize + 1)?;
        let low = raw.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize);
        Ok(match size {
            0 => (high << 8) | low,
            1 => 2048 + ((high << 16) | low),
            2 => 526_336 + ((high << 24) | low),
            _ => low,
        })
    }

    fn decode_size(&self, cursor: &mut usize, size_bits: u8) -> Result<usize, &'static str> {
        let extra = |len: usize, cursor: &mut usize| -> Result<usize, &'static str> {
            let raw = self.take(cursor, len)?;
            Ok(raw.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize))
        };
        match size_bits {
            0..=28 => Ok(size_bits as usize),
            29 => Ok(29 + extra(1, cursor)?),
            30 => Ok(285 + extra(2, cursor)?),
            _ => Ok(65_821 + extra(3, cursor)?),
        }
    }

    fn read_unsigned(
        &self,
        cursor: &mut usize,
        size: usize,
        max: usize,
    ) -> Result<u128, &'static str> {
        if size > max {
            return Err("Unsigned integer too wide");
        }
        let raw = self.take(cursor, size)?;
        Ok(raw.iter().fold(0u128, |acc, &b| (acc << 8) | b as u128))
    }

    fn take(&self, cursor: &mut usize, len: usize) -> Result<&'a [u8], &'static str> {
        let end = cursor.checked_add(len).ok_or("Offset overflow")?;
        let slice = self.buffer.get(*cursor..end).ok_or("Data out of bounds")?;
        *cursor = end;
        Ok(slice)
    }
}

fn fixed<const N: usize>(raw: &[u8]) -> [u8; N] {
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(raw);
    bytes
}
