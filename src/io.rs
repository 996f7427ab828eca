//! Little-endian binary encode/decode traits shared by pages, tuples,
//! columns, and schemas. Carried over from `small-db::io`, trimmed to the
//! primitives this crate actually needs.

use std::convert::TryInto;
use std::mem::size_of;

pub trait Encodeable {
    fn encode(&self) -> Vec<u8>;
}

pub trait Decodeable {
    fn decode_from<R: std::io::Read>(reader: &mut R) -> Self;
}

pub fn read_exact<R: std::io::Read>(reader: &mut R, bytes_count: usize) -> Vec<u8> {
    let mut buffer = vec![0u8; bytes_count];
    reader
        .read_exact(&mut buffer)
        .unwrap_or_else(|_| panic!("io error, expected {} bytes", bytes_count));
    buffer
}

/// An in-memory byte sink used to build up a page or record payload before
/// it is copied into a fixed-size page buffer.
#[derive(Default)]
pub struct SmallWriter {
    buf: Vec<u8>,
}

impl SmallWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn write<T: Encodeable>(&mut self, obj: &T) {
        self.buf.extend_from_slice(obj.encode().as_slice());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.buf.clone()
    }

    pub fn size(&self) -> usize {
        self.buf.len()
    }

    /// Pad (or reject) the buffer to exactly `size` bytes, matching the
    /// fixed-size slot contract tuples are serialized into.
    pub fn to_padded_bytes(&self, size: usize) -> Vec<u8> {
        assert!(
            self.buf.len() <= size,
            "buffer size is larger than the given size: {} > {}",
            self.buf.len(),
            size
        );
        let mut buf = self.buf.clone();
        buf.resize(size, 0);
        buf
    }
}

impl Encodeable for bool {
    fn encode(&self) -> Vec<u8> {
        vec![*self as u8]
    }
}

impl Decodeable for bool {
    fn decode_from<R: std::io::Read>(reader: &mut R) -> Self {
        u8::decode_from(reader) == 1
    }
}

/// `[len: u32][bytes]`, used for variable-length strings (column names).
impl Encodeable for str {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(self.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.as_bytes());
        buf
    }
}

impl Encodeable for String {
    fn encode(&self) -> Vec<u8> {
        self.as_str().encode()
    }
}

impl Decodeable for String {
    fn decode_from<R: std::io::Read>(reader: &mut R) -> Self {
        let len = u32::decode_from(reader) as usize;
        let bytes = read_exact(reader, len);
        String::from_utf8(bytes).expect("column name is not valid utf8")
    }
}

macro_rules! impl_serialization {
    (for $($t:ty),+) => {
        $(
            impl Encodeable for $t {
                fn encode(&self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }
            }

            impl Decodeable for $t {
                fn decode_from<R: std::io::Read>(reader: &mut R) -> Self {
                    let bytes = read_exact(reader, size_of::<Self>());
                    Self::from_le_bytes(bytes.try_into().unwrap())
                }
            }
        )*
    }
}

impl_serialization!(for u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);
