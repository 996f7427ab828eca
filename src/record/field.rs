//! Typed field values stored inside a row (spec.md §3, "Tuple").
//!
//! Grounded on `original_source/src/record/row.cpp`'s per-field
//! serialisation call and `small-db::row::Field`'s discriminated-union
//! shape; the original's `field.cpp` was not part of the retrieved
//! source, so the exact on-disk field layout is an Open Question this
//! crate resolves on its own (see DESIGN.md): every field is written as
//! `[is_null: bool]` followed by the payload when not null, and a `Char`
//! payload is self-describing (`[len: u32][bytes]`) rather than relying on
//! the owning column's declared length.

use crate::io::{read_exact, Decodeable, Encodeable};

/// The wire/column type discriminator, matching the original's `TypeId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeId {
    Int,
    Float,
    Char,
}

impl Encodeable for TypeId {
    fn encode(&self) -> Vec<u8> {
        let tag: u32 = match self {
            TypeId::Int => 0,
            TypeId::Float => 1,
            TypeId::Char => 2,
        };
        tag.encode()
    }
}

impl Decodeable for TypeId {
    fn decode_from<R: std::io::Read>(reader: &mut R) -> Self {
        match u32::decode_from(reader) {
            0 => TypeId::Int,
            1 => TypeId::Float,
            2 => TypeId::Char,
            other => panic!("unknown TypeId tag {}", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Int(Option<i32>),
    Float(Option<f32>),
    Char(Option<Vec<u8>>),
}

impl Field {
    pub fn type_id(&self) -> TypeId {
        match self {
            Field::Int(_) => TypeId::Int,
            Field::Float(_) => TypeId::Float,
            Field::Char(_) => TypeId::Char,
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Field::Int(v) => v.is_none(),
            Field::Float(v) => v.is_none(),
            Field::Char(v) => v.is_none(),
        }
    }

    /// Decodes a field of the given column type from `reader`. Unlike
    /// [`Decodeable`], this needs the type as external context, the same
    /// way the original's `Field::DeserializeFrom` takes a `TypeId`.
    pub fn decode_typed<R: std::io::Read>(type_id: TypeId, reader: &mut R) -> Self {
        let is_null = bool::decode_from(reader);
        match type_id {
            TypeId::Int => {
                if is_null {
                    Field::Int(None)
                } else {
                    Field::Int(Some(i32::decode_from(reader)))
                }
            }
            TypeId::Float => {
                if is_null {
                    Field::Float(None)
                } else {
                    Field::Float(Some(f32::decode_from(reader)))
                }
            }
            TypeId::Char => {
                if is_null {
                    Field::Char(None)
                } else {
                    let len = u32::decode_from(reader) as usize;
                    Field::Char(Some(read_exact(reader, len)))
                }
            }
        }
    }
}

impl Encodeable for Field {
    fn encode(&self) -> Vec<u8> {
        let mut buf = self.is_null().encode();
        match self {
            Field::Int(Some(v)) => buf.extend(v.encode()),
            Field::Float(Some(v)) => buf.extend(v.encode()),
            Field::Char(Some(bytes)) => {
                buf.extend((bytes.len() as u32).encode());
                buf.extend_from_slice(bytes);
            }
            _ => {}
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(type_id: TypeId, f: Field) {
        let bytes = f.encode();
        let mut cursor = std::io::Cursor::new(bytes);
        let decoded = Field::decode_typed(type_id, &mut cursor);
        assert_eq!(decoded, f);
    }

    #[test]
    fn int_roundtrip() {
        roundtrip(TypeId::Int, Field::Int(Some(42)));
        roundtrip(TypeId::Int, Field::Int(None));
    }

    #[test]
    fn float_roundtrip() {
        roundtrip(TypeId::Float, Field::Float(Some(1.5)));
    }

    #[test]
    fn char_roundtrip() {
        roundtrip(TypeId::Char, Field::Char(Some(b"hello".to_vec())));
        roundtrip(TypeId::Char, Field::Char(None));
    }
}
