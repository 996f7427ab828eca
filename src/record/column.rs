//! Column metadata (spec.md §6): `[magic, name_len, name, type, len,
//! table_ind, nullable, unique]`, grounded directly on
//! `original_source/src/record/column.cpp`'s `SerializeTo`/`DeserializeFrom`.

use crate::error::{StorageError, StorageResult};
use crate::io::{Decodeable, Encodeable};

use super::field::TypeId;

pub const COLUMN_MAGIC_NUM: u32 = 0xFD66_3551;

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub type_id: TypeId,
    /// Byte width of a non-null value: 4 for `Int`/`Float`, the declared
    /// character length for `Char`.
    pub len: u32,
    pub table_ind: u32,
    pub nullable: bool,
    pub unique: bool,
}

impl Column {
    pub fn new_int(name: impl Into<String>, table_ind: u32, nullable: bool, unique: bool) -> Self {
        Self {
            name: name.into(),
            type_id: TypeId::Int,
            len: 4,
            table_ind,
            nullable,
            unique,
        }
    }

    pub fn new_float(name: impl Into<String>, table_ind: u32, nullable: bool, unique: bool) -> Self {
        Self {
            name: name.into(),
            type_id: TypeId::Float,
            len: 4,
            table_ind,
            nullable,
            unique,
        }
    }

    pub fn new_char(
        name: impl Into<String>,
        len: u32,
        table_ind: u32,
        nullable: bool,
        unique: bool,
    ) -> Self {
        Self {
            name: name.into(),
            type_id: TypeId::Char,
            len,
            table_ind,
            nullable,
            unique,
        }
    }
}

impl Encodeable for Column {
    fn encode(&self) -> Vec<u8> {
        let mut buf = COLUMN_MAGIC_NUM.encode();
        buf.extend(self.name.encode());
        buf.extend(self.type_id.encode());
        buf.extend(self.len.encode());
        buf.extend(self.table_ind.encode());
        buf.extend(self.nullable.encode());
        buf.extend(self.unique.encode());
        buf
    }
}

impl Column {
    pub fn decode_from<R: std::io::Read>(reader: &mut R) -> StorageResult<Self> {
        let magic = u32::decode_from(reader);
        if magic != COLUMN_MAGIC_NUM {
            return Err(StorageError::Corruption(format!(
                "column magic mismatch: expected {:#x}, got {:#x}",
                COLUMN_MAGIC_NUM, magic
            )));
        }
        let name = String::decode_from(reader);
        let type_id = TypeId::decode_from(reader);
        let len = u32::decode_from(reader);
        let table_ind = u32::decode_from(reader);
        let nullable = bool::decode_from(reader);
        let unique = bool::decode_from(reader);
        Ok(Self {
            name,
            type_id,
            len,
            table_ind,
            nullable,
            unique,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let col = Column::new_char("name", 16, 0, true, false);
        let bytes = col.encode();
        let mut cursor = std::io::Cursor::new(bytes);
        let decoded = Column::decode_from(&mut cursor).unwrap();
        assert_eq!(decoded, col);
    }

    #[test]
    fn bad_magic_is_corruption() {
        let bytes = vec![0u8; 4];
        let mut cursor = std::io::Cursor::new(bytes);
        assert!(matches!(
            Column::decode_from(&mut cursor),
            Err(StorageError::Corruption(_))
        ));
    }
}
