//! Schema: an ordered column list plus an `is_manage` flag (spec.md §6),
//! grounded on `original_source/src/record/schema.cpp`.

use crate::error::{StorageError, StorageResult};
use crate::io::{Decodeable, Encodeable};

use super::column::Column;

pub const SCHEMA_MAGIC_NUM: u32 = 0x9A3E_6B12;

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub columns: Vec<Column>,
    pub is_manage: bool,
}

impl Schema {
    pub fn new(columns: Vec<Column>, is_manage: bool) -> Self {
        Self { columns, is_manage }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

impl Encodeable for Schema {
    fn encode(&self) -> Vec<u8> {
        let mut buf = SCHEMA_MAGIC_NUM.encode();
        buf.extend((self.columns.len() as u32).encode());
        for column in &self.columns {
            buf.extend(column.encode());
        }
        buf.extend(self.is_manage.encode());
        buf
    }
}

impl Schema {
    pub fn decode_from<R: std::io::Read>(reader: &mut R) -> StorageResult<Self> {
        let magic = u32::decode_from(reader);
        if magic != SCHEMA_MAGIC_NUM {
            return Err(StorageError::Corruption(format!(
                "schema magic mismatch: expected {:#x}, got {:#x}",
                SCHEMA_MAGIC_NUM, magic
            )));
        }
        let column_count = u32::decode_from(reader) as usize;
        let mut columns = Vec::with_capacity(column_count);
        for _ in 0..column_count {
            columns.push(Column::decode_from(reader)?);
        }
        let is_manage = bool::decode_from(reader);
        Ok(Self { columns, is_manage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let schema = Schema::new(
            vec![
                Column::new_int("id", 0, false, true),
                Column::new_char("name", 32, 1, true, false),
            ],
            true,
        );
        let bytes = schema.encode();
        let mut cursor = std::io::Cursor::new(bytes);
        let decoded = Schema::decode_from(&mut cursor).unwrap();
        assert_eq!(decoded, schema);
    }
}
