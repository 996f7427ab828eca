//! Row (tuple): `[row_id, field_count: u32, field₀...]` (spec.md §6), no
//! magic number, grounded on `original_source/src/record/row.cpp`.

use crate::io::{Decodeable, Encodeable};
use crate::types::RowId;

use super::field::Field;
use super::schema::Schema;

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub rid: RowId,
    pub fields: Vec<Field>,
}

impl Row {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            rid: RowId::INVALID,
            fields,
        }
    }

    pub fn get_field(&self, index: usize) -> &Field {
        &self.fields[index]
    }

    /// Projects a subset of this row's fields into a new row ordered by
    /// `key_schema`, the way `Row::GetKeyFromRow` builds an index key.
    pub fn project(&self, schema: &Schema, key_schema: &Schema) -> Row {
        let fields = key_schema
            .columns
            .iter()
            .map(|col| {
                let idx = schema
                    .column_index(&col.name)
                    .expect("key column missing from row's schema");
                self.fields[idx].clone()
            })
            .collect();
        Row::new(fields)
    }
}

impl Encodeable for Row {
    fn encode(&self) -> Vec<u8> {
        let mut buf = self.rid.encode();
        buf.extend((self.fields.len() as u32).encode());
        for field in &self.fields {
            buf.extend(field.encode());
        }
        buf
    }
}

impl Row {
    pub fn decode_from<R: std::io::Read>(reader: &mut R, schema: &Schema) -> Self {
        let rid = RowId::decode_from(reader);
        let field_count = u32::decode_from(reader) as usize;
        debug_assert_eq!(field_count, schema.column_count());
        let fields = schema
            .columns
            .iter()
            .map(|col| Field::decode_typed(col.type_id, reader))
            .collect();
        Self { rid, fields }
    }

    pub fn serialized_size(&self) -> usize {
        self.encode().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::column::Column;

    #[test]
    fn roundtrip() {
        let schema = Schema::new(
            vec![
                Column::new_int("id", 0, false, true),
                Column::new_char("name", 16, 1, true, false),
            ],
            false,
        );
        let mut row = Row::new(vec![
            Field::Int(Some(7)),
            Field::Char(Some(b"hello".to_vec())),
        ]);
        row.rid = RowId::new(3, 1);

        let bytes = row.encode();
        let mut cursor = std::io::Cursor::new(bytes);
        let decoded = Row::decode_from(&mut cursor, &schema);
        assert_eq!(decoded, row);
    }
}
