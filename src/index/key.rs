//! Key comparison for the B+ tree (spec.md §4.5: "Keys are fixed-size
//! opaque byte strings compared by an injected `KeyManager`"). Grounded on
//! `original_source/src/index/generic_key.h`'s `GenericKey` +
//! `KeyManager::CompareKeys` pairing: the tree only ever moves bytes
//! around and delegates ordering to the injected comparator.

use std::cmp::Ordering;
use std::convert::TryInto;

use crate::record::{Field, Row, Schema, TypeId};

/// A fixed-size opaque byte string. The tree never interprets the bytes
/// itself; all ordering goes through a [`KeyManager`].
pub type KeyBytes = Vec<u8>;

pub trait KeyManager: Send + Sync {
    fn key_size(&self) -> usize;
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Compares keys as big-endian `i32`s. A minimal `KeyManager` for tests
/// and single-`Int`-column indexes that don't need the full
/// [`GenericKeyManager`] machinery.
pub struct IntKeyManager;

impl KeyManager for IntKeyManager {
    fn key_size(&self) -> usize {
        4
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        let a = i32::from_be_bytes(a[0..4].try_into().unwrap());
        let b = i32::from_be_bytes(b[0..4].try_into().unwrap());
        a.cmp(&b)
    }
}

pub fn encode_int_key(value: i32) -> KeyBytes {
    value.to_be_bytes().to_vec()
}

/// Packs a row's indexed columns into a fixed-width comparable byte
/// buffer — this crate's `GenericKey` (`original_source/src/index/
/// generic_key.h`). Each column occupies `column.len` bytes in
/// `key_schema` order: `Int`/`Float` as big-endian (so byte order tracks
/// numeric order the same way `IntKeyManager` relies on), `Char` as the
/// raw column bytes padded with zeros to the declared length. Index
/// columns must be non-null; indexing a nullable column is left to
/// callers to exclude at the catalog layer (out of this crate's scope).
pub struct GenericKeyManager {
    key_schema: Schema,
}

impl GenericKeyManager {
    pub fn new(key_schema: Schema) -> Self {
        Self { key_schema }
    }

    /// Projects `row` (encoded under `schema`) onto `key_schema` and
    /// packs the result, the way `Row::GetKeyFromRow` feeds
    /// `GenericKey::SerializeFromKey`.
    pub fn key_from_row(&self, schema: &Schema, row: &Row) -> KeyBytes {
        let key_row = row.project(schema, &self.key_schema);
        self.encode(&key_row)
    }

    fn encode(&self, key_row: &Row) -> KeyBytes {
        let mut buf = Vec::with_capacity(self.key_size());
        for (col, field) in self.key_schema.columns.iter().zip(&key_row.fields) {
            match field {
                Field::Int(Some(v)) => buf.extend(v.to_be_bytes()),
                Field::Float(Some(v)) => buf.extend(v.to_be_bytes()),
                Field::Char(Some(bytes)) => {
                    let width = col.len as usize;
                    let mut padded = bytes.clone();
                    padded.resize(width, 0);
                    buf.extend(padded);
                }
                _ => panic!("index key column `{}` must not be null", col.name),
            }
        }
        buf
    }
}

impl KeyManager for GenericKeyManager {
    fn key_size(&self) -> usize {
        self.key_schema.columns.iter().map(|c| c.len as usize).sum()
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        let mut offset = 0usize;
        for col in &self.key_schema.columns {
            let width = col.len as usize;
            let a_part = &a[offset..offset + width];
            let b_part = &b[offset..offset + width];
            let ord = match col.type_id {
                TypeId::Int => i32::from_be_bytes(a_part.try_into().unwrap())
                    .cmp(&i32::from_be_bytes(b_part.try_into().unwrap())),
                TypeId::Float => f32::from_be_bytes(a_part.try_into().unwrap())
                    .partial_cmp(&f32::from_be_bytes(b_part.try_into().unwrap()))
                    .unwrap_or(Ordering::Equal),
                TypeId::Char => a_part.cmp(b_part),
            };
            if ord != Ordering::Equal {
                return ord;
            }
            offset += width;
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Column;

    fn schema() -> Schema {
        Schema::new(vec![Column::new_int("id", 0, false, true)], false)
    }

    #[test]
    fn generic_key_from_row_matches_plain_int_ordering() {
        let km = GenericKeyManager::new(schema());
        let s = schema();
        let row_a = Row::new(vec![Field::Int(Some(3))]);
        let row_b = Row::new(vec![Field::Int(Some(7))]);
        let a = km.key_from_row(&s, &row_a);
        let b = km.key_from_row(&s, &row_b);
        assert_eq!(km.compare(&a, &b), Ordering::Less);
        assert_eq!(a.len(), km.key_size());
    }

    #[test]
    fn generic_key_char_column_orders_lexicographically() {
        let key_schema = Schema::new(vec![Column::new_char("name", 8, 0, false, true)], false);
        let km = GenericKeyManager::new(key_schema.clone());
        let row_a = Row::new(vec![Field::Char(Some(b"alice".to_vec()))]);
        let row_b = Row::new(vec![Field::Char(Some(b"bob".to_vec()))]);
        let a = km.key_from_row(&key_schema, &row_a);
        let b = km.key_from_row(&key_schema, &row_b);
        assert_eq!(km.compare(&a, &b), Ordering::Less);
    }
}
