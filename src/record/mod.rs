pub mod column;
pub mod field;
pub mod row;
pub mod schema;

pub use column::Column;
pub use field::{Field, TypeId};
pub use row::Row;
pub use schema::Schema;
