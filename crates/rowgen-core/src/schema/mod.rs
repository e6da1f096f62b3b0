pub mod types;

pub use types::{ColumnMeta, RelationMeta, ScalarType};
