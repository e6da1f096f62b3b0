use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RowGenError};

/// The closed set of scalar types the engine generates values for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Int,
    Float,
    Decimal,
    Date,
    Timestamp,
    Time,
    Text,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::Int => write!(f, "Int"),
            ScalarType::Float => write!(f, "Float"),
            ScalarType::Decimal => write!(f, "Decimal"),
            ScalarType::Date => write!(f, "Date"),
            ScalarType::Timestamp => write!(f, "Timestamp"),
            ScalarType::Time => write!(f, "Time"),
            ScalarType::Text => write!(f, "Text"),
        }
    }
}

/// Metadata of one target column, as declared by the catalog layer.
///
/// The catalog/introspection machinery that produces these lives outside
/// the engine; the engine only reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub scalar_type: ScalarType,
    /// Declared precision (total digits for numerics, max length for text).
    pub precision: Option<u32>,
    /// Declared scale (fractional digits) for decimal columns.
    pub scale: Option<u32>,
    pub nullable: bool,
    pub primary_key_member: bool,
    pub unique_key_member: bool,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar_type,
            precision: None,
            scale: None,
            nullable: true,
            primary_key_member: false,
            unique_key_member: false,
        }
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key_member = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique_key_member = true;
        self
    }
}

/// Metadata of the relation a generator graph produces rows for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationMeta {
    pub name: String,
    /// The maximum number of rows the session intends to produce.
    /// Caps every generator count derived from this relation.
    pub declared_row_count: Option<u64>,
    /// Columns in declaration order.
    pub columns: IndexMap<String, ColumnMeta>,
}

impl RelationMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_row_count: None,
            columns: IndexMap::new(),
        }
    }

    pub fn with_row_count(mut self, rows: u64) -> Self {
        self.declared_row_count = Some(rows);
        self
    }

    pub fn with_column(mut self, column: ColumnMeta) -> Self {
        self.columns.insert(column.name.clone(), column);
        self
    }

    /// Look a column up by name, failing with a configuration error that
    /// lists the known columns.
    pub fn resolve_column(&self, name: &str) -> Result<&ColumnMeta> {
        self.columns.get(name).ok_or_else(|| {
            RowGenError::config(
                name,
                format!(
                    "the column was not found in relation '{}' (known columns: {})",
                    self.name,
                    self.columns.keys().cloned().collect::<Vec<_>>().join(", ")
                ),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_column_lists_known_columns() {
        let relation = RelationMeta::new("users")
            .with_column(ColumnMeta::new("id", ScalarType::Int).primary_key())
            .with_column(ColumnMeta::new("name", ScalarType::Text));

        assert!(relation.resolve_column("id").is_ok());
        let err = relation.resolve_column("missing").unwrap_err();
        let msg = format!("{}", err);
        assert!(msg.contains("users"), "{}", msg);
        assert!(msg.contains("id, name"), "{}", msg);
    }

    #[test]
    fn test_primary_key_is_not_nullable() {
        let col = ColumnMeta::new("id", ScalarType::Int).primary_key();
        assert!(col.primary_key_member);
        assert!(!col.nullable);
    }
}
