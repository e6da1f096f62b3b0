//! Meta-attribute generator: returns one externally provided attribute
//! value, fetched once at construction and cast to the column type.

use crate::config::ColumnSpec;
use crate::error::{Result, RowGenError};
use crate::generate::providers::Collaborators;
use crate::generate::value::ScalarValue;
use crate::schema::types::ColumnMeta;

pub struct MetaAttributeGenerator {
    column: String,
    cached: ScalarValue,
    current: Option<ScalarValue>,
}

impl MetaAttributeGenerator {
    pub fn from_spec(
        meta: &ColumnMeta,
        spec: &ColumnSpec,
        collab: &Collaborators,
    ) -> Result<Self> {
        let column = &meta.name;
        let key = spec.require_str(&spec.attribute, "attribute", column)?;
        let provider = collab.attributes.as_ref().ok_or_else(|| {
            RowGenError::config(
                column,
                "a meta generator needs an attribute provider collaborator",
            )
        })?;
        let raw = provider.get(key).ok_or_else(|| {
            RowGenError::config(
                column,
                format!("the attribute '{}' is not defined by the attribute provider", key),
            )
        })?;
        let cached = raw.cast_to(meta.scalar_type, meta.precision, column)?;
        Ok(Self {
            column: column.clone(),
            cached,
            current: None,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn next(&mut self) -> ScalarValue {
        self.current = Some(self.cached.clone());
        self.cached.clone()
    }

    pub fn current(&self) -> Option<&ScalarValue> {
        self.current.as_ref()
    }

    pub fn count_hint(&self) -> u64 {
        u64::MAX
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}
