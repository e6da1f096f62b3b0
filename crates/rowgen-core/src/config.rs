//! # Column Generator Configuration
//!
//! `ColumnSpec` is the declarative property map describing how one column's
//! values are generated. It deserializes from JSON or TOML (one map per
//! column), e.g.:
//!
//! ```toml
//! [columns.order_date]
//! type = "sequence"
//! start = "2021-01-01"
//! step = -1
//! offset = -1
//!
//! [columns.city]
//! type = "dataset"
//! entity = "cities"
//! column = "name"
//! dependency = "country"
//!
//! [columns.customer_id]
//! type = "foreignColumn"
//! relation = "customers"
//! column = "id"
//! ```
//!
//! Unknown keys are ignored; missing mandatory keys and malformed literals
//! are rejected when the generator graph is built, before any row is
//! produced. Literal values (`start`, `min`, `values`, bucket keys, ...)
//! stay untyped here and are converted to `ScalarValue` against the target
//! column's declared type during validation.

use serde::Deserialize;

use crate::error::{Result, RowGenError};

/// The closed set of generator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum GeneratorKind {
    #[serde(rename = "sequence")]
    Sequence,
    #[serde(rename = "histogram")]
    Histogram,
    #[serde(rename = "random")]
    Random,
    #[serde(rename = "expression")]
    Expression,
    #[serde(rename = "dataset")]
    Dataset,
    #[serde(rename = "datasetMeta")]
    DatasetMeta,
    #[serde(rename = "foreignColumn")]
    ForeignColumn,
    #[serde(rename = "regexp")]
    Regexp,
    #[serde(rename = "meta")]
    Meta,
}

impl GeneratorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratorKind::Sequence => "sequence",
            GeneratorKind::Histogram => "histogram",
            GeneratorKind::Random => "random",
            GeneratorKind::Expression => "expression",
            GeneratorKind::Dataset => "dataset",
            GeneratorKind::DatasetMeta => "datasetMeta",
            GeneratorKind::ForeignColumn => "foreignColumn",
            GeneratorKind::Regexp => "regexp",
            GeneratorKind::Meta => "meta",
        }
    }
}

/// A sign-bearing numeric property (`step`, `offset`). Kept as parsed so
/// integer-typed columns can reject fractional steps instead of silently
/// truncating them.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ConfigNumber {
    Int(i64),
    Float(f64),
}

impl ConfigNumber {
    /// The value as an integer; fractional values are a configuration error.
    pub fn as_i64(&self, column: &str, key: &str) -> Result<i64> {
        match self {
            ConfigNumber::Int(i) => Ok(*i),
            ConfigNumber::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
            ConfigNumber::Float(f) => Err(RowGenError::config(
                column,
                format!("the '{}' property ({}) must be an integer", key, f),
            )),
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            ConfigNumber::Int(i) => *i as f64,
            ConfigNumber::Float(f) => *f,
        }
    }
}

/// Declarative generator definition for one column.
///
/// Every kind-specific key is optional at this level; each generator's
/// validating constructor extracts what it needs and fails fast on what is
/// missing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    /// Generator kind discriminator.
    #[serde(rename = "type")]
    pub kind: GeneratorKind,

    // Sequence
    pub start: Option<serde_json::Value>,
    pub step: Option<ConfigNumber>,
    pub offset: Option<ConfigNumber>,
    pub reset: Option<bool>,
    pub max_tick: Option<u64>,
    pub ticker_for: Option<String>,
    pub values: Option<Vec<serde_json::Value>>,

    // Random
    pub min: Option<serde_json::Value>,
    pub max: Option<serde_json::Value>,

    // Histogram
    pub buckets: Option<serde_json::Value>,

    // Expression
    pub parents: Option<Vec<String>>,
    pub expression: Option<String>,

    // Dataset family
    pub entity: Option<String>,
    pub column: Option<String>,
    pub dependency: Option<String>,
    pub parent: Option<String>,

    // Foreign column
    pub relation: Option<String>,

    // Regexp
    pub seed: Option<u64>,

    // Meta attribute
    pub attribute: Option<String>,
}

impl ColumnSpec {
    /// A bare spec of the given kind; fill kind-specific keys with the
    /// builder methods below.
    pub fn new(kind: GeneratorKind) -> Self {
        Self {
            kind,
            start: None,
            step: None,
            offset: None,
            reset: None,
            max_tick: None,
            ticker_for: None,
            values: None,
            min: None,
            max: None,
            buckets: None,
            parents: None,
            expression: None,
            entity: None,
            column: None,
            dependency: None,
            parent: None,
            relation: None,
            seed: None,
            attribute: None,
        }
    }

    pub fn sequence() -> Self {
        Self::new(GeneratorKind::Sequence)
    }

    pub fn histogram() -> Self {
        Self::new(GeneratorKind::Histogram)
    }

    pub fn random() -> Self {
        Self::new(GeneratorKind::Random)
    }

    pub fn expression(expr: impl Into<String>, parents: Vec<String>) -> Self {
        let mut spec = Self::new(GeneratorKind::Expression);
        spec.expression = Some(expr.into());
        spec.parents = Some(parents);
        spec
    }

    pub fn dataset(entity: impl Into<String>) -> Self {
        let mut spec = Self::new(GeneratorKind::Dataset);
        spec.entity = Some(entity.into());
        spec
    }

    pub fn foreign_column(relation: impl Into<String>, column: impl Into<String>) -> Self {
        let mut spec = Self::new(GeneratorKind::ForeignColumn);
        spec.relation = Some(relation.into());
        spec.column = Some(column.into());
        spec
    }

    pub fn regexp(pattern: impl Into<String>) -> Self {
        let mut spec = Self::new(GeneratorKind::Regexp);
        spec.expression = Some(pattern.into());
        spec
    }

    pub fn meta(attribute: impl Into<String>) -> Self {
        let mut spec = Self::new(GeneratorKind::Meta);
        spec.attribute = Some(attribute.into());
        spec
    }

    pub fn with_start(mut self, start: serde_json::Value) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_step(mut self, step: ConfigNumber) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_offset(mut self, offset: ConfigNumber) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = Some(reset);
        self
    }

    pub fn with_max_tick(mut self, max_tick: u64) -> Self {
        self.max_tick = Some(max_tick);
        self
    }

    pub fn with_ticker_for(mut self, column: impl Into<String>) -> Self {
        self.ticker_for = Some(column.into());
        self
    }

    pub fn with_values(mut self, values: Vec<serde_json::Value>) -> Self {
        self.values = Some(values);
        self
    }

    pub fn with_min(mut self, min: serde_json::Value) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: serde_json::Value) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_buckets(mut self, buckets: serde_json::Value) -> Self {
        self.buckets = Some(buckets);
        self
    }

    pub fn with_value_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_dependency(mut self, column: impl Into<String>) -> Self {
        self.dependency = Some(column.into());
        self
    }

    pub fn with_parent(mut self, column: impl Into<String>) -> Self {
        self.parent = Some(column.into());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Parse one column spec from a JSON property map.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        serde_json::from_value(json)
            .map_err(|e| RowGenError::config("", format!("invalid column spec: {}", e)))
    }

    /// Parse one column spec from a TOML fragment.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| RowGenError::config("", format!("invalid column spec: {}", e)))
    }

    /// The mandatory string property `key`, or a configuration error naming
    /// the generator kind.
    pub(crate) fn require_str<'a>(
        &'a self,
        value: &'a Option<String>,
        key: &str,
        column: &str,
    ) -> Result<&'a str> {
        value.as_deref().ok_or_else(|| {
            RowGenError::config(
                column,
                format!(
                    "the '{}' property is mandatory for a {} generator",
                    key,
                    self.kind.as_str()
                ),
            )
        })
    }
}
