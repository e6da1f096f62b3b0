//! # Dataset Generators
//!
//! Sampling from an auxiliary reference entity (a city list, a name list).
//! [`DatasetRowGenerator`] draws whole rows: on first use it loads the
//! entity through its [`RowSource`] and builds a weighted histogram over row
//! numbers, either one global histogram or one per distinct value of a
//! conditioning column (a discrete conditional distribution). Sibling
//! columns then project other fields of the most recently drawn row through
//! [`DatasetViewGenerator`], a fan-out dependency rather than an
//! independent draw.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rust_decimal::prelude::*;
use tracing::debug;

use crate::config::ColumnSpec;
use crate::error::{Result, RowGenError};
use crate::generate::histogram::HistogramGenerator;
use crate::generate::providers::{Collaborators, RowSource};
use crate::generate::value::ScalarValue;
use crate::schema::types::{ColumnMeta, ScalarType};

/// Entity columns recognized as row weights, in detection order.
const WEIGHT_COLUMNS: [&str; 3] = ["probability", "weight", "factor"];

/// Histogram key used when no conditioning column is configured.
const UNCONDITIONED: &str = "";

struct Loaded {
    rows: Vec<IndexMap<String, ScalarValue>>,
    /// One histogram over row numbers per conditioning value.
    histograms: HashMap<String, HistogramGenerator>,
}

pub struct DatasetRowGenerator {
    column: String,
    scalar_type: ScalarType,
    precision: Option<u32>,
    entity: String,
    value_column: String,
    dependency: Option<String>,
    source: Arc<dyn RowSource>,
    loaded: Option<Loaded>,
    current_row: Option<IndexMap<String, ScalarValue>>,
    current: Option<ScalarValue>,
}

impl DatasetRowGenerator {
    pub fn from_spec(
        meta: &ColumnMeta,
        spec: &ColumnSpec,
        collab: &Collaborators,
    ) -> Result<Self> {
        let column = &meta.name;
        let entity = spec.require_str(&spec.entity, "entity", column)?.to_string();
        let source = collab.row_source(&entity, column)?.clone();
        Ok(Self {
            column: column.clone(),
            scalar_type: meta.scalar_type,
            precision: meta.precision,
            entity,
            value_column: spec.column.clone().unwrap_or_else(|| column.clone()),
            dependency: spec.dependency.clone(),
            source,
            loaded: None,
            current_row: None,
            current: None,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn dependencies(&self) -> &[String] {
        self.dependency.as_slice()
    }

    /// The row drawn by the last call to `next`, projected by sibling view
    /// generators.
    pub fn current_row(&self) -> Option<&IndexMap<String, ScalarValue>> {
        self.current_row.as_ref()
    }

    pub fn current(&self) -> Option<&ScalarValue> {
        self.current.as_ref()
    }

    /// The largest row count among the per-condition histograms; past that
    /// many draws every condition has started repeating entity rows.
    /// Materializes the entity when no draw has happened yet; an entity
    /// that cannot be loaded reports no bound.
    pub fn count_hint(&self) -> u64 {
        let widest = |loaded: &Loaded| {
            loaded
                .histograms
                .values()
                .map(|h| h.bucket_count() as u64)
                .max()
                .unwrap_or(0)
        };
        match &self.loaded {
            Some(loaded) => widest(loaded),
            None => self.load().map(|l| widest(&l)).unwrap_or(u64::MAX),
        }
    }

    pub fn next(
        &mut self,
        row: &IndexMap<String, ScalarValue>,
        rng: &mut StdRng,
    ) -> Result<ScalarValue> {
        if self.loaded.is_none() {
            self.loaded = Some(self.load()?);
        }
        let key = match &self.dependency {
            Some(dependency) => row
                .get(dependency)
                .ok_or_else(|| {
                    RowGenError::runtime(
                        &self.column,
                        format!(
                            "the conditioning column '{}' has no value in the current row",
                            dependency
                        ),
                    )
                })?
                .to_string(),
            None => UNCONDITIONED.to_string(),
        };
        let Some(loaded) = self.loaded.as_mut() else {
            return Err(RowGenError::runtime(
                &self.column,
                format!("the entity '{}' is not loaded", self.entity),
            ));
        };
        let histogram = loaded.histograms.get_mut(&key).ok_or_else(|| {
            RowGenError::runtime(
                &self.column,
                format!(
                    "the entity '{}' has no rows for the conditioning value '{}'",
                    self.entity, key
                ),
            )
        })?;
        let row_number = histogram
            .next(rng)
            .as_int()
            .unwrap_or_default() as usize;
        let entity_row = loaded.rows[row_number].clone();
        let raw = entity_row.get(&self.value_column).cloned().ok_or_else(|| {
            RowGenError::runtime(
                &self.column,
                format!(
                    "the entity '{}' has no column '{}'",
                    self.entity, self.value_column
                ),
            )
        })?;
        let value = raw.cast_to(self.scalar_type, self.precision, &self.column)?;
        self.current_row = Some(entity_row);
        self.current = Some(value.clone());
        Ok(value)
    }

    pub fn reset(&mut self) {
        self.current_row = None;
        self.current = None;
        for histogram in self.loaded.iter_mut().flat_map(|l| l.histograms.values_mut()) {
            histogram.reset();
        }
    }

    /// Eagerly materialize the entity and build the per-condition weighted
    /// histograms over row numbers.
    fn load(&self) -> Result<Loaded> {
        let rows = self.source.fetch_all()?;
        if rows.is_empty() {
            return Err(RowGenError::config(
                &self.column,
                format!("the entity '{}' is empty", self.entity),
            ));
        }
        let weight_column = self
            .source
            .columns()
            .into_iter()
            .find(|c| WEIGHT_COLUMNS.contains(&c.as_str()));
        debug!(
            column = %self.column,
            entity = %self.entity,
            rows = rows.len(),
            weight_column = weight_column.as_deref().unwrap_or("<uniform>"),
            "loaded dataset entity"
        );
        let mut buckets: HashMap<String, Vec<(ScalarValue, f64)>> = HashMap::new();
        for (row_number, entity_row) in rows.iter().enumerate() {
            let weight = match &weight_column {
                Some(name) => entity_row
                    .get(name)
                    .map(|v| weight_of(v, &self.column))
                    .transpose()?
                    .unwrap_or(1.0),
                None => 1.0,
            };
            let key = match &self.dependency {
                Some(dependency) => entity_row
                    .get(dependency)
                    .map(|v| v.to_string())
                    .ok_or_else(|| {
                        RowGenError::config(
                            &self.column,
                            format!(
                                "the entity '{}' has no conditioning column '{}'",
                                self.entity, dependency
                            ),
                        )
                    })?,
                None => UNCONDITIONED.to_string(),
            };
            buckets
                .entry(key)
                .or_default()
                .push((ScalarValue::Int(row_number as i64), weight));
        }
        let histograms = buckets
            .into_iter()
            .map(|(key, pairs)| {
                HistogramGenerator::from_buckets(&self.column, pairs).map(|h| (key, h))
            })
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Loaded { rows, histograms })
    }
}

fn weight_of(value: &ScalarValue, column: &str) -> Result<f64> {
    match value {
        ScalarValue::Int(i) => Ok(*i as f64),
        ScalarValue::Float(f) => Ok(*f),
        ScalarValue::Decimal(d) => d.to_f64().ok_or_else(|| {
            RowGenError::config(column, format!("the weight ({}) is not representable", d))
        }),
        other => Err(RowGenError::config(
            column,
            format!("the weight ({}) is not numeric", other),
        )),
    }
}

/// Projects one field of the row most recently drawn by a sibling
/// [`DatasetRowGenerator`]. Serves both the explicit-field and the
/// named-after-the-column flavors.
pub struct DatasetViewGenerator {
    column: String,
    scalar_type: ScalarType,
    precision: Option<u32>,
    parent: String,
    field: String,
    current: Option<ScalarValue>,
}

impl DatasetViewGenerator {
    /// Explicit projection: the `column` property names the entity field.
    pub fn column_view(meta: &ColumnMeta, spec: &ColumnSpec) -> Result<Self> {
        let field = spec
            .require_str(&spec.column, "column", &meta.name)?
            .to_string();
        Self::new(meta, spec, field)
    }

    /// Implicit projection: the entity field carries the generated column's
    /// own name.
    pub fn meta_view(meta: &ColumnMeta, spec: &ColumnSpec) -> Result<Self> {
        Self::new(meta, spec, meta.name.clone())
    }

    fn new(meta: &ColumnMeta, spec: &ColumnSpec, field: String) -> Result<Self> {
        let parent = spec
            .require_str(&spec.parent, "parent", &meta.name)?
            .to_string();
        Ok(Self {
            column: meta.name.clone(),
            scalar_type: meta.scalar_type,
            precision: meta.precision,
            parent,
            field,
            current: None,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// The sibling column whose row generator this view projects from.
    pub fn parent(&self) -> &str {
        &self.parent
    }

    pub fn dependencies(&self) -> &[String] {
        std::slice::from_ref(&self.parent)
    }

    pub fn next(&mut self, parent_row: Option<&IndexMap<String, ScalarValue>>) -> Result<ScalarValue> {
        let parent_row = parent_row.ok_or_else(|| {
            RowGenError::runtime(
                &self.column,
                format!("the parent row generator '{}' has not drawn a row yet", self.parent),
            )
        })?;
        let raw = parent_row.get(&self.field).cloned().ok_or_else(|| {
            RowGenError::runtime(
                &self.column,
                format!("the drawn entity row has no column '{}'", self.field),
            )
        })?;
        let value = raw.cast_to(self.scalar_type, self.precision, &self.column)?;
        self.current = Some(value.clone());
        Ok(value)
    }

    pub fn current(&self) -> Option<&ScalarValue> {
        self.current.as_ref()
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::providers::MemoryRowSource;
    use rand::SeedableRng;

    fn cities() -> MemoryRowSource {
        MemoryRowSource::new("cities", vec!["name", "country", "weight"])
            .push_row(vec![
                ScalarValue::Text("Paris".into()),
                ScalarValue::Text("FR".into()),
                ScalarValue::Int(3),
            ])
            .push_row(vec![
                ScalarValue::Text("Lyon".into()),
                ScalarValue::Text("FR".into()),
                ScalarValue::Int(1),
            ])
            .push_row(vec![
                ScalarValue::Text("Berlin".into()),
                ScalarValue::Text("DE".into()),
                ScalarValue::Int(2),
            ])
    }

    fn collaborators() -> Collaborators {
        Collaborators::new().with_row_source(Arc::new(cities()))
    }

    #[test]
    fn test_unconditioned_draw_projects_value_column() {
        let meta = ColumnMeta::new("city", ScalarType::Text);
        let spec = ColumnSpec::dataset("cities").with_value_column("name");
        let mut generator =
            DatasetRowGenerator::from_spec(&meta, &spec, &collaborators()).unwrap();
        let mut rng = StdRng::seed_from_u64(17);
        let row = IndexMap::new();
        for _ in 0..50 {
            let v = generator.next(&row, &mut rng).unwrap();
            let s = v.as_text().unwrap();
            assert!(["Paris", "Lyon", "Berlin"].contains(&s), "{}", s);
        }
        assert!(generator.current_row().is_some());
    }

    #[test]
    fn test_conditional_draw_follows_dependency() {
        let meta = ColumnMeta::new("city", ScalarType::Text);
        let spec = ColumnSpec::dataset("cities")
            .with_value_column("name")
            .with_dependency("country");
        let mut generator =
            DatasetRowGenerator::from_spec(&meta, &spec, &collaborators()).unwrap();
        let mut rng = StdRng::seed_from_u64(23);

        let mut row = IndexMap::new();
        row.insert("country".to_string(), ScalarValue::Text("DE".into()));
        for _ in 0..20 {
            assert_eq!(
                generator.next(&row, &mut rng).unwrap(),
                ScalarValue::Text("Berlin".into())
            );
        }

        row.insert("country".to_string(), ScalarValue::Text("FR".into()));
        for _ in 0..20 {
            let v = generator.next(&row, &mut rng).unwrap();
            let s = v.as_text().unwrap().to_string();
            assert!(["Paris", "Lyon"].contains(&s.as_str()), "{}", s);
        }
    }

    #[test]
    fn test_uncovered_dependency_value_is_a_runtime_error() {
        let meta = ColumnMeta::new("city", ScalarType::Text);
        let spec = ColumnSpec::dataset("cities")
            .with_value_column("name")
            .with_dependency("country");
        let mut generator =
            DatasetRowGenerator::from_spec(&meta, &spec, &collaborators()).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut row = IndexMap::new();
        row.insert("country".to_string(), ScalarValue::Text("XX".into()));
        assert!(matches!(
            generator.next(&row, &mut rng),
            Err(RowGenError::RuntimeGeneration { .. })
        ));
    }

    #[test]
    fn test_count_hint_is_widest_condition_group() {
        let meta = ColumnMeta::new("city", ScalarType::Text);
        let spec = ColumnSpec::dataset("cities").with_value_column("name");
        let generator = DatasetRowGenerator::from_spec(&meta, &spec, &collaborators()).unwrap();
        // One global histogram over all three entity rows.
        assert_eq!(generator.count_hint(), 3);

        let spec = ColumnSpec::dataset("cities")
            .with_value_column("name")
            .with_dependency("country");
        let generator = DatasetRowGenerator::from_spec(&meta, &spec, &collaborators()).unwrap();
        // FR covers two rows, DE one; the widest group bounds the count.
        assert_eq!(generator.count_hint(), 2);

        let single = MemoryRowSource::new("one_city", vec!["name"])
            .push_row(vec![ScalarValue::Text("Paris".into())]);
        let collab = Collaborators::new().with_row_source(Arc::new(single));
        let spec = ColumnSpec::dataset("one_city").with_value_column("name");
        let generator = DatasetRowGenerator::from_spec(&meta, &spec, &collab).unwrap();
        assert_eq!(generator.count_hint(), 1);
    }

    #[test]
    fn test_view_projects_last_drawn_row() {
        let meta = ColumnMeta::new("country", ScalarType::Text);
        let spec = ColumnSpec::new(crate::config::GeneratorKind::Dataset)
            .with_parent("city")
            .with_value_column("country");
        let mut view = DatasetViewGenerator::column_view(&meta, &spec).unwrap();

        let mut parent_row = IndexMap::new();
        parent_row.insert("name".to_string(), ScalarValue::Text("Paris".into()));
        parent_row.insert("country".to_string(), ScalarValue::Text("FR".into()));
        assert_eq!(
            view.next(Some(&parent_row)).unwrap(),
            ScalarValue::Text("FR".into())
        );
        assert_eq!(view.dependencies(), ["city"]);

        // Before any parent draw, projection fails.
        assert!(view.next(None).is_err());
    }

    #[test]
    fn test_meta_view_uses_own_column_name() {
        let meta = ColumnMeta::new("country", ScalarType::Text);
        let spec = ColumnSpec::new(crate::config::GeneratorKind::DatasetMeta).with_parent("city");
        let mut view = DatasetViewGenerator::meta_view(&meta, &spec).unwrap();
        let mut parent_row = IndexMap::new();
        parent_row.insert("country".to_string(), ScalarValue::Text("DE".into()));
        assert_eq!(
            view.next(Some(&parent_row)).unwrap(),
            ScalarValue::Text("DE".into())
        );
    }

    #[test]
    fn test_missing_entity_source_rejected() {
        let meta = ColumnMeta::new("city", ScalarType::Text);
        let spec = ColumnSpec::dataset("nowhere");
        assert!(matches!(
            DatasetRowGenerator::from_spec(&meta, &spec, &Collaborators::new()),
            Err(RowGenError::Configuration { .. })
        ));
    }
}
