//! # Foreign Column Generator
//!
//! Produces values guaranteed to exist in a referenced parent column, so
//! generated rows satisfy referential integrity without insert-time checks.
//!
//! Two modes, picked at construction. When the parent key is itself a
//! generated sequence, the generator samples uniformly inside the
//! sequence's closed-form domain, on the sequence's step lattice; every
//! draw is O(1) and the parent data is never read. When the parent data
//! pre-exists externally, the referenced column is scanned once and a
//! uniform histogram is built over the distinct observed values.

use std::sync::Arc;

use rand::rngs::StdRng;
use tracing::debug;

use crate::config::{ColumnSpec, GeneratorKind};
use crate::error::{Result, RowGenError};
use crate::generate::histogram::HistogramGenerator;
use crate::generate::providers::{Collaborators, ParentRelation, RowSource};
use crate::generate::random::RandomGenerator;
use crate::generate::sequence::SequenceGenerator;
use crate::generate::value::ScalarValue;
use crate::schema::types::ColumnMeta;

enum Mode {
    /// Uniform sampling over a generated parent sequence's domain.
    Sampled(RandomGenerator),
    /// Uniform pool of distinct values observed in external parent data.
    Pool(HistogramGenerator),
}

pub struct ForeignColumnGenerator {
    column: String,
    mode: Mode,
    current: Option<ScalarValue>,
}

impl ForeignColumnGenerator {
    pub fn from_spec(
        meta: &ColumnMeta,
        spec: &ColumnSpec,
        collab: &Collaborators,
    ) -> Result<Self> {
        let column = &meta.name;
        let relation_name = spec.require_str(&spec.relation, "relation", column)?;
        let key_column = spec.require_str(&spec.column, "column", column)?;
        let parent = collab.parent_relation(relation_name, column)?;

        let mode = match parent.specs.get(key_column) {
            Some(parent_spec) => Mode::Sampled(sampled_mode(meta, parent, key_column, parent_spec)?),
            None => match &parent.source {
                Some(source) => Mode::Pool(pool_mode(meta, parent, key_column, source)?),
                None => {
                    return Err(RowGenError::config(
                        column,
                        format!(
                            "the parent column '{}.{}' is neither generated nor externally backed",
                            relation_name, key_column
                        ),
                    ))
                }
            },
        };
        Ok(Self {
            column: column.clone(),
            mode,
            current: None,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn next(&mut self, rng: &mut StdRng) -> ScalarValue {
        let value = match &mut self.mode {
            Mode::Sampled(random) => random.next(rng),
            Mode::Pool(pool) => pool.next(rng),
        };
        self.current = Some(value.clone());
        value
    }

    pub fn current(&self) -> Option<&ScalarValue> {
        self.current.as_ref()
    }

    pub fn count_hint(&self) -> u64 {
        u64::MAX
    }

    pub fn reset(&mut self) {
        self.current = None;
        match &mut self.mode {
            Mode::Sampled(random) => random.reset(),
            Mode::Pool(pool) => pool.reset(),
        }
    }
}

/// Mirror a generated parent sequence: sample inside its domain after
/// `declared_row_count` ticks, stepping on the same lattice.
fn sampled_mode(
    meta: &ColumnMeta,
    parent: &ParentRelation,
    key_column: &str,
    parent_spec: &ColumnSpec,
) -> Result<RandomGenerator> {
    let column = &meta.name;
    if parent_spec.kind != GeneratorKind::Sequence {
        return Err(RowGenError::UnsupportedType {
            column: column.clone(),
            kind: parent_spec.kind.as_str(),
            scalar_type: format!("foreign key target '{}.{}'", parent.meta.name, key_column),
        });
    }
    let size = parent.meta.declared_row_count.ok_or_else(|| {
        RowGenError::config(
            column,
            format!(
                "the parent relation '{}' declares no row count; the key domain is unknown",
                parent.meta.name
            ),
        )
    })?;
    let parent_meta = parent.meta.resolve_column(key_column)?;
    let sequence = SequenceGenerator::from_spec(parent_meta, parent_spec)?;
    let domain = sequence.domain(size)?;
    debug!(
        column = %column,
        parent = %parent.meta.name,
        key = %key_column,
        min = %domain.min,
        max = %domain.max,
        "foreign column mirrors a generated sequence domain"
    );
    let step = match parent_spec.step {
        Some(n) => Some(n.as_i64(column, "step")?),
        None => None,
    };
    // Errors carry the foreign column's name, not the parent's.
    let mut bounds_meta = parent_meta.clone();
    bounds_meta.name = column.clone();
    RandomGenerator::from_parts(&bounds_meta, domain.min, domain.max, step)
}

/// Scan external parent data once and pool its distinct key values.
fn pool_mode(
    meta: &ColumnMeta,
    parent: &ParentRelation,
    key_column: &str,
    source: &Arc<dyn RowSource>,
) -> Result<HistogramGenerator> {
    let column = &meta.name;
    let rows = source.fetch_all()?;
    let mut distinct: Vec<(String, ScalarValue)> = Vec::new();
    for row in &rows {
        let raw = row.get(key_column).cloned().ok_or_else(|| {
            RowGenError::config(
                column,
                format!(
                    "the parent relation '{}' has no column '{}'",
                    parent.meta.name, key_column
                ),
            )
        })?;
        let value = raw.cast_to(meta.scalar_type, meta.precision, column)?;
        let repr = value.to_string();
        if !distinct.iter().any(|(seen, _)| *seen == repr) {
            distinct.push((repr, value));
        }
    }
    debug!(
        column = %column,
        parent = %parent.meta.name,
        key = %key_column,
        scanned = rows.len(),
        distinct = distinct.len(),
        "foreign column pooled external key values"
    );
    HistogramGenerator::from_buckets(
        column,
        distinct.into_iter().map(|(_, v)| (v, 1.0)).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::providers::{MemoryRowSource, RowSource};
    use crate::schema::types::{RelationMeta, ScalarType};
    use indexmap::IndexMap;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn customers_meta() -> RelationMeta {
        RelationMeta::new("customers")
            .with_row_count(100)
            .with_column(ColumnMeta::new("id", ScalarType::Int).primary_key())
    }

    /// Counts fetches so tests can assert the parent data is never read.
    struct CountingSource {
        inner: MemoryRowSource,
        fetches: AtomicUsize,
    }

    impl RowSource for CountingSource {
        fn name(&self) -> &str {
            self.inner.name()
        }
        fn columns(&self) -> Vec<String> {
            self.inner.columns()
        }
        fn fetch_all(&self) -> crate::error::Result<Vec<IndexMap<String, ScalarValue>>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_all()
        }
    }

    #[test]
    fn test_generated_parent_draws_inside_key_domain_without_scanning() {
        let counting = Arc::new(CountingSource {
            inner: MemoryRowSource::new("customers", vec!["id"]),
            fetches: AtomicUsize::new(0),
        });
        let mut specs = IndexMap::new();
        specs.insert("id".to_string(), ColumnSpec::sequence());
        let parent = ParentRelation {
            meta: customers_meta(),
            specs,
            source: Some(counting.clone() as Arc<dyn RowSource>),
        };
        let collab = Collaborators::new().with_parent_relation(parent);

        let meta = ColumnMeta::new("customer_id", ScalarType::Int);
        let spec = ColumnSpec::foreign_column("customers", "id");
        let mut generator = ForeignColumnGenerator::from_spec(&meta, &spec, &collab).unwrap();

        let mut rng = StdRng::seed_from_u64(31);
        for _ in 0..1000 {
            let v = generator.next(&mut rng).as_int().unwrap();
            assert!((1..=100).contains(&v), "{}", v);
        }
        assert_eq!(counting.fetches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_external_parent_pools_distinct_values() {
        let source = MemoryRowSource::new("countries", vec!["code"])
            .push_row(vec![ScalarValue::Text("FR".into())])
            .push_row(vec![ScalarValue::Text("DE".into())])
            .push_row(vec![ScalarValue::Text("FR".into())]);
        let meta = RelationMeta::new("countries")
            .with_column(ColumnMeta::new("code", ScalarType::Text));
        let collab = Collaborators::new()
            .with_parent_relation(ParentRelation::external(meta, Arc::new(source)));

        let col = ColumnMeta::new("country_code", ScalarType::Text);
        let spec = ColumnSpec::foreign_column("countries", "code");
        let mut generator = ForeignColumnGenerator::from_spec(&col, &spec, &collab).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            let v = generator.next(&mut rng);
            let s = v.as_text().unwrap();
            assert!(["FR", "DE"].contains(&s), "{}", s);
        }
    }

    #[test]
    fn test_non_sequence_parent_generator_is_unsupported() {
        let mut specs = IndexMap::new();
        specs.insert("id".to_string(), ColumnSpec::random());
        let collab = Collaborators::new()
            .with_parent_relation(ParentRelation::generated(customers_meta(), specs));

        let meta = ColumnMeta::new("customer_id", ScalarType::Int);
        let spec = ColumnSpec::foreign_column("customers", "id");
        assert!(matches!(
            ForeignColumnGenerator::from_spec(&meta, &spec, &collab),
            Err(RowGenError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_unbacked_parent_column_rejected() {
        let collab = Collaborators::new().with_parent_relation(ParentRelation::generated(
            customers_meta(),
            IndexMap::new(),
        ));
        let meta = ColumnMeta::new("customer_id", ScalarType::Int);
        let spec = ColumnSpec::foreign_column("customers", "id");
        assert!(matches!(
            ForeignColumnGenerator::from_spec(&meta, &spec, &collab),
            Err(RowGenError::Configuration { .. })
        ));
    }
}
