//! # Generator Graph
//!
//! Owns one generator per generated column and drives them one row at a
//! time. Construction resolves parent references by column name with an
//! idempotent get-or-create walk; a column revisited while its own
//! construction is in flight is a configuration error, which turns
//! misconfigured cyclic parents into an early rejection instead of a stack
//! overflow. Evaluation follows a topological order, so a generator always
//! sees its dependencies' values for the current row.
//!
//! A graph is single-owner state: tick counters and cached current values
//! are plain fields, not synchronized. Parallel batch generation means one
//! graph per worker, never one graph across workers.

pub(crate) mod topo;

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::config::ColumnSpec;
use crate::error::{Result, RowGenError};
use crate::generate::generator::{Generator, TickContext};
use crate::generate::providers::Collaborators;
use crate::generate::ticker::TickCoordinator;
use crate::generate::value::ScalarValue;
use crate::schema::types::RelationMeta;

pub struct GeneratorGraph {
    relation: RelationMeta,
    generators: Vec<Generator>,
    index: HashMap<String, usize>,
    order: Vec<usize>,
    coordinator: TickCoordinator,
    rng: StdRng,
    ticks: u64,
}

impl GeneratorGraph {
    /// Build every generator the spec map declares, validate the dependency
    /// structure, and wire the tick chains. `seed` pins the shared random
    /// stream so a session is reproducible.
    pub fn build(
        relation: RelationMeta,
        specs: &IndexMap<String, ColumnSpec>,
        collab: &Collaborators,
        seed: u64,
    ) -> Result<Self> {
        let mut builder = Builder {
            relation: &relation,
            specs,
            collab,
            states: HashMap::new(),
            generators: Vec::with_capacity(specs.len()),
        };
        for name in specs.keys() {
            builder.get_or_create(name)?;
        }
        let generators = builder.generators;
        let index: HashMap<String, usize> = generators
            .iter()
            .enumerate()
            .map(|(slot, g)| (g.column().to_string(), slot))
            .collect();

        let mut edges = Vec::new();
        for (slot, generator) in generators.iter().enumerate() {
            for dependency in generator.dependencies() {
                // Unknown names were already rejected during construction.
                if let Some(&dep) = index.get(dependency) {
                    edges.push((dep, slot));
                }
            }
        }
        let order = topo::evaluation_order(generators.len(), &edges)?;

        let mut generators = generators;
        let coordinator = TickCoordinator::build(&mut generators, &index)?;
        debug!(
            relation = %relation.name,
            generators = generators.len(),
            chained = !coordinator.is_empty(),
            "generator graph built"
        );
        Ok(Self {
            relation,
            generators,
            index,
            order,
            coordinator,
            rng: StdRng::seed_from_u64(seed),
            ticks: 0,
        })
    }

    pub fn relation(&self) -> &RelationMeta {
        &self.relation
    }

    /// Rows produced since construction or the last reset.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn generator(&self, column: &str) -> Option<&Generator> {
        self.index.get(column).map(|&slot| &self.generators[slot])
    }

    /// Generated column names in relation declaration order.
    pub fn columns(&self) -> Vec<&str> {
        self.relation
            .columns
            .keys()
            .filter(|name| self.index.contains_key(name.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Produce one row: every generator draws once, dependencies first,
    /// then pending odometer rollovers carry into the next row.
    pub fn next_row(&mut self) -> Result<IndexMap<String, ScalarValue>> {
        let mut values: IndexMap<String, ScalarValue> =
            IndexMap::with_capacity(self.generators.len());
        let mut rows: HashMap<String, IndexMap<String, ScalarValue>> = HashMap::new();
        for &slot in &self.order {
            let value = {
                let ctx = TickContext {
                    values: &values,
                    rows: &rows,
                };
                self.generators[slot].next(&ctx, &mut self.rng)?
            };
            let generator = &self.generators[slot];
            if let Some(drawn) = generator.current_row() {
                rows.insert(generator.column().to_string(), drawn.clone());
            }
            values.insert(generator.column().to_string(), value);
        }
        self.coordinator.propagate(&mut self.generators);
        self.ticks += 1;

        // Hand the row back in declaration order, not evaluation order.
        let mut row = IndexMap::with_capacity(values.len());
        for name in self.relation.columns.keys() {
            if let Some(value) = values.shift_remove(name) {
                row.insert(name.clone(), value);
            }
        }
        row.extend(values);
        Ok(row)
    }

    /// Effective count of one generated column: its intrinsic hint combined
    /// across the graph (odometer chains multiply, expressions and views
    /// inherit their parents' bottleneck), capped by the relation's declared
    /// row count. `None` when the column has no generator.
    pub fn count(&self, column: &str) -> Option<u64> {
        let &slot = self.index.get(column)?;
        let cap = self.relation.declared_row_count.unwrap_or(u64::MAX);
        Some(cap.min(self.effective_count(slot)))
    }

    /// How many rows this graph can produce before a key generator
    /// exhausts: the minimum count over primary and unique key columns,
    /// capped by the relation's declared row count.
    pub fn row_capacity(&self) -> u64 {
        let mut capacity = self.relation.declared_row_count.unwrap_or(u64::MAX);
        for (slot, generator) in self.generators.iter().enumerate() {
            let key_member = self
                .relation
                .columns
                .get(generator.column())
                .map(|c| c.primary_key_member || c.unique_key_member)
                .unwrap_or(false);
            if key_member {
                capacity = capacity.min(self.effective_count(slot));
            }
        }
        capacity
    }

    fn effective_count(&self, slot: usize) -> u64 {
        match &self.generators[slot] {
            Generator::Sequence(sequence) => {
                let counts: Vec<u64> = self.generators.iter().map(|g| g.count_hint()).collect();
                if let Some(product) = self.coordinator.chain_product(slot, &counts) {
                    product
                } else if sequence.wraps() {
                    // A solo wrapping sequence redraws indefinitely.
                    u64::MAX
                } else {
                    sequence.count_hint()
                }
            }
            Generator::Expression(expression) => expression
                .dependencies()
                .iter()
                .filter_map(|name| self.index.get(name))
                .map(|&dep| self.effective_count(dep))
                .min()
                .unwrap_or(u64::MAX),
            Generator::DatasetColumn(view) | Generator::DatasetMetaColumn(view) => self
                .index
                .get(view.parent())
                .map(|&dep| self.effective_count(dep))
                .unwrap_or(u64::MAX),
            other => other.count_hint(),
        }
    }

    /// Rewind every generator to its pre-draw state. The shared random
    /// stream is not reseeded; use a fresh graph for bit-identical replay.
    pub fn reset(&mut self) {
        for generator in &mut self.generators {
            generator.reset();
        }
        self.ticks = 0;
    }
}

impl fmt::Debug for GeneratorGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorGraph")
            .field("relation", &self.relation.name)
            .field("generators", &self.generators.len())
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

/// Construction-time state: the in-progress marker turns cyclic parent
/// references into configuration errors.
struct Builder<'a> {
    relation: &'a RelationMeta,
    specs: &'a IndexMap<String, ColumnSpec>,
    collab: &'a Collaborators,
    states: HashMap<String, BuildState>,
    generators: Vec<Generator>,
}

enum BuildState {
    InProgress,
    Built(usize),
}

impl Builder<'_> {
    fn get_or_create(&mut self, name: &str) -> Result<usize> {
        match self.states.get(name) {
            Some(BuildState::Built(slot)) => return Ok(*slot),
            Some(BuildState::InProgress) => {
                return Err(RowGenError::config(
                    name,
                    "the column takes part in a dependency cycle (or references itself)",
                ))
            }
            None => {}
        }
        let spec = self.specs.get(name).ok_or_else(|| {
            RowGenError::config(
                name,
                "the column is referenced as a parent but has no generator spec",
            )
        })?;
        let meta = self.relation.resolve_column(name)?;
        self.states
            .insert(name.to_string(), BuildState::InProgress);
        for dependency in spec_dependencies(spec) {
            self.get_or_create(&dependency)?;
        }
        let generator = Generator::from_spec(meta, spec, self.collab)?;
        let slot = self.generators.len();
        self.generators.push(generator);
        self.states
            .insert(name.to_string(), BuildState::Built(slot));
        Ok(slot)
    }
}

/// Same-relation columns a spec refers to by name.
fn spec_dependencies(spec: &ColumnSpec) -> Vec<String> {
    let mut deps = Vec::new();
    if let Some(parents) = &spec.parents {
        deps.extend(parents.iter().cloned());
    }
    if let Some(dependency) = &spec.dependency {
        deps.push(dependency.clone());
    }
    if let Some(parent) = &spec.parent {
        deps.push(parent.clone());
    }
    if let Some(ticker) = &spec.ticker_for {
        deps.push(ticker.clone());
    }
    deps
}
