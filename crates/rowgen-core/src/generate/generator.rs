//! # Generator Contract
//!
//! One closed enum over every generator kind. The graph owns a `Generator`
//! per column and drives it through the shared contract: `next` produces
//! one value per row, `current` re-reads the last draw, `dependencies`
//! names the sibling columns that must be evaluated first, `count_hint`
//! bounds how many draws are possible, and `reset` rewinds tick state.

use std::collections::HashMap;

use indexmap::IndexMap;
use rand::rngs::StdRng;

use crate::config::{ColumnSpec, GeneratorKind};
use crate::error::Result;
use crate::generate::dataset::{DatasetRowGenerator, DatasetViewGenerator};
use crate::generate::domain::Domain;
use crate::generate::expression::ExpressionGenerator;
use crate::generate::foreign::ForeignColumnGenerator;
use crate::generate::histogram::HistogramGenerator;
use crate::generate::meta::MetaAttributeGenerator;
use crate::generate::providers::Collaborators;
use crate::generate::random::RandomGenerator;
use crate::generate::regexp::RegexpGenerator;
use crate::generate::sequence::SequenceGenerator;
use crate::generate::value::ScalarValue;
use crate::schema::types::ColumnMeta;

/// Per-row evaluation context handed to `next`: the values produced so far
/// in the current row, and the entity rows drawn by dataset row generators.
pub struct TickContext<'a> {
    pub values: &'a IndexMap<String, ScalarValue>,
    pub rows: &'a HashMap<String, IndexMap<String, ScalarValue>>,
}

pub enum Generator {
    Sequence(SequenceGenerator),
    Histogram(HistogramGenerator),
    Random(RandomGenerator),
    Expression(ExpressionGenerator),
    DatasetRow(DatasetRowGenerator),
    DatasetColumn(DatasetViewGenerator),
    DatasetMetaColumn(DatasetViewGenerator),
    ForeignColumn(ForeignColumnGenerator),
    Regexp(RegexpGenerator),
    MetaAttribute(MetaAttributeGenerator),
}

impl Generator {
    /// Build the generator a column spec describes. A `dataset` spec with a
    /// `parent` property is a projection of a sibling row generator rather
    /// than an independent draw.
    pub fn from_spec(
        meta: &ColumnMeta,
        spec: &ColumnSpec,
        collab: &Collaborators,
    ) -> Result<Self> {
        Ok(match spec.kind {
            GeneratorKind::Sequence => {
                Generator::Sequence(SequenceGenerator::from_spec(meta, spec)?)
            }
            GeneratorKind::Histogram => {
                Generator::Histogram(HistogramGenerator::from_spec(meta, spec)?)
            }
            GeneratorKind::Random => Generator::Random(RandomGenerator::from_spec(meta, spec)?),
            GeneratorKind::Expression => {
                Generator::Expression(ExpressionGenerator::from_spec(meta, spec, collab)?)
            }
            GeneratorKind::Dataset => {
                if spec.parent.is_some() {
                    Generator::DatasetColumn(DatasetViewGenerator::column_view(meta, spec)?)
                } else {
                    Generator::DatasetRow(DatasetRowGenerator::from_spec(meta, spec, collab)?)
                }
            }
            GeneratorKind::DatasetMeta => {
                Generator::DatasetMetaColumn(DatasetViewGenerator::meta_view(meta, spec)?)
            }
            GeneratorKind::ForeignColumn => {
                Generator::ForeignColumn(ForeignColumnGenerator::from_spec(meta, spec, collab)?)
            }
            GeneratorKind::Regexp => {
                Generator::Regexp(RegexpGenerator::from_spec(meta, spec, collab)?)
            }
            GeneratorKind::Meta => {
                Generator::MetaAttribute(MetaAttributeGenerator::from_spec(meta, spec, collab)?)
            }
        })
    }

    pub fn column(&self) -> &str {
        match self {
            Generator::Sequence(g) => g.column(),
            Generator::Histogram(g) => g.column(),
            Generator::Random(g) => g.column(),
            Generator::Expression(g) => g.column(),
            Generator::DatasetRow(g) => g.column(),
            Generator::DatasetColumn(g) | Generator::DatasetMetaColumn(g) => g.column(),
            Generator::ForeignColumn(g) => g.column(),
            Generator::Regexp(g) => g.column(),
            Generator::MetaAttribute(g) => g.column(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Generator::Sequence(_) => "sequence",
            Generator::Histogram(_) => "histogram",
            Generator::Random(_) => "random",
            Generator::Expression(_) => "expression",
            Generator::DatasetRow(_) => "dataset",
            Generator::DatasetColumn(_) => "dataset",
            Generator::DatasetMetaColumn(_) => "datasetMeta",
            Generator::ForeignColumn(_) => "foreignColumn",
            Generator::Regexp(_) => "regexp",
            Generator::MetaAttribute(_) => "meta",
        }
    }

    /// Sibling columns that must be evaluated before this one in the same
    /// row. A sequence depends on its tick target so the odometer parent
    /// draws first.
    pub fn dependencies(&self) -> &[String] {
        match self {
            Generator::Sequence(g) => g.dependencies(),
            Generator::Expression(g) => g.dependencies(),
            Generator::DatasetRow(g) => g.dependencies(),
            Generator::DatasetColumn(g) | Generator::DatasetMetaColumn(g) => g.dependencies(),
            _ => &[],
        }
    }

    pub fn next(&mut self, ctx: &TickContext<'_>, rng: &mut StdRng) -> Result<ScalarValue> {
        match self {
            Generator::Sequence(g) => g.next(),
            Generator::Histogram(g) => Ok(g.next(rng)),
            Generator::Random(g) => Ok(g.next(rng)),
            Generator::Expression(g) => g.next(ctx.values),
            Generator::DatasetRow(g) => g.next(ctx.values, rng),
            Generator::DatasetColumn(g) | Generator::DatasetMetaColumn(g) => {
                g.next(ctx.rows.get(g.parent()))
            }
            Generator::ForeignColumn(g) => Ok(g.next(rng)),
            Generator::Regexp(g) => g.next(rng),
            Generator::MetaAttribute(g) => Ok(g.next()),
        }
    }

    pub fn current(&self) -> Option<&ScalarValue> {
        match self {
            Generator::Sequence(g) => g.current(),
            Generator::Histogram(g) => g.current(),
            Generator::Random(g) => g.current(),
            Generator::Expression(g) => g.current(),
            Generator::DatasetRow(g) => g.current(),
            Generator::DatasetColumn(g) | Generator::DatasetMetaColumn(g) => g.current(),
            Generator::ForeignColumn(g) => g.current(),
            Generator::Regexp(g) => g.current(),
            Generator::MetaAttribute(g) => g.current(),
        }
    }

    /// Intrinsic draw bound of this generator alone; the graph combines
    /// these with chain products, dependency bottlenecks and the relation's
    /// declared row count.
    pub fn count_hint(&self) -> u64 {
        match self {
            Generator::Sequence(g) => g.count_hint(),
            Generator::Histogram(g) => g.count_hint(),
            Generator::Random(g) => g.count_hint(),
            Generator::Expression(_) => u64::MAX,
            Generator::DatasetRow(g) => g.count_hint(),
            Generator::DatasetColumn(_) | Generator::DatasetMetaColumn(_) => u64::MAX,
            Generator::ForeignColumn(g) => g.count_hint(),
            Generator::Regexp(g) => g.count_hint(),
            Generator::MetaAttribute(g) => g.count_hint(),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Generator::Sequence(g) => g.reset(),
            Generator::Histogram(g) => g.reset(),
            Generator::Random(g) => g.reset(),
            Generator::Expression(g) => g.reset(),
            Generator::DatasetRow(g) => g.reset(),
            Generator::DatasetColumn(g) | Generator::DatasetMetaColumn(g) => g.reset(),
            Generator::ForeignColumn(g) => g.reset(),
            Generator::Regexp(g) => g.reset(),
            Generator::MetaAttribute(g) => g.reset(),
        }
    }

    /// Closed-form value domain after `size` draws, for the kinds that can
    /// compute one without materializing rows.
    pub fn domain(&self, size: u64) -> Option<Result<Domain>> {
        match self {
            Generator::Sequence(g) => Some(g.domain(size)),
            Generator::Random(g) => Some(Ok(g.domain())),
            _ => None,
        }
    }

    /// The entity row most recently drawn, for dataset row generators.
    pub fn current_row(&self) -> Option<&IndexMap<String, ScalarValue>> {
        match self {
            Generator::DatasetRow(g) => g.current_row(),
            _ => None,
        }
    }

    pub(crate) fn as_sequence(&self) -> Option<&SequenceGenerator> {
        match self {
            Generator::Sequence(g) => Some(g),
            _ => None,
        }
    }

    pub(crate) fn as_sequence_mut(&mut self) -> Option<&mut SequenceGenerator> {
        match self {
            Generator::Sequence(g) => Some(g),
            _ => None,
        }
    }
}
