//! # Collaborator Interfaces
//!
//! The engine generates values; everything it needs from the outside world
//! comes through the small traits in this module. Dataset and foreign-column
//! generators read reference rows through [`RowSource`], expression
//! generators hand their script to an [`ExpressionEvaluator`], regexp
//! generators synthesize strings through a [`PatternSynthesizer`], and meta
//! generators look attributes up in an [`AttributeProvider`].
//!
//! [`Collaborators`] bundles them for graph construction. A default bundle
//! carries only the built-in regex synthesizer; the rest is opt-in because
//! a graph that never uses expressions has no business requiring a script
//! engine.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::Rng;
use regex_syntax::hir::{Class, Hir, HirKind};

use crate::config::ColumnSpec;
use crate::error::{Result, RowGenError};
use crate::generate::value::ScalarValue;
use crate::schema::types::RelationMeta;

/// Upper bound applied to unbounded regex repetitions (`a*`, `a+`, `a{2,}`)
/// when synthesizing strings.
pub const DEFAULT_MAX_REPEAT: u32 = 100;

/// A readable source of reference rows, keyed by relation name.
///
/// Sources are materialized in full the first time a generator needs them;
/// they are expected to be small lookup datasets (countries, cities, status
/// codes), not the relations being generated.
pub trait RowSource: Send + Sync {
    /// Relation name this source serves.
    fn name(&self) -> &str;

    /// Column names in declaration order.
    fn columns(&self) -> Vec<String>;

    /// Materialize every row.
    fn fetch_all(&self) -> Result<Vec<IndexMap<String, ScalarValue>>>;

    /// Number of rows, without materializing them when the source can do
    /// better.
    fn row_count(&self) -> Result<u64> {
        Ok(self.fetch_all()?.len() as u64)
    }
}

/// A script engine able to evaluate one expression against named bindings.
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluate `script` and return the resulting value.
    ///
    /// `script` is a self-contained program: variable declarations for every
    /// binding followed by the user expression. `bindings` carries the same
    /// values in structured form for engines that prefer host injection over
    /// re-parsing the declarations.
    fn evaluate(
        &self,
        bindings: &IndexMap<String, ScalarValue>,
        script: &str,
    ) -> Result<ScalarValue>;
}

/// A compiled pattern that can be sampled repeatedly.
pub trait CompiledPattern: Send + Sync {
    /// Draw one matching string.
    fn sample(&self, rng: &mut StdRng) -> String;

    /// Number of distinct strings the pattern can produce, saturating at
    /// `u64::MAX` for unbounded patterns.
    fn count_unique(&self) -> u64;
}

/// Compiles regular expressions into samplable patterns.
pub trait PatternSynthesizer: Send + Sync {
    fn compile(&self, column: &str, pattern: &str) -> Result<Box<dyn CompiledPattern>>;
}

/// Resolves metadata attributes (catalog comments, session properties) for
/// meta-attribute generators.
pub trait AttributeProvider: Send + Sync {
    fn get(&self, key: &str) -> Option<ScalarValue>;
}

/// A relation that foreign columns may reference: its metadata, the column
/// specs it is generated from (when generator-backed), and a row source
/// (when its data pre-exists externally).
#[derive(Clone)]
pub struct ParentRelation {
    pub meta: RelationMeta,
    pub specs: IndexMap<String, ColumnSpec>,
    pub source: Option<Arc<dyn RowSource>>,
}

impl ParentRelation {
    pub fn generated(meta: RelationMeta, specs: IndexMap<String, ColumnSpec>) -> Self {
        Self {
            meta,
            specs,
            source: None,
        }
    }

    pub fn external(meta: RelationMeta, source: Arc<dyn RowSource>) -> Self {
        Self {
            meta,
            specs: IndexMap::new(),
            source: Some(source),
        }
    }
}

/// Everything a generator graph may need from its environment.
#[derive(Clone)]
pub struct Collaborators {
    pub evaluator: Option<Arc<dyn ExpressionEvaluator>>,
    pub synthesizer: Arc<dyn PatternSynthesizer>,
    pub attributes: Option<Arc<dyn AttributeProvider>>,
    pub row_sources: HashMap<String, Arc<dyn RowSource>>,
    pub relations: HashMap<String, ParentRelation>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            evaluator: None,
            synthesizer: Arc::new(RandRegexSynthesizer::default()),
            attributes: None,
            row_sources: HashMap::new(),
            relations: HashMap::new(),
        }
    }
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn PatternSynthesizer>) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn with_attributes(mut self, attributes: Arc<dyn AttributeProvider>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn with_row_source(mut self, source: Arc<dyn RowSource>) -> Self {
        self.row_sources.insert(source.name().to_string(), source);
        self
    }

    pub fn with_parent_relation(mut self, relation: ParentRelation) -> Self {
        self.relations.insert(relation.meta.name.clone(), relation);
        self
    }

    pub(crate) fn parent_relation(&self, name: &str, column: &str) -> Result<&ParentRelation> {
        self.relations.get(name).ok_or_else(|| {
            RowGenError::config(
                column,
                format!(
                    "no parent relation registered under '{}' (known: {})",
                    name,
                    self.relations.keys().cloned().collect::<Vec<_>>().join(", ")
                ),
            )
        })
    }

    pub(crate) fn row_source(&self, entity: &str, column: &str) -> Result<&Arc<dyn RowSource>> {
        self.row_sources.get(entity).ok_or_else(|| {
            RowGenError::config(
                column,
                format!(
                    "no row source registered for entity '{}' (known: {})",
                    entity,
                    self.row_sources
                        .keys()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            )
        })
    }
}

/// An in-memory [`RowSource`] backed by a vector of rows.
#[derive(Debug, Clone)]
pub struct MemoryRowSource {
    name: String,
    columns: Vec<String>,
    rows: Vec<IndexMap<String, ScalarValue>>,
}

impl MemoryRowSource {
    pub fn new(name: impl Into<String>, columns: Vec<&str>) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(String::from).collect(),
            rows: Vec::new(),
        }
    }

    /// Append one row; values pair with the declared columns positionally.
    pub fn push_row(mut self, values: Vec<ScalarValue>) -> Self {
        debug_assert_eq!(values.len(), self.columns.len());
        let row = self
            .columns
            .iter()
            .cloned()
            .zip(values)
            .collect::<IndexMap<_, _>>();
        self.rows.push(row);
        self
    }
}

impl RowSource for MemoryRowSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn fetch_all(&self) -> Result<Vec<IndexMap<String, ScalarValue>>> {
        Ok(self.rows.clone())
    }

    fn row_count(&self) -> Result<u64> {
        Ok(self.rows.len() as u64)
    }
}

/// The built-in [`PatternSynthesizer`], backed by `rand_regex` for sampling
/// and a `regex-syntax` HIR walk for cardinality counting.
#[derive(Debug, Clone)]
pub struct RandRegexSynthesizer {
    max_repeat: u32,
}

impl Default for RandRegexSynthesizer {
    fn default() -> Self {
        Self {
            max_repeat: DEFAULT_MAX_REPEAT,
        }
    }
}

impl RandRegexSynthesizer {
    pub fn with_max_repeat(max_repeat: u32) -> Self {
        Self { max_repeat }
    }
}

impl PatternSynthesizer for RandRegexSynthesizer {
    fn compile(&self, column: &str, pattern: &str) -> Result<Box<dyn CompiledPattern>> {
        let sampler = rand_regex::Regex::compile(pattern, self.max_repeat).map_err(|e| {
            RowGenError::config(column, format!("invalid pattern ({}): {}", pattern, e))
        })?;
        let hir = regex_syntax::ParserBuilder::new()
            .build()
            .parse(pattern)
            .map_err(|e| {
                RowGenError::config(column, format!("invalid pattern ({}): {}", pattern, e))
            })?;
        Ok(Box::new(CompiledRegex {
            sampler,
            unique: count_hir(&hir),
        }))
    }
}

struct CompiledRegex {
    sampler: rand_regex::Regex,
    unique: u64,
}

impl CompiledPattern for CompiledRegex {
    fn sample(&self, rng: &mut StdRng) -> String {
        rng.sample(&self.sampler)
    }

    fn count_unique(&self) -> u64 {
        self.unique
    }
}

/// Count the distinct strings a regex HIR can match, saturating at
/// `u64::MAX`.
fn count_hir(hir: &Hir) -> u64 {
    match hir.kind() {
        HirKind::Empty | HirKind::Literal(_) | HirKind::Look(_) => 1,
        HirKind::Class(Class::Unicode(class)) => class
            .iter()
            .fold(0u64, |acc, range| {
                acc.saturating_add(u64::from(range.end()) - u64::from(range.start()) + 1)
            })
            .max(1),
        HirKind::Class(Class::Bytes(class)) => class
            .iter()
            .fold(0u64, |acc, range| {
                acc.saturating_add(u64::from(range.end()) - u64::from(range.start()) + 1)
            })
            .max(1),
        HirKind::Capture(capture) => count_hir(&capture.sub),
        HirKind::Concat(parts) => parts
            .iter()
            .fold(1u64, |acc, part| acc.saturating_mul(count_hir(part))),
        HirKind::Alternation(alts) => alts
            .iter()
            .fold(0u64, |acc, alt| acc.saturating_add(count_hir(alt))),
        HirKind::Repetition(rep) => {
            let max = match rep.max {
                Some(max) => max,
                None => return u64::MAX,
            };
            let sub = count_hir(&rep.sub);
            // Sum of sub^k for k in min..=max.
            let mut total: u64 = 0;
            for k in rep.min..=max {
                let mut combos: u64 = 1;
                for _ in 0..k {
                    combos = combos.saturating_mul(sub);
                    if combos == u64::MAX {
                        break;
                    }
                }
                total = total.saturating_add(combos);
                if total == u64::MAX {
                    break;
                }
            }
            total
        }
    }
}
