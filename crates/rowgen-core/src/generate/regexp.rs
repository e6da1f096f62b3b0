//! # Regexp Generator
//!
//! Synthesizes strings matching a regular expression, delegating both the
//! sampling and the distinct-match counting to the configured
//! [`PatternSynthesizer`](crate::generate::providers::PatternSynthesizer).
//! An optional `seed` pins the generator to a private random stream so a
//! column can be reproduced independently of its siblings' draw order.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::ColumnSpec;
use crate::error::Result;
use crate::generate::providers::{Collaborators, CompiledPattern};
use crate::generate::value::ScalarValue;
use crate::schema::types::ColumnMeta;

pub struct RegexpGenerator {
    column: String,
    precision: Option<u32>,
    pattern: Box<dyn CompiledPattern>,
    seed: Option<u64>,
    private_rng: Option<StdRng>,
    current: Option<ScalarValue>,
}

impl RegexpGenerator {
    pub fn from_spec(
        meta: &ColumnMeta,
        spec: &ColumnSpec,
        collab: &Collaborators,
    ) -> Result<Self> {
        let column = &meta.name;
        let pattern_text = spec.require_str(&spec.expression, "expression", column)?;
        let pattern = collab.synthesizer.compile(column, pattern_text)?;
        Ok(Self {
            column: column.clone(),
            precision: meta.precision,
            pattern,
            seed: spec.seed,
            private_rng: spec.seed.map(StdRng::seed_from_u64),
            current: None,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn next(&mut self, rng: &mut StdRng) -> Result<ScalarValue> {
        let sampled = match &mut self.private_rng {
            Some(private) => self.pattern.sample(private),
            None => self.pattern.sample(rng),
        };
        let value = ScalarValue::Text(sampled).cast_to(
            crate::schema::types::ScalarType::Text,
            self.precision,
            &self.column,
        )?;
        self.current = Some(value.clone());
        Ok(value)
    }

    pub fn current(&self) -> Option<&ScalarValue> {
        self.current.as_ref()
    }

    /// Distinct strings the pattern can match, capped at `u64::MAX`.
    pub fn count_hint(&self) -> u64 {
        self.pattern.count_unique()
    }

    pub fn reset(&mut self) {
        self.current = None;
        self.private_rng = self.seed.map(StdRng::seed_from_u64);
    }
}
