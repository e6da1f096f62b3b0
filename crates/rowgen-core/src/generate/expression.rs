//! # Expression Generator
//!
//! Derives a value from up to nine parent columns through a user-supplied
//! expression. Parents bind positionally to the variables `x`, `y`, `z`,
//! `a` through `f`; the engine renders a variable prelude in front of the
//! expression and hands the composed script to the configured
//! [`ExpressionEvaluator`](crate::generate::providers::ExpressionEvaluator),
//! then casts the result back to the column type.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::config::ColumnSpec;
use crate::error::{Result, RowGenError};
use crate::generate::providers::{Collaborators, ExpressionEvaluator};
use crate::generate::value::ScalarValue;
use crate::schema::types::{ColumnMeta, ScalarType};

/// Positional variable names, in binding order.
const VARIABLES: [&str; 9] = ["x", "y", "z", "a", "b", "c", "d", "e", "f"];

pub struct ExpressionGenerator {
    column: String,
    scalar_type: ScalarType,
    precision: Option<u32>,
    scale: Option<u32>,
    parents: Vec<String>,
    expression: String,
    evaluator: Arc<dyn ExpressionEvaluator>,
    current: Option<ScalarValue>,
}

impl ExpressionGenerator {
    pub fn from_spec(
        meta: &ColumnMeta,
        spec: &ColumnSpec,
        collab: &Collaborators,
    ) -> Result<Self> {
        let column = &meta.name;
        let expression = spec
            .require_str(&spec.expression, "expression", column)?
            .to_string();
        let parents = spec.parents.clone().unwrap_or_default();
        if parents.len() > VARIABLES.len() {
            return Err(RowGenError::config(
                column,
                format!(
                    "an expression generator supports at most {} parents, got {}",
                    VARIABLES.len(),
                    parents.len()
                ),
            ));
        }
        let evaluator = collab.evaluator.clone().ok_or_else(|| {
            RowGenError::config(
                column,
                "an expression generator needs an expression evaluator collaborator",
            )
        })?;
        Ok(Self {
            column: column.clone(),
            scalar_type: meta.scalar_type,
            precision: meta.precision,
            scale: meta.scale,
            parents,
            expression,
            evaluator,
            current: None,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn dependencies(&self) -> &[String] {
        &self.parents
    }

    pub fn next(&mut self, row: &IndexMap<String, ScalarValue>) -> Result<ScalarValue> {
        let mut bindings = IndexMap::with_capacity(self.parents.len());
        for (variable, parent) in VARIABLES.iter().zip(&self.parents) {
            let value = row.get(parent).ok_or_else(|| {
                RowGenError::runtime(
                    &self.column,
                    format!("the parent column '{}' has no value in the current row", parent),
                )
            })?;
            bindings.insert(variable.to_string(), value.clone());
        }
        let script = render_script(&bindings, &self.expression);
        let raw = self.evaluator.evaluate(&bindings, &script)?;
        let value = raw
            .cast_to(self.scalar_type, self.precision, &self.column)?
            .round_to_scale(self.scale);
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

/// Compose the script: one `var` declaration per binding, then the
/// expression itself.
fn render_script(bindings: &IndexMap<String, ScalarValue>, expression: &str) -> String {
    let mut script = String::new();
    for (variable, value) in bindings {
        script.push_str("var ");
        script.push_str(variable);
        script.push_str(" = ");
        script.push_str(&render_literal(value));
        script.push_str(";\n");
    }
    script.push_str(expression);
    script
}

fn render_literal(value: &ScalarValue) -> String {
    match value {
        ScalarValue::Int(i) => i.to_string(),
        ScalarValue::Float(f) => f.to_string(),
        ScalarValue::Decimal(d) => d.to_string(),
        ScalarValue::Date(d) => format!("new Date(\"{}\")", d.format("%Y-%m-%d")),
        ScalarValue::Timestamp(ts) => {
            format!("new Date(\"{}\")", ts.format("%Y-%m-%dT%H:%M:%S%.3f"))
        }
        ScalarValue::Time(t) => format!("'{}'", t.format("%H:%M:%S")),
        ScalarValue::Text(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
    }
}
