//! Shared fixtures for rowgen tests: relation metadata, in-memory entity
//! sources and a small arithmetic expression evaluator, so integration
//! tests exercise the engine without a real script runtime or data store.

use indexmap::IndexMap;
use rowgen_core::generate::providers::{ExpressionEvaluator, MemoryRowSource};
use rowgen_core::{ColumnMeta, RelationMeta, Result, RowGenError, ScalarType, ScalarValue};

/// An orders relation with the column shapes most tests need.
pub fn orders_relation(rows: u64) -> RelationMeta {
    RelationMeta::new("orders")
        .with_row_count(rows)
        .with_column(ColumnMeta::new("id", ScalarType::Int).primary_key())
        .with_column(ColumnMeta::new("customer_id", ScalarType::Int))
        .with_column(ColumnMeta::new("order_date", ScalarType::Date))
        .with_column(ColumnMeta::new("status", ScalarType::Text))
        .with_column(ColumnMeta::new("quantity", ScalarType::Int))
        .with_column(
            ColumnMeta::new("amount", ScalarType::Decimal)
                .with_precision(10)
                .with_scale(2),
        )
        .with_column(ColumnMeta::new("city", ScalarType::Text))
        .with_column(ColumnMeta::new("country", ScalarType::Text))
        .with_column(ColumnMeta::new("reference", ScalarType::Text))
}

/// A weighted city entity with a conditioning country column.
pub fn cities_source() -> MemoryRowSource {
    MemoryRowSource::new("cities", vec!["name", "country", "weight"])
        .push_row(vec![
            ScalarValue::Text("Paris".into()),
            ScalarValue::Text("FR".into()),
            ScalarValue::Int(5),
        ])
        .push_row(vec![
            ScalarValue::Text("Lyon".into()),
            ScalarValue::Text("FR".into()),
            ScalarValue::Int(2),
        ])
        .push_row(vec![
            ScalarValue::Text("Berlin".into()),
            ScalarValue::Text("DE".into()),
            ScalarValue::Int(4),
        ])
        .push_row(vec![
            ScalarValue::Text("Hamburg".into()),
            ScalarValue::Text("DE".into()),
            ScalarValue::Int(1),
        ])
}

/// A tiny infix arithmetic evaluator over the structured bindings.
///
/// Supports `+ - * /`, unary minus, parentheses, numeric literals and
/// binding names. The variable prelude of the composed script is ignored;
/// the last line is the expression. Enough to stand in for a real script
/// engine in tests.
pub struct ArithmeticEvaluator;

impl ExpressionEvaluator for ArithmeticEvaluator {
    fn evaluate(
        &self,
        bindings: &IndexMap<String, ScalarValue>,
        script: &str,
    ) -> Result<ScalarValue> {
        let expression = script.lines().last().unwrap_or_default();
        let mut parser = Parser {
            chars: expression.chars().collect(),
            pos: 0,
            bindings,
        };
        let value = parser.expr()?;
        parser.skip_ws();
        if parser.pos < parser.chars.len() {
            return Err(RowGenError::runtime(
                "",
                format!("trailing input in expression ({})", expression),
            ));
        }
        if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            Ok(ScalarValue::Int(value as i64))
        } else {
            Ok(ScalarValue::Float(value))
        }
    }
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    bindings: &'a IndexMap<String, ScalarValue>,
}

impl Parser<'_> {
    fn expr(&mut self) -> Result<f64> {
        let mut acc = self.term()?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some('+') => {
                    self.pos += 1;
                    acc += self.term()?;
                }
                Some('-') => {
                    self.pos += 1;
                    acc -= self.term()?;
                }
                _ => return Ok(acc),
            }
        }
    }

    fn term(&mut self) -> Result<f64> {
        let mut acc = self.factor()?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some('*') => {
                    self.pos += 1;
                    acc *= self.factor()?;
                }
                Some('/') => {
                    self.pos += 1;
                    acc /= self.factor()?;
                }
                _ => return Ok(acc),
            }
        }
    }

    fn factor(&mut self) -> Result<f64> {
        self.skip_ws();
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(-self.factor()?)
            }
            Some('(') => {
                self.pos += 1;
                let value = self.expr()?;
                self.skip_ws();
                if self.peek() != Some(')') {
                    return Err(RowGenError::runtime("", "unbalanced parenthesis"));
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.binding(),
            other => Err(RowGenError::runtime(
                "",
                format!("unexpected input in expression ({:?})", other),
            )),
        }
    }

    fn number(&mut self) -> Result<f64> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map_err(|_| RowGenError::runtime("", format!("bad numeral ({})", text)))
    }

    fn binding(&mut self) -> Result<f64> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        match self.bindings.get(&name) {
            Some(ScalarValue::Int(i)) => Ok(*i as f64),
            Some(ScalarValue::Float(f)) => Ok(*f),
            Some(other) => Err(RowGenError::runtime(
                "",
                format!("binding '{}' is not numeric ({})", name, other),
            )),
            None => Err(RowGenError::runtime(
                "",
                format!("unknown binding '{}'", name),
            )),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }
}
