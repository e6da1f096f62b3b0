//! # Histogram Generator
//!
//! Weighted categorical sampling. Buckets are declared either as a map of
//! value literal to weight, or as a bare value list (every weight 1). The
//! sampler draws a uniform point on `[0, total_weight)` and binary-searches
//! the cumulative weight table, so bucket probabilities are exactly
//! proportional to their weights and zero-weight buckets are never drawn.

use rand::rngs::StdRng;
use rand::Rng;

use crate::config::ColumnSpec;
use crate::error::{Result, RowGenError};
use crate::generate::value::ScalarValue;
use crate::schema::types::ColumnMeta;

#[derive(Debug, Clone)]
pub struct HistogramGenerator {
    column: String,
    values: Vec<ScalarValue>,
    /// Prefix sums of the bucket weights; the last entry is the total.
    cumulative: Vec<f64>,
    current: Option<ScalarValue>,
}

impl HistogramGenerator {
    pub fn from_spec(meta: &ColumnMeta, spec: &ColumnSpec) -> Result<Self> {
        let column = &meta.name;
        let buckets = spec.buckets.as_ref().ok_or_else(|| {
            RowGenError::config(
                column,
                "the 'buckets' property is mandatory for a histogram generator",
            )
        })?;
        let pairs = match buckets {
            serde_json::Value::Object(map) => map
                .iter()
                .map(|(key, weight)| {
                    let value = ScalarValue::Text(key.clone()).cast_to(
                        meta.scalar_type,
                        meta.precision,
                        column,
                    )?;
                    let weight = weight.as_f64().ok_or_else(|| {
                        RowGenError::config(
                            column,
                            format!("the weight of bucket '{}' ({}) is not a number", key, weight),
                        )
                    })?;
                    Ok((value, weight))
                })
                .collect::<Result<Vec<_>>>()?,
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| {
                    Ok((ScalarValue::from_json(meta.scalar_type, item, column)?, 1.0))
                })
                .collect::<Result<Vec<_>>>()?,
            other => {
                return Err(RowGenError::config(
                    column,
                    format!(
                        "the 'buckets' property must be a weight map or a value list, got ({})",
                        other
                    ),
                ))
            }
        };
        Self::from_buckets(column, pairs)
    }

    /// Build directly from (value, weight) pairs. Used by the dataset and
    /// foreign-column generators for derived histograms.
    pub fn from_buckets(column: &str, buckets: Vec<(ScalarValue, f64)>) -> Result<Self> {
        if buckets.is_empty() {
            return Err(RowGenError::config(column, "a histogram needs at least one bucket"));
        }
        let mut values = Vec::with_capacity(buckets.len());
        let mut cumulative = Vec::with_capacity(buckets.len());
        let mut total = 0.0f64;
        for (value, weight) in buckets {
            if !weight.is_finite() || weight < 0.0 {
                return Err(RowGenError::config(
                    column,
                    format!("the weight of bucket '{}' ({}) must be a non-negative number", value, weight),
                ));
            }
            total += weight;
            values.push(value);
            cumulative.push(total);
        }
        if total <= 0.0 {
            return Err(RowGenError::config(
                column,
                "the histogram weights sum to zero; at least one bucket must be drawable",
            ));
        }
        Ok(Self {
            column: column.to_string(),
            values,
            cumulative,
            current: None,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn next(&mut self, rng: &mut StdRng) -> ScalarValue {
        let total = *self.cumulative.last().unwrap_or(&1.0);
        let point = rng.random::<f64>() * total;
        let idx = self.cumulative.partition_point(|&cum| cum <= point);
        let idx = idx.min(self.values.len() - 1);
        let value = self.values[idx].clone();
        self.current = Some(value.clone());
        value
    }

    pub fn current(&self) -> Option<&ScalarValue> {
        self.current.as_ref()
    }

    /// Histograms can be redrawn indefinitely.
    pub fn count_hint(&self) -> u64 {
        u64::MAX
    }

    pub fn bucket_count(&self) -> usize {
        self.values.len()
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::ScalarType;
    use rand::SeedableRng;

    #[test]
    fn test_weighted_buckets_from_map() {
        let meta = ColumnMeta::new("status", ScalarType::Text);
        let spec = ColumnSpec::histogram().with_buckets(serde_json::json!({
            "open": 3.0,
            "closed": 1.0,
        }));
        let mut histogram = HistogramGenerator::from_spec(&meta, &spec).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let mut open = 0usize;
        for _ in 0..4000 {
            if histogram.next(&mut rng) == ScalarValue::Text("open".into()) {
                open += 1;
            }
        }
        // Expect about 75%; a wide band keeps the test deterministic-safe.
        assert!((2700..3300).contains(&open), "open={}", open);
    }

    #[test]
    fn test_bare_list_is_uniform() {
        let meta = ColumnMeta::new("n", ScalarType::Int);
        let spec = ColumnSpec::histogram()
            .with_buckets(serde_json::json!([1, 2, 3]));
        let mut histogram = HistogramGenerator::from_spec(&meta, &spec).unwrap();
        assert_eq!(histogram.bucket_count(), 3);
        let mut rng = StdRng::seed_from_u64(1);
        let v = histogram.next(&mut rng);
        assert!(matches!(v, ScalarValue::Int(1..=3)));
        assert_eq!(histogram.current(), Some(&v));
    }

    #[test]
    fn test_zero_weight_bucket_never_drawn() {
        let mut histogram = HistogramGenerator::from_buckets(
            "c",
            vec![
                (ScalarValue::Int(1), 1.0),
                (ScalarValue::Int(2), 0.0),
                (ScalarValue::Int(3), 1.0),
            ],
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..500 {
            assert_ne!(histogram.next(&mut rng), ScalarValue::Int(2));
        }
    }

    #[test]
    fn test_invalid_weights_rejected() {
        assert!(HistogramGenerator::from_buckets("c", vec![(ScalarValue::Int(1), -1.0)]).is_err());
        assert!(HistogramGenerator::from_buckets("c", vec![(ScalarValue::Int(1), 0.0)]).is_err());
        assert!(HistogramGenerator::from_buckets("c", vec![]).is_err());
    }

    #[test]
    fn test_typed_bucket_keys() {
        let meta = ColumnMeta::new("n", ScalarType::Int);
        let spec = ColumnSpec::histogram().with_buckets(serde_json::json!({ "5": 1.0 }));
        let mut histogram = HistogramGenerator::from_spec(&meta, &spec).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(histogram.next(&mut rng), ScalarValue::Int(5));
    }
}
