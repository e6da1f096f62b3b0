//! # Random Generator
//!
//! Uniform sampling between a `min` and `max` bound, in the value space of
//! the column type. Discrete types (integers, dates, timestamps, times,
//! text) sample on a step lattice, `min + k * step`, so a random generator
//! can mirror the exact value set of a stepped sequence. Floats and
//! decimals sample the continuous interval; decimals are then rounded to
//! the declared scale.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;

use crate::config::ColumnSpec;
use crate::error::{Result, RowGenError};
use crate::generate::codec::AlphabetCodec;
use crate::generate::domain::Domain;
use crate::generate::value::ScalarValue;
use crate::schema::types::{ColumnMeta, ScalarType};

#[derive(Debug, Clone)]
enum Span {
    Int { min: i64, max: i64, step: i64 },
    Float { min: f64, max: f64 },
    Decimal { min: Decimal, max: Decimal },
    Date { min: NaiveDate, step_days: i64, steps: i64 },
    Timestamp { min: NaiveDateTime, step_ms: i64, steps: i64 },
    Time { min: NaiveTime, step_ms: i64, steps: i64 },
    Text { lo: u64, step: u64, steps: u64, codec: AlphabetCodec },
}

#[derive(Debug, Clone)]
pub struct RandomGenerator {
    column: String,
    scale: Option<u32>,
    span: Span,
    current: Option<ScalarValue>,
}

impl RandomGenerator {
    pub fn from_spec(meta: &ColumnMeta, spec: &ColumnSpec) -> Result<Self> {
        let column = &meta.name;
        let literal = |json: &Option<serde_json::Value>, default: ScalarValue| -> Result<ScalarValue> {
            match json {
                Some(json) => ScalarValue::from_json(meta.scalar_type, json, column),
                None => Ok(default),
            }
        };
        let (default_min, default_max) = default_bounds(meta.scalar_type);
        let min = literal(&spec.min, default_min)?;
        let max = literal(&spec.max, default_max)?;
        let step = match spec.step {
            Some(n) => Some(n.as_i64(column, "step")?),
            None => None,
        };
        Self::from_parts(meta, min, max, step)
    }

    /// Build from explicit bounds. Used by the foreign-column generator to
    /// sample inside a parent sequence's domain, on the parent's lattice.
    pub fn from_parts(
        meta: &ColumnMeta,
        min: ScalarValue,
        max: ScalarValue,
        step: Option<i64>,
    ) -> Result<Self> {
        let column = &meta.name;
        let bad_step = |s: i64| {
            RowGenError::config(column, format!("the 'step' property ({}) must be positive", s))
        };
        let inverted = || {
            RowGenError::config(
                &meta.name,
                format!("the 'min' bound ({}) exceeds the 'max' bound ({})", min, max),
            )
        };
        let positive = |default: i64| -> Result<i64> {
            let s = step.unwrap_or(default).abs();
            if s == 0 {
                return Err(bad_step(0));
            }
            Ok(s)
        };
        let span = match (&min, &max) {
            (ScalarValue::Int(lo), ScalarValue::Int(hi)) => {
                if lo > hi {
                    return Err(inverted());
                }
                Span::Int {
                    min: *lo,
                    max: *hi,
                    step: positive(1)?,
                }
            }
            (ScalarValue::Float(lo), ScalarValue::Float(hi)) => {
                if lo > hi {
                    return Err(inverted());
                }
                Span::Float { min: *lo, max: *hi }
            }
            (ScalarValue::Decimal(lo), ScalarValue::Decimal(hi)) => {
                if lo > hi {
                    return Err(inverted());
                }
                Span::Decimal { min: *lo, max: *hi }
            }
            (ScalarValue::Date(lo), ScalarValue::Date(hi)) => {
                if lo > hi {
                    return Err(inverted());
                }
                let step_days = positive(1)?;
                Span::Date {
                    min: *lo,
                    step_days,
                    steps: (*hi - *lo).num_days() / step_days,
                }
            }
            (ScalarValue::Timestamp(lo), ScalarValue::Timestamp(hi)) => {
                if lo > hi {
                    return Err(inverted());
                }
                let step_ms = positive(1_000)?;
                Span::Timestamp {
                    min: *lo,
                    step_ms,
                    steps: (*hi - *lo).num_milliseconds() / step_ms,
                }
            }
            (ScalarValue::Time(lo), ScalarValue::Time(hi)) => {
                if lo > hi {
                    return Err(inverted());
                }
                let step_ms = positive(1_000)?;
                Span::Time {
                    min: *lo,
                    step_ms,
                    steps: (*hi - *lo).num_milliseconds() / step_ms,
                }
            }
            (ScalarValue::Text(lo), ScalarValue::Text(hi)) => {
                let codec = AlphabetCodec::default();
                let decode = |s: &str| {
                    codec.decode(s).ok_or_else(|| {
                        RowGenError::config(
                            column,
                            format!("the bound ({}) is outside the random text alphabet", s),
                        )
                    })
                };
                let lo = decode(lo)?;
                let hi = decode(hi)?;
                if lo > hi {
                    return Err(inverted());
                }
                let step = positive(1)? as u64;
                Span::Text {
                    lo,
                    step,
                    steps: (hi - lo) / step,
                    codec,
                }
            }
            _ => {
                return Err(RowGenError::config(
                    column,
                    format!(
                        "the 'min' ({}) and 'max' ({}) bounds diverge from the column type",
                        min, max
                    ),
                ))
            }
        };
        Ok(Self {
            column: column.clone(),
            scale: meta.scale,
            span,
            current: None,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn next(&mut self, rng: &mut StdRng) -> ScalarValue {
        let value = match &self.span {
            Span::Int { min, max, step } => {
                let k = rng.random_range(0..=((max - min) / step));
                ScalarValue::Int(min + k * step)
            }
            Span::Float { min, max } => ScalarValue::Float(min + rng.random::<f64>() * (max - min)),
            Span::Decimal { min, max } => {
                let width = (*max - *min).to_f64().unwrap_or(0.0);
                let sampled = Decimal::from_f64(rng.random::<f64>() * width)
                    .map(|d| *min + d)
                    .unwrap_or(*min);
                ScalarValue::Decimal(sampled).round_to_scale(self.scale)
            }
            Span::Date { min, step_days, steps } => {
                let k = rng.random_range(0..=*steps);
                ScalarValue::Date(*min + Duration::days(k * step_days))
            }
            Span::Timestamp { min, step_ms, steps } => {
                let k = rng.random_range(0..=*steps);
                ScalarValue::Timestamp(*min + Duration::milliseconds(k * step_ms))
            }
            Span::Time { min, step_ms, steps } => {
                let k = rng.random_range(0..=*steps);
                ScalarValue::Time(min.overflowing_add_signed(Duration::milliseconds(k * step_ms)).0)
            }
            Span::Text { lo, step, steps, codec } => {
                let k = rng.random_range(0..=*steps);
                ScalarValue::Text(codec.encode(lo + k * step))
            }
        };
        self.current = Some(value.clone());
        value
    }

    pub fn current(&self) -> Option<&ScalarValue> {
        self.current.as_ref()
    }

    /// Random draws never exhaust.
    pub fn count_hint(&self) -> u64 {
        u64::MAX
    }

    /// Distinct values the generator can produce; continuous types saturate
    /// at `u64::MAX`, decimals are bounded by the declared scale.
    pub fn distinct_count(&self) -> u64 {
        match &self.span {
            Span::Int { min, max, step } => ((max - min) / step) as u64 + 1,
            Span::Float { .. } => u64::MAX,
            Span::Decimal { min, max } => match self.scale {
                Some(s) => {
                    let width = *max - *min;
                    (width * Decimal::from(10i64.pow(s.min(18))))
                        .to_u64()
                        .map(|n| n.saturating_add(1))
                        .unwrap_or(u64::MAX)
                }
                None => u64::MAX,
            },
            Span::Date { steps, .. } | Span::Timestamp { steps, .. } | Span::Time { steps, .. } => {
                *steps as u64 + 1
            }
            Span::Text { steps, .. } => steps + 1,
        }
    }

    /// The closed-form value space: the configured bounds, snapped to the
    /// sampling lattice for discrete types.
    pub fn domain(&self) -> Domain {
        let count = self.distinct_count();
        let (min, max) = match &self.span {
            Span::Int { min, max, step } => (
                ScalarValue::Int(*min),
                ScalarValue::Int(min + (max - min) / step * step),
            ),
            Span::Float { min, max } => (ScalarValue::Float(*min), ScalarValue::Float(*max)),
            Span::Decimal { min, max } => {
                (ScalarValue::Decimal(*min), ScalarValue::Decimal(*max))
            }
            Span::Date { min, step_days, steps } => (
                ScalarValue::Date(*min),
                ScalarValue::Date(*min + Duration::days(steps * step_days)),
            ),
            Span::Timestamp { min, step_ms, steps } => (
                ScalarValue::Timestamp(*min),
                ScalarValue::Timestamp(*min + Duration::milliseconds(steps * step_ms)),
            ),
            Span::Time { min, step_ms, steps } => (
                ScalarValue::Time(*min),
                ScalarValue::Time(
                    min.overflowing_add_signed(Duration::milliseconds(steps * step_ms)).0,
                ),
            ),
            Span::Text { lo, step, steps, codec } => (
                ScalarValue::Text(codec.encode(*lo)),
                ScalarValue::Text(codec.encode(lo + steps * step)),
            ),
        };
        Domain::new(min, max, count)
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

fn default_bounds(scalar_type: ScalarType) -> (ScalarValue, ScalarValue) {
    let now = chrono::Utc::now().naive_utc();
    match scalar_type {
        ScalarType::Int => (ScalarValue::Int(0), ScalarValue::Int(10)),
        ScalarType::Float => (ScalarValue::Float(0.0), ScalarValue::Float(10.0)),
        ScalarType::Decimal => (
            ScalarValue::Decimal(Decimal::ZERO),
            ScalarValue::Decimal(Decimal::TEN),
        ),
        ScalarType::Date => (
            ScalarValue::Date(now.date() - Duration::days(10)),
            ScalarValue::Date(now.date()),
        ),
        ScalarType::Timestamp => (
            ScalarValue::Timestamp(now - Duration::days(10)),
            ScalarValue::Timestamp(now),
        ),
        ScalarType::Time => (
            ScalarValue::Time(NaiveTime::from_hms_opt(0, 0, 0).unwrap_or_default()),
            ScalarValue::Time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default()),
        ),
        ScalarType::Text => (
            ScalarValue::Text("a".to_string()),
            ScalarValue::Text("z".to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_int_respects_bounds() {
        let meta = ColumnMeta::new("n", ScalarType::Int);
        let spec = ColumnSpec::random()
            .with_min(serde_json::json!(5))
            .with_max(serde_json::json!(8));
        let mut random = RandomGenerator::from_spec(&meta, &spec).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let v = random.next(&mut rng).as_int().unwrap();
            assert!((5..=8).contains(&v), "{}", v);
        }
        assert_eq!(random.distinct_count(), 4);
    }

    #[test]
    fn test_int_step_lattice() {
        let meta = ColumnMeta::new("n", ScalarType::Int);
        let random = RandomGenerator::from_parts(
            &meta,
            ScalarValue::Int(10),
            ScalarValue::Int(20),
            Some(5),
        );
        let mut random = random.unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..100 {
            let v = random.next(&mut rng).as_int().unwrap();
            assert!(v == 10 || v == 15 || v == 20, "{}", v);
        }
        assert_eq!(random.distinct_count(), 3);
        let domain = random.domain();
        assert_eq!(domain.min, ScalarValue::Int(10));
        assert_eq!(domain.max, ScalarValue::Int(20));
    }

    #[test]
    fn test_lattice_max_is_snapped() {
        let meta = ColumnMeta::new("n", ScalarType::Int);
        let random = RandomGenerator::from_parts(
            &meta,
            ScalarValue::Int(0),
            ScalarValue::Int(10),
            Some(4),
        )
        .unwrap();
        // 0, 4, 8 fit; 12 does not.
        assert_eq!(random.domain().max, ScalarValue::Int(8));
        assert_eq!(random.distinct_count(), 3);
    }

    #[test]
    fn test_float_respects_bounds() {
        let meta = ColumnMeta::new("f", ScalarType::Float);
        let spec = ColumnSpec::random()
            .with_min(serde_json::json!(0.25))
            .with_max(serde_json::json!(0.75));
        let mut random = RandomGenerator::from_spec(&meta, &spec).unwrap();
        let mut rng = StdRng::seed_from_u64(13);
        for _ in 0..10_000 {
            match random.next(&mut rng) {
                ScalarValue::Float(f) => assert!((0.25..=0.75).contains(&f), "{}", f),
                other => panic!("not a float: {}", other),
            }
        }
    }

    #[test]
    fn test_decimal_respects_bounds() {
        let meta = ColumnMeta::new("amount", ScalarType::Decimal).with_scale(2);
        let spec = ColumnSpec::random()
            .with_min(serde_json::json!(2.5))
            .with_max(serde_json::json!(7.5));
        let mut random = RandomGenerator::from_spec(&meta, &spec).unwrap();
        let mut rng = StdRng::seed_from_u64(19);
        let lo = Decimal::new(250, 2);
        let hi = Decimal::new(750, 2);
        for _ in 0..10_000 {
            match random.next(&mut rng) {
                ScalarValue::Decimal(d) => assert!(d >= lo && d <= hi, "{}", d),
                other => panic!("not a decimal: {}", other),
            }
        }
    }

    #[test]
    fn test_date_sampling_stays_in_window() {
        let meta = ColumnMeta::new("d", ScalarType::Date);
        let spec = ColumnSpec::random()
            .with_min(serde_json::json!("2021-01-01"))
            .with_max(serde_json::json!("2021-01-05"));
        let mut random = RandomGenerator::from_spec(&meta, &spec).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let lo = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let hi = NaiveDate::from_ymd_opt(2021, 1, 5).unwrap();
        for _ in 0..100 {
            match random.next(&mut rng) {
                ScalarValue::Date(d) => assert!(d >= lo && d <= hi, "{}", d),
                other => panic!("not a date: {}", other),
            }
        }
        assert_eq!(random.distinct_count(), 5);
    }

    #[test]
    fn test_text_bounds_use_alphabet_order() {
        let meta = ColumnMeta::new("t", ScalarType::Text);
        let spec = ColumnSpec::random()
            .with_min(serde_json::json!("a"))
            .with_max(serde_json::json!("c"));
        let mut random = RandomGenerator::from_spec(&meta, &spec).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            let v = random.next(&mut rng);
            let s = v.as_text().unwrap();
            assert!(["a", "b", "c"].contains(&s), "{}", s);
        }
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let meta = ColumnMeta::new("n", ScalarType::Int);
        let spec = ColumnSpec::random()
            .with_min(serde_json::json!(9))
            .with_max(serde_json::json!(1));
        assert!(RandomGenerator::from_spec(&meta, &spec).is_err());
    }

    #[test]
    fn test_decimal_rounds_to_scale() {
        let meta = ColumnMeta::new("amount", ScalarType::Decimal).with_scale(2);
        let spec = ColumnSpec::random();
        let mut random = RandomGenerator::from_spec(&meta, &spec).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            match random.next(&mut rng) {
                ScalarValue::Decimal(d) => assert!(d.scale() <= 2, "{}", d),
                other => panic!("not a decimal: {}", other),
            }
        }
    }
}
