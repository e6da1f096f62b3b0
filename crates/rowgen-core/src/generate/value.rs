//! # Scalar Values
//!
//! `ScalarValue` is the tagged union every generator produces and consumes.
//! All per-type arithmetic lives here (and in the generators' closed-form
//! helpers) so that sequence stepping, uniform sampling and domain
//! calculation share one implementation per scalar type instead of
//! scattering type dispatch across the engine.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RowGenError};
use crate::schema::types::ScalarType;

/// A generated value for a target column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Time(NaiveTime),
    Text(String),
}

impl ScalarValue {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            ScalarValue::Int(_) => ScalarType::Int,
            ScalarValue::Float(_) => ScalarType::Float,
            ScalarValue::Decimal(_) => ScalarType::Decimal,
            ScalarValue::Date(_) => ScalarType::Date,
            ScalarValue::Timestamp(_) => ScalarType::Timestamp,
            ScalarValue::Time(_) => ScalarType::Time,
            ScalarValue::Text(_) => ScalarType::Text,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ScalarValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ScalarValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Round a decimal value to the declared column scale with half-down
    /// (midpoint toward zero) rounding. Other types pass through.
    pub fn round_to_scale(self, scale: Option<u32>) -> Self {
        match (self, scale) {
            (ScalarValue::Decimal(d), Some(s)) => ScalarValue::Decimal(
                d.round_dp_with_strategy(s, RoundingStrategy::MidpointTowardZero),
            ),
            (v, _) => v,
        }
    }

    /// Convert a JSON literal from a column property map into a typed value.
    ///
    /// Dates, timestamps and times are ISO-8601 strings; decimals may be
    /// numbers or strings (strings preserve exact scale).
    pub fn from_json(
        scalar_type: ScalarType,
        json: &serde_json::Value,
        column: &str,
    ) -> Result<Self> {
        let fail = |expected: &str| {
            RowGenError::config(
                column,
                format!("expected {} literal, got ({})", expected, json),
            )
        };
        match scalar_type {
            ScalarType::Int => json
                .as_i64()
                .map(ScalarValue::Int)
                .ok_or_else(|| fail("an integer")),
            ScalarType::Float => json
                .as_f64()
                .map(ScalarValue::Float)
                .ok_or_else(|| fail("a number")),
            ScalarType::Decimal => {
                let repr = match json {
                    serde_json::Value::Number(n) => n.to_string(),
                    serde_json::Value::String(s) => s.clone(),
                    _ => return Err(fail("a decimal number")),
                };
                Decimal::from_str(&repr)
                    .map(ScalarValue::Decimal)
                    .map_err(|_| fail("a decimal number"))
            }
            ScalarType::Date => {
                let s = json.as_str().ok_or_else(|| fail("an ISO date string"))?;
                parse_date(s)
                    .map(ScalarValue::Date)
                    .ok_or_else(|| fail("an ISO date string"))
            }
            ScalarType::Timestamp => {
                let s = json
                    .as_str()
                    .ok_or_else(|| fail("an ISO timestamp string"))?;
                parse_timestamp(s)
                    .map(ScalarValue::Timestamp)
                    .ok_or_else(|| fail("an ISO timestamp string"))
            }
            ScalarType::Time => {
                let s = json.as_str().ok_or_else(|| fail("a HH:MM:SS time string"))?;
                parse_time(s)
                    .map(ScalarValue::Time)
                    .ok_or_else(|| fail("a HH:MM:SS time string"))
            }
            ScalarType::Text => json
                .as_str()
                .map(|s| ScalarValue::Text(s.to_string()))
                .ok_or_else(|| fail("a string")),
        }
    }

    /// Cast to the declared column type, truncating text to `precision`.
    ///
    /// Numeric conversions are lossless-only: a float result casts to an
    /// integer column only when its fractional part is zero (script engines
    /// tend to hand back `10.0` for `x*2`), anything else is a
    /// `TypeMismatch`.
    pub fn cast_to(
        self,
        target: ScalarType,
        precision: Option<u32>,
        column: &str,
    ) -> Result<Self> {
        let mismatch = |v: &ScalarValue| RowGenError::TypeMismatch {
            column: column.to_string(),
            value: v.to_string(),
            target: target.to_string(),
        };
        match (target, self) {
            (ScalarType::Int, ScalarValue::Int(i)) => Ok(ScalarValue::Int(i)),
            (ScalarType::Int, ScalarValue::Float(f)) => {
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                    Ok(ScalarValue::Int(f as i64))
                } else {
                    Err(mismatch(&ScalarValue::Float(f)))
                }
            }
            (ScalarType::Int, ScalarValue::Decimal(d)) => {
                if d.fract().is_zero() {
                    d.to_i64()
                        .map(ScalarValue::Int)
                        .ok_or_else(|| mismatch(&ScalarValue::Decimal(d)))
                } else {
                    Err(mismatch(&ScalarValue::Decimal(d)))
                }
            }
            (ScalarType::Int, ScalarValue::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map(ScalarValue::Int)
                .map_err(|_| mismatch(&ScalarValue::Text(s.clone()))),

            (ScalarType::Float, ScalarValue::Float(f)) => Ok(ScalarValue::Float(f)),
            (ScalarType::Float, ScalarValue::Int(i)) => Ok(ScalarValue::Float(i as f64)),
            (ScalarType::Float, ScalarValue::Decimal(d)) => d
                .to_f64()
                .map(ScalarValue::Float)
                .ok_or_else(|| mismatch(&ScalarValue::Decimal(d))),
            (ScalarType::Float, ScalarValue::Text(s)) => s
                .trim()
                .parse::<f64>()
                .map(ScalarValue::Float)
                .map_err(|_| mismatch(&ScalarValue::Text(s.clone()))),

            (ScalarType::Decimal, ScalarValue::Decimal(d)) => Ok(ScalarValue::Decimal(d)),
            (ScalarType::Decimal, ScalarValue::Int(i)) => {
                Ok(ScalarValue::Decimal(Decimal::from(i)))
            }
            (ScalarType::Decimal, ScalarValue::Float(f)) => Decimal::from_f64(f)
                .map(ScalarValue::Decimal)
                .ok_or_else(|| mismatch(&ScalarValue::Float(f))),
            (ScalarType::Decimal, ScalarValue::Text(s)) => Decimal::from_str(s.trim())
                .map(ScalarValue::Decimal)
                .map_err(|_| mismatch(&ScalarValue::Text(s.clone()))),

            (ScalarType::Date, ScalarValue::Date(d)) => Ok(ScalarValue::Date(d)),
            (ScalarType::Date, ScalarValue::Timestamp(ts)) => Ok(ScalarValue::Date(ts.date())),
            (ScalarType::Date, ScalarValue::Text(s)) => parse_date(s.trim())
                .map(ScalarValue::Date)
                .ok_or_else(|| mismatch(&ScalarValue::Text(s.clone()))),

            (ScalarType::Timestamp, ScalarValue::Timestamp(ts)) => Ok(ScalarValue::Timestamp(ts)),
            (ScalarType::Timestamp, ScalarValue::Date(d)) => {
                Ok(ScalarValue::Timestamp(d.and_time(NaiveTime::MIN)))
            }
            (ScalarType::Timestamp, ScalarValue::Text(s)) => parse_timestamp(s.trim())
                .map(ScalarValue::Timestamp)
                .ok_or_else(|| mismatch(&ScalarValue::Text(s.clone()))),

            (ScalarType::Time, ScalarValue::Time(t)) => Ok(ScalarValue::Time(t)),
            (ScalarType::Time, ScalarValue::Timestamp(ts)) => Ok(ScalarValue::Time(ts.time())),
            (ScalarType::Time, ScalarValue::Text(s)) => parse_time(s.trim())
                .map(ScalarValue::Time)
                .ok_or_else(|| mismatch(&ScalarValue::Text(s.clone()))),

            (ScalarType::Text, v) => {
                let mut s = v.to_string();
                if let Some(p) = precision {
                    if s.chars().count() > p as usize {
                        s = s.chars().take(p as usize).collect();
                    }
                }
                Ok(ScalarValue::Text(s))
            }

            (_, v) => Err(mismatch(&v)),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Int(i) => write!(f, "{}", i),
            ScalarValue::Float(fl) => write!(f, "{}", fl),
            ScalarValue::Decimal(d) => write!(f, "{}", d),
            ScalarValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            ScalarValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.3f")),
            ScalarValue::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            ScalarValue::Text(s) => write!(f, "{}", s),
        }
    }
}

pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

pub(crate) fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| parse_date(s).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

pub(crate) fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f").ok()
}
