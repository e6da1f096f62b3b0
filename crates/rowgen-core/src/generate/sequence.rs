//! # Sequence Generator
//!
//! Deterministic, order-sensitive value production. A sequence either walks
//! an explicit value list or computes `start + offset + tick * step` (the
//! offset is applied once, not per tick) in the arithmetic of its column
//! type: integer addition, float addition,
//! scale-aware decimal addition, whole days for dates, milliseconds for
//! timestamps and times, and alphabet-codec ordinal stepping for text.
//!
//! Sequences are also the only generators that participate in tick chains
//! (composite-key odometers). A sequence that names a `tickerFor` target
//! advances the target exactly when it wraps; a sequence that is the target
//! of such a chain stops self-advancing and moves only when ticked.

use chrono::Duration;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;

use crate::config::{ColumnSpec, ConfigNumber};
use crate::error::{Result, RowGenError};
use crate::generate::codec::AlphabetCodec;
use crate::generate::domain::Domain;
use crate::generate::value::ScalarValue;
use crate::schema::types::{ColumnMeta, ScalarType};

/// Per-type step of an arithmetic sequence.
#[derive(Debug, Clone)]
enum Stride {
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Days(i64),
    Millis(i64),
    /// Text stepping over a bijective alphabet; `start_ord` is the decoded
    /// ordinal of the start string.
    Alphabet {
        step: i64,
        start_ord: u64,
        codec: AlphabetCodec,
    },
}

#[derive(Debug, Clone)]
enum Mode {
    Values(Vec<ScalarValue>),
    Arithmetic { start: ScalarValue, stride: Stride },
}

#[derive(Debug, Clone)]
pub struct SequenceGenerator {
    column: String,
    scalar_type: ScalarType,
    scale: Option<u32>,
    precision: Option<u32>,
    mode: Mode,
    offset: i64,
    max_tick: u64,
    /// Wrap to tick zero on exhaustion instead of erroring (the `reset`
    /// property).
    wraps: bool,
    ticker_for: Option<String>,
    /// Set when another sequence names this one as its `tickerFor` target;
    /// suppresses self-advancement.
    ticked_externally: bool,
    tick_counter: u64,
    pending_rollover: bool,
    current: Option<ScalarValue>,
}

impl SequenceGenerator {
    pub fn from_spec(meta: &ColumnMeta, spec: &ColumnSpec) -> Result<Self> {
        let column = meta.name.clone();
        let mode = if let Some(values) = &spec.values {
            if values.is_empty() {
                return Err(RowGenError::config(
                    &column,
                    "the 'values' property must not be empty",
                ));
            }
            let values = values
                .iter()
                .map(|v| ScalarValue::from_json(meta.scalar_type, v, &column))
                .collect::<Result<Vec<_>>>()?;
            Mode::Values(values)
        } else {
            arithmetic_mode(meta, spec)?
        };

        let offset = match spec.offset {
            Some(n) => n.as_i64(&column, "offset")?,
            None => default_offset(meta.scalar_type, &mode),
        };
        let max_tick = spec.max_tick.unwrap_or(match &mode {
            Mode::Values(values) => values.len() as u64,
            Mode::Arithmetic { .. } => u64::MAX,
        });
        if max_tick == 0 {
            return Err(RowGenError::config(
                &column,
                "the 'maxTick' property must be at least 1",
            ));
        }

        Ok(Self {
            column,
            scalar_type: meta.scalar_type,
            scale: meta.scale,
            precision: meta.precision,
            mode,
            offset,
            max_tick,
            wraps: spec.reset.unwrap_or(false),
            ticker_for: spec.ticker_for.clone(),
            ticked_externally: false,
            tick_counter: 0,
            pending_rollover: false,
            current: None,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn ticker_for(&self) -> Option<&str> {
        self.ticker_for.as_deref()
    }

    /// The tick target counts as a dependency so the odometer parent is
    /// evaluated before its subordinate in every row.
    pub fn dependencies(&self) -> &[String] {
        self.ticker_for.as_slice()
    }

    pub fn wraps(&self) -> bool {
        self.wraps
    }

    pub fn max_tick(&self) -> u64 {
        self.max_tick
    }

    pub(crate) fn set_ticked_externally(&mut self) {
        self.ticked_externally = true;
    }

    pub fn current(&self) -> Option<&ScalarValue> {
        self.current.as_ref()
    }

    /// Draw the value at the current tick, then self-advance unless this
    /// sequence is moved by a subordinate chain member.
    pub fn next(&mut self) -> Result<ScalarValue> {
        let value = self.value_at(self.tick_counter)?;
        self.current = Some(value.clone());
        if !self.ticked_externally && self.advance() {
            self.pending_rollover = true;
        }
        Ok(value)
    }

    /// Consume the rollover flag raised by the last self-advancing draw.
    pub(crate) fn take_rollover(&mut self) -> bool {
        std::mem::take(&mut self.pending_rollover)
    }

    /// Advance one tick on behalf of a subordinate that wrapped. Returns
    /// true when this sequence wrapped in turn.
    pub(crate) fn tick(&mut self) -> bool {
        self.advance()
    }

    fn advance(&mut self) -> bool {
        self.tick_counter += 1;
        if self.tick_counter >= self.max_tick && self.wraps {
            self.tick_counter = 0;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.tick_counter = 0;
        self.pending_rollover = false;
        self.current = None;
    }

    fn value_at(&self, tick: u64) -> Result<ScalarValue> {
        if tick >= self.max_tick {
            return Err(RowGenError::ExhaustedSequence {
                column: self.column.clone(),
                ticks: tick,
            });
        }
        self.raw_value_at(tick)
    }

    /// The value at a tick, without the exhaustion guard. Closed-form:
    /// `start + offset + tick * step`, no state consulted besides the
    /// configuration.
    fn raw_value_at(&self, tick: u64) -> Result<ScalarValue> {
        match &self.mode {
            Mode::Values(values) => match values.get(tick as usize) {
                Some(value) => Ok(value.clone()),
                None => Err(RowGenError::runtime(
                    &self.column,
                    format!(
                        "tick {} is outside the value list (length {})",
                        tick,
                        values.len()
                    ),
                )),
            },
            Mode::Arithmetic { start, stride } => self.step_from(start, stride, tick as i64),
        }
    }

    fn step_from(&self, start: &ScalarValue, stride: &Stride, tick: i64) -> Result<ScalarValue> {
        let overflow = || {
            RowGenError::runtime(
                &self.column,
                format!("sequence overflowed at tick {}", tick),
            )
        };
        // The total displacement from start, in step units: offset + n*step.
        let delta = |step: i64| step.checked_mul(tick).and_then(|d| d.checked_add(self.offset));
        match (start, stride) {
            (ScalarValue::Int(s), Stride::Int(step)) => delta(*step)
                .and_then(|d| s.checked_add(d))
                .map(ScalarValue::Int)
                .ok_or_else(overflow),
            (ScalarValue::Float(s), Stride::Float(step)) => Ok(ScalarValue::Float(
                s + self.offset as f64 + step * tick as f64,
            )),
            (ScalarValue::Decimal(s), Stride::Decimal(step)) => step
                .checked_mul(Decimal::from(tick))
                .and_then(|d| d.checked_add(Decimal::from(self.offset)))
                .and_then(|d| s.checked_add(d))
                .map(|d| ScalarValue::Decimal(d).round_to_scale(self.scale))
                .ok_or_else(overflow),
            (ScalarValue::Date(s), Stride::Days(step)) => delta(*step)
                .and_then(|d| s.checked_add_signed(Duration::days(d)))
                .map(ScalarValue::Date)
                .ok_or_else(overflow),
            (ScalarValue::Timestamp(s), Stride::Millis(step)) => delta(*step)
                .and_then(|d| s.checked_add_signed(Duration::milliseconds(d)))
                .map(ScalarValue::Timestamp)
                .ok_or_else(overflow),
            (ScalarValue::Time(s), Stride::Millis(step)) => {
                let d = delta(*step).ok_or_else(overflow)?;
                // NaiveTime arithmetic wraps around midnight.
                Ok(ScalarValue::Time(
                    s.overflowing_add_signed(Duration::milliseconds(d)).0,
                ))
            }
            (
                ScalarValue::Text(_),
                Stride::Alphabet {
                    step,
                    start_ord,
                    codec,
                },
            ) => {
                let ord = *start_ord as i128
                    + self.offset as i128
                    + (*step as i128) * tick as i128;
                let ord = u64::try_from(ord).map_err(|_| {
                    RowGenError::runtime(
                        &self.column,
                        format!("text sequence stepped below the empty string at tick {}", tick),
                    )
                })?;
                Ok(ScalarValue::Text(codec.encode(ord)))
            }
            _ => Err(RowGenError::runtime(
                &self.column,
                "sequence start and step types diverge",
            )),
        }
    }

    fn step_sign(&self) -> i64 {
        match &self.mode {
            Mode::Values(_) => 1,
            Mode::Arithmetic { stride, .. } => match stride {
                Stride::Int(s) | Stride::Days(s) | Stride::Millis(s) => s.signum(),
                Stride::Float(s) => {
                    if *s < 0.0 {
                        -1
                    } else {
                        1
                    }
                }
                Stride::Decimal(s) => {
                    if s.is_sign_negative() {
                        -1
                    } else {
                        1
                    }
                }
                Stride::Alphabet { step, .. } => step.signum(),
            },
        }
    }

    /// How many values this sequence can produce before exhausting: the
    /// smaller of the configured `maxTick` and the number of steps that
    /// fit in the column's declared precision.
    pub fn count_hint(&self) -> u64 {
        self.max_tick.min(self.precision_bound())
    }

    /// Number of draws that stay within the column's declared precision,
    /// `u64::MAX` when no precision applies.
    fn precision_bound(&self) -> u64 {
        let (Some(p), Mode::Arithmetic { start, stride }) = (self.precision, &self.mode) else {
            return u64::MAX;
        };
        match (start, stride) {
            (ScalarValue::Int(s), Stride::Int(step)) => {
                let bound = 10i128.checked_pow(p).map(|b| b - 1).unwrap_or(i128::MAX);
                let v0 = *s as i128 + self.offset as i128;
                ticks_within(v0, *step as i128, -bound, bound)
            }
            (
                ScalarValue::Text(_),
                Stride::Alphabet {
                    step,
                    start_ord,
                    codec,
                },
            ) => {
                let radix = codec.radix() as i128;
                // Largest ordinal representable in p characters.
                let mut bound: i128 = 0;
                for _ in 0..p {
                    bound = bound * radix + radix;
                }
                let v0 = *start_ord as i128 + self.offset as i128;
                ticks_within(v0, *step as i128, 0, bound)
            }
            _ => u64::MAX,
        }
    }

    /// The value space of the first `size` draws, in closed form.
    pub fn domain(&self, size: u64) -> Result<Domain> {
        let last_tick = size.saturating_sub(1);
        let first = self.raw_value_at(0)?;
        let last = self.raw_value_at(last_tick)?;
        let (min, max) = if self.step_sign() < 0 {
            (last, first)
        } else {
            (first, last)
        };
        Ok(Domain::new(min, max, size))
    }
}

/// Number of draws starting at `v0` stepping by `step` that stay within
/// `[low, high]`, saturating at `u64::MAX`.
fn ticks_within(v0: i128, step: i128, low: i128, high: i128) -> u64 {
    if step == 0 {
        return u64::MAX;
    }
    let room = if step > 0 { high - v0 } else { v0 - low };
    if room < 0 {
        return 0;
    }
    u64::try_from(room / step.abs() + 1).unwrap_or(u64::MAX)
}

fn default_offset(scalar_type: ScalarType, mode: &Mode) -> i64 {
    match (scalar_type, mode) {
        // A backwards date walk starts the day before `start`; a forward
        // walk begins on `start` itself.
        (
            ScalarType::Date,
            Mode::Arithmetic {
                stride: Stride::Days(step),
                ..
            },
        ) if *step < 0 => -1,
        _ => 0,
    }
}

fn arithmetic_mode(meta: &ColumnMeta, spec: &ColumnSpec) -> Result<Mode> {
    let column = &meta.name;
    let start = match &spec.start {
        Some(json) => ScalarValue::from_json(meta.scalar_type, json, column)?,
        None => default_start(meta.scalar_type),
    };
    let int_step = |default: i64, key: &str| -> Result<i64> {
        match spec.step {
            Some(n) => n.as_i64(column, key),
            None => Ok(default),
        }
    };
    let stride = match meta.scalar_type {
        ScalarType::Int => Stride::Int(int_step(1, "step")?),
        ScalarType::Float => Stride::Float(spec.step.map(|n| n.as_f64()).unwrap_or(1.0)),
        ScalarType::Decimal => Stride::Decimal(match spec.step {
            Some(ConfigNumber::Int(i)) => Decimal::from(i),
            Some(ConfigNumber::Float(f)) => Decimal::from_f64(f).ok_or_else(|| {
                RowGenError::config(column, format!("the 'step' property ({}) is not a decimal", f))
            })?,
            None => Decimal::ONE,
        }),
        ScalarType::Date => Stride::Days(int_step(-1, "step")?),
        ScalarType::Timestamp => Stride::Millis(int_step(-10_000, "step")?),
        ScalarType::Time => Stride::Millis(int_step(1_000, "step")?),
        ScalarType::Text => {
            let codec = AlphabetCodec::default();
            let text = match &start {
                ScalarValue::Text(s) => s.as_str(),
                _ => "",
            };
            let start_ord = codec.decode(text).ok_or_else(|| {
                RowGenError::config(
                    column,
                    format!("the 'start' value ({}) is outside the sequence alphabet", text),
                )
            })?;
            Stride::Alphabet {
                step: int_step(1, "step")?,
                start_ord,
                codec,
            }
        }
    };
    if matches!(stride, Stride::Int(0) | Stride::Days(0) | Stride::Millis(0))
        || matches!(stride, Stride::Alphabet { step: 0, .. })
    {
        return Err(RowGenError::config(
            column,
            "the 'step' property must not be zero",
        ));
    }
    Ok(Mode::Arithmetic { start, stride })
}

fn default_start(scalar_type: ScalarType) -> ScalarValue {
    let now = chrono::Utc::now().naive_utc();
    match scalar_type {
        ScalarType::Int => ScalarValue::Int(1),
        ScalarType::Float => ScalarValue::Float(1.0),
        ScalarType::Decimal => ScalarValue::Decimal(Decimal::ZERO),
        ScalarType::Date => ScalarValue::Date(now.date()),
        ScalarType::Timestamp => ScalarValue::Timestamp(now),
        ScalarType::Time => ScalarValue::Time(
            chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap_or_default(),
        ),
        ScalarType::Text => ScalarValue::Text("a".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn int_meta(name: &str) -> ColumnMeta {
        ColumnMeta::new(name, ScalarType::Int)
    }

    #[test]
    fn test_int_defaults_count_from_one() {
        let mut seq = SequenceGenerator::from_spec(&int_meta("id"), &ColumnSpec::sequence()).unwrap();
        assert_eq!(seq.next().unwrap(), ScalarValue::Int(1));
        assert_eq!(seq.next().unwrap(), ScalarValue::Int(2));
        assert_eq!(seq.next().unwrap(), ScalarValue::Int(3));
        assert_eq!(seq.current(), Some(&ScalarValue::Int(3)));
    }

    #[test]
    fn test_start_step_offset() {
        let spec = ColumnSpec::sequence()
            .with_start(serde_json::json!(100))
            .with_step(ConfigNumber::Int(5))
            .with_offset(ConfigNumber::Int(2));
        let mut seq = SequenceGenerator::from_spec(&int_meta("id"), &spec).unwrap();
        // The offset shifts the whole progression once.
        assert_eq!(seq.next().unwrap(), ScalarValue::Int(102));
        assert_eq!(seq.next().unwrap(), ScalarValue::Int(107));
    }

    #[test]
    fn test_exhaustion_without_reset() {
        let spec = ColumnSpec::sequence().with_max_tick(2);
        let mut seq = SequenceGenerator::from_spec(&int_meta("id"), &spec).unwrap();
        assert!(seq.next().is_ok());
        assert!(seq.next().is_ok());
        assert!(matches!(
            seq.next(),
            Err(RowGenError::ExhaustedSequence { ticks: 2, .. })
        ));
    }

    #[test]
    fn test_reset_wraps_and_raises_rollover() {
        let spec = ColumnSpec::sequence().with_max_tick(2).with_reset(true);
        let mut seq = SequenceGenerator::from_spec(&int_meta("id"), &spec).unwrap();
        assert_eq!(seq.next().unwrap(), ScalarValue::Int(1));
        assert!(!seq.take_rollover());
        assert_eq!(seq.next().unwrap(), ScalarValue::Int(2));
        assert!(seq.take_rollover());
        assert_eq!(seq.next().unwrap(), ScalarValue::Int(1));
    }

    #[test]
    fn test_externally_ticked_holds_still() {
        let mut seq =
            SequenceGenerator::from_spec(&int_meta("id"), &ColumnSpec::sequence()).unwrap();
        seq.set_ticked_externally();
        assert_eq!(seq.next().unwrap(), ScalarValue::Int(1));
        assert_eq!(seq.next().unwrap(), ScalarValue::Int(1));
        seq.tick();
        assert_eq!(seq.next().unwrap(), ScalarValue::Int(2));
    }

    #[test]
    fn test_explicit_values_cycle() {
        let spec = ColumnSpec::sequence()
            .with_values(vec![
                serde_json::json!(7),
                serde_json::json!(8),
                serde_json::json!(9),
            ])
            .with_reset(true);
        let mut seq = SequenceGenerator::from_spec(&int_meta("id"), &spec).unwrap();
        let drawn: Vec<_> = (0..5).map(|_| seq.next().unwrap()).collect();
        assert_eq!(
            drawn,
            vec![
                ScalarValue::Int(7),
                ScalarValue::Int(8),
                ScalarValue::Int(9),
                ScalarValue::Int(7),
                ScalarValue::Int(8),
            ]
        );
        assert_eq!(seq.count_hint(), 3);
    }

    #[test]
    fn test_date_defaults_walk_backwards() {
        let meta = ColumnMeta::new("d", ScalarType::Date);
        let spec = ColumnSpec::sequence().with_start(serde_json::json!("2021-01-10"));
        let mut seq = SequenceGenerator::from_spec(&meta, &spec).unwrap();
        // Default offset -1 and step -1: the walk starts the day before
        // start and moves backwards.
        assert_eq!(
            seq.next().unwrap(),
            ScalarValue::Date(NaiveDate::from_ymd_opt(2021, 1, 9).unwrap())
        );
        assert_eq!(
            seq.next().unwrap(),
            ScalarValue::Date(NaiveDate::from_ymd_opt(2021, 1, 8).unwrap())
        );
    }

    #[test]
    fn test_date_forward_step_starts_on_start() {
        let meta = ColumnMeta::new("d", ScalarType::Date);
        let spec = ColumnSpec::sequence()
            .with_start(serde_json::json!("2024-01-10"))
            .with_step(ConfigNumber::Int(7));
        let mut seq = SequenceGenerator::from_spec(&meta, &spec).unwrap();
        // No implicit offset when the walk moves forward.
        assert_eq!(
            seq.next().unwrap(),
            ScalarValue::Date(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap())
        );
        assert_eq!(
            seq.next().unwrap(),
            ScalarValue::Date(NaiveDate::from_ymd_opt(2024, 1, 17).unwrap())
        );
    }

    #[test]
    fn test_decimal_defaults_count_from_zero() {
        let meta = ColumnMeta::new("amount", ScalarType::Decimal).with_scale(2);
        let mut seq = SequenceGenerator::from_spec(&meta, &ColumnSpec::sequence()).unwrap();
        assert_eq!(seq.next().unwrap(), ScalarValue::Decimal(Decimal::ZERO));
        assert_eq!(seq.next().unwrap(), ScalarValue::Decimal(Decimal::ONE));
    }

    #[test]
    fn test_text_sequence_steps_alphabet() {
        let meta = ColumnMeta::new("t", ScalarType::Text);
        let spec = ColumnSpec::sequence().with_start(serde_json::json!("y"));
        let mut seq = SequenceGenerator::from_spec(&meta, &spec).unwrap();
        assert_eq!(seq.next().unwrap(), ScalarValue::Text("y".into()));
        assert_eq!(seq.next().unwrap(), ScalarValue::Text("z".into()));
        assert_eq!(seq.next().unwrap(), ScalarValue::Text("aa".into()));
    }

    #[test]
    fn test_count_hint_bounded_by_precision() {
        let meta = ColumnMeta::new("id", ScalarType::Int).with_precision(2);
        let seq = SequenceGenerator::from_spec(&meta, &ColumnSpec::sequence()).unwrap();
        // 1, 2, ..., 99
        assert_eq!(seq.count_hint(), 99);

        let meta = ColumnMeta::new("t", ScalarType::Text).with_precision(1);
        let seq = SequenceGenerator::from_spec(&meta, &ColumnSpec::sequence()).unwrap();
        // a..z
        assert_eq!(seq.count_hint(), 26);
    }

    #[test]
    fn test_count_hint_is_min_of_max_tick_and_precision() {
        let meta = ColumnMeta::new("id", ScalarType::Int).with_precision(2);
        let spec = ColumnSpec::sequence().with_max_tick(1000);
        let seq = SequenceGenerator::from_spec(&meta, &spec).unwrap();
        // The precision runs out long before the configured maxTick.
        assert_eq!(seq.count_hint(), 99);

        let spec = ColumnSpec::sequence().with_max_tick(50);
        let seq = SequenceGenerator::from_spec(&meta, &spec).unwrap();
        assert_eq!(seq.count_hint(), 50);
    }

    #[test]
    fn test_domain_is_direction_aware() {
        let spec = ColumnSpec::sequence()
            .with_start(serde_json::json!(10))
            .with_step(ConfigNumber::Int(-2));
        let seq = SequenceGenerator::from_spec(&int_meta("id"), &spec).unwrap();
        let domain = seq.domain(4).unwrap();
        assert_eq!(domain.min, ScalarValue::Int(4));
        assert_eq!(domain.max, ScalarValue::Int(10));
        assert_eq!(domain.count, 4);
    }

    #[test]
    fn test_zero_step_rejected() {
        let spec = ColumnSpec::sequence().with_step(ConfigNumber::Int(0));
        assert!(SequenceGenerator::from_spec(&int_meta("id"), &spec).is_err());
    }
}
