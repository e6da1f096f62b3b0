use crate::generate::value::ScalarValue;

/// The closed-form value domain of a generator: smallest value, largest
/// value and the number of distinct values in between.
///
/// Computed without drawing, so that a dependent generator (a foreign
/// column targeting a generated parent key) can mirror its parent's value
/// space before the parent has produced a single row.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    pub min: ScalarValue,
    pub max: ScalarValue,
    pub count: u64,
}

impl Domain {
    pub fn new(min: ScalarValue, max: ScalarValue, count: u64) -> Self {
        Self { min, max, count }
    }
}
