//! # Error Types
//!
//! Defines `RowGenError`, the unified error enum for every failure mode in
//! the generation engine. Every variant carries the column name and enough
//! context (generator kind, offending value) to debug immediately without
//! digging through logs.
//!
//! Configuration problems are detected while the generator graph is built,
//! before the first row is produced, so that a malformed definition is
//! rejected before any partial output exists.

use thiserror::Error;

/// All errors that can occur while building or driving a generator graph.
#[derive(Error, Debug)]
pub enum RowGenError {
    #[error("Invalid generator configuration for column '{column}': {message}")]
    Configuration { column: String, message: String },

    #[error("The {kind} generator does not support the scalar type {scalar_type} (column '{column}')")]
    UnsupportedType {
        column: String,
        kind: &'static str,
        scalar_type: String,
    },

    #[error("The value ({value}) of column '{column}' cannot be cast to {target}")]
    TypeMismatch {
        column: String,
        value: String,
        target: String,
    },

    #[error("The sequence of column '{column}' is exhausted after {ticks} draws and reset is disabled")]
    ExhaustedSequence { column: String, ticks: u64 },

    #[error("Value generation failed for column '{column}': {message}")]
    RuntimeGeneration { column: String, message: String },
}

impl RowGenError {
    /// Shorthand for the most common construction-time failure.
    pub fn config(column: impl Into<String>, message: impl Into<String>) -> Self {
        RowGenError::Configuration {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a runtime generation failure.
    pub fn runtime(column: impl Into<String>, message: impl Into<String>) -> Self {
        RowGenError::RuntimeGeneration {
            column: column.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RowGenError>;
