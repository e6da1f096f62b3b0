pub mod config;
pub mod error;
pub mod generate;
pub mod graph;
pub mod schema;

// Re-export key types for convenience
pub use config::{ColumnSpec, ConfigNumber, GeneratorKind};
pub use error::{Result, RowGenError};
pub use generate::domain::Domain;
pub use generate::generator::{Generator, TickContext};
pub use generate::providers::{
    AttributeProvider, Collaborators, ExpressionEvaluator, MemoryRowSource, ParentRelation,
    PatternSynthesizer, RowSource,
};
pub use generate::value::ScalarValue;
pub use graph::GeneratorGraph;
pub use schema::types::{ColumnMeta, RelationMeta, ScalarType};
