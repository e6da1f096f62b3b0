pub mod codec;
pub mod dataset;
pub mod domain;
pub mod expression;
pub mod foreign;
pub mod generator;
pub mod histogram;
pub mod meta;
pub mod providers;
pub mod random;
pub mod regexp;
pub mod sequence;
pub mod ticker;
pub mod value;

pub use domain::Domain;
pub use generator::{Generator, TickContext};
pub use value::ScalarValue;
