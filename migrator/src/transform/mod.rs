//! Transformation module.
//!
//! - Engine: schema-driven conversion of raw records
//! - Pipeline: file and byte level orchestration around the engine

pub mod engine;
pub mod pipeline;

pub use engine::{convert, ColumnSource, MappingPlan, Table};
pub use pipeline::*;
