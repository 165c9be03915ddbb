//! # csvmigrate - schema-driven CSV migration
//!
//! Converts CSV exports from one system's vocabulary (column names and
//! categorical values) into another's, driven by a pair of JSON schemas.
//! The schemas can be written by hand or generated from sample files by a
//! language model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│   Engine    │────▶│  CSV File   │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ (schemas)   │     │  (target)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                                                ▲
//!                    ┌─────────────┐     ┌───────┴─────┐
//!                    │  Samples    │────▶│  Generator  │ (Ollama)
//!                    └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use csvmigrate::{convert_file, ConvertRequest, SchemaSource};
//!
//! let summary = convert_file(&ConvertRequest::new("users.csv", SchemaSource::Auto))?;
//! println!("Converted {} rows", summary.rows_converted);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per layer
//! - [`models`] - Column and schema model
//! - [`parser`] - CSV parsing with auto-detection
//! - [`transform`] - Conversion engine and pipeline
//! - [`validation`] - Schema document validation and linting
//! - [`cache`] - Stored schema pairs
//! - [`ai`] - Ollama client
//! - [`generator`] - Schema generation from samples
//! - [`config`] - Environment configuration
//! - [`api`] - HTTP API server
//! - [`logging`] - Tracing subscriber setup

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Storage
pub mod cache;

// AI
pub mod ai;
pub mod generator;

// HTTP API
pub mod api;

// Tracing setup for the binary
pub mod logging;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    AiError, ConfigError, ConvertError, CsvError, PipelineError, RegistryError, SchemaError,
    ServerError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{ColumnSchema, Schema, SchemaPair};

// =============================================================================
// Re-exports - Engine and pipeline
// =============================================================================

pub use transform::{
    convert, convert_bytes, convert_file, generate_and_store, ColumnSource, ConvertRequest,
    ConvertSummary, Converted, CsvInfo, MappingPlan, SchemaSource, Table,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    detect_delimiter, detect_encoding, parse_bytes_auto, read_csv_file, write_csv, ParseResult,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{lint, validate_schema_document, SchemaIssue, Severity};

// =============================================================================
// Re-exports - Registry, AI, configuration
// =============================================================================

pub use ai::{AiClient, TextGenerator};
pub use cache::{SchemaRegistry, StoredPair};
pub use config::{AiConfig, AiMode, AppConfig};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
