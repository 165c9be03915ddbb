//! Error types for the csv-migrator pipeline.
//!
//! One error enum per layer:
//!
//! - [`ConvertError`] - the conversion engine (the only fatal core condition)
//! - [`CsvError`] - CSV reading and writing
//! - [`SchemaError`] - schema document decoding and file access
//! - [`ConfigError`] - environment configuration
//! - [`AiError`] - text-generation client errors
//! - [`RegistryError`] - stored schema pairs
//! - [`PipelineError`] - top-level orchestration errors
//! - [`ServerError`] - HTTP API errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// Conversion Errors
// =============================================================================

/// Errors raised by the conversion engine.
///
/// Missing mappings, short rows and unmapped categorical values are not
/// errors: they degrade to empty or passed-through cells.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConvertError {
    /// The raw input cannot be converted at all (e.g. no header row).
    #[error("Malformed input: {0}")]
    MalformedInput(String),
}

// =============================================================================
// CSV Errors
// =============================================================================

/// Errors during CSV reading and writing.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read or write a file.
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to decode the file content.
    #[error("Failed to decode content: {0}")]
    Encoding(String),

    /// Invalid CSV format.
    #[error("Invalid CSV format: {0}")]
    Parse(#[from] csv::Error),

    /// Delimiter must be a single ASCII character.
    #[error("Invalid delimiter '{0}': must be a single ASCII character")]
    InvalidDelimiter(char),

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// Header present but no data rows.
    #[error("CSV must have at least a header and one data row")]
    NoDataRows,

    /// Failed to encode output records.
    #[error("Failed to write CSV: {0}")]
    Write(String),
}

// =============================================================================
// Schema Errors
// =============================================================================

/// Errors while loading or saving schema documents.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Failed to read or write the schema file.
    #[error("Failed to access schema '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not a JSON array of column objects.
    #[error("Invalid schema JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while reading configuration from the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Unknown AI mode string.
    #[error("Invalid AI mode '{0}' (expected 'local' or 'cloud')")]
    InvalidMode(String),

    /// A variable holds a value of the wrong shape.
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

// =============================================================================
// AI Client Errors
// =============================================================================

/// Errors from the text-generation client.
#[derive(Debug, Error)]
pub enum AiError {
    /// Cloud mode without an API key.
    #[error("OLLAMA_API_KEY is not set")]
    MissingApiKey,

    /// HTTP request failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Service answered with a non-success status.
    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// Response could not be turned into a schema.
    #[error("Invalid AI response: {0}")]
    InvalidResponse(String),
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the schema registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Pair (or half of it) not stored.
    #[error("Schema pair not found: {0}")]
    NotFound(String),

    /// Name is empty after slugging.
    #[error("Invalid schema name: '{0}'")]
    InvalidName(String),

    /// IO error.
    #[error("Registry IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document could not be read.
    #[error("Registry schema error: {0}")]
    Schema(#[from] SchemaError),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline`]. It wraps
/// all lower-level errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Conversion error.
    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    /// Schema error.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// AI client error.
    #[error("AI error: {0}")]
    Ai(#[from] AiError),

    /// Registry error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A required input was not provided.
    #[error("Missing argument: {0}")]
    MissingArgument(String),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for the conversion engine.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for schema documents.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for AI operations.
pub type AiResult<T> = Result<T, AiError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let csv_err = CsvError::EmptyFile;
        let pipeline_err: PipelineError = csv_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        let convert_err = ConvertError::MalformedInput("no header row".into());
        let pipeline_err: PipelineError = convert_err.into();
        assert!(pipeline_err.to_string().contains("no header row"));

        let server_err: ServerError = pipeline_err.into();
        assert!(server_err.to_string().starts_with("Pipeline error"));
    }

    #[test]
    fn test_api_error_format() {
        let err = AiError::Api {
            status: 401,
            body: "unauthorized".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("unauthorized"));
    }

    #[test]
    fn test_registry_wraps_schema_error() {
        let json_err = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        let err: RegistryError = SchemaError::Json(json_err).into();
        assert!(err.to_string().contains("Invalid schema JSON"));
    }
}
