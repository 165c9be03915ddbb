//! REST API types.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AiError, PipelineError, RegistryError, ServerError};
use crate::models::SchemaPair;
use crate::transform::pipeline::{Converted, CsvInfo};
use crate::validation::SchemaIssue;

/// Response to `POST /api/convert`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    /// Unique job identifier
    pub job_id: String,

    /// "ready" when every target column is fed, "warning" otherwise
    pub status: String,

    /// Target header
    pub header: Vec<String>,

    /// Converted data rows
    pub rows: Vec<Vec<String>>,

    /// Header and rows as comma-delimited text
    pub csv: String,

    pub metadata: ConvertMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertMetadata {
    pub csv_info: CsvInfo,
    pub unmapped_targets: Vec<String>,
    pub unresolved_sources: Vec<UnresolvedSource>,
    pub issues: Vec<SchemaIssue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedSource {
    pub source_column: String,
    pub target_column: String,
}

impl ConvertResponse {
    pub fn new(converted: Converted, csv: String) -> Self {
        let degraded = !converted.unmapped_targets.is_empty()
            || !converted.unresolved_sources.is_empty();

        Self {
            job_id: Uuid::new_v4().to_string(),
            status: if degraded { "warning" } else { "ready" }.to_string(),
            header: converted.table.header,
            rows: converted.table.rows,
            csv,
            metadata: ConvertMetadata {
                csv_info: converted.csv_info,
                unmapped_targets: converted.unmapped_targets,
                unresolved_sources: converted
                    .unresolved_sources
                    .into_iter()
                    .map(|(source_column, target_column)| UnresolvedSource {
                        source_column,
                        target_column,
                    })
                    .collect(),
                issues: converted.issues,
            },
        }
    }
}

/// Response to `POST /api/generate`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub job_id: String,
    pub status: String,
    /// Registry name, when the pair was stored
    pub name: Option<String>,
    pub source: Value,
    pub target: Value,
}

impl GenerateResponse {
    pub fn new(pair: &SchemaPair, name: Option<String>) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            status: "ready".to_string(),
            name,
            source: serde_json::to_value(&pair.source).unwrap_or(Value::Null),
            target: serde_json::to_value(&pair.target).unwrap_or(Value::Null),
        }
    }
}

/// Create an error response body
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
    })
}

/// HTTP status for a failed request.
///
/// Bad input is the client's fault; failures of the model service are a bad
/// gateway; everything else is internal.
pub fn status_for(error: &ServerError) -> StatusCode {
    match error {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ServerError::Pipeline(e) => match e {
            PipelineError::Csv(_)
            | PipelineError::Convert(_)
            | PipelineError::Schema(_)
            | PipelineError::Config(_)
            | PipelineError::MissingArgument(_)
            | PipelineError::Registry(RegistryError::InvalidName(_)) => StatusCode::BAD_REQUEST,
            PipelineError::Ai(AiError::MissingApiKey) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::Ai(_) => StatusCode::BAD_GATEWAY,
            PipelineError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConvertError, CsvError};
    use crate::models::{ColumnSchema, Schema};
    use crate::transform::pipeline::convert_bytes;

    #[test]
    fn test_convert_response_shape() {
        let source = Schema::new(vec![ColumnSchema::new("a").with_target("x")]);
        let target = Schema::new(vec![ColumnSchema::new("x"), ColumnSchema::new("y")]);
        let converted = convert_bytes(b"a\n1\n", &source, &target).unwrap();
        let csv = converted.to_csv_string().unwrap();

        let json = serde_json::to_value(ConvertResponse::new(converted, csv)).unwrap();

        assert_eq!(json["status"], "warning");
        assert_eq!(json["header"], json!(["x", "y"]));
        assert_eq!(json["rows"], json!([["1", ""]]));
        assert_eq!(json["csv"], "x,y\n1,\n");
        assert_eq!(json["metadata"]["unmappedTargets"], json!(["y"]));
        assert_eq!(json["metadata"]["csvInfo"]["rowCount"], 1);
    }

    #[test]
    fn test_error_response() {
        let body = error_response("No data file provided");
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "No data file provided");
        assert!(body["jobId"].is_string());
    }

    #[test]
    fn test_status_mapping() {
        let bad: ServerError = PipelineError::from(ConvertError::MalformedInput("x".into())).into();
        assert_eq!(status_for(&bad), StatusCode::BAD_REQUEST);

        let empty: ServerError = PipelineError::from(CsvError::EmptyFile).into();
        assert_eq!(status_for(&empty), StatusCode::BAD_REQUEST);

        let upstream: ServerError = PipelineError::from(AiError::Http("timeout".into())).into();
        assert_eq!(status_for(&upstream), StatusCode::BAD_GATEWAY);

        let internal = ServerError::Internal("boom".into());
        assert_eq!(status_for(&internal), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
