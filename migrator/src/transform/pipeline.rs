//! High-level pipeline API: schemas in, converted CSV out.
//!
//! Combines parsing, schema loading, linting, conversion and writing.
//!
//! # Example
//!
//! ```rust,ignore
//! use csvmigrate::transform::{convert_file, ConvertRequest, SchemaSource};
//!
//! let summary = convert_file(&ConvertRequest::new(
//!     "exports/users.csv",
//!     SchemaSource::Stored("users".into()),
//! ))?;
//! println!("Wrote {} rows to {}", summary.rows_converted, summary.output_path.display());
//! ```

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::engine::{MappingPlan, Table};
use crate::ai::TextGenerator;
use crate::api::logs::{log_info, log_info_indent, log_success, log_warning, log_warning_indent};
use crate::cache::{slugify, SchemaRegistry};
use crate::config::DEFAULT_OUTPUT_DIR;
use crate::error::{ConvertError, PipelineResult, RegistryError};
use crate::generator::generate_schema_pair;
use crate::models::{Schema, SchemaPair};
use crate::parser::{parse_bytes_auto, read_csv_file, records_to_csv_string, write_csv, ParseResult};
use crate::validation::{lint, SchemaIssue, Severity};

/// Where the schemas for a conversion come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    /// Explicit schema files
    Files { source: PathBuf, target: PathBuf },
    /// A pair stored in the registry under this name
    Stored(String),
    /// Best stored pair for the data header
    Auto,
}

/// Options for [`convert_file`]
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    /// CSV file to convert
    pub data: PathBuf,
    pub schemas: SchemaSource,
    /// Output name; defaults to the stored pair name or the data file stem
    pub name: Option<String>,
    /// Output root; the registry lives in `<output_dir>/schemas`
    pub output_dir: PathBuf,
}

impl ConvertRequest {
    pub fn new(data: impl Into<PathBuf>, schemas: SchemaSource) -> Self {
        Self {
            data: data.into(),
            schemas,
            name: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    fn registry(&self) -> SchemaRegistry {
        SchemaRegistry::with_dir(self.output_dir.join("schemas"))
    }
}

/// CSV file information
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

impl From<&ParseResult> for CsvInfo {
    fn from(parsed: &ParseResult) -> Self {
        Self {
            encoding: parsed.encoding.clone(),
            delimiter: parsed.delimiter,
            headers: parsed.headers.clone(),
            row_count: parsed.data_row_count(),
        }
    }
}

/// In-memory conversion result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Converted {
    pub table: Table,
    pub csv_info: CsvInfo,
    /// Target columns with no feeding source entry
    pub unmapped_targets: Vec<String>,
    /// `(source column, target column)` pairs whose source column is not in the data
    pub unresolved_sources: Vec<(String, String)>,
    pub issues: Vec<SchemaIssue>,
}

impl Converted {
    /// Converted table as comma-delimited text.
    pub fn to_csv_string(&self) -> PipelineResult<String> {
        Ok(records_to_csv_string(&self.table.clone().into_records(), ',')?)
    }
}

/// Result of [`convert_file`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertSummary {
    pub output_path: PathBuf,
    /// Registry pair used, if any
    pub schema_name: Option<String>,
    pub rows_converted: usize,
    pub column_count: usize,
    pub unmapped_targets: Vec<String>,
    pub issues: Vec<SchemaIssue>,
}

/// Convert a CSV file and write `<output_dir>/converted_<name>.csv`.
///
/// Nothing is written unless every step succeeds.
pub fn convert_file(request: &ConvertRequest) -> PipelineResult<ConvertSummary> {
    log_info("Reading CSV file...");
    let parsed = read_csv_file(&request.data)?;
    log_csv_info(&parsed);

    let (pair, schema_name) = resolve_schemas(request, &parsed.headers)?;
    let name = output_name(request, schema_name.as_deref())?;
    let converted = convert_parsed(&parsed, &pair.source, &pair.target)?;

    let output_path = request.output_dir.join(format!("converted_{}.csv", name));
    let rows_converted = converted.table.row_count();
    let column_count = converted.table.header.len();

    write_csv(&output_path, &converted.table.into_records())?;
    log_success(format!(
        "Wrote {} rows x {} columns to {}",
        rows_converted,
        column_count,
        output_path.display()
    ));

    Ok(ConvertSummary {
        output_path,
        schema_name,
        rows_converted,
        column_count,
        unmapped_targets: converted.unmapped_targets,
        issues: converted.issues,
    })
}

/// Convert raw CSV bytes in memory (no file output).
pub fn convert_bytes(bytes: &[u8], source: &Schema, target: &Schema) -> PipelineResult<Converted> {
    let parsed = parse_bytes_auto(bytes)?;
    log_csv_info(&parsed);
    convert_parsed(&parsed, source, target)
}

/// Generate a schema pair from two samples and store it under `name`.
///
/// Returns the slug the pair was stored under with the pair itself.
pub async fn generate_and_store(
    generator: &dyn TextGenerator,
    source_sample: &Path,
    target_sample: &Path,
    name: &str,
    registry: &SchemaRegistry,
) -> PipelineResult<(String, SchemaPair)> {
    // Reject a bad name before spending a model call on it
    slugify(name)?;

    let pair = generate_schema_pair(generator, source_sample, target_sample).await?;
    let slug = registry.save(name, &pair)?;
    log_success(format!(
        "Saved {} and {}",
        registry.target_path(&slug).display(),
        registry.source_path(&slug).display()
    ));
    Ok((slug, pair))
}

/// Lint, plan, convert and log.
fn convert_parsed(parsed: &ParseResult, source: &Schema, target: &Schema) -> PipelineResult<Converted> {
    let issues = lint(source, target);
    log_issues(&issues);

    let plan = MappingPlan::build(&parsed.headers, source, target);
    let unmapped_targets: Vec<String> = plan.unmapped_targets().into_iter().map(str::to_string).collect();
    let unresolved_sources: Vec<(String, String)> = plan
        .unresolved_sources()
        .into_iter()
        .map(|(s, t)| (s.to_string(), t.to_string()))
        .collect();
    log_plan(&plan);

    log_info("Converting rows...");
    let data = parsed
        .records
        .get(1..)
        .ok_or_else(|| ConvertError::MalformedInput("input has no header row".to_string()))?;
    let table = plan.table(data);
    log_success(format!("Converted {} rows", table.row_count()));

    Ok(Converted {
        table,
        csv_info: CsvInfo::from(parsed),
        unmapped_targets,
        unresolved_sources,
        issues,
    })
}

fn resolve_schemas(
    request: &ConvertRequest,
    headers: &[String],
) -> PipelineResult<(SchemaPair, Option<String>)> {
    match &request.schemas {
        SchemaSource::Files { source, target } => {
            log_info(format!("Using schemas {} -> {}", source.display(), target.display()));
            let pair = SchemaPair {
                source: Schema::load(source)?,
                target: Schema::load(target)?,
            };
            Ok((pair, None))
        }
        SchemaSource::Stored(name) => {
            log_info(format!("Using stored schema pair '{}'", name));
            let pair = request.registry().load(name)?;
            Ok((pair, Some(name.clone())))
        }
        SchemaSource::Auto => {
            log_info("Looking for compatible stored schema pairs...");
            let mut compatible = request.registry().find_compatible(headers)?;
            if compatible.is_empty() {
                log_warning("No compatible schema pairs found");
                return Err(RegistryError::NotFound("no stored pair matches the CSV header".into()).into());
            }

            let best = compatible.remove(0);
            log_success(format!(
                "Using '{}' (score: {:.0}%, {} candidate(s))",
                best.name,
                best.score * 100.0,
                compatible.len() + 1
            ));
            Ok((best.pair, Some(best.name)))
        }
    }
}

/// Slugged output name, so it can never leave `output_dir`.
///
/// An explicit name that slugs to nothing is an error; the fallbacks
/// (pair name, then data file stem) end at `output`.
fn output_name(request: &ConvertRequest, schema_name: Option<&str>) -> PipelineResult<String> {
    if let Some(name) = request.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        return Ok(slugify(name)?);
    }

    Ok(schema_name
        .or_else(|| request.data.file_stem().and_then(|s| s.to_str()))
        .and_then(|n| slugify(n).ok())
        .unwrap_or_else(|| "output".to_string()))
}

/// Format delimiter for display
fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        other => other.to_string(),
    }
}

fn log_csv_info(parsed: &ParseResult) {
    log_success(format!("Detected encoding: {}", parsed.encoding));
    log_success(format!("Detected separator: '{}'", format_delimiter(parsed.delimiter)));
    log_success(format!("Read {} data rows", parsed.data_row_count()));
    log_info(format!("CSV has {} columns:", parsed.headers.len()));
    for (i, col) in parsed.headers.iter().enumerate() {
        log_info_indent(format!("[{:2}] {}", i + 1, col), 1);
    }
}

fn log_issues(issues: &[SchemaIssue]) {
    if issues.is_empty() {
        return;
    }
    log_warning(format!("{} schema issue(s):", issues.len()));
    for issue in issues {
        match issue.severity {
            Severity::Warning => log_warning_indent(issue.to_string(), 1),
            Severity::Info => log_info_indent(issue.to_string(), 1),
        }
    }
}

fn log_plan(plan: &MappingPlan<'_>) {
    for target in plan.unmapped_targets() {
        log_warning_indent(format!("'{}' has no source column and will be empty", target), 1);
    }
    for (source, target) in plan.unresolved_sources() {
        log_warning_indent(
            format!("'{}' (for '{}') is not in the CSV header; '{}' will be empty", source, target, target),
            1,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CsvError, PipelineError, SchemaError};
    use crate::models::ColumnSchema;
    use std::fs;

    fn users_pair() -> SchemaPair {
        SchemaPair {
            source: Schema::new(vec![
                ColumnSchema::new("username").with_target("name"),
                ColumnSchema::new("active")
                    .with_target("is_active")
                    .with_values(["Y", "N"])
                    .with_mapping([("Y", "true"), ("N", "false")]),
            ]),
            target: Schema::new(vec![
                ColumnSchema::new("name"),
                ColumnSchema::new("is_active").with_values(["true", "false"]),
                ColumnSchema::new("age"),
            ]),
        }
    }

    const DATA: &str = "username;active\nann;Y\nbob; N \ncid;\n";

    fn setup() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("users.csv");
        fs::write(&data, DATA).unwrap();
        (dir, data)
    }

    #[test]
    fn test_convert_file_with_schema_files() {
        let (dir, data) = setup();
        let pair = users_pair();
        let source = dir.path().join("source.json");
        let target = dir.path().join("target.json");
        pair.source.save(&source).unwrap();
        pair.target.save(&target).unwrap();

        let request = ConvertRequest::new(&data, SchemaSource::Files { source, target })
            .with_output_dir(dir.path().join("out"));
        let summary = convert_file(&request).unwrap();

        assert_eq!(summary.output_path, dir.path().join("out/converted_users.csv"));
        assert_eq!(summary.rows_converted, 3);
        assert_eq!(summary.column_count, 3);
        assert_eq!(summary.unmapped_targets, vec!["age"]);
        assert_eq!(
            fs::read_to_string(&summary.output_path).unwrap(),
            "name,is_active,age\nann,true,\nbob,false,\ncid,,\n"
        );
    }

    #[test]
    fn test_convert_file_with_stored_pair() {
        let (dir, data) = setup();
        let request = ConvertRequest::new(&data, SchemaSource::Stored("users".into()))
            .with_output_dir(dir.path())
            .with_name("batch1");
        request.registry().save("users", &users_pair()).unwrap();

        let summary = convert_file(&request).unwrap();

        assert_eq!(summary.schema_name.as_deref(), Some("users"));
        assert_eq!(summary.output_path, dir.path().join("converted_batch1.csv"));
    }

    #[test]
    fn test_convert_file_auto() {
        let (dir, data) = setup();
        let request = ConvertRequest::new(&data, SchemaSource::Auto).with_output_dir(dir.path());
        request.registry().save("people", &users_pair()).unwrap();

        let summary = convert_file(&request).unwrap();

        assert_eq!(summary.schema_name.as_deref(), Some("people"));
        assert_eq!(summary.output_path, dir.path().join("converted_people.csv"));
    }

    #[test]
    fn test_auto_without_match_fails() {
        let (dir, data) = setup();
        let request = ConvertRequest::new(&data, SchemaSource::Auto).with_output_dir(dir.path());

        let err = convert_file(&request).unwrap_err();
        assert!(matches!(err, PipelineError::Registry(RegistryError::NotFound(_))));
    }

    #[test]
    fn test_failure_leaves_no_output() {
        let (dir, data) = setup();
        let source = dir.path().join("source.json");
        fs::write(&source, "{ not json").unwrap();
        let target = dir.path().join("target.json");
        users_pair().target.save(&target).unwrap();

        let out = dir.path().join("out");
        let request = ConvertRequest::new(&data, SchemaSource::Files { source, target })
            .with_output_dir(&out);

        let err = convert_file(&request).unwrap_err();
        assert!(matches!(err, PipelineError::Schema(SchemaError::Json(_))));
        assert!(!out.join("converted_users.csv").exists());
    }

    #[test]
    fn test_missing_data_file() {
        let dir = tempfile::tempdir().unwrap();
        let request = ConvertRequest::new(
            dir.path().join("absent.csv"),
            SchemaSource::Stored("users".into()),
        )
        .with_output_dir(dir.path());

        let err = convert_file(&request).unwrap_err();
        assert!(matches!(err, PipelineError::Csv(CsvError::Io { .. })));
    }

    #[test]
    fn test_convert_bytes() {
        let pair = users_pair();
        let converted = convert_bytes(b"active,email\nY,a@b.c\n", &pair.source, &pair.target).unwrap();

        assert_eq!(converted.table.rows, vec![vec!["", "true", ""]]);
        assert_eq!(converted.unresolved_sources, vec![("username".to_string(), "name".to_string())]);
        assert_eq!(converted.csv_info.delimiter, ',');
        assert_eq!(converted.to_csv_string().unwrap(), "name,is_active,age\n,true,\n");
    }

    #[test]
    fn test_convert_bytes_empty() {
        let pair = users_pair();
        let err = convert_bytes(b"", &pair.source, &pair.target).unwrap_err();
        assert!(matches!(err, PipelineError::Csv(CsvError::EmptyFile)));
    }

    #[test]
    fn test_output_name_fallbacks() {
        let request = ConvertRequest::new("in/export.csv", SchemaSource::Auto);
        assert_eq!(output_name(&request, None).unwrap(), "export");
        assert_eq!(output_name(&request, Some("users")).unwrap(), "users");
        assert_eq!(output_name(&request.clone().with_name("  "), Some("users")).unwrap(), "users");
        assert_eq!(output_name(&request.with_name("q3"), Some("users")).unwrap(), "q3");
    }

    #[test]
    fn test_output_name_stays_in_output_dir() {
        let request = ConvertRequest::new("in/export.csv", SchemaSource::Auto);

        assert_eq!(output_name(&request.clone().with_name("../x"), None).unwrap(), "x");
        assert_eq!(output_name(&request.clone().with_name("a/b"), None).unwrap(), "a-b");
        assert_eq!(output_name(&request, Some("Q3 Users")).unwrap(), "q3-users");
        assert!(matches!(
            output_name(&request.with_name("../"), None),
            Err(PipelineError::Registry(RegistryError::InvalidName(_)))
        ));
    }

    #[test]
    fn test_convert_file_name_cannot_escape() {
        let (dir, data) = setup();
        let out = dir.path().join("out");
        let request = ConvertRequest::new(&data, SchemaSource::Stored("users".into()))
            .with_output_dir(&out)
            .with_name("../escaped");
        request.registry().save("users", &users_pair()).unwrap();

        let summary = convert_file(&request).unwrap();

        assert_eq!(summary.output_path, out.join("converted_escaped.csv"));
        assert!(!dir.path().join("converted_escaped.csv").exists());
    }
}
