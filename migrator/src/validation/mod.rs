//! Schema document validation and source/target linting.
//!
//! Two independent checks:
//!
//! - [`validate_schema_document`] checks the raw JSON shape of a schema file
//!   against an embedded JSON Schema (Draft 7).
//! - [`lint`] looks at a decoded source/target pair for mistakes that would
//!   silently produce empty or unmapped output columns.
//!
//! Neither check blocks conversion; callers report the findings.
//!
//! # Example
//!
//! ```rust,ignore
//! use csvmigrate::validation::{lint, Severity};
//!
//! for issue in lint(&source, &target) {
//!     if issue.severity == Severity::Warning {
//!         eprintln!("{issue}");
//!     }
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{json, Value};

use crate::models::Schema;

/// Shape of a schema document: an array of column objects.
static SCHEMA_DOCUMENT: Lazy<Value> = Lazy::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "Column schema document",
        "type": "array",
        "items": {
            "type": "object",
            "required": ["column"],
            "properties": {
                "column": { "type": ["string", "null"] },
                "target_column": { "type": ["string", "null"] },
                "targetColumn": { "type": ["string", "null"] },
                "values": {
                    "type": ["array", "null"],
                    "items": { "type": ["string", "number", "boolean"] }
                },
                "values_mapping": {
                    "type": ["object", "null"],
                    "additionalProperties": { "type": ["string", "number", "boolean", "null"] }
                },
                "valuesMapping": {
                    "type": ["object", "null"],
                    "additionalProperties": { "type": ["string", "number", "boolean", "null"] }
                }
            }
        }
    })
});

/// Validate a JSON value against a JSON Schema (Draft 7).
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with every violation otherwise
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator =
        jsonschema::draft7::new(schema).map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check the shape of a schema document before decoding it.
pub fn validate_schema_document(document: &Value) -> Result<(), Vec<String>> {
    validate(&SCHEMA_DOCUMENT, document)
}

// =============================================================================
// Linting
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Output will likely be wrong
    Warning,
    /// Worth knowing, output is still as the schemas say
    Info,
}

/// Which schema an issue was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Source,
    Target,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaIssue {
    pub severity: Severity,
    pub side: Side,
    pub column: String,
    pub message: String,
}

impl SchemaIssue {
    fn warning(side: Side, column: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            side,
            column: column.to_string(),
            message: message.into(),
        }
    }

    fn info(side: Side, column: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            side,
            column: column.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.side {
            Side::Source => "source",
            Side::Target => "target",
        };
        write!(f, "[{}] '{}': {}", side, self.column, self.message)
    }
}

/// Find likely mistakes in a source/target schema pair.
///
/// Issues come out grouped by check, in schema order within each check.
pub fn lint(source: &Schema, target: &Schema) -> Vec<SchemaIssue> {
    let mut issues = Vec::new();

    issues.extend(duplicate_columns(source, Side::Source));
    issues.extend(duplicate_columns(target, Side::Target));

    // Target names are matched exactly, as the engine does
    let target_names: HashSet<&str> = target.iter().map(|c| c.column.as_str()).collect();
    let mut fed: HashMap<&str, &str> = HashMap::new();

    for entry in source {
        let Some(target_column) = entry.mapped_target() else {
            continue;
        };

        if !target_names.contains(target_column) {
            issues.push(SchemaIssue::warning(
                Side::Source,
                &entry.column,
                format!("targets unknown column '{}'", target_column),
            ));
            continue;
        }

        if let Some(first) = fed.get(target_column) {
            issues.push(SchemaIssue::warning(
                Side::Source,
                &entry.column,
                format!(
                    "'{}' is already fed by '{}'; this entry is ignored",
                    target_column, first
                ),
            ));
        } else {
            fed.insert(target_column, entry.column.as_str());
        }
    }

    for column in target {
        let name = column.column.as_str();
        if !name.trim().is_empty() && !fed.contains_key(name) {
            issues.push(SchemaIssue::info(
                Side::Target,
                name,
                "no source column feeds it; output will be empty",
            ));
        }
    }

    for entry in source {
        let Some(mapping) = entry.values_mapping.as_ref().filter(|m| !m.is_empty()) else {
            continue;
        };

        if !entry.is_categorical() {
            issues.push(SchemaIssue::warning(
                Side::Source,
                &entry.column,
                "has a values mapping but no values (dynamic column)",
            ));
            continue;
        }

        let known: HashSet<&str> = entry.values.iter().map(String::as_str).collect();
        for key in mapping.keys().filter(|k| !known.contains(k.as_str())) {
            issues.push(SchemaIssue::info(
                Side::Source,
                &entry.column,
                format!("mapping key '{}' is not among its values", key),
            ));
        }
    }

    issues
}

fn duplicate_columns(schema: &Schema, side: Side) -> Vec<SchemaIssue> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();

    schema
        .iter()
        .map(|c| c.column.trim())
        .filter(|name| !name.is_empty())
        .filter(|name| !seen.insert(*name) && reported.insert(*name))
        .map(|name| SchemaIssue::warning(side, name, "column is declared more than once"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnSchema;

    fn target() -> Schema {
        Schema::new(vec![
            ColumnSchema::new("name"),
            ColumnSchema::new("is_active").with_values(["true", "false"]),
            ColumnSchema::new("age"),
        ])
    }

    #[test]
    fn test_valid_document() {
        let doc = json!([
            {"column": "active", "target_column": "is_active", "values": ["Y", "N"],
             "values_mapping": {"Y": "true", "N": "false"}},
            {"column": null, "target_column": "age", "values": [], "values_mapping": null}
        ]);
        assert!(validate_schema_document(&doc).is_ok());
    }

    #[test]
    fn test_invalid_document() {
        let doc = json!({"column": "id"});
        assert!(validate_schema_document(&doc).is_err());

        let doc = json!([{"values": ["a"]}, {"column": 3}]);
        let errors = validate_schema_document(&doc).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_scalar_mapping_values_accepted() {
        let docs = [
            json!([{"column": "flag", "values": [1, 0], "values_mapping": {"1": true, "0": false}}]),
            json!([{"column": "level", "values": ["low"], "valuesMapping": {"low": 1, "high": 2.5}}]),
            json!([{"column": "note", "target_column": null, "values": null, "values_mapping": {"x": null}}]),
        ];

        for doc in &docs {
            assert!(Schema::from_value(doc).is_ok(), "decodes: {doc}");
            assert_eq!(validate_schema_document(doc), Ok(()), "validates: {doc}");
        }
    }

    #[test]
    fn test_clean_pair_has_no_issues() {
        let source = Schema::new(vec![
            ColumnSchema::new("username").with_target("name"),
            ColumnSchema::new("active")
                .with_target("is_active")
                .with_values(["Y", "N"])
                .with_mapping([("Y", "true"), ("N", "false")]),
            ColumnSchema::new("years").with_target("age"),
        ]);
        assert!(lint(&source, &target()).is_empty());
    }

    #[test]
    fn test_reports_each_problem() {
        let source = Schema::new(vec![
            ColumnSchema::new("username").with_target("name"),
            ColumnSchema::new("login").with_target("name"),
            ColumnSchema::new("active")
                .with_target("is_active")
                .with_values(["Y"])
                .with_mapping([("Y", "true"), ("N", "false")]),
            ColumnSchema::new("code").with_target("zip"),
            ColumnSchema::new("code").with_mapping([("a", "b")]),
        ]);

        let issues = lint(&source, &target());
        let messages: Vec<String> = issues.iter().map(|i| i.to_string()).collect();

        assert_eq!(issues.len(), 6, "{messages:#?}");
        assert_eq!(messages[0], "[source] 'code': column is declared more than once");
        assert!(messages[1].contains("'login'") && messages[1].contains("already fed by 'username'"));
        assert!(messages[2].contains("unknown column 'zip'"));
        assert_eq!(issues[3].severity, Severity::Info);
        assert_eq!(issues[3].column, "age");
        assert!(messages[4].contains("mapping key 'N'"));
        assert!(messages[5].contains("dynamic column"));
    }

    #[test]
    fn test_mapping_on_dynamic_column() {
        let source = Schema::new(vec![ColumnSchema::new("email")
            .with_target("name")
            .with_mapping([("x", "y")])]);

        let issues = lint(&source, &target());
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Warning && i.message.contains("dynamic")));
    }
}
