//! Schema model for the migration pipeline.
//!
//! A [`Schema`] is an ordered list of [`ColumnSchema`] entries describing one
//! side (source or target) of a migration. Schemas are passive values: they
//! are produced once, by generation or by hand, and then read by the
//! conversion engine without being mutated.
//!
//! # JSON Format
//!
//! ```json
//! [
//!   {
//!     "column": "active",
//!     "target_column": "is_active",
//!     "values": ["Y", "N"],
//!     "values_mapping": { "Y": "true", "N": "false" }
//!   },
//!   { "column": "username", "target_column": "name", "values": [] }
//! ]
//! ```
//!
//! Decoding is lenient for the optional fields: absent, `null` or wrongly
//! typed `target_column`, `values` and `values_mapping` decode as "no mapping".

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{SchemaError, SchemaResult};

// =============================================================================
// Column Schema
// =============================================================================

/// One column in either the source or the target vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name as it appears in the header of that side.
    #[serde(deserialize_with = "string_or_null")]
    pub column: String,

    /// Source side only: the target column this column feeds.
    #[serde(
        default,
        rename = "target_column",
        alias = "targetColumn",
        deserialize_with = "lenient_target",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_column: Option<String>,

    /// Known categorical values. Empty means the column is dynamic.
    #[serde(default, deserialize_with = "lenient_values")]
    pub values: Vec<String>,

    /// Source value to target value, including composite values like `"R+W+D"`.
    #[serde(
        default,
        rename = "values_mapping",
        alias = "valuesMapping",
        deserialize_with = "lenient_mapping",
        skip_serializing_if = "Option::is_none"
    )]
    pub values_mapping: Option<BTreeMap<String, String>>,
}

impl ColumnSchema {
    /// Create a dynamic column with no mapping.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ..Self::default()
        }
    }

    /// Set the target column this source column feeds.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        let target = target.into();
        self.target_column = if target.is_empty() { None } else { Some(target) };
        self
    }

    /// Set the known categorical values.
    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Set the value mapping.
    pub fn with_mapping<I, K, V>(mut self, mapping: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.values_mapping = Some(
            mapping
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Whether the column has a closed set of values.
    pub fn is_categorical(&self) -> bool {
        !self.values.is_empty()
    }

    /// The target column name, if this entry maps to one.
    pub fn mapped_target(&self) -> Option<&str> {
        self.target_column.as_deref().filter(|t| !t.is_empty())
    }

    /// Translate a value through `values_mapping`, passing unknown values through.
    pub fn map_value<'a>(&'a self, value: &'a str) -> &'a str {
        self.values_mapping
            .as_ref()
            .and_then(|m| m.get(value))
            .map(String::as_str)
            .unwrap_or(value)
    }
}

// =============================================================================
// Schema
// =============================================================================

/// Ordered list of column schemas for one side of a migration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    columns: Vec<ColumnSchema>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSchema>) -> Self {
        Self { columns }
    }

    /// Parse a schema from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Parse a schema from a JSON value.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    /// Serialize to pretty JSON (2-space indent).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load a schema document from disk.
    pub fn load(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_json(&content)?)
    }

    /// Write the schema document to disk, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> SchemaResult<()> {
        let path = path.as_ref();
        let io_err = |source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut json = self.to_json()?;
        json.push('\n');
        fs::write(path, json).map_err(io_err)
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColumnSchema> {
        self.columns.iter()
    }

    /// First entry with the given column name.
    pub fn get(&self, column: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.column == column)
    }

    /// Column names in declared order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.column.as_str()).collect()
    }
}

impl From<Vec<ColumnSchema>> for Schema {
    fn from(columns: Vec<ColumnSchema>) -> Self {
        Self::new(columns)
    }
}

impl FromIterator<ColumnSchema> for Schema {
    fn from_iter<I: IntoIterator<Item = ColumnSchema>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = &'a ColumnSchema;
    type IntoIter = std::slice::Iter<'a, ColumnSchema>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

/// A source schema together with the target schema it maps into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaPair {
    pub source: Schema,
    pub target: Schema,
}

// =============================================================================
// Lenient field decoding
// =============================================================================

fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        other => Err(de::Error::custom(format!(
            "expected column name string or null, found {other}"
        ))),
    }
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_target<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    })
}

fn lenient_values<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().filter_map(scalar_to_string).collect(),
        _ => Vec::new(),
    })
}

fn lenient_mapping<'de, D>(deserializer: D) -> Result<Option<BTreeMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => Some(
            map.into_iter()
                .filter_map(|(k, v)| scalar_to_string(v).map(|v| (k, v)))
                .collect(),
        ),
        _ => None,
    })
}
