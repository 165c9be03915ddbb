//! Conversion engine.
//!
//! Applies a source schema and a target schema to raw CSV records and emits a
//! table laid out in the target vocabulary.
//!
//! ```text
//! header ──▶ header index ─┐
//! source schema ───────────┼──▶ MappingPlan ──▶ per row, per target column:
//! target schema ───────────┘        lookup cell → trim → map or pass through
//! ```
//!
//! The engine is a pure function of its three inputs. Missing mappings and
//! short rows produce empty cells; values absent from `values_mapping` pass
//! through unchanged. The only failure is input without a header row.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{ConvertError, ConvertResult};
use crate::models::{ColumnSchema, Schema};

/// Converted table: target header plus one row per input data row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Number of data rows (header excluded).
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Header first, then data rows, ready for a CSV writer.
    pub fn into_records(self) -> Vec<Vec<String>> {
        let mut records = Vec::with_capacity(self.rows.len() + 1);
        records.push(self.header);
        records.extend(self.rows);
        records
    }
}

/// How one target column is filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSource<'a> {
    /// No source entry declares this target column.
    Unmapped,
    /// A source entry maps here but its column is not in the header.
    Unresolved(&'a ColumnSchema),
    /// Read the cell at `index` and translate it through `schema`.
    Cell {
        index: usize,
        schema: &'a ColumnSchema,
    },
}

/// Per-call resolution of every target column to a source cell position.
///
/// Built once per conversion so each cell costs a vector index instead of a
/// scan of the source schema.
#[derive(Debug, Clone)]
pub struct MappingPlan<'a> {
    header: Vec<String>,
    columns: Vec<ColumnSource<'a>>,
}

impl<'a> MappingPlan<'a> {
    /// Resolve each target column against the source schema and header.
    pub fn build<S: AsRef<str>>(header: &[S], source: &'a Schema, target: &Schema) -> Self {
        // Duplicate header names: the later position overwrites the earlier one.
        let positions: HashMap<&str, usize> = header
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_ref().trim(), i))
            .collect();

        // First source entry in declared order wins for a given target.
        let mut by_target: HashMap<&str, &'a ColumnSchema> = HashMap::new();
        for entry in source {
            if let Some(target_name) = entry.mapped_target() {
                by_target.entry(target_name).or_insert(entry);
            }
        }

        let columns = target
            .iter()
            .map(|t| match by_target.get(t.column.as_str()) {
                None => ColumnSource::Unmapped,
                Some(&schema) => match positions.get(schema.column.trim()) {
                    Some(&index) => ColumnSource::Cell { index, schema },
                    None => ColumnSource::Unresolved(schema),
                },
            })
            .collect();

        Self {
            header: target.iter().map(|t| t.column.clone()).collect(),
            columns,
        }
    }

    /// Output header, in target schema order.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn columns(&self) -> &[ColumnSource<'a>] {
        &self.columns
    }

    /// Target columns that no source entry feeds.
    pub fn unmapped_targets(&self) -> Vec<&str> {
        self.header
            .iter()
            .zip(&self.columns)
            .filter(|(_, c)| matches!(c, ColumnSource::Unmapped))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// `(source column, target column)` pairs whose source column is not in the header.
    pub fn unresolved_sources(&self) -> Vec<(&str, &str)> {
        self.header
            .iter()
            .zip(&self.columns)
            .filter_map(|(name, c)| match c {
                ColumnSource::Unresolved(schema) => Some((schema.column.as_str(), name.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Convert data rows (header excluded) into a table with this plan's header.
    pub fn table<R, S>(&self, data: &[R]) -> Table
    where
        R: AsRef<[S]>,
        S: AsRef<str>,
    {
        Table {
            header: self.header.clone(),
            rows: data.iter().map(|row| self.apply(row.as_ref())).collect(),
        }
    }

    /// Convert one data row.
    pub fn apply<S: AsRef<str>>(&self, row: &[S]) -> Vec<String> {
        self.columns
            .iter()
            .map(|source| match source {
                ColumnSource::Cell { index, schema } => row
                    .get(*index)
                    .map(|raw| convert_value(raw.as_ref(), schema))
                    .unwrap_or_default(),
                ColumnSource::Unmapped | ColumnSource::Unresolved(_) => String::new(),
            })
            .collect()
    }
}

/// Trim the raw cell and translate it; blank cells stay blank.
fn convert_value(raw: &str, schema: &ColumnSchema) -> String {
    let value = raw.trim();
    if value.is_empty() {
        return String::new();
    }
    schema.map_value(value).to_string()
}

/// Convert raw records (header first) from the source to the target vocabulary.
///
/// # Errors
/// [`ConvertError::MalformedInput`] when `raw_rows` is empty. No partial
/// output is produced.
///
/// # Example
/// ```
/// use csvmigrate::{convert, ColumnSchema, Schema};
///
/// let source: Schema = vec![ColumnSchema::new("active_status")
///     .with_target("is_active")
///     .with_values(["Y", "N"])
///     .with_mapping([("Y", "true"), ("N", "false")])]
/// .into();
/// let target: Schema = vec![ColumnSchema::new("is_active")].into();
///
/// let rows = vec![vec!["active_status"], vec!["Y"], vec![" N "], vec![""]];
/// let table = convert(&rows, &source, &target).unwrap();
///
/// assert_eq!(table.header, vec!["is_active"]);
/// assert_eq!(table.rows, vec![vec!["true"], vec!["false"], vec![""]]);
/// ```
pub fn convert<R, S>(raw_rows: &[R], source: &Schema, target: &Schema) -> ConvertResult<Table>
where
    R: AsRef<[S]>,
    S: AsRef<str>,
{
    let (header, data) = raw_rows
        .split_first()
        .ok_or_else(|| ConvertError::MalformedInput("input has no header row".to_string()))?;

    Ok(MappingPlan::build(header.as_ref(), source, target).table(data))
}
