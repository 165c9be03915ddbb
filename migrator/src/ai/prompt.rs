//! Prompt builders for schema generation.
//!
//! Two prompts: one that describes a target CSV sample as a schema, and one
//! that maps a source CSV sample onto an already generated target schema.

/// Column classification rules shared by both prompts.
const CLASSIFICATION_RULES: &str = r#"## Column Classification

A column is CATEGORICAL (non-empty "values") when its cells come from a closed set:
- categories, types, classifications
- status or state indicators (active/inactive, pending/approved/rejected)
- boolean flags (true/false, yes/no, Y/N, 1/0)
- enumerated options (role: admin/user/guest, priority: low/medium/high)
- fixed attributes (size: S/M/L)

A column is DYNAMIC (empty "values") when its cells are open-ended:
- identifiers, codes, reference numbers
- names, titles, descriptive or free text
- measurements and amounts (price, quantity, score, age)
- dates and timestamps
- emails, URLs, phone numbers
- foreign keys (user_id, product_id)

## Relationship Columns

- Any column whose name ends with "_id" is DYNAMIC.
- Columns sharing a prefix with an "_id" column (store_id + store_name) are DYNAMIC too,
  even when they have few distinct values.
- Pairs like (X_code, X_description) are DYNAMIC.
- Names ending in _count, _total, _amount, _price, _quantity are DYNAMIC.
- Names ending in _type, _status, _level, _priority are usually CATEGORICAL.

## Composite Values

- One cell may hold several flags joined by a separator: "read,write" or "read, write".
- List every combination that occurs as its own value.
- When mapping, use the separator format of the TARGET values
  (source "trx, history" becomes target "transaction,history")."#;

/// Prompt asking for the schema of a target sample.
pub fn target_schema_prompt(csv: &str) -> String {
    format!(
        r#"You generate JSON data schemas for tabular data.

Describe EVERY column of the CSV below. The sample is complete: every categorical value
that exists appears in it.

## CSV Data

{csv}

## Output Format

Return ONLY a JSON array, one object per CSV column:

[
  {{"column": "column_name", "values": ["value1", "value2"]}}
]

{rules}

## Output Rules

1. Pure JSON: no markdown, no explanations.
2. Exactly one object per CSV column, in CSV column order.
3. Keep header names exactly as written (case-sensitive).

## Example

[
  {{"column": "id", "values": []}},
  {{"column": "name", "values": []}},
  {{"column": "role", "values": ["admin", "manager", "employee"]}},
  {{"column": "status", "values": ["active", "inactive"]}},
  {{"column": "department_id", "values": []}},
  {{"column": "department_name", "values": []}},
  {{"column": "permissions", "values": ["read", "write", "read,write"]}},
  {{"column": "created_at", "values": []}}
]"#,
        csv = csv.trim_end(),
        rules = CLASSIFICATION_RULES,
    )
}

/// Prompt asking for a source schema that maps onto `target_schema_json`.
pub fn source_schema_prompt(csv: &str, target_schema_json: &str) -> String {
    format!(
        r#"You generate JSON mapping schemas between two tabular formats.

Map the columns of the CSV below onto the TARGET SCHEMA. The sample is complete: every
categorical value that exists appears in it.

## CSV Data

{csv}

## Target Schema

{target}

## Output Format

Return ONLY a JSON array:

[
  {{
    "column": "csv_column_name",
    "target_column": "target_column_name",
    "values": ["value1", "value2"],
    "values_mapping": {{"value1": "target_value1", "value2": "target_value2"}}
  }}
]

## Column Matching

1. Match on equal or similar names (username -> name, active -> is_active),
   on meaning (location_id -> store_id) and on purpose (both IDs, both status flags).
2. Produce one object for each TARGET SCHEMA object.
3. When no CSV column fits a target, still emit it with "column": null.

{rules}

## Value Mapping

Fill "values_mapping" only when both the CSV column and the target column are categorical:
- map each CSV value to the closest target value (Y -> true, staff -> employee, trx -> transaction)
- for composite values, map each part and rejoin with the target separator

Otherwise use "values": [] and "values_mapping": null.

## Output Rules

1. Pure JSON: no markdown, no explanations.
2. Number of objects equals the number of TARGET SCHEMA objects, in TARGET SCHEMA order.
3. "target_column" uses the exact TARGET SCHEMA column name.

## Example

CSV: id, username, active, user_role, location_id
TARGET SCHEMA: id, name, is_active, role, store_id

[
  {{"column": "id", "target_column": "id", "values": [], "values_mapping": null}},
  {{"column": "username", "target_column": "name", "values": [], "values_mapping": null}},
  {{"column": "active", "target_column": "is_active", "values": ["Y", "N"],
    "values_mapping": {{"Y": "true", "N": "false"}}}},
  {{"column": "user_role", "target_column": "role", "values": ["admin", "staff"],
    "values_mapping": {{"admin": "admin", "staff": "employee"}}}},
  {{"column": "location_id", "target_column": "store_id", "values": [], "values_mapping": null}}
]"#,
        csv = csv.trim_end(),
        target = target_schema_json.trim(),
        rules = CLASSIFICATION_RULES,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_prompt_embeds_csv() {
        let prompt = target_schema_prompt("id,status\n1,active\n");

        assert!(prompt.contains("id,status\n1,active"));
        assert!(prompt.contains("CATEGORICAL"));
        assert!(prompt.contains("_id"));
        assert!(!prompt.contains("{csv}"));
    }

    #[test]
    fn test_source_prompt_embeds_target_schema() {
        let target = r#"[{"column": "is_active", "values": ["true", "false"]}]"#;
        let prompt = source_schema_prompt("active\nY\n", target);

        assert!(prompt.contains(target));
        assert!(prompt.contains("\"column\": null"));
        assert!(prompt.contains("TARGET SCHEMA order"));
    }
}
