//! Schema generation from sample CSV files.
//!
//! The target schema is generated first because the source prompt embeds it.

use std::path::Path;

use crate::ai::{parse_schema_response, source_schema_prompt, target_schema_prompt, TextGenerator};
use crate::api::logs::{log_info, log_success};
use crate::error::{PipelineResult, SchemaError};
use crate::models::{Schema, SchemaPair};
use crate::parser::{parse_bytes_auto, read_csv_file, require_data_rows, ParseResult};

/// Describe a target sample as a schema.
pub async fn generate_target_schema(
    generator: &dyn TextGenerator,
    sample_csv: &str,
) -> PipelineResult<Schema> {
    let prompt = target_schema_prompt(sample_csv);
    tracing::debug!(%prompt, "target schema prompt");

    let response = generator.generate(&prompt).await?;
    tracing::debug!(%response, "target schema response");

    Ok(parse_schema_response(&response)?)
}

/// Describe a source sample as a schema mapping onto `target`.
pub async fn generate_source_schema(
    generator: &dyn TextGenerator,
    sample_csv: &str,
    target: &Schema,
) -> PipelineResult<Schema> {
    let target_json = target.to_json().map_err(SchemaError::from)?;
    let prompt = source_schema_prompt(sample_csv, &target_json);
    tracing::debug!(%prompt, "source schema prompt");

    let response = generator.generate(&prompt).await?;
    tracing::debug!(%response, "source schema response");

    Ok(parse_schema_response(&response)?)
}

/// Generate both schemas from two sample files.
///
/// Each sample must have a header and at least one data row.
pub async fn generate_schema_pair(
    generator: &dyn TextGenerator,
    source_sample: &Path,
    target_sample: &Path,
) -> PipelineResult<SchemaPair> {
    let source_csv = sample_text(read_csv_file(source_sample)?)?;
    let target_csv = sample_text(read_csv_file(target_sample)?)?;
    generate_from_samples(generator, &source_csv, &target_csv).await
}

/// Same as [`generate_schema_pair`] for uploaded sample bytes.
pub async fn generate_schema_pair_from_bytes(
    generator: &dyn TextGenerator,
    source_sample: &[u8],
    target_sample: &[u8],
) -> PipelineResult<SchemaPair> {
    let source_csv = sample_text(parse_bytes_auto(source_sample)?)?;
    let target_csv = sample_text(parse_bytes_auto(target_sample)?)?;
    generate_from_samples(generator, &source_csv, &target_csv).await
}

async fn generate_from_samples(
    generator: &dyn TextGenerator,
    source_csv: &str,
    target_csv: &str,
) -> PipelineResult<SchemaPair> {
    log_info("Generating target schema...");
    let target = generate_target_schema(generator, target_csv).await?;
    log_success(format!("Target schema: {} columns", target.len()));

    log_info("Generating source schema...");
    let source = generate_source_schema(generator, source_csv, &target).await?;
    log_success(format!("Source schema: {} columns", source.len()));

    Ok(SchemaPair { source, target })
}

/// Check a parsed sample and re-encode it as plain comma-separated text.
fn sample_text(parsed: ParseResult) -> PipelineResult<String> {
    require_data_rows(&parsed)?;
    Ok(parsed.to_csv_string()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AiError, AiResult, CsvError, PipelineError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers prompts from a fixed list and records what it was asked.
    struct ScriptedGenerator {
        answers: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn new(answers: &[&str]) -> Self {
            Self {
                answers: Mutex::new(answers.iter().rev().map(|s| s.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> AiResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answers
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| AiError::InvalidResponse("no more answers".into()))
        }
    }

    const TARGET_ANSWER: &str = r#"[
        {"column": "name", "values": []},
        {"column": "is_active", "values": ["true", "false"]}
    ]"#;

    const SOURCE_ANSWER: &str = r#"```json
[
  {"column": "username", "target_column": "name", "values": [], "values_mapping": null},
  {"column": "active", "target_column": "is_active", "values": ["Y", "N"],
   "values_mapping": {"Y": "true", "N": "false"}}
]
```"#;

    fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_generate_pair_target_first() {
        let dir = tempfile::tempdir().unwrap();
        let source = write(dir.path(), "source.csv", "username;active\nann;Y\nbob;N\n");
        let target = write(dir.path(), "target.csv", "name,is_active\nAnn,true\n");
        let generator = ScriptedGenerator::new(&[TARGET_ANSWER, SOURCE_ANSWER]);

        let pair = generate_schema_pair(&generator, &source, &target).await.unwrap();

        assert_eq!(pair.target.column_names(), vec!["name", "is_active"]);
        assert_eq!(pair.source.get("active").unwrap().map_value("Y"), "true");

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("name,is_active\nAnn,true"));
        // Source prompt carries the generated target schema, re-encoded with commas
        assert!(prompts[1].contains("\"is_active\""));
        assert!(prompts[1].contains("username,active\nann,Y"));
    }

    #[tokio::test]
    async fn test_sample_without_data_rows() {
        let dir = tempfile::tempdir().unwrap();
        let source = write(dir.path(), "source.csv", "a,b\n1,2\n");
        let target = write(dir.path(), "target.csv", "a,b\n");
        let generator = ScriptedGenerator::new(&[]);

        let err = generate_schema_pair(&generator, &source, &target).await.unwrap_err();

        assert!(matches!(err, PipelineError::Csv(CsvError::NoDataRows)));
        assert!(generator.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generate_pair_from_bytes() {
        let generator = ScriptedGenerator::new(&[TARGET_ANSWER, SOURCE_ANSWER]);

        let pair = generate_schema_pair_from_bytes(
            &generator,
            b"username,active\nann,Y\n",
            b"name|is_active\nAnn|true\n",
        )
        .await
        .unwrap();

        assert_eq!(pair.source.len(), 2);
        assert!(generator.prompts.lock().unwrap()[0].contains("name,is_active\nAnn,true"));
    }

    #[tokio::test]
    async fn test_unparseable_answer() {
        let generator = ScriptedGenerator::new(&["Sorry, I cannot help with that."]);

        let err = generate_target_schema(&generator, "a\n1\n").await.unwrap_err();
        assert!(matches!(err, PipelineError::Ai(AiError::InvalidResponse(_))));
    }
}
