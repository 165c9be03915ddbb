//! Schema Registry - Store and reuse generated schema pairs
//!
//! Pairs live on disk as `target_schema_<name>.json` and
//! `source_schema_<name>.json`, and can be matched automatically to a CSV by
//! its header.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::logs::log_warning;
use crate::error::{RegistryError, RegistryResult};
use crate::models::{Schema, SchemaPair};

const SOURCE_PREFIX: &str = "source_schema_";
const TARGET_PREFIX: &str = "target_schema_";
const EXTENSION: &str = ".json";

/// Minimum score for [`SchemaRegistry::find_compatible`]
const COMPATIBILITY_THRESHOLD: f64 = 0.5;

/// Listing entry for a stored pair
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPair {
    pub name: String,
    pub has_source: bool,
    pub has_target: bool,
    /// Most recent modification time of either file (RFC 3339)
    pub modified: Option<String>,
}

impl StoredPair {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            has_source: false,
            has_target: false,
            modified: None,
        }
    }

    /// Both halves present
    pub fn is_complete(&self) -> bool {
        self.has_source && self.has_target
    }
}

/// A stored pair that fits a given CSV header
#[derive(Debug, Clone)]
pub struct CompatiblePair {
    pub name: String,
    pub pair: SchemaPair,
    /// Fraction of source-schema columns found in the header
    pub score: f64,
}

/// Registry of schema pairs in one directory
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    registry_dir: PathBuf,
}

impl SchemaRegistry {
    /// Registry rooted at `dir`, normally [`crate::config::AppConfig::schemas_dir`]
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            registry_dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.registry_dir
    }

    pub fn source_path(&self, slug: &str) -> PathBuf {
        self.registry_dir.join(format!("{SOURCE_PREFIX}{slug}{EXTENSION}"))
    }

    pub fn target_path(&self, slug: &str) -> PathBuf {
        self.registry_dir.join(format!("{TARGET_PREFIX}{slug}{EXTENSION}"))
    }

    /// Save a pair under `name`; returns the slug actually used.
    ///
    /// A failed source write removes the target file again, so no half pair
    /// is left behind.
    pub fn save(&self, name: &str, pair: &SchemaPair) -> RegistryResult<String> {
        let slug = slugify(name)?;
        let target_path = self.target_path(&slug);
        pair.target.save(&target_path)?;
        if let Err(e) = pair.source.save(self.source_path(&slug)) {
            let _ = fs::remove_file(&target_path);
            return Err(e.into());
        }
        Ok(slug)
    }

    /// Load both halves of a pair.
    pub fn load(&self, name: &str) -> RegistryResult<SchemaPair> {
        let slug = slugify(name)?;
        let source_path = self.source_path(&slug);
        let target_path = self.target_path(&slug);

        for path in [&source_path, &target_path] {
            if !path.is_file() {
                return Err(RegistryError::NotFound(format!(
                    "{} ({} missing)",
                    slug,
                    path.display()
                )));
            }
        }

        Ok(SchemaPair {
            source: Schema::load(&source_path)?,
            target: Schema::load(&target_path)?,
        })
    }

    /// All stored pairs, sorted by name. A missing directory lists nothing.
    pub fn list(&self) -> RegistryResult<Vec<StoredPair>> {
        let entries = match fs::read_dir(&self.registry_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut pairs: BTreeMap<String, StoredPair> = BTreeMap::new();
        for entry in entries.flatten() {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(stem) = file_name.strip_suffix(EXTENSION) else {
                continue;
            };

            let (name, is_source) = if let Some(name) = stem.strip_prefix(SOURCE_PREFIX) {
                (name, true)
            } else if let Some(name) = stem.strip_prefix(TARGET_PREFIX) {
                (name, false)
            } else {
                continue;
            };
            if name.is_empty() {
                continue;
            }

            let stored = pairs
                .entry(name.to_string())
                .or_insert_with(|| StoredPair::new(name));
            if is_source {
                stored.has_source = true;
            } else {
                stored.has_target = true;
            }

            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339());
            if modified > stored.modified {
                stored.modified = modified;
            }
        }

        Ok(pairs.into_values().collect())
    }

    /// Delete both files of a pair.
    pub fn delete(&self, name: &str) -> RegistryResult<()> {
        let slug = slugify(name)?;
        let mut removed = false;

        for path in [self.source_path(&slug), self.target_path(&slug)] {
            match fs::remove_file(&path) {
                Ok(()) => removed = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        if removed {
            Ok(())
        } else {
            Err(RegistryError::NotFound(slug))
        }
    }

    /// Find stored pairs whose source schema fits the given CSV header.
    ///
    /// Returns pairs scoring above 0.5, best first.
    pub fn find_compatible<S: AsRef<str>>(&self, headers: &[S]) -> RegistryResult<Vec<CompatiblePair>> {
        let mut compatible = Vec::new();

        for stored in self.list()?.into_iter().filter(StoredPair::is_complete) {
            let pair = match self.load(&stored.name) {
                Ok(pair) => pair,
                Err(e) => {
                    log_warning(format!("Skipping schema pair '{}': {}", stored.name, e));
                    continue;
                }
            };

            let score = calculate_compatibility(&pair.source, headers);
            if score > COMPATIBILITY_THRESHOLD {
                compatible.push(CompatiblePair {
                    name: stored.name,
                    pair,
                    score,
                });
            }
        }

        compatible.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });

        Ok(compatible)
    }
}

/// Fraction of the schema's named columns present in `headers` (case-insensitive)
fn calculate_compatibility<S: AsRef<str>>(source: &Schema, headers: &[S]) -> f64 {
    let stored: Vec<String> = source
        .iter()
        .map(|c| c.column.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect();
    if stored.is_empty() {
        return 0.0;
    }

    let csv_lower: Vec<String> = headers
        .iter()
        .map(|h| h.as_ref().trim().to_lowercase())
        .collect();
    let match_count = stored.iter().filter(|col| csv_lower.contains(col)).count();

    match_count as f64 / stored.len() as f64
}

/// Lowercase, non-alphanumerics collapsed to single dashes
pub fn slugify(name: &str) -> RegistryResult<String> {
    let slug = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        Err(RegistryError::InvalidName(name.to_string()))
    } else {
        Ok(slug)
    }
}
