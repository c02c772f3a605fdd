use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;
use walkdir::WalkDir;

use crate::{
  error::{Error, Result},
  registry::Gvk,
  source::{UsageRecord, UsageSource},
};

/// File extensions picked up when walking a directory of manifests
const MANIFEST_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Objects declared in a manifest file, or a directory tree of manifest files
#[derive(Clone, Debug)]
pub struct ManifestSource {
  path: PathBuf,
}

impl ManifestSource {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  /// Manifest files in a stable order (walked directories are sorted by file name)
  fn files(&self) -> Result<Vec<PathBuf>> {
    let origin = self.path.display().to_string();
    let metadata = std::fs::metadata(&self.path).map_err(|e| Error::usage_source(&origin, e))?;
    if metadata.is_file() {
      return Ok(vec![self.path.to_owned()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&self.path).sort_by_file_name() {
      let entry = entry.map_err(|e| Error::usage_source(&origin, e))?;
      if entry.file_type().is_file() && has_manifest_extension(entry.path()) {
        files.push(entry.into_path());
      }
    }
    tracing::debug!("Found {} manifest files under {origin}", files.len());

    Ok(files)
  }
}

impl UsageSource for ManifestSource {
  async fn usages(&self) -> Result<Vec<UsageRecord>> {
    let mut records = Vec::new();
    for file in self.files()? {
      let origin = file.display().to_string();
      let contents = std::fs::read_to_string(&file).map_err(|e| Error::usage_source(&origin, e))?;
      records.extend(parse(&origin, &contents)?);
    }

    Ok(records)
  }
}

fn has_manifest_extension(path: &Path) -> bool {
  path
    .extension()
    .and_then(|e| e.to_str())
    .is_some_and(|e| MANIFEST_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

/// Extracts one usage per declared object from a (multi-document) YAML or JSON string
pub fn parse(origin: &str, contents: &str) -> Result<Vec<UsageRecord>> {
  let mut records = Vec::new();
  for document in serde_yaml::Deserializer::from_str(contents) {
    let value = Value::deserialize(document).map_err(|e| Error::usage_source(origin, e))?;
    collect(origin, &value, &mut records);
  }

  Ok(records)
}

fn collect(origin: &str, value: &Value, records: &mut Vec<UsageRecord>) {
  if value.is_null() {
    return;
  }

  let api_version = value.get("apiVersion").and_then(Value::as_str);
  let kind = value.get("kind").and_then(Value::as_str);
  let (Some(api_version), Some(kind)) = (api_version, kind) else {
    tracing::debug!("Skipping document without apiVersion/kind in {origin}");
    return;
  };

  // `kubectl get -o yaml` style lists wrap the actual objects
  if kind.ends_with("List") {
    if let Some(items) = value.get("items").and_then(Value::as_sequence) {
      for item in items {
        collect(origin, item, records);
      }
      return;
    }
  }

  let metadata = value.get("metadata");
  let field = |name: &str| {
    metadata
      .and_then(|m| m.get(name))
      .and_then(Value::as_str)
      .unwrap_or_default()
      .to_owned()
  };
  let mut name = field("name");
  if name.is_empty() {
    name = field("generateName");
  }

  records.push(UsageRecord::object(
    Gvk::from_api_version(api_version, kind),
    name,
    field("namespace"),
  ));
}
