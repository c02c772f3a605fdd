use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Where upstream publishes the aggregated OpenAPI v2 document of each release
const SWAGGER_BASE_URL: &str = "https://raw.githubusercontent.com/kubernetes/kubernetes";

/// Location of an OpenAPI document
#[derive(Clone, Debug)]
pub enum OpenApiSource {
  /// A document already on disk
  File(PathBuf),
  /// The document published for a release tag (see [`crate::version::normalize`]), cached on disk
  Download {
    tag: String,
    cache_dir: PathBuf,
    force: bool,
  },
}

impl OpenApiSource {
  /// Human readable origin, used in logs and errors
  pub fn origin(&self) -> String {
    match self {
      OpenApiSource::File(path) => path.display().to_string(),
      OpenApiSource::Download { tag, .. } => swagger_url(tag),
    }
  }

  /// Returns the raw document; parsing is left to the registry builder
  pub async fn load(&self) -> Result<Vec<u8>> {
    match self {
      OpenApiSource::File(path) => read(path),
      OpenApiSource::Download { tag, cache_dir, force } => download(tag, cache_dir, *force).await,
    }
  }
}

pub fn swagger_url(tag: &str) -> String {
  format!("{SWAGGER_BASE_URL}/{tag}/api/openapi-spec/swagger.json")
}

pub fn cache_path(cache_dir: &Path, tag: &str) -> PathBuf {
  cache_dir.join(format!("swagger-{tag}.json"))
}

/// Default cache directory when none is configured
pub fn default_cache_dir() -> PathBuf {
  std::env::temp_dir().join("kubesunset")
}

fn read(path: &Path) -> Result<Vec<u8>> {
  std::fs::read(path).map_err(|e| Error::fetch(path.display().to_string(), e))
}

async fn download(tag: &str, cache_dir: &Path, force: bool) -> Result<Vec<u8>> {
  let path = cache_path(cache_dir, tag);
  if !force && path.exists() {
    tracing::debug!("Using cached OpenAPI document {}", path.display());
    return read(&path);
  }

  let url = swagger_url(tag);
  tracing::info!("Downloading {url}");
  let response = reqwest::get(&url)
    .await
    .and_then(|r| r.error_for_status())
    .map_err(|e| Error::fetch(&url, e))?;
  let body = response.bytes().await.map_err(|e| Error::fetch(&url, e))?;

  // Write next to the final path first so an interrupted download never poisons the cache
  let origin = path.display().to_string();
  let partial = path.with_extension("json.partial");
  std::fs::create_dir_all(cache_dir).map_err(|e| Error::fetch(&origin, e))?;
  std::fs::write(&partial, &body).map_err(|e| Error::fetch(&origin, e))?;
  std::fs::rename(&partial, &path).map_err(|e| Error::fetch(&origin, e))?;

  Ok(body.to_vec())
}
