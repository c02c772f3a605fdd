use thiserror::Error;

/// Errors surfaced by the registry builder, the usage sources and OpenAPI acquisition
///
/// None of these are recovered from locally; any of them aborts the run before a
/// report is produced
#[derive(Debug, Error)]
pub enum Error {
  /// The OpenAPI document is not well-formed JSON
  #[error("Failed to parse OpenAPI document from {context}: {source}")]
  Parse {
    context: String,
    #[source]
    source: serde_json::Error,
  },

  /// The OpenAPI document is valid JSON but lacks the expected path/definition shape
  #[error("Unexpected OpenAPI document structure at `{path}`: {reason}")]
  Schema { path: String, reason: String },

  /// Enumerating usages from a cluster or manifest set failed
  #[error("Unable to collect API usages from {origin}: {reason}")]
  UsageSource { origin: String, reason: String },

  /// Acquiring the OpenAPI document failed (download or cache)
  #[error("Unable to fetch OpenAPI document from {origin}: {reason}")]
  Fetch { origin: String, reason: String },
}

impl Error {
  pub(crate) fn schema(path: impl Into<String>, reason: impl Into<String>) -> Self {
    Error::Schema {
      path: path.into(),
      reason: reason.into(),
    }
  }

  pub(crate) fn usage_source(origin: impl Into<String>, reason: impl ToString) -> Self {
    Error::UsageSource {
      origin: origin.into(),
      reason: reason.to_string(),
    }
  }

  pub(crate) fn fetch(origin: impl Into<String>, reason: impl ToString) -> Self {
    Error::Fetch {
      origin: origin.into(),
      reason: reason.to_string(),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn schema_error_names_location() {
    let err = Error::schema("/paths", "expected an object");
    assert_eq!(
      err.to_string(),
      "Unexpected OpenAPI document structure at `/paths`: expected an object"
    );
  }

  #[test]
  fn usage_source_error_names_origin() {
    let err = Error::usage_source("manifests/app.yaml", "did not find expected key");
    let msg = err.to_string();
    assert!(msg.contains("manifests/app.yaml"), "error message: {msg}");
    assert!(msg.contains("did not find expected key"), "error message: {msg}");
  }
}
