pub mod cluster;
pub mod manifest;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use cluster::ClusterSource;
pub use manifest::ManifestSource;

use crate::{config::ResourceSelector, error::Result, registry::Gvk};

/// Whether an object lives inside a namespace or at the cluster level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
  Cluster,
  Namespaced,
}

impl Scope {
  /// Empty namespace means cluster scoped
  pub fn from_namespace(namespace: &str) -> Self {
    if namespace.is_empty() {
      Scope::Cluster
    } else {
      Scope::Namespaced
    }
  }
}

impl fmt::Display for Scope {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match *self {
      Scope::Cluster => write!(f, "cluster"),
      Scope::Namespaced => write!(f, "namespaced"),
    }
  }
}

/// One observed usage of a GVK
///
/// `object_name` is `None` when the kind was discovered by walking the served APIs but
/// has no instance to point at
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
  pub gvk: Gvk,
  pub scope: Scope,
  pub object_name: Option<String>,
  pub namespace: String,
}

impl UsageRecord {
  pub fn new(gvk: Gvk, scope: Scope, object_name: impl Into<String>, namespace: impl Into<String>) -> Self {
    Self {
      gvk,
      scope,
      object_name: Some(object_name.into()),
      namespace: namespace.into(),
    }
  }

  /// An object instance whose scope is inferred from its namespace
  pub fn object(gvk: Gvk, object_name: impl Into<String>, namespace: impl Into<String>) -> Self {
    let namespace = namespace.into();
    let scope = Scope::from_namespace(&namespace);
    Self::new(gvk, scope, object_name, namespace)
  }

  /// A served kind without any instance
  pub fn api(gvk: Gvk, scope: Scope) -> Self {
    Self {
      gvk,
      scope,
      object_name: None,
      namespace: String::new(),
    }
  }
}

/// Anything that can enumerate the GVKs in use, with the identity of each object
///
/// The correlation step only depends on this trait, never on the concrete cluster or
/// manifest implementations
pub trait UsageSource {
  /// Returns every usage in a stable order; repeated calls against the same state must
  /// yield the same sequence
  fn usages(&self) -> impl std::future::Future<Output = Result<Vec<UsageRecord>>> + Send;
}

/// Drops usages matched by any of the configured ignore selectors
pub struct Filtered<S> {
  inner: S,
  ignore: Vec<ResourceSelector>,
}

impl<S> Filtered<S> {
  pub fn new(inner: S, ignore: Vec<ResourceSelector>) -> Self {
    Self { inner, ignore }
  }
}

impl<S: UsageSource + Sync> UsageSource for Filtered<S> {
  async fn usages(&self) -> Result<Vec<UsageRecord>> {
    let records = self.inner.usages().await?;
    let total = records.len();

    let kept: Vec<UsageRecord> = records
      .into_iter()
      .filter(|r| !self.ignore.iter().any(|s| s.matches(r)))
      .collect();
    if kept.len() < total {
      tracing::debug!("Ignored {} usages matched by selectors", total - kept.len());
    }

    Ok(kept)
  }
}
