use std::{
  collections::{BTreeMap, BTreeSet, HashMap},
  fmt,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// OpenAPI vendor extension carrying the group/version/kind of a schema or operation
const GVK_EXTENSION: &str = "x-kubernetes-group-version-kind";

/// HTTP methods that may describe an operation on a path item
const OPERATIONS: [&str; 7] = ["get", "put", "post", "delete", "patch", "head", "options"];

/// A Kubernetes group/version/kind
///
/// The core API group is represented by an empty `group`
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Gvk {
  pub group: String,
  pub version: String,
  pub kind: String,
}

impl Gvk {
  pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
    Self {
      group: group.into(),
      version: version.into(),
      kind: kind.into(),
    }
  }

  /// Builds a GVK from a manifest style `apiVersion` (`apps/v1`, or `v1` for the core group)
  pub fn from_api_version(api_version: &str, kind: &str) -> Self {
    match api_version.split_once('/') {
      Some((group, version)) => Self::new(group, version, kind),
      None => Self::new("", api_version, kind),
    }
  }

  /// The `apiVersion` as written in manifests
  pub fn api_version(&self) -> String {
    if self.group.is_empty() {
      self.version.to_owned()
    } else {
      format!("{}/{}", self.group, self.version)
    }
  }
}

impl fmt::Display for Gvk {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}/{}", self.api_version(), self.kind)
  }
}

/// One resource type described by an OpenAPI document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEntry {
  pub gvk: Gvk,
  /// Description of the resource type as published in the OpenAPI document
  pub description: String,
  /// Still served by the document, but marked as deprecated
  pub deprecated: bool,
  /// Present in a previous document and absent from the current one
  pub deleted: bool,
}

impl ApiEntry {
  pub fn new(gvk: Gvk, description: impl Into<String>, deprecated: bool) -> Self {
    Self {
      gvk,
      description: description.into(),
      deprecated,
      deleted: false,
    }
  }

  /// An entry known only from a previous document
  pub fn removed(gvk: Gvk) -> Self {
    Self {
      gvk,
      description: String::new(),
      deprecated: false,
      deleted: true,
    }
  }

  /// The same resource type, no longer served by the current document
  pub fn into_removed(self) -> Self {
    Self {
      deprecated: false,
      deleted: true,
      ..self
    }
  }

  /// Whether usages of this entry belong in a report
  pub fn is_flagged(&self) -> bool {
    self.deprecated || self.deleted
  }
}

/// Decides whether a published description marks a resource type as deprecated
///
/// OpenAPI v2 has no structured deprecation flag for resource types, so the signal is
/// derived from free text. Swap the implementation here if upstream ever publishes one.
pub trait DeprecationMarker {
  fn is_deprecated(&self, description: &str) -> bool;
}

/// Case-insensitive scan for the word `deprecated`
#[derive(Clone, Copy, Debug, Default)]
pub struct DescriptionMarker;

impl DeprecationMarker for DescriptionMarker {
  fn is_deprecated(&self, description: &str) -> bool {
    description.to_lowercase().contains("deprecated")
  }
}

impl<F> DeprecationMarker for F
where
  F: Fn(&str) -> bool,
{
  fn is_deprecated(&self, description: &str) -> bool {
    self(description)
  }
}

/// Map of every resource type known to a run, keyed by GVK
///
/// Built once per invocation and never mutated afterwards; deriving a registry with
/// removal information consumes the original
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Registry {
  entries: BTreeMap<Gvk, ApiEntry>,
}

impl Registry {
  /// Parses and builds a registry using the default deprecation marker
  pub fn from_slice(origin: &str, bytes: &[u8]) -> Result<Self> {
    RegistryBuilder::new().build_from_slice(origin, bytes)
  }

  /// Builds a registry from an already parsed document using the default deprecation marker
  pub fn from_document(document: &Value) -> Result<Self> {
    RegistryBuilder::new().build(document)
  }

  pub fn get(&self, gvk: &Gvk) -> Option<&ApiEntry> {
    self.entries.get(gvk)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn keys(&self) -> impl Iterator<Item = &Gvk> {
    self.entries.keys()
  }

  pub fn entries(&self) -> impl Iterator<Item = &ApiEntry> {
    self.entries.values()
  }

  /// GVKs that are either deprecated or removed
  pub fn flagged(&self) -> BTreeSet<Gvk> {
    self
      .entries
      .values()
      .filter(|e| e.is_flagged())
      .map(|e| e.gvk.clone())
      .collect()
  }

  /// Marks every entry of a previous document that the current one no longer serves as removed
  ///
  /// Removed entries keep the description they had in the previous document. "Removed" only
  /// makes sense relative to another document, which is why this is a separate pass from
  /// [`RegistryBuilder::build`]
  pub fn with_removed<I>(mut self, previous: I) -> Self
  where
    I: IntoIterator<Item = ApiEntry>,
  {
    let mut removed = 0;
    for entry in previous {
      if !self.entries.contains_key(&entry.gvk) {
        self.entries.insert(entry.gvk.clone(), entry.into_removed());
        removed += 1;
      }
    }
    tracing::debug!("Marked {removed} APIs as removed");

    self
  }
}

/// Later entries with the same GVK replace earlier ones
impl FromIterator<ApiEntry> for Registry {
  fn from_iter<T: IntoIterator<Item = ApiEntry>>(iter: T) -> Self {
    let entries = iter.into_iter().map(|e| (e.gvk.clone(), e)).collect();
    Self { entries }
  }
}

/// Builds a [`Registry`] by walking the paths of an OpenAPI v2 or v3 document
#[derive(Clone, Debug, Default)]
pub struct RegistryBuilder<M = DescriptionMarker> {
  marker: M,
}

impl RegistryBuilder {
  pub fn new() -> Self {
    Self::default()
  }
}

impl<M: DeprecationMarker> RegistryBuilder<M> {
  /// Replaces the predicate used to recognize deprecated resource types
  pub fn with_marker<N: DeprecationMarker>(self, marker: N) -> RegistryBuilder<N> {
    RegistryBuilder { marker }
  }

  pub fn build_from_slice(&self, origin: &str, bytes: &[u8]) -> Result<Registry> {
    let document: Value = serde_json::from_slice(bytes).map_err(|source| Error::Parse {
      context: origin.to_owned(),
      source,
    })?;

    self.build(&document)
  }

  pub fn build(&self, document: &Value) -> Result<Registry> {
    let root = document
      .as_object()
      .ok_or_else(|| Error::schema("/", "expected the document to be a JSON object"))?;
    let paths = match root.get("paths") {
      Some(Value::Object(paths)) => paths,
      Some(_) => return Err(Error::schema("/paths", "expected an object")),
      None => return Err(Error::schema("/paths", "missing")),
    };
    let definitions = Definitions::index(root)?;

    let mut entries = BTreeMap::new();
    for (path, item) in paths {
      let Some(item) = item.as_object() else {
        return Err(Error::schema(format!("/paths/{path}"), "expected a path item object"));
      };

      for method in OPERATIONS {
        let Some(operation) = item.get(method) else {
          continue;
        };
        let Some(gvk) = operation_gvk(path, method, operation) else {
          continue;
        };

        let description = definitions
          .by_gvk
          .get(&gvk)
          .copied()
          .or_else(|| response_ref(operation).and_then(|r| definitions.by_name.get(ref_name(r)).copied()))
          .or_else(|| operation.get("description").and_then(Value::as_str))
          .unwrap_or_default();

        let deprecated = self.marker.is_deprecated(description);
        entries.insert(gvk.clone(), ApiEntry::new(gvk, description, deprecated));
      }
    }

    let registry = Registry { entries };
    tracing::debug!(
      "Registry built with {} APIs, {} deprecated",
      registry.len(),
      registry.entries().filter(|e| e.deprecated).count()
    );

    Ok(registry)
  }
}

/// Schema descriptions indexed for lookup while walking paths
struct Definitions<'a> {
  by_name: HashMap<&'a str, &'a str>,
  by_gvk: HashMap<Gvk, &'a str>,
}

impl<'a> Definitions<'a> {
  /// Locates `definitions` (v2) or `components.schemas` (v3)
  fn index(root: &'a Map<String, Value>) -> Result<Self> {
    let schemas = match (root.get("definitions"), root.get("components")) {
      (Some(Value::Object(defs)), _) => defs,
      (Some(_), _) => return Err(Error::schema("/definitions", "expected an object")),
      (None, Some(components)) => match components.get("schemas") {
        Some(Value::Object(schemas)) => schemas,
        Some(_) => return Err(Error::schema("/components/schemas", "expected an object")),
        None => return Err(Error::schema("/components/schemas", "missing")),
      },
      (None, None) => {
        return Err(Error::schema(
          "/definitions",
          "missing, and no `components.schemas` to fall back to",
        ));
      }
    };

    let mut by_name = HashMap::new();
    let mut by_gvk = HashMap::new();
    for (name, schema) in schemas {
      let description = schema.get("description").and_then(Value::as_str).unwrap_or_default();
      by_name.insert(name.as_str(), description);
      for gvk in extension_gvks(schema.get(GVK_EXTENSION)) {
        by_gvk.insert(gvk, description);
      }
    }

    Ok(Definitions { by_name, by_gvk })
  }
}

/// Resolves the GVK an operation acts upon
///
/// The vendor extension is authoritative. Documents without it fall back to the API group
/// segment of the path and the name of the schema returned by `get`.
fn operation_gvk(path: &str, method: &str, operation: &Value) -> Option<Gvk> {
  if let Some(gvk) = extension_gvks(operation.get(GVK_EXTENSION)).pop() {
    return Some(gvk);
  }

  if method != "get" || path.contains("/watch/") {
    return None;
  }
  let (group, version) = group_version_from_path(path)?;
  let kind = ref_name(response_ref(operation)?).rsplit('.').next()?;
  if kind.is_empty() || kind.ends_with("List") {
    return None;
  }

  Some(Gvk::new(group, version, kind))
}

/// `/api/{version}/...` for the core group, `/apis/{group}/{version}/...` otherwise
///
/// Discovery endpoints (nothing after the version) do not name a resource
fn group_version_from_path(path: &str) -> Option<(&str, &str)> {
  let mut segments = path.trim_start_matches('/').split('/');
  let (group, version) = match segments.next()? {
    "api" => ("", segments.next()?),
    "apis" => (segments.next()?, segments.next()?),
    _ => return None,
  };

  let has_resource = segments.next().is_some_and(|s| !s.is_empty());
  if version.is_empty() || !has_resource {
    return None;
  }

  Some((group, version))
}

/// `$ref` of the successful response schema (v2 `schema`, or v3 `content.*.schema`)
fn response_ref(operation: &Value) -> Option<&str> {
  let ok = operation.get("responses")?.get("200")?;
  if let Some(r) = ok.get("schema").and_then(|s| s.get("$ref")).and_then(Value::as_str) {
    return Some(r);
  }

  ok.get("content")?
    .as_object()?
    .values()
    .find_map(|media| media.get("schema")?.get("$ref")?.as_str())
}

/// `#/definitions/io.k8s.api.apps.v1.Deployment` -> `io.k8s.api.apps.v1.Deployment`
fn ref_name(reference: &str) -> &str {
  reference.rsplit('/').next().unwrap_or(reference)
}

/// The extension is a single object on operations and a list on schemas
fn extension_gvks(value: Option<&Value>) -> Vec<Gvk> {
  match value {
    Some(Value::Array(items)) => items.iter().filter_map(parse_gvk).collect(),
    Some(item @ Value::Object(_)) => parse_gvk(item).into_iter().collect(),
    _ => Vec::new(),
  }
}

fn parse_gvk(value: &Value) -> Option<Gvk> {
  let group = value.get("group").and_then(Value::as_str).unwrap_or_default();
  let version = value.get("version")?.as_str()?;
  let kind = value.get("kind")?.as_str()?;

  Some(Gvk::new(group, version, kind))
}
