use serde::{Deserialize, Serialize};
use tabled::{
  Table, Tabled,
  settings::{Margin, Remove, Style, location::ByColumnName},
};

use crate::{
  registry::{ApiEntry, Gvk},
  source::Scope,
};

/// Outcome of correlating usages against the registry
///
/// A GVK shows up in at most one of the two collections. Groups are kept in the order
/// their GVK was first encountered so repeated runs against the same state diff cleanly.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
  #[serde(rename = "DeprecatedAPIs")]
  pub deprecated_apis: Vec<ReportGroup>,
  #[serde(rename = "DeletedAPIs")]
  pub deleted_apis: Vec<ReportGroup>,
}

/// All usages of a single deprecated or deleted GVK
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReportGroup {
  pub group: String,
  pub version: String,
  pub kind: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub description: String,
  pub deprecated: bool,
  pub deleted: bool,
  pub items: Vec<Item>,
}

/// One object instance using a flagged GVK
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Item {
  pub scope: Scope,
  pub object_name: String,
  pub namespace: String,
}

impl ReportGroup {
  pub(crate) fn from_entry(entry: &ApiEntry) -> Self {
    Self {
      group: entry.gvk.group.to_owned(),
      version: entry.gvk.version.to_owned(),
      kind: entry.gvk.kind.to_owned(),
      description: entry.description.to_owned(),
      deprecated: entry.deprecated && !entry.deleted,
      deleted: entry.deleted,
      items: Vec::new(),
    }
  }

  pub fn gvk(&self) -> Gvk {
    Gvk::new(&self.group, &self.version, &self.kind)
  }
}

impl Report {
  /// Returns true if there are no findings
  pub fn is_empty(&self) -> bool {
    self.deprecated_apis.is_empty() && self.deleted_apis.is_empty()
  }

  pub fn to_stdout_table(&self, show_description: bool) -> String {
    let mut output = String::new();

    output.push_str("Deleted APIs:\n");
    output.push_str(&section(
      &self.deleted_apis,
      Severity::Deleted,
      show_description,
      "✅ - No APIs removed in the target version are in use",
    ));
    output.push_str("\nDeprecated APIs:\n");
    output.push_str(&section(
      &self.deprecated_apis,
      Severity::Deprecated,
      show_description,
      "✅ - No deprecated APIs are in use",
    ));

    output
  }
}

/// Determines how urgently usages have to be migrated
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
  /// The API is gone in the target version; manifests using it will be rejected
  Deleted,
  /// The API still works in the target version but is scheduled for removal
  Deprecated,
}

impl Severity {
  pub(crate) fn symbol(&self) -> &'static str {
    match self {
      Severity::Deleted => "❌",
      Severity::Deprecated => "⚠️",
    }
  }
}

#[derive(Debug, Tabled)]
#[tabled(rename_all = "UpperCase")]
struct Row {
  #[tabled(rename = " ")]
  symbol: &'static str,
  kind: String,
  #[tabled(rename = "API VERSION")]
  api_version: String,
  scope: String,
  name: String,
  namespace: String,
  description: String,
}

fn section(groups: &[ReportGroup], severity: Severity, show_description: bool, empty_msg: &str) -> String {
  if groups.is_empty() {
    return format!("\t{empty_msg}\n");
  }

  let mut rows = Vec::new();
  for group in groups {
    let api_version = group.gvk().api_version();
    let row = |scope: String, name: String, namespace: String| Row {
      symbol: severity.symbol(),
      kind: group.kind.to_owned(),
      api_version: api_version.to_owned(),
      scope,
      name,
      namespace,
      description: group.description.to_owned(),
    };

    if group.items.is_empty() {
      // Served kind without instances, surfaced by walking the APIs
      rows.push(row("-".into(), "-".into(), "-".into()));
    }
    for item in &group.items {
      rows.push(row(item.scope.to_string(), item.object_name.to_owned(), item.namespace.to_owned()));
    }
  }

  let mut table = Table::new(rows);
  if !show_description {
    table.with(Remove::column(ByColumnName::new("DESCRIPTION")));
  }
  table
    .with(Margin::new(1, 0, 0, 0).fill('\t', 'x', 'x', 'x'))
    .with(Style::sharp());

  format!("{table}\n")
}
