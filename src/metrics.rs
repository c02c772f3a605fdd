use serde::Serialize;

use crate::{report::Report, source::Scope};

/// Gauge name used when rendering data points
pub const METRIC_NAME: &str = "kubesunset_deprecated_api_usage";

/// One observability sample per offending object
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DataPoint {
  pub group: String,
  pub version: String,
  pub kind: String,
  pub scope: Scope,
  pub object_name: String,
  pub namespace: String,
  pub deprecated: bool,
  pub deleted: bool,
  pub value: f64,
}

impl DataPoint {
  fn labels(&self) -> [(&'static str, String); 8] {
    [
      ("group", self.group.to_owned()),
      ("version", self.version.to_owned()),
      ("kind", self.kind.to_owned()),
      ("scope", self.scope.to_string()),
      ("object_name", self.object_name.to_owned()),
      ("namespace", self.namespace.to_owned()),
      ("deprecated", self.deprecated.to_string()),
      ("deleted", self.deleted.to_string()),
    ]
  }
}

/// Projects every group x item pair of the report into a data point
pub fn data_points(report: &Report) -> Vec<DataPoint> {
  let deprecated = report.deprecated_apis.iter().map(|g| (g, true, false));
  let deleted = report.deleted_apis.iter().map(|g| (g, false, true));

  deprecated
    .chain(deleted)
    .flat_map(|(group, deprecated, deleted)| {
      group.items.iter().map(move |item| DataPoint {
        group: group.group.to_owned(),
        version: group.version.to_owned(),
        kind: group.kind.to_owned(),
        scope: item.scope,
        object_name: item.object_name.to_owned(),
        namespace: item.namespace.to_owned(),
        deprecated,
        deleted,
        value: 1.0,
      })
    })
    .collect()
}

/// Renders data points in the Prometheus text exposition format
pub fn render(points: &[DataPoint]) -> String {
  let mut output = format!(
    "# HELP {METRIC_NAME} Objects using Kubernetes APIs that are deprecated or removed in the target version\n"
  );
  output.push_str(&format!("# TYPE {METRIC_NAME} gauge\n"));

  for point in points {
    let labels: Vec<String> = point
      .labels()
      .iter()
      .map(|(name, value)| format!("{name}=\"{}\"", escape(value)))
      .collect();
    output.push_str(&format!("{METRIC_NAME}{{{}}} {}\n", labels.join(","), point.value));
  }

  output
}

fn escape(value: &str) -> String {
  value.replace('\\', r"\\").replace('"', "\\\"").replace('\n', r"\n")
}
