mod common;

use std::path::Path;

use common::fixtures;
use kubesunset::{
  Baseline, Filtered, Registry, Report, Settings, UsageSource,
  config::{self, ResourceSelector},
  correlate, metrics, openapi,
  output::{self, Format},
  source::ManifestSource,
};

const MANIFESTS: &str = r#"
apiVersion: apps/v1beta1
kind: Deployment
metadata:
  name: web
  namespace: default
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: api
  namespace: default
---
apiVersion: batch/v1beta1
kind: CronJob
metadata:
  name: nightly
  namespace: jobs
"#;

const LEGACY: &str = r#"
apiVersion: batch/v1beta1
kind: CronJob
metadata:
  name: legacy
  namespace: jobs
"#;

/// Writes the OpenAPI fixtures and manifests the way a user would have them on disk
fn workspace(dir: &Path) {
  std::fs::write(dir.join("v1.21.json"), fixtures::openapi_v1_21().to_string()).unwrap();
  std::fs::write(dir.join("v1.25.json"), fixtures::openapi_v1_25().to_string()).unwrap();
  std::fs::create_dir(dir.join("manifests")).unwrap();
  std::fs::write(dir.join("manifests").join("app.yaml"), MANIFESTS).unwrap();
  std::fs::write(dir.join("manifests").join("legacy.yaml"), LEGACY).unwrap();
}

/// Helper: build the registry from files on disk and check the manifests directory
async fn run_check(dir: &Path, ignore: Vec<ResourceSelector>) -> Report {
  let target = std::fs::read(dir.join("v1.25.json")).unwrap();
  let previous = std::fs::read(dir.join("v1.21.json")).unwrap();

  let previous = Registry::from_slice("v1.21.json", &previous).unwrap();
  let registry = Registry::from_slice("v1.25.json", &target)
    .unwrap()
    .with_removed(previous.entries().cloned());

  let source = Filtered::new(ManifestSource::new(dir.join("manifests")), ignore);
  correlate(&registry, &source).await.unwrap()
}

/// Settings for an offline manifest check of the workspace
fn settings(dir: &Path, target: &str, baseline: Baseline) -> Settings {
  Settings {
    target_version: target.into(),
    swagger_file: Some(dir.join("v1.25.json")),
    swagger_dir: dir.join("cache"),
    force_download: false,
    baseline,
    input_file: Some(dir.join("manifests")),
    api_walk: false,
    show_description: false,
    ignore: vec![],
  }
}

fn deleted_names(report: &Report) -> Vec<&str> {
  report
    .deleted_apis
    .iter()
    .flat_map(|g| g.items.iter().map(|i| i.object_name.as_str()))
    .collect()
}

// ============================================================================
// Full check from settings
// ============================================================================

#[tokio::test]
async fn check_with_previous_swagger_file() {
  let tmp = tempfile::tempdir().unwrap();
  workspace(tmp.path());

  let settings = settings(tmp.path(), "v1.25.0", Baseline::File(tmp.path().join("v1.21.json")));
  let report = kubesunset::check(&settings, None).await.unwrap();

  assert_eq!(report.deleted_apis.len(), 1);
  assert_eq!(report.deleted_apis[0].kind, "CronJob");
  assert_eq!(deleted_names(&report), vec!["nightly", "legacy"]);
  assert_eq!(report.deprecated_apis[0].kind, "Deployment");
}

#[tokio::test]
async fn check_uses_cached_previous_minor() {
  let tmp = tempfile::tempdir().unwrap();
  workspace(tmp.path());
  let cache = tmp.path().join("cache");
  std::fs::create_dir(&cache).unwrap();
  std::fs::copy(tmp.path().join("v1.21.json"), openapi::cache_path(&cache, "v1.21.0")).unwrap();
  std::fs::copy(tmp.path().join("v1.25.json"), openapi::cache_path(&cache, "v1.22.0")).unwrap();

  let settings = Settings {
    swagger_file: None,
    ..settings(tmp.path(), "v1.22.0", Baseline::Auto)
  };
  let report = kubesunset::check(&settings, None).await.unwrap();

  assert_eq!(deleted_names(&report), vec!["nightly", "legacy"]);
}

#[tokio::test]
async fn check_branch_target_skips_removals() {
  let tmp = tempfile::tempdir().unwrap();
  workspace(tmp.path());

  let report = kubesunset::check(&settings(tmp.path(), "master", Baseline::Auto), None)
    .await
    .unwrap();

  assert!(report.deleted_apis.is_empty());
  assert_eq!(report.deprecated_apis.len(), 1);
}

#[tokio::test]
async fn check_applies_ignore_selectors() {
  let tmp = tempfile::tempdir().unwrap();
  workspace(tmp.path());

  let settings = Settings {
    ignore: vec![ResourceSelector {
      kind: Some("CronJob".into()),
      ..Default::default()
    }],
    ..settings(tmp.path(), "v1.25.0", Baseline::File(tmp.path().join("v1.21.json")))
  };
  let report = kubesunset::check(&settings, None).await.unwrap();

  assert!(report.deleted_apis.is_empty());
}

#[tokio::test]
async fn check_without_input_requires_cluster() {
  let tmp = tempfile::tempdir().unwrap();
  workspace(tmp.path());

  let settings = Settings {
    input_file: None,
    ..settings(tmp.path(), "v1.25.0", Baseline::Disabled)
  };
  assert!(kubesunset::check(&settings, None).await.is_err());
}

// ============================================================================
// Manifests against downloaded documents
// ============================================================================

#[tokio::test]
async fn manifests_report_text() {
  let tmp = tempfile::tempdir().unwrap();
  workspace(tmp.path());

  let report = run_check(tmp.path(), vec![]).await;
  let output = output::render(&report, Format::Text, false).unwrap();

  assert!(output.contains("Deleted APIs:"), "output: {output}");
  assert!(output.contains("batch/v1beta1"), "output: {output}");
  assert!(output.contains("nightly"), "output: {output}");
  assert!(output.contains("legacy"), "output: {output}");
  assert!(output.contains("apps/v1beta1"), "output: {output}");
}

#[tokio::test]
async fn manifests_report_json() {
  let tmp = tempfile::tempdir().unwrap();
  workspace(tmp.path());

  let report = run_check(tmp.path(), vec![]).await;
  let json: serde_json::Value = serde_json::from_str(&output::render(&report, Format::Json, false).unwrap()).unwrap();

  assert_eq!(json["DeletedAPIs"][0]["Kind"], "CronJob");
  assert_eq!(json["DeletedAPIs"][0]["Deleted"], true);
  assert_eq!(json["DeletedAPIs"][0]["Deprecated"], false);
  // Files are walked in name order: app.yaml before legacy.yaml
  assert_eq!(json["DeletedAPIs"][0]["Items"][0]["ObjectName"], "nightly");
  assert_eq!(json["DeletedAPIs"][0]["Items"][1]["ObjectName"], "legacy");
  assert_eq!(json["DeprecatedAPIs"][0]["Kind"], "Deployment");
  assert_eq!(json["DeprecatedAPIs"][0]["Version"], "v1beta1");
}

#[tokio::test]
async fn manifests_report_metrics() {
  let tmp = tempfile::tempdir().unwrap();
  workspace(tmp.path());

  let report = run_check(tmp.path(), vec![]).await;
  let output = output::render(&report, Format::Metrics, false).unwrap();

  assert!(output.contains(&format!("# TYPE {} gauge", metrics::METRIC_NAME)), "output: {output}");
  assert_eq!(metrics::data_points(&report).len(), 3);
  assert!(output.contains("object_name=\"legacy\""), "output: {output}");
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test]
async fn config_ignore_selectors_apply() {
  let tmp = tempfile::tempdir().unwrap();
  workspace(tmp.path());
  let config_path = tmp.path().join(".kubesunset.yaml");
  std::fs::write(&config_path, "ignore:\n  - name: legacy\n    namespace: jobs\n").unwrap();

  let config = config::load(Some(&config_path)).unwrap();
  let report = run_check(tmp.path(), config.ignore).await;

  let names: Vec<_> = report.deleted_apis[0].items.iter().map(|i| i.object_name.as_str()).collect();
  assert_eq!(names, vec!["nightly"]);
}

#[tokio::test]
async fn manifest_source_is_stable() {
  let tmp = tempfile::tempdir().unwrap();
  workspace(tmp.path());

  let source = ManifestSource::new(tmp.path().join("manifests"));
  assert_eq!(source.usages().await.unwrap(), source.usages().await.unwrap());
}

#[tokio::test]
async fn output_to_file() {
  let tmp = tempfile::tempdir().unwrap();
  workspace(tmp.path());

  let report = run_check(tmp.path(), vec![]).await;
  let path = tmp.path().join("report.yaml");
  output::output(&report, Format::Yaml, Some(&path), false).unwrap();

  let written: Report = serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
  assert_eq!(written, report);
}
