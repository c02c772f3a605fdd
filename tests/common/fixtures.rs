use serde_json::{Value, json};

use kubesunset::{Gvk, Registry, UsageRecord};

use super::mock_source::MockSource;

/// Path item for a namespaced list/create endpoint tagged with its GVK
fn collection_path(group: &str, version: &str, kind: &str) -> Value {
  let gvk = json!({ "group": group, "version": version, "kind": kind });
  json!({
    "get": {
      "description": format!("list or watch objects of kind {kind}"),
      "x-kubernetes-group-version-kind": gvk,
    },
    "post": {
      "description": format!("create a {kind}"),
      "x-kubernetes-group-version-kind": gvk,
    },
  })
}

fn definition(group: &str, version: &str, kind: &str, description: &str) -> Value {
  json!({
    "description": description,
    "type": "object",
    "x-kubernetes-group-version-kind": [{ "group": group, "version": version, "kind": kind }],
  })
}

/// OpenAPI v2 document resembling a 1.21 API server
///
/// `apps/v1beta1` Deployment is marked deprecated in its description, CronJob is served
/// under `batch/v1beta1`
pub fn openapi_v1_21() -> Value {
  json!({
    "swagger": "2.0",
    "info": { "title": "Kubernetes", "version": "v1.21.0" },
    "paths": {
      "/api/v1/namespaces/{namespace}/pods": collection_path("", "v1", "Pod"),
      "/apis/apps/v1/namespaces/{namespace}/deployments": collection_path("apps", "v1", "Deployment"),
      "/apis/apps/v1beta1/namespaces/{namespace}/deployments": collection_path("apps", "v1beta1", "Deployment"),
      "/apis/batch/v1beta1/namespaces/{namespace}/cronjobs": collection_path("batch", "v1beta1", "CronJob"),
    },
    "definitions": {
      "io.k8s.api.core.v1.Pod": definition("", "v1", "Pod", "Pod is a collection of containers."),
      "io.k8s.api.apps.v1.Deployment": definition("apps", "v1", "Deployment", "Deployment enables declarative updates."),
      "io.k8s.api.apps.v1beta1.Deployment": definition(
        "apps",
        "v1beta1",
        "Deployment",
        "DEPRECATED - This group version of Deployment is deprecated by apps/v1/Deployment.",
      ),
      "io.k8s.api.batch.v1beta1.CronJob": definition("batch", "v1beta1", "CronJob", "CronJob represents a cron job."),
    },
  })
}

/// Same document one release later: CronJob moved to `batch/v1`, `batch/v1beta1` is gone
pub fn openapi_v1_25() -> Value {
  let mut document = openapi_v1_21();
  let paths = document["paths"].as_object_mut().unwrap();
  paths.remove("/apis/batch/v1beta1/namespaces/{namespace}/cronjobs");
  paths.insert(
    "/apis/batch/v1/namespaces/{namespace}/cronjobs".into(),
    collection_path("batch", "v1", "CronJob"),
  );

  let definitions = document["definitions"].as_object_mut().unwrap();
  definitions.remove("io.k8s.api.batch.v1beta1.CronJob");
  definitions.insert(
    "io.k8s.api.batch.v1.CronJob".into(),
    definition("batch", "v1", "CronJob", "CronJob represents a cron job."),
  );

  document
}

pub fn registry(document: &Value) -> Registry {
  Registry::from_document(document).unwrap()
}

/// Registry of the 1.25 document with removals computed against 1.21
pub fn registry_with_removals() -> Registry {
  let previous = registry(&openapi_v1_21());
  registry(&openapi_v1_25()).with_removed(previous.entries().cloned())
}

pub fn deployment_v1beta1() -> Gvk {
  Gvk::new("apps", "v1beta1", "Deployment")
}

pub fn cronjob_v1beta1() -> Gvk {
  Gvk::new("batch", "v1beta1", "CronJob")
}

pub fn source(usages: Vec<UsageRecord>) -> MockSource {
  MockSource { usages }
}
