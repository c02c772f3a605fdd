use std::collections::BTreeSet;

use futures::future::try_join_all;
use kube::{
  Client, ResourceExt,
  api::{Api, DynamicObject, ListParams},
  discovery::{self, ApiResource, Discovery, verbs},
};

use crate::{
  error::{Error, Result},
  registry::Gvk,
  source::{Scope, UsageRecord, UsageSource},
};

/// Objects currently stored in a live cluster
///
/// Every served version of every API group is discovered, so an object is reported once
/// per flagged version it can be read through
#[derive(Clone)]
pub struct ClusterSource {
  client: Client,
  api_walk: bool,
  watchlist: Option<BTreeSet<Gvk>>,
}

impl ClusterSource {
  pub fn new(client: Client) -> Self {
    Self {
      client,
      api_walk: false,
      watchlist: None,
    }
  }

  /// Also emit a usage for served kinds that have no objects
  pub fn api_walk(mut self, enabled: bool) -> Self {
    self.api_walk = enabled;
    self
  }

  /// Only list objects of these GVKs instead of every served kind
  pub fn watch(mut self, gvks: BTreeSet<Gvk>) -> Self {
    self.watchlist = Some(gvks);
    self
  }

  /// Kubernetes version of the API server as a release tag (`v1.27.0`)
  pub async fn server_version(&self) -> Result<String> {
    let info = self
      .client
      .apiserver_version()
      .await
      .map_err(|e| Error::usage_source("API server version", e))?;

    Ok(format!("v{}.{}.0", info.major, info.minor.trim_end_matches('+')))
  }

  async fn list(&self, target: &Served<ApiResource>) -> Result<Vec<UsageRecord>> {
    let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &target.resource);
    let objects = api
      .list(&ListParams::default())
      .await
      .map_err(|e| Error::usage_source(format!("listing {}", target.gvk), e))?;
    tracing::debug!("Found {} objects of {}", objects.items.len(), target.gvk);

    let objects = objects
      .items
      .iter()
      .map(|obj| (obj.name_any(), obj.namespace().unwrap_or_default()));

    Ok(records(&target.gvk, target.scope, objects, self.api_walk))
  }
}

impl UsageSource for ClusterSource {
  async fn usages(&self) -> Result<Vec<UsageRecord>> {
    let discovery = Discovery::new(self.client.clone())
      .run()
      .await
      .map_err(|e| Error::usage_source("API discovery", e))?;

    let mut served = Vec::new();
    for group in discovery.groups() {
      for version in group.versions() {
        for (resource, capabilities) in group.versioned_resources(version) {
          served.push(Served {
            gvk: Gvk::new(&resource.group, &resource.version, &resource.kind),
            scope: match capabilities.scope {
              discovery::Scope::Cluster => Scope::Cluster,
              discovery::Scope::Namespaced => Scope::Namespaced,
            },
            listable: capabilities.supports_operation(verbs::LIST),
            resource,
          });
        }
      }
    }

    let targets = select(served, self.watchlist.as_ref());
    tracing::info!("Listing objects for {} API kinds", targets.len());

    let lists = try_join_all(targets.iter().map(|target| self.list(target))).await?;

    Ok(lists.into_iter().flatten().collect())
  }
}

/// A kind served by the API server, as reported by discovery
#[derive(Clone, Debug, PartialEq)]
struct Served<R> {
  gvk: Gvk,
  scope: Scope,
  listable: bool,
  resource: R,
}

/// Kinds to list: watched (all when there is no watchlist) and listable, sorted by GVK
///
/// Discovery order depends on the API server
fn select<R>(served: Vec<Served<R>>, watchlist: Option<&BTreeSet<Gvk>>) -> Vec<Served<R>> {
  let mut targets: Vec<Served<R>> = served
    .into_iter()
    .filter(|s| watchlist.is_none_or(|w| w.contains(&s.gvk)))
    .filter(|s| {
      if !s.listable {
        tracing::warn!("Skipping {}, the API server does not allow listing it", s.gvk);
      }
      s.listable
    })
    .collect();
  targets.sort_by(|a, b| a.gvk.cmp(&b.gvk));

  targets
}

/// One record per `(name, namespace)`, or a single API walk record for a kind without objects
fn records<I>(gvk: &Gvk, scope: Scope, objects: I, api_walk: bool) -> Vec<UsageRecord>
where
  I: IntoIterator<Item = (String, String)>,
{
  let mut records: Vec<UsageRecord> = objects
    .into_iter()
    .map(|(name, namespace)| UsageRecord::new(gvk.clone(), scope, name, namespace))
    .collect();

  if records.is_empty() && api_walk {
    records.push(UsageRecord::api(gvk.clone(), scope));
  }

  records
}
