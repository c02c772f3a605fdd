use std::collections::HashMap;

use crate::{
  error::Result,
  registry::{ApiEntry, Gvk, Registry},
  report::{Item, Report, ReportGroup},
  source::{UsageRecord, UsageSource},
};

/// Collects usages from the source and correlates them against the registry
///
/// A failing source aborts before any correlation happens; there is no partial report
pub async fn correlate<S: UsageSource>(registry: &Registry, source: &S) -> Result<Report> {
  let usages = source.usages().await?;
  tracing::debug!("Correlating {} usages against {} known APIs", usages.len(), registry.len());

  Ok(correlate_usages(registry, usages))
}

/// Buckets every usage of a deprecated or deleted GVK into the report
///
/// Usages of unknown GVKs, or of GVKs that are neither deprecated nor deleted, are ignored.
/// Deleted takes precedence over deprecated.
pub fn correlate_usages<I>(registry: &Registry, usages: I) -> Report
where
  I: IntoIterator<Item = UsageRecord>,
{
  let mut deprecated = Collection::default();
  let mut deleted = Collection::default();

  for usage in usages {
    let Some(entry) = registry.get(&usage.gvk) else {
      continue;
    };

    if entry.deleted {
      deleted.record(entry, usage);
    } else if entry.deprecated {
      deprecated.record(entry, usage);
    }
  }

  Report {
    deprecated_apis: deprecated.groups,
    deleted_apis: deleted.groups,
  }
}

/// Groups in first-seen order, with an index to find a GVK's group again
#[derive(Default)]
struct Collection {
  groups: Vec<ReportGroup>,
  index: HashMap<Gvk, usize>,
}

impl Collection {
  fn record(&mut self, entry: &ApiEntry, usage: UsageRecord) {
    let groups = &mut self.groups;
    let position = *self.index.entry(entry.gvk.clone()).or_insert_with(|| {
      groups.push(ReportGroup::from_entry(entry));
      groups.len() - 1
    });

    if let Some(object_name) = usage.object_name {
      self.groups[position].items.push(Item {
        scope: usage.scope,
        object_name,
        namespace: usage.namespace,
      });
    }
  }
}
