pub mod analysis;
pub mod config;
pub mod error;
pub mod metrics;
pub mod openapi;
pub mod output;
pub mod registry;
pub mod report;
pub mod source;
pub mod version;

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::Verbosity;
use indicatif::ProgressBar;

pub use analysis::{correlate, correlate_usages};
pub use error::Error;
pub use registry::{ApiEntry, Gvk, Registry, RegistryBuilder};
pub use report::{Item, Report, ReportGroup};
pub use source::{Filtered, Scope, UsageRecord, UsageSource};

use config::{Config, ResourceSelector};
use openapi::OpenApiSource;
use source::{ClusterSource, ManifestSource};

/// Exit code when deprecated APIs are in use and `--error-on-deprecated` is set
pub const EXIT_DEPRECATED: i32 = 2;

/// Exit code when removed APIs are in use and `--error-on-deleted` is set
pub const EXIT_DELETED: i32 = 3;

fn get_styles() -> clap::builder::Styles {
  let yellow = Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow));
  clap::builder::Styles::styled()
    .header(anstyle::Style::new().bold().underline().fg_color(yellow))
    .usage(anstyle::Style::new().bold().underline().fg_color(yellow))
    .literal(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Cyan))))
}

/// Find deprecated and removed Kubernetes APIs in a cluster or in manifest files
#[derive(Parser, Debug)]
#[command(author, about, version)]
#[command(styles = get_styles())]
pub struct Cli {
  /// Kubernetes version to check against (e.g. `1.25`, `v1.25.3` or `master`)
  #[arg(long)]
  pub k8s_version: Option<String>,

  /// Use a local OpenAPI document instead of downloading the one for `--k8s-version`
  #[arg(long)]
  pub swagger_file: Option<PathBuf>,

  /// Directory where downloaded OpenAPI documents are cached
  #[arg(long)]
  pub swagger_dir: Option<PathBuf>,

  /// Download OpenAPI documents even when a cached copy exists
  #[arg(long)]
  pub force_download: bool,

  /// Kubernetes version whose APIs are the baseline for removal detection
  ///
  /// Defaults to the API server version (cluster) or the release before the target (manifests)
  #[arg(long, conflicts_with = "previous_swagger_file")]
  pub previous_version: Option<String>,

  /// Local OpenAPI document used as the baseline for removal detection
  #[arg(long)]
  pub previous_swagger_file: Option<PathBuf>,

  /// Only detect deprecations, skip removal detection
  #[arg(long, conflicts_with_all = ["previous_version", "previous_swagger_file"])]
  pub no_removed: bool,

  /// Check manifest files (a file or a directory) instead of the current cluster
  #[arg(short, long)]
  pub input_file: Option<PathBuf>,

  /// Report deprecated/removed kinds served by the cluster even without objects
  #[arg(long)]
  pub api_walk: bool,

  /// Include API descriptions in text output
  #[arg(long)]
  pub show_description: bool,

  #[arg(short, long, value_enum, default_value_t)]
  pub format: output::Format,

  /// Write to file instead of stdout
  #[arg(short, long)]
  pub output: Option<PathBuf>,

  /// Exit with a non-zero code when deprecated APIs are in use
  #[arg(long)]
  pub error_on_deprecated: bool,

  /// Exit with a non-zero code when removed APIs are in use
  #[arg(long)]
  pub error_on_deleted: bool,

  /// Keep running, refreshing the output every `--scrape-interval` seconds
  #[arg(long)]
  pub monitor: bool,

  /// Seconds between two runs in monitor mode
  #[arg(long, default_value_t = 60, requires = "monitor", value_parser = clap::value_parser!(u64).range(1..))]
  pub scrape_interval: u64,

  /// Path to the kubeconfig file to use instead of the default lookup
  #[arg(long)]
  pub kubeconfig: Option<PathBuf>,

  /// Name of the kubeconfig context to use instead of the current one
  #[arg(long)]
  pub context: Option<String>,

  /// Path to a configuration file (defaults to `.kubesunset.yaml` when present)
  #[arg(short, long)]
  pub config: Option<PathBuf>,

  #[clap(flatten)]
  pub verbose: Verbosity,
}

/// Baseline used to decide which APIs were removed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Baseline {
  /// Removal detection disabled
  Disabled,
  /// Published document of a release tag
  Version(String),
  /// Local document
  File(PathBuf),
  /// API server version for clusters, the release before the target for manifests
  Auto,
}

/// Inputs of a run, resolved from the command line first and the configuration file second
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
  /// Normalized release tag of the target version
  pub target_version: String,
  pub swagger_file: Option<PathBuf>,
  pub swagger_dir: PathBuf,
  pub force_download: bool,
  pub baseline: Baseline,
  pub input_file: Option<PathBuf>,
  pub api_walk: bool,
  pub show_description: bool,
  pub ignore: Vec<ResourceSelector>,
}

impl Settings {
  pub fn resolve(cli: &Cli, config: Config) -> Result<Self> {
    let target = cli
      .k8s_version
      .clone()
      .or(config.k8s_version)
      .unwrap_or_else(|| version::DEFAULT_TARGET.to_owned());

    let baseline = if cli.no_removed {
      Baseline::Disabled
    } else if let Some(path) = &cli.previous_swagger_file {
      Baseline::File(path.to_owned())
    } else if let Some(previous) = cli.previous_version.clone().or(config.previous_version) {
      Baseline::Version(version::normalize(&previous)?)
    } else {
      Baseline::Auto
    };

    Ok(Settings {
      target_version: version::normalize(&target)?,
      swagger_file: cli.swagger_file.clone(),
      swagger_dir: cli
        .swagger_dir
        .clone()
        .or(config.swagger_dir)
        .unwrap_or_else(openapi::default_cache_dir),
      force_download: cli.force_download,
      baseline,
      input_file: cli.input_file.clone(),
      api_walk: cli.api_walk || config.api_walk,
      show_description: cli.show_description || config.show_description,
      ignore: config.ignore,
    })
  }

  fn download(&self, tag: &str) -> OpenApiSource {
    OpenApiSource::Download {
      tag: tag.to_owned(),
      cache_dir: self.swagger_dir.to_owned(),
      force: self.force_download,
    }
  }

  fn target_source(&self) -> OpenApiSource {
    match &self.swagger_file {
      Some(path) => OpenApiSource::File(path.to_owned()),
      None => self.download(&self.target_version),
    }
  }
}

/// Connects to a cluster, by default the current context of the default kubeconfig
pub async fn connect(kubeconfig: Option<&Path>, context: Option<&str>) -> Result<kube::Client> {
  let options = kube::config::KubeConfigOptions {
    context: context.map(str::to_owned),
    ..Default::default()
  };

  let config = match (kubeconfig, context) {
    (Some(path), _) => {
      let kubeconfig = kube::config::Kubeconfig::read_from(path)
        .with_context(|| format!("Failed to read kubeconfig: {}", path.display()))?;
      kube::Config::from_custom_kubeconfig(kubeconfig, &options).await
    }
    (None, Some(_)) => kube::Config::from_kubeconfig(&options).await,
    (None, None) => return default_client().await,
  };

  match config {
    Ok(config) => Ok(kube::Client::try_from(config)?),
    Err(e) => {
      anyhow::bail!(
        "Unable to load the kubeconfig context: {e}\n\n\
        Check the `--kubeconfig` path and `--context` name, or pass `--input-file` to check manifests instead."
      );
    }
  }
}

async fn default_client() -> Result<kube::Client> {
  match kube::Client::try_default().await {
    Ok(client) => Ok(client),
    Err(e) => {
      anyhow::bail!(
        "Unable to connect to cluster: {e}\n\n\
        Ensure a kubeconfig file is present and its current context points to the cluster,\n\
        or pass `--input-file` to check manifests instead."
      );
    }
  }
}

async fn load_registry(source: &OpenApiSource) -> Result<Registry> {
  let document = source.load().await?;
  let registry = Registry::from_slice(&source.origin(), &document)?;
  tracing::info!("Loaded {} APIs from {}", registry.len(), source.origin());

  Ok(registry)
}

/// Picks the document that removal detection compares the target against
async fn baseline_source(settings: &Settings, client: Option<&kube::Client>) -> Result<Option<OpenApiSource>> {
  let tag = match &settings.baseline {
    Baseline::Disabled => return Ok(None),
    Baseline::File(path) => return Ok(Some(OpenApiSource::File(path.to_owned()))),
    Baseline::Version(tag) => tag.to_owned(),
    Baseline::Auto => match client {
      Some(client) => ClusterSource::new(client.clone()).server_version().await?,
      None => match version::previous_minor(&settings.target_version) {
        Ok(tag) => tag,
        Err(e) => {
          tracing::info!("Removal detection disabled: {e}");
          return Ok(None);
        }
      },
    },
  };

  if tag == settings.target_version && settings.swagger_file.is_none() {
    tracing::info!("Baseline and target are both {tag}, no API can have been removed");
    return Ok(None);
  }

  Ok(Some(settings.download(&tag)))
}

fn spinner(message: &'static str) -> ProgressBar {
  let bar = ProgressBar::new_spinner();
  bar.enable_steady_tick(Duration::from_millis(120));
  bar.set_message(message);
  bar
}

/// Runs one complete check: builds the registry, then correlates the selected usage source
///
/// `client` is required unless `settings.input_file` is set
pub async fn check(settings: &Settings, client: Option<&kube::Client>) -> Result<Report> {
  let progress = spinner("Loading OpenAPI documents");

  let mut registry = load_registry(&settings.target_source()).await?;
  if let Some(previous) = baseline_source(settings, client).await? {
    let previous = load_registry(&previous).await?;
    registry = registry.with_removed(previous.entries().cloned());
  }

  let report = match &settings.input_file {
    Some(path) => {
      progress.set_message("Reading manifests");
      let source = Filtered::new(ManifestSource::new(path), settings.ignore.clone());
      correlate(&registry, &source).await?
    }
    None => {
      progress.set_message("Listing cluster objects");
      let client = client.context("A cluster connection is required when no input file is given")?;
      let cluster = ClusterSource::new(client.clone())
        .api_walk(settings.api_walk)
        .watch(registry.flagged());
      let source = Filtered::new(cluster, settings.ignore.clone());
      correlate(&registry, &source).await?
    }
  };
  progress.finish_and_clear();

  tracing::info!(
    "Found {} deprecated and {} deleted APIs in use",
    report.deprecated_apis.len(),
    report.deleted_apis.len()
  );

  Ok(report)
}

/// Exit code for a report given the `--error-on-*` flags; deleted takes precedence
pub fn exit_code(report: &Report, error_on_deprecated: bool, error_on_deleted: bool) -> i32 {
  if error_on_deleted && !report.deleted_apis.is_empty() {
    EXIT_DELETED
  } else if error_on_deprecated && !report.deprecated_apis.is_empty() {
    EXIT_DEPRECATED
  } else {
    0
  }
}

/// Entry point of the CLI, returns the process exit code
pub async fn run(cli: &Cli) -> Result<i32> {
  let config = config::load(cli.config.as_deref())?;
  let mut settings = Settings::resolve(cli, config)?;

  let client = match settings.input_file {
    Some(_) => None,
    None => Some(connect(cli.kubeconfig.as_deref(), cli.context.as_deref()).await?),
  };

  if !cli.monitor {
    let report = check(&settings, client.as_ref()).await?;
    output::output(&report, cli.format, cli.output.as_deref(), settings.show_description)?;
    return Ok(exit_code(&report, cli.error_on_deprecated, cli.error_on_deleted));
  }

  // Every tick builds its own registry and report; only downloads are cached
  let mut ticker = tokio::time::interval(Duration::from_secs(cli.scrape_interval));
  loop {
    ticker.tick().await;
    refresh(cli, &settings, client.as_ref()).await;
    settings.force_download = false;
  }
}

/// One monitor tick; failures are logged and the previous output is left in place
async fn refresh(cli: &Cli, settings: &Settings, client: Option<&kube::Client>) {
  let report = match check(settings, client).await {
    Ok(report) => report,
    Err(e) => {
      tracing::error!("Check failed, keeping the previous output: {e:#}");
      return;
    }
  };

  if let Err(e) = output::output(&report, cli.format, cli.output.as_deref(), settings.show_description) {
    tracing::error!("Writing the report failed, keeping the previous output: {e:#}");
  }
}
