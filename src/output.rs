use std::{
  fs::File,
  io::prelude::*,
  path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{metrics, report::Report};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum Format {
  /// JSON format used for logging or writing to a *.json file
  Json,
  /// YAML format used for writing to a *.yaml file
  Yaml,
  /// Prometheus text exposition format, one gauge sample per offending object
  Metrics,
  /// Text format used for writing to stdout
  #[default]
  Text,
}

pub fn render(report: &Report, format: Format, show_description: bool) -> Result<String> {
  let output = match format {
    Format::Json => serde_json::to_string_pretty(report)?,
    Format::Yaml => serde_yaml::to_string(report)?,
    Format::Metrics => metrics::render(&metrics::data_points(report)),
    Format::Text => report.to_stdout_table(show_description),
  };

  Ok(output)
}

pub fn output(report: &Report, format: Format, filename: Option<&Path>, show_description: bool) -> Result<()> {
  let output = render(report, format, show_description)?;

  match filename {
    Some(filename) => write_file(filename, &output)?,
    None => {
      println!("{output}");
    }
  }

  Ok(())
}

/// Writes next to `filename` and renames into place, readers never observe a partial report
fn write_file(filename: &Path, contents: &str) -> Result<()> {
  let mut partial = filename.as_os_str().to_owned();
  partial.push(".partial");
  let partial = PathBuf::from(partial);

  let mut file =
    File::create(&partial).with_context(|| format!("Failed to create output file: {}", filename.display()))?;
  file.write_all(contents.as_bytes())?;
  std::fs::rename(&partial, filename).with_context(|| format!("Failed to write output file: {}", filename.display()))?;

  Ok(())
}
