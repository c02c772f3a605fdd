use anyhow::{Context, Result, bail};

/// Version used when no target version is given; tracks the development branch upstream
pub const DEFAULT_TARGET: &str = "master";

/// Normalizes a Kubernetes version into the git tag that publishes its OpenAPI document
///
/// `1.25` and `v1.25` become `v1.25.0`, fully qualified versions only gain the `v` prefix,
/// and the `master`/`main` branches are passed through
pub fn normalize(version: &str) -> Result<String> {
  let version = version.trim();
  if version == "master" || version == "main" {
    return Ok(version.to_owned());
  }

  let numeric = version.strip_prefix('v').unwrap_or(version);
  let parts: Vec<&str> = numeric.split('.').collect();
  if !(2..=3).contains(&parts.len()) || parts.iter().any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit())) {
    bail!("Invalid Kubernetes version '{version}', expected 'X.Y[.Z]' (optionally prefixed with 'v') or 'master'");
  }

  let patch = parts.get(2).copied().unwrap_or("0");
  Ok(format!("v{}.{}.{patch}", parts[0], parts[1]))
}

/// Given a version, parse the minor version
///
/// For example, the format Amazon EKS of v1.20.7-eks-123456 returns 20
/// Or the format of v1.22.7 returns 22
pub fn parse_minor(version: &str) -> Result<i32> {
  let parts: Vec<&str> = version.split('.').collect();
  let minor_str = parts
    .get(1)
    .context(format!("Invalid version format '{version}', expected 'X.Y[.Z]'"))?;
  let minor = minor_str.trim_end_matches('+').parse::<i32>()?;

  Ok(minor)
}

/// Version tag of the release preceding `version`, used as the removal baseline
///
/// `v1.25.3` -> `v1.24.0`
pub fn previous_minor(version: &str) -> Result<String> {
  let normalized = normalize(version)?;
  if normalized == "master" || normalized == "main" {
    bail!("Cannot derive the previous release of '{normalized}', pass an explicit previous version");
  }

  let minor = parse_minor(&normalized)?;
  if minor == 0 {
    bail!("Version '{normalized}' has no previous minor release");
  }
  let major = normalized.trim_start_matches('v').split('.').next().unwrap_or("1");

  Ok(format!("v{major}.{}.0", minor - 1))
}
