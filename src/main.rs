use std::process;

use anyhow::Result;
use clap::Parser;
use kubesunset::Cli;
use tracing_log::AsTrace;

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  // stdout carries the report, logs go to stderr
  tracing_subscriber::fmt()
    .with_max_level(cli.verbose.log_level_filter().as_trace())
    .with_writer(std::io::stderr)
    .without_time()
    .with_target(false)
    .init();

  let code = kubesunset::run(&cli).await?;
  if code != 0 {
    process::exit(code);
  }

  Ok(())
}
