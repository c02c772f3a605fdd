use kubesunset::{Error, UsageRecord, UsageSource, error::Result};

/// Mock usage source returning a fixed sequence of records
#[derive(Clone, Default)]
pub struct MockSource {
  pub usages: Vec<UsageRecord>,
}

impl UsageSource for MockSource {
  async fn usages(&self) -> Result<Vec<UsageRecord>> {
    Ok(self.usages.clone())
  }
}

/// Mock that fails to enumerate usages
pub struct MockSourceError;

impl UsageSource for MockSourceError {
  async fn usages(&self) -> Result<Vec<UsageRecord>> {
    Err(Error::UsageSource {
      origin: "mock".into(),
      reason: "mock source error".into(),
    })
  }
}
