//! Source bookkeeping and manual refresh.

use super::DownloadManager;
use crate::error::{Error, Result};
use crate::source::Source;
use std::sync::Arc;

impl DownloadManager {
    /// Look up a source by name
    pub fn source(&self, name: &str) -> Option<&Arc<Source>> {
        self.sources.get(name)
    }

    /// Iterate over all configured sources
    pub fn sources(&self) -> impl Iterator<Item = (&String, &Arc<Source>)> {
        self.sources.iter()
    }

    /// Restart a source's refresh loop, unless its seed fetch is in flight
    pub async fn refresh_source(&self, name: &str) -> Result<()> {
        let source = self
            .source(name)
            .ok_or_else(|| Error::Other(format!("source {name} not found")))?;
        source.refresh_now().await;
        Ok(())
    }
}
