//! Shutdown coordination.

use super::DownloadManager;
use crate::error::Result;
use crate::types::Event;

impl DownloadManager {
    /// Initiate a graceful shutdown
    ///
    /// Cancels the shared token — source timers stop and IRC network tasks
    /// send QUIT and exit. In-flight transfers reach a terminal state only
    /// through protocol-level success or failure; there is no per-transfer
    /// cancel.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("shutting down");
        self.shared.cancel.cancel();
        for source in self.sources.values() {
            source.stop().await;
        }
        self.shared.event_tx.send(Event::Shutdown).ok();
        Ok(())
    }
}
