//! Transfer record creation and the active-transfer list.

use super::{DownloadManager, Shared};
use crate::error::{Result, TransferError};
use crate::transfer::{Transfer, TransferParams};
use crate::types::{Event, TransferInfo, TransferOptions};
use crate::utils::parse_size;
use std::sync::Arc;

impl Shared {
    /// Create a transfer record from a locator spec (`<module>:<locator>`)
    ///
    /// The module tag is resolved against the registry exactly once, here; the
    /// record keeps its backend for life. A human-readable size string in the
    /// options is parsed through the size grammar.
    pub(crate) fn create_transfer(
        &self,
        spec: &str,
        options: TransferOptions,
    ) -> Result<Arc<Transfer>> {
        let (module, locator) = spec.split_once(':').ok_or_else(|| {
            TransferError::InvalidLocator {
                locator: spec.to_string(),
                reason: "missing module tag".to_string(),
            }
        })?;
        let backend = self.registry.resolve(module)?;

        let size = match &options.size {
            Some(size) => Some(parse_size(size)?),
            None => None,
        };
        let name = options
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| default_display_name(locator));
        let directory = options
            .directory
            .clone()
            .unwrap_or_else(|| self.config.download.download_dir.clone());

        let transfer = Transfer::new(TransferParams {
            module: module.to_string(),
            locator: locator.to_string(),
            name: name.clone(),
            directory,
            size,
            temporary: options.temporary,
            bindings: options.bindings,
            backend,
            dispatcher: self.dispatcher.clone(),
            events: self.event_tx.clone(),
            active: self.active.clone(),
        });

        self.event_tx
            .send(Event::Queued {
                module: module.to_string(),
                name,
            })
            .ok();
        Ok(transfer)
    }
}

/// Percent-decoded basename of the locator's path portion
fn default_display_name(locator: &str) -> String {
    let path = locator.split(['?', '#']).next().unwrap_or(locator);
    let base = path.trim_end_matches('/').rsplit('/').next().unwrap_or(path);
    urlencoding::decode(base)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| base.to_string())
}

impl DownloadManager {
    /// Create a transfer record from a locator spec (`<module>:<locator>`)
    pub fn transfer(&self, spec: &str, options: TransferOptions) -> Result<Arc<Transfer>> {
        self.shared.create_transfer(spec, options)
    }

    /// Snapshot of every non-temporary record downloaded during this run
    ///
    /// Append-only for the process lifetime; there is no transfer-history
    /// persistence across restarts.
    pub fn active(&self) -> Vec<TransferInfo> {
        self.shared
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|transfer| transfer.info())
            .collect()
    }
}
