//! Same-host copy backend
//!
//! Streams a local file into the transfer's sink in fixed-size chunks. The
//! expected size comes from the source file's metadata before any bytes move.

use super::Backend;
use crate::completion::Completion;
use crate::config::LocalConfig;
use crate::error::{Result, TransferError};
use crate::transfer::Transfer;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

/// Backend for `file` locators
#[derive(Debug)]
pub struct LocalBackend {
    chunk_size: usize,
}

impl LocalBackend {
    /// Build a local backend from its module configuration
    pub fn new(config: &LocalConfig) -> Self {
        Self {
            chunk_size: config.chunk_size.max(1),
        }
    }

    fn source_path(locator: &str) -> Result<PathBuf> {
        let invalid = |reason: &str| TransferError::InvalidLocator {
            locator: locator.to_string(),
            reason: reason.to_string(),
        };

        // file:///absolute/path, file:/absolute/path, or a bare path
        let path = if let Some(rest) = locator.strip_prefix("file://") {
            rest
        } else if let Some(rest) = locator.strip_prefix("file:") {
            rest
        } else {
            locator
        };
        if path.is_empty() {
            return Err(invalid("empty path").into());
        }
        Ok(PathBuf::from(path))
    }

    async fn run(chunk_size: usize, transfer: Arc<Transfer>) -> Result<()> {
        let path = Self::source_path(transfer.locator())?;
        tracing::info!(path = %path.display(), "local copy");

        let metadata = tokio::fs::metadata(&path).await?;
        transfer.set_size(metadata.len());

        let mut source = tokio::fs::File::open(&path).await?;
        transfer.open().await?;

        let mut buf = vec![0u8; chunk_size];
        loop {
            let n = source.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            transfer.write(&buf[..n]).await?;
        }
        transfer.close().await?;
        Ok(())
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn schemes(&self) -> &[&str] {
        &["file"]
    }

    async fn begin(&self, transfer: Arc<Transfer>) -> Completion {
        let (resolver, completion) = Completion::channel();
        let chunk_size = self.chunk_size;

        tokio::spawn(async move {
            let result = Self::run(chunk_size, transfer.clone()).await;
            if result.is_err() {
                transfer.close().await.ok();
            }
            resolver.finish(result);
        });

        completion
    }
}
