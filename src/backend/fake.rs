//! No-op test backend
//!
//! Runs a transfer through its full sink lifecycle without producing any
//! bytes, then resolves immediately. Advertises no schemes.

use super::Backend;
use crate::completion::Completion;
use crate::error::Result;
use crate::transfer::Transfer;
use async_trait::async_trait;
use std::sync::Arc;

/// Backend that opens, closes and resolves without transferring anything
#[derive(Default, Debug)]
pub struct FakeBackend;

impl FakeBackend {
    /// Create a new fake backend
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Backend for FakeBackend {
    fn schemes(&self) -> &[&str] {
        &[]
    }

    async fn begin(&self, transfer: Arc<Transfer>) -> Completion {
        let (resolver, completion) = Completion::channel();

        tokio::spawn(async move {
            tracing::debug!(locator = %transfer.locator(), "fake download");
            let result: Result<()> = async {
                transfer.open().await?;
                transfer.close().await?;
                Ok(())
            }
            .await;
            resolver.finish(result);
        });

        completion
    }
}
