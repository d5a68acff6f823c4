//! Single-resolution completion handles for backend transfers
//!
//! A backend's `begin` hands back a [`Completion`] that resolves or rejects
//! exactly once. The producing side holds a [`Resolver`]; `resolve` and
//! `reject` consume it, so double resolution is unrepresentable. Dropping a
//! resolver without using it injects a transport error, so a transfer can
//! never hang on a lost handle.

use crate::error::{Error, Result, TransferError};
use tokio::sync::oneshot;

/// Producing side of a completion pair
///
/// Exactly one of [`resolve`](Resolver::resolve) or [`reject`](Resolver::reject)
/// may be called; both take the resolver by value.
pub struct Resolver {
    tx: Option<oneshot::Sender<Result<()>>>,
}

impl Resolver {
    /// Resolve the completion successfully
    pub fn resolve(mut self) {
        if let Some(tx) = self.tx.take() {
            // send fails only when the consumer stopped waiting
            tx.send(Ok(())).ok();
        }
    }

    /// Reject the completion with an error
    pub fn reject(mut self, error: Error) {
        if let Some(tx) = self.tx.take() {
            tx.send(Err(error)).ok();
        }
    }

    /// Resolve or reject from a `Result`
    pub fn finish(self, result: Result<()>) {
        match result {
            Ok(()) => self.resolve(),
            Err(e) => self.reject(e),
        }
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            tx.send(Err(Error::Transfer(TransferError::Transport(
                "completion resolver dropped without resolution".to_string(),
            ))))
            .ok();
        }
    }
}

/// Consuming side of a completion pair
///
/// Await [`wait`](Completion::wait) to observe the transfer's terminal outcome.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<Result<()>>,
}

impl Completion {
    /// Create a connected `(Resolver, Completion)` pair
    pub fn channel() -> (Resolver, Completion) {
        let (tx, rx) = oneshot::channel();
        (Resolver { tx: Some(tx) }, Completion { rx })
    }

    /// Wait for the single resolution
    pub async fn wait(self) -> Result<()> {
        match self.rx.await {
            Ok(result) => result,
            // unreachable in practice: the resolver's Drop sends before closing
            Err(_) => Err(Error::Transfer(TransferError::Transport(
                "completion channel closed".to_string(),
            ))),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_delivers_success() {
        let (resolver, completion) = Completion::channel();
        resolver.resolve();
        assert!(completion.wait().await.is_ok());
    }

    #[tokio::test]
    async fn reject_delivers_the_error() {
        let (resolver, completion) = Completion::channel();
        resolver.reject(Error::Transfer(TransferError::Unsupported(
            "reverse DCC".into(),
        )));
        let err = completion.wait().await.unwrap_err();
        assert!(err.to_string().contains("reverse DCC"));
    }

    #[tokio::test]
    async fn dropped_resolver_rejects_instead_of_hanging() {
        let (resolver, completion) = Completion::channel();
        drop(resolver);
        let err = completion.wait().await.unwrap_err();
        assert!(
            err.to_string().contains("dropped without resolution"),
            "got: {err}"
        );
    }

    #[tokio::test]
    async fn finish_maps_ok_and_err() {
        let (resolver, completion) = Completion::channel();
        resolver.finish(Ok(()));
        assert!(completion.wait().await.is_ok());

        let (resolver, completion) = Completion::channel();
        resolver.finish(Err(Error::Other("boom".into())));
        assert!(completion.wait().await.is_err());
    }

    #[tokio::test]
    async fn resolution_is_observed_exactly_once() {
        // The type system forbids a second resolve on the same resolver; what we
        // can check at runtime is that the consumer sees exactly one outcome.
        let (resolver, completion) = Completion::channel();
        tokio::spawn(async move {
            resolver.resolve();
        });
        assert!(completion.wait().await.is_ok());
    }
}
