//! # xdcc-dl
//!
//! Multi-protocol download manager library with IRC/DCC transfer support.
//!
//! ## Design Philosophy
//!
//! xdcc-dl is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Pluggable** - Protocol backends and post-completion triggers are
//!   resolved through registries populated once at startup
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Sensible defaults** - The http, local and fake backends work with zero
//!   configuration
//!
//! ## Quick Start
//!
//! ```no_run
//! use xdcc_dl::{Config, DownloadManager, TransferOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = DownloadManager::new(Config::default()).await?;
//!
//!     // Subscribe to events
//!     let mut events = manager.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     // Fetch a file over HTTP and wait for the outcome
//!     let transfer = manager.transfer(
//!         "http:https://example.com/file.iso",
//!         TransferOptions::default(),
//!     )?;
//!     transfer.download().await?.wait().await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Protocol backends and their registry
pub mod backend;
/// Single-resolution completion handles
pub mod completion;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// IRC/DCC backend
pub mod irc;
/// Manager orchestration (decomposed into focused submodules)
pub mod manager;
/// Exponential backoff for the IRC connection layer
pub mod retry;
/// Source polling and extraction
pub mod source;
/// Transfer records and the lifecycle state machine
pub mod transfer;
/// Triggers: pluggable post-transition side effects
pub mod trigger;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use backend::{Backend, BackendRegistry};
pub use completion::{Completion, Resolver};
pub use config::{Config, IrcConfig, NetworkConfig, SourceConfig, TriggerConfig};
pub use error::{Error, RegistryError, Result, TransferError};
pub use manager::DownloadManager;
pub use source::Source;
pub use transfer::Transfer;
pub use trigger::{MoverTrigger, Trigger};
pub use types::{DccState, Event, State, TransferInfo, TransferOptions, TriggerBindings};

/// Helper function to run the manager with graceful signal handling.
///
/// Waits for a termination signal and then calls the manager's `shutdown()`
/// method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, falling back to Ctrl+C if
///   signal registration fails (containers, restricted environments).
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use xdcc_dl::{Config, DownloadManager, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let manager = DownloadManager::new(Config::default()).await?;
///     run_with_shutdown(manager).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(manager: DownloadManager) -> Result<()> {
    wait_for_signal().await;
    manager.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                _ = sigint.recv() => tracing::info!("received SIGINT"),
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
        }
        (Err(_), Err(_)) => {
            tracing::error!("could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C"),
        Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl+C"),
    }
}
