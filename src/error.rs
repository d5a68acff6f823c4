//! Error types for xdcc-dl
//!
//! This module provides the error taxonomy for the library:
//! - Registry misuse (duplicate/unknown module tags, fatal at startup)
//! - Transfer-level failures (unsupported operations, shortfalls, transport)
//! - Configuration and I/O wrappers

use thiserror::Error;

/// Result type alias for xdcc-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xdcc-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "sources.linux.pattern")
        key: Option<String>,
    },

    /// Backend registry misuse
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Transfer-level failure
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Invalid human-readable size string
    #[error("invalid size string: {input}")]
    InvalidSize {
        /// The size string that failed to parse
        input: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Backend registry errors
///
/// Registration happens once at process startup, single-threaded; both variants
/// are programming or configuration mistakes and are fatal at startup.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A module tag was registered twice
    #[error("module {tag} is already registered")]
    DuplicateModule {
        /// The module tag that was registered twice
        tag: String,
    },

    /// No backend is registered under the requested tag
    #[error("unknown module {tag}")]
    UnknownModule {
        /// The module tag that could not be resolved
        tag: String,
    },
}

/// Transfer-level errors
///
/// These become a transfer's terminal `Error` state and are handed to the
/// caller's completion and to any error-bound triggers.
#[derive(Debug, Error)]
pub enum TransferError {
    /// `download()` was called on a record that is already active
    #[error("transfer {name} is already active")]
    AlreadyActive {
        /// Display name of the active record
        name: String,
    },

    /// `open()` was called after the record's sink was already opened or closed
    #[error("transfer {name} sink cannot be reopened")]
    SinkReopened {
        /// Display name of the record
        name: String,
    },

    /// `write()` or `close()` without an open sink
    #[error("transfer {name} has no open sink")]
    SinkClosed {
        /// Display name of the record
        name: String,
    },

    /// Operation rejected immediately (partial HTTP content, reverse DCC)
    #[error("not supported: {0}")]
    Unsupported(String),

    /// DCC byte-count shortfall at disconnection
    #[error("incomplete transfer: expected {expected} bytes, received {received} ({} short)", .expected - .received)]
    Incomplete {
        /// Expected size announced by the peer
        expected: u64,
        /// Bytes actually received before disconnection
        received: u64,
    },

    /// Connection refused/reset/aborted
    #[error("transport error: {0}")]
    Transport(String),

    /// Locator authority matches no configured IRC network
    #[error("no irc connection found for {authority}")]
    NoNetwork {
        /// The authority portion of the locator
        authority: String,
    },

    /// Locator cannot be interpreted by the backend
    #[error("invalid locator {locator}: {reason}")]
    InvalidLocator {
        /// The offending locator
        locator: String,
        /// Why it was rejected
        reason: String,
    },
}
