//! Core types for xdcc-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Lifecycle state of a transfer record
///
/// The intended sequence is `Waiting → Requested → Downloading → {Finished | Error}`.
/// `Waiting` is the construction default; `Requested` is entered when `download()`
/// is called, before the backend has produced any bytes; `Downloading` is entered
/// when the sink is opened; `Finished` and `Error` are terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// Constructed, not yet requested
    #[default]
    Waiting,
    /// `download()` called, backend not yet producing bytes
    Requested,
    /// Sink opened, bytes may be flowing
    Downloading,
    /// Terminal success
    Finished,
    /// Terminal failure
    Error,
}

impl State {
    /// Uppercase wire name, as shown to callers (`"WAITING"`, `"REQUESTED"`, …)
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Waiting => "WAITING",
            State::Requested => "REQUESTED",
            State::Downloading => "DOWNLOADING",
            State::Finished => "FINISHED",
            State::Error => "ERROR",
        }
    }

    /// Lifecycle event name for this state, used for trigger lookup and logging
    ///
    /// Transitions log an event named `on_<lowercased state name>`; triggers are
    /// bound to these names.
    pub fn event_name(&self) -> &'static str {
        match self {
            State::Waiting => "on_waiting",
            State::Requested => "on_requested",
            State::Downloading => "on_downloading",
            State::Finished => "on_finished",
            State::Error => "on_error",
        }
    }

    /// True iff the state is `Requested` or `Downloading`
    ///
    /// Used to prevent re-entrant refresh/download calls.
    pub fn is_active(&self) -> bool {
        matches!(self, State::Requested | State::Downloading)
    }

    /// True iff the state is terminal (`Finished` or `Error`)
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Finished | State::Error)
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport-layer state of a DCC session
///
/// Mirrors [`State`] but is scoped to the raw DCC connection:
/// `Waiting → Connecting → Connected → Downloading → {Finished | Error}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DccState {
    /// Request sent, awaiting a DCC SEND offer
    Waiting,
    /// Offer matched, opening the raw connection
    Connecting,
    /// Raw connection established
    Connected,
    /// Bytes flowing into the transfer's sink
    Downloading,
    /// Terminal success
    Finished,
    /// Terminal failure
    Error,
}

/// Mapping from lifecycle-event name to an ordered list of trigger names
///
/// Bindings travel with a transfer record; the dispatcher resolves each name
/// against the configured trigger set on every transition. An event with no
/// binding is a no-op.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerBindings(HashMap<String, Vec<String>>);

impl TriggerBindings {
    /// Create an empty binding set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a trigger name to an event's ordered list
    pub fn bind(&mut self, event: impl Into<String>, trigger: impl Into<String>) {
        self.0.entry(event.into()).or_default().push(trigger.into());
    }

    /// Trigger names bound to the given event name, in configured order
    pub fn for_event(&self, event: &str) -> &[String] {
        self.0.get(event).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True iff no event has any binding
    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }
}

/// Options for creating a transfer record
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransferOptions {
    /// Display name; derived from the locator's basename when absent
    #[serde(default)]
    pub name: Option<String>,

    /// Expected size as a human-readable string (size grammar, e.g. `"1.5gio"`)
    #[serde(default)]
    pub size: Option<String>,

    /// Destination directory; defaults to the configured download directory
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Write to an anonymous scratch file instead of a named destination
    #[serde(default)]
    pub temporary: bool,

    /// Trigger bindings attached to the record
    #[serde(default)]
    pub bindings: TriggerBindings,
}

/// Introspection snapshot of a transfer record
#[derive(Clone, Debug, Serialize)]
pub struct TransferInfo {
    /// Module tag the record was created under
    pub module: String,

    /// Protocol-specific address
    pub locator: String,

    /// Display name
    pub name: String,

    /// Resolved destination path (None until the sink has been opened)
    pub filename: Option<PathBuf>,

    /// Current lifecycle state
    pub state: State,

    /// Bytes received so far
    pub received: u64,

    /// Expected size, when known
    pub size: Option<u64>,

    /// Progress percentage (0.0 to 100.0; 0.0 when the size is unknown)
    pub progress: f32,

    /// When `download()` was called (None if never requested)
    pub started_at: Option<DateTime<Utc>>,

    /// When the record reached a terminal state
    pub finished_at: Option<DateTime<Utc>>,

    /// Terminal success flag
    pub good: bool,

    /// Last error message, for records that reached `Error`
    pub error: Option<String>,
}

/// Event emitted on the manager's broadcast channel
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A transfer record was created
    Queued {
        /// Module tag
        module: String,
        /// Display name
        name: String,
    },

    /// A transfer record changed lifecycle state
    StateChanged {
        /// Display name
        name: String,
        /// New state
        state: State,
    },

    /// A transfer reached `Finished`
    Finished {
        /// Display name
        name: String,
        /// Final destination path (None for temporary records)
        path: Option<PathBuf>,
    },

    /// A transfer reached `Error`
    Failed {
        /// Display name
        name: String,
        /// Error message
        error: String,
    },

    /// A trigger handler returned an error (isolated, never fails the transfer)
    TriggerFailed {
        /// Trigger name
        trigger: String,
        /// Display name of the transfer it was handling
        name: String,
        /// Error message
        error: String,
    },

    /// A source refresh completed and replaced the source's record set
    SourceRefreshed {
        /// Source name
        source: String,
        /// Number of records in the new set
        count: usize,
    },

    /// A source refresh failed; the previous record set was kept
    SourceRefreshFailed {
        /// Source name
        source: String,
        /// Error message
        error: String,
    },

    /// An IRC network finished registration
    IrcConnected {
        /// Network name
        network: String,
        /// Nickname in effect after collision handling
        nickname: String,
    },

    /// An IRC network connection was lost (reconnect follows automatically)
    IrcDisconnected {
        /// Network name
        network: String,
    },

    /// Graceful shutdown initiated
    Shutdown,
}
