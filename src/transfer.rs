//! Transfer records and their lifecycle state machine
//!
//! A [`Transfer`] is the unit of work: one requested or completed download.
//! The record owns the byte accounting, the destination sink, and the
//! lifecycle state machine; protocol backends drive it through
//! `open → write* → close` and resolve its completion exactly once.

use crate::backend::Backend;
use crate::completion::{Completion, Resolver};
use crate::error::{Error, Result, TransferError};
use crate::trigger::TriggerDispatcher;
use crate::types::{Event, State, TransferInfo, TriggerBindings};
use crate::utils::sanitize_file_name;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;

/// Construction parameters for a transfer record
///
/// Built by the manager, which resolves the backend from the module tag once
/// at creation; the resolved backend never changes for the record's life.
pub(crate) struct TransferParams {
    pub module: String,
    pub locator: String,
    pub name: String,
    pub directory: PathBuf,
    pub size: Option<u64>,
    pub temporary: bool,
    pub bindings: TriggerBindings,
    pub backend: Arc<dyn Backend>,
    pub dispatcher: Arc<TriggerDispatcher>,
    pub events: broadcast::Sender<Event>,
    pub active: Arc<Mutex<Vec<Arc<Transfer>>>>,
}

/// Mutable metadata, guarded by a synchronous lock (never held across await)
struct Meta {
    name: String,
    filename: Option<PathBuf>,
    state: State,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    good: bool,
    last_error: Option<String>,
    scratch: Option<TempPath>,
    listed: bool,
}

/// Destination sink discipline: open once, write, close once, never reopen
enum SinkState {
    Unopened,
    Open(tokio::fs::File),
    Closed,
}

/// One requested or completed download
///
/// Records are created through the manager and shared as `Arc<Transfer>`.
/// Byte counts are monotonically non-decreasing; the expected size, once set,
/// is immutable for the record's life.
pub struct Transfer {
    module: String,
    locator: String,
    directory: PathBuf,
    temporary: bool,
    bindings: TriggerBindings,
    backend: Arc<dyn Backend>,
    dispatcher: Arc<TriggerDispatcher>,
    events: broadcast::Sender<Event>,
    active: Arc<Mutex<Vec<Arc<Transfer>>>>,
    size: OnceLock<u64>,
    received: AtomicU64,
    meta: Mutex<Meta>,
    sink: tokio::sync::Mutex<SinkState>,
}

impl Transfer {
    pub(crate) fn new(params: TransferParams) -> Arc<Self> {
        let TransferParams {
            module,
            locator,
            name,
            directory,
            size,
            temporary,
            bindings,
            backend,
            dispatcher,
            events,
            active,
        } = params;

        let size_cell = OnceLock::new();
        if let Some(size) = size {
            size_cell.set(size).ok();
        }

        Arc::new(Self {
            module,
            locator,
            directory,
            temporary,
            bindings,
            backend,
            dispatcher,
            events,
            active,
            size: size_cell,
            received: AtomicU64::new(0),
            meta: Mutex::new(Meta {
                name,
                filename: None,
                state: State::Waiting,
                started_at: None,
                finished_at: None,
                good: false,
                last_error: None,
                scratch: None,
                listed: false,
            }),
            sink: tokio::sync::Mutex::new(SinkState::Unopened),
        })
    }

    fn meta(&self) -> MutexGuard<'_, Meta> {
        self.meta.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Module tag the record was created under
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Protocol-specific address
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Whether the record writes to an anonymous scratch file
    pub fn temporary(&self) -> bool {
        self.temporary
    }

    /// Trigger bindings attached to the record
    pub fn bindings(&self) -> &TriggerBindings {
        &self.bindings
    }

    /// Display name
    pub fn name(&self) -> String {
        self.meta().name.clone()
    }

    /// Resolved destination path (None until the sink has been opened)
    pub fn filename(&self) -> Option<PathBuf> {
        self.meta().filename.clone()
    }

    /// Current lifecycle state
    pub fn state(&self) -> State {
        self.meta().state
    }

    /// True iff the record is `Requested` or `Downloading`
    pub fn active(&self) -> bool {
        self.state().is_active()
    }

    /// Terminal success flag
    pub fn good(&self) -> bool {
        self.meta().good
    }

    /// Bytes received so far; equals the sum of all `write()` payload lengths
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Expected size, when known
    pub fn size(&self) -> Option<u64> {
        self.size.get().copied()
    }

    /// Progress percentage (0.0 to 100.0; 0.0 when the size is unknown)
    pub fn progress(&self) -> f32 {
        match self.size() {
            Some(size) if size > 0 => (100.0 * self.received() as f64 / size as f64) as f32,
            _ => 0.0,
        }
    }

    /// Introspection snapshot
    pub fn info(&self) -> TransferInfo {
        let meta = self.meta();
        TransferInfo {
            module: self.module.clone(),
            locator: self.locator.clone(),
            name: meta.name.clone(),
            filename: meta.filename.clone(),
            state: meta.state,
            received: self.received(),
            size: self.size(),
            progress: match self.size() {
                Some(size) if size > 0 => {
                    (100.0 * self.received() as f64 / size as f64) as f32
                }
                _ => 0.0,
            },
            started_at: meta.started_at,
            finished_at: meta.finished_at,
            good: meta.good,
            error: meta.last_error.clone(),
        }
    }

    /// Record the expected size (backend-facing)
    ///
    /// The size is immutable once set: later calls are ignored with a warning.
    pub fn set_size(&self, size: u64) {
        if self.size.set(size).is_err() {
            tracing::warn!(
                transfer = %self.name(),
                size,
                "expected size already set, ignoring"
            );
        }
    }

    /// Replace the display name (backend-facing)
    ///
    /// DCC offers stamp the peer's announced file name onto the record before
    /// the sink opens.
    pub fn set_name(&self, name: impl Into<String>) {
        self.meta().name = name.into();
    }

    /// Acquire the sink and enter `Downloading` (backend-facing)
    ///
    /// Temporary records write to an anonymous scratch file; named records
    /// resolve their destination under the record's directory. A record owns
    /// exactly one sink: reopening after open or close is an error.
    pub async fn open(&self) -> Result<()> {
        let mut sink = self.sink.lock().await;
        if !matches!(*sink, SinkState::Unopened) {
            return Err(TransferError::SinkReopened { name: self.name() }.into());
        }

        let file = if self.temporary {
            let tmp = tempfile::NamedTempFile::new()?;
            let (std_file, path) = tmp.into_parts();
            self.meta().scratch = Some(path);
            tokio::fs::File::from_std(std_file)
        } else {
            let resolved = {
                let meta = self.meta();
                match &meta.filename {
                    Some(path) => path.clone(),
                    None => {
                        let file_name = sanitize_file_name(&meta.name).ok_or_else(|| {
                            Error::Other(format!(
                                "transfer {} has no usable file name",
                                self.locator
                            ))
                        })?;
                        self.directory.join(file_name)
                    }
                }
            };
            if let Some(parent) = resolved.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let file = tokio::fs::File::create(&resolved).await?;
            self.meta().filename = Some(resolved);
            file
        };

        *sink = SinkState::Open(file);
        drop(sink);

        self.set_state(State::Downloading).await;
        Ok(())
    }

    /// Forward a payload chunk to the sink (backend-facing)
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        let mut sink = self.sink.lock().await;
        match &mut *sink {
            SinkState::Open(file) => {
                file.write_all(data).await?;
                self.received.fetch_add(data.len() as u64, Ordering::Relaxed);
                Ok(())
            }
            _ => Err(TransferError::SinkClosed { name: self.name() }.into()),
        }
    }

    /// Flush and release the sink (backend-facing)
    pub async fn close(&self) -> Result<()> {
        let mut sink = self.sink.lock().await;
        match std::mem::replace(&mut *sink, SinkState::Closed) {
            SinkState::Open(mut file) => {
                file.flush().await?;
                file.sync_all().await.ok();
                Ok(())
            }
            SinkState::Unopened => {
                *sink = SinkState::Unopened;
                Err(TransferError::SinkClosed { name: self.name() }.into())
            }
            SinkState::Closed => Err(TransferError::SinkClosed { name: self.name() }.into()),
        }
    }

    /// Take ownership of a temporary record's scratch file
    ///
    /// Dropping the returned path deletes the file.
    pub(crate) fn take_scratch(&self) -> Option<TempPath> {
        self.meta().scratch.take()
    }

    /// Move the record's on-disk file into `target_dir`, keeping its name
    ///
    /// Used by triggers relocating finished files; the record's destination
    /// path is rewritten to the new location.
    pub async fn relocate(&self, target_dir: &Path) -> Result<PathBuf> {
        let current = self.meta().filename.clone().ok_or_else(|| {
            Error::Other(format!("transfer {} has no file to relocate", self.locator))
        })?;
        let file_name = current
            .file_name()
            .ok_or_else(|| Error::Other(format!("transfer {} has no file name", self.locator)))?
            .to_os_string();
        let dest = target_dir.join(file_name);
        tokio::fs::rename(&current, &dest).await?;
        self.meta().filename = Some(dest.clone());
        Ok(dest)
    }

    /// Start the download
    ///
    /// Marks the record `Requested`, hands it to its backend, and returns a
    /// [`Completion`] resolving when the record reaches a terminal state —
    /// after triggers bound to that state have run. Calling `download()` on an
    /// already active record is a caller error and fails with `AlreadyActive`.
    pub async fn download(self: &Arc<Self>) -> Result<Completion> {
        {
            let mut meta = self.meta();
            if meta.state.is_active() {
                return Err(TransferError::AlreadyActive {
                    name: meta.name.clone(),
                }
                .into());
            }
            meta.good = false;
            meta.last_error = None;
            meta.started_at = Some(Utc::now());
            meta.finished_at = None;
        }

        if !self.temporary {
            let mut meta = self.meta();
            if !meta.listed {
                meta.listed = true;
                drop(meta);
                self.active
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(self.clone());
            }
        }

        self.set_state(State::Requested).await;

        let backend_completion = self.backend.clone().begin(self.clone()).await;
        let (resolver, caller_completion) = Completion::channel();

        let this = self.clone();
        tokio::spawn(async move {
            let result = backend_completion.wait().await;
            this.finish(result, resolver).await;
        });

        Ok(caller_completion)
    }

    /// Settle the record from its backend's resolution
    async fn finish(&self, result: Result<()>, resolver: Resolver) {
        match result {
            Ok(()) => {
                {
                    let mut meta = self.meta();
                    meta.good = true;
                    meta.finished_at = Some(Utc::now());
                }
                self.set_state(State::Finished).await;
                self.events
                    .send(Event::Finished {
                        name: self.name(),
                        path: self.filename(),
                    })
                    .ok();
                resolver.resolve();
            }
            Err(error) => {
                {
                    let mut meta = self.meta();
                    meta.good = false;
                    meta.finished_at = Some(Utc::now());
                    meta.last_error = Some(error.to_string());
                }
                self.set_state(State::Error).await;
                self.events
                    .send(Event::Failed {
                        name: self.name(),
                        error: error.to_string(),
                    })
                    .ok();
                resolver.reject(error);
            }
        }
    }

    /// Transition the lifecycle state machine
    ///
    /// The only mutator of the record's state. Logs the `on_<state>` event,
    /// then synchronously invokes every trigger bound to that event name in
    /// configured order, each call isolated, and finally broadcasts the
    /// transition. No transition-table validation is enforced beyond the
    /// intended sequence; callers own the ordering.
    pub(crate) async fn set_state(&self, state: State) {
        let name = {
            let mut meta = self.meta();
            meta.state = state;
            meta.name.clone()
        };
        tracing::info!(
            transfer = %name,
            state = %state,
            "lifecycle event {}",
            state.event_name()
        );
        self.dispatcher.dispatch(state, &self.bindings, self).await;
        self.events.send(Event::StateChanged { name, state }).ok();
    }
}

impl std::fmt::Debug for Transfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transfer")
            .field("module", &self.module)
            .field("locator", &self.locator)
            .field("state", &self.state())
            .field("received", &self.received())
            .field("size", &self.size())
            .finish()
    }
}
