//! Shared helpers for in-crate tests

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::backend::{Backend, BackendRegistry, FakeBackend, LocalBackend};
use crate::config::{Config, DownloadConfig, LocalConfig};
use crate::manager::Shared;
use crate::transfer::{Transfer, TransferParams};
use crate::trigger::{Trigger, TriggerDispatcher};
use crate::types::{Event, TransferOptions};
use crate::utils::parse_size;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// A manager-less `Shared` with the local and fake backends registered
pub(crate) fn test_shared(download_dir: &Path) -> Arc<Shared> {
    let (event_tx, _rx) = broadcast::channel(256);
    let mut registry = BackendRegistry::new();
    registry
        .register("local", Arc::new(LocalBackend::new(&LocalConfig::default())))
        .unwrap();
    registry.register("fake", Arc::new(FakeBackend::new())).unwrap();
    Arc::new(Shared {
        config: Arc::new(Config {
            download: DownloadConfig {
                download_dir: download_dir.to_path_buf(),
            },
            ..Default::default()
        }),
        registry: Arc::new(registry),
        dispatcher: Arc::new(TriggerDispatcher::new(event_tx.clone())),
        event_tx,
        active: Arc::new(Mutex::new(Vec::new())),
        cancel: CancellationToken::new(),
    })
}

/// Event channel with an initial subscriber kept alive by the caller
pub(crate) fn recording_events() -> (broadcast::Sender<Event>, broadcast::Receiver<Event>) {
    broadcast::channel(256)
}

/// Build a transfer record outside the manager, with no triggers bound
pub(crate) fn new_transfer(
    module: &str,
    locator: &str,
    directory: &Path,
    options: TransferOptions,
    events: broadcast::Sender<Event>,
) -> Arc<Transfer> {
    new_transfer_with(
        module,
        locator,
        directory,
        options,
        events.clone(),
        Arc::new(TriggerDispatcher::new(events)),
        Arc::new(FakeBackend::new()),
    )
}

/// Build a transfer record with an explicit dispatcher and backend
pub(crate) fn new_transfer_with(
    module: &str,
    locator: &str,
    directory: &Path,
    options: TransferOptions,
    events: broadcast::Sender<Event>,
    dispatcher: Arc<TriggerDispatcher>,
    backend: Arc<dyn Backend>,
) -> Arc<Transfer> {
    let name = options
        .name
        .clone()
        .unwrap_or_else(|| default_name(locator));
    let size = options.size.as_deref().map(|s| parse_size(s).unwrap());
    Transfer::new(TransferParams {
        module: module.to_string(),
        locator: locator.to_string(),
        name,
        directory: directory.to_path_buf(),
        size,
        temporary: options.temporary,
        bindings: options.bindings,
        backend,
        dispatcher,
        events,
        active: Arc::new(Mutex::new(Vec::new())),
    })
}

fn default_name(locator: &str) -> String {
    locator
        .rsplit('/')
        .next()
        .unwrap_or(locator)
        .to_string()
}

/// Dispatcher with a single named trigger, for binding tests
pub(crate) fn dispatcher_with(
    events: broadcast::Sender<Event>,
    name: &str,
    trigger: Arc<dyn Trigger>,
) -> Arc<TriggerDispatcher> {
    let mut dispatcher = TriggerDispatcher::new(events);
    dispatcher.register(name, trigger).unwrap();
    Arc::new(dispatcher)
}
