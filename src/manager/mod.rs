//! Download manager orchestrator split into focused submodules.
//!
//! The `DownloadManager` struct and its methods are organized by domain:
//! - [`transfers`] - Record creation and the active-transfer list
//! - [`sources`] - Source bookkeeping and manual refresh
//! - [`lifecycle`] - Shutdown coordination

mod lifecycle;
mod sources;
mod transfers;

use crate::backend::{BackendRegistry, FakeBackend, HttpBackend, LocalBackend};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::irc::IrcBackend;
use crate::source::Source;
use crate::transfer::Transfer;
use crate::trigger::{Trigger, TriggerDispatcher};
use crate::types::Event;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// State shared between the manager, its sources, and transfer records
///
/// The backend registry and trigger set are populated once here, at startup,
/// then only read — no global class-level registry, no hidden mutation.
pub(crate) struct Shared {
    pub(crate) config: Arc<Config>,
    pub(crate) registry: Arc<BackendRegistry>,
    pub(crate) dispatcher: Arc<TriggerDispatcher>,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) active: Arc<Mutex<Vec<Arc<Transfer>>>>,
    pub(crate) cancel: CancellationToken,
}

/// Top-level orchestrator owning the registry, triggers, sources and events
///
/// Construction wires everything up: backends are registered from the enabled
/// module sections, trigger instances are built from configuration, IRC
/// network tasks are spawned, and every configured source starts its refresh
/// loop.
pub struct DownloadManager {
    shared: Arc<Shared>,
    sources: HashMap<String, Arc<Source>>,
}

impl DownloadManager {
    /// Create a manager from configuration
    pub async fn new(config: Config) -> Result<Self> {
        Self::with_triggers(config, HashMap::new()).await
    }

    /// Create a manager with additional consumer-supplied trigger instances
    ///
    /// Custom triggers are registered alongside the configured ones and can be
    /// referenced from any binding by name.
    pub async fn with_triggers(
        config: Config,
        extra_triggers: HashMap<String, Arc<dyn Trigger>>,
    ) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.download.download_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "failed to create download directory '{}': {}",
                        config.download.download_dir.display(),
                        e
                    ),
                ))
            })?;

        let (event_tx, _rx) = broadcast::channel(1000);
        let cancel = CancellationToken::new();

        // Triggers first: the dispatcher is frozen before any record exists
        let mut dispatcher = TriggerDispatcher::new(event_tx.clone());
        for (name, trigger_config) in &config.triggers {
            dispatcher.register(name, TriggerDispatcher::build(trigger_config)?)?;
        }
        for (name, trigger) in extra_triggers {
            dispatcher.register(&name, trigger)?;
        }
        let dispatcher = Arc::new(dispatcher);

        // Backend registry: populated once, single-threaded, then read-only
        let mut registry = BackendRegistry::new();
        if let Some(http) = &config.modules.http {
            registry.register("http", Arc::new(HttpBackend::new(http)?))?;
        }
        if let Some(local) = &config.modules.local {
            registry.register("local", Arc::new(LocalBackend::new(local)))?;
        }
        if config.modules.fake.is_some() {
            registry.register("fake", Arc::new(FakeBackend::new()))?;
        }
        if let Some(irc) = &config.modules.irc {
            registry.register(
                "irc",
                Arc::new(IrcBackend::new(
                    irc,
                    config.retry.clone(),
                    event_tx.clone(),
                    cancel.clone(),
                )),
            )?;
        }
        let registry = Arc::new(registry);
        tracing::info!(modules = ?registry.tags(), "backend registry populated");

        let shared = Arc::new(Shared {
            config: Arc::new(config),
            registry,
            dispatcher,
            event_tx,
            active: Arc::new(Mutex::new(Vec::new())),
            cancel,
        });

        let mut sources = HashMap::new();
        for (name, source_config) in &shared.config.sources {
            let source = Source::new(name.clone(), source_config.clone(), shared.clone())?;
            source.refresh_loop().await;
            sources.insert(name.clone(), source);
        }

        Ok(Self { shared, sources })
    }

    /// Subscribe to manager events
    ///
    /// Multiple subscribers are supported; each receives all events
    /// independently.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.event_tx.subscribe()
    }

    /// The backend registry, for introspection (module tags and schemes)
    pub fn registry(&self) -> &BackendRegistry {
        &self.shared.registry
    }

    /// The current configuration
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.shared.config)
    }
}
