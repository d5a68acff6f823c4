//! Triggers: pluggable post-transition side effects
//!
//! A trigger is a named, configured object observing lifecycle events. The
//! state machine dispatches synchronously on every transition, passing the
//! owning transfer; handlers may mutate the record (e.g. relocate its on-disk
//! destination) and return a boolean outcome kept for bookkeeping only — the
//! state machine never alters a transition based on it. Handler failures are
//! isolated per trigger: logged and broadcast, never escalated to fail the
//! transfer or to stop later triggers in the list.

mod mover;

pub use mover::MoverTrigger;

use crate::config::TriggerConfig;
use crate::error::{Error, Result};
use crate::transfer::Transfer;
use crate::types::{Event, State};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Observer of transfer lifecycle events
///
/// One method per lifecycle event, each defaulting to a no-op, so a trigger
/// implements only the events it cares about and anything unbound stays
/// silent.
#[async_trait]
pub trait Trigger: Send + Sync {
    /// Called when a record returns to `Waiting`
    async fn on_waiting(&self, transfer: &Transfer) -> Result<bool> {
        let _ = transfer;
        Ok(false)
    }

    /// Called when a record enters `Requested`
    async fn on_requested(&self, transfer: &Transfer) -> Result<bool> {
        let _ = transfer;
        Ok(false)
    }

    /// Called when a record enters `Downloading`
    async fn on_downloading(&self, transfer: &Transfer) -> Result<bool> {
        let _ = transfer;
        Ok(false)
    }

    /// Called when a record enters `Finished`
    async fn on_finished(&self, transfer: &Transfer) -> Result<bool> {
        let _ = transfer;
        Ok(false)
    }

    /// Called when a record enters `Error`
    async fn on_error(&self, transfer: &Transfer) -> Result<bool> {
        let _ = transfer;
        Ok(false)
    }
}

/// Resolves trigger names and invokes their handlers on transitions
///
/// Built once at startup from the configured trigger instances (plus any
/// consumer-supplied ones), then frozen behind an `Arc`.
pub struct TriggerDispatcher {
    triggers: HashMap<String, Arc<dyn Trigger>>,
    events: broadcast::Sender<Event>,
}

impl TriggerDispatcher {
    /// Create an empty dispatcher
    pub fn new(events: broadcast::Sender<Event>) -> Self {
        Self {
            triggers: HashMap::new(),
            events,
        }
    }

    /// Register a named trigger instance
    pub fn register(&mut self, name: &str, trigger: Arc<dyn Trigger>) -> Result<()> {
        if self.triggers.contains_key(name) {
            return Err(Error::Config {
                message: format!("trigger {name} is already registered"),
                key: Some(format!("triggers.{name}")),
            });
        }
        self.triggers.insert(name.to_string(), trigger);
        Ok(())
    }

    /// Build a trigger instance from its configuration
    pub fn build(config: &TriggerConfig) -> Result<Arc<dyn Trigger>> {
        match config {
            TriggerConfig::Mover(mover) => Ok(Arc::new(MoverTrigger::new(mover)?)),
        }
    }

    /// Invoke every trigger bound to the transition's event name, in order
    ///
    /// Unknown trigger names are logged and skipped; a failing handler never
    /// prevents subsequent handlers from running.
    pub(crate) async fn dispatch(
        &self,
        state: State,
        bindings: &crate::types::TriggerBindings,
        transfer: &Transfer,
    ) {
        for name in bindings.for_event(state.event_name()) {
            let Some(trigger) = self.triggers.get(name) else {
                tracing::warn!(trigger = %name, event = state.event_name(), "unknown trigger, skipping");
                continue;
            };

            let result = match state {
                State::Waiting => trigger.on_waiting(transfer).await,
                State::Requested => trigger.on_requested(transfer).await,
                State::Downloading => trigger.on_downloading(transfer).await,
                State::Finished => trigger.on_finished(transfer).await,
                State::Error => trigger.on_error(transfer).await,
            };

            match result {
                Ok(outcome) => {
                    tracing::debug!(trigger = %name, event = state.event_name(), outcome, "trigger ran");
                }
                Err(error) => {
                    tracing::warn!(
                        trigger = %name,
                        event = state.event_name(),
                        error = %error,
                        "trigger failed"
                    );
                    self.events
                        .send(Event::TriggerFailed {
                            trigger: name.clone(),
                            name: transfer.name(),
                            error: error.to_string(),
                        })
                        .ok();
                }
            }
        }
    }
}
