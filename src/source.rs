//! Source polling and extraction
//!
//! A source is a named scrape job: a seed resource fetched on a timer (or
//! once), a pattern applied to the fetched text, and templates turning each
//! match into a new transfer record. Every refresh replaces the source's
//! record set entirely; a failed refresh keeps the previous set and the
//! service alive for the next scheduled attempt.

use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::manager::Shared;
use crate::transfer::Transfer;
use crate::types::{Event, State, TransferOptions};
use crate::utils::substitute;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A configured scrape job feeding the download pipeline
pub struct Source {
    name: String,
    config: SourceConfig,
    pattern: Regex,
    shared: Arc<Shared>,
    files: Mutex<Vec<Arc<Transfer>>>,
    seed: Mutex<Option<Arc<Transfer>>>,
    last_refresh: Mutex<Option<DateTime<Utc>>>,
    timer: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Source {
    /// Build a source; fails if the extraction pattern does not compile
    pub(crate) fn new(name: String, config: SourceConfig, shared: Arc<Shared>) -> Result<Arc<Self>> {
        let pattern = Regex::new(&config.pattern).map_err(|e| Error::Config {
            message: format!("source {name} pattern does not compile: {e}"),
            key: Some(format!("sources.{name}.pattern")),
        })?;
        Ok(Arc::new(Self {
            name,
            config,
            pattern,
            shared,
            files: Mutex::new(Vec::new()),
            seed: Mutex::new(None),
            last_refresh: Mutex::new(None),
            timer: tokio::sync::Mutex::new(None),
        }))
    }

    fn lock<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Source name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// State of the current seed fetch (`Waiting` before the first refresh)
    pub fn state(&self) -> State {
        Self::lock(&self.seed)
            .as_ref()
            .map(|seed| seed.state())
            .unwrap_or(State::Waiting)
    }

    /// The record set produced by the last successful refresh
    pub fn files(&self) -> Vec<Arc<Transfer>> {
        Self::lock(&self.files).clone()
    }

    /// When the record set was last replaced
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *Self::lock(&self.last_refresh)
    }

    /// (Re)start the refresh timer
    ///
    /// Cancels any previously scheduled timer first — there is a single active
    /// timer per source, never overlapping schedules. With a zero refresh
    /// interval the seed is fetched once, immediately, and not repeated;
    /// otherwise the fetch runs now and then on every interval tick.
    pub async fn refresh_loop(self: &Arc<Self>) {
        let mut timer = self.timer.lock().await;
        if let Some(previous) = timer.take() {
            previous.abort();
        }

        let this = self.clone();
        let interval = self.config.refresh;
        let cancel = self.shared.cancel.clone();
        *timer = Some(tokio::spawn(async move {
            if interval.is_zero() {
                this.refresh().await;
                return;
            }
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => this.refresh().await,
                }
            }
        }));
    }

    /// Restart the refresh timer unless a seed fetch is already in flight
    pub async fn refresh_now(self: &Arc<Self>) {
        if self.state().is_active() {
            tracing::debug!(source = %self.name, "refresh already in flight, ignoring");
            return;
        }
        self.refresh_loop().await;
    }

    /// Stop the refresh timer
    pub(crate) async fn stop(&self) {
        if let Some(handle) = self.timer.lock().await.take() {
            handle.abort();
        }
    }

    /// Run one seed fetch and, on success, regenerate the record set
    ///
    /// Each refresh uses a fresh temporary seed record: a record's sink can
    /// never be reopened, so the seed is not reusable across fetches.
    pub(crate) async fn refresh(&self) {
        if self.state().is_active() {
            tracing::debug!(source = %self.name, "seed fetch still active, skipping refresh");
            return;
        }

        tracing::info!(source = %self.name, locator = %self.config.locator, "refreshing source");
        let seed = match self.shared.create_transfer(
            &self.config.locator,
            TransferOptions {
                temporary: true,
                ..Default::default()
            },
        ) {
            Ok(seed) => seed,
            Err(error) => {
                self.refresh_failed(error);
                return;
            }
        };
        *Self::lock(&self.seed) = Some(seed.clone());

        let completion = match seed.download().await {
            Ok(completion) => completion,
            Err(error) => {
                self.refresh_failed(error);
                return;
            }
        };
        match completion.wait().await {
            Ok(()) => self.extract(&seed).await,
            Err(error) => self.refresh_failed(error),
        }
    }

    /// Apply the pattern to the fetched text and replace the record set
    async fn extract(&self, seed: &Arc<Transfer>) {
        let Some(scratch) = seed.take_scratch() else {
            self.refresh_failed(Error::Other("seed left no scratch file".to_string()));
            return;
        };
        let text = match tokio::fs::read_to_string(&scratch).await {
            Ok(text) => text,
            Err(error) => {
                self.refresh_failed(error.into());
                return;
            }
        };
        // dropping the scratch path deletes the file
        drop(scratch);

        let mut records = Vec::new();
        for captures in self.pattern.captures_iter(&text) {
            let groups: Vec<String> = captures
                .iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect();
            tracing::debug!(source = %self.name, ?groups, "extraction match");

            let locator = substitute(&self.config.url, &groups);
            let options = TransferOptions {
                name: Some(substitute(&self.config.name, &groups)).filter(|n| !n.is_empty()),
                size: self.config.size.as_ref().map(|t| substitute(t, &groups)),
                directory: self.config.destination.clone(),
                temporary: false,
                bindings: self.config.bindings.clone(),
            };
            match self.shared.create_transfer(&locator, options) {
                Ok(record) => records.push(record),
                Err(error) => {
                    // one bad record poisons the whole attempt; keep the old set
                    self.refresh_failed(error);
                    return;
                }
            }
        }

        let count = records.len();
        *Self::lock(&self.files) = records;
        *Self::lock(&self.last_refresh) = Some(Utc::now());
        tracing::info!(source = %self.name, count, "source refreshed");
        self.shared
            .event_tx
            .send(Event::SourceRefreshed {
                source: self.name.clone(),
                count,
            })
            .ok();
    }

    fn refresh_failed(&self, error: Error) {
        tracing::error!(
            source = %self.name,
            error = %error,
            "source refresh failed, keeping previous record set"
        );
        self.shared
            .event_tx
            .send(Event::SourceRefreshFailed {
                source: self.name.clone(),
                error: error.to_string(),
            })
            .ok();
    }
}
