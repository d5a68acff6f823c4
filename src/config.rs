//! Configuration types for xdcc-dl
//!
//! The library consumes a fully formed [`Config`] value; loading it from a
//! file (the embedding process's `config.json`) is the caller's concern. Every
//! section has sensible defaults and round-trips through serde.

use crate::error::{Error, Result};
use crate::types::TriggerBindings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download destination settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Enabled protocol modules and their settings
    #[serde(default)]
    pub modules: ModulesConfig,

    /// Named scrape jobs feeding the pipeline
    #[serde(default)]
    pub sources: HashMap<String, SourceConfig>,

    /// Named trigger instances available for binding
    #[serde(default)]
    pub triggers: HashMap<String, TriggerConfig>,

    /// Backoff policy for the IRC connection layer
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Validate the configuration
    ///
    /// Checks that extraction patterns and trigger selectors compile, that
    /// source locators carry a module tag, and that IRC networks are
    /// addressable. Called by the manager at startup; errors here are fatal.
    pub fn validate(&self) -> Result<()> {
        for (name, source) in &self.sources {
            if !source.locator.contains(':') {
                return Err(Error::Config {
                    message: format!("source {name} locator has no module tag"),
                    key: Some(format!("sources.{name}.locator")),
                });
            }
            regex::Regex::new(&source.pattern).map_err(|e| Error::Config {
                message: format!("source {name} pattern does not compile: {e}"),
                key: Some(format!("sources.{name}.pattern")),
            })?;
            if source.url.is_empty() {
                return Err(Error::Config {
                    message: format!("source {name} has an empty url template"),
                    key: Some(format!("sources.{name}.url")),
                });
            }
        }

        for (name, trigger) in &self.triggers {
            match trigger {
                TriggerConfig::Mover(mover) => {
                    regex::Regex::new(&mover.selector).map_err(|e| Error::Config {
                        message: format!("trigger {name} selector does not compile: {e}"),
                        key: Some(format!("triggers.{name}.selector")),
                    })?;
                }
            }
        }

        if let Some(irc) = &self.modules.irc {
            for (name, network) in &irc.networks {
                if network.host.is_empty() {
                    return Err(Error::Config {
                        message: format!("irc network {name} has no host"),
                        key: Some(format!("modules.irc.networks.{name}.host")),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Download destination settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory completed downloads are written to (default: ./downloads)
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
        }
    }
}

/// Enabled protocol modules
///
/// A present section enables the module under its tag; an absent one leaves it
/// unregistered. The trivial modules (http, local, fake) are enabled by
/// default; IRC needs at least one network and is opt-in.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// Plain HTTP(S) backend
    #[serde(default = "default_http_module")]
    pub http: Option<HttpConfig>,

    /// Same-host copy backend
    #[serde(default = "default_local_module")]
    pub local: Option<LocalConfig>,

    /// No-op test backend
    #[serde(default = "default_fake_module")]
    pub fake: Option<FakeConfig>,

    /// IRC/DCC backend
    #[serde(default)]
    pub irc: Option<IrcConfig>,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            http: default_http_module(),
            local: default_local_module(),
            fake: default_fake_module(),
            irc: None,
        }
    }
}

/// HTTP backend settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header sent with requests (library default when unset)
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Local copy backend settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Copy chunk size in bytes (default: 64 KiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

/// Fake backend settings (no knobs; presence enables the module)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FakeConfig {}

/// IRC/DCC backend settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IrcConfig {
    /// Default nickname used on every network without its own
    #[serde(default = "default_nickname")]
    pub nickname: String,

    /// Configured networks, keyed by name
    #[serde(default)]
    pub networks: HashMap<String, NetworkConfig>,
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            nickname: default_nickname(),
            networks: HashMap::new(),
        }
    }
}

/// One IRC network
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Server hostname or address
    pub host: String,

    /// Server port (default: 6667)
    #[serde(default = "default_irc_port")]
    pub port: u16,

    /// Per-network nickname override
    #[serde(default)]
    pub nickname: Option<String>,

    /// Channels joined after registration (leading `#` optional)
    #[serde(default)]
    pub channels: Vec<String>,
}

/// A named scrape job
///
/// The seed locator is fetched on a timer (or once); the fetched text is
/// matched against `pattern`, and each match instantiates the `url`, `name`
/// and `size` templates by positional substitution of the capture groups
/// (`$0$`, `$1$`, …) to produce one new transfer record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Seed locator spec (`<module>:<locator>`), always fetched temporarily
    pub locator: String,

    /// Refresh interval; zero means run once, no repeat
    #[serde(default, with = "duration_serde")]
    pub refresh: Duration,

    /// Extraction pattern applied to the fetched text (capture groups only)
    pub pattern: String,

    /// Locator-spec template for generated records
    pub url: String,

    /// Display-name template for generated records
    #[serde(default)]
    pub name: String,

    /// Expected-size template for generated records (size grammar)
    #[serde(default)]
    pub size: Option<String>,

    /// Destination directory for generated records (default: download_dir)
    #[serde(default)]
    pub destination: Option<PathBuf>,

    /// Trigger bindings attached to every generated record
    #[serde(default)]
    pub bindings: TriggerBindings,
}

/// A named trigger instance
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerConfig {
    /// Relocate finished files whose name matches a selector
    Mover(MoverConfig),
}

/// Settings for the file-relocation trigger
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MoverConfig {
    /// Regex matched against the finished record's file name
    pub selector: String,

    /// Target-directory template filled from the selector's capture groups
    pub target: String,

    /// Resolve the target directory case-insensitively when missing
    #[serde(default)]
    pub insensitive: bool,

    /// Create the target directory when missing
    #[serde(default)]
    pub create: bool,
}

/// Backoff policy for IRC reconnection
///
/// Connection attempts retry forever; failed attempts are flaky-network noise,
/// not fatal errors. Delays grow exponentially between consecutive failures
/// and reset on a successful connection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay after the first failed attempt (default: 5 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Cap on the delay between attempts (default: 300 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_http_module() -> Option<HttpConfig> {
    Some(HttpConfig::default())
}

fn default_local_module() -> Option<LocalConfig> {
    Some(LocalConfig::default())
}

fn default_fake_module() -> Option<FakeConfig> {
    Some(FakeConfig::default())
}

fn default_chunk_size() -> usize {
    64 * 1024
}

fn default_nickname() -> String {
    "xdcc-dl".to_string()
}

fn default_irc_port() -> u16 {
    6667
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(300)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (plain seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn default_modules_enable_http_local_fake_but_not_irc() {
        let modules = ModulesConfig::default();
        assert!(modules.http.is_some());
        assert!(modules.local.is_some());
        assert!(modules.fake.is_some());
        assert!(modules.irc.is_none());
    }

    #[test]
    fn source_config_parses_from_json() {
        let json = r#"{
            "sources": {
                "isos": {
                    "locator": "http:https://example.com/index.html",
                    "refresh": 900,
                    "pattern": "href=\"(.+?\\.iso)\" \\((\\d+[kmg]io)\\)",
                    "url": "http:https://example.com/$0$",
                    "name": "$0$",
                    "size": "$1$"
                }
            }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        let source = &config.sources["isos"];
        assert_eq!(source.refresh, Duration::from_secs(900));
        assert!(source.destination.is_none());
    }

    #[test]
    fn bad_source_pattern_fails_validation() {
        let mut config = Config::default();
        config.sources.insert(
            "broken".into(),
            SourceConfig {
                locator: "http:https://example.com/".into(),
                refresh: Duration::ZERO,
                pattern: "(unclosed".into(),
                url: "http:$0$".into(),
                name: String::new(),
                size: None,
                destination: None,
                bindings: TriggerBindings::new(),
            },
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("does not compile"));
    }

    #[test]
    fn locator_without_module_tag_fails_validation() {
        let mut config = Config::default();
        config.sources.insert(
            "tagless".into(),
            SourceConfig {
                locator: "https//missing-colon".into(),
                refresh: Duration::ZERO,
                pattern: "(a)".into(),
                url: "http:$0$".into(),
                name: String::new(),
                size: None,
                destination: None,
                bindings: TriggerBindings::new(),
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn trigger_config_parses_tagged_form() {
        let json = r#"{
            "triggers": {
                "series": {
                    "kind": "mover",
                    "selector": "(.*)\\.S[0-9]+E[0-9]+\\..*",
                    "target": "/media/$0$",
                    "create": true
                }
            }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        let TriggerConfig::Mover(mover) = &config.triggers["series"];
        assert!(mover.create);
        assert!(!mover.insensitive);
    }

    #[test]
    fn retry_defaults_are_sane() {
        let retry = RetryConfig::default();
        assert_eq!(retry.initial_delay, Duration::from_secs(5));
        assert!(retry.max_delay > retry.initial_delay);
        assert!(retry.jitter);
    }
}
