//! IRC/DCC backend
//!
//! Owns one long-lived IRC connection per configured network. Starting a
//! transfer sends the request text to the target nickname and queues a DCC
//! session; when the peer's CTCP `DCC SEND` offer arrives, the oldest waiting
//! session for that nickname is matched, a second raw connection receives the
//! byte stream, and the session resolves the transfer's completion.

mod client;
mod dcc;
mod proto;

use crate::backend::Backend;
use crate::completion::Completion;
use crate::config::{IrcConfig, NetworkConfig, RetryConfig};
use crate::error::{Error, Result, TransferError};
use crate::transfer::Transfer;
use crate::types::{DccState, Event};
use async_trait::async_trait;
use dcc::DccSession;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// Outbound IRC commands, queued until the connection is registered
pub(crate) enum Command {
    /// Direct message to a nickname or channel
    Privmsg {
        /// Recipient
        target: String,
        /// Message body
        text: String,
    },
    /// Notice to a nickname
    Notice {
        /// Recipient
        target: String,
        /// Notice body
        text: String,
    },
    /// Disconnect and stop the network task
    #[allow(dead_code)]
    Quit,
}

/// Shared state of one configured network
pub(crate) struct Network {
    pub(crate) name: String,
    pub(crate) config: NetworkConfig,
    pub(crate) nickname: String,
    commands: mpsc::UnboundedSender<Command>,
    // Per-nickname FIFO of sessions awaiting a DCC offer. Insertion order is
    // the matching policy: an offer pops the oldest waiting session.
    sessions: Mutex<HashMap<String, VecDeque<DccSession>>>,
}

impl Network {
    fn sessions(&self) -> MutexGuard<'_, HashMap<String, VecDeque<DccSession>>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn send(&self, command: Command) {
        // The receiver lives for the network task's lifetime; a closed channel
        // means shutdown, where dropping the command is fine.
        self.commands.send(command).ok();
    }

    pub(crate) fn enqueue_session(&self, nickname: &str, session: DccSession) {
        self.sessions()
            .entry(nickname.to_string())
            .or_default()
            .push_back(session);
    }

    /// Pop the oldest waiting session for a nickname
    pub(crate) fn pop_waiting(&self, nickname: &str) -> Option<DccSession> {
        let mut sessions = self.sessions();
        let queue = sessions.get_mut(nickname)?;
        let index = queue.iter().position(|s| s.state == DccState::Waiting)?;
        queue.remove(index)
    }

    /// Number of sessions queued for a nickname, for introspection
    pub(crate) fn pending(&self, nickname: &str) -> usize {
        self.sessions().get(nickname).map_or(0, VecDeque::len)
    }
}

/// Backend for `irc` locators (`irc://network/nickname/request-text`)
pub struct IrcBackend {
    networks: HashMap<String, Arc<Network>>,
}

impl std::fmt::Debug for IrcBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IrcBackend")
            .field("networks", &self.networks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl IrcBackend {
    /// Build the backend and spawn one connection task per configured network
    pub fn new(
        config: &IrcConfig,
        retry: RetryConfig,
        events: broadcast::Sender<Event>,
        cancel: CancellationToken,
    ) -> Self {
        let mut networks = HashMap::new();
        for (name, network_config) in &config.networks {
            let nickname = network_config
                .nickname
                .clone()
                .unwrap_or_else(|| config.nickname.clone());
            let (tx, rx) = mpsc::unbounded_channel();
            let network = Arc::new(Network {
                name: name.clone(),
                config: network_config.clone(),
                nickname,
                commands: tx,
                sessions: Mutex::new(HashMap::new()),
            });
            tokio::spawn(client::run_network(
                network.clone(),
                rx,
                retry.clone(),
                cancel.clone(),
                events.clone(),
            ));
            networks.insert(name.clone(), network);
        }
        Self { networks }
    }

    fn find_network(&self, authority: &str) -> Option<Arc<Network>> {
        self.networks.get(authority).cloned().or_else(|| {
            self.networks
                .values()
                .find(|n| n.config.host == authority)
                .cloned()
        })
    }
}

/// Split an `irc://authority/nickname/request-text` locator
///
/// The path's last component is the request text; the component before it is
/// the target nickname. Both are percent-decoded.
fn parse_irc_locator(locator: &str) -> Result<(String, String, String)> {
    let invalid = |reason: &str| {
        Error::Transfer(TransferError::InvalidLocator {
            locator: locator.to_string(),
            reason: reason.to_string(),
        })
    };

    let rest = locator
        .strip_prefix("irc://")
        .ok_or_else(|| invalid("expected irc:// prefix"))?;
    let (authority, path) = rest
        .split_once('/')
        .ok_or_else(|| invalid("missing nickname/request path"))?;
    let path = path.trim_matches('/');
    let (nick_path, message) = path
        .rsplit_once('/')
        .ok_or_else(|| invalid("path must be nickname/request-text"))?;
    let nickname = nick_path.rsplit('/').next().unwrap_or(nick_path);

    if authority.is_empty() || nickname.is_empty() || message.is_empty() {
        return Err(invalid("empty authority, nickname or request"));
    }

    let nickname = urlencoding::decode(nickname)
        .map_err(|_| invalid("nickname is not valid percent-encoding"))?
        .into_owned();
    let message = urlencoding::decode(message)
        .map_err(|_| invalid("request is not valid percent-encoding"))?
        .into_owned();
    Ok((authority.to_string(), nickname, message))
}

#[async_trait]
impl Backend for IrcBackend {
    fn schemes(&self) -> &[&str] {
        &["irc"]
    }

    async fn begin(&self, transfer: Arc<Transfer>) -> Completion {
        let (resolver, completion) = Completion::channel();
        tracing::info!(locator = %transfer.locator(), "IRC download");

        let (authority, nickname, message) = match parse_irc_locator(transfer.locator()) {
            Ok(parts) => parts,
            Err(error) => {
                resolver.reject(error);
                return completion;
            }
        };

        let Some(network) = self.find_network(&authority) else {
            resolver.reject(TransferError::NoNetwork { authority }.into());
            return completion;
        };

        // Queue before asking: the peer may answer faster than we bookkeep
        network.enqueue_session(&nickname, DccSession::new(transfer, resolver));
        network.send(Command::Privmsg {
            target: nickname,
            text: message,
        });

        completion
    }
}
