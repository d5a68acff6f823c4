//! Long-lived IRC connection task, one per configured network
//!
//! Handles registration, nickname collisions, channel joins, PING/PONG and
//! CTCP `DCC SEND` offers. A lost connection reconnects immediately; a failed
//! connection attempt retries with capped exponential backoff — external
//! networks are flaky, so connect failures are never fatal.

use super::dcc;
use super::proto::{
    self, ERR_NICKNAMEINUSE, Message, RPL_WELCOME, alter_collided_nick, ctcp_payload, nick_of,
    parse_dcc_send,
};
use super::{Command, Network};
use crate::config::RetryConfig;
use crate::retry::backoff_delay;
use crate::types::Event;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

enum ServeOutcome {
    Quit,
    Disconnected,
}

/// Drive one network until shutdown: connect, serve, reconnect
pub(crate) async fn run_network(
    net: Arc<Network>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    retry: RetryConfig,
    cancel: CancellationToken,
    events: broadcast::Sender<Event>,
) {
    let mut failures = 0u32;
    loop {
        if cancel.is_cancelled() {
            break;
        }
        match TcpStream::connect((net.config.host.as_str(), net.config.port)).await {
            Err(e) => {
                failures += 1;
                let delay = backoff_delay(&retry, failures);
                tracing::warn!(
                    network = %net.name,
                    error = %e,
                    attempt = failures,
                    delay = ?delay,
                    "IRC connect failed, retrying"
                );
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Ok(stream) => {
                failures = 0;
                tracing::info!(network = %net.name, host = %net.config.host, "IRC connection established");
                let outcome = serve(&net, stream, &mut commands, &cancel, &events).await;
                events
                    .send(Event::IrcDisconnected {
                        network: net.name.clone(),
                    })
                    .ok();
                match outcome {
                    ServeOutcome::Quit => break,
                    ServeOutcome::Disconnected => {
                        tracing::info!(network = %net.name, "IRC connection lost, reconnecting");
                    }
                }
            }
        }
    }
    tracing::debug!(network = %net.name, "IRC network task stopped");
}

async fn send_line(writer: &mut OwnedWriteHalf, line: &str) -> std::io::Result<()> {
    tracing::trace!(line, "irc >>");
    writer.write_all(format!("{line}\r\n").as_bytes()).await
}

async fn serve(
    net: &Arc<Network>,
    stream: TcpStream,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    cancel: &CancellationToken,
    events: &broadcast::Sender<Event>,
) -> ServeOutcome {
    let (read_half, mut writer) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let mut nickname = net.nickname.clone();
    let mut welcomed = false;

    if send_line(&mut writer, &format!("NICK {nickname}")).await.is_err()
        || send_line(&mut writer, &format!("USER {nickname} 0 * :{nickname}"))
            .await
            .is_err()
    {
        return ServeOutcome::Disconnected;
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                send_line(&mut writer, "QUIT :shutting down").await.ok();
                return ServeOutcome::Quit;
            }
            // Queued commands are held back until registration completes
            cmd = commands.recv(), if welcomed => {
                let Some(cmd) = cmd else { return ServeOutcome::Quit };
                let line = match cmd {
                    Command::Privmsg { target, text } => format!("PRIVMSG {target} :{text}"),
                    Command::Notice { target, text } => format!("NOTICE {target} :{text}"),
                    Command::Quit => {
                        send_line(&mut writer, "QUIT :bye").await.ok();
                        return ServeOutcome::Quit;
                    }
                };
                if send_line(&mut writer, &line).await.is_err() {
                    return ServeOutcome::Disconnected;
                }
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    _ => return ServeOutcome::Disconnected,
                };
                tracing::trace!(line = %line, "irc <<");
                let Some(msg) = proto::parse_message(&line) else { continue };
                match handle_message(net, msg, &mut writer, &mut nickname, &mut welcomed, events).await {
                    Ok(()) => {}
                    Err(_) => return ServeOutcome::Disconnected,
                }
            }
        }
    }
}

async fn handle_message(
    net: &Arc<Network>,
    msg: Message,
    writer: &mut OwnedWriteHalf,
    nickname: &mut String,
    welcomed: &mut bool,
    events: &broadcast::Sender<Event>,
) -> std::io::Result<()> {
    match msg.command.as_str() {
        "PING" => {
            let token = msg.params.first().cloned().unwrap_or_default();
            send_line(writer, &format!("PONG :{token}")).await?;
        }
        RPL_WELCOME => {
            *welcomed = true;
            tracing::info!(network = %net.name, nickname = %nickname, "registered with IRC server");
            events
                .send(Event::IrcConnected {
                    network: net.name.clone(),
                    nickname: nickname.clone(),
                })
                .ok();
            for channel in &net.config.channels {
                let chan = if channel.starts_with('#') {
                    channel.clone()
                } else {
                    format!("#{channel}")
                };
                tracing::info!(network = %net.name, channel = %chan, "joining channel");
                send_line(writer, &format!("JOIN {chan}")).await?;
            }
        }
        ERR_NICKNAMEINUSE => {
            *nickname = alter_collided_nick(nickname);
            tracing::warn!(network = %net.name, nickname = %nickname, "nickname collision, retrying");
            send_line(writer, &format!("NICK {nickname}")).await?;
        }
        "JOIN" => {
            if let Some(prefix) = &msg.prefix {
                if nick_of(prefix) == nickname.as_str() {
                    let channel = msg.params.first().map(String::as_str).unwrap_or("?");
                    tracing::info!(network = %net.name, channel = %channel, "joined channel");
                }
            }
        }
        "NICK" => {
            if let Some(prefix) = &msg.prefix {
                let new = msg.params.first().map(String::as_str).unwrap_or("?");
                tracing::debug!(old = %nick_of(prefix), new = %new, "nick change");
            }
        }
        "PRIVMSG" => {
            if msg.params.len() >= 2 && msg.params[0].eq_ignore_ascii_case(nickname) {
                if let Some(payload) = ctcp_payload(&msg.params[1]) {
                    if let Some(offer) = parse_dcc_send(payload) {
                        let peer = msg
                            .prefix
                            .as_deref()
                            .map(nick_of)
                            .unwrap_or_default()
                            .to_string();
                        if !peer.is_empty() {
                            dcc::handle_offer(net, &peer, offer);
                        }
                    }
                }
            }
        }
        _ => {}
    }
    Ok(())
}
