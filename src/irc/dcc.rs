//! DCC session bookkeeping and raw byte-stream receipt
//!
//! A session is created per requested transfer and waits in a per-nickname
//! FIFO queue until the peer's `DCC SEND` offer arrives. Matching pops the
//! oldest waiting session — queue order *is* the matching policy. The matched
//! session then owns a raw connection to the peer and forwards every inbound
//! chunk to the transfer's sink, acknowledging received byte counts the
//! classic way (32-bit big-endian running total).

use super::proto::DccSendOffer;
use super::{Command, Network};
use crate::completion::Resolver;
use crate::error::{Result, TransferError};
use crate::transfer::Transfer;
use crate::types::DccState;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Match an incoming DCC SEND offer against the peer's session queue
///
/// A zero port signals reverse DCC, which is unsupported: the peer is told so
/// with a notice, the offer is dropped, and the session stays waiting. One
/// offer matches at most one waiting session; further queued sessions wait
/// for their own offers, and an offer with no waiting session is dropped.
pub(super) fn handle_offer(net: &Arc<Network>, peer: &str, offer: DccSendOffer) {
    tracing::info!(
        network = %net.name,
        peer = %peer,
        file = %offer.filename,
        address = %offer.address,
        port = offer.port,
        size = ?offer.size,
        "DCC offer received"
    );

    if offer.port == 0 {
        net.send(Command::Notice {
            target: peer.to_string(),
            text: "Reverse DCC unsupported".to_string(),
        });
        return;
    }

    match net.pop_waiting(peer) {
        Some(session) => {
            tokio::spawn(receive(session, offer));
        }
        None => {
            tracing::warn!(network = %net.name, peer = %peer, "DCC offer with no waiting session, dropping");
        }
    }
}

/// One pending or running DCC transfer, scoped to (network, peer nickname)
pub(crate) struct DccSession {
    pub(crate) transfer: Arc<Transfer>,
    pub(crate) resolver: Option<Resolver>,
    pub(crate) state: DccState,
}

impl DccSession {
    pub(crate) fn new(transfer: Arc<Transfer>, resolver: Resolver) -> Self {
        Self {
            transfer,
            resolver: Some(resolver),
            state: DccState::Waiting,
        }
    }
}

/// Stamp the offer onto the session's transfer and run the raw connection
///
/// Exactly one resolution per session: success and failure paths both consume
/// the resolver.
pub(crate) async fn receive(mut session: DccSession, offer: DccSendOffer) {
    let transfer = session.transfer.clone();
    let Some(resolver) = session.resolver.take() else {
        return;
    };

    transfer.set_name(&offer.filename);
    if let Some(size) = offer.size {
        transfer.set_size(size);
    }

    session.state = DccState::Connecting;
    match run(&mut session, &transfer, offer.address, offer.port).await {
        Ok(()) => {
            session.state = DccState::Finished;
            resolver.resolve();
        }
        Err(error) => {
            session.state = DccState::Error;
            transfer.close().await.ok();
            resolver.reject(error);
        }
    }
}

async fn run(
    session: &mut DccSession,
    transfer: &Arc<Transfer>,
    address: Ipv4Addr,
    port: u16,
) -> Result<()> {
    let stream = TcpStream::connect((IpAddr::V4(address), port))
        .await
        .map_err(|e| TransferError::Transport(format!("DCC connect failed: {e}")))?;
    session.state = DccState::Connected;
    tracing::info!(peer = %address, port, file = %transfer.name(), "DCC connection open");

    transfer.open().await?;
    session.state = DccState::Downloading;

    let (mut reader, mut writer) = stream.into_split();
    let mut buf = vec![0u8; 16 * 1024];
    let mut total: u64 = 0;
    loop {
        let n = reader
            .read(&mut buf)
            .await
            .map_err(|e| TransferError::Transport(format!("DCC read failed: {e}")))?;
        if n == 0 {
            break;
        }
        transfer.write(&buf[..n]).await?;
        total += n as u64;

        // Acknowledge the running total; a peer that stopped reading acks is
        // not a transfer failure.
        let ack = (total & 0xffff_ffff) as u32;
        if writer.write_all(&ack.to_be_bytes()).await.is_err() {
            tracing::debug!(file = %transfer.name(), "peer stopped reading DCC acks");
        }
    }

    transfer.close().await?;
    settle(transfer.size(), total, &transfer.name())
}

/// Decide the session's outcome from byte counts at disconnection
fn settle(expected: Option<u64>, received: u64, name: &str) -> Result<()> {
    match expected {
        Some(expected) if received == expected => {
            tracing::info!(file = %name, received, "DCC transfer complete");
            Ok(())
        }
        Some(expected) if received > expected => {
            tracing::warn!(
                file = %name,
                expected,
                received,
                "DCC transfer larger than announced"
            );
            Ok(())
        }
        Some(expected) => Err(TransferError::Incomplete { expected, received }.into()),
        // No announced size: nothing to verify against
        None => {
            tracing::info!(file = %name, received, "DCC transfer complete (size unknown)");
            Ok(())
        }
    }
}
