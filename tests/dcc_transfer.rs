//! End-to-end IRC/DCC transfers against a scripted localhost IRC server:
//! registration, nickname collision handling, CTCP offer matching, and the
//! raw byte-stream receipt.

use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use xdcc_dl::config::{DownloadConfig, IrcConfig, NetworkConfig};
use xdcc_dl::{Config, DownloadManager, Event, State, TransferOptions};

/// Minimal scripted IRC server: registers the client (optionally bouncing its
/// first nickname), and answers any PRIVMSG with a DCC SEND offer served from
/// a one-shot data listener on 127.0.0.1.
async fn run_fake_network(listener: TcpListener, payload: Vec<u8>, collide_first_nick: bool) {
    let (stream, _) = listener.accept().await.unwrap();
    let (read_half, mut writer) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let mut nick = String::new();
    let mut collided = false;

    while let Ok(Some(line)) = lines.next_line().await {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("NICK") => {
                let proposed = parts.next().unwrap_or_default().to_string();
                if collide_first_nick && !collided {
                    collided = true;
                    writer
                        .write_all(
                            format!(":server 433 * {proposed} :Nickname is already in use\r\n")
                                .as_bytes(),
                        )
                        .await
                        .unwrap();
                } else {
                    nick = proposed;
                    writer
                        .write_all(format!(":server 001 {nick} :Welcome\r\n").as_bytes())
                        .await
                        .unwrap();
                }
            }
            Some("PING") => {
                writer.write_all(b"PONG :ok\r\n").await.unwrap();
            }
            Some("PRIVMSG") => {
                let data_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                let port = data_listener.local_addr().unwrap().port();
                let spawn_payload = payload.clone();
                tokio::spawn(async move {
                    let (mut socket, _) = data_listener.accept().await.unwrap();
                    socket.write_all(&spawn_payload).await.unwrap();
                    socket.shutdown().await.ok();
                    // Drain DCC acks until the receiver hangs up
                    let mut ack = [0u8; 64];
                    while matches!(socket.read(&mut ack).await, Ok(n) if n > 0) {}
                });
                // 2130706433 = 127.0.0.1 packed big-endian
                let offer = format!(
                    ":peer!p@h PRIVMSG {nick} :\u{1}DCC SEND file.bin 2130706433 {port} {len}\u{1}\r\n",
                    len = payload.len()
                );
                writer.write_all(offer.as_bytes()).await.unwrap();
            }
            Some("QUIT") => break,
            _ => {}
        }
    }
}

/// Bind the scripted server's listener and build a matching config. The
/// caller spawns `run_fake_network` when it is ready to observe events; a
/// bound listener queues the client's connection in the meantime.
async fn irc_setup(dir: &std::path::Path) -> (Config, TcpListener) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut networks = HashMap::new();
    networks.insert(
        "testnet".to_string(),
        NetworkConfig {
            host: "127.0.0.1".to_string(),
            port,
            nickname: None,
            channels: vec!["packs".to_string()],
        },
    );
    let config = Config {
        download: DownloadConfig {
            download_dir: dir.join("downloads"),
        },
        modules: xdcc_dl::config::ModulesConfig {
            irc: Some(IrcConfig {
                nickname: "leecher".to_string(),
                networks,
            }),
            ..Default::default()
        },
        ..Default::default()
    };
    (config, listener)
}

#[tokio::test]
async fn dcc_offer_is_matched_and_the_stream_is_received() {
    let dir = tempfile::tempdir().unwrap();
    let payload = vec![0xABu8; 50_000];
    let (config, listener) = irc_setup(dir.path()).await;
    tokio::spawn(run_fake_network(listener, payload.clone(), false));

    let manager = DownloadManager::new(config).await.unwrap();
    let transfer = manager
        .transfer(
            "irc:irc://testnet/peer/xdcc%20send%20%231",
            TransferOptions::default(),
        )
        .unwrap();

    let completion = transfer.download().await.unwrap();
    tokio::time::timeout(Duration::from_secs(10), completion.wait())
        .await
        .expect("transfer timed out")
        .unwrap();

    assert_eq!(transfer.state(), State::Finished);
    assert_eq!(transfer.received(), 50_000);
    assert_eq!(transfer.size(), Some(50_000));
    // The offer's announced filename names the destination
    assert_eq!(transfer.name(), "file.bin");
    let written = std::fs::read(dir.path().join("downloads").join("file.bin")).unwrap();
    assert_eq!(written, payload);

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn nickname_collision_appends_the_marker_and_registration_proceeds() {
    let dir = tempfile::tempdir().unwrap();
    let payload = vec![7u8; 1024];
    let (config, listener) = irc_setup(dir.path()).await;

    let manager = DownloadManager::new(config).await.unwrap();
    let mut events = manager.subscribe();
    // Only start the server once the subscription exists, so the
    // registration event cannot slip past it
    tokio::spawn(run_fake_network(listener, payload, true));

    let nickname = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Ok(Event::IrcConnected { nickname, .. }) = events.recv().await {
                break nickname;
            }
        }
    })
    .await
    .expect("registration timed out");
    assert_eq!(nickname, "leecher^");

    // The altered nickname still receives offers addressed to it
    let transfer = manager
        .transfer("irc:irc://testnet/peer/send", TransferOptions::default())
        .unwrap();
    let completion = transfer.download().await.unwrap();
    tokio::time::timeout(Duration::from_secs(10), completion.wait())
        .await
        .expect("transfer timed out")
        .unwrap();
    assert_eq!(transfer.received(), 1024);

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn network_lookup_by_host_works_in_locators() {
    let dir = tempfile::tempdir().unwrap();
    let payload = vec![1u8; 256];
    let (config, listener) = irc_setup(dir.path()).await;
    tokio::spawn(run_fake_network(listener, payload, false));

    let manager = DownloadManager::new(config).await.unwrap();
    let transfer = manager
        .transfer("irc:irc://127.0.0.1/peer/send", TransferOptions::default())
        .unwrap();

    let completion = transfer.download().await.unwrap();
    tokio::time::timeout(Duration::from_secs(10), completion.wait())
        .await
        .expect("transfer timed out")
        .unwrap();
    assert_eq!(transfer.received(), 256);

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn unknown_network_rejects_without_touching_the_wire() {
    let dir = tempfile::tempdir().unwrap();
    let (config, listener) = irc_setup(dir.path()).await;
    tokio::spawn(run_fake_network(listener, vec![], false));

    let manager = DownloadManager::new(config).await.unwrap();
    let transfer = manager
        .transfer("irc:irc://elsewhere/peer/send", TransferOptions::default())
        .unwrap();

    let err = transfer
        .download()
        .await
        .unwrap()
        .wait()
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no irc connection found"));
    assert_eq!(transfer.state(), State::Error);

    manager.shutdown().await.unwrap();
}
