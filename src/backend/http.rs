//! Plain HTTP(S) backend
//!
//! Streams a response body into the transfer's sink. The expected size is
//! taken from `Content-Length` before any body bytes arrive; partial-content
//! responses are rejected outright — resuming is explicitly unsupported.

use super::Backend;
use crate::completion::Completion;
use crate::config::HttpConfig;
use crate::error::{Error, Result, TransferError};
use crate::transfer::Transfer;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;

/// Backend for `http` and `https` locators
#[derive(Debug)]
pub struct HttpBackend {
    client: reqwest::Client,
}

impl HttpBackend {
    /// Build an HTTP backend from its module configuration
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder.build()?;
        Ok(Self { client })
    }

    async fn run(client: reqwest::Client, transfer: Arc<Transfer>) -> Result<()> {
        let url = url::Url::parse(transfer.locator()).map_err(|e| {
            Error::Transfer(TransferError::InvalidLocator {
                locator: transfer.locator().to_string(),
                reason: e.to_string(),
            })
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransferError::InvalidLocator {
                locator: transfer.locator().to_string(),
                reason: format!("unknown scheme {}", url.scheme()),
            }
            .into());
        }

        tracing::info!(url = %url, "HTTP download");
        let response = client.get(url).send().await?;

        // Resuming is unsupported: refuse a partial body before any sink byte
        if response.status() == reqwest::StatusCode::PARTIAL_CONTENT
            || response.headers().contains_key(reqwest::header::CONTENT_RANGE)
        {
            return Err(TransferError::Unsupported("partial download not supported".into()).into());
        }
        if !response.status().is_success() {
            return Err(TransferError::Transport(format!(
                "HTTP status {}",
                response.status()
            ))
            .into());
        }

        if let Some(length) = response.content_length() {
            tracing::debug!(content_length = length, "expected size from headers");
            transfer.set_size(length);
        }

        transfer.open().await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            transfer.write(&chunk).await?;
        }
        transfer.close().await?;
        Ok(())
    }
}

#[async_trait]
impl Backend for HttpBackend {
    fn schemes(&self) -> &[&str] {
        &["http", "https"]
    }

    async fn begin(&self, transfer: Arc<Transfer>) -> Completion {
        let (resolver, completion) = Completion::channel();
        let client = self.client.clone();

        tokio::spawn(async move {
            let result = Self::run(client, transfer.clone()).await;
            if result.is_err() {
                // release a half-written sink; the record is terminal either way
                transfer.close().await.ok();
            }
            resolver.finish(result);
        });

        completion
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{new_transfer, recording_events};
    use crate::types::{State, TransferOptions};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve(mock: Mock) -> MockServer {
        let server = MockServer::start().await;
        mock.mount(&server).await;
        server
    }

    #[tokio::test]
    async fn content_length_sets_expected_size_before_body() {
        let server = serve(
            Mock::given(method("GET"))
                .and(path("/file.bin"))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 2048])),
        )
        .await;

        let dir = tempfile::tempdir().unwrap();
        let (events, _rx) = recording_events();
        let backend = HttpBackend::new(&HttpConfig::default()).unwrap();
        let transfer = new_transfer(
            "http",
            &format!("{}/file.bin", server.uri()),
            dir.path(),
            TransferOptions {
                name: Some("file.bin".into()),
                ..Default::default()
            },
            events,
        );

        backend.begin(transfer.clone()).await.wait().await.unwrap();

        assert_eq!(transfer.size(), Some(2048));
        assert_eq!(transfer.received(), 2048);
        assert_eq!(transfer.state(), State::Downloading); // terminal state is set by download()
        let written = std::fs::read(dir.path().join("file.bin")).unwrap();
        assert_eq!(written.len(), 2048);
    }

    #[tokio::test]
    async fn partial_content_is_rejected_before_any_sink_byte() {
        let server = serve(
            Mock::given(method("GET")).and(path("/part.bin")).respond_with(
                ResponseTemplate::new(206)
                    .insert_header("Content-Range", "bytes 0-99/1000")
                    .set_body_bytes(vec![1u8; 100]),
            ),
        )
        .await;

        let dir = tempfile::tempdir().unwrap();
        let (events, _rx) = recording_events();
        let backend = HttpBackend::new(&HttpConfig::default()).unwrap();
        let transfer = new_transfer(
            "http",
            &format!("{}/part.bin", server.uri()),
            dir.path(),
            TransferOptions {
                name: Some("part.bin".into()),
                ..Default::default()
            },
            events,
        );

        let err = backend
            .begin(transfer.clone())
            .await
            .wait()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("partial download not supported"));
        assert_eq!(transfer.received(), 0, "no byte may reach the sink");
        assert!(
            !dir.path().join("part.bin").exists(),
            "sink must not have been opened"
        );
    }

    #[tokio::test]
    async fn content_range_header_alone_is_rejected() {
        let server = serve(
            Mock::given(method("GET")).and(path("/sneaky.bin")).respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Range", "bytes 0-99/1000")
                    .set_body_bytes(vec![1u8; 100]),
            ),
        )
        .await;

        let dir = tempfile::tempdir().unwrap();
        let (events, _rx) = recording_events();
        let backend = HttpBackend::new(&HttpConfig::default()).unwrap();
        let transfer = new_transfer(
            "http",
            &format!("{}/sneaky.bin", server.uri()),
            dir.path(),
            TransferOptions::default(),
            events,
        );

        assert!(backend.begin(transfer).await.wait().await.is_err());
    }

    #[tokio::test]
    async fn error_status_rejects_with_transport_error() {
        let server = serve(
            Mock::given(method("GET"))
                .and(path("/missing"))
                .respond_with(ResponseTemplate::new(404)),
        )
        .await;

        let dir = tempfile::tempdir().unwrap();
        let (events, _rx) = recording_events();
        let backend = HttpBackend::new(&HttpConfig::default()).unwrap();
        let transfer = new_transfer(
            "http",
            &format!("{}/missing", server.uri()),
            dir.path(),
            TransferOptions::default(),
            events,
        );

        let err = backend.begin(transfer).await.wait().await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn refused_connection_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let (events, _rx) = recording_events();
        let backend = HttpBackend::new(&HttpConfig::default()).unwrap();
        // Port 1 on localhost is essentially never listening
        let transfer = new_transfer(
            "http",
            "http://127.0.0.1:1/nope",
            dir.path(),
            TransferOptions::default(),
            events,
        );

        assert!(backend.begin(transfer).await.wait().await.is_err());
    }
}
