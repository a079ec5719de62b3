//! HTTP transport: attaches to a camera's event stream and pumps raw
//! bytes to the worker.
//!
//! Each connection is one long-poll GET that the camera holds open
//! indefinitely. Liveness relies on TCP keepalive, not read timeouts.
//! reqwest consumes the HTTP status line before handing us the body, so
//! a successful attach re-emits an equivalent status line as the first
//! chunk; the line parser stays the single place that recognizes a
//! connection as live.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::{Client, Response, StatusCode, Version, header};
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::CameraConfig;
use crate::digest::DigestChallenge;
use crate::error::{Error, Result};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const TCP_KEEPALIVE_IDLE: Duration = Duration::from_secs(30);
pub const TCP_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Raw transport notifications, tagged with the reader's generation so
/// the worker can discard output from a replaced reader.
#[derive(Debug)]
pub enum TransportEvent {
    Chunk {
        camera: String,
        generation: u64,
        bytes: Bytes,
    },
    Closed {
        camera: String,
        generation: u64,
        reason: String,
    },
}

/// Builds the shared HTTP client. No total request timeout: the event
/// stream is expected to stay open forever.
pub fn build_client() -> Result<Client> {
    let client = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .tcp_keepalive(TCP_KEEPALIVE_IDLE)
        .tcp_keepalive_interval(TCP_KEEPALIVE_INTERVAL)
        .build()?;
    Ok(client)
}

/// Performs the attach request, answering one Digest challenge.
///
/// A second 401 after our response means the credentials are wrong and
/// maps to [`Error::AuthRejected`] rather than a retry loop against a
/// camera that will never accept them any faster.
pub async fn attach(client: &Client, camera: &CameraConfig) -> Result<Response> {
    let url = camera.attach_url();
    let response = client.get(&url).send().await?;
    if response.status() != StatusCode::UNAUTHORIZED {
        return finalize(response);
    }

    let challenge = {
        let header_value = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| Error::DigestAuth("401 without WWW-Authenticate header".into()))?;
        DigestChallenge::parse(header_value)?
    };

    let uri = request_uri(&url)?;
    let authorization = challenge.answer(&camera.username, &camera.password, "GET", &uri);
    let response = client
        .get(&url)
        .header(header::AUTHORIZATION, authorization)
        .send()
        .await?;
    if response.status() == StatusCode::UNAUTHORIZED {
        return Err(Error::AuthRejected);
    }
    finalize(response)
}

fn finalize(response: Response) -> Result<Response> {
    let status = response.status();
    if status != StatusCode::OK {
        return Err(Error::UnexpectedStatus(status.as_u16()));
    }
    Ok(response)
}

/// The request-target as sent on the wire (path plus raw query), which
/// is what the Digest `uri` parameter must hash over.
fn request_uri(url: &str) -> Result<String> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| Error::Config(format!("invalid camera url {url}: {e}")))?;
    let mut uri = parsed.path().to_string();
    if let Some(query) = parsed.query() {
        uri.push('?');
        uri.push_str(query);
    }
    Ok(uri)
}

fn format_status_line(version: Version, status: StatusCode) -> String {
    let proto = match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2",
        _ => "HTTP/1.1",
    };
    match status.canonical_reason() {
        Some(reason) => format!("{proto} {} {reason}\r\n", status.as_str()),
        None => format!("{proto} {}\r\n", status.as_str()),
    }
}

fn chunk(camera: &CameraConfig, generation: u64, bytes: Bytes) -> TransportEvent {
    TransportEvent::Chunk {
        camera: camera.name.clone(),
        generation,
        bytes,
    }
}

/// Runs one attach-and-stream cycle, then reports `Closed` with the
/// reason. The worker decides whether and when to respawn.
pub async fn run_reader(
    client: Client,
    camera: Arc<CameraConfig>,
    generation: u64,
    tx: mpsc::Sender<TransportEvent>,
) {
    let reason = match pump(&client, &camera, generation, &tx).await {
        Ok(()) => "stream ended".to_string(),
        Err(err) => err.to_string(),
    };
    let _ = tx
        .send(TransportEvent::Closed {
            camera: camera.name.clone(),
            generation,
            reason,
        })
        .await;
}

async fn pump(
    client: &Client,
    camera: &CameraConfig,
    generation: u64,
    tx: &mpsc::Sender<TransportEvent>,
) -> Result<()> {
    let response = attach(client, camera).await?;
    debug!(
        camera = %camera.name,
        status = %response.status(),
        "Attached to event stream"
    );

    let status_line = format_status_line(response.version(), response.status());
    if tx
        .send(chunk(camera, generation, Bytes::from(status_line)))
        .await
        .is_err()
    {
        // Worker gone; we are shutting down.
        return Ok(());
    }

    let mut stream = response.bytes_stream();
    while let Some(piece) = stream.next().await {
        let bytes = piece?;
        if tx.send(chunk(camera, generation, bytes)).await.is_err() {
            return Ok(());
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
