// LEAP channel client
//
// Wraps any byte stream (TLS in production, an in-memory duplex in tests)
// in a line codec. Requests are tagged with a `ClientTag`; the bridge echoes
// it on the matching response, and anything else arriving in between
// (unsolicited status events) is skipped.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rustls::ClientConfig;
use rustls_pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, trace};

use super::messages::{
    Communique, DeviceDefinition, FanSpeed, MultipleDeviceDefinition, OnePingResponse,
    OneZoneStatus, ZoneStatus, go_to_fan_speed_command, go_to_level_command,
};
use crate::error::Error;

/// Upper bound on a single LEAP line. A full `/device` listing for a large
/// home stays well below this.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Any duplex byte stream the client can run over.
pub trait LeapStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> LeapStream for T {}

/// A single LEAP channel to a bridge.
pub struct LeapClient {
    framed: Framed<Box<dyn LeapStream>, LinesCodec>,
    next_tag: u64,
    timeout: Duration,
}

impl std::fmt::Debug for LeapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeapClient")
            .field("next_tag", &self.next_tag)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl LeapClient {
    /// Open a TCP connection to `host:port` and complete the TLS handshake.
    ///
    /// `timeout` bounds the TCP connect and the handshake separately, and
    /// becomes the default per-request timeout.
    pub async fn connect(
        host: &str,
        port: u16,
        tls: Arc<ClientConfig>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let addr = format!("{host}:{port}");
        let timeout_secs = timeout.as_secs();

        let tcp = tokio::time::timeout(timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::Timeout { timeout_secs })?
            .map_err(|source| Error::Connect {
                addr: addr.clone(),
                source,
            })?;
        tcp.set_nodelay(true)?;

        let server_name =
            ServerName::try_from(host.to_owned()).map_err(|e| Error::Tls(e.to_string()))?;
        let stream = tokio::time::timeout(timeout, TlsConnector::from(tls).connect(server_name, tcp))
            .await
            .map_err(|_| Error::Timeout { timeout_secs })?
            .map_err(|e| Error::Tls(e.to_string()))?;

        debug!(%addr, "LEAP channel established");
        Ok(Self::from_stream(stream, timeout))
    }

    /// Run the client over an already-established stream.
    pub fn from_stream<S: LeapStream + 'static>(stream: S, timeout: Duration) -> Self {
        let stream: Box<dyn LeapStream> = Box::new(stream);
        Self {
            framed: Framed::new(stream, LinesCodec::new_with_max_length(MAX_FRAME_LEN)),
            next_tag: 0,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    // ── Raw framing ─────────────────────────────────────────────────

    /// Write one message as a single line.
    pub async fn send(&mut self, message: &Communique) -> Result<(), Error> {
        let line = serde_json::to_string(message).map_err(std::io::Error::from)?;
        trace!(%line, "LEAP send");
        self.framed.send(line).await.map_err(codec_error)
    }

    /// Read the next message. Blank keep-alive lines are skipped.
    ///
    /// Not bounded by the request timeout: callers waiting for unsolicited
    /// events apply their own deadline.
    pub async fn recv(&mut self) -> Result<Communique, Error> {
        loop {
            let line = match self.framed.next().await {
                Some(Ok(line)) => line,
                Some(Err(e)) => return Err(codec_error(e)),
                None => return Err(Error::ConnectionClosed),
            };
            if line.trim().is_empty() {
                continue;
            }
            trace!(%line, "LEAP recv");
            return serde_json::from_str(&line).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: line,
            });
        }
    }

    /// Send a tagged request and wait for the response carrying the same tag.
    ///
    /// Non-2xx responses become [`Error::Status`].
    pub async fn request(&mut self, mut message: Communique) -> Result<Communique, Error> {
        self.next_tag += 1;
        let tag = format!("caseta-{}", self.next_tag);
        message.header.client_tag = Some(tag.clone());
        let timeout = self.timeout;

        tokio::time::timeout(timeout, async {
            self.send(&message).await?;
            loop {
                let response = self.recv().await?;
                if response.client_tag() == Some(tag.as_str()) {
                    response.ensure_success()?;
                    return Ok::<_, Error>(response);
                }
                trace!(url = response.url(), "skipping unsolicited LEAP message");
            }
        })
        .await
        .map_err(|_| Error::Timeout {
            timeout_secs: timeout.as_secs(),
        })?
    }

    // ── Typed requests ──────────────────────────────────────────────

    /// Ping the bridge and return the LEAP version it reports.
    pub async fn ping(&mut self) -> Result<String, Error> {
        let response = self
            .request(Communique::read("/server/1/status/ping"))
            .await?;
        let body: OnePingResponse = response.parse_body()?;
        Ok(body.ping_response.leap_version.to_string())
    }

    /// Read every device the bridge knows about.
    pub async fn list_devices(&mut self) -> Result<Vec<DeviceDefinition>, Error> {
        let response = self.request(Communique::read("/device")).await?;
        let body: MultipleDeviceDefinition = response.parse_body()?;
        debug!(count = body.devices.len(), "device listing received");
        Ok(body.devices)
    }

    pub async fn zone_status(&mut self, zone_id: &str) -> Result<ZoneStatus, Error> {
        let response = self
            .request(Communique::read(format!("/zone/{zone_id}/status")))
            .await?;
        let body: OneZoneStatus = response.parse_body()?;
        Ok(body.zone_status)
    }

    pub async fn go_to_level(&mut self, zone_id: &str, level: u8) -> Result<(), Error> {
        self.request(Communique::create(
            format!("/zone/{zone_id}/commandprocessor"),
            go_to_level_command(level),
        ))
        .await?;
        Ok(())
    }

    pub async fn go_to_fan_speed(&mut self, zone_id: &str, speed: FanSpeed) -> Result<(), Error> {
        self.request(Communique::create(
            format!("/zone/{zone_id}/commandprocessor"),
            go_to_fan_speed_command(speed),
        ))
        .await?;
        Ok(())
    }

    /// Shut down the write half. The bridge closes its side in response.
    pub async fn close(mut self) -> Result<(), Error> {
        self.framed.get_mut().shutdown().await?;
        Ok(())
    }
}

fn codec_error(e: LinesCodecError) -> Error {
    match e {
        LinesCodecError::MaxLineLengthExceeded => Error::FrameTooLarge { max: MAX_FRAME_LEN },
        LinesCodecError::Io(e) => Error::Io(e),
    }
}
