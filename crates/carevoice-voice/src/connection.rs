//! WebSocket connection to the upstream voice service.

use crate::command::UpstreamCommand;
use crate::config::VoiceLiveConfig;
use crate::error::VoiceError;
use crate::event::UpstreamMessage;
use crate::sequencer::CommandSink;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type UpstreamStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Source of upstream events for a session loop.
pub trait EventSource {
    /// Returns `None` once the source is exhausted. Must be cancel-safe.
    fn next_event(
        &mut self,
    ) -> impl Future<Output = Option<Result<UpstreamMessage, VoiceError>>> + Send;
}

impl EventSource for mpsc::UnboundedReceiver<Result<UpstreamMessage, VoiceError>> {
    async fn next_event(&mut self) -> Option<Result<UpstreamMessage, VoiceError>> {
        self.recv().await
    }
}

/// Write half of the upstream connection.
pub struct UpstreamWriter {
    sink: SplitSink<UpstreamStream, Message>,
}

/// Read half of the upstream connection.
pub struct UpstreamReader {
    stream: SplitStream<UpstreamStream>,
}

/// Opens the realtime WebSocket.
///
/// Sends the `api-key` header and a fresh `x-ms-client-request-id`.
///
/// # Errors
///
/// Returns `VoiceError::Config` if credentials are missing or the endpoint
/// is unusable, and `VoiceError::Connect` if the handshake fails or times
/// out.
pub async fn connect(
    config: &VoiceLiveConfig,
) -> Result<(UpstreamWriter, UpstreamReader), VoiceError> {
    config.validate()?;
    let url = config.realtime_url()?;

    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| VoiceError::Config(format!("invalid realtime URL: {e}")))?;
    let request_id = uuid::Uuid::new_v4().to_string();
    let headers = request.headers_mut();
    headers.insert(
        "api-key",
        HeaderValue::from_str(&config.api_key)
            .map_err(|_| VoiceError::Config("api key is not a valid header value".to_string()))?,
    );
    headers.insert(
        "x-ms-client-request-id",
        HeaderValue::from_str(&request_id)
            .map_err(|e| VoiceError::Config(e.to_string()))?,
    );

    let limit = Duration::from_secs(config.connect_timeout_secs);
    let (stream, _response) = timeout(limit, connect_async(request))
        .await
        .map_err(|_| {
            VoiceError::Connect(format!(
                "timed out after {} seconds",
                config.connect_timeout_secs
            ))
        })?
        .map_err(|e| VoiceError::Connect(e.to_string()))?;

    tracing::info!(request_id = %request_id, model = %config.model, "connected to Voice Live API");

    let (sink, stream) = stream.split();
    Ok((UpstreamWriter { sink }, UpstreamReader { stream }))
}

impl UpstreamWriter {
    /// Sends a close frame. Errors are ignored; the peer may already be gone.
    pub async fn close(&mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
        let _ = self.sink.close().await;
    }
}

impl CommandSink for UpstreamWriter {
    async fn send(&mut self, command: &UpstreamCommand) -> Result<(), VoiceError> {
        let text = command.to_json()?;
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| VoiceError::Send(e.to_string()))
    }
}

impl EventSource for UpstreamReader {
    /// Waits for the next upstream event.
    ///
    /// Control and binary frames are skipped. Returns `None` once the
    /// connection is closed or fails. A malformed frame yields
    /// `Some(Err(..))` and the reader stays usable.
    async fn next_event(&mut self) -> Option<Result<UpstreamMessage, VoiceError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(UpstreamMessage::parse(text.as_str())),
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "upstream sent close frame");
                    return None;
                }
                Ok(Message::Binary(data)) => {
                    tracing::debug!(bytes = data.len(), "ignoring binary upstream frame");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("upstream connection error: {}", e);
                    return None;
                }
            }
        }
    }
}
