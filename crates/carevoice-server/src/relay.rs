//! Per-connection session relay between a client socket and the upstream
//! voice service.
//!
//! A [`Session`] owns everything one conversation needs: the upstream command
//! sink, the client sink, a [`Sequencer`] and a [`CardDeferral`]. [`run`]
//! drives it from a single task, so none of that state is shared or locked.

use axum::extract::ws::{Message, WebSocket};
use base64::Engine;
use carevoice_agents::{OrchestrationResult, Orchestrator};
use carevoice_observe::{FlowEvent, FlowLogger};
use carevoice_types::{Card, ClientFrame, ClientInbound, ClientTransport, ControlMessage, MediaEnvelope};
use carevoice_voice::{
    CardDeferral, CardPolicy, CommandSink, EventSource, ReleasePath, Sequencer, SequencerEvent,
    SessionSettings, UpstreamCommand, UpstreamEvent, UpstreamMessage, VoiceError,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, Stream, StreamExt};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

pub const READY_TEXT: &str =
    "Voice Multi-Agent Assistant is ready! You can speak or send text messages.";
pub const PONG_TEXT: &str = "CareVoice is alive";
pub const APOLOGY_TEXT: &str =
    "I apologize, but I'm having trouble processing your request right now. Please try again.";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("client send failed: {0}")]
    ClientSend(String),

    #[error(transparent)]
    Voice(#[from] VoiceError),
}

/// Destination for frames bound to the client.
pub trait ClientSink {
    fn send_frame(&mut self, frame: ClientFrame)
        -> impl Future<Output = Result<(), RelayError>> + Send;
}

impl ClientSink for SplitSink<WebSocket, Message> {
    async fn send_frame(&mut self, frame: ClientFrame) -> Result<(), RelayError> {
        let message = match frame {
            ClientFrame::Text(text) => Message::Text(text.into()),
            ClientFrame::Binary(bytes) => Message::Binary(bytes.into()),
        };
        self.send(message)
            .await
            .map_err(|e| RelayError::ClientSend(e.to_string()))
    }
}

impl ClientSink for mpsc::UnboundedSender<ClientFrame> {
    async fn send_frame(&mut self, frame: ClientFrame) -> Result<(), RelayError> {
        self.send(frame)
            .map_err(|_| RelayError::ClientSend("client channel closed".to_string()))
    }
}

/// Input read from the client socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientInput {
    Text(String),
    Audio(Vec<u8>),
    Closed,
}

/// Why [`run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    ClientClosed,
    UpstreamClosed,
}

impl EndReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientClosed => "client_closed",
            Self::UpstreamClosed => "upstream_closed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub transport: ClientTransport,
    pub min_transcript_chars: usize,
    pub greet_on_connect: bool,
    pub card_policy: CardPolicy,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            transport: ClientTransport::Raw,
            min_transcript_chars: 3,
            greet_on_connect: true,
            card_policy: CardPolicy::default(),
        }
    }
}

/// State of one voice conversation.
pub struct Session<U, C> {
    id: Uuid,
    upstream: U,
    client: C,
    sequencer: Sequencer,
    cards: CardDeferral,
    orchestrator: Option<Arc<dyn Orchestrator>>,
    settings: RelaySettings,
    flow: FlowLogger,
}

impl<U, C> Session<U, C>
where
    U: CommandSink + Send,
    C: ClientSink + Send,
{
    pub fn new(
        upstream: U,
        client: C,
        orchestrator: Option<Arc<dyn Orchestrator>>,
        settings: RelaySettings,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            upstream,
            client,
            sequencer: Sequencer::new(),
            cards: CardDeferral::new(settings.card_policy),
            orchestrator,
            settings,
            flow: FlowLogger::new(id.to_string()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn cards(&self) -> &CardDeferral {
        &self.cards
    }

    /// Hands back the upstream and client sinks.
    pub fn into_parts(self) -> (U, C) {
        (self.upstream, self.client)
    }

    /// Configures the upstream session, requests the greeting and tells the
    /// client it can start talking.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Voice` if `session.update` cannot be sent. A
    /// failed greeting is only logged.
    pub async fn start(&mut self, session: &SessionSettings) -> Result<(), RelayError> {
        if let Err(e) = self
            .upstream
            .send(&UpstreamCommand::session_update(session))
            .await
        {
            self.send_json(&ControlMessage::error(format!("Voice Live API error: {e}")))
                .await;
            return Err(e.into());
        }
        if self.settings.greet_on_connect {
            if let Err(e) = self.sequencer.begin_untracked(&mut self.upstream).await {
                tracing::warn!(session_id = %self.id, "failed to request greeting: {}", e);
            }
        }
        self.send_json(&ControlMessage::ready(READY_TEXT)).await;
        self.emit(FlowEvent::ConversationStarted {
            transport: self.settings.transport.as_str().to_string(),
        });
        Ok(())
    }

    /// Reacts to one upstream event.
    pub async fn handle_upstream(&mut self, message: UpstreamMessage) {
        match message.event {
            UpstreamEvent::SessionCreated { session } => {
                tracing::info!(
                    session_id = %self.id,
                    upstream_session = session.id.as_deref().unwrap_or("<unknown>"),
                    "upstream session created"
                );
                self.emit(FlowEvent::VoiceApiEvent {
                    event_type: message.event_type,
                    detail: session.id,
                });
            }
            UpstreamEvent::InputAudioBufferCleared => {
                tracing::debug!(session_id = %self.id, "input audio buffer cleared");
            }
            UpstreamEvent::SpeechStarted { audio_start_ms } => {
                tracing::debug!(session_id = %self.id, ?audio_start_ms, "speech started, stopping playback");
                self.send_json(&MediaEnvelope::stop_audio()).await;
            }
            UpstreamEvent::SpeechStopped { audio_end_ms } => {
                tracing::debug!(session_id = %self.id, ?audio_end_ms, "speech stopped");
            }
            UpstreamEvent::TranscriptionCompleted { transcript } => {
                tracing::info!(session_id = %self.id, transcript = %transcript, "user transcript");
                self.emit(FlowEvent::VoiceApiEvent {
                    event_type: message.event_type,
                    detail: None,
                });
                self.handle_transcript(&transcript).await;
            }
            UpstreamEvent::TranscriptionFailed { error } => {
                tracing::warn!(session_id = %self.id, "transcription failed: {}", error);
            }
            UpstreamEvent::ResponseDone { response } => {
                tracing::debug!(
                    session_id = %self.id,
                    response_id = response.id.as_deref().unwrap_or("<unknown>"),
                    status = response.status.as_deref().unwrap_or("<unknown>"),
                    "response done"
                );
                let events = self.sequencer.complete(&mut self.upstream).await;
                self.apply_events(events).await;
            }
            UpstreamEvent::AudioTranscriptDone { transcript } => {
                self.send_json(&MediaEnvelope::transcription(transcript)).await;
            }
            UpstreamEvent::AudioDelta { delta } => self.forward_audio(delta).await,
            UpstreamEvent::Error { error } => {
                tracing::error!(session_id = %self.id, "Voice Live API error: {}", error);
                self.emit(FlowEvent::ErrorOccurred {
                    context: "upstream".to_string(),
                    message: error.to_string(),
                });
            }
            UpstreamEvent::Unknown => {
                tracing::debug!(session_id = %self.id, event_type = %message.event_type, "unhandled upstream event");
            }
        }
    }

    /// Handles a JSON text frame from the client.
    pub async fn handle_client_text(&mut self, raw: &str) {
        match serde_json::from_str::<ClientInbound>(raw) {
            Ok(ClientInbound::Text { text }) => self.handle_transcript(&text).await,
            Ok(ClientInbound::Ping) => self.send_json(&ControlMessage::pong(PONG_TEXT)).await,
            Ok(ClientInbound::Unknown) => {
                tracing::debug!(session_id = %self.id, "ignoring client message of unknown type");
            }
            Err(e) => {
                tracing::warn!(session_id = %self.id, "invalid client message: {}", e);
                self.send_json(&ControlMessage::error("Invalid message format"))
                    .await;
            }
        }
    }

    /// Forwards a chunk of client microphone audio upstream.
    pub async fn handle_client_audio(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        if let Err(e) = self
            .upstream
            .send(&UpstreamCommand::append_audio(encoded))
            .await
        {
            tracing::warn!(session_id = %self.id, "failed to forward client audio: {}", e);
        }
    }

    /// Routes a finished user utterance, spoken or typed.
    pub async fn handle_transcript(&mut self, transcript: &str) {
        let text = transcript.trim();
        if text.chars().count() < self.settings.min_transcript_chars {
            tracing::debug!(session_id = %self.id, "transcript too short, skipping");
            return;
        }
        self.emit(FlowEvent::user_message(text));

        let Some(orchestrator) = self.orchestrator.clone() else {
            let outcome = self.sequencer.enqueue(text, &mut self.upstream).await;
            self.apply_events(outcome.events).await;
            return;
        };

        self.emit(FlowEvent::AgentProcessing {
            agent: orchestrator.name().to_string(),
            action: "orchestrate".to_string(),
        });
        match orchestrator.orchestrate(text) {
            Ok(result) => self.deliver_reply(orchestrator.name(), result).await,
            Err(e) => {
                tracing::error!(session_id = %self.id, "orchestration failed: {}", e);
                self.emit(FlowEvent::ErrorOccurred {
                    context: "orchestration".to_string(),
                    message: e.to_string(),
                });
                let outcome = self.sequencer.enqueue(APOLOGY_TEXT, &mut self.upstream).await;
                self.apply_events(outcome.events).await;
                self.send_json(&ControlMessage::error(format!("Orchestration error: {e}")))
                    .await;
            }
        }
    }

    /// Releases pending cards whose deadline passed.
    pub async fn expire_cards(&mut self) {
        for released in self.cards.expire(Instant::now()) {
            self.deliver_card(released.card, released.path).await;
        }
    }

    /// Logs the end of the conversation and drops queued work.
    pub fn finish(&mut self, reason: EndReason) {
        let dropped = self.cards.clear();
        if !dropped.is_empty() {
            tracing::debug!(session_id = %self.id, count = dropped.len(), "dropping undelivered cards");
        }
        self.sequencer.reset();
        self.emit(FlowEvent::ConversationEnded {
            reason: reason.as_str().to_string(),
        });
    }

    async fn deliver_reply(&mut self, orchestrator: &str, result: OrchestrationResult) {
        self.emit(FlowEvent::AgentResponse {
            agent: result
                .responding_agent()
                .unwrap_or(orchestrator)
                .to_string(),
            response_length: result.spoken.chars().count(),
            has_card: result.card.is_some(),
        });

        let outcome = self.sequencer.enqueue(&result.spoken, &mut self.upstream).await;
        if outcome.ticket.is_some() {
            self.send_json(&ControlMessage::ai_response(result.spoken.as_str()))
                .await;
        }
        self.apply_events(outcome.events).await;

        let Some(card) = result.card else {
            return;
        };
        match outcome.ticket {
            Some(ticket) => {
                let dispatched = self.sequencer.has_started(ticket);
                self.cards.schedule(card, ticket, dispatched, Instant::now());
            }
            None => self.deliver_card(card, ReleasePath::Immediate).await,
        }
    }

    async fn apply_events(&mut self, events: Vec<SequencerEvent>) {
        for event in events {
            if let SequencerEvent::Failed { ticket, error } = &event {
                self.emit(FlowEvent::ErrorOccurred {
                    context: "upstream_send".to_string(),
                    message: format!("response {ticket}: {error}"),
                });
            }
            for released in self.cards.observe(&event, Instant::now()) {
                self.deliver_card(released.card, released.path).await;
            }
        }
    }

    async fn forward_audio(&mut self, delta: String) {
        if !self.settings.transport.is_raw() {
            self.send_json(&MediaEnvelope::audio(delta)).await;
            return;
        }
        match base64::engine::general_purpose::STANDARD.decode(delta.as_bytes()) {
            Ok(pcm) => self.send_frame(ClientFrame::Binary(pcm)).await,
            Err(e) => {
                tracing::warn!(session_id = %self.id, "dropping undecodable audio delta: {}", e);
            }
        }
    }

    async fn deliver_card(&mut self, card: Card, path: ReleasePath) {
        let title = card.title().map(str::to_owned);
        tracing::info!(session_id = %self.id, %path, "delivering card");
        self.send_json(&ControlMessage::card(card)).await;
        self.emit(FlowEvent::CardDelivered {
            path: path.as_str().to_string(),
            title,
        });
    }

    async fn send_json<T: Serialize>(&mut self, message: &T) {
        match ClientFrame::json(message) {
            Ok(frame) => self.send_frame(frame).await,
            Err(e) => tracing::error!(session_id = %self.id, "failed to encode client message: {}", e),
        }
    }

    async fn send_frame(&mut self, frame: ClientFrame) {
        if let Err(e) = self.client.send_frame(frame).await {
            tracing::warn!(session_id = %self.id, "{}", e);
        }
    }

    fn emit(&self, event: FlowEvent) {
        if let Err(e) = self.flow.emit(&event) {
            tracing::warn!(session_id = %self.id, "failed to record flow event: {}", e);
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Drives `session` until either side goes away.
///
/// Each event is handled to completion before the next is read, so the
/// session never sees interleaved handlers. The session is handed back so the
/// caller can close the upstream connection.
pub async fn run<U, C, E, I>(
    mut session: Session<U, C>,
    mut events: E,
    mut inputs: I,
) -> (EndReason, Session<U, C>)
where
    U: CommandSink + Send,
    C: ClientSink + Send,
    E: EventSource + Send,
    I: Stream<Item = ClientInput> + Unpin + Send,
{
    let reason = loop {
        let deadline = session.cards.deadline();
        tokio::select! {
            event = events.next_event() => match event {
                Some(Ok(message)) => session.handle_upstream(message).await,
                Some(Err(e)) => {
                    tracing::warn!(session_id = %session.id, "ignoring upstream event: {}", e);
                }
                None => break EndReason::UpstreamClosed,
            },
            input = inputs.next() => match input {
                Some(ClientInput::Text(text)) => session.handle_client_text(&text).await,
                Some(ClientInput::Audio(bytes)) => session.handle_client_audio(&bytes).await,
                Some(ClientInput::Closed) | None => break EndReason::ClientClosed,
            },
            () = sleep_until_deadline(deadline) => session.expire_cards().await,
        }
    };

    tracing::info!(session_id = %session.id, reason = reason.as_str(), "session ended");
    session.finish(reason);
    (reason, session)
}
