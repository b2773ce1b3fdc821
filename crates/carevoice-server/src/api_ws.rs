//! WebSocket endpoints: the voice relay and the text-only fallback.

use crate::relay::{self, ClientInput, ClientSink, Session};
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, Extension, Query, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use carevoice_agents::Orchestrator;
use carevoice_observe::{FlowEvent, FlowLogger};
use carevoice_types::{ClientFrame, ClientInbound, ClientTransport, ControlMessage};
use carevoice_voice::VoiceError;
use futures_util::stream::SplitSink;
use futures_util::{future, SinkExt, StreamExt};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct VoiceConnectParams {
    /// `raw` (default) or `envelope`.
    pub transport: Option<String>,
}

/// Handler for `GET /ws/voice`.
pub async fn voice_ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
    Query(params): Query<VoiceConnectParams>,
) -> impl IntoResponse {
    let transport = match params.transport.as_deref() {
        None => ClientTransport::default(),
        Some(value) => match value.parse::<ClientTransport>() {
            Ok(transport) => transport,
            Err(e) => {
                tracing::warn!(remote_addr = %addr, "rejecting voice connection: {}", e);
                return crate::api::ApiError::BadRequest(e.to_string()).into_response();
            }
        },
    };

    tracing::info!(remote_addr = %addr, %transport, "voice websocket connection accepted");
    ws.on_upgrade(move |socket| handle_voice_socket(socket, state, transport))
}

async fn handle_voice_socket(socket: WebSocket, state: Arc<AppState>, transport: ClientTransport) {
    let _guard = state.track_session();
    let (mut sender, receiver) = socket.split();

    if let Err(e) = state.voice.validate() {
        tracing::error!("voice session refused: {}", e);
        let text = match e {
            VoiceError::Config(message) => message,
            other => other.to_string(),
        };
        reject(&mut sender, text).await;
        return;
    }

    let (writer, reader) = match carevoice_voice::connect(&state.voice).await {
        Ok(halves) => halves,
        Err(e) => {
            tracing::error!("failed to connect to Voice Live API: {}", e);
            reject(&mut sender, format!("Voice Live API error: {e}")).await;
            return;
        }
    };

    let mut session = Session::new(
        writer,
        sender,
        state.orchestrator.clone(),
        state.relay_settings(transport),
    );
    if let Err(e) = session.start(&state.voice.session).await {
        tracing::error!(session_id = %session.id(), "failed to start voice session: {}", e);
        let (mut upstream, mut sender) = session.into_parts();
        upstream.close().await;
        let _ = sender.send(Message::Close(None)).await;
        return;
    }

    let inputs = receiver.filter_map(|message| future::ready(client_input(message)));
    let inputs = std::pin::pin!(inputs);
    let (_reason, session) = relay::run(session, reader, inputs).await;
    let (mut upstream, _sender) = session.into_parts();
    upstream.close().await;
}

fn client_input(message: Result<Message, axum::Error>) -> Option<ClientInput> {
    match message {
        Ok(Message::Text(text)) => Some(ClientInput::Text(text.to_string())),
        Ok(Message::Binary(bytes)) => Some(ClientInput::Audio(bytes.to_vec())),
        Ok(Message::Close(_)) => Some(ClientInput::Closed),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("client websocket error: {}", e);
            Some(ClientInput::Closed)
        }
    }
}

/// Sends an error and closes the socket.
async fn reject(sender: &mut SplitSink<WebSocket, Message>, text: String) {
    if let Ok(frame) = ClientFrame::json(&ControlMessage::error(text)) {
        let _ = sender.send_frame(frame).await;
    }
    let _ = sender.send(Message::Close(None)).await;
}

/// Handler for `GET /ws/text`.
pub async fn text_ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    tracing::info!(remote_addr = %addr, "text websocket connection accepted");
    ws.on_upgrade(move |socket| handle_text_socket(socket, state))
}

async fn handle_text_socket(socket: WebSocket, state: Arc<AppState>) {
    let _guard = state.track_session();
    let flow = FlowLogger::new(Uuid::new_v4().to_string());
    emit(
        &flow,
        FlowEvent::ConversationStarted {
            transport: "text".to_string(),
        },
    );

    let (mut sender, mut receiver) = socket.split();
    'session: while let Some(message) = receiver.next().await {
        let raw = match message {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(session_id = flow.session_id(), "text websocket error: {}", e);
                break;
            }
        };

        for reply in text_replies(state.orchestrator.as_deref(), &flow, &raw) {
            let frame = match ClientFrame::json(&reply) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!("failed to encode text reply: {}", e);
                    continue;
                }
            };
            if let Err(e) = sender.send_frame(frame).await {
                tracing::warn!(session_id = flow.session_id(), "{}", e);
                break 'session;
            }
        }
    }

    emit(
        &flow,
        FlowEvent::ConversationEnded {
            reason: "client_closed".to_string(),
        },
    );
}

/// Builds the replies to one frame on the text socket. Cards are sent right
/// after the reply since there is no speech to wait for.
pub fn text_replies(
    orchestrator: Option<&dyn Orchestrator>,
    flow: &FlowLogger,
    raw: &str,
) -> Vec<ControlMessage> {
    let text = match serde_json::from_str::<ClientInbound>(raw) {
        Ok(ClientInbound::Text { text }) => text,
        Ok(ClientInbound::Ping) => return vec![ControlMessage::pong(relay::PONG_TEXT)],
        Ok(ClientInbound::Unknown) => return Vec::new(),
        Err(_) => return vec![ControlMessage::info(format!("Echo: {raw}"))],
    };
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    emit(flow, FlowEvent::user_message(text));

    let Some(orchestrator) = orchestrator else {
        return vec![ControlMessage::info(format!("Echo: {text}"))];
    };
    emit(
        flow,
        FlowEvent::AgentProcessing {
            agent: orchestrator.name().to_string(),
            action: "orchestrate".to_string(),
        },
    );

    match orchestrator.orchestrate(text) {
        Ok(result) => {
            emit(
                flow,
                FlowEvent::AgentResponse {
                    agent: result
                        .responding_agent()
                        .unwrap_or(orchestrator.name())
                        .to_string(),
                    response_length: result.spoken.chars().count(),
                    has_card: result.card.is_some(),
                },
            );
            let mut replies = Vec::new();
            if !result.spoken.trim().is_empty() {
                replies.push(ControlMessage::ai_response(result.spoken));
            }
            if let Some(card) = result.card {
                emit(
                    flow,
                    FlowEvent::CardDelivered {
                        path: "immediate".to_string(),
                        title: card.title().map(str::to_owned),
                    },
                );
                replies.push(ControlMessage::card(card));
            }
            replies
        }
        Err(e) => {
            emit(
                flow,
                FlowEvent::ErrorOccurred {
                    context: "orchestration".to_string(),
                    message: e.to_string(),
                },
            );
            vec![ControlMessage::error(format!("Orchestration error: {e}"))]
        }
    }
}

fn emit(flow: &FlowLogger, event: FlowEvent) {
    if let Err(e) = flow.emit(&event) {
        tracing::warn!(session_id = flow.session_id(), "failed to record flow event: {}", e);
    }
}
