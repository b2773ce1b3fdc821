use carevoice_server::config::Config;
use carevoice_server::{app, AppState};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

type ClientSocket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Fake Voice Live service. Forwards every command it receives to the test
/// and answers `response.create` with a short audio delta, the assistant
/// transcript and `response.done`.
async fn spawn_fake_upstream() -> (String, mpsc::UnboundedReceiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        ws.send(Message::Text(
            json!({"type": "session.created", "session": {"id": "sess_1"}})
                .to_string()
                .into(),
        ))
        .await
        .unwrap();

        while let Some(Ok(message)) = ws.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            let command: Value = serde_json::from_str(text.as_str()).unwrap();
            let is_create = command["type"] == "response.create";
            let _ = tx.send(command);
            if is_create {
                for event in [
                    json!({"type": "response.audio.delta", "delta": "AQID"}),
                    json!({"type": "response.audio_transcript.done", "transcript": "spoken"}),
                    json!({"type": "response.done", "response": {"id": "r", "status": "completed"}}),
                ] {
                    if ws.send(Message::Text(event.to_string().into())).await.is_err() {
                        return;
                    }
                }
            }
        }
    });

    (format!("http://{addr}"), rx)
}

async fn spawn_server(config: Config) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = app(AppState::from_config(&config));
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

/// Reads frames until a JSON message matching `predicate` arrives.
async fn next_json_matching(
    socket: &mut ClientSocket,
    predicate: impl Fn(&Value) -> bool,
) -> Value {
    let read = async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => {
                    let value: Value = serde_json::from_str(text.as_str()).unwrap();
                    if predicate(&value) {
                        return value;
                    }
                }
                Some(Ok(_)) => {}
                other => panic!("socket ended early: {other:?}"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(10), read)
        .await
        .expect("timed out waiting for message")
}

async fn next_command(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for upstream command")
        .expect("upstream closed")
}

#[tokio::test]
async fn voice_session_relays_speech_and_card() {
    let (endpoint, mut commands) = spawn_fake_upstream().await;
    let mut config = Config::default();
    config.voice.endpoint = endpoint;
    config.voice.api_key = "test-key".to_string();
    let addr = spawn_server(config).await;

    let (mut socket, _) = connect_async(format!("ws://{addr}/ws/voice?transport=envelope"))
        .await
        .unwrap();

    let ready = next_json_matching(&mut socket, |v| v["type"] == "ready").await;
    assert!(ready["text"].as_str().unwrap().contains("ready"));
    assert_eq!(next_command(&mut commands).await["type"], "session.update");
    assert_eq!(next_command(&mut commands).await["type"], "response.create");

    socket
        .send(Message::Text(
            json!({"type": "text", "text": "I have a cardiology appointment"})
                .to_string()
                .into(),
        ))
        .await
        .unwrap();

    let reply = next_json_matching(&mut socket, |v| v["type"] == "ai_response").await;
    assert!(reply["text"].as_str().unwrap().contains("cardiology"));

    let item = next_command(&mut commands).await;
    assert_eq!(item["type"], "conversation.item.create");
    assert_eq!(item["item"]["role"], "assistant");
    assert_eq!(next_command(&mut commands).await["type"], "response.create");

    let audio = next_json_matching(&mut socket, |v| v["Kind"] == "AudioData").await;
    assert_eq!(audio["AudioData"]["Data"], "AQID");

    let card = next_json_matching(&mut socket, |v| v["type"] == "card").await;
    assert_eq!(card["payload"]["title"], "Cardiology Appointment Checklist");

    socket.close(None).await.unwrap();
}

#[tokio::test]
async fn raw_transport_gets_binary_audio() {
    let (endpoint, _commands) = spawn_fake_upstream().await;
    let mut config = Config::default();
    config.voice.endpoint = endpoint;
    config.voice.api_key = "test-key".to_string();
    let addr = spawn_server(config).await;

    let (mut socket, _) = connect_async(format!("ws://{addr}/ws/voice"))
        .await
        .unwrap();

    let binary = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Binary(bytes))) => return bytes,
                Some(Ok(_)) => {}
                other => panic!("socket ended early: {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for greeting audio");
    assert_eq!(binary.as_ref(), &[1u8, 2, 3][..]);
}

#[tokio::test]
async fn missing_credentials_are_reported_and_socket_closed() {
    let addr = spawn_server(Config::default()).await;
    let (mut socket, _) = connect_async(format!("ws://{addr}/ws/voice"))
        .await
        .unwrap();

    let error = next_json_matching(&mut socket, |v| v["type"] == "error").await;
    assert_eq!(error["text"], "Voice Live API credentials not configured");

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}

#[tokio::test]
async fn unreachable_upstream_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = listener.local_addr().unwrap();
    drop(listener);

    let mut config = Config::default();
    config.voice.endpoint = format!("http://{dead}");
    config.voice.api_key = "k".to_string();
    let addr = spawn_server(config).await;

    let (mut socket, _) = connect_async(format!("ws://{addr}/ws/voice"))
        .await
        .unwrap();
    let error = next_json_matching(&mut socket, |v| v["type"] == "error").await;
    assert!(error["text"]
        .as_str()
        .unwrap()
        .starts_with("Voice Live API error:"));
}

#[tokio::test]
async fn unknown_transport_is_rejected_before_upgrade() {
    let addr = spawn_server(Config::default()).await;
    let result = connect_async(format!("ws://{addr}/ws/voice?transport=carrier-pigeon")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn text_socket_answers_with_reply_and_card() {
    let addr = spawn_server(Config::default()).await;
    let (mut socket, _) = connect_async(format!("ws://{addr}/ws/text"))
        .await
        .unwrap();

    socket
        .send(Message::Text(json!({"type": "ping"}).to_string().into()))
        .await
        .unwrap();
    let pong = next_json_matching(&mut socket, |_| true).await;
    assert_eq!(pong["type"], "pong");

    socket
        .send(Message::Text(
            json!({"type": "text", "text": "worried about a mole on my arm"})
                .to_string()
                .into(),
        ))
        .await
        .unwrap();
    let reply = next_json_matching(&mut socket, |_| true).await;
    assert_eq!(reply["type"], "ai_response");
    let card = next_json_matching(&mut socket, |_| true).await;
    assert_eq!(card["type"], "card");
    assert_eq!(card["payload"]["title"], "Dermatology Appointment Checklist");

    socket.send(Message::Text("plain words".into())).await.unwrap();
    let info = next_json_matching(&mut socket, |_| true).await;
    assert_eq!(info["type"], "info");
    assert_eq!(info["text"], "Echo: plain words");
}
