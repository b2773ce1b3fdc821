//! `carevoice-server`: relays browser voice sessions to the Voice Live API
//! and serves the CareVoice HTTP surface.
//!
//! Usage: `carevoice-server [CONFIG]`. Without an argument the path comes from
//! `CAREVOICE_CONFIG_PATH`, then `config.toml` in the working directory.

use carevoice_server::config::{self, Config, LoggingConfig};
use carevoice_server::{app, AppState};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Where the config path came from, for the startup log.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    Argument,
    Environment,
    Default,
}

impl ConfigSource {
    fn as_str(self) -> &'static str {
        match self {
            Self::Argument => "argument",
            Self::Environment => "CAREVOICE_CONFIG_PATH",
            Self::Default => "default",
        }
    }
}

fn config_path(arg: Option<String>, env: Option<String>) -> (String, ConfigSource) {
    let non_blank = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
    if let Some(path) = non_blank(arg) {
        (path, ConfigSource::Argument)
    } else if let Some(path) = non_blank(env) {
        (path, ConfigSource::Environment)
    } else {
        (DEFAULT_CONFIG_PATH.to_string(), ConfigSource::Default)
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn log_voice_readiness(config: &Config) {
    if config.voice.is_configured() {
        tracing::info!(model = %config.voice.model, "Voice Live API configured");
    } else {
        tracing::warn!(
            endpoint_configured = config.voice.endpoint_configured(),
            key_configured = config.voice.key_configured(),
            "Voice Live API credentials missing, /ws/voice will refuse sessions"
        );
    }
}

#[tokio::main]
async fn main() {
    let (path, source) = config_path(
        std::env::args().nth(1),
        std::env::var("CAREVOICE_CONFIG_PATH").ok(),
    );
    let config = config::load_config(Some(&path)).expect("invalid carevoice configuration");

    init_tracing(&config.logging);
    tracing::info!(path = %path, source = source.as_str(), "configuration loaded");
    log_voice_readiness(&config);

    let state = AppState::from_config(&config);
    tracing::info!(
        orchestration = state.orchestrator.is_some(),
        card_timing = ?config.cards.timing,
        "assistant ready"
    );

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("cannot listen on {addr}: {e}"));
    tracing::info!(%addr, "carevoice listening");

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("carevoice server stopped with an error");

    tracing::info!("carevoice stopped");
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        () = interrupt => "SIGINT",
        () = terminate => "SIGTERM",
    };
    tracing::info!(signal, "closing voice sessions and shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    #[test]
    fn config_path_prefers_argument_then_environment() {
        let (path, source) = config_path(Some("cli.toml".into()), Some("env.toml".into()));
        assert_eq!(path, "cli.toml");
        assert_eq!(source.as_str(), "argument");

        let (path, source) = config_path(Some("  ".into()), Some("env.toml".into()));
        assert_eq!(path, "env.toml");
        assert_eq!(source.as_str(), "CAREVOICE_CONFIG_PATH");

        let (path, source) = config_path(None, Some(String::new()));
        assert_eq!(path, DEFAULT_CONFIG_PATH);
        assert_eq!(source.as_str(), "default");
    }

    #[tokio::test]
    async fn default_state_serves_health() {
        let response = app(AppState::from_config(&Config::default()))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }
}
