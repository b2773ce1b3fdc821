//! CareVoice server library logic.

pub mod api;
pub mod api_ws;
pub mod config;
pub mod relay;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use carevoice_agents::{Orchestrator, RuleOrchestrator};
use carevoice_types::ClientTransport;
use carevoice_voice::{CardPolicy, VoiceLiveConfig};
use config::{Config, OrchestrationConfig};
use relay::RelaySettings;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Upstream voice service settings.
    pub voice: Arc<VoiceLiveConfig>,
    /// Agent router, `None` when orchestration is disabled.
    pub orchestrator: Option<Arc<dyn Orchestrator>>,
    pub orchestration: OrchestrationConfig,
    pub card_policy: CardPolicy,
    /// Number of open voice and text sessions.
    pub active_sessions: Arc<AtomicUsize>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        let orchestrator: Option<Arc<dyn Orchestrator>> = config
            .orchestration
            .enabled
            .then(|| Arc::new(RuleOrchestrator::default()) as Arc<dyn Orchestrator>);
        Self {
            voice: Arc::new(config.voice.clone()),
            orchestrator,
            orchestration: config.orchestration.clone(),
            card_policy: config.cards.policy(),
            active_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn relay_settings(&self, transport: ClientTransport) -> RelaySettings {
        RelaySettings {
            transport,
            min_transcript_chars: self.orchestration.min_transcript_chars,
            greet_on_connect: self.voice.greet_on_connect,
            card_policy: self.card_policy,
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    /// Counts a session as active until the guard is dropped.
    pub fn track_session(&self) -> SessionGuard {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
        SessionGuard(self.active_sessions.clone())
    }
}

pub struct SessionGuard(Arc<AtomicUsize>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(api::root_handler))
        .route("/health", get(api::health_handler))
        .route("/api/query", post(api::query_handler))
        .route("/api/agents", get(api::agents_handler))
        .route("/ws/voice", get(api_ws::voice_ws_handler))
        .route("/ws/text", get(api_ws::text_ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_guard_tracks_active_count() {
        let state = AppState::from_config(&Config::default());
        assert_eq!(state.active_sessions(), 0);
        let first = state.track_session();
        let second = state.clone().track_session();
        assert_eq!(state.active_sessions(), 2);
        drop(first);
        drop(second);
        assert_eq!(state.active_sessions(), 0);
    }

    #[test]
    fn disabled_orchestration_has_no_router() {
        let mut config = Config::default();
        config.orchestration.enabled = false;
        config.voice.greet_on_connect = false;
        let state = AppState::from_config(&config);
        assert!(state.orchestrator.is_none());

        let settings = state.relay_settings(ClientTransport::Envelope);
        assert!(!settings.greet_on_connect);
        assert_eq!(settings.min_transcript_chars, 3);
    }
}
