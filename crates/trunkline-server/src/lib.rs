//! Trunkline server library logic.

pub mod config;
pub mod protocol;
pub mod ws;

use axum::{routing::get, Extension, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use trunkline_session::SessionManager;

/// Application state shared across all request handlers.
pub struct AppState {
    /// Registry of live call sessions, injected into the WebSocket layer.
    pub sessions: Arc<SessionManager>,
}

/// Health check handler.
///
/// Returns `200 OK` with server status and the number of live calls. Used
/// by load balancers, monitoring, and CI to verify the server is running.
async fn health(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "active_calls": state.sessions.active_calls().await,
    }))
}

/// Builds the application router with all routes.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/call/stream", get(ws::call_stream_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use trunkline_pipeline::{PipelineError, SpeechPipeline, Transcript};
    use trunkline_session::SessionConfig;
    use trunkline_types::{ChatTurn, Language};

    struct NullPipeline;

    #[async_trait]
    impl SpeechPipeline for NullPipeline {
        async fn transcribe(
            &self,
            _wav: Vec<u8>,
            _language: Option<Language>,
        ) -> Result<Transcript, PipelineError> {
            Ok(Transcript {
                text: String::new(),
                language: None,
            })
        }

        async fn translate(
            &self,
            text: &str,
            _from: Language,
            _to: Language,
        ) -> Result<String, PipelineError> {
            Ok(text.to_string())
        }

        async fn reason(&self, _history: &[ChatTurn]) -> Result<String, PipelineError> {
            Ok(String::new())
        }

        async fn synthesize(
            &self,
            _text: &str,
            _language: Language,
        ) -> Result<Vec<u8>, PipelineError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn health_reports_status_and_call_count() {
        let state = Arc::new(AppState {
            sessions: Arc::new(SessionManager::new(
                SessionConfig::default(),
                Arc::new(NullPipeline),
            )),
        });

        let Json(body) = health(Extension(state)).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["active_calls"], 0);
    }
}
