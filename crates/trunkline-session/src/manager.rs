//! Registry of live call sessions.

use crate::driver::CallDriver;
use crate::{CallEvent, CallSession, OutboundFrame, SessionConfig};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use trunkline_pipeline::SpeechPipeline;

/// Capacity of the per-call event channel. Frames arrive at 50/s; beyond
/// this buffer the driver is wedged and frames are dropped rather than
/// stalling the socket reader.
const EVENT_CHANNEL_CAPACITY: usize = 256;

struct SessionHandle {
    events: mpsc::Sender<CallEvent>,
    task: JoinHandle<()>,
}

/// Owns every active call, keyed by stream SID.
///
/// Injected into the transport layer instead of living as module state so
/// session lifecycle is testable on its own. At most one live session per
/// stream SID; entries are removed exactly once, on stop, socket close, or
/// transport error.
pub struct SessionManager {
    config: Arc<SessionConfig>,
    pipeline: Arc<dyn SpeechPipeline>,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new(config: SessionConfig, pipeline: Arc<dyn SpeechPipeline>) -> Self {
        Self {
            config: Arc::new(config),
            pipeline,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a session for a newly started stream and spawns its driver.
    ///
    /// Outbound frames flow through `outbound`; once the transport drops the
    /// receiver, sends become no-ops. A stale session under the same stream
    /// SID is replaced and its driver aborted.
    pub async fn start_session(
        &self,
        stream_sid: &str,
        call_sid: &str,
        outbound: mpsc::Sender<OutboundFrame>,
    ) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let session = CallSession::new(stream_sid, call_sid, self.config.clone());
        let driver = CallDriver::new(
            session,
            self.config.clone(),
            self.pipeline.clone(),
            events_tx.clone(),
            outbound,
        );
        let task = tokio::spawn(driver.run(events_rx));
        let _ = events_tx.send(CallEvent::Started).await;

        let mut sessions = self.sessions.write().await;
        if let Some(old) = sessions.insert(
            stream_sid.to_string(),
            SessionHandle {
                events: events_tx,
                task,
            },
        ) {
            tracing::warn!(
                stream_sid = %stream_sid,
                "replaced existing session for stream; aborting the old driver"
            );
            old.task.abort();
        }
    }

    /// Forwards one transport event to the session's driver.
    ///
    /// Events for unknown streams are dropped: the session may already be
    /// tearing down, and that is not an error. A congested driver drops the
    /// event rather than stalling the socket reader.
    pub async fn dispatch(&self, stream_sid: &str, event: CallEvent) {
        let sessions = self.sessions.read().await;
        match sessions.get(stream_sid) {
            Some(handle) => {
                if let Err(e) = handle.events.try_send(event) {
                    tracing::warn!(
                        stream_sid = %stream_sid,
                        "dropping event for congested session: {}",
                        e
                    );
                }
            }
            None => {
                tracing::debug!(stream_sid = %stream_sid, "event for unknown stream dropped");
            }
        }
    }

    /// Tears the session down. Idempotent: the registry entry is removed
    /// exactly once whether this is triggered by a stop message, a socket
    /// close, or a transport error.
    pub async fn stop_session(&self, stream_sid: &str) {
        let handle = self.sessions.write().await.remove(stream_sid);
        if let Some(handle) = handle {
            tracing::info!(stream_sid = %stream_sid, "stopping session");
            if handle.events.send(CallEvent::Stopped).await.is_err() {
                // Driver already gone; nothing left to wind down.
                handle.task.abort();
            }
        }
    }

    /// Number of live sessions.
    pub async fn active_calls(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use trunkline_pipeline::{PipelineError, Transcript};
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

    fn manager() -> SessionManager {
        SessionManager::new(SessionConfig::default(), Arc::new(NullPipeline))
    }

    #[tokio::test]
    async fn start_and_stop_maintain_the_registry() {
        let manager = manager();
        let (outbound, _rx) = mpsc::channel(16);

        manager.start_session("MZ1", "CA1", outbound).await;
        assert_eq!(manager.active_calls().await, 1);

        manager.stop_session("MZ1").await;
        assert_eq!(manager.active_calls().await, 0);
    }

    #[tokio::test]
    async fn duplicate_stream_sid_replaces_the_session() {
        let manager = manager();
        let (outbound, _rx) = mpsc::channel(16);

        manager.start_session("MZ1", "CA1", outbound.clone()).await;
        manager.start_session("MZ1", "CA1-again", outbound).await;
        assert_eq!(manager.active_calls().await, 1);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let manager = manager();
        let (outbound, _rx) = mpsc::channel(16);

        manager.start_session("MZ1", "CA1", outbound).await;
        manager.stop_session("MZ1").await;
        manager.stop_session("MZ1").await;
        assert_eq!(manager.active_calls().await, 0);
    }

    #[tokio::test]
    async fn dispatch_to_unknown_stream_is_harmless() {
        let manager = manager();
        manager
            .dispatch(
                "MZ-missing",
                CallEvent::Media {
                    frame: vec![0xFF; 160],
                },
            )
            .await;
        assert_eq!(manager.active_calls().await, 0);
    }
}
