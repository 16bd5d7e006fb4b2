//! Per-call execution of session side effects.
//!
//! One driver task owns one [`CallSession`] and consumes its events in
//! arrival order, so all state transitions for a call are strictly
//! sequential. Everything that suspends (the pipeline stages, the paced
//! outbound send, the greeting timer) runs in spawned tasks that report
//! back through the same event channel.

use crate::{Action, CallEvent, CallSession, SessionConfig, TurnOutput};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use trunkline_audio::{downsample_to_telephony, mulaw_to_pcm, wav_wrap, TELEPHONY_SAMPLE_RATE};
use trunkline_pipeline::{PipelineError, SpeechPipeline};
use trunkline_types::{ChatTurn, Language};

/// Outbound traffic handed to the transport layer. The transport owns wire
/// serialization; after the socket closes, sends simply fail and are
/// ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// One μ-law audio chunk.
    Media(Vec<u8>),
    /// A named marker queued behind the audio; the provider echoes it back
    /// once playback truly finished on the line.
    Mark(String),
    /// Drop whatever is still queued for playback.
    Clear,
}

pub(crate) struct CallDriver {
    session: CallSession,
    config: Arc<SessionConfig>,
    pipeline: Arc<dyn SpeechPipeline>,
    /// Loopback sender used by spawned tasks (pipeline turns, timers).
    events_tx: mpsc::Sender<CallEvent>,
    outbound: mpsc::Sender<OutboundFrame>,
    /// The in-flight turn task, if any. Only aborted when
    /// `cancel_upstream_on_interrupt` is set; otherwise its late result is
    /// discarded by the session's turn-relevance check.
    current_turn: Option<JoinHandle<()>>,
}

impl CallDriver {
    pub(crate) fn new(
        session: CallSession,
        config: Arc<SessionConfig>,
        pipeline: Arc<dyn SpeechPipeline>,
        events_tx: mpsc::Sender<CallEvent>,
        outbound: mpsc::Sender<OutboundFrame>,
    ) -> Self {
        Self {
            session,
            config,
            pipeline,
            events_tx,
            outbound,
            current_turn: None,
        }
    }

    pub(crate) async fn run(mut self, mut events: mpsc::Receiver<CallEvent>) {
        while let Some(event) = events.recv().await {
            let stopping = matches!(event, CallEvent::Stopped);
            let actions = self.session.handle(event, Instant::now());
            self.execute(actions).await;
            if stopping {
                break;
            }
        }
        if let Some(handle) = self.current_turn.take() {
            if self.config.cancel_upstream_on_interrupt {
                handle.abort();
            }
        }
        tracing::debug!(stream_sid = %self.session.stream_sid(), "call driver finished");
    }

    async fn execute(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::SynthesizeGreeting => self.spawn_greeting(),
                Action::ArmGreetingTimeout => self.arm_greeting_timeout(),
                Action::StartTurn { turn, audio } => self.spawn_turn(turn, audio),
                Action::Speak { mark, audio, guard } => self.spawn_speak(mark, audio, guard),
                Action::SendClear => {
                    if self.outbound.send(OutboundFrame::Clear).await.is_err() {
                        tracing::debug!(
                            stream_sid = %self.session.stream_sid(),
                            "transport gone; clear dropped"
                        );
                    }
                    if self.config.cancel_upstream_on_interrupt {
                        if let Some(handle) = self.current_turn.take() {
                            handle.abort();
                        }
                    }
                }
            }
        }
    }

    fn spawn_greeting(&self) {
        let pipeline = self.pipeline.clone();
        let config = self.config.clone();
        let events = self.events_tx.clone();
        let language = self.session.language().unwrap_or_default();
        let stream_sid = self.session.stream_sid().to_string();

        tokio::spawn(async move {
            match pipeline.synthesize(&config.greeting_text, language).await {
                Ok(pcm) => {
                    let audio = downsample_to_telephony(&pcm);
                    let _ = events.send(CallEvent::GreetingAudio { audio }).await;
                }
                Err(e) => {
                    // The fallback timer will still open the mic.
                    tracing::warn!(
                        stream_sid = %stream_sid,
                        "greeting synthesis failed: {}",
                        e
                    );
                }
            }
        });
    }

    fn arm_greeting_timeout(&self) {
        let events = self.events_tx.clone();
        let timeout = self.config.greeting_timeout();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events.send(CallEvent::GreetingTimeout).await;
        });
    }

    fn spawn_turn(&mut self, turn: u64, audio: Vec<u8>) {
        let pipeline = self.pipeline.clone();
        let config = self.config.clone();
        let events = self.events_tx.clone();
        let stream_sid = self.session.stream_sid().to_string();
        let language = self.session.language();
        let first_turn = self.session.first_turn();
        let history = self.session.history().to_vec();

        let handle = tokio::spawn(async move {
            let event = match run_turn(
                pipeline.as_ref(),
                audio,
                language,
                first_turn,
                history,
            )
            .await
            {
                Ok(Some(output)) => CallEvent::SpeakReady { turn, output },
                Ok(None) => {
                    tracing::info!(
                        stream_sid = %stream_sid,
                        turn,
                        "transcription heard nothing; resuming listening"
                    );
                    CallEvent::SpeakFailed { turn }
                }
                Err(e) => {
                    tracing::warn!(stream_sid = %stream_sid, turn, "turn pipeline failed: {}", e);
                    match apologize(pipeline.as_ref(), &config, language).await {
                        Some(output) => CallEvent::SpeakReady { turn, output },
                        None => CallEvent::SpeakFailed { turn },
                    }
                }
            };
            let _ = events.send(event).await;
        });
        self.current_turn = Some(handle);
    }

    fn spawn_speak(&self, mark: String, audio: Vec<u8>, guard: CancellationToken) {
        let outbound = self.outbound.clone();
        let chunk_bytes = self.config.chunk_bytes.max(1);
        let interval = self.config.chunk_interval();

        tokio::spawn(async move {
            for chunk in audio.chunks(chunk_bytes) {
                if guard.is_cancelled() {
                    return;
                }
                if outbound
                    .send(OutboundFrame::Media(chunk.to_vec()))
                    .await
                    .is_err()
                {
                    return;
                }
                tokio::select! {
                    _ = guard.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            if !guard.is_cancelled() {
                let _ = outbound.send(OutboundFrame::Mark(mark)).await;
            }
        });
    }
}

/// Runs one caller utterance through the four stages, strictly in order:
/// each stage's output is the next stage's required input.
///
/// Returns `Ok(None)` when transcription produced no text; the turn is
/// abandoned without bothering the reasoning backend.
async fn run_turn(
    pipeline: &dyn SpeechPipeline,
    mulaw: Vec<u8>,
    language: Option<Language>,
    first_turn: bool,
    mut history: Vec<ChatTurn>,
) -> Result<Option<TurnOutput>, PipelineError> {
    let wav = wav_wrap(&mulaw_to_pcm(&mulaw), TELEPHONY_SAMPLE_RATE);

    // The first turn always auto-detects; afterwards the call is pinned.
    let hint = if first_turn { None } else { language };
    let transcript = pipeline.transcribe(wav, hint).await?;
    if transcript.text.is_empty() {
        return Ok(None);
    }

    let language = if first_turn {
        transcript.language.unwrap_or_default()
    } else {
        language.unwrap_or_default()
    };

    let user_text = if language == Language::English {
        transcript.text
    } else {
        pipeline
            .translate(&transcript.text, language, Language::English)
            .await?
    };

    history.push(ChatTurn::user(user_text.clone()));
    let reply = pipeline.reason(&history).await?;

    let localized = if language == Language::English {
        reply.clone()
    } else {
        pipeline
            .translate(&reply, Language::English, language)
            .await?
    };

    let pcm = pipeline.synthesize(&localized, language).await?;
    let audio = downsample_to_telephony(&pcm);

    Ok(Some(TurnOutput {
        language,
        exchange: Some((user_text, reply)),
        audio,
    }))
}

/// Best-effort apology when the pipeline fails mid-turn. If even this
/// cannot be synthesized the session just goes back to listening.
async fn apologize(
    pipeline: &dyn SpeechPipeline,
    config: &SessionConfig,
    language: Option<Language>,
) -> Option<TurnOutput> {
    let language = language.unwrap_or_default();
    match pipeline.synthesize(&config.apology_text, language).await {
        Ok(pcm) => Some(TurnOutput {
            language,
            exchange: None,
            audio: downsample_to_telephony(&pcm),
        }),
        Err(e) => {
            tracing::warn!("apology synthesis failed too: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use trunkline_pipeline::Transcript;

    /// Pipeline double that records stage order and returns canned data.
    struct ScriptedPipeline {
        calls: Mutex<Vec<&'static str>>,
        transcript: &'static str,
        detected: Option<Language>,
        fail_reason: bool,
    }

    impl ScriptedPipeline {
        fn new(transcript: &'static str, detected: Option<Language>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                transcript,
                detected,
                fail_reason: false,
            }
        }

        fn log(&self, stage: &'static str) {
            self.calls.lock().unwrap().push(stage);
        }
    }

    #[async_trait]
    impl SpeechPipeline for ScriptedPipeline {
        async fn transcribe(
            &self,
            _wav: Vec<u8>,
            _language: Option<Language>,
        ) -> Result<Transcript, PipelineError> {
            self.log("transcribe");
            Ok(Transcript {
                text: self.transcript.to_string(),
                language: self.detected,
            })
        }

        async fn translate(
            &self,
            text: &str,
            _from: Language,
            _to: Language,
        ) -> Result<String, PipelineError> {
            self.log("translate");
            Ok(format!("[{}]", text))
        }

        async fn reason(&self, history: &[ChatTurn]) -> Result<String, PipelineError> {
            self.log("reason");
            if self.fail_reason {
                return Err(PipelineError::Reason("backend down".to_string()));
            }
            Ok(format!("reply to {}", history.last().unwrap().text))
        }

        async fn synthesize(
            &self,
            _text: &str,
            _language: Language,
        ) -> Result<Vec<u8>, PipelineError> {
            self.log("synthesize");
            // 300 samples of 24 kHz PCM -> 100 bytes of telephony audio.
            Ok(vec![0u8; 600])
        }
    }

    #[tokio::test]
    async fn english_turn_skips_translation() {
        let pipeline = ScriptedPipeline::new("hello there", Some(Language::English));
        let output = run_turn(&pipeline, vec![0xFF; 160], None, true, Vec::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(output.language, Language::English);
        assert_eq!(
            output.exchange,
            Some(("hello there".to_string(), "reply to hello there".to_string()))
        );
        assert_eq!(output.audio.len(), 100);
        assert_eq!(
            *pipeline.calls.lock().unwrap(),
            vec!["transcribe", "reason", "synthesize"]
        );
    }

    #[tokio::test]
    async fn non_english_turn_translates_both_ways() {
        let pipeline = ScriptedPipeline::new("namaste", Some(Language::Hindi));
        let output = run_turn(&pipeline, vec![0xFF; 160], None, true, Vec::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(output.language, Language::Hindi);
        assert_eq!(
            *pipeline.calls.lock().unwrap(),
            vec!["transcribe", "translate", "reason", "translate", "synthesize"]
        );
    }

    #[tokio::test]
    async fn pinned_language_overrides_detection_after_first_turn() {
        let pipeline = ScriptedPipeline::new("text", Some(Language::Tamil));
        let output = run_turn(
            &pipeline,
            vec![0xFF; 160],
            Some(Language::Hindi),
            false,
            Vec::new(),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(output.language, Language::Hindi);
    }

    #[tokio::test]
    async fn empty_transcript_abandons_the_turn() {
        let pipeline = ScriptedPipeline::new("", None);
        let output = run_turn(&pipeline, vec![0xFF; 160], None, true, Vec::new())
            .await
            .unwrap();
        assert!(output.is_none());
        assert_eq!(*pipeline.calls.lock().unwrap(), vec!["transcribe"]);
    }

    #[tokio::test]
    async fn reasoning_failure_surfaces_as_error() {
        let mut pipeline = ScriptedPipeline::new("hello", Some(Language::English));
        pipeline.fail_reason = true;
        let err = run_turn(&pipeline, vec![0xFF; 160], None, true, Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Reason(_)));
    }

    #[tokio::test]
    async fn apology_synthesizes_without_touching_history() {
        let pipeline = ScriptedPipeline::new("", None);
        let config = SessionConfig::default();
        let output = apologize(&pipeline, &config, Some(Language::Hindi))
            .await
            .unwrap();
        assert_eq!(output.language, Language::Hindi);
        assert!(output.exchange.is_none());
        assert!(!output.audio.is_empty());
    }
}
