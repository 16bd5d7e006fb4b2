//! The per-call state machine.
//!
//! [`CallSession::handle`] is a pure transition function: it consumes one
//! inbound [`CallEvent`] plus its arrival time and returns the side effects
//! to perform as a list of [`Action`]s. No I/O happens here, which is what
//! makes the turn-taking logic testable without a socket or a live
//! pipeline; the driver owns execution.

use crate::SessionConfig;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use trunkline_audio::energy;
use trunkline_types::{ChatTurn, Language};

/// Lifecycle states of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// No stream yet, or the stream has ended.
    Idle,
    /// Greeting queued for playback; the mic is not logically open.
    Greeting,
    /// Waiting for the caller to start speaking.
    Listening,
    /// Caller is speaking; frames accumulate in the turn buffer.
    Recording,
    /// A turn is in the pipeline; loud frames are stashed for the next one.
    Processing,
    /// A synthesized response is streaming out.
    Speaking,
}

/// Result of one pipeline turn, ready for playback.
#[derive(Debug)]
pub struct TurnOutput {
    /// Language the turn resolved to (detected on the first turn, pinned
    /// afterwards).
    pub language: Language,
    /// The (caller utterance, assistant reply) pair in English, recorded in
    /// the history. `None` for utterances that bypass the reasoning backend
    /// (the apology).
    pub exchange: Option<(String, String)>,
    /// Telephony-rate μ-law audio of the reply.
    pub audio: Vec<u8>,
}

/// Everything that can happen to a session, in arrival order.
#[derive(Debug)]
pub enum CallEvent {
    /// The media stream started.
    Started,
    /// One inbound μ-law frame (~20 ms).
    Media { frame: Vec<u8> },
    /// The transport confirmed a named marker finished playing on the line.
    MarkEchoed { name: String },
    /// A touch-tone digit. Observed, never acted on.
    Dtmf { digit: String },
    /// The greeting playback confirmation never arrived.
    GreetingTimeout,
    /// Greeting synthesis finished.
    GreetingAudio { audio: Vec<u8> },
    /// The pipeline produced a playable response for turn `turn`.
    SpeakReady { turn: u64, output: TurnOutput },
    /// The pipeline gave up on turn `turn` (and no apology could be made).
    SpeakFailed { turn: u64 },
    /// The stream ended.
    Stopped,
}

/// Side effects the driver must perform after a transition.
#[derive(Debug)]
pub enum Action {
    /// Synthesize the greeting utterance.
    SynthesizeGreeting,
    /// Start the greeting fallback timer.
    ArmGreetingTimeout,
    /// Run the four-stage pipeline over a finalized utterance.
    StartTurn { turn: u64, audio: Vec<u8> },
    /// Stream μ-law audio out in paced chunks, then queue the named marker.
    /// The guard cancels the send mid-utterance.
    Speak {
        mark: String,
        audio: Vec<u8>,
        guard: CancellationToken,
    },
    /// Tell the transport to drop any audio still queued for playback.
    SendClear,
}

/// Marker name queued after the greeting.
const GREETING_MARK: &str = "greeting";

/// State for one active phone call.
pub struct CallSession {
    stream_sid: String,
    call_sid: String,
    config: Arc<SessionConfig>,
    state: CallState,
    /// Inbound μ-law collected since the last turn boundary.
    audio: Vec<u8>,
    /// Conversation so far, as the reasoning backend sees it.
    history: Vec<ChatTurn>,
    language: Option<Language>,
    first_turn: bool,
    interrupted: bool,
    send_guard: Option<CancellationToken>,
    /// The only marker whose echo currently means anything. Cleared on
    /// barge-in so a stale echo from an aborted response matches nothing.
    current_mark: Option<String>,
    /// Monotonic turn counter; marker names derive from it, which is what
    /// keeps them unique within the call.
    turn_seq: u64,
    speech_started_at: Option<Instant>,
    last_loud_at: Option<Instant>,
}

impl CallSession {
    pub fn new(
        stream_sid: impl Into<String>,
        call_sid: impl Into<String>,
        config: Arc<SessionConfig>,
    ) -> Self {
        Self {
            stream_sid: stream_sid.into(),
            call_sid: call_sid.into(),
            config,
            state: CallState::Idle,
            audio: Vec::new(),
            history: Vec::new(),
            language: None,
            first_turn: true,
            interrupted: false,
            send_guard: None,
            current_mark: None,
            turn_seq: 0,
            speech_started_at: None,
            last_loud_at: None,
        }
    }

    pub fn stream_sid(&self) -> &str {
        &self.stream_sid
    }

    pub fn call_sid(&self) -> &str {
        &self.call_sid
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn language(&self) -> Option<Language> {
        self.language
    }

    pub fn first_turn(&self) -> bool {
        self.first_turn
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    pub fn audio_buffer(&self) -> &[u8] {
        &self.audio
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Applies one event and returns the side effects to perform.
    pub fn handle(&mut self, event: CallEvent, now: Instant) -> Vec<Action> {
        match event {
            CallEvent::Started => self.on_started(),
            CallEvent::Media { frame } => self.on_media(frame, now),
            CallEvent::MarkEchoed { name } => self.on_mark(&name),
            CallEvent::Dtmf { digit } => {
                tracing::info!(
                    stream_sid = %self.stream_sid,
                    digit = %digit,
                    "dtmf digit observed; no action"
                );
                Vec::new()
            }
            CallEvent::GreetingTimeout => self.on_greeting_timeout(),
            CallEvent::GreetingAudio { audio } => self.on_greeting_audio(audio),
            CallEvent::SpeakReady { turn, output } => self.on_speak_ready(turn, output),
            CallEvent::SpeakFailed { turn } => self.on_speak_failed(turn),
            CallEvent::Stopped => {
                self.reset();
                Vec::new()
            }
        }
    }

    fn on_started(&mut self) -> Vec<Action> {
        if self.state != CallState::Idle {
            tracing::warn!(stream_sid = %self.stream_sid, "start event on live session ignored");
            return Vec::new();
        }
        tracing::info!(
            stream_sid = %self.stream_sid,
            call_sid = %self.call_sid,
            "call started"
        );
        self.state = CallState::Greeting;
        vec![Action::SynthesizeGreeting, Action::ArmGreetingTimeout]
    }

    fn on_media(&mut self, frame: Vec<u8>, now: Instant) -> Vec<Action> {
        match self.state {
            // Mic is not logically open yet (or the call is over).
            CallState::Idle | CallState::Greeting => Vec::new(),

            CallState::Listening => {
                if energy(&frame) > self.config.speech_threshold {
                    tracing::debug!(stream_sid = %self.stream_sid, "speech onset");
                    self.state = CallState::Recording;
                    self.speech_started_at = Some(now);
                    self.last_loud_at = Some(now);
                    self.audio.extend_from_slice(&frame);
                }
                Vec::new()
            }

            CallState::Recording => {
                let loud = energy(&frame) > self.config.speech_threshold;
                if !loud {
                    if let (Some(started), Some(last_loud)) =
                        (self.speech_started_at, self.last_loud_at)
                    {
                        if now.duration_since(last_loud) >= self.config.silence_trigger() {
                            return self.finalize_turn(started, last_loud);
                        }
                    }
                }
                self.audio.extend_from_slice(&frame);
                if loud {
                    self.last_loud_at = Some(now);
                }
                Vec::new()
            }

            // Keep classifying while the pipeline runs: loud frames seed the
            // next turn, silence is worthless.
            CallState::Processing => {
                if energy(&frame) > self.config.speech_threshold {
                    self.audio.extend_from_slice(&frame);
                }
                Vec::new()
            }

            CallState::Speaking => {
                if energy(&frame) > self.config.interrupt_threshold() {
                    return self.on_barge_in(frame, now);
                }
                Vec::new()
            }
        }
    }

    /// The caller started talking over the response. Halt the in-flight
    /// send, flush the transport's playback queue, and treat the frame as
    /// the start of a new utterance.
    fn on_barge_in(&mut self, frame: Vec<u8>, now: Instant) -> Vec<Action> {
        tracing::info!(stream_sid = %self.stream_sid, "barge-in detected");
        self.interrupted = true;
        if let Some(guard) = self.send_guard.take() {
            guard.cancel();
        }
        self.current_mark = None;
        self.state = CallState::Recording;
        self.audio.clear();
        self.audio.extend_from_slice(&frame);
        self.speech_started_at = Some(now);
        self.last_loud_at = Some(now);
        vec![Action::SendClear]
    }

    fn finalize_turn(&mut self, started: Instant, last_loud: Instant) -> Vec<Action> {
        self.speech_started_at = None;
        self.last_loud_at = None;

        let speech = last_loud.duration_since(started);
        if speech < self.config.min_speech() {
            tracing::debug!(
                stream_sid = %self.stream_sid,
                speech_ms = speech.as_millis() as u64,
                "utterance below minimum speech duration; discarded"
            );
            self.audio.clear();
            self.state = CallState::Listening;
            return Vec::new();
        }

        self.state = CallState::Processing;
        self.interrupted = false;
        self.turn_seq += 1;
        let audio = std::mem::take(&mut self.audio);
        tracing::info!(
            stream_sid = %self.stream_sid,
            turn = self.turn_seq,
            bytes = audio.len(),
            "turn finalized"
        );
        vec![Action::StartTurn {
            turn: self.turn_seq,
            audio,
        }]
    }

    fn on_greeting_audio(&mut self, audio: Vec<u8>) -> Vec<Action> {
        if self.state != CallState::Greeting {
            return Vec::new();
        }
        let guard = CancellationToken::new();
        self.send_guard = Some(guard.clone());
        self.current_mark = Some(GREETING_MARK.to_string());
        vec![Action::Speak {
            mark: GREETING_MARK.to_string(),
            audio,
            guard,
        }]
    }

    fn on_greeting_timeout(&mut self) -> Vec<Action> {
        if self.state == CallState::Greeting {
            tracing::warn!(
                stream_sid = %self.stream_sid,
                "greeting confirmation never arrived; opening mic anyway"
            );
            self.current_mark = None;
            self.state = CallState::Listening;
        }
        Vec::new()
    }

    fn on_speak_ready(&mut self, turn: u64, output: TurnOutput) -> Vec<Action> {
        if self.state != CallState::Processing || turn != self.turn_seq {
            tracing::debug!(
                stream_sid = %self.stream_sid,
                turn,
                "discarding pipeline result for abandoned turn"
            );
            return Vec::new();
        }

        if let Some((user_text, reply_text)) = output.exchange {
            self.language = Some(output.language);
            self.first_turn = false;
            self.history.push(ChatTurn::user(user_text));
            self.history.push(ChatTurn::assistant(reply_text));
        }

        self.state = CallState::Speaking;
        let mark = format!("turn-{}", turn);
        self.current_mark = Some(mark.clone());
        let guard = CancellationToken::new();
        self.send_guard = Some(guard.clone());
        vec![Action::Speak {
            mark,
            audio: output.audio,
            guard,
        }]
    }

    fn on_speak_failed(&mut self, turn: u64) -> Vec<Action> {
        if self.state == CallState::Processing && turn == self.turn_seq {
            self.state = CallState::Listening;
        }
        Vec::new()
    }

    fn on_mark(&mut self, name: &str) -> Vec<Action> {
        let expected = self.current_mark.as_deref() == Some(name);
        match self.state {
            CallState::Greeting | CallState::Speaking if expected => {
                tracing::debug!(stream_sid = %self.stream_sid, mark = %name, "playback confirmed");
                self.current_mark = None;
                self.send_guard = None;
                self.state = CallState::Listening;
            }
            _ => {
                // Stale marker from an aborted response, or one echoed after
                // teardown began. Either way it means nothing now.
                tracing::debug!(stream_sid = %self.stream_sid, mark = %name, "stale mark ignored");
            }
        }
        Vec::new()
    }

    fn reset(&mut self) {
        tracing::info!(stream_sid = %self.stream_sid, "session reset");
        if let Some(guard) = self.send_guard.take() {
            guard.cancel();
        }
        self.state = CallState::Idle;
        self.audio.clear();
        self.history.clear();
        self.language = None;
        self.first_turn = true;
        self.interrupted = false;
        self.current_mark = None;
        self.speech_started_at = None;
        self.last_loud_at = None;
    }
}
