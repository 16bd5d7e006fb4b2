use serde::Deserialize;
use std::time::Duration;

fn default_speech_threshold() -> f64 {
    500.0
}

fn default_interrupt_multiplier() -> f64 {
    1.5
}

fn default_silence_trigger_ms() -> u64 {
    1500
}

fn default_min_speech_ms() -> u64 {
    400
}

fn default_greeting_timeout_ms() -> u64 {
    8000
}

fn default_chunk_bytes() -> usize {
    160
}

fn default_chunk_interval_ms() -> u64 {
    20
}

fn default_greeting_text() -> String {
    "Hello! You have reached the medical information line. How can I help you today?".to_string()
}

fn default_apology_text() -> String {
    "Sorry, I did not catch that. Could you please repeat?".to_string()
}

/// Tunables for one call session.
///
/// The voice-activity thresholds and turn-boundary durations are deployment
/// knobs, not compile-time constants: the right values depend on line noise
/// and the callers' speaking style.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// RMS energy above which an inbound frame counts as speech.
    #[serde(default = "default_speech_threshold")]
    pub speech_threshold: f64,

    /// Multiplier applied to `speech_threshold` while the engine is
    /// speaking. The line leaks the engine's own voice back into the
    /// inbound channel; a stricter bar keeps it from interrupting itself.
    #[serde(default = "default_interrupt_multiplier")]
    pub interrupt_multiplier: f64,

    /// Silence after the last loud frame that ends the caller's turn.
    #[serde(default = "default_silence_trigger_ms")]
    pub silence_trigger_ms: u64,

    /// Shortest speech span treated as a real utterance; anything shorter
    /// is discarded as line noise.
    #[serde(default = "default_min_speech_ms")]
    pub min_speech_ms: u64,

    /// Fallback for a greeting whose playback confirmation never arrives.
    #[serde(default = "default_greeting_timeout_ms")]
    pub greeting_timeout_ms: u64,

    /// Bytes per outbound media chunk (160 = 20 ms at 8 kHz μ-law).
    #[serde(default = "default_chunk_bytes")]
    pub chunk_bytes: usize,

    /// Pacing interval between outbound chunks. Also bounds how long a
    /// cancelled send keeps talking.
    #[serde(default = "default_chunk_interval_ms")]
    pub chunk_interval_ms: u64,

    /// Utterance spoken when the stream starts.
    #[serde(default = "default_greeting_text")]
    pub greeting_text: String,

    /// Utterance spoken when the pipeline fails mid-turn.
    #[serde(default = "default_apology_text")]
    pub apology_text: String,

    /// Abort the in-flight pipeline task when the caller barges in or the
    /// call ends. Off by default: late results are simply discarded by the
    /// turn-relevance check, at the cost of wasted backend work.
    #[serde(default)]
    pub cancel_upstream_on_interrupt: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            speech_threshold: default_speech_threshold(),
            interrupt_multiplier: default_interrupt_multiplier(),
            silence_trigger_ms: default_silence_trigger_ms(),
            min_speech_ms: default_min_speech_ms(),
            greeting_timeout_ms: default_greeting_timeout_ms(),
            chunk_bytes: default_chunk_bytes(),
            chunk_interval_ms: default_chunk_interval_ms(),
            greeting_text: default_greeting_text(),
            apology_text: default_apology_text(),
            cancel_upstream_on_interrupt: false,
        }
    }
}

impl SessionConfig {
    /// Energy bar for barge-in while the engine is speaking.
    pub fn interrupt_threshold(&self) -> f64 {
        self.speech_threshold * self.interrupt_multiplier
    }

    pub fn silence_trigger(&self) -> Duration {
        Duration::from_millis(self.silence_trigger_ms)
    }

    pub fn min_speech(&self) -> Duration {
        Duration::from_millis(self.min_speech_ms)
    }

    pub fn greeting_timeout(&self) -> Duration {
        Duration::from_millis(self.greeting_timeout_ms)
    }

    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms)
    }
}
