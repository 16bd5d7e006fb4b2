use serde::Deserialize;
use std::fmt;
use std::time::Duration;

fn default_transcribe_timeout_ms() -> u64 {
    20_000
}

fn default_translate_timeout_ms() -> u64 {
    10_000
}

fn default_reason_timeout_ms() -> u64 {
    30_000
}

fn default_synthesize_timeout_ms() -> u64 {
    20_000
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Endpoints and credentials for the four external stages.
///
/// The speech backend (transcribe / translate / synthesize) shares one base
/// URL and subscription key; the reasoning backend is an OpenAI-style chat
/// endpoint with its own key.
#[derive(Clone, Deserialize)]
pub struct PipelineConfig {
    /// Base URL of the speech backend.
    pub speech_base_url: String,

    /// Subscription key sent to the speech backend.
    pub speech_api_key: String,

    /// Full URL of the chat-completions endpoint.
    pub chat_url: String,

    /// Bearer token for the reasoning backend.
    pub chat_api_key: String,

    /// Model name passed to the reasoning backend.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// System prompt prepended to every reasoning call.
    #[serde(default)]
    pub system_prompt: String,

    #[serde(default = "default_transcribe_timeout_ms")]
    pub transcribe_timeout_ms: u64,

    #[serde(default = "default_translate_timeout_ms")]
    pub translate_timeout_ms: u64,

    #[serde(default = "default_reason_timeout_ms")]
    pub reason_timeout_ms: u64,

    #[serde(default = "default_synthesize_timeout_ms")]
    pub synthesize_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            speech_base_url: "https://api.sarvam.ai".to_string(),
            speech_api_key: String::new(),
            chat_url: "https://api.openai.com/v1/chat/completions".to_string(),
            chat_api_key: String::new(),
            chat_model: default_chat_model(),
            system_prompt: String::new(),
            transcribe_timeout_ms: default_transcribe_timeout_ms(),
            translate_timeout_ms: default_translate_timeout_ms(),
            reason_timeout_ms: default_reason_timeout_ms(),
            synthesize_timeout_ms: default_synthesize_timeout_ms(),
        }
    }
}

impl PipelineConfig {
    pub fn transcribe_timeout(&self) -> Duration {
        Duration::from_millis(self.transcribe_timeout_ms)
    }

    pub fn translate_timeout(&self) -> Duration {
        Duration::from_millis(self.translate_timeout_ms)
    }

    pub fn reason_timeout(&self) -> Duration {
        Duration::from_millis(self.reason_timeout_ms)
    }

    pub fn synthesize_timeout(&self) -> Duration {
        Duration::from_millis(self.synthesize_timeout_ms)
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("speech_base_url", &self.speech_base_url)
            .field("speech_api_key", &"[REDACTED]")
            .field("chat_url", &self.chat_url)
            .field("chat_api_key", &"[REDACTED]")
            .field("chat_model", &self.chat_model)
            .field("transcribe_timeout_ms", &self.transcribe_timeout_ms)
            .field("translate_timeout_ms", &self.translate_timeout_ms)
            .field("reason_timeout_ms", &self.reason_timeout_ms)
            .field("synthesize_timeout_ms", &self.synthesize_timeout_ms)
            .finish()
    }
}
