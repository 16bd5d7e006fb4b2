//! External speech and reasoning stage contracts.
//!
//! A caller turn passes through four backends in strict sequence:
//! transcription, translation into English, LLM reasoning over the
//! conversation history, translation back, and speech synthesis. Each
//! stage's output is the next stage's required input, so the contract is a
//! plain sequential trait rather than anything stream-shaped.
//!
//! The session crate consumes [`SpeechPipeline`] as a trait object, which is
//! what lets the state machine be exercised in tests with a scripted
//! pipeline instead of live HTTP backends.

mod config;
mod error;
mod http;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use http::HttpSpeechPipeline;

use async_trait::async_trait;
use trunkline_types::{ChatTurn, Language};

/// Result of the transcription stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    /// Recognized text; may be empty when the audio carried no speech.
    pub text: String,
    /// Language the recognizer detected, when it reported one.
    pub language: Option<Language>,
}

/// The four external stages a turn is driven through.
#[async_trait]
pub trait SpeechPipeline: Send + Sync {
    /// Transcribes a WAV-framed utterance. `language: None` asks the backend
    /// to auto-detect (the first turn of every call does this).
    async fn transcribe(
        &self,
        wav: Vec<u8>,
        language: Option<Language>,
    ) -> Result<Transcript, PipelineError>;

    /// Translates `text` between two supported languages.
    async fn translate(
        &self,
        text: &str,
        from: Language,
        to: Language,
    ) -> Result<String, PipelineError>;

    /// Produces the assistant reply for the conversation so far.
    async fn reason(&self, history: &[ChatTurn]) -> Result<String, PipelineError>;

    /// Synthesizes `text` as 16-bit mono linear PCM at 24 kHz.
    async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>, PipelineError>;
}
