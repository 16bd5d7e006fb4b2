//! HTTP implementation of the stage contracts.

use crate::{PipelineConfig, PipelineError, SpeechPipeline, Transcript};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use trunkline_types::{ChatTurn, Language, VoiceSelection};

/// Maximum audio upload for transcription (10 MiB). Prevents OOM from
/// oversized payloads.
const MAX_TRANSCRIBE_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// Maximum text size for translation and synthesis requests (4 KiB). A
/// spoken reply is a couple of sentences; anything larger is a bug upstream.
const MAX_TEXT_INPUT_BYTES: usize = 4 * 1024;

/// Language code the speech backend treats as "detect it yourself".
const AUTO_DETECT_CODE: &str = "unknown";

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    transcript: String,
    language_code: Option<String>,
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    input: &'a str,
    source_language_code: &'a str,
    target_language_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translated_text: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    target_language_code: &'a str,
    model: &'a str,
    speaker: &'a str,
    speech_sample_rate: u32,
}

#[derive(Debug, Deserialize)]
struct SynthesizeResponse {
    /// Base64-encoded 16-bit mono PCM chunks, in order.
    audios: Vec<String>,
}

/// Stage clients backed by the real speech and reasoning services.
#[derive(Debug, Clone)]
pub struct HttpSpeechPipeline {
    config: PipelineConfig,
    client: reqwest::Client,
}

impl HttpSpeechPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn with_timeout<T>(
        &self,
        timeout: Duration,
        fut: impl std::future::Future<Output = Result<T, PipelineError>> + Send,
    ) -> Result<T, PipelineError> {
        tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| PipelineError::Timeout(timeout))?
    }
}

#[async_trait]
impl SpeechPipeline for HttpSpeechPipeline {
    async fn transcribe(
        &self,
        wav: Vec<u8>,
        language: Option<Language>,
    ) -> Result<Transcript, PipelineError> {
        if wav.len() > MAX_TRANSCRIBE_INPUT_BYTES {
            return Err(PipelineError::OversizedInput {
                size: wav.len(),
                limit: MAX_TRANSCRIBE_INPUT_BYTES,
            });
        }

        let language_code = language.map(Language::tag).unwrap_or(AUTO_DETECT_CODE);
        let model = VoiceSelection::for_language(language.unwrap_or_default()).stt_model;

        let url = format!("{}/speech-to-text", self.config.speech_base_url);
        let request = async {
            let file = reqwest::multipart::Part::bytes(wav)
                .file_name("utterance.wav")
                .mime_str("audio/wav")?;
            let form = reqwest::multipart::Form::new()
                .part("file", file)
                .text("model", model)
                .text("language_code", language_code);

            let response = self
                .client
                .post(&url)
                .header("api-subscription-key", &self.config.speech_api_key)
                .multipart(form)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(PipelineError::Transcribe(format!(
                    "backend returned {}",
                    response.status()
                )));
            }

            let body: TranscribeResponse = response.json().await?;
            let transcript = Transcript {
                language: body.language_code.as_deref().and_then(Language::from_tag),
                text: body.transcript.trim().to_string(),
            };
            tracing::debug!(
                chars = transcript.text.len(),
                language = transcript.language.map(|l| l.code()).unwrap_or("?"),
                "transcription complete"
            );
            Ok(transcript)
        };

        self.with_timeout(self.config.transcribe_timeout(), request)
            .await
    }

    async fn translate(
        &self,
        text: &str,
        from: Language,
        to: Language,
    ) -> Result<String, PipelineError> {
        if text.len() > MAX_TEXT_INPUT_BYTES {
            return Err(PipelineError::OversizedInput {
                size: text.len(),
                limit: MAX_TEXT_INPUT_BYTES,
            });
        }

        let url = format!("{}/translate", self.config.speech_base_url);
        let request = async {
            let response = self
                .client
                .post(&url)
                .header("api-subscription-key", &self.config.speech_api_key)
                .json(&TranslateRequest {
                    input: text,
                    source_language_code: from.tag(),
                    target_language_code: to.tag(),
                })
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(PipelineError::Translate(format!(
                    "backend returned {}",
                    response.status()
                )));
            }

            let body: TranslateResponse = response.json().await?;
            Ok(body.translated_text)
        };

        self.with_timeout(self.config.translate_timeout(), request)
            .await
    }

    async fn reason(&self, history: &[ChatTurn]) -> Result<String, PipelineError> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if !self.config.system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: &self.config.system_prompt,
            });
        }
        messages.extend(history.iter().map(|turn| ChatMessage {
            role: turn.role.label(),
            content: &turn.text,
        }));

        let request = async {
            let response = self
                .client
                .post(&self.config.chat_url)
                .bearer_auth(&self.config.chat_api_key)
                .json(&ChatRequest {
                    model: &self.config.chat_model,
                    messages,
                })
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(PipelineError::Reason(format!(
                    "backend returned {}",
                    response.status()
                )));
            }

            let body: ChatResponse = response.json().await?;
            body.choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content)
                .ok_or_else(|| PipelineError::Response("chat response had no choices".to_string()))
        };

        self.with_timeout(self.config.reason_timeout(), request).await
    }

    async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>, PipelineError> {
        if text.len() > MAX_TEXT_INPUT_BYTES {
            return Err(PipelineError::OversizedInput {
                size: text.len(),
                limit: MAX_TEXT_INPUT_BYTES,
            });
        }

        let voice = VoiceSelection::for_language(language);
        let url = format!("{}/text-to-speech", self.config.speech_base_url);
        let request = async {
            let response = self
                .client
                .post(&url)
                .header("api-subscription-key", &self.config.speech_api_key)
                .json(&SynthesizeRequest {
                    text,
                    target_language_code: language.tag(),
                    model: voice.tts_model,
                    speaker: voice.tts_voice,
                    speech_sample_rate: trunkline_audio::SYNTHESIS_SAMPLE_RATE,
                })
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(PipelineError::Synthesize(format!(
                    "backend returned {}",
                    response.status()
                )));
            }

            let body: SynthesizeResponse = response.json().await?;
            let mut pcm = Vec::new();
            for chunk in &body.audios {
                let decoded = base64::engine::general_purpose::STANDARD
                    .decode(chunk)
                    .map_err(|e| {
                        PipelineError::Response(format!("synthesis audio was not base64: {}", e))
                    })?;
                pcm.extend_from_slice(&decoded);
            }
            tracing::debug!(bytes = pcm.len(), "synthesis complete");
            Ok(pcm)
        };

        self.with_timeout(self.config.synthesize_timeout(), request)
            .await
    }
}
