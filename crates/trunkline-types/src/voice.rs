//! Per-language voice and model selection.
//!
//! The speech backends expose several recognition models and synthesis
//! voices; which one fits depends on the caller's language. A
//! `VoiceSelection` maps a [`Language`] to the concrete backend identifiers
//! used for that call.

use crate::Language;
use serde::{Deserialize, Serialize};

/// Backend identifiers chosen for one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSelection {
    /// Recognition model passed to the transcription backend.
    pub stt_model: &'static str,
    /// Synthesis model passed to the speech backend.
    pub tts_model: &'static str,
    /// Speaker voice within the synthesis model.
    pub tts_voice: &'static str,
}

impl VoiceSelection {
    /// Returns the voice and model identifiers for a language.
    ///
    /// English gets the larger recognition model; the Indic languages share
    /// the multilingual one. Voices were picked per language for
    /// intelligibility on a narrowband line, not for flourish.
    pub fn for_language(lang: Language) -> Self {
        match lang {
            Language::English => Self {
                stt_model: "saarika:v2",
                tts_model: "bulbul:v2",
                tts_voice: "anushka",
            },
            Language::Hindi | Language::Marathi | Language::Gujarati | Language::Punjabi => Self {
                stt_model: "saarika:v2",
                tts_model: "bulbul:v2",
                tts_voice: "manisha",
            },
            Language::Bengali => Self {
                stt_model: "saarika:v2",
                tts_model: "bulbul:v2",
                tts_voice: "arya",
            },
            Language::Tamil | Language::Malayalam => Self {
                stt_model: "saarika:v2",
                tts_model: "bulbul:v2",
                tts_voice: "vidya",
            },
            Language::Telugu | Language::Kannada => Self {
                stt_model: "saarika:v2",
                tts_model: "bulbul:v2",
                tts_voice: "karun",
            },
        }
    }
}
