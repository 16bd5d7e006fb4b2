use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("transcription failed: {0}")]
    Transcribe(String),

    #[error("translation failed: {0}")]
    Translate(String),

    #[error("reasoning failed: {0}")]
    Reason(String),

    #[error("synthesis failed: {0}")]
    Synthesize(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("stage timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed backend response: {0}")]
    Response(String),

    #[error("input exceeds maximum size: {size} bytes (limit: {limit} bytes)")]
    OversizedInput { size: usize, limit: usize },
}
