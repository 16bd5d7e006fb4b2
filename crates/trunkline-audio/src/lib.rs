//! Audio codec and DSP primitives for the telephony media path.
//!
//! Everything here is sample math on byte buffers: G.711 μ-law companding
//! (the telephony line format), WAV framing for the transcription backend,
//! a 24 kHz → 8 kHz downsampler for synthesis output, and the RMS energy
//! measure the session uses for voice activity detection.
//!
//! The crate is deliberately dependency-free and synchronous; callers own
//! all buffering and scheduling.

mod dsp;
mod mulaw;
mod wav;

pub use dsp::{downsample_to_telephony, energy, silence};
pub use mulaw::{linear_to_mulaw, mulaw_to_linear, mulaw_to_pcm, pcm_to_mulaw, MULAW_SILENCE};
pub use wav::wav_wrap;

/// Sample rate of the telephony line (G.711).
pub const TELEPHONY_SAMPLE_RATE: u32 = 8000;

/// Sample rate of PCM produced by the synthesis backend.
pub const SYNTHESIS_SAMPLE_RATE: u32 = 24000;

/// Bytes per 20 ms μ-law frame at 8 kHz mono.
pub const FRAME_BYTES: usize = 160;
