//! Minimal WAV container framing.
//!
//! The transcription backend wants a self-describing container, not raw
//! samples. This writes the smallest valid RIFF/WAVE header for 16-bit mono
//! PCM; declared chunk sizes always match the payload exactly.

/// Wraps raw 16-bit mono little-endian PCM in a 44-byte WAV header.
pub fn wav_wrap(pcm: &[u8], sample_rate: u32) -> Vec<u8> {
    let data_len = pcm.len() as u32;
    let byte_rate = sample_rate * 2; // mono, 2 bytes per sample
    let mut wav = Vec::with_capacity(44 + pcm.len());

    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes()); // block align
    wav.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(pcm);

    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_44_bytes_and_sizes_match() {
        let pcm = vec![0u8; 320];
        let wav = wav_wrap(&pcm, 8000);
        assert_eq!(wav.len(), 44 + 320);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), 36 + 320);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 320);
    }

    #[test]
    fn sample_rate_fields_are_encoded() {
        for rate in [8000u32, 16000, 24000, 44100] {
            let wav = wav_wrap(&[], rate);
            assert_eq!(u32::from_le_bytes(wav[24..28].try_into().unwrap()), rate);
            assert_eq!(
                u32::from_le_bytes(wav[28..32].try_into().unwrap()),
                rate * 2
            );
        }
    }

    #[test]
    fn empty_payload_still_yields_valid_header() {
        let wav = wav_wrap(&[], 8000);
        assert_eq!(wav.len(), 44);
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 0);
    }
}
