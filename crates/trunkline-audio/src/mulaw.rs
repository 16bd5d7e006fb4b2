//! G.711 μ-law companding.
//!
//! μ-law encodes 16-bit linear PCM into 8 bits with logarithmic quantization,
//! halving bandwidth at the cost of bounded quantization error. The encoder
//! follows the ITU-T G.711 segmented approximation: bias the magnitude,
//! locate the segment (exponent), keep four mantissa bits, and invert the
//! result on the wire.

/// Encoding bias added to the magnitude before segment lookup.
const BIAS: i32 = 0x84;

/// Largest magnitude the codec can represent; louder samples are clipped.
const CLIP: i32 = 32635;

/// The μ-law code for a zero sample. Silence on the line is a run of these.
pub const MULAW_SILENCE: u8 = 0xFF;

/// Encodes one 16-bit linear PCM sample as an 8-bit μ-law byte.
pub fn linear_to_mulaw(sample: i16) -> u8 {
    let mut value = i32::from(sample);
    let sign: u8 = if value < 0 {
        value = -value;
        0x80
    } else {
        0
    };
    if value > CLIP {
        value = CLIP;
    }
    value += BIAS;

    // Segment = index of the highest set bit above bit 7.
    let mut exponent: u8 = 7;
    let mut mask = 0x4000;
    while exponent > 0 && value & mask == 0 {
        exponent -= 1;
        mask >>= 1;
    }

    let mantissa = ((value >> (exponent + 3)) & 0x0F) as u8;
    !(sign | (exponent << 4) | mantissa)
}

/// Decodes one 8-bit μ-law byte back to a 16-bit linear PCM sample.
pub fn mulaw_to_linear(byte: u8) -> i16 {
    let byte = !byte;
    let sign = byte & 0x80;
    let exponent = (byte >> 4) & 0x07;
    let mantissa = i32::from(byte & 0x0F);

    let magnitude = (((mantissa << 3) + BIAS) << exponent) - BIAS;
    if sign != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

/// Expands a μ-law buffer to 16-bit little-endian PCM. Output is exactly
/// twice the input length.
pub fn mulaw_to_pcm(mulaw: &[u8]) -> Vec<u8> {
    let mut pcm = Vec::with_capacity(mulaw.len() * 2);
    for &byte in mulaw {
        pcm.extend_from_slice(&mulaw_to_linear(byte).to_le_bytes());
    }
    pcm
}

/// Compands 16-bit little-endian PCM to μ-law. Output is exactly half the
/// input length; a trailing odd byte is ignored.
pub fn pcm_to_mulaw(pcm: &[u8]) -> Vec<u8> {
    let mut mulaw = Vec::with_capacity(pcm.len() / 2);
    for pair in pcm.chunks_exact(2) {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        mulaw.push(linear_to_mulaw(sample));
    }
    mulaw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_round_trips_exactly() {
        assert_eq!(linear_to_mulaw(0), MULAW_SILENCE);
        assert_eq!(mulaw_to_linear(MULAW_SILENCE), 0);
    }

    #[test]
    fn round_trip_error_is_bounded() {
        // Representative magnitudes across the range; μ-law quantization
        // error should stay under 10% relative for anything audible.
        for &value in &[
            100i16, -100, 500, -500, 1000, -1000, 4000, -4000, 8000, -8000, 16000, -16000, 30000,
            -30000, 32000, -32000,
        ] {
            let decoded = i32::from(mulaw_to_linear(linear_to_mulaw(value)));
            let error = (decoded - i32::from(value)).abs() as f64;
            let relative = error / f64::from(value).abs();
            assert!(
                relative < 0.10,
                "value {} decoded to {} (relative error {:.3})",
                value,
                decoded,
                relative
            );
        }
    }

    #[test]
    fn extremes_are_clipped_not_wrapped() {
        let max = mulaw_to_linear(linear_to_mulaw(i16::MAX));
        let min = mulaw_to_linear(linear_to_mulaw(i16::MIN));
        assert!(max > 30000);
        assert!(min < -30000);
    }

    #[test]
    fn buffer_conversions_scale_length() {
        let mulaw = vec![0x55u8; 160];
        let pcm = mulaw_to_pcm(&mulaw);
        assert_eq!(pcm.len(), 320);
        assert_eq!(pcm_to_mulaw(&pcm).len(), 160);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(mulaw_to_pcm(&[]).is_empty());
        assert!(pcm_to_mulaw(&[]).is_empty());
    }

    #[test]
    fn decode_then_encode_is_stable() {
        // Every code decodes to a sample that encodes back to itself: the
        // decoder output sits at the center of its quantization interval.
        for code in 0u8..=255 {
            let sample = mulaw_to_linear(code);
            let reencoded = linear_to_mulaw(sample);
            // 0x7F and 0xFF both decode to 0; encoding 0 yields 0xFF.
            if code == 0x7F {
                assert_eq!(reencoded, 0xFF);
            } else {
                assert_eq!(reencoded, code, "code {:#04x} was not stable", code);
            }
        }
    }
}
