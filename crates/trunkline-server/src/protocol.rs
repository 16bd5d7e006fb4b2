//! Wire model of the telephony provider's media-stream protocol.
//!
//! One persistent WebSocket carries one call. Messages are JSON objects
//! discriminated by an `event` field; audio payloads are base64-encoded
//! μ-law. Parsing and serialization live entirely in this layer: the
//! session never sees wire bytes, and a malformed message is dropped here
//! without disturbing the connection.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use trunkline_session::OutboundFrame;

/// Declared format of the inbound audio track.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaFormat {
    pub encoding: String,
    #[serde(rename = "sampleRate")]
    pub sample_rate: u32,
    pub channels: u32,
}

/// Metadata carried by the `start` message.
#[derive(Debug, Clone, Deserialize)]
pub struct StartMeta {
    #[serde(rename = "callSid")]
    pub call_sid: String,
    #[serde(rename = "mediaFormat")]
    pub media_format: Option<MediaFormat>,
    /// Arbitrary parameters the call webhook attached (caller number, etc.).
    #[serde(rename = "customParameters", default)]
    pub custom_parameters: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaPayload {
    /// Base64-encoded μ-law frame.
    pub payload: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkPayload {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DtmfPayload {
    pub digit: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopMeta {
    #[serde(rename = "callSid")]
    pub call_sid: Option<String>,
}

/// Every message the provider can send us.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum InboundMessage {
    /// Handshake acknowledgement; informational only.
    Connected {
        protocol: Option<String>,
        version: Option<String>,
    },
    /// The media stream began; creates the session.
    Start {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        start: StartMeta,
    },
    /// One ~20 ms audio frame.
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: MediaPayload,
    },
    /// A previously queued marker finished playing on the line.
    Mark {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        mark: MarkPayload,
    },
    /// Touch-tone digit.
    Dtmf {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        dtmf: DtmfPayload,
    },
    /// The stream ended; tears the session down.
    Stop {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        stop: Option<StopMeta>,
    },
}

#[derive(Debug, Serialize)]
pub struct OutboundMedia {
    pub payload: String,
}

/// Every message we send to the provider.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutboundMessage {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutboundMedia,
    },
    Mark {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        mark: MarkPayload,
    },
    /// Discard all audio still queued for playback. Sent on barge-in.
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

impl OutboundMessage {
    /// Serializes a session-level outbound frame for one stream.
    pub fn from_frame(stream_sid: &str, frame: OutboundFrame) -> Self {
        use base64::Engine;
        match frame {
            OutboundFrame::Media(bytes) => OutboundMessage::Media {
                stream_sid: stream_sid.to_string(),
                media: OutboundMedia {
                    payload: base64::engine::general_purpose::STANDARD.encode(bytes),
                },
            },
            OutboundFrame::Mark(name) => OutboundMessage::Mark {
                stream_sid: stream_sid.to_string(),
                mark: MarkPayload { name },
            },
            OutboundFrame::Clear => OutboundMessage::Clear {
                stream_sid: stream_sid.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    #[test]
    fn start_message_parses_with_custom_parameters() {
        let json = r#"{
            "event": "start",
            "streamSid": "MZ123",
            "start": {
                "callSid": "CA456",
                "mediaFormat": {"encoding": "audio/x-mulaw", "sampleRate": 8000, "channels": 1},
                "customParameters": {"caller": "+15550100"}
            }
        }"#;
        match serde_json::from_str::<InboundMessage>(json).unwrap() {
            InboundMessage::Start { stream_sid, start } => {
                assert_eq!(stream_sid, "MZ123");
                assert_eq!(start.call_sid, "CA456");
                let format = start.media_format.unwrap();
                assert_eq!(format.encoding, "audio/x-mulaw");
                assert_eq!(format.sample_rate, 8000);
                assert_eq!(start.custom_parameters["caller"], "+15550100");
            }
            other => panic!("expected start, got {:?}", other),
        }
    }

    #[test]
    fn media_message_parses_base64_payload() {
        let payload = base64::engine::general_purpose::STANDARD.encode([0xFFu8; 160]);
        let json = format!(
            r#"{{"event": "media", "streamSid": "MZ1", "media": {{"payload": "{}"}}}}"#,
            payload
        );
        match serde_json::from_str::<InboundMessage>(&json).unwrap() {
            InboundMessage::Media { media, .. } => {
                let decoded = base64::engine::general_purpose::STANDARD
                    .decode(media.payload)
                    .unwrap();
                assert_eq!(decoded, vec![0xFF; 160]);
            }
            other => panic!("expected media, got {:?}", other),
        }
    }

    #[test]
    fn mark_and_dtmf_and_stop_parse() {
        let mark = r#"{"event": "mark", "streamSid": "MZ1", "mark": {"name": "turn-1"}}"#;
        assert!(matches!(
            serde_json::from_str::<InboundMessage>(mark).unwrap(),
            InboundMessage::Mark { .. }
        ));

        let dtmf = r#"{"event": "dtmf", "streamSid": "MZ1", "dtmf": {"digit": "5"}}"#;
        assert!(matches!(
            serde_json::from_str::<InboundMessage>(dtmf).unwrap(),
            InboundMessage::Dtmf { .. }
        ));

        let stop = r#"{"event": "stop", "streamSid": "MZ1", "stop": {"callSid": "CA1"}}"#;
        assert!(matches!(
            serde_json::from_str::<InboundMessage>(stop).unwrap(),
            InboundMessage::Stop { .. }
        ));
    }

    #[test]
    fn unknown_event_fails_to_parse() {
        let json = r#"{"event": "telemetry", "streamSid": "MZ1"}"#;
        assert!(serde_json::from_str::<InboundMessage>(json).is_err());
        assert!(serde_json::from_str::<InboundMessage>("not json at all").is_err());
    }

    #[test]
    fn outbound_media_round_trips_payload() {
        let msg = OutboundMessage::from_frame("MZ9", OutboundFrame::Media(vec![1, 2, 3]));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["event"], "media");
        assert_eq!(json["streamSid"], "MZ9");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(json["media"]["payload"].as_str().unwrap())
            .unwrap();
        assert_eq!(decoded, vec![1, 2, 3]);
    }

    #[test]
    fn outbound_mark_and_clear_serialize_with_event_tags() {
        let mark = OutboundMessage::from_frame("MZ9", OutboundFrame::Mark("turn-3".to_string()));
        let json = serde_json::to_value(&mark).unwrap();
        assert_eq!(json["event"], "mark");
        assert_eq!(json["mark"]["name"], "turn-3");

        let clear = OutboundMessage::from_frame("MZ9", OutboundFrame::Clear);
        let json = serde_json::to_value(&clear).unwrap();
        assert_eq!(json["event"], "clear");
        assert_eq!(json["streamSid"], "MZ9");
    }
}
