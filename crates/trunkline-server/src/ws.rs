//! WebSocket endpoint carrying the provider's media stream.
//!
//! One socket is one call. The read loop parses inbound wire messages and
//! forwards them to the injected [`SessionManager`]; a paired task drains
//! the session's outbound frames back onto the socket. Unparseable messages
//! are logged and dropped without touching the connection, and teardown is
//! routed through `SessionManager::stop_session`, which is idempotent across
//! the stop-message and socket-close paths.

use crate::protocol::{InboundMessage, OutboundMessage};
use crate::AppState;
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Extension, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use base64::Engine;
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use trunkline_session::{CallEvent, OutboundFrame};

/// Capacity of the per-call outbound frame channel. At 50 chunks/s this is
/// several seconds of audio; past it the send task is wedged and frames are
/// dropped.
const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

/// `GET /call/stream`: the provider connects here after the call webhook
/// returns a stream-connect response.
pub async fn call_stream_handler(
    Extension(state): Extension<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_stream(socket, state))
}

/// Spawns the task that serializes session output onto the socket.
///
/// The task ends when the driver drops its sender or the socket dies; in
/// either case remaining sends become no-ops rather than errors.
fn spawn_send_task(
    mut sink: SplitSink<WebSocket, WsMessage>,
    stream_sid: String,
    mut outbound_rx: mpsc::Receiver<OutboundFrame>,
) {
    tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let message = OutboundMessage::from_frame(&stream_sid, frame);
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!(
                        stream_sid = %stream_sid,
                        "failed to serialize outbound message: {}",
                        e
                    );
                    continue;
                }
            };
            if sink.send(WsMessage::Text(json.into())).await.is_err() {
                // Socket is gone; the session is tearing down concurrently.
                break;
            }
        }
    });
}

async fn handle_stream(socket: WebSocket, state: Arc<AppState>) {
    let (sink, mut receiver) = socket.split();
    // The stream SID arrives in the `start` message; the sink is parked
    // until then.
    let mut parked_sink = Some(sink);
    let mut stream_sid: Option<String> = None;

    while let Some(Ok(message)) = receiver.next().await {
        let text = match message {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            // Ping/pong are handled by axum; binary has no meaning here.
            _ => continue,
        };

        let inbound = match serde_json::from_str::<InboundMessage>(&text) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::warn!("dropping unparseable transport message: {}", e);
                continue;
            }
        };

        match inbound {
            InboundMessage::Connected { protocol, version } => {
                tracing::debug!(
                    protocol = protocol.as_deref().unwrap_or("?"),
                    version = version.as_deref().unwrap_or("?"),
                    "transport handshake acknowledged"
                );
            }

            InboundMessage::Start {
                stream_sid: sid,
                start,
            } => {
                let Some(sink) = parked_sink.take() else {
                    tracing::warn!(
                        stream_sid = %sid,
                        "second start message on one connection ignored"
                    );
                    continue;
                };
                if let Some(format) = &start.media_format {
                    if format.encoding != "audio/x-mulaw" || format.sample_rate != 8000 {
                        tracing::warn!(
                            stream_sid = %sid,
                            encoding = %format.encoding,
                            sample_rate = format.sample_rate,
                            "unexpected media format; proceeding as 8 kHz mu-law"
                        );
                    }
                }
                tracing::info!(
                    stream_sid = %sid,
                    call_sid = %start.call_sid,
                    params = start.custom_parameters.len(),
                    "media stream started"
                );

                let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
                spawn_send_task(sink, sid.clone(), outbound_rx);
                state
                    .sessions
                    .start_session(&sid, &start.call_sid, outbound_tx)
                    .await;
                stream_sid = Some(sid);
            }

            InboundMessage::Media {
                stream_sid: sid,
                media,
            } => match base64::engine::general_purpose::STANDARD.decode(&media.payload) {
                Ok(frame) => {
                    state
                        .sessions
                        .dispatch(&sid, CallEvent::Media { frame })
                        .await;
                }
                Err(e) => {
                    tracing::warn!(stream_sid = %sid, "dropping undecodable media frame: {}", e);
                }
            },

            InboundMessage::Mark {
                stream_sid: sid,
                mark,
            } => {
                state
                    .sessions
                    .dispatch(&sid, CallEvent::MarkEchoed { name: mark.name })
                    .await;
            }

            InboundMessage::Dtmf {
                stream_sid: sid,
                dtmf,
            } => {
                state
                    .sessions
                    .dispatch(&sid, CallEvent::Dtmf { digit: dtmf.digit })
                    .await;
            }

            InboundMessage::Stop {
                stream_sid: sid, ..
            } => {
                state.sessions.stop_session(&sid).await;
                stream_sid = None;
            }
        }
    }

    // Socket closed (or errored) without a stop message.
    if let Some(sid) = stream_sid {
        state.sessions.stop_session(&sid).await;
    }
}
