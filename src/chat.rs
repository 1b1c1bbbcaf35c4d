use axum::{
    body::Body,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures::Stream;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::gemini::{build_upstream_request, fragment_text, stream_url, ChatRequest, GenerateContentResponse};
use crate::sse::SseDecoder;
use crate::state::RelayState;
use crate::stream::StreamEvent;

/// Error raised before the response has started streaming.
///
/// Once chat_handler returns Ok, the headers are committed and failures can
/// only surface as a terminal NDJSON `error` line inside the relay task; this
/// type never appears on that path. That split is the whole two-phase error
/// model: pre-stream errors are the handler's Err, mid-stream errors are
/// stream events.
#[derive(Debug)]
pub struct ChatError {
    pub status: StatusCode,
    pub message: String,
}

impl ChatError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// POST /api/chat — stream a Gemini completion back as NDJSON.
pub async fn chat_handler(
    State(state): State<RelayState>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, ChatError> {
    // Each request owns an independent upstream session.
    let session = Uuid::new_v4();
    info!(
        "💬 [{}] chat request: {} message(s), system instruction: {}",
        session,
        req.contents.len(),
        req.system_instruction.is_some()
    );

    if req.contents.is_empty() {
        warn!("⚠️  [{}] rejected: empty contents", session);
        return Err(ChatError::bad_request("contents must be a non-empty array of messages"));
    }

    let api_key = state.config.gemini_api_key.as_deref().ok_or_else(|| {
        error!("❌ [{}] GEMINI_API_KEY is not configured", session);
        ChatError::internal("GEMINI_API_KEY is not configured")
    })?;

    let url = stream_url(&state.config.gemini_api_base, &state.config.gemini_model);
    let upstream = state
        .client
        .post(&url)
        .header("x-goog-api-key", api_key)
        .json(&build_upstream_request(req))
        .send()
        .await
        .map_err(|e| {
            error!("❌ [{}] upstream request failed: {}", session, e);
            ChatError::internal(format!("upstream request failed: {}", e))
        })?;

    let status = upstream.status();
    if !status.is_success() {
        let body = upstream.bytes().await.unwrap_or_default();
        let message = upstream_error_message(status, &body);
        error!("❌ [{}] upstream rejected request: {}", session, message);
        return Err(ChatError::internal(message));
    }

    // Point of no return: from here the HTTP status is fixed at 200 and the
    // relay task owns all further failure reporting.
    info!("🌊 [{}] upstream accepted, streaming response", session);
    let (tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(32);
    tokio::spawn(relay_fragments(upstream.bytes_stream(), tx, session));

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/x-ndjson")
        .header("Cache-Control", "no-cache")
        .header("Connection", "keep-alive")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .map_err(|e| {
            error!("❌ [{}] failed to build streaming response: {}", session, e);
            ChatError::internal("failed to build streaming response")
        })
}

enum Terminated {
    ClientGone,
    Errored,
}

/// Pump the upstream SSE byte stream into NDJSON lines, one `chunk` per
/// fragment in upstream order, closing with exactly one terminal line.
///
/// A failed channel send means the client went away; returning drops the
/// upstream stream and with it the in-flight provider call.
pub async fn relay_fragments<S, E>(
    upstream: S,
    tx: mpsc::Sender<Result<Bytes, std::io::Error>>,
    session: Uuid,
) where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    tokio::pin!(upstream);

    let mut decoder = SseDecoder::new();
    let mut fragments = 0usize;

    while let Some(result) = upstream.next().await {
        match result {
            Ok(chunk) => {
                let payloads = decoder.feed(&chunk);
                if emit_frames(&tx, payloads, &mut fragments, session).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                error!(
                    "❌ [{}] upstream stream error after {} fragment(s): {}",
                    session, fragments, e
                );
                let _ = send_event(&tx, StreamEvent::Error(format!("upstream stream error: {}", e))).await;
                return;
            }
        }
    }

    // Upstream closed cleanly; flush any unterminated final line.
    if let Some(tail) = decoder.finish() {
        if emit_frames(&tx, vec![tail], &mut fragments, session).await.is_err() {
            return;
        }
    }

    info!("✅ [{}] stream complete: {} fragment(s)", session, fragments);
    let _ = send_event(&tx, StreamEvent::End).await;
}

async fn emit_frames(
    tx: &mpsc::Sender<Result<Bytes, std::io::Error>>,
    payloads: Vec<String>,
    fragments: &mut usize,
    session: Uuid,
) -> Result<(), Terminated> {
    for payload in payloads {
        let frame: GenerateContentResponse = match serde_json::from_str(&payload) {
            Ok(frame) => frame,
            Err(e) => {
                error!("❌ [{}] malformed upstream frame: {}", session, e);
                let _ = send_event(tx, StreamEvent::Error(format!("malformed upstream frame: {}", e))).await;
                return Err(Terminated::Errored);
            }
        };

        // Frames without candidate text (metadata, safety blocks) produce no
        // chunk line.
        if let Some(text) = fragment_text(&frame) {
            *fragments += 1;
            if send_event(tx, StreamEvent::Chunk(text)).await.is_err() {
                warn!("⚠️  [{}] client disconnected after {} fragment(s)", session, *fragments);
                return Err(Terminated::ClientGone);
            }
        }
    }
    Ok(())
}

async fn send_event(
    tx: &mpsc::Sender<Result<Bytes, std::io::Error>>,
    event: StreamEvent,
) -> Result<(), mpsc::error::SendError<Result<Bytes, std::io::Error>>> {
    tx.send(Ok(Bytes::from(event.to_line()))).await
}

/// Human-readable message for an upstream error response, preferring the
/// message field of Gemini's error envelope.
fn upstream_error_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        if let Some(message) = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return message.to_string();
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        format!("upstream returned {}", status)
    } else {
        format!("upstream returned {}: {}", status, text)
    }
}
