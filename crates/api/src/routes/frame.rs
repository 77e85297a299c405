//! Frame Routes
//!
//! Single-frame JPEG snapshots and the MJPEG stream.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

use crate::AppState;

/// MIME type of the MJPEG stream
pub const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Parts buffered ahead of a slow client
const STREAM_BUFFER: usize = 2;

#[derive(Debug, Serialize)]
pub struct FrameResponse {
    /// Base64 encoded JPEG
    pub frame: String,
}

/// Encode the latest frame, off the async runtime
async fn latest_jpeg(state: &AppState) -> Result<Option<Vec<u8>>, String> {
    let Some(frame) = state.store.read_frame_snapshot() else {
        return Ok(None);
    };
    let quality = state.server.jpeg_quality;
    tokio::task::spawn_blocking(move || frame.encode_jpeg(quality))
        .await
        .map_err(|e| e.to_string())?
        .map(Some)
        .map_err(|e| e.to_string())
}

/// Latest frame as base64 JPEG
pub async fn get_frame(State(state): State<Arc<AppState>>) -> Response {
    match latest_jpeg(&state).await {
        Ok(Some(jpeg)) => Json(FrameResponse {
            frame: STANDARD.encode(jpeg),
        })
        .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No frame available" })),
        )
            .into_response(),
        Err(e) => {
            error!("Error getting frame: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e }))).into_response()
        }
    }
}

/// One multipart section carrying a JPEG
pub fn mjpeg_part(jpeg: &[u8]) -> Bytes {
    let header = format!(
        "--frame\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        jpeg.len()
    );
    let mut part = Vec::with_capacity(header.len() + jpeg.len() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    Bytes::from(part)
}

/// MJPEG stream of the latest frames while a session runs
pub async fn video_feed(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(STREAM_BUFFER);
    let interval = Duration::from_millis(state.server.stream_interval_ms);

    tokio::spawn(async move {
        let mut last_sequence = None;
        while state.is_streaming().await {
            let sequence = state.store.read_frame_snapshot().map(|f| f.sequence);
            if sequence.is_some() && sequence != last_sequence {
                match latest_jpeg(&state).await {
                    Ok(Some(jpeg)) => {
                        if tx.send(Ok(mjpeg_part(&jpeg))).await.is_err() {
                            debug!("MJPEG client disconnected");
                            return;
                        }
                        last_sequence = sequence;
                    }
                    Ok(None) => {}
                    Err(e) => error!("Error encoding stream frame: {}", e),
                }
            }
            tokio::time::sleep(interval).await;
        }
        debug!("MJPEG stream ended");
    });

    (
        [(header::CONTENT_TYPE, MJPEG_CONTENT_TYPE)],
        Body::from_stream(ReceiverStream::new(rx)),
    )
}
