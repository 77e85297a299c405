//! Session Control Routes

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::AppState;

/// Start video capture and analysis
pub async fn start(State(state): State<Arc<AppState>>) -> Response {
    match state.start_session().await {
        Ok(true) => {
            info!("Video streaming started");
            Json(json!({ "message": "Video streaming started" })).into_response()
        }
        Ok(false) => Json(json!({ "message": "Video streaming already running" })).into_response(),
        Err(e) => {
            error!("Failed to initialize camera: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to initialize camera" })),
            )
                .into_response()
        }
    }
}

/// Stop video capture and release the camera
pub async fn stop(State(state): State<Arc<AppState>>) -> Response {
    match state.stop_session().await {
        Ok(true) => {
            info!("Video streaming stopped");
            Json(json!({ "message": "Video streaming stopped" })).into_response()
        }
        Ok(false) => Json(json!({ "message": "Video streaming not running" })).into_response(),
        Err(e) => {
            error!("Error stopping capture: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::create_router;
    use crate::tests::{get_json, test_state};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_start_stop_messages() {
        let state = test_state(vec![0]);
        let app = create_router(state);

        let (status, body) = get_json(app.clone(), "/api/start").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Video streaming started");

        let (_, body) = get_json(app.clone(), "/api/start").await;
        assert_eq!(body["message"], "Video streaming already running");

        let (_, body) = get_json(app.clone(), "/api/stop").await;
        assert_eq!(body["message"], "Video streaming stopped");

        let (_, body) = get_json(app, "/api/stop").await;
        assert_eq!(body["message"], "Video streaming not running");
    }

    #[tokio::test]
    async fn test_start_without_camera_fails() {
        let (status, body) = get_json(create_router(test_state(vec![])), "/api/start").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to initialize camera");

        let (status, _) = get_json(create_router(test_state(vec![])), "/api/stop").await;
        assert_eq!(status, StatusCode::OK);
    }
}
