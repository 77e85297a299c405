//! Driver Status Route

use axum::{extract::State, Json};
use dms::DriverStatus;
use std::sync::Arc;

use crate::AppState;

/// Latest published driver status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<DriverStatus> {
    Json(state.store.read_status())
}

#[cfg(test)]
mod tests {
    use crate::create_router;
    use crate::tests::{get_json, test_state};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_status_before_start() {
        let (status, body) = get_json(create_router(test_state(vec![0])), "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["emotion"], "unknown");
        assert_eq!(body["sleep_status"], "Unknown");
        assert_eq!(body["sleep_probability"], 0.0);
    }

    #[tokio::test]
    async fn test_status_after_start_reports_missing_models() {
        let state = test_state(vec![0]);
        state.start_session().await.unwrap();
        for _ in 0..200 {
            if state.store.has_frame() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        state.stop_session().await.unwrap();

        let (_, body) = get_json(create_router(state), "/api/status").await;
        assert_eq!(body["emotion"], "no_model");
        assert_eq!(body["sleep_status"], "Unknown");
    }
}
