//! Drowsiness Monitor API Server
//!
//! HTTP surface over the shared frame store: latest status, latest frame,
//! an MJPEG stream and session start/stop.

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, util::TryInitError};

pub mod config;
mod routes;

pub use self::config::{AppConfig, LogConfig, ServerConfig, SettingsError};

use camera_capture::SyntheticBackend;
use capture_loop::{PipelineError, Session, SessionLauncher, StatsSnapshot};
use frame_store::FrameStore;

/// Application state shared across handlers
pub struct AppState {
    /// Latest frame and status, written by the capture thread
    pub store: Arc<FrameStore>,
    /// Server settings
    pub server: ServerConfig,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: Instant,
    launcher: Arc<SessionLauncher>,
    session: Mutex<Option<Session>>,
    metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(launcher: SessionLauncher, server: ServerConfig) -> Self {
        Self::from_launcher(Arc::new(launcher), server)
    }

    fn from_launcher(launcher: Arc<SessionLauncher>, server: ServerConfig) -> Self {
        Self {
            store: Arc::new(FrameStore::new()),
            server,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
            launcher,
            session: Mutex::new(None),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Whether a capture session is currently running
    pub async fn is_streaming(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .map_or(false, Session::is_running)
    }

    /// Start a session unless one is already running.
    ///
    /// Returns `Ok(false)` when a session was already running.
    pub async fn start_session(&self) -> Result<bool, PipelineError> {
        let mut slot = self.session.lock().await;
        if slot.as_ref().map_or(false, Session::is_running) {
            return Ok(false);
        }

        // A session whose thread exited on its own still owns a joined handle
        if let Some(stale) = slot.take() {
            stop_blocking(stale).await?;
        }

        let launcher = Arc::clone(&self.launcher);
        let store = Arc::clone(&self.store);
        let session = tokio::task::spawn_blocking(move || launcher.launch(store))
            .await
            .map_err(|_| PipelineError::Panicked)??;
        *slot = Some(session);
        Ok(true)
    }

    /// Stop the running session.
    ///
    /// Returns `Ok(false)` when nothing was running.
    pub async fn stop_session(&self) -> Result<bool, PipelineError> {
        let mut slot = self.session.lock().await;
        match slot.take() {
            Some(session) => {
                let was_running = session.is_running();
                stop_blocking(session).await?;
                Ok(was_running)
            }
            None => Ok(false),
        }
    }

    async fn session_stats(&self) -> Option<(StatsSnapshot, Duration)> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| (s.stats().snapshot(), s.uptime()))
    }
}

async fn stop_blocking(session: Session) -> Result<(), PipelineError> {
    tokio::task::spawn_blocking(move || session.stop())
        .await
        .map_err(|_| PipelineError::Panicked)?
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub session: SessionHealth,
    pub frames_published: u64,
}

/// Capture session health
#[derive(Debug, Serialize)]
pub struct SessionHealth {
    pub running: bool,
    pub uptime_seconds: Option<u64>,
    pub stats: Option<StatsSnapshot>,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let api = Router::new()
        .route("/status", get(routes::status::get_status))
        .route("/frame", get(routes::frame::get_frame))
        .route("/video", get(routes::frame::video_feed))
        .route("/start", get(routes::control::start).post(routes::control::start))
        .route("/stop", get(routes::control::stop).post(routes::control::stop))
        .route("/v1/health", get(health_handler))
        .layer(cors);

    Router::new()
        .nest("/api", api)
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let running = state.is_streaming().await;
    let session_stats = state.session_stats().await;

    let response = HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        session: SessionHealth {
            running,
            uptime_seconds: session_stats.map(|(_, uptime)| uptime.as_secs()),
            stats: session_stats.map(|(stats, _)| stats),
        },
        frames_published: state.store.published_count(),
    };

    Json(response)
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics exporter disabled").into_response(),
    }
}

/// Startup initialization error
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("Failed to set tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
    #[error("Failed to open log file: {0}")]
    LogFile(#[from] std::io::Error),
    #[error("Failed to install metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

/// Initialize logging: console output plus an optional log file
pub fn init_logging(config: &LogConfig) -> Result<(), InitError> {
    let level = LevelFilter::from_level(config.max_level()?);

    let console = if config.json {
        fmt::layer().with_target(true).json().boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let file = match &config.file {
        Some(path) => Some(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(open_log_file(Path::new(path))?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(level)
        .with(console)
        .with(file)
        .try_init()?;
    Ok(())
}

/// Open the log file for appending, readable by the owner only
pub fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(0o600);
        let file = options.open(path)?;
        // Tighten files created before with wider permissions
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        Ok(file)
    }
    #[cfg(not(unix))]
    {
        options.open(path)
    }
}

/// Install the global Prometheus recorder
pub fn init_metrics() -> Result<PrometheusHandle, InitError> {
    Ok(PrometheusBuilder::new().install_recorder()?)
}

/// Session launcher for the configured cameras and models
pub fn build_launcher(config: &AppConfig) -> SessionLauncher {
    SessionLauncher::new(
        Arc::new(SyntheticBackend::new(config.camera.candidate_indices())),
        config.camera.clone(),
        config.capture.clone(),
        config.dms.clone(),
    )
}

/// Application state with every configured model checked
pub async fn build_state(config: &AppConfig) -> Result<AppState, PipelineError> {
    let launcher = Arc::new(build_launcher(config));
    let check = Arc::clone(&launcher);
    tokio::task::spawn_blocking(move || check.preflight())
        .await
        .map_err(|_| PipelineError::Panicked)??;

    Ok(AppState::from_launcher(launcher, config.server.clone()))
}

/// Run the server until Ctrl-C
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut state = build_state(&config).await?;
    if config.server.metrics {
        state = state.with_metrics(init_metrics()?);
    }
    let state = Arc::new(state);

    if config.server.autostart {
        match state.start_session().await {
            Ok(_) => info!("Monitoring session started at launch"),
            Err(e) => warn!("Autostart failed: {}", e),
        }
    }

    let app = create_router(Arc::clone(&state));

    info!("Starting API server on {}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    state.stop_session().await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
