//! Flutter Rust Bridge API
//!
//! FFI-safe functions for the watch UI. The UI shows a spinner until
//! [`current_qr_image`] returns an image, then draws it.
//!
//! One QR session per process. The pipeline runs on a runtime owned by the
//! bridge so the UI isolate is never blocked.

use eldia_core::{Pipeline, PipelineHandle, PresentationState, PresentationView};
use flutter_rust_bridge::frb;
use once_cell::sync::OnceCell;
use tokio::runtime::Runtime;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// Background runtime for the pipeline
static RUNTIME: OnceCell<Runtime> = OnceCell::new();

/// The single QR session (thread-safe, no unsafe needed)
static SESSION: OnceCell<QrSession> = OnceCell::new();

struct QrSession {
    handle: PipelineHandle,
    view: PresentationView,
}

/// Greyscale image handed to the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrImage {
    pub width: u32,
    pub height: u32,
    /// Row-major, 0 = black, 255 = white
    pub pixels: Vec<u8>,
}

impl QrImage {
    fn from_state(state: &PresentationState) -> Option<Self> {
        let matrix = state.matrix()?;
        let side = matrix.size() as u32;
        Some(Self {
            width: side,
            height: side,
            pixels: matrix.to_luma8(),
        })
    }
}

fn runtime() -> Result<&'static Runtime, String> {
    RUNTIME.get_or_try_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("eldia-pipeline")
            .enable_all()
            .build()
            .map_err(|e| format!("Failed to start runtime: {}", e))
    })
}

fn session() -> Result<&'static QrSession, String> {
    SESSION
        .get()
        .ok_or_else(|| "QR session not started. Call start_qr_session first.".to_string())
}

/// Install the log subscriber (idempotent)
///
/// `RUST_LOG` overrides `level` when set.
#[frb(sync)]
pub fn init_logging(level: String) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Start the login → dashboard → QR pipeline
///
/// # Errors
/// Returns an error if a session was already started in this process.
#[frb(sync)]
pub fn start_qr_session() -> Result<(), String> {
    let mut started = false;
    SESSION.get_or_try_init(|| {
        started = true;
        let runtime = runtime()?;
        let pipeline = Pipeline::builtin().map_err(|e| e.to_string())?;
        let view = pipeline.view();
        let _guard = runtime.enter();
        let handle = pipeline.spawn();
        info!("QR session started");
        Ok::<_, String>(QrSession { handle, view })
    })?;

    if !started {
        return Err("QR session already started. Restart the app to reset.".to_string());
    }
    Ok(())
}

/// Whether the QR image is available
#[frb(sync)]
pub fn qr_image_ready() -> bool {
    SESSION.get().is_some_and(|s| s.view.is_ready())
}

/// Current QR image, `None` while loading
#[frb(sync)]
pub fn current_qr_image() -> Option<QrImage> {
    let session = SESSION.get()?;
    QrImage::from_state(&session.view.current())
}

/// Wait until the QR image is available
///
/// # Errors
/// Returns an error if no session was started, or if the pipeline ended
/// without an image.
#[frb]
pub async fn wait_for_qr_image() -> Result<QrImage, String> {
    let mut view = session()?.view.clone();
    let matrix = view
        .wait_ready()
        .await
        .ok_or_else(|| "QR pipeline finished without an image".to_string())?;
    QrImage::from_state(&PresentationState::Ready(matrix))
        .ok_or_else(|| "QR image unavailable".to_string())
}

/// Pipeline stage for diagnostics, e.g. `FetchingToken`
#[frb(sync)]
pub fn qr_session_stage() -> String {
    match SESSION.get() {
        Some(session) => format!("{:?}", session.handle.stage()),
        None => "NotStarted".to_string(),
    }
}

/// Abort the pipeline when the UI is torn down
///
/// The display stays in its loading state.
#[frb(sync)]
pub fn cancel_qr_session() {
    if let Some(session) = SESSION.get() {
        session.handle.cancel();
        info!("QR session cancelled");
    }
}
