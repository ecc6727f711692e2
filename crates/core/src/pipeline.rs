//! Login → dashboard → encode orchestration
//!
//! Runs once per launch on a background task:
//!
//! ```text
//! Pending ─► FetchingToken ─► Rendering ─► Ready
//!                 │               │
//!                 └──► Failed ◄───┘        (presentation stays Pending)
//! ```
//!
//! Every await point races the cancellation token, so the display host can
//! abort the run when it is torn down.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::barcode::BarcodeEncoder;
use crate::config::{ClientConfig, Credentials};
use crate::dashboard::DashboardFetcher;
use crate::error::Result;
use crate::presentation::{PresentationStore, PresentationView};
use crate::session::SessionAuthenticator;

/// Why a run ended without an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Network failure, rejected request or no `qr_code` in the dashboard
    TokenUnavailable,
    /// Token too long for the symbology
    Encoding,
}

/// Pipeline progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Pending,
    FetchingToken,
    Rendering,
    Ready,
    Failed(FailureReason),
    Cancelled,
}

impl PipelineStage {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineStage::Ready | PipelineStage::Failed(_) | PipelineStage::Cancelled
        )
    }
}

/// Terminal result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    Ready,
    Failed(FailureReason),
    Cancelled,
}

impl From<PipelineOutcome> for PipelineStage {
    fn from(outcome: PipelineOutcome) -> Self {
        match outcome {
            PipelineOutcome::Ready => PipelineStage::Ready,
            PipelineOutcome::Failed(reason) => PipelineStage::Failed(reason),
            PipelineOutcome::Cancelled => PipelineStage::Cancelled,
        }
    }
}

/// Single-shot fetch-and-encode pipeline
pub struct Pipeline {
    credentials: Credentials,
    authenticator: SessionAuthenticator,
    fetcher: DashboardFetcher,
    encoder: BarcodeEncoder,
    store: PresentationStore,
    stage: watch::Sender<PipelineStage>,
}

impl Pipeline {
    /// Build a pipeline sharing one HTTP client between both requests
    pub fn new(credentials: Credentials, config: &ClientConfig) -> Result<Self> {
        let client = config.build_client()?;
        let authenticator =
            SessionAuthenticator::new(client.clone(), config.endpoints.login_url.clone());
        let fetcher = DashboardFetcher::new(client, config.endpoints.dashboard_url.clone())
            .with_cookie_delivery(config.cookie_delivery);
        Ok(Self::from_parts(
            credentials,
            authenticator,
            fetcher,
            BarcodeEncoder::default(),
        ))
    }

    /// Pipeline with the compiled-in credentials and production endpoints
    pub fn builtin() -> Result<Self> {
        Self::new(Credentials::builtin(), &ClientConfig::default())
    }

    pub fn from_parts(
        credentials: Credentials,
        authenticator: SessionAuthenticator,
        fetcher: DashboardFetcher,
        encoder: BarcodeEncoder,
    ) -> Self {
        let (stage, _rx) = watch::channel(PipelineStage::Pending);
        Self {
            credentials,
            authenticator,
            fetcher,
            encoder,
            store: PresentationStore::new(),
            stage,
        }
    }

    /// Reader for the display layer
    pub fn view(&self) -> PresentationView {
        self.store.view()
    }

    /// Stage observer
    pub fn stage(&self) -> watch::Receiver<PipelineStage> {
        self.stage.subscribe()
    }

    /// Run to completion, failure or cancellation
    pub async fn run(self, cancel: CancellationToken) -> PipelineOutcome {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => PipelineOutcome::Cancelled,
            outcome = self.execute() => outcome,
        };

        self.set_stage(outcome.into());
        match outcome {
            PipelineOutcome::Ready => info!("QR code ready"),
            PipelineOutcome::Failed(reason) => {
                warn!("Pipeline ended without a QR code: {:?}", reason)
            }
            PipelineOutcome::Cancelled => info!("Pipeline cancelled"),
        }
        outcome
    }

    /// Spawn onto the current Tokio runtime
    pub fn spawn(self) -> PipelineHandle {
        let cancel = CancellationToken::new();
        let view = self.view();
        let stage = self.stage();
        let join = tokio::spawn(self.run(cancel.clone()));
        PipelineHandle {
            cancel,
            join,
            view,
            stage,
        }
    }

    async fn execute(&self) -> PipelineOutcome {
        self.set_stage(PipelineStage::FetchingToken);

        // Login failures degrade to an empty map; the fetch still runs
        let cookies = self.authenticator.authenticate(&self.credentials).await;
        let Some(token) = self.fetcher.fetch_token(&cookies).await else {
            return PipelineOutcome::Failed(FailureReason::TokenUnavailable);
        };

        self.set_stage(PipelineStage::Rendering);
        match self.encoder.encode(token.as_str()) {
            Ok(matrix) => {
                self.store.publish(matrix);
                PipelineOutcome::Ready
            }
            Err(e) => {
                error!("Failed to encode dashboard token: {}", e);
                PipelineOutcome::Failed(FailureReason::Encoding)
            }
        }
    }

    fn set_stage(&self, next: PipelineStage) {
        let previous = self.stage.send_replace(next);
        info!("Pipeline stage: {:?} -> {:?}", previous, next);
    }
}

/// Handle to a spawned pipeline
#[derive(Debug)]
pub struct PipelineHandle {
    cancel: CancellationToken,
    join: JoinHandle<PipelineOutcome>,
    view: PresentationView,
    stage: watch::Receiver<PipelineStage>,
}

impl PipelineHandle {
    pub fn view(&self) -> PresentationView {
        self.view.clone()
    }

    pub fn stage(&self) -> PipelineStage {
        *self.stage.borrow()
    }

    pub fn stage_receiver(&self) -> watch::Receiver<PipelineStage> {
        self.stage.clone()
    }

    /// Token wired to the display lifecycle
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Abort the run; the presentation stays Pending
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the run to end
    ///
    /// A panicked task is reported as cancelled.
    pub async fn join(self) -> PipelineOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Pipeline task failed: {}", e);
                PipelineOutcome::Cancelled
            }
        }
    }
}
