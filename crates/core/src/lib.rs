//! Eldia Core - authenticated fetch-and-encode pipeline
//!
//! This crate provides:
//! - Session login and cookie extraction
//! - Dashboard fetch and `qr_code` token extraction
//! - QR encoding into a fixed 512×512 monochrome bitmap
//! - Observable presentation state for display hosts
//! - Cancellable pipeline orchestration

pub mod barcode;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod pipeline;
pub mod presentation;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export common types
pub use barcode::{BarcodeEncoder, BarcodeMatrix, MATRIX_SIZE};
pub use config::{ClientConfig, CookieDelivery, Credentials, Endpoints};
pub use dashboard::{DashboardFetcher, DashboardToken};
pub use error::{CoreError, Result};
pub use pipeline::{FailureReason, Pipeline, PipelineHandle, PipelineOutcome, PipelineStage};
pub use presentation::{PresentationState, PresentationStore, PresentationView};
pub use session::{CookieMap, SessionAuthenticator};
pub use tokio_util::sync::CancellationToken;

