//! Error types for eldia-core

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Login rejected with status {status}")]
    LoginRejected { status: u16 },

    #[error("Dashboard request rejected with status {status}")]
    DashboardRejected { status: u16 },

    #[error("No qr_code field in dashboard response")]
    TokenMissing,

    #[error("QR code generation error: {0}")]
    Encoding(#[from] qrcode::types::QrError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CoreError>;
