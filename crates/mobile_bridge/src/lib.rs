//! Mobile bridge for the Eldia watch app
//!
//! Exposes the QR pipeline to the Flutter UI.

pub mod api;
