//! mediashelf - media library with background metadata harvesting
//!
//! This library crate exposes the application composition root for the
//! binary and for integration testing.

pub mod app;

pub use app::App;
