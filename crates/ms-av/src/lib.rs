//! # ms-av
//!
//! External tool management and media probing for mediashelf.
//!
//! This crate provides:
//!
//! - **Tool discovery and validation** ([`ToolRegistry`], [`validate_path`])
//!   -- resolve ffprobe/ffmpeg from config or `PATH` and check that a
//!   configured binary really is the tool it claims to be.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for running external processes.
//! - **Probe backends** ([`probe::FfprobeProber`]) -- implement [`Prober`]
//!   by shelling out to ffprobe and folding its JSON into a
//!   [`ms_core::ProbeResult`].

pub mod command;
pub mod probe;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use probe::{parse_ffprobe_json, FfprobeProber, Prober};
pub use tools::{validate_path, ToolInfo, ToolKind, ToolRegistry};
