//! Probe backends that shell out to external tools.
//!
//! A [`Prober`] turns a media file into a [`ProbeResult`]. The binary to run
//! is passed per call so a settings change takes effect on the next
//! extraction without rebuilding the prober.

pub mod ffprobe;

use std::path::Path;

use async_trait::async_trait;
use ms_core::ProbeResult;

pub use self::ffprobe::{parse_ffprobe_json, FfprobeProber};

/// Extracts technical metadata from a media file.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Probe `media` using the executable at `binary`.
    ///
    /// Every ordinary failure (spawn error, non-zero exit, timeout,
    /// unparseable output, no video stream) yields `None`.
    async fn extract(&self, binary: &Path, media: &Path) -> Option<ProbeResult>;
}
