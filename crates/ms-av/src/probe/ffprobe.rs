//! FFprobe-based [`Prober`] implementation.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format -show_streams`
//! and folds the JSON output into a [`ProbeResult`].

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use ms_core::ProbeResult;
use serde::Deserialize;

use super::Prober;
use crate::command::ToolCommand;

/// Container tags that describe the muxer rather than the content.
const TECHNICAL_TAGS: &[&str] = &[
    "major_brand",
    "minor_version",
    "compatible_brands",
    "encoder",
    "creation_time",
    "handler_name",
    "vendor_id",
    "duration",
];

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn extract(&self, binary: &Path, media: &Path) -> Option<ProbeResult> {
        let mut cmd = ToolCommand::new(binary.to_path_buf());
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ]);
        cmd.arg(media.to_string_lossy().as_ref());
        cmd.timeout(self.timeout);

        let output = match cmd.execute().await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(path = %media.display(), error = %e, "ffprobe failed");
                return None;
            }
        };

        let result = parse_ffprobe_json(&output.stdout);
        if result.is_none() {
            tracing::debug!(
                path = %media.display(),
                "ffprobe output had no usable video stream"
            );
        }
        result
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Parse ffprobe's JSON output into a [`ProbeResult`].
///
/// Uses the first video stream. Returns `None` when the JSON is malformed or
/// there is no video stream.
pub fn parse_ffprobe_json(json: &str) -> Option<ProbeResult> {
    let output: FfprobeOutput = serde_json::from_str(json).ok()?;

    let video = output
        .streams
        .into_iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))?;

    let duration = parse_seconds(output.format.duration.as_deref())
        .or_else(|| parse_seconds(video.duration.as_deref()))
        .unwrap_or(0.0);

    let fps = video
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(0.0);

    let tags: BTreeMap<String, String> = output
        .format
        .tags
        .into_iter()
        .filter(|(k, v)| !v.is_empty() && !is_technical_tag(k))
        .collect();

    Some(ProbeResult {
        duration,
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        fps,
        codec: video.codec_name.unwrap_or_default(),
        tags,
    })
}

fn is_technical_tag(key: &str) -> bool {
    TECHNICAL_TAGS.iter().any(|t| t.eq_ignore_ascii_case(key))
}

fn parse_seconds(s: Option<&str>) -> Option<f64> {
    s?.parse::<f64>().ok().filter(|d| d.is_finite() && *d >= 0.0)
}

/// Parse `"30000/1001"` or `"25"`. A zero denominator (ffprobe prints `0/0`
/// for unknown rates) yields `None`.
fn parse_frame_rate(rate_str: &str) -> Option<f64> {
    if let Some((num, den)) = rate_str.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den == 0.0 || num == 0.0 {
            return None;
        }
        return Some(num / den);
    }
    rate_str.parse().ok().filter(|r: &f64| *r > 0.0)
}
