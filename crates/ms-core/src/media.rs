//! Media-domain enums and the probe result record.
//!
//! Status enums serialize in lowercase and implement `Display`/`FromStr`
//! manually so the same spelling is used in SQL, JSON and logs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::Error;

// ---------------------------------------------------------------------------
// MediaStatus
// ---------------------------------------------------------------------------

/// Presence of a media file on disk, maintained by the indexing subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaStatus {
    Available,
    Missing,
    Deleted,
}

impl MediaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Missing => "missing",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "missing" => Ok(Self::Missing),
            "deleted" => Ok(Self::Deleted),
            other => Err(Error::Validation(format!("unknown media status: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// MetadataStatus
// ---------------------------------------------------------------------------

/// Progress of technical-metadata extraction for one media record.
///
/// Transitions only `Pending -> Processing -> {Completed | Failed}`. Startup
/// recovery is the one place that moves `Processing` back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl MetadataStatus {
    /// All known statuses, in lifecycle order.
    pub const ALL: [MetadataStatus; 4] = [
        Self::Pending,
        Self::Processing,
        Self::Completed,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transition is expected without an explicit request.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for MetadataStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetadataStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::Validation(format!("unknown metadata status: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// ProbeResult
// ---------------------------------------------------------------------------

/// Technical metadata extracted from one media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Duration in seconds.
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    /// Average frame rate.
    pub fps: f64,
    /// Codec name of the primary video stream (e.g. "h264").
    pub codec: String,
    /// Descriptive container tags such as a generation prompt. May be empty.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ProbeResult {
    /// Serialize the tags to the JSON blob stored as generation params.
    ///
    /// Returns `None` when there are no tags to store.
    pub fn generation_params(&self) -> crate::Result<Option<String>> {
        if self.tags.is_empty() {
            return Ok(None);
        }
        serde_json::to_string(&self.tags)
            .map(Some)
            .map_err(|e| Error::Internal(format!("failed to serialize tags: {e}")))
    }
}
