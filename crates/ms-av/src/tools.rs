//! External tool detection and validation.
//!
//! The [`ToolRegistry`] resolves the locations of `ffprobe` and `ffmpeg`
//! from configuration or `PATH`. [`validate_path`] checks that a given binary
//! really is the expected tool, which settings screens use before saving a
//! user-supplied path.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ms_core::config::ToolsConfig;
use serde::{Deserialize, Serialize};

use crate::command::ToolCommand;

/// How long `-version` may take before the binary is considered invalid.
const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

/// The external tools mediashelf knows how to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Ffmpeg,
    Ffprobe,
}

impl ToolKind {
    pub const ALL: [ToolKind; 2] = [ToolKind::Ffprobe, ToolKind::Ffmpeg];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ffmpeg => "ffmpeg",
            Self::Ffprobe => "ffprobe",
        }
    }

    /// Prefix of the first line printed by `<tool> -version`.
    fn banner(&self) -> &'static str {
        match self {
            Self::Ffmpeg => "ffmpeg version",
            Self::Ffprobe => "ffprobe version",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub kind: ToolKind,
    /// Whether the resolved binary answered `-version` as expected.
    pub available: bool,
    /// First line of `-version` output, if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Resolved tool locations.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    ffprobe: Option<PathBuf>,
    ffmpeg: Option<PathBuf>,
}

impl ToolRegistry {
    /// Resolve tool paths from config, falling back to `PATH`.
    ///
    /// An explicit, existing path always wins. A missing or empty path falls
    /// back to [`which::which`] when `auto_discover` is set. Tools that cannot
    /// be resolved stay `None`, which leaves the harvester unconfigured.
    pub fn discover(config: &ToolsConfig) -> Self {
        let auto = config.auto_discover;
        Self {
            ffprobe: resolve(ToolKind::Ffprobe, config.ffprobe_path.as_deref(), auto),
            ffmpeg: resolve(ToolKind::Ffmpeg, config.ffmpeg_path.as_deref(), auto),
        }
    }

    /// Path for the given tool, if one was resolved.
    pub fn path(&self, kind: ToolKind) -> Option<&Path> {
        match kind {
            ToolKind::Ffprobe => self.ffprobe.as_deref(),
            ToolKind::Ffmpeg => self.ffmpeg.as_deref(),
        }
    }

    /// Return the path for `kind` or an [`ms_core::Error::Tool`].
    pub fn require(&self, kind: ToolKind) -> ms_core::Result<&Path> {
        self.path(kind).ok_or_else(|| {
            ms_core::Error::tool(
                kind.name(),
                format!("{kind} not found; set tools.{kind}_path or install it in PATH"),
            )
        })
    }

    /// Check all known tools and return availability information.
    pub async fn check_all(&self) -> Vec<ToolInfo> {
        let mut infos = Vec::with_capacity(ToolKind::ALL.len());
        for kind in ToolKind::ALL {
            let path = self.path(kind).map(Path::to_path_buf);
            let version = match &path {
                Some(p) => detect_version(p, kind).await,
                None => None,
            };
            infos.push(ToolInfo {
                kind,
                available: version.is_some(),
                version,
                path,
            });
        }
        infos
    }
}

fn resolve(kind: ToolKind, configured: Option<&Path>, auto_discover: bool) -> Option<PathBuf> {
    if let Some(p) = configured.filter(|p| !p.as_os_str().is_empty()) {
        if p.exists() {
            return Some(p.to_path_buf());
        }
        tracing::warn!(tool = %kind, path = %p.display(), "Configured tool path does not exist");
    }

    if !auto_discover {
        return None;
    }

    which::which(kind.name()).ok()
}

/// Run `<path> -version` and return the banner line if it matches `kind`.
async fn detect_version(path: &Path, kind: ToolKind) -> Option<String> {
    let output = ToolCommand::new(path.to_path_buf())
        .arg("-version")
        .timeout(VERSION_TIMEOUT)
        .execute()
        .await
        .ok()?;

    let first = output.first_line()?;
    first
        .starts_with(kind.banner())
        .then(|| first.to_string())
}

/// Check that `path` points at a working binary of the given kind.
///
/// An empty path, a path that cannot be executed, or a binary whose
/// `-version` banner belongs to a different tool all yield `false`.
pub async fn validate_path(path: &Path, kind: ToolKind) -> bool {
    if path.as_os_str().is_empty() {
        return false;
    }
    detect_version(path, kind).await.is_some()
}
