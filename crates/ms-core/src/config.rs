//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! database, tool and harvester sections. Every section defaults sensibly so a
//! completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

/// Smallest accepted tick interval; a zero interval would busy-spin.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Upper bound for a single pending-media refill.
pub const MAX_BATCH_SIZE: usize = 100;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub tools: ToolsConfig,
    pub harvester: HarvesterConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, reporting read and parse errors.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.harvester.batch_size == 0 {
            warnings.push("harvester.batch_size is 0; using 1".into());
        } else if self.harvester.batch_size > MAX_BATCH_SIZE {
            warnings.push(format!(
                "harvester.batch_size {} exceeds {MAX_BATCH_SIZE}; clamping",
                self.harvester.batch_size
            ));
        }

        if self.harvester.tick_interval_ms == 0 {
            warnings.push(format!(
                "harvester.tick_interval_ms is 0; using {}ms",
                MIN_TICK_INTERVAL.as_millis()
            ));
        }

        if self.tools.probe_timeout_secs == 0 {
            warnings.push("tools.probe_timeout_secs is 0; probes will always time out".into());
        }

        for (name, path) in [
            ("ffprobe_path", &self.tools.ffprobe_path),
            ("ffmpeg_path", &self.tools.ffmpeg_path),
        ] {
            if let Some(p) = path {
                if !p.as_os_str().is_empty() && !p.exists() {
                    warnings.push(format!("tools.{name} {} does not exist", p.display()));
                }
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// SQLite database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/mediashelf.db"),
        }
    }
}

/// External tool paths.
///
/// An unset or empty `ffprobe_path` (with discovery disabled or failing)
/// leaves the harvester unconfigured: it keeps ticking but never probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffprobe_path: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
    /// Look up tools on `PATH` when no explicit path is set.
    pub auto_discover: bool,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_probe_timeout() -> u64 {
    30
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffprobe_path: None,
            ffmpeg_path: None,
            auto_discover: true,
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl ToolsConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Background harvester settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvesterConfig {
    pub enabled: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

fn default_batch_size() -> usize {
    10
}
fn default_tick_interval() -> u64 {
    100
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: default_batch_size(),
            tick_interval_ms: default_tick_interval(),
        }
    }
}

impl HarvesterConfig {
    /// Batch size clamped to `1..=MAX_BATCH_SIZE`.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_BATCH_SIZE)
    }

    /// Tick interval, never below [`MIN_TICK_INTERVAL`].
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms).max(MIN_TICK_INTERVAL)
    }
}
