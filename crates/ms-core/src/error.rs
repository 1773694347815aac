//! Shared error type.
//!
//! Infrastructure failures (database, filesystem, external tools) funnel into
//! [`Error`]. A probe that simply cannot read a file is not one of them: the
//! harvester records that outcome as `metadata_status = failed`.

/// Everything that can go wrong outside the per-record harvesting path.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad configuration or a value outside its allowed set.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation would violate a one-at-a-time rule, such as starting a
    /// second application instance.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {source}")]
    Database {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// An external binary could not be found, spawned, or exited badly.
    #[error("Tool error [{tool}]: {message}")]
    Tool { tool: String, message: String },

    /// A probe ran but produced nothing usable.
    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap a driver or pool error as [`Error::Database`].
    pub fn database(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Database {
            source: source.into(),
        }
    }

    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
