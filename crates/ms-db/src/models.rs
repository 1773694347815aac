//! Rust structs mapping to database tables.

use ms_core::{MediaId, MediaStatus, MetadataStatus};

/// Parse a status enum from a text column.
fn parse_enum<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = ms_core::Error>,
{
    let s: String = row.get(idx)?;
    s.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

// ---------------------------------------------------------------------------
// MediaRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MediaRecord {
    pub id: MediaId,
    pub path: String,
    pub file_name: String,
    pub status: MediaStatus,
    pub metadata_status: MetadataStatus,
    pub duration: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    pub codec: Option<String>,
    pub generation_params: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl MediaRecord {
    /// Build from a row selected as:
    /// id, path, file_name, status, metadata_status, duration, width, height,
    /// fps, codec, generation_params, created_at, updated_at
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: MediaId::from(row.get::<_, String>(0)?),
            path: row.get(1)?,
            file_name: row.get(2)?,
            status: parse_enum(row, 3)?,
            metadata_status: parse_enum(row, 4)?,
            duration: row.get(5)?,
            width: row.get(6)?,
            height: row.get(7)?,
            fps: row.get(8)?,
            codec: row.get(9)?,
            generation_params: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    pub fn is_available(&self) -> bool {
        self.status == MediaStatus::Available
    }
}
