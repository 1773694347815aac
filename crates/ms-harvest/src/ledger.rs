//! Persistence seam for metadata extraction status.

use ms_core::{MediaId, MetadataStatus, Result};
use ms_db::models::MediaRecord;
use ms_db::pool::{get_conn, DbPool};
use ms_db::queries::media;

/// Status and metadata storage used by the [`Harvester`](crate::Harvester).
///
/// Every operation applies fully or not at all.
pub trait MetadataLedger: Send + Sync {
    /// Up to `limit` available records with `metadata_status = pending`,
    /// oldest first.
    fn pending_media(&self, limit: usize) -> Result<Vec<MediaRecord>>;

    fn find_by_id(&self, id: &MediaId) -> Result<Option<MediaRecord>>;

    fn update_metadata_status(&self, id: &MediaId, status: MetadataStatus) -> Result<()>;

    /// Write technical metadata for the record stored at `path`.
    fn update_metadata(
        &self,
        path: &str,
        duration: f64,
        width: u32,
        height: u32,
        fps: f64,
        codec: &str,
    ) -> Result<()>;

    fn update_generation_params(&self, id: &MediaId, json: &str) -> Result<()>;

    /// Set every row with a missing or unrecognized status to `pending`.
    fn reset_incomplete_metadata_status(&self) -> Result<usize>;

    /// Move rows left in `processing` by an interrupted run back to `pending`.
    fn reset_stuck_processing_status(&self) -> Result<usize>;
}

/// [`MetadataLedger`] over the SQLite connection pool.
#[derive(Clone)]
pub struct SqliteLedger {
    pool: DbPool,
}

impl SqliteLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl MetadataLedger for SqliteLedger {
    fn pending_media(&self, limit: usize) -> Result<Vec<MediaRecord>> {
        let conn = get_conn(&self.pool)?;
        media::list_pending_media(&conn, limit)
    }

    fn find_by_id(&self, id: &MediaId) -> Result<Option<MediaRecord>> {
        let conn = get_conn(&self.pool)?;
        media::get_media(&conn, id)
    }

    fn update_metadata_status(&self, id: &MediaId, status: MetadataStatus) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        if !media::update_metadata_status(&conn, id, status)? {
            tracing::debug!(media_id = %id, %status, "Status update matched no row");
        }
        Ok(())
    }

    fn update_metadata(
        &self,
        path: &str,
        duration: f64,
        width: u32,
        height: u32,
        fps: f64,
        codec: &str,
    ) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        if !media::update_metadata(&conn, path, duration, width, height, fps, codec)? {
            tracing::warn!(path, "Metadata update matched no row");
        }
        Ok(())
    }

    fn update_generation_params(&self, id: &MediaId, json: &str) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        media::update_generation_params(&conn, id, json)?;
        Ok(())
    }

    fn reset_incomplete_metadata_status(&self) -> Result<usize> {
        let conn = get_conn(&self.pool)?;
        media::reset_incomplete_metadata_status(&conn)
    }

    fn reset_stuck_processing_status(&self) -> Result<usize> {
        let conn = get_conn(&self.pool)?;
        media::reset_stuck_processing_status(&conn)
    }
}
