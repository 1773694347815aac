//! Media ledger operations.
//!
//! Status writes are keyed by id. The technical-metadata write is keyed by
//! path, matching the row the probe actually read even if the id lookup and
//! the write straddle a rename.

use std::path::Path;

use chrono::Utc;
use ms_core::{Error, MediaId, MediaStatus, MetadataStatus, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::models::MediaRecord;

const COLS: &str = "id, path, file_name, status, metadata_status, duration, width, height,
    fps, codec, generation_params, created_at, updated_at";

/// Index a new media file with a random id and `metadata_status = pending`.
pub fn insert_media(conn: &Connection, path: &str, status: MediaStatus) -> Result<MediaRecord> {
    insert_media_with_id(conn, &MediaId::new(), path, status)
}

/// Index a new media file under a caller-chosen id.
pub fn insert_media_with_id(
    conn: &Connection,
    id: &MediaId,
    path: &str,
    status: MediaStatus,
) -> Result<MediaRecord> {
    let now = Utc::now().to_rfc3339();
    let file_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string());

    conn.execute(
        "INSERT INTO media (id, path, file_name, status, metadata_status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?5)",
        rusqlite::params![id.as_str(), path, file_name, status.as_str(), now],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(MediaRecord {
        id: id.clone(),
        path: path.to_string(),
        file_name,
        status,
        metadata_status: MetadataStatus::Pending,
        duration: None,
        width: None,
        height: None,
        fps: None,
        codec: None,
        generation_params: None,
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Get a media record by id.
pub fn get_media(conn: &Connection, id: &MediaId) -> Result<Option<MediaRecord>> {
    let q = format!("SELECT {COLS} FROM media WHERE id = ?1");
    conn.query_row(&q, [id.as_str()], MediaRecord::from_row)
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// Get a media record by its unique path.
pub fn get_media_by_path(conn: &Connection, path: &str) -> Result<Option<MediaRecord>> {
    let q = format!("SELECT {COLS} FROM media WHERE path = ?1");
    conn.query_row(&q, [path], MediaRecord::from_row)
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// List up to `limit` available records awaiting extraction, oldest first.
///
/// Missing and deleted rows stay `pending` but are left out, so they never
/// occupy a batch.
pub fn list_pending_media(conn: &Connection, limit: usize) -> Result<Vec<MediaRecord>> {
    let q = format!(
        "SELECT {COLS} FROM media
         WHERE metadata_status = 'pending' AND status = 'available'
         ORDER BY created_at ASC, rowid ASC LIMIT ?1"
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([limit as i64], MediaRecord::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Set a record's metadata status.
pub fn update_metadata_status(
    conn: &Connection,
    id: &MediaId,
    status: MetadataStatus,
) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE media SET metadata_status = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![status.as_str(), Utc::now().to_rfc3339(), id.as_str()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Store extracted technical metadata on the record at `path`.
pub fn update_metadata(
    conn: &Connection,
    path: &str,
    duration: f64,
    width: u32,
    height: u32,
    fps: f64,
    codec: &str,
) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE media SET duration = ?1, width = ?2, height = ?3, fps = ?4, codec = ?5,
                updated_at = ?6
             WHERE path = ?7",
            rusqlite::params![
                duration,
                width,
                height,
                fps,
                codec,
                Utc::now().to_rfc3339(),
                path
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Store the JSON-serialized generation parameters for a record.
pub fn update_generation_params(conn: &Connection, id: &MediaId, json: &str) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE media SET generation_params = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![json, Utc::now().to_rfc3339(), id.as_str()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Set a record's presence status (indexing side).
pub fn update_media_status(conn: &Connection, id: &MediaId, status: MediaStatus) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE media SET status = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![status.as_str(), Utc::now().to_rfc3339(), id.as_str()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Point a record at a new path after a move or rename.
pub fn update_media_path(conn: &Connection, id: &MediaId, new_path: &str) -> Result<bool> {
    let file_name = Path::new(new_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| new_path.to_string());
    let n = conn
        .execute(
            "UPDATE media SET path = ?1, file_name = ?2, updated_at = ?3 WHERE id = ?4",
            rusqlite::params![new_path, file_name, Utc::now().to_rfc3339(), id.as_str()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Move rows with a missing or unrecognised metadata status back to pending.
///
/// Returns the number of rows reset.
pub fn reset_incomplete_metadata_status(conn: &Connection) -> Result<usize> {
    conn.execute(
        "UPDATE media SET metadata_status = 'pending', updated_at = ?1
         WHERE metadata_status IS NULL
            OR metadata_status NOT IN ('pending', 'processing', 'completed', 'failed')",
        [Utc::now().to_rfc3339()],
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Move rows left in `processing` by an interrupted run back to pending.
///
/// Returns the number of rows reset.
pub fn reset_stuck_processing_status(conn: &Connection) -> Result<usize> {
    conn.execute(
        "UPDATE media SET metadata_status = 'pending', updated_at = ?1
         WHERE metadata_status = 'processing'",
        [Utc::now().to_rfc3339()],
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Queue every failed record for another extraction attempt.
///
/// Returns the number of rows reset.
pub fn reset_failed_metadata_status(conn: &Connection) -> Result<usize> {
    conn.execute(
        "UPDATE media SET metadata_status = 'pending', updated_at = ?1
         WHERE metadata_status = 'failed'",
        [Utc::now().to_rfc3339()],
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Count records per metadata status.
///
/// Returns a list of `(metadata_status, count)` pairs.
pub fn count_by_metadata_status(conn: &Connection) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn
        .prepare(
            "SELECT metadata_status, COUNT(*) FROM media
             GROUP BY metadata_status ORDER BY metadata_status",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;

    fn setup() -> crate::pool::PooledConnection {
        let pool = init_memory_pool().unwrap();
        pool.get().unwrap()
    }

    fn force_status(conn: &Connection, id: &str, raw: &str) {
        conn.execute(
            "UPDATE media SET metadata_status = ?1 WHERE id = ?2",
            rusqlite::params![raw, id],
        )
        .unwrap();
    }

    #[test]
    fn insert_and_get() {
        let conn = setup();
        let rec = insert_media(&conn, "/videos/clip.mp4", MediaStatus::Available).unwrap();
        assert_eq!(rec.file_name, "clip.mp4");
        assert_eq!(rec.metadata_status, MetadataStatus::Pending);

        let found = get_media(&conn, &rec.id).unwrap().unwrap();
        assert_eq!(found, rec);
        assert!(found.is_available());

        let by_path = get_media_by_path(&conn, "/videos/clip.mp4").unwrap().unwrap();
        assert_eq!(by_path.id, rec.id);
    }

    #[test]
    fn get_missing_returns_none() {
        let conn = setup();
        assert!(get_media(&conn, &MediaId::from("nope")).unwrap().is_none());
    }

    #[test]
    fn duplicate_path_is_rejected() {
        let conn = setup();
        insert_media(&conn, "/a.mp4", MediaStatus::Available).unwrap();
        assert!(insert_media(&conn, "/a.mp4", MediaStatus::Available).is_err());
    }

    #[test]
    fn pending_is_oldest_first_and_limited() {
        let conn = setup();
        for name in ["a", "b", "c"] {
            insert_media_with_id(
                &conn,
                &MediaId::from(name),
                &format!("/{name}.mp4"),
                MediaStatus::Available,
            )
            .unwrap();
        }
        update_metadata_status(&conn, &MediaId::from("a"), MetadataStatus::Completed).unwrap();

        let pending = list_pending_media(&conn, 10).unwrap();
        let ids: Vec<&str> = pending.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);

        let first = list_pending_media(&conn, 1).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id.as_str(), "b");
    }

    #[test]
    fn pending_excludes_unavailable_rows() {
        let conn = setup();
        let rows = [
            ("gone", MediaStatus::Missing),
            ("trashed", MediaStatus::Deleted),
            ("live", MediaStatus::Available),
        ];
        for (id, status) in rows {
            insert_media_with_id(&conn, &MediaId::from(id), &format!("/{id}.mp4"), status)
                .unwrap();
        }

        let pending = list_pending_media(&conn, 1).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id.as_str(), "live");

        // Coming back into the library makes the row eligible again.
        update_media_status(&conn, &MediaId::from("gone"), MediaStatus::Available).unwrap();
        let ids: Vec<String> = list_pending_media(&conn, 10)
            .unwrap()
            .into_iter()
            .map(|r| r.id.to_string())
            .collect();
        assert_eq!(ids, vec!["gone", "live"]);
    }

    #[test]
    fn metadata_write_is_keyed_by_path() {
        let conn = setup();
        let rec = insert_media(&conn, "/old.mp4", MediaStatus::Available).unwrap();

        assert!(update_metadata(&conn, "/old.mp4", 120.0, 1920, 1080, 30.0, "h264").unwrap());
        let found = get_media(&conn, &rec.id).unwrap().unwrap();
        assert_eq!(found.duration, Some(120.0));
        assert_eq!(found.width, Some(1920));
        assert_eq!(found.height, Some(1080));
        assert_eq!(found.fps, Some(30.0));
        assert_eq!(found.codec.as_deref(), Some("h264"));

        // After a rename, a write against the stale path touches nothing.
        update_media_path(&conn, &rec.id, "/new.mp4").unwrap();
        assert!(!update_metadata(&conn, "/old.mp4", 1.0, 1, 1, 1.0, "vp9").unwrap());
        let found = get_media(&conn, &rec.id).unwrap().unwrap();
        assert_eq!(found.codec.as_deref(), Some("h264"));
        assert_eq!(found.file_name, "new.mp4");
    }

    #[test]
    fn generation_params_round_trip() {
        let conn = setup();
        let rec = insert_media(&conn, "/gen.mp4", MediaStatus::Available).unwrap();
        update_generation_params(&conn, &rec.id, r#"{"prompt":"masterpiece"}"#).unwrap();
        let found = get_media(&conn, &rec.id).unwrap().unwrap();
        assert_eq!(
            found.generation_params.as_deref(),
            Some(r#"{"prompt":"masterpiece"}"#)
        );
    }

    #[test]
    fn reset_stuck_processing() {
        let conn = setup();
        let a = insert_media(&conn, "/a.mp4", MediaStatus::Available).unwrap();
        let b = insert_media(&conn, "/b.mp4", MediaStatus::Available).unwrap();
        update_metadata_status(&conn, &a.id, MetadataStatus::Processing).unwrap();
        update_metadata_status(&conn, &b.id, MetadataStatus::Completed).unwrap();

        assert_eq!(reset_stuck_processing_status(&conn).unwrap(), 1);
        let a = get_media(&conn, &a.id).unwrap().unwrap();
        let b = get_media(&conn, &b.id).unwrap().unwrap();
        assert_eq!(a.metadata_status, MetadataStatus::Pending);
        assert_eq!(b.metadata_status, MetadataStatus::Completed);
        assert_eq!(reset_stuck_processing_status(&conn).unwrap(), 0);
    }

    #[test]
    fn reset_incomplete_handles_legacy_markers() {
        let conn = setup();
        let a = insert_media(&conn, "/a.mp4", MediaStatus::Available).unwrap();
        let b = insert_media(&conn, "/b.mp4", MediaStatus::Available).unwrap();
        let c = insert_media(&conn, "/c.mp4", MediaStatus::Available).unwrap();
        force_status(&conn, a.id.as_str(), "extracting");
        force_status(&conn, b.id.as_str(), "");
        update_metadata_status(&conn, &c.id, MetadataStatus::Failed).unwrap();

        assert_eq!(reset_incomplete_metadata_status(&conn).unwrap(), 2);
        assert_eq!(
            get_media(&conn, &a.id).unwrap().unwrap().metadata_status,
            MetadataStatus::Pending
        );
        assert_eq!(
            get_media(&conn, &c.id).unwrap().unwrap().metadata_status,
            MetadataStatus::Failed
        );
    }

    #[test]
    fn reset_failed_and_counts() {
        let conn = setup();
        let a = insert_media(&conn, "/a.mp4", MediaStatus::Available).unwrap();
        insert_media(&conn, "/b.mp4", MediaStatus::Available).unwrap();
        update_metadata_status(&conn, &a.id, MetadataStatus::Failed).unwrap();

        let counts = count_by_metadata_status(&conn).unwrap();
        assert_eq!(
            counts,
            vec![("failed".to_string(), 1), ("pending".to_string(), 1)]
        );

        assert_eq!(reset_failed_metadata_status(&conn).unwrap(), 1);
        let counts = count_by_metadata_status(&conn).unwrap();
        assert_eq!(counts, vec![("pending".to_string(), 2)]);
    }

    #[test]
    fn media_status_update() {
        let conn = setup();
        let rec = insert_media(&conn, "/gone.mp4", MediaStatus::Available).unwrap();
        assert!(update_media_status(&conn, &rec.id, MediaStatus::Missing).unwrap());
        let found = get_media(&conn, &rec.id).unwrap().unwrap();
        assert!(!found.is_available());
    }
}
