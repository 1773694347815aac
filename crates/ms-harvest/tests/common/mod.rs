//! Shared doubles for harvester tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ms_av::Prober;
use ms_core::events::EventBus;
use ms_core::{Error, MediaId, MediaStatus, MetadataStatus, ProbeResult, Result};
use ms_db::models::MediaRecord;
use ms_harvest::{Harvester, MetadataLedger};
use parking_lot::Mutex;

/// A `update_metadata` call as observed by the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataWrite {
    pub path: String,
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
}

/// In-memory ledger that records every mutation.
#[derive(Default)]
pub struct MemoryLedger {
    records: Mutex<Vec<MediaRecord>>,
    pub transitions: Mutex<Vec<(MediaId, MetadataStatus)>>,
    pub metadata_writes: Mutex<Vec<MetadataWrite>>,
    pub generation_params: Mutex<Vec<(MediaId, String)>>,
    /// Number of `pending_media` calls.
    pub refills: AtomicUsize,
    /// Make `find_by_id` fail.
    pub fail_lookups: AtomicBool,
    /// Make `update_metadata_status` fail.
    pub fail_status_writes: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, record: MediaRecord) {
        self.records.lock().push(record);
    }

    /// Change a record's presence the way the indexer would.
    pub fn set_media_status(&self, id: &str, status: MediaStatus) {
        let mut records = self.records.lock();
        if let Some(record) = records.iter_mut().find(|r| r.id.as_str() == id) {
            record.status = status;
        }
    }

    pub fn status_of(&self, id: &str) -> Option<MetadataStatus> {
        self.records
            .lock()
            .iter()
            .find(|r| r.id.as_str() == id)
            .map(|r| r.metadata_status)
    }

    /// Status transitions recorded for one id, in order.
    pub fn transitions_for(&self, id: &str) -> Vec<MetadataStatus> {
        self.transitions
            .lock()
            .iter()
            .filter(|(i, _)| i.as_str() == id)
            .map(|(_, s)| *s)
            .collect()
    }

    /// Ids in the order they reached `processing`.
    pub fn processing_order(&self) -> Vec<String> {
        self.transitions
            .lock()
            .iter()
            .filter(|(_, s)| *s == MetadataStatus::Processing)
            .map(|(i, _)| i.to_string())
            .collect()
    }

    fn set_status(&self, record: &mut MediaRecord, status: MetadataStatus) {
        record.metadata_status = status;
        self.transitions.lock().push((record.id.clone(), status));
    }
}

impl MetadataLedger for MemoryLedger {
    fn pending_media(&self, limit: usize) -> Result<Vec<MediaRecord>> {
        self.refills.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|r| r.metadata_status == MetadataStatus::Pending)
            .filter(|r| r.status == MediaStatus::Available)
            .take(limit)
            .cloned()
            .collect())
    }

    fn find_by_id(&self, id: &MediaId) -> Result<Option<MediaRecord>> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(Error::database("database is locked"));
        }
        Ok(self.records.lock().iter().find(|r| &r.id == id).cloned())
    }

    fn update_metadata_status(&self, id: &MediaId, status: MetadataStatus) -> Result<()> {
        if self.fail_status_writes.load(Ordering::SeqCst) {
            return Err(Error::database("database is locked"));
        }
        let mut records = self.records.lock();
        if let Some(record) = records.iter_mut().find(|r| &r.id == id) {
            self.set_status(record, status);
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
        let mut records = self.records.lock();
        if let Some(record) = records.iter_mut().find(|r| r.path == path) {
            record.duration = Some(duration);
            record.width = Some(width);
            record.height = Some(height);
            record.fps = Some(fps);
            record.codec = Some(codec.to_string());
        }
        self.metadata_writes.lock().push(MetadataWrite {
            path: path.to_string(),
            duration,
            width,
            height,
            fps,
            codec: codec.to_string(),
        });
        Ok(())
    }

    fn update_generation_params(&self, id: &MediaId, json: &str) -> Result<()> {
        let mut records = self.records.lock();
        if let Some(record) = records.iter_mut().find(|r| &r.id == id) {
            record.generation_params = Some(json.to_string());
        }
        self.generation_params
            .lock()
            .push((id.clone(), json.to_string()));
        Ok(())
    }

    fn reset_incomplete_metadata_status(&self) -> Result<usize> {
        // Every status in the typed model is a known one.
        Ok(0)
    }

    fn reset_stuck_processing_status(&self) -> Result<usize> {
        let mut records = self.records.lock();
        let mut n = 0;
        for record in records
            .iter_mut()
            .filter(|r| r.metadata_status == MetadataStatus::Processing)
        {
            self.set_status(record, MetadataStatus::Pending);
            n += 1;
        }
        Ok(n)
    }
}

/// Prober that returns canned results per media path.
#[derive(Default)]
pub struct ScriptedProber {
    results: Mutex<HashMap<PathBuf, Option<ProbeResult>>>,
    delay: Option<Duration>,
    pub calls: Mutex<Vec<(PathBuf, PathBuf)>>,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl ScriptedProber {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A prober whose every call sleeps for `delay` first.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn script(&self, media: &str, result: Option<ProbeResult>) {
        self.results.lock().insert(PathBuf::from(media), result);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn extract(&self, binary: &Path, media: &Path) -> Option<ProbeResult> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.calls
            .lock()
            .push((binary.to_path_buf(), media.to_path_buf()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = self
            .results
            .lock()
            .get(media)
            .cloned()
            .unwrap_or_else(|| Some(probe_result(BTreeMap::new())));
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub fn record(
    id: &str,
    path: &str,
    status: MediaStatus,
    metadata_status: MetadataStatus,
) -> MediaRecord {
    let now = chrono::Utc::now().to_rfc3339();
    MediaRecord {
        id: MediaId::from(id),
        path: path.to_string(),
        file_name: path.rsplit('/').next().unwrap_or(path).to_string(),
        status,
        metadata_status,
        duration: None,
        width: None,
        height: None,
        fps: None,
        codec: None,
        generation_params: None,
        created_at: now.clone(),
        updated_at: now,
    }
}

pub fn pending(id: &str, path: &str) -> MediaRecord {
    record(id, path, MediaStatus::Available, MetadataStatus::Pending)
}

pub fn probe_result(tags: BTreeMap<String, String>) -> ProbeResult {
    ProbeResult {
        duration: 120.0,
        width: 1920,
        height: 1080,
        fps: 30.0,
        codec: "h264".to_string(),
        tags,
    }
}

pub struct Fixture {
    pub ledger: Arc<MemoryLedger>,
    pub prober: Arc<ScriptedProber>,
    pub events: Arc<EventBus>,
    pub harvester: Arc<Harvester>,
}

/// A harvester over fresh doubles, configured with `/usr/bin/ffprobe`.
pub fn fixture() -> Fixture {
    fixture_with(ScriptedProber::new())
}

pub fn fixture_with(prober: Arc<ScriptedProber>) -> Fixture {
    let ledger = MemoryLedger::new();
    let events = Arc::new(EventBus::default());
    let harvester = Arc::new(Harvester::new(
        ledger.clone(),
        prober.clone(),
        events.clone(),
    ));
    harvester.set_probe_path(Some(PathBuf::from("/usr/bin/ffprobe")));
    Fixture {
        ledger,
        prober,
        events,
        harvester,
    }
}
