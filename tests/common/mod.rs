//! Shared test harness for integration tests.
//!
//! Builds an [`App`] over an in-memory database with a [`FixedProber`] so no
//! external binary is needed.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use mediashelf::App;
use ms_av::Prober;
use ms_core::config::Config;
use ms_core::{MediaId, MediaStatus, ProbeResult};
use ms_db::pool::{get_conn, init_memory_pool, DbPool};
use ms_db::queries::media;

/// Prober that answers every call with the same result.
pub struct FixedProber {
    result: Option<ProbeResult>,
    pub calls: AtomicUsize,
}

impl FixedProber {
    pub fn new(result: Option<ProbeResult>) -> Arc<Self> {
        Arc::new(Self {
            result,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for FixedProber {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn extract(&self, _binary: &Path, _media: &Path) -> Option<ProbeResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

pub fn sample_result() -> ProbeResult {
    ProbeResult {
        duration: 120.0,
        width: 1920,
        height: 1080,
        fps: 30.0,
        codec: "h264".into(),
        tags: [("prompt".to_string(), "masterpiece".to_string())].into(),
    }
}

/// Default config with a fast tick and no tool discovery.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.tools.auto_discover = false;
    config.harvester.tick_interval_ms = 10;
    config
}

pub struct TestHarness {
    pub app: App,
    pub db: DbPool,
    pub prober: Arc<FixedProber>,
}

impl TestHarness {
    /// An app whose prober always succeeds, with a probe path configured.
    pub fn new() -> Self {
        Self::with_prober(FixedProber::new(Some(sample_result())))
    }

    pub fn with_prober(prober: Arc<FixedProber>) -> Self {
        let db = init_memory_pool().expect("failed to create in-memory pool");
        let app = App::create_with(test_config(), db.clone(), prober.clone())
            .expect("failed to create app");
        app.set_probe_path(Some(PathBuf::from("/opt/ffprobe")));
        Self { app, db, prober }
    }

    pub fn insert(&self, id: &str, path: &str) {
        let conn = get_conn(&self.db).unwrap();
        media::insert_media_with_id(&conn, &MediaId::from(id), path, MediaStatus::Available)
            .unwrap();
    }

    pub fn get(&self, id: &str) -> ms_db::models::MediaRecord {
        let conn = get_conn(&self.db).unwrap();
        media::get_media(&conn, &MediaId::from(id)).unwrap().unwrap()
    }
}
