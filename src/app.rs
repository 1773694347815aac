//! Application composition root.
//!
//! [`App`] wires the database pool, tool registry, event bus and harvester
//! together and owns the one running [`HarvesterService`]. Only one `App` may
//! be active per process.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ms_av::{FfprobeProber, Prober, ToolKind, ToolRegistry};
use ms_core::config::Config;
use ms_core::events::{Event, EventBus};
use ms_core::{Error, MediaId, Result};
use ms_db::pool::{init_pool, DbPool};
use ms_harvest::{Harvester, HarvesterService, SqliteLedger};
use tokio::sync::broadcast;

static ACTIVE: AtomicBool = AtomicBool::new(false);

/// Holds the process-wide active-instance slot until dropped.
struct ActiveSlot;

impl ActiveSlot {
    fn claim() -> Result<Self> {
        ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self)
            .map_err(|_| Error::Conflict("an application instance is already active".into()))
    }
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        ACTIVE.store(false, Ordering::Release);
    }
}

/// The running application.
pub struct App {
    config: Arc<Config>,
    db: DbPool,
    tools: Arc<ToolRegistry>,
    events: Arc<EventBus>,
    harvester: Arc<Harvester>,
    service: Option<HarvesterService>,
    _slot: ActiveSlot,
}

impl App {
    /// Open the configured database and start the harvester.
    ///
    /// Fails with [`Error::Conflict`] while another `App` is active. Must be
    /// called from within a tokio runtime.
    pub fn create(config: Config) -> Result<Self> {
        let slot = ActiveSlot::claim()?;
        tracing::info!(path = %config.database.path.display(), "Opening database");
        let db = init_pool(&config.database.path)?;
        let prober = Arc::new(FfprobeProber::new(config.tools.probe_timeout()));
        Self::assemble(slot, config, db, prober)
    }

    /// Like [`create`](Self::create) but over an existing pool and prober.
    pub fn create_with(config: Config, db: DbPool, prober: Arc<dyn Prober>) -> Result<Self> {
        let slot = ActiveSlot::claim()?;
        Self::assemble(slot, config, db, prober)
    }

    fn assemble(
        slot: ActiveSlot,
        config: Config,
        db: DbPool,
        prober: Arc<dyn Prober>,
    ) -> Result<Self> {
        let tools = Arc::new(ToolRegistry::discover(&config.tools));
        let events = Arc::new(EventBus::default());
        let ledger = Arc::new(SqliteLedger::new(db.clone()));

        let harvester = Arc::new(Harvester::new(ledger, prober, events.clone()));
        harvester.set_batch_size(config.harvester.effective_batch_size());
        harvester.set_probe_path(tools.path(ToolKind::Ffprobe).map(PathBuf::from));

        let service = if config.harvester.enabled {
            Some(HarvesterService::start(
                harvester.clone(),
                config.harvester.tick_interval(),
            )?)
        } else {
            tracing::info!("Harvester disabled by configuration");
            None
        };

        Ok(Self {
            config: Arc::new(config),
            db,
            tools,
            events,
            harvester,
            service,
            _slot: slot,
        })
    }

    /// Whether an `App` is currently active in this process.
    pub fn is_active() -> bool {
        ACTIVE.load(Ordering::Acquire)
    }

    /// Queue `id` for extraction ahead of batch work.
    ///
    /// Returns `false` if the id is already queued or in flight.
    pub fn request_harvest(&self, id: &MediaId) -> bool {
        self.harvester.request_harvest(id)
    }

    /// Receive `media:updated` notifications sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Change the probe binary. `None` or an empty path pauses extraction.
    pub fn set_probe_path(&self, path: Option<PathBuf>) {
        self.harvester.set_probe_path(path);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn db(&self) -> &DbPool {
        &self.db
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn harvester(&self) -> &Arc<Harvester> {
        &self.harvester
    }

    pub fn is_harvesting(&self) -> bool {
        self.service.as_ref().is_some_and(HarvesterService::is_running)
    }

    /// Stop the harvester, waiting for an in-flight extraction, and release
    /// the active-instance slot.
    pub async fn shutdown(mut self) {
        if let Some(service) = self.service.take() {
            service.shutdown().await;
        }
        tracing::info!("Application shut down");
    }
}
