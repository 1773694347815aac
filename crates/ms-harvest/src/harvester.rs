//! Single-flight metadata harvester.
//!
//! Candidates come from two queues: a FIFO of on-demand requests and a batch
//! buffer refilled from the ledger's pending records. Each [`Harvester::tick`]
//! processes at most one record, priority first.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ms_av::Prober;
use ms_core::config::{HarvesterConfig, MAX_BATCH_SIZE};
use ms_core::events::{EventBus, EventPayload};
use ms_core::{MediaId, MetadataStatus, ProbeResult, Result};
use ms_db::models::MediaRecord;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;

use crate::ledger::MetadataLedger;

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick was still running.
    Busy,
    /// No probe binary is configured.
    Unconfigured,
    /// Both queues were empty.
    Idle,
    /// The candidate was missing, unavailable, or already handled.
    Skipped(MediaId),
    Completed(MediaId),
    /// The probe produced no result; the record is now `failed`.
    Failed(MediaId),
    /// A ledger operation failed during the tick.
    Error,
}

/// Rows reset by [`Harvester::recover`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub stuck_processing: usize,
    pub incomplete: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Priority,
    Batch,
}

#[derive(Debug, Default)]
struct Queues {
    priority: VecDeque<MediaId>,
    batch: VecDeque<MediaId>,
    in_flight: Option<MediaId>,
}

#[derive(Debug, Clone)]
struct Settings {
    probe_path: Option<PathBuf>,
    batch_size: usize,
}

/// Background extractor of technical metadata.
pub struct Harvester {
    ledger: Arc<dyn MetadataLedger>,
    prober: Arc<dyn Prober>,
    events: Arc<EventBus>,
    settings: RwLock<Settings>,
    queues: Mutex<Queues>,
    busy: AtomicBool,
    wake: Notify,
}

/// Clears the busy flag and the in-flight marker when a tick ends.
struct TickGuard<'a> {
    harvester: &'a Harvester,
}

impl<'a> TickGuard<'a> {
    fn acquire(harvester: &'a Harvester) -> Option<Self> {
        harvester
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { harvester })
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.harvester.queues.lock().in_flight = None;
        self.harvester.busy.store(false, Ordering::Release);
    }
}

impl Harvester {
    pub fn new(
        ledger: Arc<dyn MetadataLedger>,
        prober: Arc<dyn Prober>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            ledger,
            prober,
            events,
            settings: RwLock::new(Settings {
                probe_path: None,
                batch_size: HarvesterConfig::default().effective_batch_size(),
            }),
            queues: Mutex::new(Queues::default()),
            busy: AtomicBool::new(false),
            wake: Notify::new(),
        }
    }

    /// Set the probe binary. `None` or an empty path disables extraction.
    pub fn set_probe_path(&self, path: Option<PathBuf>) {
        let path = path.filter(|p| !p.as_os_str().is_empty());
        tracing::debug!(probe_path = ?path, "Probe path updated");
        self.settings.write().probe_path = path;
    }

    pub fn probe_path(&self) -> Option<PathBuf> {
        self.settings.read().probe_path.clone()
    }

    /// Set how many pending records one batch refill fetches (clamped to `1..=100`).
    pub fn set_batch_size(&self, size: usize) {
        self.settings.write().batch_size = size.clamp(1, MAX_BATCH_SIZE);
    }

    pub fn batch_size(&self) -> usize {
        self.settings.read().batch_size
    }

    /// Whether a tick is currently running.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Ask for `id` to be harvested ahead of batch work.
    ///
    /// Returns `false` if the id is already queued or being extracted.
    pub fn request_harvest(&self, id: &MediaId) -> bool {
        {
            let mut queues = self.queues.lock();
            if queues.in_flight.as_ref() == Some(id) || queues.priority.contains(id) {
                tracing::trace!(media_id = %id, "Harvest already requested");
                return false;
            }
            queues.priority.push_back(id.clone());
        }
        tracing::debug!(media_id = %id, "Harvest requested");
        self.wake.notify_one();
        true
    }

    /// Number of ids waiting in the priority queue.
    pub fn priority_len(&self) -> usize {
        self.queues.lock().priority.len()
    }

    /// Resolves once [`request_harvest`](Self::request_harvest) has queued work.
    pub(crate) async fn requested(&self) {
        self.wake.notified().await;
    }

    /// Reset rows an interrupted run left behind.
    ///
    /// Must complete before the first tick so no record stays `processing`
    /// forever.
    pub fn recover(&self) -> Result<RecoveryReport> {
        let stuck_processing = self.ledger.reset_stuck_processing_status()?;
        let incomplete = self.ledger.reset_incomplete_metadata_status()?;
        Ok(RecoveryReport {
            stuck_processing,
            incomplete,
        })
    }

    /// Process at most one record.
    pub async fn tick(&self) -> TickOutcome {
        let Some(_guard) = TickGuard::acquire(self) else {
            return TickOutcome::Busy;
        };

        let Some(probe_path) = self.probe_path() else {
            return TickOutcome::Unconfigured;
        };

        let (id, source) = match self.next_candidate() {
            Ok(Some(candidate)) => candidate,
            Ok(None) => return TickOutcome::Idle,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load pending media");
                return TickOutcome::Error;
            }
        };

        self.harvest(id, source, &probe_path).await
    }

    /// Pop the next id and mark it in flight.
    fn next_candidate(&self) -> Result<Option<(MediaId, Source)>> {
        {
            let mut queues = self.queues.lock();
            if let Some(id) = queues.priority.pop_front() {
                queues.in_flight = Some(id.clone());
                return Ok(Some((id, Source::Priority)));
            }
            if let Some(id) = queues.batch.pop_front() {
                queues.in_flight = Some(id.clone());
                return Ok(Some((id, Source::Batch)));
            }
        }

        let pending = self.ledger.pending_media(self.batch_size())?;
        if pending.is_empty() {
            return Ok(None);
        }
        tracing::trace!(count = pending.len(), "Refilled batch buffer");

        let mut queues = self.queues.lock();
        queues.batch.extend(pending.into_iter().map(|r| r.id));
        let id = queues.batch.pop_front();
        queues.in_flight = id.clone();
        Ok(id.map(|id| (id, Source::Batch)))
    }

    fn should_skip(record: &MediaRecord, source: Source) -> bool {
        if !record.is_available() {
            return true;
        }
        match source {
            Source::Priority => record.metadata_status == MetadataStatus::Completed,
            Source::Batch => record.metadata_status != MetadataStatus::Pending,
        }
    }

    async fn harvest(&self, id: MediaId, source: Source, probe_path: &Path) -> TickOutcome {
        let record = match self.ledger.find_by_id(&id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!(media_id = %id, "Media no longer exists, skipping");
                return TickOutcome::Skipped(id);
            }
            Err(e) => {
                tracing::warn!(media_id = %id, error = %e, "Failed to load media");
                self.requeue(id, source);
                return TickOutcome::Error;
            }
        };

        if Self::should_skip(&record, source) {
            tracing::debug!(
                media_id = %id,
                status = %record.status,
                metadata_status = %record.metadata_status,
                "Skipping harvest candidate"
            );
            return TickOutcome::Skipped(id);
        }

        if let Err(e) = self
            .ledger
            .update_metadata_status(&id, MetadataStatus::Processing)
        {
            tracing::warn!(media_id = %id, error = %e, "Failed to mark media processing");
            self.requeue(id, source);
            return TickOutcome::Error;
        }

        tracing::debug!(
            media_id = %id,
            path = %record.path,
            prober = self.prober.name(),
            "Extracting metadata"
        );
        let result = self
            .prober
            .extract(probe_path, Path::new(&record.path))
            .await;

        match result {
            Some(result) => match self.store(&record, &result) {
                Ok(()) => {
                    tracing::info!(
                        media_id = %id,
                        path = %record.path,
                        codec = %result.codec,
                        "Metadata extracted"
                    );
                    self.events.broadcast(EventPayload::MediaUpdated {
                        id: id.clone(),
                        path: record.path,
                    });
                    TickOutcome::Completed(id)
                }
                Err(e) => {
                    tracing::warn!(media_id = %id, error = %e, "Failed to store metadata");
                    self.mark_failed(&id);
                    TickOutcome::Error
                }
            },
            None => {
                tracing::info!(media_id = %id, path = %record.path, "Metadata extraction failed");
                match self.ledger.update_metadata_status(&id, MetadataStatus::Failed) {
                    Ok(()) => TickOutcome::Failed(id),
                    Err(e) => {
                        tracing::warn!(media_id = %id, error = %e, "Failed to mark media failed");
                        TickOutcome::Error
                    }
                }
            }
        }
    }

    fn store(&self, record: &MediaRecord, result: &ProbeResult) -> Result<()> {
        self.ledger.update_metadata(
            &record.path,
            result.duration,
            result.width,
            result.height,
            result.fps,
            &result.codec,
        )?;
        if let Some(json) = result.generation_params()? {
            self.ledger.update_generation_params(&record.id, &json)?;
        }
        self.ledger
            .update_metadata_status(&record.id, MetadataStatus::Completed)
    }

    /// Put an on-demand request back at the head of the queue after a ledger
    /// error that left the record untouched. Batch ids are left to the next
    /// refill.
    fn requeue(&self, id: MediaId, source: Source) {
        if source != Source::Priority {
            return;
        }
        let mut queues = self.queues.lock();
        if !queues.priority.contains(&id) {
            tracing::debug!(media_id = %id, "Requeued harvest request");
            queues.priority.push_front(id);
        }
    }

    /// Best-effort `failed` write after a ledger error mid-extraction.
    fn mark_failed(&self, id: &MediaId) {
        if let Err(e) = self.ledger.update_metadata_status(id, MetadataStatus::Failed) {
            tracing::warn!(media_id = %id, error = %e, "Failed to mark media failed");
        }
    }
}
