//! # ms-harvest
//!
//! Background extraction of technical metadata (duration, resolution, frame
//! rate, codec, descriptive tags) for media records.
//!
//! - [`MetadataLedger`] is the persistence seam; [`SqliteLedger`] implements
//!   it over the `ms-db` pool.
//! - [`Harvester`] owns the priority and batch queues and performs one
//!   extraction per [`Harvester::tick`].
//! - [`HarvesterService`] runs crash recovery, then drives ticks on a tokio
//!   interval until shut down.

pub mod harvester;
pub mod ledger;
pub mod service;

pub use harvester::{Harvester, RecoveryReport, TickOutcome};
pub use ledger::{MetadataLedger, SqliteLedger};
pub use service::HarvesterService;
