//! ms-db: database access and persistence layer.
//!
//! This crate provides SQLite-backed storage with connection pooling,
//! embedded migrations, the [`models::MediaRecord`] row type, and the media
//! ledger queries used by the harvester.

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
