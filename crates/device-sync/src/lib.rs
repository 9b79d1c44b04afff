//! Device Sync
//!
//! Pulls the MRA device inventory page by page, writes it to the local
//! cache through a bounded worker pool, and reports risk analytics over the
//! cached population.

pub mod app;
pub mod cli;
pub mod config;
pub mod convert;
pub mod pool;
pub mod report;
pub mod sync;

pub use config::Config;
pub use pool::{BatchTally, UnitOutcome, WorkerPool};
pub use sync::{Progress, SyncPipeline, SyncReport};
