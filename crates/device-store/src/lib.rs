//! Device Store
//!
//! Local persistent cache of MRA devices.
//!
//! **Components:**
//! - `store`: scoped read / read-write transactions over a single redb file
//! - `repository`: JSON-encoded device records keyed by guid
//! - `service`: validation, parent/child bookkeeping and statistics
//! - `models`: the device record and aggregate statistics

pub mod models;
pub mod repository;
pub mod service;
pub mod store;

pub use models::{parse_patch_level, ActivationStatus, Device, Platform, Software, Statistics};
pub use repository::DeviceRepository;
pub use service::{is_vulnerable, CreateOutcome, DeviceService};
pub use store::{KvStore, ReadTxn, RedbStore, WriteTxn};
