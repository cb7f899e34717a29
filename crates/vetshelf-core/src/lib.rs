//! Vetshelf Core Library
//!
//! Offline-first data layer for a veterinary clinic: client, patient and
//! visit records, a search index kept in step with them, and due dates for
//! periodic care.
//!
//! # Architecture
//!
//! ```text
//!  caller
//!    │
//!    ▼
//!  Database ──────────────► DocumentStore (SQLite)
//!    │   ▲                       │
//!    │   └──── change events ────┘
//!    │
//!    ├──► SearchWorker thread ──► TextIndex ──► snapshot file
//!    │
//!    └──► schedule (due dates, computed on read and serialize)
//! ```
//!
//! # Core Principle
//!
//! **The store is the source of truth.** The search index is derived and can
//! be rebuilt from the store at any time; every read path still works, more
//! slowly, without it.
//!
//! # Modules
//!
//! - [`store`]: Transactional document store with secondary indexes
//! - [`models`]: Domain types (Client, Patient, Visit, SearchSummary)
//! - [`schedule`]: Periodic care due-date computation
//! - [`search`]: Text index, snapshots and the search worker
//! - [`db`]: Coordination layer tying the above together
//! - [`config`], [`logging`], [`ids`]: Ambient support

pub mod config;
pub mod db;
pub mod ids;
pub mod logging;
pub mod models;
pub mod schedule;
pub mod search;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use db::{
    Database, DbError, DbResult, ImportData, ImportReport, SearchResults, UpdatePatientOptions,
    DESTROY_CONFIRMATION,
};
pub use models::{Client, Entity, Patient, PhoneInfo, SearchSummary, Sex, SexKind, Task, Visit};
pub use schedule::{DueGroup, PERIODIC_TASKS};
pub use search::{SearchError, SearchWorker};
pub use store::{DocumentStore, StoreError};
