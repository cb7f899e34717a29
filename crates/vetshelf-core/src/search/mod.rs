//! Full-text search over client summaries.
//!
//! The index is a derived projection of the document store. It runs on a
//! worker thread ([`SearchWorker`]) and persists itself as a checksummed
//! snapshot ([`SnapshotFile`]) so a cold start can skip the rebuild.

mod index;
mod snapshot;
mod worker;

pub use index::{tokenize, IndexStats, TextIndex, FIELD_BOOSTS, FUZZY_THRESHOLD};
pub use snapshot::SnapshotFile;
pub use worker::{SearchWorker, Ticket};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::models::SearchSummary;

/// Search errors.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No search snapshot at {0}")]
    NoSnapshot(PathBuf),

    #[error("Corrupt search snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("Search request {0} timed out")]
    Timeout(u64),

    #[error("Search worker is not running")]
    Disconnected,

    #[error("Failed to start search worker: {0}")]
    Spawn(String),

    #[error("Unexpected reply to {0} request")]
    UnexpectedReply(&'static str),
}

pub type SearchResult<T> = Result<T, SearchError>;

/// One ranked match: a client id and its relevance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
}

/// Ranked matches, best first. Consumed once.
#[derive(Debug)]
pub struct SearchHits {
    hits: std::vec::IntoIter<SearchHit>,
}

impl SearchHits {
    pub(crate) fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits: hits.into_iter(),
        }
    }
}

impl Iterator for SearchHits {
    type Item = SearchHit;

    fn next(&mut self) -> Option<SearchHit> {
        self.hits.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.hits.size_hint()
    }
}

impl ExactSizeIterator for SearchHits {}

/// Diagnostic answer from [`SearchWorker::debug`].
#[derive(Debug, Clone, PartialEq)]
pub enum DebugInfo {
    /// The indexed summary for one id, if indexed.
    Document(Option<SearchSummary>),
    Stats {
        documents: usize,
        terms: usize,
        /// Documents in the persisted snapshot, `None` if it cannot be loaded.
        snapshot_documents: Option<usize>,
    },
}
