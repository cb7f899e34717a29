//! Persisted index snapshots.
//!
//! A snapshot is a JSON envelope holding the serialized index and its
//! SHA-256, so a truncated or hand-edited file is rejected instead of
//! loaded.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{SearchError, SearchResult, TextIndex};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    checksum: String,
    index: String,
}

fn checksum(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// Location of a persisted snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Write `index`, replacing any previous snapshot atomically.
    pub fn save(&self, index: &TextIndex) -> SearchResult<()> {
        let body = serde_json::to_string(index)?;
        let envelope = Envelope {
            version: SNAPSHOT_VERSION,
            checksum: checksum(&body),
            index: body,
        };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.temp_path();
        fs::write(&tmp, serde_json::to_vec(&envelope)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Read and verify the snapshot.
    ///
    /// Fails with `NoSnapshot` when the file is absent and `CorruptSnapshot`
    /// when it is unreadable, fails its checksum, or holds an empty index.
    pub fn load(&self) -> SearchResult<TextIndex> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SearchError::NoSnapshot(self.path.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        let envelope: Envelope = serde_json::from_slice(&raw)
            .map_err(|e| SearchError::CorruptSnapshot(format!("bad envelope: {}", e)))?;
        if envelope.version != SNAPSHOT_VERSION {
            return Err(SearchError::CorruptSnapshot(format!(
                "unsupported version {}",
                envelope.version
            )));
        }
        if checksum(&envelope.index) != envelope.checksum {
            return Err(SearchError::CorruptSnapshot("checksum mismatch".into()));
        }

        let index: TextIndex = serde_json::from_str(&envelope.index)
            .map_err(|e| SearchError::CorruptSnapshot(format!("bad index: {}", e)))?;
        if index.is_empty() {
            return Err(SearchError::CorruptSnapshot("empty index".into()));
        }
        Ok(index)
    }

    /// Delete the snapshot. Returns whether one existed.
    pub fn remove(&self) -> SearchResult<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Number of documents in a loadable snapshot.
    pub fn document_count(&self) -> Option<usize> {
        self.load().ok().map(|index| index.len())
    }
}
