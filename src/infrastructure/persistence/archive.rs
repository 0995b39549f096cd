//! JSON-file session archive.
//!
//! Layout under the data directory:
//!
//! ```text
//! pods.json
//! rhythm_index.json
//! scratchpad.json
//! ledgers/<model>/<session_id>.json
//! ```
//!
//! Every write goes to a sibling `.tmp` file first and is renamed into place.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{PodArchive, RhythmIndex, ScratchItem, SessionLedger};
use crate::domain::ports::ArchiveStore;

const PODS_FILE: &str = "pods.json";
const RHYTHM_FILE: &str = "rhythm_index.json";
const SCRATCHPAD_FILE: &str = "scratchpad.json";
const LEDGER_DIR: &str = "ledgers";

/// Archive rooted at a data directory.
#[derive(Debug, Clone)]
pub struct SessionArchive {
    root: PathBuf,
}

impl SessionArchive {
    /// Archive rooted at `root`; the directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Data directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of one session's ledger.
    pub fn ledger_path(&self, model: &str, session_id: &str) -> PathBuf {
        self.root
            .join(LEDGER_DIR)
            .join(sanitize(model))
            .join(format!("{}.json", sanitize(session_id)))
    }
}

impl ArchiveStore for SessionArchive {
    fn load_pods(&self) -> DomainResult<PodArchive> {
        Ok(read_json(&self.root.join(PODS_FILE))?.unwrap_or_default())
    }

    fn save_pods(&self, pods: &PodArchive) -> DomainResult<()> {
        write_json_atomic(&self.root.join(PODS_FILE), pods)?;
        debug!(count = pods.len(), "Pod archive written");
        Ok(())
    }

    fn load_rhythm_index(&self) -> DomainResult<RhythmIndex> {
        Ok(read_json(&self.root.join(RHYTHM_FILE))?.unwrap_or_default())
    }

    fn save_rhythm_index(&self, index: &RhythmIndex) -> DomainResult<()> {
        write_json_atomic(&self.root.join(RHYTHM_FILE), index)?;
        debug!(sessions = index.sessions.len(), "Rhythm index written");
        Ok(())
    }

    fn save_ledger(&self, ledger: &SessionLedger) -> DomainResult<()> {
        let path = self.ledger_path(&ledger.model, &ledger.session_id);
        write_json_atomic(&path, ledger)?;
        debug!(
            session_id = %ledger.session_id,
            turns = ledger.turns.len(),
            path = %path.display(),
            "Ledger written"
        );
        Ok(())
    }

    fn load_ledger(&self, model: &str, session_id: &str) -> DomainResult<Option<SessionLedger>> {
        read_json(&self.ledger_path(model, session_id))
    }

    fn load_scratchpad(&self) -> DomainResult<Vec<ScratchItem>> {
        Ok(read_json(&self.root.join(SCRATCHPAD_FILE))?.unwrap_or_default())
    }

    fn save_scratchpad(&self, items: &[ScratchItem]) -> DomainResult<()> {
        write_json_atomic(&self.root.join(SCRATCHPAD_FILE), &items)?;
        debug!(count = items.len(), "Scratchpad written");
        Ok(())
    }
}

/// File-name-safe form of a label.
fn sanitize(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> DomainResult<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(DomainError::PersistenceError(format!(
                "Failed to read {}: {e}",
                path.display()
            )))
        }
    };
    serde_json::from_slice(&bytes).map(Some).map_err(|e| {
        DomainError::SerializationError(format!("Failed to parse {}: {e}", path.display()))
    })
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> DomainResult<()> {
    let persist = |e: io::Error| {
        DomainError::PersistenceError(format!("Failed to write {}: {e}", path.display()))
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(persist)?;
    }
    let json = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    let mut file = File::create(&tmp).map_err(persist)?;
    file.write_all(&json).map_err(persist)?;
    file.sync_all().map_err(persist)?;
    fs::rename(&tmp, path).map_err(persist)
}
