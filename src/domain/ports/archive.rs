//! Archive port - cross-session persistence of pods, ledgers and rhythm.

use crate::domain::errors::DomainResult;
use crate::domain::models::{PodArchive, RhythmIndex, ScratchItem, SessionLedger};

/// Storage for state that outlives a session.
///
/// Calls are synchronous: the archive is read at session start and written at
/// commit and session boundaries, never concurrently with a backend call.
pub trait ArchiveStore: Send + Sync {
    /// Load the pod archive; empty when nothing has been saved yet.
    fn load_pods(&self) -> DomainResult<PodArchive>;

    /// Replace the pod archive.
    fn save_pods(&self, pods: &PodArchive) -> DomainResult<()>;

    /// Load the rhythm index; empty when nothing has been saved yet.
    fn load_rhythm_index(&self) -> DomainResult<RhythmIndex>;

    /// Replace the rhythm index.
    fn save_rhythm_index(&self, index: &RhythmIndex) -> DomainResult<()>;

    /// Write (or overwrite) one session's ledger.
    fn save_ledger(&self, ledger: &SessionLedger) -> DomainResult<()>;

    /// Read back one session's ledger, if it was saved.
    fn load_ledger(&self, model: &str, session_id: &str) -> DomainResult<Option<SessionLedger>>;

    /// Load the scratchpad; empty when nothing has been saved yet.
    fn load_scratchpad(&self) -> DomainResult<Vec<ScratchItem>>;

    /// Replace the scratchpad.
    fn save_scratchpad(&self, items: &[ScratchItem]) -> DomainResult<()>;
}
