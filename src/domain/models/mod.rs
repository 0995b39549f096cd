//! Domain models: plain data shared by the services and adapters.

pub mod alert;
pub mod attempt;
pub mod config;
pub mod embedding;
pub mod fatigue;
pub mod ledger;
pub mod pod;
pub mod rhythm;
pub mod scratch;
pub mod turn;

pub use alert::{alert_weight, category, Severity, ValidationAlert};
pub use attempt::{ErrorClass, ModelAttempt};
pub use config::{
    BackendProvider, BackendsConfig, Config, ConversationConfig, DirectionConfig, EmbeddingConfig,
    EmbeddingProviderKind, FatigueConfig, LoggingConfig, ModelDescriptor, PersistenceConfig,
    PodConfig, PulseConfig, RateLimitConfig, RetryConfig, SubspaceMethod, ValidationConfig,
};
pub use embedding::{cosine_similarity, EmbeddingVector, NEAR_ZERO};
pub use fatigue::{
    FatigueModel, FatigueSample, FatigueStatus, FatigueThresholds, FatigueWeights,
    ModelSelection, TokenProbabilities,
};
pub use ledger::{CommittedTurn, LedgerEvent, SessionLedger, UnveiledPod};
pub use pod::{
    ActivationCondition, Pod, PodArchive, PodId, PodMatch, PodRecord, PodState, PodThresholds,
    DEFAULT_URGENCY,
};
pub use rhythm::{
    BreathingEvent, BreathingKind, DominantRhythm, FatigueTrend, RhythmIndex, RhythmIndexEntry,
    RhythmSample, RhythmSignature, TurnEvent,
};
pub use scratch::{ScratchItem, SCRATCH_ID_LEN};
pub use turn::{
    HistoryEntry, InternalSignals, ParseKind, ParseOutcome, ProcessMetadata, Role, TurnResult,
};
