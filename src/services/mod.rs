pub mod conversation_store;
pub mod direction;
pub mod fatigue_detector;
pub mod pod_space;
pub mod pulse_estimator;
pub mod recapitulation;
pub mod response_validator;
pub mod retry_orchestrator;
pub mod rhythm;
pub mod scratchpad;
pub mod session;
pub mod turn_parser;

pub use conversation_store::ConversationStore;
pub use direction::DirectionTracker;
pub use fatigue_detector::FatigueDetector;
pub use pod_space::PodSpace;
pub use pulse_estimator::{modulate_thresholds, PulseEstimator, PulseReading};
pub use response_validator::ResponseValidator;
pub use retry_orchestrator::{Candidate, RetryOrchestrator, TurnContext, TurnOutcome};
pub use rhythm::RhythmRecorder;
pub use scratchpad::Scratchpad;
pub use session::{Session, TurnReport};
pub use turn_parser::parse_turn;
