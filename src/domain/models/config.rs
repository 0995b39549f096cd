use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::fatigue::{FatigueThresholds, FatigueWeights, ModelSelection};
use super::pod::PodThresholds;

/// Main configuration structure for Vessel
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Fatigue detector configuration
    #[serde(default)]
    pub fatigue: FatigueConfig,

    /// Pod activation configuration
    #[serde(default)]
    pub pods: PodConfig,

    /// Response validation rule set
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Retry, circuit breaker and fallback policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Backend models and per-role fallback ranking
    #[serde(default)]
    pub backends: BackendsConfig,

    /// Embedding source configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// History handed to backends
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Human pulse estimation
    #[serde(default)]
    pub pulse: PulseConfig,

    /// Sustained-direction tracking
    #[serde(default)]
    pub direction: DirectionConfig,

    /// On-disk session state
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Per-backend request throttling
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How subspace compression is measured for Model B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubspaceMethod {
    /// Share of per-dimension variance held by the top three dimensions.
    #[default]
    VarianceRatio,
    /// Share of the singular-value sum held by the top three singular values
    /// of the centred window matrix.
    SingularValues,
}

/// Fatigue detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FatigueConfig {
    /// History window `k`
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Model selection policy
    #[serde(default)]
    pub model: ModelSelection,

    /// Model A weights (similarity, entropy deficit, stagnation)
    #[serde(default = "default_weights_a")]
    pub weights_a: FatigueWeights,

    /// Model B weights (persistence, compression, curvature collapse)
    #[serde(default = "default_weights_b")]
    pub weights_b: FatigueWeights,

    /// Soft flag fires strictly above this score
    #[serde(default = "default_soft_threshold")]
    pub soft_threshold: f64,

    /// Hard flag fires strictly above this score
    #[serde(default = "default_hard_threshold")]
    pub hard_threshold: f64,

    /// Subspace compression estimator
    #[serde(default)]
    pub subspace_method: SubspaceMethod,
}

const fn default_window_size() -> usize {
    5
}

const fn default_weights_a() -> FatigueWeights {
    FatigueWeights::MODEL_A
}

const fn default_weights_b() -> FatigueWeights {
    FatigueWeights::MODEL_B
}

const fn default_soft_threshold() -> f64 {
    0.68
}

const fn default_hard_threshold() -> f64 {
    0.84
}

impl Default for FatigueConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            model: ModelSelection::default(),
            weights_a: default_weights_a(),
            weights_b: default_weights_b(),
            soft_threshold: default_soft_threshold(),
            hard_threshold: default_hard_threshold(),
            subspace_method: SubspaceMethod::default(),
        }
    }
}

impl FatigueConfig {
    /// Thresholds as a pair.
    pub fn thresholds(&self) -> FatigueThresholds {
        FatigueThresholds {
            soft: self.soft_threshold,
            hard: self.hard_threshold,
        }
    }
}

/// Pod activation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PodConfig {
    /// Condition A similarity threshold
    #[serde(default = "default_pod_high")]
    pub high_similarity: f64,

    /// Condition B similarity threshold (requires hard fatigue)
    #[serde(default = "default_pod_soft")]
    pub fatigue_similarity: f64,

    /// Latent pods older than this stop surfacing; unset means no decay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dormancy_ttl_secs: Option<u64>,
}

const fn default_pod_high() -> f64 {
    0.85
}

const fn default_pod_soft() -> f64 {
    0.50
}

impl Default for PodConfig {
    fn default() -> Self {
        Self {
            high_similarity: default_pod_high(),
            fatigue_similarity: default_pod_soft(),
            dormancy_ttl_secs: None,
        }
    }
}

impl PodConfig {
    /// Thresholds as a pair.
    pub fn thresholds(&self) -> PodThresholds {
        PodThresholds {
            high_similarity: self.high_similarity,
            fatigue_similarity: self.fatigue_similarity,
        }
    }
}

/// Response validation rule set
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ValidationConfig {
    /// Dotted metadata paths that must be present (e.g. `internalSignals.contextUsage`)
    #[serde(default = "default_required_fields")]
    pub required_fields: Vec<String>,

    /// Emit alerts for soft/hard fatigue flags
    #[serde(default = "default_true")]
    pub fatigue_alerts: bool,

    /// Alert when the reported context-usage fraction exceeds this
    #[serde(default = "default_context_usage_warning")]
    pub context_usage_warning: f64,

    /// Alert when reported token pressure exceeds this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_pressure_warning: Option<f64>,

    /// Alert when the Model A novelty component falls below this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_novelty_threshold: Option<f64>,

    /// Alert on empty visible text
    #[serde(default = "default_true")]
    pub require_visible_text: bool,
}

fn default_required_fields() -> Vec<String> {
    vec!["internalSignals".to_string(), "complianceBlock".to_string()]
}

const fn default_true() -> bool {
    true
}

const fn default_context_usage_warning() -> f64 {
    0.8
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            required_fields: default_required_fields(),
            fatigue_alerts: true,
            context_usage_warning: default_context_usage_warning(),
            token_pressure_warning: None,
            low_novelty_threshold: None,
            require_visible_text: true,
        }
    }
}

/// Retry, circuit breaker and fallback policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Validation retry cycles per turn
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Rolling consecutive-failure count that aborts a turn
    #[serde(default = "default_consecutive_failure_threshold")]
    pub consecutive_failure_threshold: u32,

    /// Invocations of one backend before falling back to the next
    #[serde(default = "default_per_backend_attempts")]
    pub per_backend_attempts: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff multiplier applied to overload errors
    #[serde(default = "default_overload_multiplier")]
    pub overload_multiplier: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    2
}

const fn default_consecutive_failure_threshold() -> u32 {
    3
}

const fn default_per_backend_attempts() -> u32 {
    1
}

const fn default_initial_backoff_ms() -> u64 {
    250
}

const fn default_overload_multiplier() -> u64 {
    4
}

const fn default_max_backoff_ms() -> u64 {
    5_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            consecutive_failure_threshold: default_consecutive_failure_threshold(),
            per_backend_attempts: default_per_backend_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            overload_multiplier: default_overload_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Backend implementation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendProvider {
    /// Ollama `/api/chat`
    #[default]
    Ollama,
    /// Replays configured responses, then echoes; offline use
    Scripted,
}

/// One backend model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ModelDescriptor {
    /// Name referenced by role rankings
    pub name: String,

    /// Implementation kind
    #[serde(default)]
    pub provider: BackendProvider,

    /// Base URL of the backend
    #[serde(default = "default_ollama_host")]
    pub host: String,

    /// Model identifier sent to the backend (defaults to `name`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,

    /// Opaque system prompt passed through unchanged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Ask the backend for JSON-formatted output
    #[serde(default = "default_true")]
    pub json_format: bool,

    /// Canned raw outputs for the scripted provider
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub responses: Vec<String>,
}

impl ModelDescriptor {
    /// An Ollama model on the default host.
    pub fn ollama(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: BackendProvider::Ollama,
            host: default_ollama_host(),
            model: None,
            timeout_secs: default_backend_timeout(),
            system_prompt: None,
            json_format: true,
            responses: Vec::new(),
        }
    }

    /// Identifier sent on the wire.
    pub fn model_id(&self) -> &str {
        self.model.as_deref().unwrap_or(&self.name)
    }
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

const fn default_backend_timeout() -> u64 {
    120
}

/// Backend models and per-role fallback ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BackendsConfig {
    /// Known models
    #[serde(default = "default_models")]
    pub models: Vec<ModelDescriptor>,

    /// Role name to ranked model names
    #[serde(default = "default_roles")]
    pub roles: HashMap<String, Vec<String>>,

    /// Role used when none is requested
    #[serde(default = "default_role")]
    pub default_role: String,
}

fn default_models() -> Vec<ModelDescriptor> {
    ["llama3", "mistral", "phi3"]
        .into_iter()
        .map(ModelDescriptor::ollama)
        .collect()
}

fn default_roles() -> HashMap<String, Vec<String>> {
    HashMap::from([(
        default_role(),
        vec!["llama3".to_string(), "mistral".to_string(), "phi3".to_string()],
    )])
}

fn default_role() -> String {
    "primary".to_string()
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            models: default_models(),
            roles: default_roles(),
            default_role: default_role(),
        }
    }
}

impl BackendsConfig {
    /// Look up a model by name.
    pub fn model(&self, name: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.name == name)
    }
}

/// Embedding source kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    /// Ollama `/api/embeddings`
    #[default]
    Ollama,
    /// Deterministic bag-of-words hashing
    Hashed,
}

/// Embedding source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EmbeddingConfig {
    /// Source kind
    #[serde(default)]
    pub provider: EmbeddingProviderKind,

    /// Base URL for the Ollama provider
    #[serde(default = "default_ollama_host")]
    pub host: String,

    /// Embedding model for the Ollama provider
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector dimension for the hashed provider
    #[serde(default = "default_hashed_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

const fn default_hashed_dimension() -> usize {
    64
}

const fn default_embedding_timeout() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            host: default_ollama_host(),
            model: default_embedding_model(),
            dimension: default_hashed_dimension(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

/// History handed to backends
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConversationConfig {
    /// Most recent history entries sent with each request
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Characters kept per history entry
    #[serde(default = "default_history_entry_chars")]
    pub history_entry_chars: usize,

    /// Carry the model's previous session (last turns and rhythm) into
    /// every request of a new session
    #[serde(default = "default_true")]
    pub recapitulate: bool,

    /// Prior-session turns quoted in the recapitulation
    #[serde(default = "default_recap_turns")]
    pub recap_turns: usize,

    /// Characters kept per side of a quoted prior turn
    #[serde(default = "default_recap_entry_chars")]
    pub recap_entry_chars: usize,
}

const fn default_recap_turns() -> usize {
    6
}

const fn default_recap_entry_chars() -> usize {
    300
}

const fn default_history_limit() -> usize {
    8
}

const fn default_history_entry_chars() -> usize {
    400
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            history_entry_chars: default_history_entry_chars(),
            recapitulate: true,
            recap_turns: default_recap_turns(),
            recap_entry_chars: default_recap_entry_chars(),
        }
    }
}

/// Human pulse estimation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PulseConfig {
    /// Estimate τ_h from user messages (costs one extra embedding per turn)
    #[serde(default)]
    pub enabled: bool,

    /// Scale fatigue and pod thresholds by the current pulse
    #[serde(default)]
    pub modulate_thresholds: bool,
}

/// Sustained-direction tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DirectionConfig {
    /// Track the user's sustained direction (costs one extra embedding per
    /// turn when pulse estimation is off)
    #[serde(default)]
    pub enabled: bool,

    /// λ in `e' = e + λ(e·τ)τ`, applied before pod detection
    #[serde(default = "default_modulation_strength")]
    pub modulation_strength: f64,

    /// Alignment below which a turn records a `low_alignment` event
    #[serde(default = "default_low_alignment")]
    pub low_alignment_threshold: f64,
}

const fn default_modulation_strength() -> f64 {
    0.3
}

const fn default_low_alignment() -> f64 {
    0.3
}

impl Default for DirectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            modulation_strength: default_modulation_strength(),
            low_alignment_threshold: default_low_alignment(),
        }
    }
}

/// On-disk session state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PersistenceConfig {
    /// Directory holding pods, ledgers and the rhythm index
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Save every N committed turns; 0 saves only at session end
    #[serde(default = "default_autosave_every")]
    pub autosave_every: usize,
}

fn default_data_dir() -> String {
    ".vessel/data".to_string()
}

const fn default_autosave_every() -> usize {
    5
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            autosave_every: default_autosave_every(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    /// Requests per second allowed
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Burst size for token bucket
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
}

const fn default_requests_per_second() -> u32 {
    2
}

const fn default_burst_size() -> u32 {
    4
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            burst_size: default_burst_size(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stderr only when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Rotation: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
