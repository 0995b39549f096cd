//! User scratchpad entries.
//!
//! The scratchpad is filled only by deliberate user action and is shared
//! across models and sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Length of the short identifier shown to users.
pub const SCRATCH_ID_LEN: usize = 8;

/// One saved snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScratchItem {
    pub id: String,
    pub content: String,
    /// Model label the snippet came from; empty when typed in directly.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub note: String,
    pub created_at: DateTime<Utc>,
}
