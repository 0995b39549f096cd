//! Scripted backend for tests and offline use.
//!
//! Replays a queue of canned outputs and errors. Once the queue is empty it
//! answers with the default output, or echoes the message in the structured
//! wire shape when no default is set.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::json;

use crate::domain::ports::{Backend, BackendError, BackendRequest, BackendResponse};

/// Backend that replays scripted results.
pub struct ScriptedBackend {
    name: String,
    script: Mutex<VecDeque<Result<String, BackendError>>>,
    default: Option<String>,
    requests: Mutex<Vec<BackendRequest>>,
}

impl ScriptedBackend {
    /// Empty script; echoes until told otherwise.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            default: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue raw outputs, in order.
    pub fn with_responses<I, S>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for r in responses {
            self.push_response(r);
        }
        self
    }

    /// Output used once the script is exhausted.
    pub fn with_default(mut self, raw: impl Into<String>) -> Self {
        self.default = Some(raw.into());
        self
    }

    /// Queue one raw output.
    pub fn push_response(&self, raw: impl Into<String>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Ok(raw.into()));
    }

    /// Queue one failure.
    pub fn push_error(&self, error: BackendError) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(error));
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<BackendRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of invocations so far.
    pub fn calls(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// The wire shape carrying `text` with complete metadata.
pub fn structured_reply(text: &str) -> String {
    json!({
        "visibleText": text,
        "processMetadata": {
            "internalSignals": {"tokenPressure": 0.1, "uncertaintyLevel": "low", "contextUsage": 0.1},
            "processDisclosures": [],
            "complianceBlock": {"status": "ok"}
        }
    })
    .to_string()
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, request: BackendRequest) -> Result<BackendResponse, BackendError> {
        let echo = structured_reply(&request.message);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let text = match next {
            Some(result) => result?,
            None => self.default.clone().unwrap_or(echo),
        };
        Ok(BackendResponse::text(text, format!("scripted/{}", self.name)))
    }
}
