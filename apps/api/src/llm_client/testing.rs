//! In-memory backend that replays canned responses, for pipeline and route tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm_client::{GenerationRequest, LlmError, TextBackend};

/// A call observed by `ScriptedBackend`.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub agent: String,
    pub system: String,
    pub message_count: usize,
}

#[derive(Default)]
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<String, u16>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedBackend {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queues an API failure with the given status for the next call.
    pub fn push_failure(&self, status: u16) {
        self.responses.lock().unwrap().push_back(Err(status));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn agents_called(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.agent).collect()
    }
}

#[async_trait]
impl TextBackend for ScriptedBackend {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(RecordedCall {
            agent: request.agent.to_string(),
            system: request.system.to_string(),
            message_count: request.messages.len(),
        });
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(status)) => Err(LlmError::Api {
                status,
                message: "scripted failure".to_string(),
            }),
            None => Err(LlmError::EmptyContent),
        }
    }
}
