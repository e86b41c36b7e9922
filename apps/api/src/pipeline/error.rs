use thiserror::Error;

use crate::llm_client::LlmError;
use crate::pipeline::agents::AgentKind;
use crate::pipeline::state::StateKey;

/// Failure of a single agent step.
///
/// Everything except `SessionFinished` is recoverable: session state is left
/// untouched and the user may retry the step.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("{agent} could not tell whether the user is a candidate or an HR person")]
    ClassificationAmbiguous { agent: AgentKind },

    #[error("{agent} returned text that is not a JSON array of strings: {source}")]
    DataFormat {
        agent: AgentKind,
        #[source]
        source: serde_json::Error,
        raw: String,
    },

    #[error("{agent} output does not match its schema: {reason}")]
    SchemaViolation {
        agent: AgentKind,
        reason: String,
        raw: String,
    },

    #[error("{agent} needs '{key}', which has not been produced yet")]
    MissingStateKey { agent: AgentKind, key: StateKey },

    #[error("{agent} backend call failed: {source}")]
    Backend {
        agent: AgentKind,
        #[source]
        source: LlmError,
    },

    #[error("Session has finished; start a new session to screen more resumes")]
    SessionFinished,
}

impl TurnError {
    pub fn code(&self) -> &'static str {
        match self {
            TurnError::ClassificationAmbiguous { .. } => "CLASSIFICATION_AMBIGUOUS",
            TurnError::DataFormat { .. } => "DATA_FORMAT_ERROR",
            TurnError::SchemaViolation { .. } => "SCHEMA_VIOLATION",
            TurnError::MissingStateKey { .. } => "MISSING_STATE_KEY",
            TurnError::Backend { .. } => "BACKEND_ERROR",
            TurnError::SessionFinished => "SESSION_FINISHED",
        }
    }

    pub fn agent(&self) -> Option<AgentKind> {
        match self {
            TurnError::ClassificationAmbiguous { agent }
            | TurnError::DataFormat { agent, .. }
            | TurnError::SchemaViolation { agent, .. }
            | TurnError::MissingStateKey { agent, .. }
            | TurnError::Backend { agent, .. } => Some(*agent),
            TurnError::SessionFinished => None,
        }
    }

    /// Raw model output that caused the failure, if any.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            TurnError::DataFormat { raw, .. } | TurnError::SchemaViolation { raw, .. } => {
                Some(raw)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_state_key_message_names_agent_and_key() {
        let err = TurnError::MissingStateKey {
            agent: AgentKind::InformationParser,
            key: StateKey::ResumeList,
        };
        assert_eq!(
            err.to_string(),
            "InformationParserAgent needs 'resume_list', which has not been produced yet"
        );
        assert_eq!(err.code(), "MISSING_STATE_KEY");
        assert_eq!(err.agent(), Some(AgentKind::InformationParser));
    }

    #[test]
    fn test_raw_output_only_for_format_failures() {
        let err = TurnError::SchemaViolation {
            agent: AgentKind::Score,
            reason: "score 0 out of range".to_string(),
            raw: "{\"data\": []}".to_string(),
        };
        assert_eq!(err.raw_output(), Some("{\"data\": []}"));
        assert_eq!(err.agent(), Some(AgentKind::Score));

        assert!(TurnError::SessionFinished.raw_output().is_none());
        assert!(TurnError::SessionFinished.agent().is_none());
    }
}
