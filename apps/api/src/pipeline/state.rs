//! Session State: the typed store agents communicate through.
//!
//! One `SessionState` exists per session. Only extraction rules write to it,
//! and nothing is removed before the session ends. A missing field means the
//! producing agent has not run yet; agents that need it get `MissingStateKey`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::candidate::{ParsedResumeData, Scores};
use crate::models::notification::NotificationEmail;
use crate::pipeline::agents::AgentKind;
use crate::pipeline::error::TurnError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserType {
    #[serde(rename = "candidate")]
    Candidate,
    #[serde(rename = "HR")]
    Hr,
}

impl UserType {
    pub fn as_str(self) -> &'static str {
        match self {
            UserType::Candidate => "candidate",
            UserType::Hr => "HR",
        }
    }
}

/// Names of the state entries, as seen by prompts and API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKey {
    UserType,
    ResumeList,
    JobDescription,
    ResumeSummary,
    Score,
    Notifications,
}

impl StateKey {
    pub fn as_str(self) -> &'static str {
        match self {
            StateKey::UserType => "user_type",
            StateKey::ResumeList => "resume_list",
            StateKey::JobDescription => "job_description",
            StateKey::ResumeSummary => "resume_summary",
            StateKey::Score => "score",
            StateKey::Notifications => "notifications",
        }
    }

    /// The agent whose extraction rule writes this key.
    pub fn producer(self) -> AgentKind {
        match self {
            StateKey::UserType => AgentKind::Greeting,
            StateKey::ResumeList => AgentKind::ResumeReader,
            StateKey::JobDescription => AgentKind::JobDescriptionReader,
            StateKey::ResumeSummary => AgentKind::InformationParser,
            StateKey::Score => AgentKind::Score,
            StateKey::Notifications => AgentKind::HrNotifier,
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    user_type: Option<UserType>,
    resume_list: Option<Vec<String>>,
    job_description: Option<String>,
    resume_summary: Option<ParsedResumeData>,
    score: Option<Scores>,
    notifications: Option<Vec<NotificationEmail>>,
}

fn require<'a, T: ?Sized>(
    value: Option<&'a T>,
    agent: AgentKind,
    key: StateKey,
) -> Result<&'a T, TurnError> {
    value.ok_or(TurnError::MissingStateKey { agent, key })
}

impl SessionState {
    pub fn user_type(&self) -> Option<UserType> {
        self.user_type
    }

    pub fn resume_list(&self) -> Option<&[String]> {
        self.resume_list.as_deref()
    }

    pub fn job_description(&self) -> Option<&str> {
        self.job_description.as_deref()
    }

    pub fn resume_summary(&self) -> Option<&ParsedResumeData> {
        self.resume_summary.as_ref()
    }

    pub fn score(&self) -> Option<&Scores> {
        self.score.as_ref()
    }

    pub fn notifications(&self) -> Option<&[NotificationEmail]> {
        self.notifications.as_deref()
    }

    pub fn require_resume_list(&self, agent: AgentKind) -> Result<&[String], TurnError> {
        require(self.resume_list(), agent, StateKey::ResumeList)
    }

    pub fn require_job_description(&self, agent: AgentKind) -> Result<&str, TurnError> {
        require(self.job_description(), agent, StateKey::JobDescription)
    }

    pub fn require_resume_summary(&self, agent: AgentKind) -> Result<&ParsedResumeData, TurnError> {
        require(self.resume_summary(), agent, StateKey::ResumeSummary)
    }

    pub fn require_score(&self, agent: AgentKind) -> Result<&Scores, TurnError> {
        require(self.score(), agent, StateKey::Score)
    }

    pub(crate) fn set_user_type(&mut self, user_type: UserType) {
        self.user_type = Some(user_type);
    }

    pub(crate) fn set_resume_list(&mut self, resumes: Vec<String>) {
        self.resume_list = Some(resumes);
    }

    pub(crate) fn set_job_description(&mut self, text: String) {
        self.job_description = Some(text);
    }

    pub(crate) fn set_resume_summary(&mut self, summary: ParsedResumeData) {
        self.resume_summary = Some(summary);
    }

    pub(crate) fn set_score(&mut self, scores: Scores) {
        self.score = Some(scores);
    }

    pub(crate) fn set_notifications(&mut self, emails: Vec<NotificationEmail>) {
        self.notifications = Some(emails);
    }

    /// Keys written so far, in pipeline order.
    pub fn available_keys(&self) -> Vec<StateKey> {
        [
            (StateKey::UserType, self.user_type.is_some()),
            (StateKey::ResumeList, self.resume_list.is_some()),
            (StateKey::JobDescription, self.job_description.is_some()),
            (StateKey::ResumeSummary, self.resume_summary.is_some()),
            (StateKey::Score, self.score.is_some()),
            (StateKey::Notifications, self.notifications.is_some()),
        ]
        .into_iter()
        .filter_map(|(key, present)| present.then_some(key))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_type_serializes_as_original_labels() {
        assert_eq!(serde_json::to_string(&UserType::Hr).unwrap(), r#""HR""#);
        assert_eq!(
            serde_json::to_string(&UserType::Candidate).unwrap(),
            r#""candidate""#
        );
        let parsed: UserType = serde_json::from_str(r#""HR""#).unwrap();
        assert_eq!(parsed, UserType::Hr);
    }

    #[test]
    fn test_absent_key_is_missing_state_key_for_the_reading_agent() {
        let state = SessionState::default();
        let err = state
            .require_resume_list(AgentKind::InformationParser)
            .unwrap_err();
        match err {
            TurnError::MissingStateKey { agent, key } => {
                assert_eq!(agent, AgentKind::InformationParser);
                assert_eq!(key, StateKey::ResumeList);
            }
            other => panic!("expected MissingStateKey, got {other:?}"),
        }
    }

    #[test]
    fn test_available_keys_follow_pipeline_order() {
        let mut state = SessionState::default();
        assert!(state.available_keys().is_empty());

        state.set_job_description("Python engineer".to_string());
        state.set_user_type(UserType::Candidate);
        assert_eq!(
            state.available_keys(),
            vec![StateKey::UserType, StateKey::JobDescription]
        );
        assert_eq!(
            state.require_job_description(AgentKind::Score).unwrap(),
            "Python engineer"
        );
    }

    #[test]
    fn test_every_key_has_a_producer() {
        assert_eq!(StateKey::ResumeList.producer(), AgentKind::ResumeReader);
        assert_eq!(StateKey::Score.producer(), AgentKind::Score);
        assert_eq!(StateKey::UserType.to_string(), "user_type");
    }
}
