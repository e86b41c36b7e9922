//! Agent registry and transition table.
//!
//! Agents are stateless: a name, an instruction, the state keys they read and
//! write, and a successor rule. The router in `runner` performs every
//! transition; the generated text never decides where control goes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pipeline::prompts::{
    GREETING_INSTRUCTION, HR_FOLLOW_UP_INSTRUCTION_TEMPLATE, JOB_DESCRIPTION_INSTRUCTION,
    JOB_DESCRIPTION_UPLOAD_REQUEST, PARSER_INSTRUCTION_TEMPLATE, RESUME_READER_INSTRUCTION,
    RESUME_UPLOAD_REQUEST, SCORE_INSTRUCTION_TEMPLATE,
};
use crate::pipeline::state::{SessionState, StateKey, UserType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    #[serde(rename = "GreetingAgent")]
    Greeting,
    #[serde(rename = "ResumePdfReaderAgent")]
    ResumeReader,
    #[serde(rename = "JobDescriptionPdfReaderAgent")]
    JobDescriptionReader,
    #[serde(rename = "InformationParserAgent")]
    InformationParser,
    #[serde(rename = "ScoreAgent")]
    Score,
    #[serde(rename = "HrNotifierAgent")]
    HrNotifier,
}

impl AgentKind {
    /// Pipeline order.
    pub const ALL: [AgentKind; 6] = [
        AgentKind::Greeting,
        AgentKind::ResumeReader,
        AgentKind::JobDescriptionReader,
        AgentKind::InformationParser,
        AgentKind::Score,
        AgentKind::HrNotifier,
    ];

    pub const INITIAL: AgentKind = AgentKind::Greeting;

    pub fn name(self) -> &'static str {
        match self {
            AgentKind::Greeting => "GreetingAgent",
            AgentKind::ResumeReader => "ResumePdfReaderAgent",
            AgentKind::JobDescriptionReader => "JobDescriptionPdfReaderAgent",
            AgentKind::InformationParser => "InformationParserAgent",
            AgentKind::Score => "ScoreAgent",
            AgentKind::HrNotifier => "HrNotifierAgent",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AgentKind::Greeting => "Greets the user and classifies them as candidate or HR",
            AgentKind::ResumeReader => "Reads resumes",
            AgentKind::JobDescriptionReader => "Reads the job description",
            AgentKind::InformationParser => "Extracts key information from resumes",
            AgentKind::Score => "Scores resumes against the job description",
            AgentKind::HrNotifier => "Prepares follow-up and rejection emails for HR users",
        }
    }

    /// Instruction text or template given to the backend.
    pub fn instruction(self) -> &'static str {
        match self {
            AgentKind::Greeting => GREETING_INSTRUCTION,
            AgentKind::ResumeReader => RESUME_READER_INSTRUCTION,
            AgentKind::JobDescriptionReader => JOB_DESCRIPTION_INSTRUCTION,
            AgentKind::InformationParser => PARSER_INSTRUCTION_TEMPLATE,
            AgentKind::Score => SCORE_INSTRUCTION_TEMPLATE,
            AgentKind::HrNotifier => HR_FOLLOW_UP_INSTRUCTION_TEMPLATE,
        }
    }

    /// Keys that must be present before the agent may run.
    pub fn reads(self) -> &'static [StateKey] {
        match self {
            AgentKind::Greeting | AgentKind::ResumeReader | AgentKind::JobDescriptionReader => &[],
            AgentKind::InformationParser => &[StateKey::ResumeList],
            AgentKind::Score => &[StateKey::ResumeSummary, StateKey::JobDescription],
            AgentKind::HrNotifier => &[StateKey::Score],
        }
    }

    pub fn writes(self) -> StateKey {
        match self {
            AgentKind::Greeting => StateKey::UserType,
            AgentKind::ResumeReader => StateKey::ResumeList,
            AgentKind::JobDescriptionReader => StateKey::JobDescription,
            AgentKind::InformationParser => StateKey::ResumeSummary,
            AgentKind::Score => StateKey::Score,
            AgentKind::HrNotifier => StateKey::Notifications,
        }
    }

    /// Agents that respond to user messages. The others run from state alone
    /// and are chained within the turn that reaches them.
    pub fn consumes_user_input(self) -> bool {
        matches!(
            self,
            AgentKind::Greeting | AgentKind::ResumeReader | AgentKind::JobDescriptionReader
        )
    }

    /// Fixed message shown when control is handed to this agent.
    pub fn upload_request(self) -> Option<&'static str> {
        match self {
            AgentKind::ResumeReader => Some(RESUME_UPLOAD_REQUEST),
            AgentKind::JobDescriptionReader => Some(JOB_DESCRIPTION_UPLOAD_REQUEST),
            _ => None,
        }
    }

    /// Next agent once this one has completed, or `None` when the session is done.
    ///
    /// `Score` hands off to `HrNotifier` only when the user was classified as HR;
    /// an unclassified user is treated as "not HR".
    pub fn successor(self, state: &SessionState) -> Option<AgentKind> {
        match self {
            AgentKind::Greeting => Some(AgentKind::ResumeReader),
            AgentKind::ResumeReader => Some(AgentKind::JobDescriptionReader),
            AgentKind::JobDescriptionReader => Some(AgentKind::InformationParser),
            AgentKind::InformationParser => Some(AgentKind::Score),
            AgentKind::Score => {
                (state.user_type() == Some(UserType::Hr)).then_some(AgentKind::HrNotifier)
            }
            AgentKind::HrNotifier => None,
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
