//! Turn runner: drives one session through the agent handoff state machine.
//!
//! Flow per turn: record the user message → run the active agent → apply its
//! extraction rule → route to the successor. Agents that read only state
//! (parser, scorer, HR notifier) are chained within the same turn; agents that
//! need user input end the turn with their upload request.
//!
//! A failing step never touches session state. The failure is logged with the
//! agent name and raw output and reported as a `turn_failed` event, leaving
//! the session ready for a retry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::llm_client::prompts::{JSON_ONLY_INSTRUCTION, STATE_ONLY_TASK};
use crate::llm_client::{ChatMessage, GenerationRequest, TextBackend};
use crate::models::candidate::{FollowUpDrafts, ParsedResumeData, ScoreEntry, Scores};
use crate::models::notification::NotificationEmail;
use crate::pipeline::agents::AgentKind;
use crate::pipeline::error::TurnError;
use crate::pipeline::extract::{
    check_resume_summary, check_scores, classify_user, extract_resume_list, parse_structured,
    Classification,
};
use crate::pipeline::notifications::{
    compose, follow_up_candidates, Notifier, DEFAULT_FOLLOW_UP_THRESHOLD,
};
use crate::pipeline::state::{SessionState, StateKey, UserType};

// ────────────────────────────────────────────────────────────────────────────
// Session
// ────────────────────────────────────────────────────────────────────────────

/// One conversation: the active agent, the shared state and the message history.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    user_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    active: AgentKind,
    finished: bool,
    state: SessionState,
    history: Vec<ChatMessage>,
    /// Greeting replies that did not classify the user.
    unclassified_greetings: u32,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            created_at: now,
            updated_at: now,
            active: AgentKind::INITIAL,
            finished: false,
            state: SessionState::default(),
            history: Vec::new(),
            unclassified_greetings: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time of the last turn, or creation if there was none.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn active_agent(&self) -> AgentKind {
        self.active
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Turn events
// ────────────────────────────────────────────────────────────────────────────

/// What happened during a turn, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    AgentMessage {
        agent: AgentKind,
        text: String,
    },
    Handoff {
        from: AgentKind,
        to: AgentKind,
    },
    StateUpdated {
        agent: AgentKind,
        key: StateKey,
    },
    Notice {
        agent: AgentKind,
        message: String,
    },
    Notifications {
        emails: Vec<NotificationEmail>,
    },
    TurnFailed {
        agent: AgentKind,
        code: &'static str,
        message: String,
    },
    Completed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub active_agent: AgentKind,
    pub finished: bool,
    pub events: Vec<TurnEvent>,
}

impl TurnOutcome {
    pub fn failed(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, TurnEvent::TurnFailed { .. }))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Runs agents against a text backend. Shared by all sessions; holds no session data.
#[derive(Clone)]
pub struct Pipeline {
    backend: Arc<dyn TextBackend>,
    notifier: Arc<dyn Notifier>,
    follow_up_threshold: u32,
}

impl Pipeline {
    pub fn new(backend: Arc<dyn TextBackend>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            backend,
            notifier,
            follow_up_threshold: DEFAULT_FOLLOW_UP_THRESHOLD,
        }
    }

    pub fn with_follow_up_threshold(mut self, threshold: u32) -> Self {
        self.follow_up_threshold = threshold;
        self
    }

    /// Processes one user message.
    ///
    /// Returns `Err` only for a finished session; recoverable failures are
    /// reported as a `TurnFailed` event in the outcome.
    pub async fn run_turn(
        &self,
        session: &mut Session,
        message: &str,
    ) -> Result<TurnOutcome, TurnError> {
        if session.finished {
            return Err(TurnError::SessionFinished);
        }
        session.updated_at = Utc::now();

        info!(
            "Session {}: turn for {} ({} chars)",
            session.id,
            session.active,
            message.len()
        );
        session.history.push(ChatMessage::user(message));

        let mut events = Vec::new();
        if let Err(err) = self.advance(session, &mut events).await {
            let agent = err.agent().unwrap_or(session.active);
            warn!(
                session_id = %session.id,
                agent = %agent,
                code = err.code(),
                raw_output = err.raw_output().unwrap_or(""),
                "Turn failed: {err}"
            );
            events.push(TurnEvent::TurnFailed {
                agent,
                code: err.code(),
                message: err.to_string(),
            });
            if let TurnError::MissingStateKey { key, .. } = err {
                self.rewind(session, key.producer(), &mut events);
            }
        }

        Ok(TurnOutcome {
            active_agent: session.active,
            finished: session.finished,
            events,
        })
    }

    /// Runs the active agent, then keeps routing until an agent needs the user
    /// or the session is done.
    async fn advance(
        &self,
        session: &mut Session,
        events: &mut Vec<TurnEvent>,
    ) -> Result<(), TurnError> {
        loop {
            let agent = session.active;
            if !self.run_agent(session, agent, events).await? {
                return Ok(());
            }

            match agent.successor(&session.state) {
                Some(next) => {
                    info!("Session {}: handoff {} -> {}", session.id, agent, next);
                    events.push(TurnEvent::Handoff {
                        from: agent,
                        to: next,
                    });
                    session.active = next;
                    if next.consumes_user_input() {
                        self.open(session, next, events);
                        return Ok(());
                    }
                }
                None => {
                    info!("Session {}: completed after {}", session.id, agent);
                    session.finished = true;
                    events.push(TurnEvent::Completed);
                    return Ok(());
                }
            }
        }
    }

    /// Emits the fixed upload request of an input-gathering agent.
    fn open(&self, session: &mut Session, agent: AgentKind, events: &mut Vec<TurnEvent>) {
        if let Some(request) = agent.upload_request() {
            session.history.push(ChatMessage::assistant(request));
            events.push(TurnEvent::AgentMessage {
                agent,
                text: request.to_string(),
            });
        }
    }

    /// Sends control back to the agent that owns a missing key.
    fn rewind(&self, session: &mut Session, to: AgentKind, events: &mut Vec<TurnEvent>) {
        if session.active == to {
            return;
        }
        events.push(TurnEvent::Handoff {
            from: session.active,
            to,
        });
        session.active = to;
        if to.consumes_user_input() {
            self.open(session, to, events);
        }
    }

    /// Runs a single agent against the session.
    ///
    /// Returns `true` when the agent completed its step and control should move
    /// on, `false` when it is waiting for more user input. Events and state
    /// updates are only applied on success.
    pub async fn run_agent(
        &self,
        session: &mut Session,
        agent: AgentKind,
        events: &mut Vec<TurnEvent>,
    ) -> Result<bool, TurnError> {
        ensure_inputs(agent, &session.state)?;

        match agent {
            AgentKind::Greeting => self.run_greeting(session, events).await,
            AgentKind::ResumeReader => self.run_resume_reader(session, events).await,
            AgentKind::JobDescriptionReader => self.run_job_description_reader(session, events).await,
            AgentKind::InformationParser => self.run_information_parser(session, events).await,
            AgentKind::Score => self.run_score(session, events).await,
            AgentKind::HrNotifier => self.run_hr_notifier(session, events).await,
        }
    }

    async fn run_greeting(
        &self,
        session: &mut Session,
        events: &mut Vec<TurnEvent>,
    ) -> Result<bool, TurnError> {
        let agent = AgentKind::Greeting;
        let text = self
            .generate(agent, agent.instruction(), &session.history)
            .await?;
        session.history.push(ChatMessage::assistant(&text));
        events.push(TurnEvent::AgentMessage {
            agent,
            text: text.clone(),
        });

        match classify_user(&text) {
            Classification::Classified(user_type) => {
                info!("Session {}: user classified as {}", session.id, user_type.as_str());
                session.state.set_user_type(user_type);
                events.push(TurnEvent::StateUpdated {
                    agent,
                    key: StateKey::UserType,
                });
                Ok(true)
            }
            Classification::Unclassified => {
                // The first reply is the welcome; later ones mean the answer was unclear.
                if session.unclassified_greetings > 0 {
                    let notice = TurnError::ClassificationAmbiguous { agent };
                    debug!("Session {}: {notice}", session.id);
                    events.push(TurnEvent::Notice {
                        agent,
                        message: notice.to_string(),
                    });
                }
                session.unclassified_greetings += 1;
                Ok(false)
            }
        }
    }

    async fn run_resume_reader(
        &self,
        session: &mut Session,
        events: &mut Vec<TurnEvent>,
    ) -> Result<bool, TurnError> {
        let agent = AgentKind::ResumeReader;
        let text = self
            .generate(agent, agent.instruction(), &session.history)
            .await?;

        let extracted = extract_resume_list(&text).map_err(|source| TurnError::DataFormat {
            agent,
            source,
            raw: text.clone(),
        })?;

        session.history.push(ChatMessage::assistant(&text));
        events.push(TurnEvent::AgentMessage { agent, text });

        match extracted {
            Some(resumes) => {
                info!("Session {}: extracted {} resumes", session.id, resumes.len());
                session.state.set_resume_list(resumes);
                events.push(TurnEvent::StateUpdated {
                    agent,
                    key: StateKey::ResumeList,
                });
                Ok(true)
            }
            None => {
                debug!("Session {}: no resume payload yet", session.id);
                Ok(false)
            }
        }
    }

    async fn run_job_description_reader(
        &self,
        session: &mut Session,
        events: &mut Vec<TurnEvent>,
    ) -> Result<bool, TurnError> {
        let agent = AgentKind::JobDescriptionReader;
        let text = self
            .generate(agent, agent.instruction(), &session.history)
            .await?;

        // Stored verbatim, no validation.
        session.history.push(ChatMessage::assistant(&text));
        session.state.set_job_description(text.clone());
        events.push(TurnEvent::AgentMessage { agent, text });
        events.push(TurnEvent::StateUpdated {
            agent,
            key: StateKey::JobDescription,
        });
        Ok(true)
    }

    async fn run_information_parser(
        &self,
        session: &mut Session,
        events: &mut Vec<TurnEvent>,
    ) -> Result<bool, TurnError> {
        let agent = AgentKind::InformationParser;
        let resumes = session.state.require_resume_list(agent)?;

        let system = render_parser_instruction(resumes);
        let text = self.generate_from_state(agent, &system).await?;

        let summary: ParsedResumeData = parse_structured(agent, &text)?;
        check_resume_summary(&summary, resumes)
            .map_err(|reason| schema_violation(agent, reason, &text))?;

        info!(
            "Session {}: parsed {} resumes",
            session.id,
            summary.data.len()
        );
        session.history.push(ChatMessage::assistant(&text));
        session.state.set_resume_summary(summary);
        events.push(TurnEvent::AgentMessage { agent, text });
        events.push(TurnEvent::StateUpdated {
            agent,
            key: StateKey::ResumeSummary,
        });
        Ok(true)
    }

    async fn run_score(
        &self,
        session: &mut Session,
        events: &mut Vec<TurnEvent>,
    ) -> Result<bool, TurnError> {
        let agent = AgentKind::Score;
        let summary = session.state.require_resume_summary(agent)?;
        let job_description = session.state.require_job_description(agent)?;

        let system =
            render_score_instruction(summary, job_description, session.state.user_type());
        let text = self.generate_from_state(agent, &system).await?;

        let scores: Scores = parse_structured(agent, &text)?;
        check_scores(&scores, summary).map_err(|reason| schema_violation(agent, reason, &text))?;

        info!(
            "Session {}: scored {} candidates",
            session.id,
            scores.data.len()
        );
        session.history.push(ChatMessage::assistant(&text));
        session.state.set_score(scores);
        events.push(TurnEvent::AgentMessage { agent, text });
        events.push(TurnEvent::StateUpdated {
            agent,
            key: StateKey::Score,
        });
        Ok(true)
    }

    async fn run_hr_notifier(
        &self,
        session: &mut Session,
        events: &mut Vec<TurnEvent>,
    ) -> Result<bool, TurnError> {
        let agent = AgentKind::HrNotifier;
        let scores = session.state.require_score(agent)?.data.clone();
        let candidates = follow_up_candidates(&scores, self.follow_up_threshold);

        // Everyone rejected: the template covers it, no generation needed.
        let (raw, drafts) = if candidates.is_empty() {
            (String::new(), Vec::new())
        } else {
            let system = render_follow_up_instruction(&candidates);
            let text = self.generate_from_state(agent, &system).await?;
            let drafts: FollowUpDrafts = parse_structured(agent, &text)?;
            (text, drafts.data)
        };

        let emails = compose(&scores, drafts, self.follow_up_threshold)
            .map_err(|reason| schema_violation(agent, reason, &raw))?;

        info!(
            "Session {}: prepared {} notification emails ({} follow-ups)",
            session.id,
            emails.len(),
            candidates.len()
        );
        self.notifier.deliver(&emails).await;

        if !raw.is_empty() {
            session.history.push(ChatMessage::assistant(&raw));
        }
        session.state.set_notifications(emails.clone());
        events.push(TurnEvent::Notifications { emails });
        events.push(TurnEvent::StateUpdated {
            agent,
            key: StateKey::Notifications,
        });
        Ok(true)
    }

    async fn generate(
        &self,
        agent: AgentKind,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<String, TurnError> {
        debug!("Calling backend for {} with {} messages", agent, messages.len());
        self.backend
            .generate(GenerationRequest {
                agent: agent.name(),
                system,
                messages,
            })
            .await
            .map_err(|source| TurnError::Backend { agent, source })
    }

    /// Calls an agent whose inputs are all rendered into its instruction.
    async fn generate_from_state(&self, agent: AgentKind, system: &str) -> Result<String, TurnError> {
        self.generate(agent, system, &[ChatMessage::user(STATE_ONLY_TASK)])
            .await
    }
}

fn ensure_inputs(agent: AgentKind, state: &SessionState) -> Result<(), TurnError> {
    let available = state.available_keys();
    match agent.reads().iter().copied().find(|key| !available.contains(key)) {
        Some(key) => Err(TurnError::MissingStateKey { agent, key }),
        None => Ok(()),
    }
}

fn schema_violation(agent: AgentKind, reason: String, raw: &str) -> TurnError {
    TurnError::SchemaViolation {
        agent,
        reason,
        raw: raw.to_string(),
    }
}

fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

fn render_parser_instruction(resumes: &[String]) -> String {
    fill_template(
        AgentKind::InformationParser.instruction(),
        &[
            ("json_only", JSON_ONLY_INSTRUCTION),
            ("resume_count", &resumes.len().to_string()),
            ("resume_list", &to_pretty_json(resumes)),
        ],
    )
}

fn render_score_instruction(
    summary: &ParsedResumeData,
    job_description: &str,
    user_type: Option<UserType>,
) -> String {
    fill_template(
        AgentKind::Score.instruction(),
        &[
            ("json_only", JSON_ONLY_INSTRUCTION),
            ("entry_count", &summary.data.len().to_string()),
            ("user_type", user_type.map(UserType::as_str).unwrap_or("unknown")),
            ("resume_summary", &to_pretty_json(summary)),
            ("job_description", job_description),
        ],
    )
}

fn render_follow_up_instruction(candidates: &[&ScoreEntry]) -> String {
    fill_template(
        AgentKind::HrNotifier.instruction(),
        &[
            ("json_only", JSON_ONLY_INSTRUCTION),
            ("candidate_count", &candidates.len().to_string()),
            ("candidates", &to_pretty_json(candidates)),
        ],
    )
}

/// Replaces `{name}` placeholders in a single left-to-right pass. Substituted
/// values are never scanned again; unknown braces are copied as-is.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after_brace = &rest[start + 1..];
        let matched = values.iter().find_map(|(name, value)| {
            after_brace
                .strip_prefix(*name)
                .and_then(|tail| tail.strip_prefix('}'))
                .map(|tail| (*value, tail))
        });
        match matched {
            Some((value, tail)) => {
                out.push_str(value);
                rest = tail;
            }
            None => {
                out.push('{');
                rest = after_brace;
            }
        }
    }
    out.push_str(rest);
    out
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
