//! Extraction rules: turn an agent's raw text into typed state updates.
//!
//! These are pure functions; the runner decides what to do with the result.

use serde::de::DeserializeOwned;

use crate::llm_client::strip_json_fences;
use crate::models::candidate::{ParsedResumeData, Scores};
use crate::pipeline::agents::AgentKind;
use crate::pipeline::error::TurnError;
use crate::pipeline::prompts::{CANDIDATE_CONFIRMATION, HR_CONFIRMATION};
use crate::pipeline::state::UserType;

/// Outcome of scanning a greeting response for the confirmation phrases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Classified(UserType),
    Unclassified,
}

/// Detects the confirmation phrase in a greeting response.
/// When both phrases appear the HR phrase wins.
pub fn classify_user(text: &str) -> Classification {
    if text.contains(HR_CONFIRMATION) {
        Classification::Classified(UserType::Hr)
    } else if text.contains(CANDIDATE_CONFIRMATION) {
        Classification::Classified(UserType::Candidate)
    } else {
        Classification::Unclassified
    }
}

/// Extracts the resume list from a resume reader response.
///
/// Returns `Ok(None)` when the text does not contain `json` at all (the agent
/// is still asking for uploads). Otherwise every "```" and every "json" is
/// removed and the remainder must be a JSON array of strings.
pub fn extract_resume_list(text: &str) -> Result<Option<Vec<String>>, serde_json::Error> {
    if !text.contains("json") {
        return Ok(None);
    }
    let cleaned = text.replace("```", "").replace("json", "");
    serde_json::from_str::<Vec<String>>(cleaned.trim()).map(Some)
}

/// Deserializes a structured agent response, tolerating code fences.
pub fn parse_structured<T: DeserializeOwned>(agent: AgentKind, text: &str) -> Result<T, TurnError> {
    serde_json::from_str(strip_json_fences(text)).map_err(|e| TurnError::SchemaViolation {
        agent,
        reason: e.to_string(),
        raw: text.to_string(),
    })
}

/// One summary entry per resume, same order.
pub fn check_resume_summary(summary: &ParsedResumeData, resumes: &[String]) -> Result<(), String> {
    if summary.data.len() != resumes.len() {
        return Err(format!(
            "expected {} parsed resumes, got {}",
            resumes.len(),
            summary.data.len()
        ));
    }
    Ok(())
}

/// One score per summary entry, each within 1 – 100 and for a known email.
pub fn check_scores(scores: &Scores, summary: &ParsedResumeData) -> Result<(), String> {
    if scores.data.len() != summary.data.len() {
        return Err(format!(
            "expected {} scores, got {}",
            summary.data.len(),
            scores.data.len()
        ));
    }
    for entry in &scores.data {
        if !(1..=100).contains(&entry.score) {
            return Err(format!(
                "score {} for '{}' is outside 1-100",
                entry.score, entry.email
            ));
        }
        if !summary.contains_email(&entry.email) {
            return Err(format!(
                "score references unknown email '{}'",
                entry.email
            ));
        }
    }
    Ok(())
}
