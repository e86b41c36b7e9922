use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Structured data parsed out of a single resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedResumeDataContent {
    /// Technical skills, soft skills, languages, tools, frameworks and technologies.
    pub skills: BTreeSet<String>,
    /// Total years of relevant work experience.
    pub years: u32,
    /// Degree and school entries, in resume order.
    pub education: Vec<String>,
    /// Candidate email. Not validated: may be empty or malformed.
    #[serde(default)]
    pub email: String,
}

/// One `ParsedResumeDataContent` per resume, in `resume_list` order.
/// Resumes sharing an email stay separate entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedResumeData {
    pub data: Vec<ParsedResumeDataContent>,
}

impl ParsedResumeData {
    pub fn contains_email(&self, email: &str) -> bool {
        self.data.iter().any(|c| c.email == email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub email: String,
    /// Compatibility score, 1 – 100.
    pub score: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub data: Vec<ScoreEntry>,
}

/// Follow-up email body drafted by the HR notifier for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpDraft {
    pub email: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpDrafts {
    pub data: Vec<FollowUpDraft>,
}
