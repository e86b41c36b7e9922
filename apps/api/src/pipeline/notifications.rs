//! HR notifications: the explicit output channel of the HR notifier.
//!
//! Rejections use the fixed template; follow-up bodies are drafted by the
//! backend. The compiled emails are stored in session state, returned to the
//! caller and handed to a `Notifier`.

use async_trait::async_trait;
use tracing::info;

use crate::models::candidate::{FollowUpDraft, ScoreEntry};
use crate::models::notification::{NotificationEmail, NotificationKind};
use crate::pipeline::prompts::{FOLLOW_UP_SUBJECT, REJECTION_SUBJECT, REJECTION_TEMPLATE};

pub const DEFAULT_FOLLOW_UP_THRESHOLD: u32 = 60;

/// Delivery side of the notification channel. Swap for a real mailer without
/// touching the pipeline.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, emails: &[NotificationEmail]);
}

/// Writes mock emails to the log. Nothing leaves the process.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, emails: &[NotificationEmail]) {
        for email in emails {
            info!(
                to = %email.email,
                kind = ?email.kind,
                subject = %email.subject,
                "Mock notification email"
            );
        }
    }
}

pub fn kind_for(score: u32, threshold: u32) -> NotificationKind {
    if score >= threshold {
        NotificationKind::FollowUp
    } else {
        NotificationKind::Rejection
    }
}

/// Scored entries that get a follow-up, in score order.
pub fn follow_up_candidates(scores: &[ScoreEntry], threshold: u32) -> Vec<&ScoreEntry> {
    scores
        .iter()
        .filter(|s| kind_for(s.score, threshold) == NotificationKind::FollowUp)
        .collect()
}

/// Builds one email per scored entry, in score order.
///
/// `drafts` must hold one draft per follow-up candidate, in the order returned
/// by `follow_up_candidates`, each addressed to that candidate.
pub fn compose(
    scores: &[ScoreEntry],
    drafts: Vec<FollowUpDraft>,
    threshold: u32,
) -> Result<Vec<NotificationEmail>, String> {
    let expected = follow_up_candidates(scores, threshold).len();
    if drafts.len() != expected {
        return Err(format!(
            "expected {expected} follow-up drafts, got {}",
            drafts.len()
        ));
    }

    let mut drafts = drafts.into_iter();
    let mut emails = Vec::with_capacity(scores.len());
    for entry in scores {
        let email = match kind_for(entry.score, threshold) {
            NotificationKind::Rejection => NotificationEmail {
                email: entry.email.clone(),
                kind: NotificationKind::Rejection,
                subject: REJECTION_SUBJECT.to_string(),
                body: REJECTION_TEMPLATE.to_string(),
            },
            NotificationKind::FollowUp => {
                let draft = drafts
                    .next()
                    .ok_or_else(|| "ran out of follow-up drafts".to_string())?;
                if draft.email != entry.email {
                    return Err(format!(
                        "follow-up draft for '{}' does not match candidate '{}'",
                        draft.email, entry.email
                    ));
                }
                NotificationEmail {
                    email: entry.email.clone(),
                    kind: NotificationKind::FollowUp,
                    subject: FOLLOW_UP_SUBJECT.to_string(),
                    body: draft.body,
                }
            }
        };
        emails.push(email);
    }
    Ok(emails)
}
