use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    FollowUp,
    Rejection,
}

/// A mock email produced by the HR notifier for one scored candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEmail {
    pub email: String,
    pub kind: NotificationKind,
    pub subject: String,
    pub body: String,
}
