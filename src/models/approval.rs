use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque approval identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApprovalId(Uuid);

impl ApprovalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ApprovalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ApprovalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ApprovalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// One choice offered to the remote party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalOption {
    pub label: String,
    pub description: String,
}

impl ApprovalOption {
    pub fn new(label: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: description.into(),
        }
    }
}

/// Answer payload. Both fields absent is the timeout payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalResponse {
    #[serde(default)]
    pub selected_option: Option<ApprovalOption>,
    #[serde(default)]
    pub custom_input: Option<String>,
}

impl ApprovalResponse {
    pub fn selected(option: ApprovalOption) -> Self {
        Self {
            selected_option: Some(option),
            custom_input: None,
        }
    }

    pub fn custom(input: impl Into<String>) -> Self {
        Self {
            selected_option: None,
            custom_input: Some(input.into()),
        }
    }

    /// True for the null payload recorded on timeout or eviction.
    pub fn is_empty(&self) -> bool {
        self.selected_option.is_none() && self.custom_input.is_none()
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Resolved,
    TimedOut,
    Cancelled,
}

/// Read-only view of a pending approval.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalSnapshot {
    pub id: ApprovalId,
    pub question: String,
    pub options: Vec<ApprovalOption>,
    pub header: Option<String>,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Result of a single `poll_response` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "response", rename_all = "snake_case")]
pub enum PollStatus {
    Pending,
    Resolved(ApprovalResponse),
    TimedOut(ApprovalResponse),
    NotFound,
}

/// Lifecycle notifications published by the approval manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ApprovalEvent {
    Created { id: ApprovalId },
    Resolved { id: ApprovalId },
    /// `evicted` is set when the capacity cap forced the timeout.
    TimedOut { id: ApprovalId, evicted: bool },
    Cancelled { id: ApprovalId },
}

impl ApprovalEvent {
    pub fn id(&self) -> ApprovalId {
        match self {
            ApprovalEvent::Created { id }
            | ApprovalEvent::Resolved { id }
            | ApprovalEvent::TimedOut { id, .. }
            | ApprovalEvent::Cancelled { id } => *id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalEvent::Created { .. })
    }
}
