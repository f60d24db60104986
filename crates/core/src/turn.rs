//! Conversation turn domain types.
//!
//! A project's conversation is an append-only sequence of turns:
//! user prompt → model artifact → user prompt → ...

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of the project a conversation belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The end user
    User,
    /// The generation backend
    Model,
}

/// A single immutable turn in a project conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Unique turn ID
    pub id: String,

    /// The project this turn belongs to
    pub project_id: ProjectId,

    /// Who produced this turn
    pub role: TurnRole,

    /// The text content
    pub text: String,

    /// Position in the project conversation (1-based, strictly increasing)
    pub sequence: u64,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    /// Create a turn with a fresh ID and the current timestamp.
    pub fn new(project_id: ProjectId, role: TurnRole, text: impl Into<String>, sequence: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            project_id,
            role,
            text: text.into(),
            sequence,
            created_at: Utc::now(),
        }
    }

    /// A turn that is sent to the backend but never persisted
    /// (the system instruction). It carries sequence 0.
    pub fn transient(role: TurnRole, text: impl Into<String>) -> Self {
        Self::new(ProjectId::new(""), role, text, 0)
    }
}
